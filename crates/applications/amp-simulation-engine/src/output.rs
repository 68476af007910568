//! Writing run results to disk
//!
//! Per run: a human-readable trace (`<run>.txt`) and the event stream as
//! JSON lines (`<run>.jsonl`). Across runs: one pretty-printed summary file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::metrics::{Event, RunSummary};
use crate::simulator::SimulationResult;

pub const SUMMARY_FILE: &str = "forkbomb_summary.json";

#[derive(Serialize)]
struct SummaryFile<'a> {
    summaries: Vec<&'a RunSummary>,
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

/// One compact JSON object per line
pub fn write_jsonl(path: impl AsRef<Path>, events: &[Event]) -> Result<()> {
    let mut out = create(path.as_ref())?;
    for event in events {
        serde_json::to_writer(&mut out, event)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Header line followed by one line per tick
pub fn write_trace(path: impl AsRef<Path>, header: &str, lines: &[String]) -> Result<()> {
    let mut out = create(path.as_ref())?;
    writeln!(out, "{header}")?;
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

/// `{"summaries": [...]}`, pretty-printed
pub fn write_summary(
    out_dir: impl AsRef<Path>,
    filename: &str,
    summaries: &[&RunSummary],
) -> Result<PathBuf> {
    let path = out_dir.as_ref().join(filename);
    let mut out = create(&path)?;
    let payload = SummaryFile {
        summaries: summaries.to_vec(),
    };
    serde_json::to_writer_pretty(&mut out, &payload)?;
    out.flush()?;
    Ok(path)
}

/// Write trace, events and the combined summary for a batch of runs
pub fn write_results(out_dir: impl AsRef<Path>, results: &[SimulationResult]) -> Result<PathBuf> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    for result in results {
        let name = &result.summary.run_name;
        write_trace(out_dir.join(format!("{name}.txt")), &result.header, &result.trace)?;
        write_jsonl(out_dir.join(format!("{name}.jsonl")), &result.events)?;
        info!(run = %name, events = result.events.len(), "wrote run files");
    }

    let summaries: Vec<&RunSummary> = results.iter().map(|r| &r.summary).collect();
    let path = write_summary(out_dir, SUMMARY_FILE, &summaries)?;
    info!(path = %path.display(), "wrote summary");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::scenario::forkbomb_comparison;

    #[test]
    fn test_jsonl_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.jsonl");
        let events = vec![
            Event {
                tick: 0,
                dispatch_pid: Some(1),
                granted_ms: 10,
                ..Event::default()
            },
            Event {
                tick: 1,
                ..Event::default()
            },
        ];

        write_jsonl(&path, &events).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: Vec<Event> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(parsed, events);
    }

    #[test]
    fn test_write_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rr.txt");
        let lines = vec!["tick=00 procs=03 dispatch pid=1 grant_ms=10".to_string()];

        write_trace(&path, "=== Round Robin (Fork Bomb) ===", &lines).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "=== Round Robin (Fork Bomb) ===\ntick=00 procs=03 dispatch pid=1 grant_ms=10\n"
        );
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimConfig {
            ticks: 12,
            ..SimConfig::default()
        };
        let results = forkbomb_comparison(&config);

        let summary_path = write_results(dir.path(), &results).unwrap();

        for name in [
            "forkbomb_rr",
            "forkbomb_market_fee_1",
            "forkbomb_market_fee_5",
            "forkbomb_market_fee_10",
        ] {
            assert!(dir.path().join(format!("{name}.txt")).exists());
            assert!(dir.path().join(format!("{name}.jsonl")).exists());
        }

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(summary_path).unwrap()).unwrap();
        let runs = summary["summaries"].as_array().unwrap();
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[0]["run_name"], "forkbomb_rr");
        assert_eq!(runs[1]["spawn_fee_ms"], 1);
        assert_eq!(runs[0]["event_count"], 12);
    }
}
