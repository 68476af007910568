//! AMP Simulation Engine CLI
//!
//! Runs the fork-bomb experiment and writes traces, JSONL events and a
//! summary file.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amp_simulation_engine::{
    config::SimConfig,
    output::write_results,
    scenario::{comparison_fees, forkbomb_comparison, run_market_with_fee, run_rr_forkbomb},
    simulator::SimulationResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Which {
    Rr,
    Market,
    Both,
}

#[derive(Parser, Debug)]
#[command(name = "amp-sim")]
#[command(
    about = "Compare round robin and a budgeted market scheduler under a fork bomb",
    long_about = None
)]
struct Args {
    /// JSON config file (missing fields take defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to simulate
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Maximum grant per dispatch (ms)
    #[arg(long)]
    slice_ms: Option<u64>,

    /// Starting budget of the initial processes (ms)
    #[arg(long)]
    budget_ms: Option<u64>,

    /// Fork fee charged to the attacker per child (ms)
    #[arg(long)]
    spawn_fee_ms: Option<u64>,

    /// Which schedulers to run
    #[arg(short, long, value_enum, default_value_t = Which::Both)]
    scheduler: Which,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
}

impl Args {
    fn sim_config(&self) -> anyhow::Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_json_file(path)?,
            None => SimConfig::default(),
        };
        if let Some(ticks) = self.ticks {
            config.ticks = ticks;
        }
        if let Some(slice_ms) = self.slice_ms {
            config.scheduler.slice_ms = slice_ms;
        }
        if let Some(budget_ms) = self.budget_ms {
            config.scheduler.default_budget_ms = budget_ms;
        }
        if let Some(fee) = self.spawn_fee_ms {
            config.spawner.spawn_fee_ms = fee;
        }
        config.validate().context("invalid simulation config")?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "amp_simulation_engine=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.sim_config()?;

    info!(
        ticks = config.ticks,
        slice_ms = config.scheduler.slice_ms,
        budget_ms = config.scheduler.default_budget_ms,
        spawn_fee_ms = config.spawner.spawn_fee_ms,
        "configuration"
    );

    let results: Vec<SimulationResult> = match args.scheduler {
        Which::Both => forkbomb_comparison(&config),
        Which::Rr => vec![run_rr_forkbomb(&config)],
        Which::Market => comparison_fees(&config)
            .into_iter()
            .map(|fee| run_market_with_fee(&config, fee))
            .collect(),
    };

    let summary_path = write_results(&args.out_dir, &results)
        .with_context(|| format!("writing results to {}", args.out_dir.display()))?;

    println!(
        "{:<26} {:>8} {:>10} {:>10} {:>10} {:>12} {:>10}",
        "Run", "Procs", "Dispatch", "Fairness", "Crit runs", "Crit maxgap", "Broke@"
    );
    println!("{}", "-".repeat(92));
    for result in &results {
        let s = &result.summary;
        let crit = s.critical.as_ref();
        let fmt_opt = |v: Option<u64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        println!(
            "{:<26} {:>8} {:>10} {:>10.3} {:>10} {:>12} {:>10}",
            s.run_name,
            s.max_procs,
            s.dispatch_count,
            s.fairness_jain_index,
            crit.map_or(0, |c| c.runs),
            fmt_opt(crit.and_then(|c| c.max_gap_ticks)),
            fmt_opt(s.attacker_bankrupt_tick),
        );
    }

    println!("\nWrote summary: {}", summary_path.display());
    Ok(())
}
