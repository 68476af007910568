//! Visualize the fork bomb under both schedulers
//!
//! Generates an interactive HTML chart showing, per tick:
//! - Process table size (round robin vs. market)
//! - Milliseconds granted to the critical burst job
//!
//! Usage:
//!   cargo run --example visualize_forkbomb
//!   Open visualizations/forkbomb.html in browser

use amp_simulation_engine::{
    config::SimConfig,
    metrics::EventKind,
    scenario::{run_market_with_fee, run_rr_forkbomb},
    simulator::SimulationResult,
};
use plotly::{
    Plot, Scatter,
    color::NamedColor,
    common::{Line, Mode},
    layout::{Axis, Layout},
};

fn tick_series(result: &SimulationResult, critical_pid: u32) -> (Vec<u64>, Vec<usize>, Vec<u64>) {
    let ticks = result.events.iter().filter(|e| e.kind == EventKind::Tick);
    let mut xs = Vec::new();
    let mut procs = Vec::new();
    let mut critical = Vec::new();
    for e in ticks {
        xs.push(e.tick);
        procs.push(e.procs);
        critical.push(if e.dispatch_pid == Some(critical_pid) { e.granted_ms } else { 0 });
    }
    (xs, procs, critical)
}

fn main() {
    println!("🎨 Generating fork-bomb visualization...");

    let config = SimConfig::default();
    let rr = run_rr_forkbomb(&config);
    let market = run_market_with_fee(&config, config.spawner.spawn_fee_ms);

    let (rr_ticks, rr_procs, rr_crit) = tick_series(&rr, config.critical_pid);
    let (mk_ticks, mk_procs, mk_crit) = tick_series(&market, config.critical_pid);

    let mut plot = Plot::new();
    plot.add_trace(
        Scatter::new(rr_ticks.clone(), rr_procs)
            .name("Processes (round robin)")
            .mode(Mode::Lines)
            .line(Line::new().color(NamedColor::Red).width(2.0)),
    );
    plot.add_trace(
        Scatter::new(mk_ticks.clone(), mk_procs)
            .name(&format!("Processes (market, fee={})", config.spawner.spawn_fee_ms))
            .mode(Mode::Lines)
            .line(Line::new().color(NamedColor::Blue).width(2.0)),
    );
    plot.add_trace(
        Scatter::new(rr_ticks, rr_crit)
            .name("Critical grant ms (round robin)")
            .mode(Mode::Markers)
            .y_axis("y2"),
    );
    plot.add_trace(
        Scatter::new(mk_ticks, mk_crit)
            .name("Critical grant ms (market)")
            .mode(Mode::Markers)
            .y_axis("y2"),
    );

    let layout = Layout::new()
        .title("Fork bomb: round robin vs. market")
        .x_axis(Axis::new().title("Tick").grid_color(NamedColor::LightGray))
        .y_axis(Axis::new().title("Process count").grid_color(NamedColor::LightGray))
        .y_axis2(
            Axis::new()
                .title("Critical grant (ms)")
                .overlaying("y")
                .side(plotly::common::AxisSide::Right),
        )
        .hover_mode(plotly::layout::HoverMode::X);
    plot.set_layout(layout);

    std::fs::create_dir_all("visualizations").expect("Failed to create visualizations/");
    let output_path = "visualizations/forkbomb.html";
    plot.write_html(output_path);

    println!("✅ Visualization saved to {}", output_path);
    println!("\n📊 Key Observations:");
    println!(
        "   - Fairness (Jain): RR {:.3}, market {:.3}",
        rr.summary.fairness_jain_index, market.summary.fairness_jain_index
    );
    println!(
        "   - Peak process count: RR {}, market {}",
        rr.summary.max_procs, market.summary.max_procs
    );
}
