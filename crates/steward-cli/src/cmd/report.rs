use crate::output::{print_json, print_table};
use std::path::Path;
use steward_core::config::Config;
use steward_core::report::CycleReport;

pub fn run(root: &Path, cycle: Option<u64>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root)?;
    let report = CycleReport::load(root, &config, cycle)?;

    if json {
        return print_json(&report);
    }

    println!("Cycle {} — {}", report.cycle_ts, report.org);
    println!(
        "Status: {} ({:.0}% success, {:.0}% efficiency)",
        report.status, report.success_rate, report.efficiency
    );
    println!(
        "Actions: {} attempted, {} executed, {} skipped, cost {:.1}",
        report.total_actions, report.executed, report.skipped, report.total_cost
    );
    if let Some(health) = report.overall_health {
        println!("Org health: {}", health.as_str());
    }
    if let Some(reason) = &report.degraded {
        println!("Degraded: {reason}");
    }

    if !report.per_kind.is_empty() {
        let rows: Vec<Vec<String>> = report
            .per_kind
            .iter()
            .map(|(kind, stats)| {
                vec![
                    kind.to_string(),
                    stats.attempted.to_string(),
                    stats.succeeded.to_string(),
                    stats.partial.to_string(),
                    stats.failed.to_string(),
                    stats.skipped.to_string(),
                    format!("{:.0}%", stats.success_rate),
                ]
            })
            .collect();
        println!();
        print_table(
            &[
                "KIND",
                "ATTEMPTED",
                "OK",
                "PARTIAL",
                "FAILED",
                "SKIPPED",
                "RATE",
            ],
            rows,
        );
    }

    if !report.recommendations.is_empty() {
        println!("\nRecommendations:");
        for rec in &report.recommendations {
            println!("  - {rec}");
        }
    }

    Ok(())
}
