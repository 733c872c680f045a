use crate::output::{print_json, print_table, truncate};
use forge_client::{ForgeClient, PlatformRunner};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use steward_core::config::Config;
use steward_core::cycle::{self, CycleOutcome};
use steward_core::report::ReportStatus;
use steward_core::types::CycleRequest;

/// Exit code when the cycle report lands on needs-attention.
const EXIT_NEEDS_ATTENTION: i32 = 2;

pub fn run(
    root: &Path,
    action: &str,
    target: &str,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<i32> {
    // Validate the trigger before touching any store, so a typo'd action
    // fails the same way whether or not the project is initialized.
    let request = CycleRequest::parse(action, target)?;

    let config = Config::load(root)?;
    let client = ForgeClient::from_config(&config.forge)?;
    let runner = PlatformRunner::new(client, config.org.name.clone())?;
    let cancel = AtomicBool::new(false);

    let outcome = cycle::run_cycle(root, &config, &runner, &runner, &request, dry_run, &cancel)?;

    if json {
        print_cycle_json(&outcome)?;
    } else {
        print_cycle(&outcome);
    }

    Ok(exit_code(outcome.report.as_ref().map(|r| r.status)))
}

fn exit_code(status: Option<ReportStatus>) -> i32 {
    match status {
        Some(ReportStatus::NeedsAttention) => EXIT_NEEDS_ATTENTION,
        _ => 0,
    }
}

fn print_cycle_json(outcome: &CycleOutcome) -> anyhow::Result<()> {
    let value = if outcome.dry_run {
        serde_json::json!({
            "dry_run": true,
            "cycle_ts": outcome.cycle_ts,
            "plan": outcome.plan,
        })
    } else {
        serde_json::json!({
            "dry_run": false,
            "cycle_ts": outcome.cycle_ts,
            "plan": outcome.plan,
            "outcomes": outcome.outcomes,
            "report": outcome.report,
            "new_insights": outcome.new_insights,
        })
    };
    print_json(&value)
}

// ---------------------------------------------------------------------------
// Human-readable output
// ---------------------------------------------------------------------------

fn print_cycle(outcome: &CycleOutcome) {
    if outcome.dry_run {
        println!("Cycle {} (dry run)", outcome.cycle_ts);
    } else {
        println!("Cycle {}", outcome.cycle_ts);
    }

    let plan = &outcome.plan;
    println!(
        "Plan: {} actions, estimated cost {:.1} (budget {:.1})",
        plan.len(),
        plan.total_cost,
        plan.budget.max_cost
    );

    if !plan.is_empty() {
        let rows: Vec<Vec<String>> = plan
            .actions
            .iter()
            .map(|scored| {
                vec![
                    scored.candidate.kind.to_string(),
                    scored.candidate.target.to_string(),
                    format!("{:.1}", scored.candidate.estimated_cost),
                    format!("{:.0}", scored.candidate.estimated_impact),
                    format!("{:.2}", scored.raw_score),
                ]
            })
            .collect();
        println!();
        print_table(&["KIND", "TARGET", "COST", "IMPACT", "SCORE"], rows);
    }

    if outcome.dry_run {
        println!("\nDry run — nothing executed, nothing persisted.");
        return;
    }

    if !outcome.outcomes.is_empty() {
        let rows: Vec<Vec<String>> = outcome
            .outcomes
            .iter()
            .map(|o| {
                vec![
                    o.candidate.kind.to_string(),
                    o.candidate.target.to_string(),
                    o.status.as_str().to_string(),
                    o.attempts.to_string(),
                    truncate(&o.effect_summary, 60),
                ]
            })
            .collect();
        println!();
        print_table(&["KIND", "TARGET", "STATUS", "ATTEMPTS", "EFFECT"], rows);
    }

    if let Some(report) = &outcome.report {
        println!(
            "\nReport: {} ({:.0}% success) — {} attempted, {} executed, {} skipped",
            report.status, report.success_rate, report.total_actions, report.executed,
            report.skipped
        );
        for rec in &report.recommendations {
            println!("  - {rec}");
        }
    }

    if !outcome.new_insights.is_empty() {
        println!("\nNew insights:");
        for insight in &outcome.new_insights {
            println!(
                "  {}  [{}] {}",
                insight.id,
                insight.severity.as_str(),
                insight.description
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_attention_maps_to_exit_2() {
        assert_eq!(exit_code(Some(ReportStatus::NeedsAttention)), 2);
    }

    #[test]
    fn healthy_statuses_exit_zero() {
        assert_eq!(exit_code(None), 0);
        assert_eq!(exit_code(Some(ReportStatus::Excellent)), 0);
        assert_eq!(exit_code(Some(ReportStatus::Good)), 0);
        assert_eq!(exit_code(Some(ReportStatus::Fair)), 0);
    }
}
