use crate::output::{print_json, print_table, truncate};
use std::path::Path;
use steward_core::config::Config;
use steward_core::outcome::{ExecutionOutcome, OutcomeLog};
use steward_core::paths;

pub fn run(root: &Path, cycle: Option<u64>, json: bool) -> anyhow::Result<()> {
    // Initialization check; the outcomes themselves live in redb.
    Config::load(root)?;

    let db_path = paths::outcomes_db_path(root);
    // A read must not create the database file.
    let outcomes: Vec<ExecutionOutcome> = if db_path.exists() {
        let log = OutcomeLog::open(&db_path)?;
        match cycle.or(log.latest_cycle_ts()?) {
            Some(ts) => log.list_cycle(ts)?,
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    if json {
        return print_json(&outcomes);
    }

    if outcomes.is_empty() {
        println!("No outcomes recorded yet. Run: steward run");
        return Ok(());
    }

    println!("Cycle {}", outcomes[0].cycle_ts);
    let rows: Vec<Vec<String>> = outcomes
        .iter()
        .map(|o| {
            vec![
                o.candidate.kind.to_string(),
                o.candidate.target.to_string(),
                o.status.as_str().to_string(),
                o.attempts.to_string(),
                format!("{}ms", o.duration_ms),
                truncate(&o.effect_summary, 60),
            ]
        })
        .collect();
    println!();
    print_table(
        &["KIND", "TARGET", "STATUS", "ATTEMPTS", "DURATION", "EFFECT"],
        rows,
    );
    Ok(())
}
