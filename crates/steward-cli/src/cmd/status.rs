use crate::output::{print_json, print_table};
use std::path::Path;
use steward_core::config::Config;
use steward_core::snapshot::OrgSnapshot;
use steward_core::thresholds::OrgHealth;
use steward_core::types::Tier;
use steward_core::weights::WeightState;

/// Exit code for `--strict` when overall org health is critical.
const EXIT_CRITICAL: i32 = 2;

pub fn run(root: &Path, strict: bool, json: bool) -> anyhow::Result<i32> {
    let config = Config::load(root)?;
    let weights = WeightState::load(root)?;
    let latest = OrgSnapshot::latest(root)?;

    let (snapshot, health) = match &latest {
        Some((cycle_ts, snap)) => {
            let health = OrgHealth::evaluate(snap, &config.thresholds)?;
            (Some((*cycle_ts, snap)), health)
        }
        None => (None, None),
    };

    if json {
        let snapshot_json = match snapshot {
            Some((cycle_ts, snap)) => serde_json::json!({
                "cycle_ts": cycle_ts,
                "captured_at": snap.captured_at,
                "repos": snap.len(),
            }),
            None => serde_json::Value::Null,
        };
        let value = serde_json::json!({
            "org": config.org.name,
            "snapshot": snapshot_json,
            "health": health,
            "weights": weights,
        });
        print_json(&value)?;
    } else {
        print_status(&config.org.name, snapshot, health.as_ref(), &weights);
    }

    let critical = health.as_ref().is_some_and(|h| h.overall == Tier::Critical);
    if strict && critical {
        return Ok(EXIT_CRITICAL);
    }
    Ok(0)
}

fn print_status(
    org: &str,
    snapshot: Option<(u64, &OrgSnapshot)>,
    health: Option<&OrgHealth>,
    weights: &WeightState,
) {
    println!("Organization: {org}");

    let Some((cycle_ts, snap)) = snapshot else {
        println!("\nNo snapshots yet. Run: steward run");
        return;
    };

    println!(
        "Snapshot: cycle {} — {} repositories, captured {}",
        cycle_ts,
        snap.len(),
        snap.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    match health {
        Some(h) => {
            println!("Health: {}", h.overall.as_str());
            let rows: Vec<Vec<String>> = h
                .metrics
                .iter()
                .map(|(metric, mh)| {
                    vec![
                        metric.to_string(),
                        format!("{:.1}", mh.value),
                        mh.tier.as_str().to_string(),
                    ]
                })
                .collect();
            println!();
            print_table(&["METRIC", "SCORE", "TIER"], rows);
        }
        None => println!("Health: (no repositories in the latest snapshot)"),
    }

    if !weights.weights.is_empty() {
        println!("\nWeights:");
        for (kind, value) in &weights.weights {
            println!("  {:<14} {:.2}", kind.to_string(), value);
        }
    }
}
