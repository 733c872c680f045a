use crate::output::{print_json, print_table};
use clap::Subcommand;
use std::path::Path;
use steward_core::config::Config;
use steward_core::insight::{Insight, InsightHistory, InsightStatus};
use steward_core::StewardError;

#[derive(Subcommand)]
pub enum InsightsSubcommand {
    /// List insights, newest first
    List {
        /// Show only unresolved insights
        #[arg(long)]
        open: bool,

        /// Show the N highest-priority open insights (recency-decayed)
        #[arg(long)]
        top: Option<usize>,
    },

    /// Mark an insight resolved
    Resolve {
        /// Insight id, e.g. ins-1a2b3c4d
        id: String,
    },
}

pub fn run(root: &Path, subcommand: Option<InsightsSubcommand>, json: bool) -> anyhow::Result<()> {
    match subcommand.unwrap_or(InsightsSubcommand::List {
        open: false,
        top: None,
    }) {
        InsightsSubcommand::List { open, top } => list(root, open, top, json),
        InsightsSubcommand::Resolve { id } => resolve(root, &id, json),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(root: &Path, open_only: bool, top: Option<usize>, json: bool) -> anyhow::Result<()> {
    let history = InsightHistory::load(root)?;

    let insights: Vec<&Insight> = if let Some(k) = top {
        let config = Config::load(root)?;
        history.top_open(k, config.learning.recency_decay)
    } else if open_only {
        history.open_insights().collect()
    } else {
        let mut all: Vec<&Insight> = history.insights.iter().collect();
        all.sort_by(|a, b| b.cycle_ts.cmp(&a.cycle_ts).then_with(|| a.id.cmp(&b.id)));
        all
    };

    if json {
        return print_json(&insights);
    }

    if insights.is_empty() {
        println!("No insights yet. Run: steward run");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = insights
        .iter()
        .map(|i| {
            vec![
                i.id.clone(),
                i.category.as_str().to_string(),
                i.severity.as_str().to_string(),
                format!("{:.1}", i.priority),
                status_str(i.status).to_string(),
                i.description.clone(),
            ]
        })
        .collect();
    print_table(
        &["ID", "CATEGORY", "SEVERITY", "PRIORITY", "STATUS", "DESCRIPTION"],
        rows,
    );
    Ok(())
}

fn status_str(status: InsightStatus) -> &'static str {
    match status {
        InsightStatus::Open => "open",
        InsightStatus::Resolved => "resolved",
    }
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

fn resolve(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let insight = InsightHistory::resolve(root, id)?
        .ok_or_else(|| StewardError::InsightNotFound(id.to_string()))?;

    if json {
        return print_json(&insight);
    }

    println!("Resolved {} — {}", insight.id, insight.description);
    Ok(())
}
