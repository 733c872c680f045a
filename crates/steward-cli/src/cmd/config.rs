use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use steward_core::config::{Config, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Check the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;

    if json {
        return print_json(&config);
    }

    println!("Organization:  {}", config.org.name);
    println!("Forge API:     {}", config.forge.api_url);
    println!("Token env:     {}", config.forge.token_env);
    println!(
        "Budget:        cost {:.1}, {} actions max",
        config.budget.max_cost, config.budget.max_actions
    );
    println!(
        "Execution:     {} retries, breaker at {} failures",
        config.execution.max_retries, config.execution.breaker_threshold
    );
    println!(
        "Learning:      window {} cycles, weights [{:.1}, {:.1}]",
        config.learning.window, config.learning.weight_min, config.learning.weight_max
    );
    println!("Snapshots:     keep {}", config.snapshot_keep);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    let has_errors = warnings.iter().any(|w| w.level == WarnLevel::Error);
    if has_errors {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}
