mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, insights::InsightsSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "steward",
    about = "Orchestration decision engine — snapshot an org's repositories, plan and execute actions, learn from outcomes",
    version,
    propagate_version = true
)]
struct Cli {
    /// Engine root (default: auto-detect from .steward/ or .git/)
    #[arg(long, global = true, env = "STEWARD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize steward in the current project
    Init {
        /// Organization to manage (default: root directory name)
        #[arg(long)]
        org: Option<String>,
    },

    /// Run one decision cycle: snapshot, plan, execute, learn
    Run {
        /// Action kind to consider: all, analyze, sync, health-check, security-scan
        #[arg(long, default_value = "all")]
        action: String,

        /// Target scope: all, org, or a repository name
        #[arg(long, default_value = "all")]
        target: String,

        /// Build the plan but execute nothing and persist nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show org health from the latest snapshot
    Status {
        /// Exit with code 2 when overall health is critical
        #[arg(long)]
        strict: bool,
    },

    /// Show the report for a cycle
    Report {
        /// Cycle timestamp (default: most recent)
        #[arg(long)]
        cycle: Option<u64>,
    },

    /// Inspect and resolve learned insights
    Insights {
        #[command(subcommand)]
        subcommand: Option<InsightsSubcommand>,
    },

    /// List execution outcomes for a cycle
    Outcomes {
        /// Cycle timestamp (default: most recent)
        #[arg(long)]
        cycle: Option<u64>,
    },

    /// Show current action weights
    Weights,

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Serve the HTTP API
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "7171")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init { org } => cmd::init::run(&root, org.as_deref()).map(|()| 0),
        Commands::Run {
            action,
            target,
            dry_run,
        } => cmd::run::run(&root, &action, &target, dry_run, cli.json),
        Commands::Status { strict } => cmd::status::run(&root, strict, cli.json),
        Commands::Report { cycle } => cmd::report::run(&root, cycle, cli.json).map(|()| 0),
        Commands::Insights { subcommand } => {
            cmd::insights::run(&root, subcommand, cli.json).map(|()| 0)
        }
        Commands::Outcomes { cycle } => cmd::outcomes::run(&root, cycle, cli.json).map(|()| 0),
        Commands::Weights => cmd::weights::run(&root, cli.json).map(|()| 0),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json).map(|()| 0),
        Commands::Serve { port } => cmd::serve::run(&root, port).map(|()| 0),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Print the full error chain (anyhow's alternate Display)
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }
}
