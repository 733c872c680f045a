use anyhow::Context;
use std::path::Path;
use steward_core::{config::Config, io, paths};

pub fn run(root: &Path, org: Option<&str>) -> anyhow::Result<()> {
    let org_name = match org {
        Some(name) => name.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "org".to_string()),
    };

    println!("Initializing steward in: {}", root.display());

    let dirs = [paths::STEWARD_DIR, paths::SNAPSHOTS_DIR];
    for dir in dirs {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  .steward/config.yaml");
        Config::load(root).context("failed to load existing config")?
    } else {
        let cfg = Config::new(org_name);
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: .steward/config.yaml");
        cfg
    };

    println!("\nOrganization: {}", config.org.name);
    println!("\nNext steps:");
    println!(
        "  1. export {}=<personal access token>",
        config.forge.token_env
    );
    println!("  2. steward run --dry-run");
    Ok(())
}
