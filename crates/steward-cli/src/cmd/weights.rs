use crate::output::{print_json, print_table};
use std::path::Path;
use steward_core::config::Config;
use steward_core::types::ActionKind;
use steward_core::weights::WeightState;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    // Initialization check; absent weights read as neutral defaults.
    Config::load(root)?;
    let weights = WeightState::load(root)?;

    if json {
        return print_json(&weights);
    }

    let rows: Vec<Vec<String>> = ActionKind::all()
        .iter()
        .map(|kind| vec![kind.to_string(), format!("{:.2}", weights.get(*kind))])
        .collect();
    print_table(&["ACTION", "WEIGHT"], rows);
    Ok(())
}
