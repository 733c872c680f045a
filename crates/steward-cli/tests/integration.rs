#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use steward_core::config::Config;
use steward_core::insight::{EvidenceRef, Insight, InsightCategory, InsightHistory, InsightStatus};
use steward_core::paths;
use steward_core::snapshot::{OrgSnapshot, RepoSignals};
use steward_core::types::{Metric, Tier};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A `steward` command rooted at the temp directory, hermetic from the
/// caller's environment.
fn steward(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("steward").unwrap();
    cmd.current_dir(dir.path())
        .env("STEWARD_ROOT", dir.path())
        .env_remove("FORGE_TOKEN");
    cmd
}

fn init_project(dir: &TempDir) {
    steward(dir)
        .args(["init", "--org", "acme"])
        .assert()
        .success();
}

fn healthy_signals() -> RepoSignals {
    RepoSignals {
        last_push_age_days: 5,
        has_readme: true,
        description_len: 40,
        open_vulnerabilities: Vec::new(),
        primary_language: Some("rust".into()),
        contributor_count: 20,
        archived: false,
    }
}

/// Every metric lands in the critical tier: a year stale, no docs, four
/// open advisories, nobody contributing.
fn vulnerable_signals() -> RepoSignals {
    RepoSignals {
        last_push_age_days: 400,
        has_readme: false,
        description_len: 0,
        open_vulnerabilities: vec![
            "GHSA-aaaa-bbbb-cccc".into(),
            "GHSA-dddd-eeee-ffff".into(),
            "GHSA-gggg-hhhh-iiii".into(),
            "GHSA-jjjj-kkkk-llll".into(),
        ],
        primary_language: None,
        contributor_count: 0,
        archived: false,
    }
}

fn save_snapshot(dir: &TempDir, cycle_ts: u64, signals: RepoSignals) {
    let snapshot = OrgSnapshot::from_signals("acme", vec![("api".to_string(), signals)]);
    snapshot.save(dir.path(), cycle_ts).unwrap();
}

fn sample_insight(id: &str, priority: f64) -> Insight {
    let mut insight = Insight::new(
        InsightCategory::Anomaly,
        "security posture far below org median",
        Tier::Critical,
        priority,
        1000,
        vec![EvidenceRef {
            cycle_ts: 1000,
            repo: Some("legacy".to_string()),
            metric: Metric::SecurityPosture,
            value: 25.0,
        }],
    );
    insight.id = id.to_string();
    insight
}

/// Point the saved config's forge API at a mock server.
fn use_mock_forge(dir: &TempDir, url: &str) {
    let mut config = Config::load(dir.path()).unwrap();
    config.forge.api_url = url.to_string();
    config.save(dir.path()).unwrap();
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_project_tree() {
    let dir = TempDir::new().unwrap();

    steward(&dir)
        .args(["init", "--org", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("created: .steward/config.yaml"))
        .stdout(predicate::str::contains("Next steps:"));

    assert!(dir.path().join(".steward").is_dir());
    assert!(dir.path().join(".steward/snapshots").is_dir());
    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.org.name, "acme");
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .args(["init", "--org", "other"])
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  .steward/config.yaml"));

    // The existing config is kept, not overwritten.
    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.org.name, "acme");
}

#[test]
fn init_defaults_org_to_directory_name() {
    let dir = TempDir::new().unwrap();

    steward(&dir).arg("init").assert().success();

    let expected = dir.path().file_name().unwrap().to_string_lossy().to_string();
    let config = Config::load(dir.path()).unwrap();
    assert_eq!(config.org.name, expected);
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

#[test]
fn status_requires_initialization() {
    let dir = TempDir::new().unwrap();

    steward(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn status_before_first_snapshot() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Organization: acme"))
        .stdout(predicate::str::contains("No snapshots yet"));
}

#[test]
fn status_shows_health_table() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    save_snapshot(&dir, 1000, healthy_signals());

    steward(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Health: excellent"))
        .stdout(predicate::str::contains("activity"))
        .stdout(predicate::str::contains("security_posture"));
}

#[test]
fn status_strict_exits_2_when_critical() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    save_snapshot(&dir, 1000, vulnerable_signals());

    steward(&dir)
        .args(["status", "--strict"])
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::contains("Health: critical"));
}

#[test]
fn status_without_strict_succeeds_when_critical() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    save_snapshot(&dir, 1000, vulnerable_signals());

    steward(&dir).arg("status").assert().success();
}

#[test]
fn status_strict_passes_when_healthy() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    save_snapshot(&dir, 1000, healthy_signals());

    steward(&dir).args(["status", "--strict"]).assert().success();
}

#[test]
fn status_json_includes_health_and_weights() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);
    save_snapshot(&dir, 1000, healthy_signals());

    let output = steward(&dir).args(["status", "-j"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(json["org"], "acme");
    assert_eq!(json["snapshot"]["cycle_ts"], 1000);
    assert_eq!(json["snapshot"]["repos"], 1);
    assert_eq!(json["health"]["overall"], "excellent");
    assert_eq!(json["weights"]["analyze"], 1.0);
}

// ---------------------------------------------------------------------------
// insights
// ---------------------------------------------------------------------------

#[test]
fn insights_empty_list() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .arg("insights")
        .assert()
        .success()
        .stdout(predicate::str::contains("No insights yet"));
}

#[test]
fn insights_list_filters_open() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let mut resolved = sample_insight("ins-aaaaaaaa", 2.0);
    resolved.status = InsightStatus::Resolved;
    resolved.resolved_at = Some(chrono::Utc::now());
    let history = InsightHistory {
        runs: Vec::new(),
        insights: vec![resolved, sample_insight("ins-bbbbbbbb", 3.0)],
    };
    history.save(dir.path()).unwrap();

    steward(&dir)
        .args(["insights", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ins-aaaaaaaa"))
        .stdout(predicate::str::contains("ins-bbbbbbbb"));

    steward(&dir)
        .args(["insights", "list", "--open"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ins-bbbbbbbb"))
        .stdout(predicate::str::contains("ins-aaaaaaaa").not());
}

#[test]
fn insights_top_ranks_by_priority() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let history = InsightHistory {
        runs: Vec::new(),
        insights: vec![
            sample_insight("ins-lowprio1", 1.0),
            sample_insight("ins-highpri1", 5.0),
        ],
    };
    history.save(dir.path()).unwrap();

    steward(&dir)
        .args(["insights", "list", "--top", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ins-highpri1"))
        .stdout(predicate::str::contains("ins-lowprio1").not());
}

#[test]
fn insights_resolve_marks_and_persists() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let history = InsightHistory {
        runs: Vec::new(),
        insights: vec![sample_insight("ins-abc12345", 3.0)],
    };
    history.save(dir.path()).unwrap();

    steward(&dir)
        .args(["insights", "resolve", "ins-abc12345"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolved ins-abc12345"));

    let reloaded = InsightHistory::load(dir.path()).unwrap();
    assert_eq!(reloaded.insights[0].status, InsightStatus::Resolved);
    assert!(reloaded.insights[0].resolved_at.is_some());
}

#[test]
fn insights_resolve_unknown_id_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .args(["insights", "resolve", "ins-zzzzzzzz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insight not found: ins-zzzzzzzz"));
}

// ---------------------------------------------------------------------------
// weights
// ---------------------------------------------------------------------------

#[test]
fn weights_show_neutral_defaults() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .arg("weights")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("1.00"));
}

#[test]
fn weights_json_is_a_kind_map() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let output = steward(&dir).args(["weights", "-j"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["analyze"], 1.0);
    assert_eq!(json["security_scan"], 1.0);
}

// ---------------------------------------------------------------------------
// report / outcomes before the first cycle
// ---------------------------------------------------------------------------

#[test]
fn report_before_first_cycle_fails() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .arg("report")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no cycles recorded"));

    // The failed read must not create the outcome database.
    assert!(!paths::outcomes_db_path(dir.path()).exists());
}

#[test]
fn outcomes_empty_without_creating_db() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .arg("outcomes")
        .assert()
        .success()
        .stdout(predicate::str::contains("No outcomes recorded yet"));

    assert!(!paths::outcomes_db_path(dir.path()).exists());
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

#[test]
fn config_show_prints_effective_settings() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme"))
        .stdout(predicate::str::contains("api.github.com"));
}

#[test]
fn config_validate_accepts_defaults() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    steward(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_fails_on_error_level_warnings() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let mut config = Config::load(dir.path()).unwrap();
    config.learning.low_threshold = 0.9; // >= high_threshold 0.8
    config.save(dir.path()).unwrap();

    steward(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stdout(predicate::str::contains("overlap"))
        .stderr(predicate::str::contains("config validation found errors"));
}

// ---------------------------------------------------------------------------
// run: trigger validation
// ---------------------------------------------------------------------------

#[test]
fn run_validates_action_before_initialization() {
    let dir = TempDir::new().unwrap();
    // Deliberately not initialized: the bogus action must fail first.

    steward(&dir)
        .args(["run", "--action", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown action type: bogus"));
}

#[test]
fn run_rejects_malformed_target() {
    let dir = TempDir::new().unwrap();

    steward(&dir)
        .args(["run", "--target", "Bad Name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid repository name"));
}

#[test]
fn run_requires_initialization() {
    let dir = TempDir::new().unwrap();

    steward(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// run: dry run against a mock forge
// ---------------------------------------------------------------------------

#[test]
fn dry_run_plans_without_persisting() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let mut server = mockito::Server::new();
    use_mock_forge(&dir, &server.url());

    // One stale, vulnerable repo so the plan is non-empty.
    let pushed = chrono::Utc::now() - chrono::Duration::days(200);
    server
        .mock("GET", "/orgs/acme/repos?type=all&per_page=100&page=1")
        .with_status(200)
        .with_body(
            serde_json::json!([{
                "name": "legacy",
                "description": "Old payments service",
                "pushed_at": pushed.to_rfc3339(),
                "language": "Rust",
                "archived": false,
                "fork": false
            }])
            .to_string(),
        )
        .create();
    server
        .mock("GET", "/repos/acme/legacy/readme")
        .with_status(404)
        .create();
    server
        .mock("GET", "/repos/acme/legacy/contributors?per_page=100&anon=false")
        .with_status(200)
        .with_body(r#"[{"login": "alice"}]"#)
        .create();
    server
        .mock(
            "GET",
            "/repos/acme/legacy/dependabot/alerts?state=open&per_page=100",
        )
        .with_status(200)
        .with_body(
            r#"[{"state": "open", "security_advisory": {"ghsa_id": "GHSA-aaaa-bbbb-cccc"}}]"#,
        )
        .create();

    steward(&dir)
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(dry run)"))
        .stdout(predicate::str::contains("legacy"))
        .stdout(predicate::str::contains("nothing persisted"));

    // A dry run leaves no trace on disk.
    let snapshots: Vec<_> = std::fs::read_dir(dir.path().join(paths::SNAPSHOTS_DIR))
        .unwrap()
        .collect();
    assert!(snapshots.is_empty());
    assert!(!paths::outcomes_db_path(dir.path()).exists());
    assert!(!paths::weights_path(dir.path()).exists());
    assert!(!paths::insights_path(dir.path()).exists());
}

// ---------------------------------------------------------------------------
// run: full cycle against a mock forge
// ---------------------------------------------------------------------------

#[test]
fn full_cycle_executes_records_and_reports() {
    let dir = TempDir::new().unwrap();
    init_project(&dir);

    let mut server = mockito::Server::new();
    use_mock_forge(&dir, &server.url());

    let pushed = chrono::Utc::now() - chrono::Duration::days(200);
    let repo_json = serde_json::json!({
        "name": "legacy",
        "description": "Old payments service",
        "pushed_at": pushed.to_rfc3339(),
        "language": "Rust",
        "archived": false,
        "fork": false,
        "open_issues_count": 3
    });

    // Snapshot collection, plus the analyze action's re-listing.
    server
        .mock("GET", "/orgs/acme/repos?type=all&per_page=100&page=1")
        .with_status(200)
        .with_body(serde_json::json!([repo_json]).to_string())
        .create();
    server
        .mock("GET", "/repos/acme/legacy/readme")
        .with_status(404)
        .create();
    server
        .mock("GET", "/repos/acme/legacy/contributors?per_page=100&anon=false")
        .with_status(200)
        .with_body(r#"[{"login": "alice"}]"#)
        .create();
    server
        .mock(
            "GET",
            "/repos/acme/legacy/dependabot/alerts?state=open&per_page=100",
        )
        .with_status(200)
        .with_body(
            r#"[{"state": "open", "security_advisory": {"ghsa_id": "GHSA-aaaa-bbbb-cccc"}}]"#,
        )
        .create();
    // Sync action: single-repo metadata.
    server
        .mock("GET", "/repos/acme/legacy")
        .with_status(200)
        .with_body(repo_json.to_string())
        .create();
    // Health check: no existing issue, then the idempotent create.
    server
        .mock("GET", "/repos/acme/legacy/issues?state=open&per_page=100")
        .with_status(200)
        .with_body("[]")
        .create();
    server
        .mock("POST", "/repos/acme/legacy/issues")
        .with_status(201)
        .with_body(r#"{"number": 42, "title": "Fleet health check", "state": "open"}"#)
        .create();

    steward(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Report: excellent"));

    // Cycle evidence on disk: snapshot, outcomes, learned weights.
    let snapshots: Vec<_> = std::fs::read_dir(dir.path().join(paths::SNAPSHOTS_DIR))
        .unwrap()
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert!(paths::outcomes_db_path(dir.path()).exists());
    assert!(paths::weights_path(dir.path()).exists());

    steward(&dir)
        .arg("outcomes")
        .assert()
        .success()
        .stdout(predicate::str::contains("security scan of legacy"))
        .stdout(predicate::str::contains("opened health-check issue #42"));

    steward(&dir)
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: excellent"))
        .stdout(predicate::str::contains("100% success"));

    steward(&dir)
        .arg("weights")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"));
}
