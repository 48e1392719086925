//! CLI subprocess integration tests.
//!
//! These tests invoke the `fleetlog` binary against a temporary store and
//! check exit codes, human output, and JSON output.

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};

fn fleetlog(store: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fleetlog"));
    cmd.arg("--store")
        .arg(store)
        .arg("--config")
        .arg(store.join("absent-config.toml"))
        .env_remove("FLEETLOG_LOG");
    cmd
}

fn run(store: &Path, args: &[&str]) -> Output {
    fleetlog(store).args(args).output().unwrap()
}

fn run_json(store: &Path, args: &[&str]) -> Value {
    let output = fleetlog(store).arg("--json").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_owned()
}

struct Seeded {
    driver: String,
    vehicle: String,
    purpose: String,
}

fn seed(store: &Path) -> Seeded {
    let driver = run_json(store, &["user", "add", "Paulo", "--role", "operator"]);
    let vehicle = run_json(
        store,
        &[
            "vehicle",
            "add",
            "Toyota Corolla",
            "abc-1234",
            "--year",
            "2022",
            "--fuel",
            "gasoline",
            "--odometer",
            "55000",
        ],
    );
    let purpose = run_json(store, &["purpose", "add", "Client visit"]);
    run_json(store, &["params", "set-price", "gasoline", "5.89"]);
    Seeded {
        driver: id_of(&driver),
        vehicle: id_of(&vehicle),
        purpose: id_of(&purpose),
    }
}

#[test]
fn cli_version_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_fleetlog"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("fleetlog"));
}

#[test]
fn cli_help_lists_subcommands() {
    let output = Command::new(env!("CARGO_BIN_EXE_fleetlog"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["vehicle", "trip", "report", "verify-store"] {
        assert!(stdout.contains(cmd), "help must list '{cmd}'");
    }
}

#[test]
fn cli_completions_bash() {
    let output = Command::new(env!("CARGO_BIN_EXE_fleetlog"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("fleetlog"));
}

#[test]
fn cli_full_trip_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    let s = seed(store);

    let trip = run_json(
        store,
        &[
            "--as",
            &s.driver,
            "trip",
            "request",
            &s.vehicle,
            &s.purpose,
            "Client Site",
        ],
    );
    assert_eq!(trip["status"], "Pending");
    let trip_id = id_of(&trip);

    let approved = run_json(store, &["--as", &s.driver, "trip", "approve", &trip_id]);
    assert_eq!(approved["status"], "Approved");
    assert_eq!(approved["start_odometer"], 55000);

    let done = run_json(
        store,
        &[
            "--as",
            &s.driver,
            "trip",
            "complete",
            &trip_id,
            "--end-odometer",
            "55150",
            "--liters",
            "12.5",
            "--fuel",
            "gasoline",
        ],
    );
    assert_eq!(done["status"], "Completed");
    assert_eq!(done["distance_km"], 150);
    let cost = done["refuel_cost"].as_f64().unwrap();
    assert!((cost - 73.625).abs() < 1e-9);

    let vehicle = run_json(store, &["vehicle", "show", &s.vehicle]);
    assert_eq!(vehicle["current_odometer"], 55150);
    assert_eq!(vehicle["plate"], "ABC-1234");

    let report = run_json(store, &["report", "vehicle"]);
    assert_eq!(report["totals"]["distance_km"], 150);
    assert_eq!(report["rows"][0]["label"], "Toyota Corolla (ABC-1234)");

    let output = run(store, &["verify-store"]);
    assert!(output.status.success());
}

#[test]
fn cli_invalid_completion_exits_with_validation_code() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    let s = seed(store);
    let trip = run_json(
        store,
        &[
            "--as",
            &s.driver,
            "trip",
            "request",
            &s.vehicle,
            &s.purpose,
            "Depot",
        ],
    );
    let trip_id = id_of(&trip);
    run_json(store, &["--as", &s.driver, "trip", "approve", &trip_id]);

    let output = run(
        store,
        &[
            "--as",
            &s.driver,
            "trip",
            "complete",
            &trip_id,
            "--end-odometer",
            "54990",
        ],
    );
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid final odometer"), "stderr: {stderr}");

    let shown = run_json(store, &["trip", "show", &trip_id]);
    assert_eq!(shown["status"], "Approved");
}

#[test]
fn cli_repeated_approval_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    let s = seed(store);
    let trip = run_json(
        store,
        &[
            "--as",
            &s.driver,
            "trip",
            "request",
            &s.vehicle,
            &s.purpose,
            "Depot",
        ],
    );
    let trip_id = id_of(&trip);
    run_json(store, &["--as", &s.driver, "trip", "deny", &trip_id]);

    let output = run(store, &["--as", &s.driver, "trip", "approve", &trip_id]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid state transition"));
}

#[test]
fn cli_trip_commands_require_acting_user() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    let s = seed(store);
    let output = run(store, &["trip", "request", &s.vehicle, &s.purpose, "Depot"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--as"));
}

#[test]
fn cli_unknown_trip_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["trip", "show", "trip-000000000000"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("trip not found"));
}

#[test]
fn cli_duplicate_plate_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    seed(store);
    let output = run(
        store,
        &[
            "vehicle",
            "add",
            "Other",
            "ABC-1234",
            "--year",
            "2020",
            "--fuel",
            "diesel",
        ],
    );
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_list_json_output_stable() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    let s = seed(store);

    let vehicles = run_json(store, &["vehicle", "list"]);
    let list = vehicles.as_array().unwrap();
    assert_eq!(list.len(), 1);
    for key in ["id", "model", "plate", "year", "fuel_type", "current_odometer", "active"] {
        assert!(list[0].get(key).is_some(), "vehicle JSON missing '{key}'");
    }

    run_json(
        store,
        &[
            "--as",
            &s.driver,
            "trip",
            "request",
            &s.vehicle,
            &s.purpose,
            "Depot",
        ],
    );
    let pending = run_json(store, &["trip", "list", "--status", "pending"]);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    let completed = run_json(store, &["trip", "list", "--status", "completed"]);
    assert!(completed.as_array().unwrap().is_empty());

    let dashboard = run_json(store, &["dashboard"]);
    assert_eq!(dashboard["pending"], 1);
    assert_eq!(dashboard["vehicles"], 1);
}

#[test]
fn cli_maintenance_report() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    let s = seed(store);
    run_json(
        store,
        &[
            "maintenance",
            "add",
            &s.vehicle,
            "Oil change",
            "--cost",
            "180.40",
            "--date",
            "2025-03-02",
        ],
    );
    run_json(
        store,
        &[
            "maintenance",
            "add",
            &s.vehicle,
            "Tires",
            "--cost",
            "920.10",
            "--date",
            "2025-04-10",
        ],
    );

    let report = run_json(store, &["report", "maintenance"]);
    assert_eq!(report["records"], 2);
    let total = report["total_cost"].as_f64().unwrap();
    assert!((total - 1100.5).abs() < 1e-9);

    let output = run(store, &["report", "maintenance"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("1100.50"));
}

#[test]
fn cli_verify_store_clean() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path();
    seed(store);
    let report = run_json(store, &["verify-store"]);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["checked"], report["passed"]);
}
