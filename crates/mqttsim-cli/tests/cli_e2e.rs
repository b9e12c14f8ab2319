//! Black-box tests for the `mqtt-sim` binary, in the shape of the
//! teacher's own `shipper-cli/tests/cli_e2e.rs`: spawn the real binary
//! against a config written to a temp directory and assert on its exit
//! code and stdout/stderr. No broker is started here — these cover
//! `validate` only, since `run` needs a live MQTT connection.

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

fn write_config(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write config");
    path
}

fn mqtt_sim() -> Command {
    Command::cargo_bin("mqtt-sim").expect("binary builds")
}

#[test]
fn version_prints_package_version() {
    mqtt_sim()
        .arg("version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn validate_accepts_a_well_formed_config() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "plan.json",
        r#"{
            "schema_version": 1,
            "brokers": [{"name": "main", "host": "localhost", "port": 1883, "keepalive": 60}],
            "streams": [{
                "broker": "main",
                "topic": "devices/status",
                "interval": 1.0,
                "payload": {"kind": "text", "value": "hello"}
            }]
        }"#,
    );

    mqtt_sim()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("valid"));
}

#[test]
fn validate_rejects_an_unknown_payload_kind() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "plan.json",
        r#"{
            "schema_version": 1,
            "brokers": [{"name": "main", "host": "localhost", "port": 1883, "keepalive": 60}],
            "streams": [{
                "broker": "main",
                "topic": "devices/status",
                "interval": 1.0,
                "payload": {"kind": "not_a_real_kind"}
            }]
        }"#,
    );

    mqtt_sim()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("payload.kind"));
}

#[test]
fn validate_rejects_a_stream_referencing_an_unknown_broker() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "plan.json",
        r#"{
            "schema_version": 1,
            "brokers": [{"name": "main", "host": "localhost", "port": 1883, "keepalive": 60}],
            "streams": [{
                "broker": "does-not-exist",
                "topic": "devices/status",
                "interval": 1.0,
                "payload": {"kind": "text", "value": "hello"}
            }]
        }"#,
    );

    mqtt_sim()
        .args(["validate", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("broker"));
}

#[test]
fn validate_reports_exit_code_two_on_missing_file() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.json");

    mqtt_sim()
        .args(["validate", "--config"])
        .arg(&missing)
        .assert()
        .code(2);
}

#[test]
fn run_rejects_fail_fast_and_keep_going_together() {
    let dir = tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "plan.json",
        r#"{
            "schema_version": 1,
            "brokers": [{"name": "main", "host": "localhost", "port": 1883, "keepalive": 60}],
            "streams": [{
                "broker": "main",
                "topic": "devices/status",
                "interval": 1.0,
                "payload": {"kind": "text", "value": "hello"}
            }]
        }"#,
    );

    mqtt_sim()
        .args(["run", "--config"])
        .arg(&config)
        .args(["--fail-fast", "--keep-going"])
        .assert()
        .failure();
}
