//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("vincal");
    cmd.env_remove("VINCAL_PORT")
        .env_remove("VINCAL_BOARD")
        .env_remove("VINCAL_FIRMWARE");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("vincal"))
        .stdout(predicate::str::contains("calibrate"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vincal"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn list_ports_json_returns_valid_json() {
    let mut cmd = cli_cmd();
    let output = cmd
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("stdout should be JSON");
    let ports = parsed
        .as_array()
        .expect("should be a JSON array");
    for port in ports {
        assert_ne!(port["kind"], "Bluetooth");
    }
}

#[test]
fn render_prints_function_to_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["render", "--coefficients", "0.001234,-0.0256,1.0825,0.1375"])
        .assert()
        .success()
        .stdout(predicate::str::diff(
            "float calibrateVIN(float vin) {\n    return (0.001234 * vin * vin * vin) + (-0.025600 * vin * vin) + (1.082500 * vin) + 0.137500;\n}\n",
        ));
}

#[test]
fn render_with_wrong_coefficient_count_is_usage_error() {
    let mut cmd = cli_cmd();
    cmd.args(["render", "--coefficients", "1,2,3"])
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Expected 4 coefficients"));
}

#[test]
fn invalid_board_is_usage_error() {
    let mut cmd = cli_cmd();
    cmd.args(["calibrate", "--board", "42"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("expected 4 digits"));
}

#[test]
fn invalid_board_from_env_is_usage_error() {
    let mut cmd = cli_cmd();
    cmd.env("VINCAL_BOARD", "abcd")
        .arg("evaluate")
        .assert()
        .code(2);
}

#[test]
fn calibrate_without_terminal_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .env("NO_COLOR", "1")
        .args(["calibrate", "--board", "0042", "--port", "/dev/null-vincal"])
        .write_stdin("")
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("terminal"))
        .stderr(predicate::str::contains("--port").not())
        .stderr(predicate::str::contains("\u{1b}[").not());

    // Nothing is logged before the session starts.
    assert!(!dir.path().join("tests").exists());
}

#[test]
fn interactive_without_terminal_is_usage_error() {
    let dir = tempdir().expect("tempdir should be created");
    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("terminal"));
}

#[test]
fn broken_local_config_falls_back_to_defaults() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("vincal.toml"), "[serial\nport = ").expect("write config");

    let mut cmd = cli_cmd();
    cmd.current_dir(dir.path())
        .args(["evaluate", "--board", "0042"])
        .write_stdin("")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to parse config file"));
}
