use assert_cmd::Command;

// Settings are validated before the terminal is touched, so these run fine
// without a TTY.

#[test]
fn rejects_zero_back() {
    Command::cargo_bin("nback")
        .unwrap()
        .args(["-n", "0", "--config", "/nonexistent/nback/config.json"])
        .assert()
        .failure();
}

#[test]
fn rejects_sequence_not_longer_than_n() {
    Command::cargo_bin("nback")
        .unwrap()
        .args(["-n", "2", "-l", "2", "--config", "/nonexistent/nback/config.json"])
        .assert()
        .failure();
}

#[test]
fn rejects_empty_number_range() {
    Command::cargo_bin("nback")
        .unwrap()
        .args(["--min", "9", "--max", "1", "--config", "/nonexistent/nback/config.json"])
        .assert()
        .failure();
}

#[test]
fn prints_help() {
    let output = Command::cargo_bin("nback")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("--interval-ms"));
    assert!(text.contains("--subject"));
}
