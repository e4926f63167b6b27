use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_demo_run_reports_stats() {
    let mut cmd = Command::new(cargo_bin!("batchpay"));
    cmd.args(["--count", "200", "--addresses", "4", "--batch-size", "50"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("submitted:        200"))
        .stdout(predicate::str::contains("max tps:"));
}

#[test]
fn test_demo_rejects_single_address() {
    let mut cmd = Command::new(cargo_bin!("batchpay"));
    cmd.args(["--count", "1", "--addresses", "1"]);
    cmd.assert().failure();
}
