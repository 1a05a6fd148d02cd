use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn top_level_help_lists_subcommands() {
    let mut cmd = Command::cargo_bin("netwarden").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("db"));
}

#[test]
fn serve_help_documents_mcp_flags() {
    let mut cmd = Command::cargo_bin("netwarden").unwrap();
    cmd.args(["serve", "--help"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--mcp-stdio"))
        .stdout(predicate::str::contains("--mcp-sse-bind"));
}

#[test]
fn missing_subcommand_is_an_error() {
    let mut cmd = Command::cargo_bin("netwarden").unwrap();
    cmd.assert().failure();
}
