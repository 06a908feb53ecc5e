//! Binary argument handling and failure exits

use assert_cmd::Command;
use std::io::Write;

fn binary() -> Command {
    Command::cargo_bin("catalog-scraper").unwrap()
}

fn config_file(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_help_lists_commands() {
    let output = binary().arg("--help").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["category", "categories", "scan-stores", "serve"] {
        assert!(stdout.contains(command), "missing {command} in:\n{stdout}");
    }
}

#[test]
fn test_missing_config_exits_with_failure() {
    let dir = tempfile::TempDir::new().unwrap();
    binary()
        .args(["--config"])
        .arg(dir.path().join("nope.yaml"))
        .args(["scan-stores", "--from", "1", "--to", "2"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_scan_rejects_bad_range() {
    let config = config_file("env: local\n");
    binary()
        .arg("--config")
        .arg(config.path())
        .args(["scan-stores", "--from", "10", "--to", "5"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_category_requires_store_and_category() {
    let config = config_file("env: local\nlocal:\n  cli:\n    output_file: out.json\n");
    binary()
        .arg("--config")
        .arg(config.path())
        .arg("category")
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_unknown_proxy_mode_is_rejected_before_any_request() {
    let config = config_file(
        "env: local\nlocal:\n  upstream: { store_id: 86 }\n  cli: { category_id: 5, output_file: out.json }\n  proxy: { mode: socks }\n",
    );
    binary()
        .arg("--config")
        .arg(config.path())
        .arg("category")
        .assert()
        .failure()
        .code(1);
}
