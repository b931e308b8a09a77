use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a minimal configuration pointing into the temp dir and returns
/// its path.
pub fn write_config(dir: &Path, accounts_file: &Path) -> PathBuf {
    let cfg_path = dir.join("quotamon.toml");
    let cfg = format!(
        r#"service_name = "check-test"
accounts_file = "{accounts}"
report_file = "{report}"
stats_file = "{stats}"

[smtp]
host = "smtp.example.com"
username = "reporter@example.com"
password = "secret"
from = "reporter@example.com"
to = "postmaster@example.com"
"#,
        accounts = accounts_file.display(),
        report = dir.join("report.txt").display(),
        stats = dir.join("stats.csv").display(),
    );
    fs::write(&cfg_path, cfg).expect("write config");
    cfg_path
}

/// Runs `quotamon --check` against an account list with the given contents.
pub fn check_accounts_file(contents: &str) -> (TempDir, assert_cmd::assert::Assert) {
    let tmp = tempfile::tempdir().expect("create tempdir");
    let accounts = tmp.path().join("accounts.lst");
    fs::write(&accounts, contents).expect("write accounts");
    let cfg_path = write_config(tmp.path(), &accounts);
    let assert = Command::new(assert_cmd::cargo::cargo_bin!("quotamon"))
        .arg("--config")
        .arg(&cfg_path)
        .arg("--check")
        .assert();
    (tmp, assert)
}
