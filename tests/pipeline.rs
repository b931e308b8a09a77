use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tempfile::tempdir;

use quotamon::accounts::Account;
use quotamon::config::{AppConfig, SmtpConfig};
use quotamon::mailer::ReportMailer;
use quotamon::probe::{MailboxProbe, ProbeOutcome};
use quotamon::stats::STATS_HEADER;
use quotamon::Service;

/// Probe that answers from a username-keyed script instead of the network.
struct ScriptedProbe {
    outcomes: HashMap<String, ProbeOutcome>,
}

impl ScriptedProbe {
    fn new(outcomes: &[(&str, ProbeOutcome)]) -> Self {
        Self {
            outcomes: outcomes
                .iter()
                .map(|(user, outcome)| (user.to_string(), outcome.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl MailboxProbe for ScriptedProbe {
    async fn probe(&self, account: &Account) -> Result<ProbeOutcome> {
        self.outcomes
            .get(&account.username)
            .cloned()
            .ok_or_else(|| anyhow!("unexpected account {}", account.username))
    }
}

#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingMailer {
    fn only_message(&self) -> (String, String) {
        let sent = self.sent.lock().expect("mailer lock");
        assert_eq!(sent.len(), 1, "expected exactly one delivery");
        sent[0].clone()
    }
}

#[async_trait]
impl ReportMailer for CapturingMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .expect("mailer lock")
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

struct FailingMailer;

#[async_trait]
impl ReportMailer for FailingMailer {
    async fn send(&self, _subject: &str, _body: &str) -> Result<()> {
        Err(anyhow!("relay refused the message"))
    }
}

fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        service_name: "pipeline-test".to_string(),
        log_level: "info".to_string(),
        accounts_file: dir.join("accounts.lst").to_string_lossy().to_string(),
        report_file: dir.join("report.txt").to_string_lossy().to_string(),
        stats_file: dir.join("stats.csv").to_string_lossy().to_string(),
        max_stat_lines: 1000,
        trunc_stat_lines: 100,
        warn_threshold_percent: 85,
        probe_timeout_seconds: 30,
        smtp: SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 465,
            username: "reporter@example.com".to_string(),
            password: "secret".to_string(),
            from: "reporter@example.com".to_string(),
            to: "postmaster@example.com".to_string(),
        },
    }
}

fn seed_stats(path: &Path, data_rows: usize) -> Vec<String> {
    let rows: Vec<String> = (0..data_rows)
        .map(|i| {
            format!(
                "{},1,1000,1,1048576,seed{}@x.com,imap.example.com",
                1_700_000_000 + i as i64,
                i
            )
        })
        .collect();
    let mut contents = String::from(STATS_HEADER);
    contents.push('\n');
    for row in &rows {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(path, contents).expect("seed stats");
    rows
}

fn data_lines(path: &Path) -> Vec<String> {
    let content = fs::read_to_string(path).expect("read stats");
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some(STATS_HEADER), "header must come first");
    lines.map(str::to_string).collect()
}

#[tokio::test]
async fn end_to_end_report_and_stats() {
    let tmp = tempdir().expect("temp dir");
    let config = test_config(tmp.path());
    fs::write(
        &config.accounts_file,
        "a.example.com,u1@x.com,pw,1024\nbad-line\nb.example.com,u2@x.com,pw,2048\n",
    )
    .expect("write accounts");

    let probe = ScriptedProbe::new(&[
        (
            "u1@x.com",
            ProbeOutcome::Usage {
                message_count: 100,
                total_bytes: 524_288_000,
            },
        ),
        (
            "u2@x.com",
            ProbeOutcome::Usage {
                message_count: 10,
                total_bytes: 52_428_800,
            },
        ),
    ]);
    let mailer = CapturingMailer::default();

    let stats = Service::new(config.clone())
        .run_with(&probe, &mailer)
        .await
        .expect("run");
    assert_eq!(stats.accounts_probed, 2);
    assert_eq!(stats.syntax_errors, 1);
    assert_eq!(stats.login_failures, 0);
    assert_eq!(stats.records_written, 2);

    let (subject, body) = mailer.only_message();
    assert!(subject.starts_with("Mailbox quota report "));
    assert!(body.contains(
        "100 msgs, 524288000 bytes (500 MB), 49% of 1024 MB quota, u1@x.com on a.example.com: OK"
    ));
    assert!(body.contains(
        "10 msgs, 52428800 bytes (50 MB), 2% of 2048 MB quota, u2@x.com on b.example.com: OK"
    ));
    assert!(body.contains("line 2: malformed account entry, skipped"));

    // The on-disk report is the same buffer that was mailed.
    let written = fs::read_to_string(&config.report_file).expect("read report");
    assert_eq!(written, body);

    let rows = data_lines(Path::new(&config.stats_file));
    assert_eq!(rows.len(), 2);
    assert!(rows[0].ends_with(",100,524288000,49,1073741824,u1@x.com,a.example.com"));
    assert!(rows[1].ends_with(",10,52428800,2,2147483648,u2@x.com,b.example.com"));
}

#[tokio::test]
async fn warning_requires_strictly_more_than_threshold() {
    let tmp = tempdir().expect("temp dir");
    let config = test_config(tmp.path());
    fs::write(
        &config.accounts_file,
        "a.example.com,at@x.com,pw,100\na.example.com,over@x.com,pw,100\n",
    )
    .expect("write accounts");

    // 100 MB quota: 89_128_960 bytes is exactly 85%, 90_177_536 is 86%.
    let probe = ScriptedProbe::new(&[
        (
            "at@x.com",
            ProbeOutcome::Usage {
                message_count: 1,
                total_bytes: 89_128_960,
            },
        ),
        (
            "over@x.com",
            ProbeOutcome::Usage {
                message_count: 1,
                total_bytes: 90_177_536,
            },
        ),
    ]);
    let mailer = CapturingMailer::default();

    Service::new(config)
        .run_with(&probe, &mailer)
        .await
        .expect("run");

    let (_, body) = mailer.only_message();
    assert!(body.contains("85% of 100 MB quota, at@x.com on a.example.com: OK"));
    assert!(body.contains("86% of 100 MB quota, over@x.com on a.example.com: WARNING"));
}

#[tokio::test]
async fn login_failure_is_reported_and_writes_no_row() {
    let tmp = tempdir().expect("temp dir");
    let config = test_config(tmp.path());
    fs::write(
        &config.accounts_file,
        "a.example.com,locked@x.com,pw,100\nb.example.com,open@x.com,pw,100\n",
    )
    .expect("write accounts");

    let probe = ScriptedProbe::new(&[
        ("locked@x.com", ProbeOutcome::LoginFailed),
        (
            "open@x.com",
            ProbeOutcome::Usage {
                message_count: 3,
                total_bytes: 3_145_728,
            },
        ),
    ]);
    let mailer = CapturingMailer::default();

    let stats = Service::new(config.clone())
        .run_with(&probe, &mailer)
        .await
        .expect("run");
    assert_eq!(stats.accounts_probed, 2);
    assert_eq!(stats.login_failures, 1);
    assert_eq!(stats.records_written, 1);

    let (_, body) = mailer.only_message();
    assert!(body.contains("login failed for locked@x.com on a.example.com"));

    let rows = data_lines(Path::new(&config.stats_file));
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("open@x.com"));
}

#[tokio::test]
async fn rotation_truncates_before_new_rows_are_appended() {
    let tmp = tempdir().expect("temp dir");
    let mut config = test_config(tmp.path());
    config.max_stat_lines = 10;
    config.trunc_stat_lines = 3;
    let seeded = seed_stats(Path::new(&config.stats_file), 12);
    fs::write(&config.accounts_file, "a.example.com,u1@x.com,pw,100\n").expect("write accounts");

    let probe = ScriptedProbe::new(&[(
        "u1@x.com",
        ProbeOutcome::Usage {
            message_count: 1,
            total_bytes: 1_048_576,
        },
    )]);
    let mailer = CapturingMailer::default();

    Service::new(config.clone())
        .run_with(&probe, &mailer)
        .await
        .expect("run");

    let (_, body) = mailer.only_message();
    assert!(body.contains("statistics file truncated: dropped 3 oldest rows, 9 retained"));

    let rows = data_lines(Path::new(&config.stats_file));
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0], seeded[3]);
    assert_eq!(rows[8], seeded[11]);
    assert!(rows[9].contains("u1@x.com"));
}

#[tokio::test]
async fn oversized_window_unlinks_instead_of_truncating() {
    let tmp = tempdir().expect("temp dir");
    let mut config = test_config(tmp.path());
    config.max_stat_lines = 10;
    config.trunc_stat_lines = 12;
    seed_stats(Path::new(&config.stats_file), 11);
    fs::write(&config.accounts_file, "a.example.com,u1@x.com,pw,100\n").expect("write accounts");

    let probe = ScriptedProbe::new(&[(
        "u1@x.com",
        ProbeOutcome::Usage {
            message_count: 1,
            total_bytes: 1_048_576,
        },
    )]);
    let mailer = CapturingMailer::default();

    Service::new(config.clone())
        .run_with(&probe, &mailer)
        .await
        .expect("run");

    let (_, body) = mailer.only_message();
    assert!(body.contains("statistics file removed: truncation window exceeded its contents"));

    let rows = data_lines(Path::new(&config.stats_file));
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("u1@x.com"));
}

#[tokio::test]
async fn more_accounts_than_window_raises_growth_advisory() {
    let tmp = tempdir().expect("temp dir");
    let mut config = test_config(tmp.path());
    config.trunc_stat_lines = 1;
    fs::write(
        &config.accounts_file,
        "a.example.com,u1@x.com,pw,100\nb.example.com,u2@x.com,pw,100\n",
    )
    .expect("write accounts");

    let usage = ProbeOutcome::Usage {
        message_count: 1,
        total_bytes: 1_048_576,
    };
    let probe = ScriptedProbe::new(&[("u1@x.com", usage.clone()), ("u2@x.com", usage)]);
    let mailer = CapturingMailer::default();

    Service::new(config)
        .run_with(&probe, &mailer)
        .await
        .expect("run");

    let (_, body) = mailer.only_message();
    assert!(body.contains("can grow without bound"));
}

#[tokio::test]
async fn delivery_failure_leaves_committed_files_behind() {
    let tmp = tempdir().expect("temp dir");
    let config = test_config(tmp.path());
    fs::write(&config.accounts_file, "a.example.com,u1@x.com,pw,100\n").expect("write accounts");

    let probe = ScriptedProbe::new(&[(
        "u1@x.com",
        ProbeOutcome::Usage {
            message_count: 1,
            total_bytes: 1_048_576,
        },
    )]);

    let err = Service::new(config.clone())
        .run_with(&probe, &FailingMailer)
        .await
        .expect_err("delivery must fail");
    assert!(err.to_string().contains("failed to deliver the report"));

    // The statistics rows and the on-disk report were committed before the
    // send and stay committed.
    let rows = data_lines(Path::new(&config.stats_file));
    assert_eq!(rows.len(), 1);
    assert!(Path::new(&config.report_file).exists());
}
