use anyhow::{Context, Result};
use chrono::Utc;
use std::time::Duration;

use crate::accounts::{AccountSource, ParsedLine};
use crate::config::AppConfig;
use crate::mailer::{ReportMailer, SmtpMailer};
use crate::metrics::RunStats;
use crate::probe::{ImapProbe, MailboxProbe, ProbeOutcome};
use crate::quota;
use crate::report::ReportBuilder;
use crate::stats::{RetentionAction, StatsStore, UsageRecord};

pub struct Service {
    config: AppConfig,
}

impl Service {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Runs one probe-and-report cycle against the real IMAP servers and
    /// SMTP relay.
    pub async fn run(self) -> Result<()> {
        let probe = ImapProbe::new(Duration::from_secs(self.config.probe_timeout_seconds));
        let mailer = SmtpMailer::from_config(&self.config.smtp)?;
        self.run_with(&probe, &mailer).await?;
        Ok(())
    }

    /// The orchestration core, driven by injected collaborators. Accounts
    /// are processed strictly in list order; a malformed line or a rejected
    /// login is reported and skipped, while storage I/O failures and probe
    /// transport failures abort the run.
    pub async fn run_with(
        &self,
        probe: &dyn MailboxProbe,
        mailer: &dyn ReportMailer,
    ) -> Result<RunStats> {
        let mut stats = RunStats::default();
        let mut report = ReportBuilder::new();

        let (mut store, retention) = StatsStore::open(
            &self.config.stats_file,
            self.config.max_stat_lines,
            self.config.trunc_stat_lines,
        )
        .await?;
        match &retention {
            RetentionAction::None => {}
            RetentionAction::Truncated { dropped, retained } => {
                tracing::info!(
                    service = %self.config.service_name,
                    dropped,
                    retained,
                    file = %self.config.stats_file,
                    "statistics file truncated"
                );
                report.push_advisory(format!(
                    "statistics file truncated: dropped {dropped} oldest rows, {retained} retained"
                ));
            }
            RetentionAction::Unlinked => {
                tracing::info!(
                    service = %self.config.service_name,
                    file = %self.config.stats_file,
                    "statistics file removed"
                );
                report.push_advisory(
                    "statistics file removed: truncation window exceeded its contents",
                );
            }
        }

        let account_list = tokio::fs::read_to_string(&self.config.accounts_file)
            .await
            .with_context(|| {
                format!("failed to read account list {}", self.config.accounts_file)
            })?;

        for parsed in AccountSource::new(&account_list) {
            match parsed {
                ParsedLine::Syntax { line } => {
                    stats.record_syntax_error();
                    report.push_syntax_error(line);
                }
                ParsedLine::Account(account) => {
                    stats.record_probe();
                    tracing::info!(
                        service = %self.config.service_name,
                        server = %account.server,
                        username = %account.username,
                        "probing account"
                    );
                    match probe.probe(&account).await? {
                        ProbeOutcome::LoginFailed => {
                            stats.record_login_failure();
                            report.push_login_failure(&account);
                        }
                        ProbeOutcome::Usage {
                            message_count,
                            total_bytes,
                        } => {
                            let (quota_bytes, percent) =
                                quota::compute_usage(total_bytes, account.quota_mb);
                            let warning =
                                quota::is_warning(percent, self.config.warn_threshold_percent);
                            report.push_account(
                                &account,
                                message_count,
                                total_bytes,
                                percent,
                                warning,
                            );
                            store
                                .append(&UsageRecord {
                                    timestamp: Utc::now().timestamp(),
                                    message_count,
                                    total_bytes,
                                    percent,
                                    quota_bytes,
                                    username: account.username.clone(),
                                    server: account.server.clone(),
                                })
                                .await?;
                            stats.record_row();
                        }
                    }
                }
            }
        }

        if stats.accounts_probed > self.config.trunc_stat_lines as u64 {
            report.push_advisory(format!(
                "{} accounts per run exceeds the {} rows dropped per rotation; the statistics file can grow without bound",
                stats.accounts_probed, self.config.trunc_stat_lines
            ));
        }

        let subject = report.subject();
        let body = report.finalize();
        tokio::fs::write(&self.config.report_file, &body)
            .await
            .with_context(|| format!("failed to write report {}", self.config.report_file))?;

        tracing::info!(
            service = %self.config.service_name,
            accounts = stats.accounts_probed,
            syntax_errors = stats.syntax_errors,
            login_failures = stats.login_failures,
            rows = stats.records_written,
            "quota run completed"
        );

        mailer
            .send(&subject, &body)
            .await
            .context("failed to deliver the report")?;

        Ok(stats)
    }
}
