use chrono::{DateTime, Utc};

use crate::accounts::Account;
use crate::quota;

/// Accumulates the outgoing report for one run. The buffer is handed out
/// only as a single finished body; nothing is delivered incrementally.
pub struct ReportBuilder {
    started_at: DateTime<Utc>,
    lines: Vec<String>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Starts a report with an explicit timestamp; tests use this to pin
    /// the heading.
    pub fn at(started_at: DateTime<Utc>) -> Self {
        let heading = format!("Mailbox quota report - {}", started_at.to_rfc2822());
        Self {
            started_at,
            lines: vec![heading, String::new()],
        }
    }

    pub fn subject(&self) -> String {
        format!(
            "Mailbox quota report {}",
            self.started_at.format("%Y-%m-%d %H:%M")
        )
    }

    pub fn push_account(
        &mut self,
        account: &Account,
        message_count: u32,
        total_bytes: u64,
        percent: u32,
        warning: bool,
    ) {
        let status = if warning { "WARNING" } else { "OK" };
        self.lines.push(format!(
            "{} msgs, {} bytes ({} MB), {}% of {} MB quota, {} on {}: {}",
            message_count,
            total_bytes,
            quota::whole_megabytes(total_bytes),
            percent,
            account.quota_mb,
            account.username,
            account.server,
            status
        ));
    }

    pub fn push_syntax_error(&mut self, line: usize) {
        self.lines
            .push(format!("line {line}: malformed account entry, skipped"));
    }

    pub fn push_login_failure(&mut self, account: &Account) {
        self.lines.push(format!(
            "login failed for {} on {}",
            account.username, account.server
        ));
    }

    pub fn push_advisory(&mut self, advisory: impl Into<String>) {
        self.lines.push(advisory.into());
    }

    /// Consumes the builder into the final report body.
    pub fn finalize(self) -> String {
        let mut body = self.lines.join("\n");
        body.push('\n');
        body
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
