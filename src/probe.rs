use std::net::TcpStream;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use native_tls::TlsConnector;

use crate::accounts::Account;

const IMAPS_PORT: u16 = 993;

/// Outcome of inspecting one account's mailboxes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Usage { message_count: u32, total_bytes: u64 },
    LoginFailed,
}

/// Remote inspection of a single account: folder enumeration and message
/// size totals. One session per call; no retries.
#[async_trait]
pub trait MailboxProbe: Send + Sync {
    async fn probe(&self, account: &Account) -> Result<ProbeOutcome>;
}

/// IMAP-over-TLS implementation. The protocol work is synchronous and runs
/// on the blocking pool, bounded by the configured timeout.
pub struct ImapProbe {
    timeout: Duration,
}

impl ImapProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MailboxProbe for ImapProbe {
    async fn probe(&self, account: &Account) -> Result<ProbeOutcome> {
        let server = account.server.clone();
        let account = account.clone();
        let task = tokio::task::spawn_blocking(move || probe_account(&account));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined.context("probe task panicked")?,
            Err(_) => bail!("probe of {} timed out after {:?}", server, self.timeout),
        }
    }
}

type TlsSession = imap::Session<native_tls::TlsStream<TcpStream>>;

fn probe_account(account: &Account) -> Result<ProbeOutcome> {
    let mut session = match login(account)? {
        Some(session) => session,
        None => return Ok(ProbeOutcome::LoginFailed),
    };
    let usage = sum_folders(&mut session)
        .with_context(|| format!("failed to measure folders on {}", account.server))?;
    // Closing the session is best effort; the measurements are already in
    // hand.
    let _ = session.logout();
    Ok(usage)
}

fn login(account: &Account) -> Result<Option<TlsSession>> {
    let tls = TlsConnector::builder()
        .build()
        .context("failed to build TLS connector")?;
    let stream = TcpStream::connect((account.server.as_str(), IMAPS_PORT))
        .with_context(|| format!("failed to connect to {}:{}", account.server, IMAPS_PORT))?;
    let tls_stream = tls
        .connect(&account.server, stream)
        .with_context(|| format!("TLS handshake with {} failed", account.server))?;
    let client = imap::Client::new(tls_stream);
    match client.login(&account.username, &account.password) {
        Ok(session) => Ok(Some(session)),
        // A NO or BAD answer to LOGIN is a per-account condition the run
        // recovers from; anything below the authentication layer is not.
        Err((imap::error::Error::No(reason), _))
        | Err((imap::error::Error::Bad(reason), _)) => {
            tracing::warn!(
                server = %account.server,
                username = %account.username,
                reason = %reason,
                "login rejected"
            );
            Ok(None)
        }
        Err((err, _)) => {
            Err(err).with_context(|| format!("login to {} failed", account.server))
        }
    }
}

fn sum_folders(session: &mut TlsSession) -> Result<ProbeOutcome> {
    let mut message_count: u32 = 0;
    let mut total_bytes: u64 = 0;
    let folders = session.list(None, Some("*"))?;
    for folder in folders.iter() {
        if folder
            .attributes()
            .iter()
            .any(|attr| matches!(attr, imap::types::NameAttribute::NoSelect))
        {
            continue;
        }
        let name = folder.name().to_string();
        let mailbox = session.examine(&name)?;
        if mailbox.exists == 0 {
            continue;
        }
        message_count += mailbox.exists;
        let fetches = session.fetch("1:*", "RFC822.SIZE")?;
        total_bytes += fetches
            .iter()
            .filter_map(|fetch| fetch.size)
            .map(u64::from)
            .sum::<u64>();
    }
    Ok(ProbeOutcome::Usage {
        message_count,
        total_bytes,
    })
}
