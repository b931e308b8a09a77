use anyhow::{bail, Context, Result};

/// Lines whose first non-blank character is this marker are skipped.
pub const COMMENT_MARKER: char = '#';
pub const FIELD_DELIMITER: char = ',';

const ACCOUNT_FIELDS: usize = 4;

/// One monitored mailbox account, validated from a line of the account list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub server: String,
    pub username: String,
    pub password: String,
    pub quota_mb: u32,
}

impl Account {
    /// Parses one data line: `server,username,password,quotaMB`, each field
    /// trimmed and non-empty, quota a positive integer.
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
        if fields.len() != ACCOUNT_FIELDS {
            bail!(
                "expected {} comma-separated fields, got {}",
                ACCOUNT_FIELDS,
                fields.len()
            );
        }
        if fields.iter().any(|field| field.is_empty()) {
            bail!("empty field after trimming");
        }
        let quota_mb: u32 = fields[3]
            .parse()
            .with_context(|| format!("invalid quota '{}'", fields[3]))?;
        if quota_mb == 0 {
            bail!("quota must be a positive number of megabytes");
        }
        Ok(Self {
            server: fields[0].to_string(),
            username: fields[1].to_string(),
            password: fields[2].to_string(),
            quota_mb,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Account(Account),
    /// A malformed data line, identified by its 1-based line number.
    Syntax { line: usize },
}

/// Iterates the account list, yielding validated accounts and the line
/// numbers of malformed entries. Comment and blank lines are skipped
/// silently, and a malformed line never stops iteration.
pub struct AccountSource<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> AccountSource<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate(),
        }
    }
}

impl Iterator for AccountSource<'_> {
    type Item = ParsedLine;

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, raw) in self.lines.by_ref() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(COMMENT_MARKER) {
                continue;
            }
            return Some(match Account::from_line(raw) {
                Ok(account) => ParsedLine::Account(account),
                Err(err) => {
                    tracing::warn!(line = idx + 1, error = %err, "account entry rejected");
                    ParsedLine::Syntax { line: idx + 1 }
                }
            });
        }
        None
    }
}
