use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

/// Header row of the statistics file. Written exactly once per file
/// lifetime segment: on creation and again after a rewrite rotation.
pub const STATS_HEADER: &str = "unixtime,msgs,size,percent quota,quota,username,server";

/// One usage measurement, the unit appended to the statistics file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub timestamp: i64,
    pub message_count: u32,
    pub total_bytes: u64,
    pub percent: u32,
    pub quota_bytes: u64,
    pub username: String,
    pub server: String,
}

impl UsageRecord {
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.timestamp,
            self.message_count,
            self.total_bytes,
            self.percent,
            self.quota_bytes,
            self.username,
            self.server
        )
    }

    pub fn from_csv_row(row: &str) -> Result<Self> {
        let fields: Vec<&str> = row.split(',').collect();
        if fields.len() != 7 {
            bail!("expected 7 fields, got {}", fields.len());
        }
        Ok(Self {
            timestamp: fields[0]
                .parse()
                .with_context(|| format!("invalid unixtime '{}'", fields[0]))?,
            message_count: fields[1]
                .parse()
                .with_context(|| format!("invalid message count '{}'", fields[1]))?,
            total_bytes: fields[2]
                .parse()
                .with_context(|| format!("invalid size '{}'", fields[2]))?,
            percent: fields[3]
                .parse()
                .with_context(|| format!("invalid percent '{}'", fields[3]))?,
            quota_bytes: fields[4]
                .parse()
                .with_context(|| format!("invalid quota '{}'", fields[4]))?,
            username: fields[5].to_string(),
            server: fields[6].to_string(),
        })
    }
}

/// What the retention policy did to the statistics file at the start of a
/// run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionAction {
    None,
    Truncated { dropped: usize, retained: usize },
    Unlinked,
}

/// The retention decision, as a pure function over the data rows (header
/// excluded) as the previous run left them. Returns the rows to keep and
/// the action taken.
///
/// Scanning the file in order, the ceiling is first exceeded at row
/// `max_lines + 1`. A truncation window at least that large would drop
/// every row that existed at that point, so the file is removed outright
/// instead of rewritten to a near-empty husk.
pub fn apply_retention(
    mut rows: Vec<String>,
    max_lines: usize,
    trunc_lines: usize,
) -> (Vec<String>, RetentionAction) {
    if rows.len() <= max_lines {
        return (rows, RetentionAction::None);
    }
    if trunc_lines >= max_lines + 1 {
        return (Vec::new(), RetentionAction::Unlinked);
    }
    let total = rows.len();
    let mut kept = rows.split_off(trunc_lines);
    // A blank row right after the dropped window is a trailing-newline
    // artifact and goes with it, but the sole remaining row is never
    // dropped, blank or not.
    if kept.len() > 1 && kept[0].trim().is_empty() {
        kept.remove(0);
    }
    let retained = kept.len();
    (
        kept,
        RetentionAction::Truncated {
            dropped: total - retained,
            retained,
        },
    )
}

/// The on-disk statistics store: a header-prefixed CSV file with a bounded
/// number of data rows. Retention is evaluated once, at open; rows appended
/// afterwards may push the file over the bound until the next run rotates
/// it. The append handle is owned for the duration of the run and closed on
/// drop.
pub struct StatsStore {
    path: PathBuf,
    file: Option<File>,
}

impl StatsStore {
    /// Opens the store, applying the retention policy to whatever the
    /// previous run left behind. The rewrite goes through a sibling
    /// temporary file and lands with a single atomic rename; any I/O error
    /// here is fatal to the run.
    pub async fn open(
        path: impl AsRef<Path>,
        max_lines: usize,
        trunc_lines: usize,
    ) -> Result<(Self, RetentionAction)> {
        let path = path.as_ref().to_path_buf();
        let rows = match tokio::fs::read_to_string(&path).await {
            Ok(existing) => {
                let mut lines = existing.lines();
                let mut rows: Vec<String> = Vec::new();
                match lines.next() {
                    Some(first) if first == STATS_HEADER => {}
                    Some(first) => rows.push(first.to_string()),
                    None => {}
                }
                rows.extend(lines.map(str::to_string));
                rows
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read statistics file {}", path.display()))
            }
        };

        let (kept, action) = apply_retention(rows, max_lines, trunc_lines);
        match &action {
            RetentionAction::None => {}
            RetentionAction::Unlinked => {
                tokio::fs::remove_file(&path).await.with_context(|| {
                    format!("failed to remove statistics file {}", path.display())
                })?;
            }
            RetentionAction::Truncated { .. } => {
                let tmp = sibling_tmp_path(&path);
                let body_len: usize = kept.iter().map(|row| row.len() + 1).sum();
                let mut contents = String::with_capacity(STATS_HEADER.len() + 1 + body_len);
                contents.push_str(STATS_HEADER);
                contents.push('\n');
                for row in &kept {
                    contents.push_str(row);
                    contents.push('\n');
                }
                tokio::fs::write(&tmp, contents)
                    .await
                    .with_context(|| format!("failed to write {}", tmp.display()))?;
                tokio::fs::rename(&tmp, &path).await.with_context(|| {
                    format!("failed to replace statistics file {}", path.display())
                })?;
            }
        }

        Ok((Self { path, file: None }, action))
    }

    /// Appends one usage row, creating the file with its header if this run
    /// is the first writer.
    pub async fn append(&mut self, record: &UsageRecord) -> Result<()> {
        if self.file.is_none() {
            self.file = Some(self.open_for_append().await?);
        }
        if let Some(file) = self.file.as_mut() {
            file.write_all(record.to_csv_row().as_bytes())
                .await
                .context("failed to write usage row")?;
            file.write_all(b"\n")
                .await
                .context("failed to terminate usage row")?;
            file.flush().await.context("failed to flush usage row")?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_for_append(&self) -> Result<File> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open statistics file {}", self.path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("failed to stat statistics file {}", self.path.display()))?
            .len();
        if len == 0 {
            file.write_all(STATS_HEADER.as_bytes())
                .await
                .context("failed to write statistics header")?;
            file.write_all(b"\n")
                .await
                .context("failed to terminate statistics header")?;
        }
        Ok(file)
    }
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
