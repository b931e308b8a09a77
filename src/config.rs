use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_accounts_file")]
    pub accounts_file: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    #[serde(default = "default_stats_file")]
    pub stats_file: String,
    /// Retention ceiling: data rows the statistics file may hold before the
    /// next run rotates it.
    #[serde(default = "default_max_stat_lines")]
    pub max_stat_lines: usize,
    /// Oldest data rows dropped per rotation.
    #[serde(default = "default_trunc_stat_lines")]
    pub trunc_stat_lines: usize,
    #[serde(default = "default_warn_threshold")]
    pub warn_threshold_percent: u32,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_seconds: u64,
    pub smtp: SmtpConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_accounts_file() -> String {
    "config/accounts.lst".to_string()
}

fn default_report_file() -> String {
    "./quotamon-report.txt".to_string()
}

fn default_stats_file() -> String {
    "./quotamon-stats.csv".to_string()
}

fn default_max_stat_lines() -> usize {
    1000
}

fn default_trunc_stat_lines() -> usize {
    100
}

fn default_warn_threshold() -> u32 {
    85
}

fn default_probe_timeout_secs() -> u64 {
    300
}

fn default_smtp_port() -> u16 {
    465
}

impl AppConfig {
    pub fn default_path() -> &'static str {
        "config/quotamon.toml"
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref)
            .with_context(|| format!("failed to read configuration from {}", path_ref.display()))?;
        let mut config: Self = toml::from_str(&raw).with_context(|| {
            format!("failed to parse configuration from {}", path_ref.display())
        })?;
        if config.service_name.trim().is_empty() {
            config.service_name = "quotamon".to_string();
        }
        Ok(config)
    }
}
