use anyhow::{bail, Context, Result};
use quotamon::{
    accounts::{AccountSource, ParsedLine},
    logging, platform, AppConfig, Service,
};

#[derive(Debug)]
struct Cli {
    config_path: String,
    check_only: bool,
}

impl Cli {
    fn parse() -> Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut config_path: Option<String> = None;
        let mut check_only = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                    config_path = Some(value);
                }
                "--check" => check_only = true,
                "--help" | "-h" => {
                    println!(
                        "Usage: quotamon [--config <path>] [--check]\n\
                         --config <path>   Path to TOML configuration (default: config/quotamon.toml)\n\
                         --check           Validate the account list and exit without probing"
                    );
                    std::process::exit(0);
                }
                other => {
                    if config_path.is_none() {
                        config_path = Some(other.to_string());
                    } else {
                        bail!("unknown argument '{other}'");
                    }
                }
            }
        }

        Ok(Self {
            config_path: config_path.unwrap_or_else(|| AppConfig::default_path().into()),
            check_only,
        })
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse()?;

    let config = AppConfig::load(&cli.config_path)
        .with_context(|| format!("unable to load configuration from {}", cli.config_path))?;

    logging::init(&config)?;
    platform::log_schedule_guidance();

    if cli.check_only {
        check_accounts(&config).await
    } else {
        Service::new(config).run().await
    }
}

/// Parses the account list and reports malformed entries without touching
/// the network, the statistics file, or the mailer.
async fn check_accounts(config: &AppConfig) -> Result<()> {
    let account_list = tokio::fs::read_to_string(&config.accounts_file)
        .await
        .with_context(|| format!("failed to read account list {}", config.accounts_file))?;

    let mut valid = 0usize;
    let mut malformed = 0usize;
    for parsed in AccountSource::new(&account_list) {
        match parsed {
            ParsedLine::Account(account) => {
                valid += 1;
                tracing::info!(
                    server = %account.server,
                    username = %account.username,
                    quota_mb = account.quota_mb,
                    "account entry ok"
                );
            }
            ParsedLine::Syntax { .. } => {
                malformed += 1;
            }
        }
    }
    tracing::info!(valid, malformed, file = %config.accounts_file, "account list checked");
    if malformed > 0 {
        bail!("account list contains {malformed} malformed line(s)");
    }
    Ok(())
}
