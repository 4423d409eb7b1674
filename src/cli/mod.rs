use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::application::LedgerService;
use crate::config::Config;
use crate::domain::{format_cents, parse_cents};
use crate::driver::{self, DriverPlan, DriverReport};
use crate::storage::{Ledger, OnDuplicate};
use crate::telemetry::{self, LogFormat};
use crate::transport::{self, LedgerServer};

/// Tally - account ledger over gRPC with mutual TLS
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "A small account ledger served over gRPC with mutual TLS")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log format: text, json
    #[arg(long, global = true, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the service lives and how to authenticate to it.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// The IP/DNS of the machine that the service is running on
    #[arg(long, global = true, env = "HOST", default_value = "")]
    pub host: String,

    /// The port the service is listening on
    #[arg(long, global = true, env = "PORT", default_value_t = Config::DEFAULT_PORT)]
    pub port: u16,

    /// Use mutual TLS (requires --ca-file, --key-file and --cert-file)
    #[arg(long, global = true, env = "TLS_ENABLED")]
    pub tls_enabled: bool,

    /// PEM file containing the trusted CA certificate(s)
    #[arg(long, global = true, env = "CA_FILE")]
    pub ca_file: Option<PathBuf>,

    /// PEM file containing the private key
    #[arg(long, global = true, env = "KEY_FILE")]
    pub key_file: Option<PathBuf>,

    /// PEM file containing the certificate chain
    #[arg(long, global = true, env = "CERT_FILE")]
    pub cert_file: Option<PathBuf>,
}

impl ConnectionArgs {
    pub fn into_config(self) -> Result<Config> {
        Ok(Config::from_parts(
            self.host,
            self.port,
            self.tls_enabled,
            self.ca_file,
            self.key_file,
            self.cert_file,
        )?)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the ledger service
    Serve {
        /// What creating an existing account does: keep, reset, reject
        #[arg(long, env = "ON_DUPLICATE", default_value = "keep")]
        on_duplicate: String,
    },

    /// Run create, deposit, balance and withdraw against a running service
    Drive {
        /// Account to operate on
        #[arg(long, default_value = "12345")]
        account: String,

        /// Amount to deposit (e.g., "100.00" or "100")
        #[arg(long, default_value = "100.00")]
        deposit: String,

        /// Amount to withdraw afterwards
        #[arg(long, default_value = "50.00")]
        withdraw: String,

        /// Deadline for the whole sequence, in milliseconds
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

impl Cli {
    /// Errors are handed back to `main`, which reports them once.
    pub async fn run(self) -> Result<()> {
        let log_format = LogFormat::parse(&self.log_format)
            .ok_or_else(|| anyhow!("Invalid log format '{}'. Use text or json", self.log_format))?;
        telemetry::init(log_format);

        self.dispatch().await
    }

    async fn dispatch(self) -> Result<()> {
        let config = self.connection.into_config()?;
        info!(%config, "configuration loaded");

        match self.command {
            Commands::Serve { on_duplicate } => {
                let policy = OnDuplicate::parse(&on_duplicate).with_context(|| {
                    format!(
                        "Invalid duplicate policy '{}'. Use keep, reset or reject",
                        on_duplicate
                    )
                })?;
                run_serve(&config, policy).await
            }

            Commands::Drive {
                account,
                deposit,
                withdraw,
                timeout_ms,
                format,
            } => {
                let plan = DriverPlan {
                    account_id: account,
                    deposit: parse_cents(&deposit)
                        .context("Invalid deposit amount. Use '100.00' or '100'")?,
                    withdraw: parse_cents(&withdraw)
                        .context("Invalid withdraw amount. Use '50.00' or '50'")?,
                    timeout: Duration::from_millis(timeout_ms),
                };
                run_drive(&config, &plan, &format).await
            }
        }
    }
}

async fn run_serve(config: &Config, policy: OnDuplicate) -> Result<()> {
    let ledger = Arc::new(Ledger::with_duplicate_policy(policy));
    info!(on_duplicate = %ledger.duplicate_policy(), "ledger created");

    let server = LedgerServer::bind(config, LedgerService::new(ledger))
        .await
        .context("Failed to start server")?;

    server
        .serve_with_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested");
            }
        })
        .await
        .context("Failed to serve")
}

async fn run_drive(config: &Config, plan: &DriverPlan, format: &str) -> Result<()> {
    let channel = transport::connect(config).context("Unable to set up gRPC channel")?;
    info!(host = config.dial_host(), port = config.port, "client connecting");

    let report = driver::run(channel, plan).await?;
    print_report(&report, format)
}

fn print_report(report: &DriverReport, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        "text" => {
            println!("Account created {}", report.account_id);
            println!(
                "New balance after deposit {}",
                format_cents(report.balance_after_deposit)
            );
            println!("Balance {}", format_cents(report.balance));
            println!(
                "New balance after withdrawal {}",
                format_cents(report.balance_after_withdrawal)
            );
        }
        other => return Err(anyhow!("Invalid format '{}'. Use text or json", other)),
    }
    Ok(())
}
