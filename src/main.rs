//! a11y-scan command line driver
//!
//! Runs scans against the configured page auditor and reads back history and
//! analytics from the local result store.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::time::Duration;

use a11y_scan::commands::{self, scan::ScanStatusView, AppState};
use a11y_scan::models::{JobState, ScanSettings, Scope, WcagLevel};
use a11y_scan::{logging, utils, ScanConfig, TimeRange};

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "a11y-scan")]
#[command(about = "Accessibility (WCAG) scan orchestration and analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a URL, wait for the outcome and compare with the previous scan
    Scan {
        url: String,

        /// WCAG conformance level: A, AA or AAA
        #[arg(short, long, default_value = "AA", value_parser = parse_level)]
        level: WcagLevel,

        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Owning user; omitted scans are public
        #[arg(short, long)]
        user: Option<String>,
    },

    /// List stored results for a URL, newest first
    History { url: String },

    /// Summarize stored results
    Analytics {
        #[arg(short, long)]
        user: Option<String>,

        /// 24h, 7d, 30d or all
        #[arg(short, long, default_value = "all", value_parser = parse_range)]
        range: TimeRange,
    },

    /// Probe the page auditor
    Check,
}

fn parse_level(raw: &str) -> Result<WcagLevel, String> {
    WcagLevel::from_str(raw).ok_or_else(|| format!("unknown WCAG level '{}' (expected A, AA or AAA)", raw))
}

fn parse_range(raw: &str) -> Result<TimeRange, String> {
    TimeRange::from_str(raw).ok_or_else(|| format!("unknown time range '{}' (expected 24h, 7d, 30d or all)", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::env::load_env().ok();
    logging::init_logging();

    let config = ScanConfig::from_env()?;
    let state = AppState::from_config(config)?;

    match cli.command {
        Commands::Scan {
            url,
            level,
            timeout_ms,
            user,
        } => run_scan(&state, &url, level, timeout_ms, user).await,
        Commands::History { url } => print_json(&commands::get_analysis_by_url(&state, &url).await?),
        Commands::Analytics { user, range } => {
            let scope = user.map(Scope::user).unwrap_or(Scope::Global);
            print_json(&commands::get_analytics(&state, scope, range).await?)
        }
        Commands::Check => {
            let health = commands::test_scanner(&state).await;
            print_json(&health)?;
            if health.healthy {
                Ok(())
            } else {
                Err(anyhow!("page auditor is not healthy: {}", health.detail))
            }
        }
    }
}

async fn run_scan(
    state: &AppState,
    url: &str,
    level: WcagLevel,
    timeout_ms: Option<u64>,
    user: Option<String>,
) -> Result<()> {
    let settings = ScanSettings {
        wcag_level: level,
        timeout_ms,
        ..ScanSettings::default()
    };
    let request = commands::create_analysis_request(state, url, user, settings).await?;
    tracing::info!(request_id = %request.id, url = %request.url, "scan submitted");

    let job = state
        .scheduler
        .wait_for_terminal(request.id, STATUS_POLL_INTERVAL)
        .await?;
    let status = ScanStatusView::from_job(&job);
    print_json(&status)?;

    if job.state != JobState::Completed {
        return Err(anyhow!(
            "scan {} ended {}: {}",
            request.id,
            job.state,
            status.user_message.as_deref().unwrap_or("no detail")
        ));
    }

    print_json(&commands::get_analysis_result(state, request.id).await?)?;
    print_json(&commands::get_result_comparison(state, request.id).await?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
