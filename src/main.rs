mod autopilot;
mod config;
mod doctor;
mod error;
mod models;
mod pipeline;
mod scrapers;
mod sheets;
mod sms;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crate::config::AppConfig;
use crate::pipeline::{LeadPipeline, PipelineSettings};
use crate::scrapers::{ChromeMapsPage, MapsScraper, Pacing};
use crate::sheets::{LeadSheet, SheetsClient};
use crate::sms::{SmsSender, TwilioClient};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const AUTOPILOT_LOG: &str = "autopilot.log";

type LivePipeline = LeadPipeline<ChromeMapsPage, SheetsClient, TwilioClient>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Collect business leads from map searches into Google Sheets", long_about = None)]
struct Args {
    /// Config file (defaults to ./leadscout.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search every location and category, then save new leads to the sheet
    Scrape {
        /// Text the new leads afterwards
        #[arg(long)]
        send_sms: bool,
        /// Do not ask before sending
        #[arg(long)]
        yes: bool,
    },
    /// Text stored leads that have a phone number
    Sms {
        /// Include leads that were already messaged
        #[arg(long)]
        all: bool,
        /// Do not ask before sending
        #[arg(long)]
        yes: bool,
    },
    /// Run the scrape every day at the configured time
    Autopilot {
        /// Run once now and exit
        #[arg(long)]
        once: bool,
    },
    /// Check config, browser, Google Sheets and Twilio
    Check {
        #[arg(long)]
        skip_browser: bool,
    },
}

fn init_logging(to_file: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !to_file {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(AUTOPILOT_LOG)
        .with_context(|| format!("Failed to open {}", AUTOPILOT_LOG))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(io::stdout.and(non_blocking))
        .init();
    Ok(Some(guard))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = AppConfig::load(path)?;
    let problems = config.validate();
    if !problems.is_empty() {
        bail!(
            "Configuration problems:\n  - {}\nRun `lead-scout check` for details",
            problems.join("\n  - ")
        );
    }
    Ok(config)
}

/// Ask on stdin unless `assume_yes` is set
fn confirm_send(count: usize, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    print!("Send SMS to {} leads? Type 'yes' to continue: ", count);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("yes"),
        Err(_) => false,
    }
}

fn build_pipeline(config: &AppConfig) -> Result<LivePipeline> {
    let client = SheetsClient::new(
        &config.sheets.credentials_file,
        &config.sheets.sheet_id,
        &config.sheets.sheet_name,
    )
    .with_context(|| {
        format!(
            "Failed to load Google credentials from {}",
            config.sheets.credentials_file.display()
        )
    })?;
    info!("Using worksheet '{}'", client.sheet_name());

    let twilio = TwilioClient::from_config(&config.twilio)?;
    let sms = SmsSender::new(twilio, Duration::from_secs(config.sms.delay_secs));

    Ok(LeadPipeline::new(
        LeadSheet::new(client),
        sms,
        PipelineSettings::from_config(config),
    ))
}

async fn run_scrape(config: &AppConfig, send_sms: bool, assume_yes: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    let page = ChromeMapsPage::launch(&config.browser)?;
    let scraper = MapsScraper::new(page, Pacing::from_config(&config.scrape, &config.browser));
    let pipeline = pipeline.with_scraper(scraper);

    let report = pipeline
        .run_full(send_sms, |n| confirm_send(n, assume_yes))
        .await?;

    info!(
        "Done: {} leads found, {} new leads saved",
        report.leads_found, report.leads_saved
    );
    if let Some(sms) = report.sms {
        info!("SMS: {} sent, {} skipped, {} failed", sms.sent, sms.skipped, sms.failed);
    }
    Ok(())
}

async fn run_sms(config: &AppConfig, all: bool, assume_yes: bool) -> Result<()> {
    let pipeline = build_pipeline(config)?;
    pipeline
        .sheet()
        .connect()
        .await
        .context("Failed to connect to the leads sheet")?;
    pipeline
        .send_sms(all, |n| confirm_send(n, assume_yes))
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(matches!(args.command, Commands::Autopilot { .. }))?;

    if let Commands::Check { skip_browser } = args.command {
        let report = doctor::run_checks(args.config.as_deref(), skip_browser).await;
        if !report.passed() {
            std::process::exit(1);
        }
        return Ok(());
    }

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Commands::Scrape { send_sms, yes } => run_scrape(&config, send_sms, yes).await?,
        Commands::Sms { all, yes } => run_sms(&config, all, yes).await?,
        Commands::Autopilot { once } => {
            let send_sms = config.autopilot.send_sms;
            let mut job = || run_scrape(&config, send_sms, true);
            if once {
                if !autopilot::run_once(&mut job).await {
                    std::process::exit(1);
                }
            } else {
                autopilot::run_daily(&config.autopilot, job).await?;
            }
        }
        Commands::Check { .. } => unreachable!("handled above"),
    }

    Ok(())
}
