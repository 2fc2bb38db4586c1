//! `lead-scout check`: verify configuration and the outside services before
//! a real run.

use crate::config::{AppConfig, TwilioConfig};
use crate::scrapers::ChromeMapsPage;
use crate::sheets::{LeadSheet, SheetsClient};
use crate::sms::format_e164;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
    Warn,
    Skip,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::Fail => "FAIL",
            Status::Warn => "WARN",
            Status::Skip => "SKIP",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub status: Status,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct Report {
    pub checks: Vec<Check>,
}

impl Report {
    fn push(&mut self, name: &'static str, status: Status, detail: impl Into<String>) {
        let check = Check {
            name,
            status,
            detail: detail.into(),
        };
        println!("[{}] {}: {}", check.status.label(), check.name, check.detail);
        self.checks.push(check);
    }

    /// Warnings and skips do not count as failures
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != Status::Fail)
    }
}

/// SMS is optional, so every problem here is a warning
pub fn twilio_status(twilio: &TwilioConfig) -> (Status, String) {
    if !twilio.is_configured() {
        return (
            Status::Warn,
            "credentials not set, SMS sending is disabled".to_string(),
        );
    }
    if twilio.from_number.trim().is_empty() {
        return (Status::Warn, "from_number is not set".to_string());
    }
    match format_e164(&twilio.from_number) {
        Some(number) => (Status::Pass, format!("sending from {}", number)),
        None => (
            Status::Warn,
            format!("from_number '{}' is not a valid phone number", twilio.from_number),
        ),
    }
}

pub async fn run_checks(config_path: Option<&Path>, skip_browser: bool) -> Report {
    let mut report = Report::default();
    println!("lead-scout system check");
    println!("=======================");

    let config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            report.push("Config", Status::Fail, format!("{:#}", e));
            return report;
        }
    };
    let problems = config.validate();
    if problems.is_empty() {
        report.push(
            "Config",
            Status::Pass,
            format!(
                "{} locations, {} categories",
                config.scrape.locations.len(),
                config.scrape.categories.len()
            ),
        );
    } else {
        report.push("Config", Status::Fail, problems.join("; "));
    }

    if skip_browser {
        report.push("Browser", Status::Skip, "skipped");
    } else {
        match ChromeMapsPage::launch(&config.browser) {
            Ok(_) => report.push("Browser", Status::Pass, "Chrome launched"),
            Err(e) => report.push("Browser", Status::Fail, format!("{:#}", e)),
        }
    }

    if config.sheets.sheet_id.trim().is_empty() {
        report.push("Google Sheets", Status::Fail, "sheets.sheet_id is not set");
    } else {
        match SheetsClient::new(
            &config.sheets.credentials_file,
            &config.sheets.sheet_id,
            &config.sheets.sheet_name,
        ) {
            Ok(client) => {
                let account = client.client_email().to_string();
                let sheet = LeadSheet::new(client);
                let connected = match sheet.connect().await {
                    Ok(()) => sheet.count().await,
                    Err(e) => Err(e),
                };
                match connected {
                    Ok(n) => report.push(
                        "Google Sheets",
                        Status::Pass,
                        format!("connected to '{}', {} leads stored", config.sheets.sheet_name, n),
                    ),
                    Err(e) => report.push(
                        "Google Sheets",
                        Status::Fail,
                        format!("{} (is the sheet shared with {}?)", e, account),
                    ),
                }
            }
            Err(e) => report.push(
                "Google Sheets",
                Status::Fail,
                format!(
                    "could not use credentials {}: {}",
                    config.sheets.credentials_file.display(),
                    e
                ),
            ),
        }
    }

    let (status, detail) = twilio_status(&config.twilio);
    report.push("Twilio", status, detail);

    println!();
    if report.passed() {
        println!("All required checks passed");
    } else {
        println!("Some required checks failed");
    }
    report
}
