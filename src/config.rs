use anyhow::{Context, Result};
use chrono::NaiveTime;
use config::{Config, Environment, File, FileFormat, FileSourceFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "leadscout.toml";

pub const BUSINESS_NAME_PLACEHOLDER: &str = "{business_name}";

/// Separates list items in environment overrides. Locations contain commas
/// ("Queens, NY"), so lists use `;`
pub const ENV_LIST_SEPARATOR: &str = ";";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sheets: SheetsConfig,
    pub twilio: TwilioConfig,
    pub scrape: ScrapeConfig,
    pub sms: SmsConfig,
    pub autopilot: AutopilotConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Service account JSON key
    pub credentials_file: PathBuf,
    pub sheet_id: String,
    /// Worksheet (tab) name
    pub sheet_name: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            sheet_id: String::new(),
            sheet_name: "Leads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioConfig {
    pub fn is_configured(&self) -> bool {
        !self.account_sid.trim().is_empty() && !self.auth_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub locations: Vec<String>,
    pub categories: Vec<String>,
    pub max_results_per_category: usize,
    pub delay_between_searches_secs: u64,
    /// Second pass over leads missing a phone or website
    pub enrich_missing: bool,
    pub enrich_max_clicks: usize,
    /// Rounds without new cards before a search gives up
    pub max_idle_scrolls: usize,
    /// Consecutive failed scrolls with no cards visible
    pub max_empty_scrolls: usize,
    pub search_retries: usize,
    pub dedupe_by_phone: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            categories: Vec::new(),
            max_results_per_category: 10,
            delay_between_searches_secs: 12,
            enrich_missing: true,
            enrich_max_clicks: 100,
            max_idle_scrolls: 15,
            max_empty_scrolls: 5,
            search_retries: 2,
            dedupe_by_phone: false,
        }
    }
}

impl ScrapeConfig {
    pub fn delay_between_searches(&self) -> Duration {
        Duration::from_secs(self.delay_between_searches_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub template: String,
    pub delay_secs: u64,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            template: "Hello {business_name}, we'd like to tell you about our services. \
                       Reply STOP to opt out."
                .to_string(),
            delay_secs: 12,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Local time of day, `HH:MM`
    pub daily_at: String,
    pub send_sms: bool,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            daily_at: "10:00".to_string(),
            send_sms: false,
        }
    }
}

impl AutopilotConfig {
    pub fn run_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M")
            .with_context(|| format!("Invalid autopilot.daily_at '{}', expected HH:MM", self.daily_at))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub base_url: String,
    /// Prefix for direct search URLs
    pub search_url: String,
    pub search_box: String,
    pub results_feed: String,
    /// Tried in order, first selector with matches wins
    pub result_cards: Vec<String>,
    pub detail_header: String,
    pub search_box_timeout_secs: u64,
    pub results_timeout_secs: u64,
    pub detail_timeout_secs: u64,
    /// Pause after navigation and scrolling
    pub settle_millis: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            base_url: "https://www.google.com/maps".to_string(),
            search_url: "https://www.google.com/maps/search/".to_string(),
            search_box: "input#searchboxinput".to_string(),
            results_feed: "div[role='feed']".to_string(),
            result_cards: vec!["div[role='article']".to_string()],
            detail_header: "h1".to_string(),
            search_box_timeout_secs: 10,
            results_timeout_secs: 20,
            detail_timeout_secs: 6,
            settle_millis: 1500,
        }
    }
}

impl AppConfig {
    /// Load `.env`, the config file and `LEADSCOUT_*` environment variables.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_path.display());
        }

        let file = match path {
            Some(p) => File::from(p.to_path_buf()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut config = Self::from_sources(file, environment())?;
        config.twilio.fill_from_env();
        Ok(config)
    }

    fn from_sources(file: File<FileSourceFile, FileFormat>, env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .add_source(file)
            .add_source(env)
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Problems that prevent a run, empty when the config is usable
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.sheets.sheet_id.trim().is_empty() {
            problems.push("sheets.sheet_id is not set".to_string());
        }
        if self.sheets.sheet_name.trim().is_empty() {
            problems.push("sheets.sheet_name is empty".to_string());
        }
        if self.scrape.locations.is_empty() {
            problems.push("scrape.locations is empty".to_string());
        }
        if self.scrape.categories.is_empty() {
            problems.push("scrape.categories is empty".to_string());
        }
        if self.scrape.max_results_per_category == 0 {
            problems.push("scrape.max_results_per_category must be positive".to_string());
        }
        if !self.sms.template.contains(BUSINESS_NAME_PLACEHOLDER) {
            problems.push(format!("sms.template has no {} placeholder", BUSINESS_NAME_PLACEHOLDER));
        }
        if let Err(e) = self.autopilot.run_time() {
            problems.push(e.to_string());
        }
        problems
    }
}

/// `LEADSCOUT_*` variables, e.g. `LEADSCOUT_SHEETS__SHEET_ID`
fn environment() -> Environment {
    Environment::with_prefix("LEADSCOUT")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(ENV_LIST_SEPARATOR)
        .with_list_parse_key("scrape.locations")
        .with_list_parse_key("scrape.categories")
        .with_list_parse_key("browser.result_cards")
}

impl TwilioConfig {
    /// Fall back to the conventional TWILIO_* variables for empty fields
    fn fill_from_env(&mut self) {
        let fill = |field: &mut String, var: &str| {
            if field.trim().is_empty() {
                if let Ok(value) = std::env::var(var) {
                    *field = value;
                }
            }
        };
        fill(&mut self.account_sid, "TWILIO_ACCOUNT_SID");
        fill(&mut self.auth_token, "TWILIO_AUTH_TOKEN");
        fill(&mut self.from_number, "TWILIO_PHONE_NUMBER");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_file_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[sheets]
sheet_id = "abc123"

[scrape]
locations = ["Queens, NY", "Brooklyn, NY"]
categories = ["bars"]
max_results_per_category = 25

[browser]
headless = false
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.sheets.sheet_id, "abc123");
        assert_eq!(config.sheets.sheet_name, "Leads");
        assert_eq!(config.scrape.locations.len(), 2);
        assert_eq!(config.scrape.max_results_per_category, 25);
        assert_eq!(config.scrape.enrich_max_clicks, 100);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.results_feed, "div[role='feed']");
    }

    #[test]
    fn env_lists_keep_commas_inside_locations() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::from(dir.path().join("none.toml")).required(false);
        let vars = config::Map::from([
            (
                "LEADSCOUT_SCRAPE__LOCATIONS".to_string(),
                "Queens, NY;Brooklyn, NY".to_string(),
            ),
            ("LEADSCOUT_SCRAPE__CATEGORIES".to_string(), "bars".to_string()),
            ("LEADSCOUT_SCRAPE__MAX_RESULTS_PER_CATEGORY".to_string(), "25".to_string()),
        ]);

        let config = AppConfig::from_sources(file, environment().source(Some(vars))).unwrap();
        assert_eq!(config.scrape.locations, ["Queens, NY", "Brooklyn, NY"]);
        assert_eq!(config.scrape.categories, ["bars"]);
        assert_eq!(config.scrape.max_results_per_category, 25);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn validate_reports_every_problem() {
        let mut config = AppConfig::default();
        config.sms.template = "Hi there".into();
        config.autopilot.daily_at = "25:99".into();
        let problems = config.validate();
        assert_eq!(problems.len(), 5, "{problems:?}");

        config.sheets.sheet_id = "id".into();
        config.scrape.locations = vec!["Queens, NY".into()];
        config.scrape.categories = vec!["bars".into()];
        config.sms.template = "Hi {business_name}".into();
        config.autopilot.daily_at = "07:45".into();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn twilio_needs_sid_and_token() {
        let mut twilio = TwilioConfig::default();
        assert!(!twilio.is_configured());
        twilio.account_sid = "AC123".into();
        assert!(!twilio.is_configured());
        twilio.auth_token = "secret".into();
        assert!(twilio.is_configured());
    }

    #[test]
    fn parses_daily_time() {
        let autopilot = AutopilotConfig::default();
        assert_eq!(
            autopilot.run_time().unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
    }
}
