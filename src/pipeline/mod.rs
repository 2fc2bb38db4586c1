pub mod stats;

use crate::config::AppConfig;
use crate::models::{dedupe_by_phone, Lead};
use crate::scrapers::{MapsPage, MapsScraper, SearchParams};
use crate::sheets::store::stored_phone_digits;
use crate::sheets::{LeadSheet, SheetBackend};
use crate::sms::{SmsGateway, SmsOutcome, SmsSender};
use anyhow::{anyhow, Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};

pub use stats::ScrapeStats;

/// Knobs for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub locations: Vec<String>,
    pub categories: Vec<String>,
    pub max_results: usize,
    pub enrich: bool,
    pub enrich_max_clicks: usize,
    pub dedupe_by_phone: bool,
    pub search_pause: Duration,
    /// Pause between single-row inserts after a failed batch
    pub insert_pause: Duration,
    pub sms_template: String,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            locations: config.scrape.locations.clone(),
            categories: config.scrape.categories.clone(),
            max_results: config.scrape.max_results_per_category,
            enrich: config.scrape.enrich_missing,
            enrich_max_clicks: config.scrape.enrich_max_clicks,
            dedupe_by_phone: config.scrape.dedupe_by_phone,
            search_pause: config.scrape.delay_between_searches(),
            insert_pause: Duration::from_secs(1),
            sms_template: config.sms.template.clone(),
        }
    }
}

/// Totals of an SMS run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SmsSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Sent messages whose row could not be updated
    pub unmarked: usize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunReport {
    pub leads_found: usize,
    pub leads_saved: usize,
    pub sms: Option<SmsSummary>,
}

/// Scrape → sheet → SMS
pub struct LeadPipeline<P: MapsPage, B: SheetBackend, G: SmsGateway> {
    scraper: Option<MapsScraper<P>>,
    sheet: LeadSheet<B>,
    sms: SmsSender<G>,
    settings: PipelineSettings,
}

impl<P: MapsPage, B: SheetBackend, G: SmsGateway> LeadPipeline<P, B, G> {
    pub fn new(sheet: LeadSheet<B>, sms: SmsSender<G>, settings: PipelineSettings) -> Self {
        Self {
            scraper: None,
            sheet,
            sms,
            settings,
        }
    }

    pub fn with_scraper(mut self, scraper: MapsScraper<P>) -> Self {
        self.scraper = Some(scraper);
        self
    }

    pub fn sheet(&self) -> &LeadSheet<B> {
        &self.sheet
    }

    /// Search every location × category. A failing search is logged and
    /// counted, the run carries on.
    pub fn scrape_leads(&self) -> Result<(Vec<Lead>, ScrapeStats)> {
        let scraper = self
            .scraper
            .as_ref()
            .ok_or_else(|| anyhow!("No browser attached, cannot scrape"))?;
        let s = &self.settings;

        let total = s.locations.len() * s.categories.len();
        let mut stats = ScrapeStats::new(&s.locations, &s.categories);
        let mut all_leads = Vec::new();
        let mut done = 0;

        info!(
            "Starting scrape: {} locations × {} categories = {} searches",
            s.locations.len(),
            s.categories.len(),
            total
        );

        for location in &s.locations {
            for category in &s.categories {
                done += 1;
                info!("[{}/{}] {} in {}", done, total, category, location);
                let params = SearchParams::new(category.as_str(), location.as_str(), s.max_results);

                match self.search_one(scraper, &params) {
                    Ok(leads) => {
                        stats.record(location, category, leads.len());
                        if leads.is_empty() {
                            warn!("No results for '{}' in '{}'", category, location);
                        }
                        all_leads.extend(leads);
                    }
                    Err(e) => {
                        error!("Search '{}' in '{}' failed: {:#}", category, location, e);
                        stats.record_failure();
                    }
                }

                if done < total && !s.search_pause.is_zero() {
                    info!("Waiting {:?} before the next search...", s.search_pause);
                    std::thread::sleep(s.search_pause);
                }
            }
        }

        if s.dedupe_by_phone {
            let (unique, removed) = dedupe_by_phone(all_leads);
            if removed > 0 {
                info!("Removed {} leads with a repeated phone number", removed);
            }
            all_leads = unique;
        }

        stats.log_summary();
        Ok((all_leads, stats))
    }

    fn search_one(&self, scraper: &MapsScraper<P>, params: &SearchParams) -> Result<Vec<Lead>> {
        let mut leads = scraper.search_businesses(params)?;

        if self.settings.enrich && leads.iter().any(Lead::missing_contact) {
            match scraper.enrich_missing(leads.clone(), params, self.settings.enrich_max_clicks) {
                Ok(enriched) => leads = enriched,
                Err(e) => warn!("Enrich pass failed, keeping list data: {:#}", e),
            }
        }

        for lead in &mut leads {
            lead.search_location = Some(params.location.clone());
            lead.search_category = Some(params.query.clone());
        }
        Ok(leads)
    }

    /// Store leads, falling back to one row at a time if the batch insert
    /// cannot run at all
    pub async fn save_leads(&self, leads: &[Lead]) -> Result<usize> {
        if leads.is_empty() {
            info!("No leads to save");
            return Ok(0);
        }

        match self.sheet.add_leads_batch(leads).await {
            Ok(outcome) => Ok(outcome.added),
            Err(e) => {
                warn!("Batch insert failed ({}), falling back to single inserts", e);
                let mut added = 0;
                for lead in leads {
                    match self.sheet.add_lead(lead).await {
                        Ok(true) => added += 1,
                        Ok(false) => {}
                        Err(e) => error!("Failed to add {}: {}", lead.name, e),
                    }
                    if !self.settings.insert_pause.is_zero() {
                        tokio::time::sleep(self.settings.insert_pause).await;
                    }
                }
                info!("Single inserts added {} of {} leads", added, leads.len());
                Ok(added)
            }
        }
    }

    /// Message stored leads that have a phone. `all` includes leads that were
    /// already messaged; `confirm` gets the number of recipients.
    pub async fn send_sms(&self, all: bool, confirm: impl Fn(usize) -> bool) -> Result<SmsSummary> {
        let mut summary = SmsSummary::default();
        if !self.sms.is_enabled() {
            error!("SMS sending is not enabled. Check the Twilio credentials");
            return Ok(summary);
        }

        let leads = if all {
            self.sheet.all_leads().await
        } else {
            self.sheet.leads_without_sms().await
        }
        .context("Failed to load leads from the sheet")?;

        let recipients: Vec<_> = leads
            .into_iter()
            .filter(|lead| stored_phone_digits(lead).is_some())
            .collect();
        if recipients.is_empty() {
            info!("No leads with phone numbers to message");
            return Ok(summary);
        }

        info!("Found {} leads to message", recipients.len());
        if !confirm(recipients.len()) {
            info!("SMS sending cancelled");
            return Ok(summary);
        }

        let outcomes = self
            .sms
            .send_bulk(&recipients, &self.settings.sms_template)
            .await;
        for outcome in outcomes {
            match outcome {
                SmsOutcome::Sent { row, sent_at, .. } => {
                    summary.sent += 1;
                    if let Err(e) = self.sheet.mark_sms_sent(row, &sent_at).await {
                        error!("Sent SMS but could not update row {}: {}", row, e);
                        summary.unmarked += 1;
                    }
                }
                SmsOutcome::Skipped { .. } => summary.skipped += 1,
                SmsOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        info!(
            "SMS complete: {} sent, {} skipped, {} failed",
            summary.sent, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Scrape, save, then optionally message the new leads
    pub async fn run_full(&self, send_sms: bool, confirm: impl Fn(usize) -> bool) -> Result<RunReport> {
        self.sheet
            .connect()
            .await
            .context("Failed to connect to the leads sheet")?;

        let (leads, _stats) = self.scrape_leads()?;
        if leads.is_empty() {
            warn!("No leads found, nothing to save or message");
            return Ok(RunReport::default());
        }

        let leads_saved = self.save_leads(&leads).await?;
        info!("Saved {} new leads, sheet now holds {}", leads_saved, self.sheet.count().await?);

        let sms = if send_sms {
            Some(self.send_sms(false, confirm).await?)
        } else {
            None
        };

        Ok(RunReport {
            leads_found: leads.len(),
            leads_saved,
            sms,
        })
    }
}
