use crate::models::Lead;
use crate::scrapers::extract::{self, DetailInfo};
use crate::scrapers::traits::MapsPage;
use crate::scrapers::types::{Pacing, SearchParams};
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Map search scraper: list pass plus optional detail enrichment
pub struct MapsScraper<P: MapsPage> {
    page: P,
    pacing: Pacing,
}

impl<P: MapsPage> MapsScraper<P> {
    pub fn new(page: P, pacing: Pacing) -> Self {
        Self { page, pacing }
    }

    #[cfg(test)]
    pub fn page(&self) -> &P {
        &self.page
    }

    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    /// List pass: search, then scroll the results collecting card fields
    pub fn search_businesses(&self, params: &SearchParams) -> Result<Vec<Lead>> {
        info!("Searching for '{}' in '{}'", params.query, params.location);
        let text = params.search_text();

        if !self.load_with_retries(&text)? {
            warn!(
                "Could not load results for '{}' in '{}'",
                params.query, params.location
            );
            return Ok(Vec::new());
        }

        self.collect(params)
    }

    /// Submit the search box up to `1 + search_retries` times, then try one
    /// direct URL load. A search box that fails counts as a failed attempt.
    fn load_with_retries(&self, text: &str) -> Result<bool> {
        for attempt in 0..=self.pacing.search_retries {
            if attempt > 0 {
                warn!(
                    "Retry {}/{}: results did not load, searching again",
                    attempt, self.pacing.search_retries
                );
                self.pause(self.pacing.settle);
            }
            if let Err(e) = self.page.open_search(text) {
                warn!("Search attempt {} failed: {:#}", attempt + 1, e);
                continue;
            }
            if self.load_initial_results()? {
                return Ok(true);
            }
        }

        info!("Trying a fresh page load for '{}'", text);
        if let Err(e) = self.page.open_search_url(text) {
            warn!("Fresh page load failed: {:#}", e);
            return Ok(false);
        }
        self.load_initial_results()
    }

    /// Wait for the list, then nudge it until the first cards render
    fn load_initial_results(&self) -> Result<bool> {
        if !self.page.wait_for_results()? {
            return Ok(false);
        }

        for i in 0..self.pacing.initial_scrolls {
            let cards = self.page.result_cards()?;
            if !cards.is_empty() {
                debug!("Found {} cards after {} scrolls", cards.len(), i);
                return Ok(true);
            }
            self.page.scroll_results()?;
            self.pause(self.pacing.settle);
        }

        let found = !self.page.result_cards()?.is_empty();
        if !found {
            warn!("No result cards after scrolling");
        }
        Ok(found)
    }

    fn collect(&self, params: &SearchParams) -> Result<Vec<Lead>> {
        let mut leads = Vec::new();
        let mut seen = HashSet::new();
        let mut idle_rounds = 0;
        let mut empty_scrolls = 0;
        let mut scrolls = 0;

        while leads.len() < params.max_results && idle_rounds < self.pacing.max_idle_scrolls {
            let cards = self.page.result_cards()?;

            if cards.is_empty() {
                if !self.page.scroll_results()? {
                    empty_scrolls += 1;
                    if empty_scrolls >= self.pacing.max_empty_scrolls {
                        info!("Reached end of results after {} scrolls", scrolls);
                        break;
                    }
                    self.pause(self.pacing.settle);
                    continue;
                }
                empty_scrolls = 0;
                idle_rounds += 1;
                scrolls += 1;
                self.pause(self.pacing.settle);
                continue;
            }
            empty_scrolls = 0;

            let mut new_cards = 0;
            for html in &cards {
                let Some(identity) = extract::card_identity(html) else {
                    continue;
                };
                if !seen.insert(identity) {
                    continue;
                }

                if let Some(lead) = extract::parse_card(html, &params.query, &params.location) {
                    leads.push(lead);
                    new_cards += 1;
                    let lead = &leads[leads.len() - 1];
                    info!(
                        "[{}/{}] {} | {} | {} | {}",
                        leads.len(),
                        params.max_results,
                        lead.name,
                        lead.address.as_deref().unwrap_or("N/A"),
                        lead.phone.as_deref().unwrap_or("N/A"),
                        lead.website.as_deref().unwrap_or("N/A"),
                    );
                }

                if leads.len() >= params.max_results {
                    break;
                }
            }

            if new_cards == 0 {
                debug!("No new cards, scrolling (idle round {})", idle_rounds + 1);
                self.page.scroll_results()?;
                idle_rounds += 1;
                scrolls += 1;
                self.pause(self.pacing.settle);
            } else {
                idle_rounds = 0;
                if leads.len() < params.max_results {
                    self.page.scroll_results()?;
                    scrolls += 1;
                    self.pause(self.pacing.settle);
                }
            }
        }

        info!(
            "Collected {}/{} results for '{}' in '{}' ({} scrolls)",
            leads.len(),
            params.max_results,
            params.query,
            params.location,
            scrolls
        );
        if leads.len() < params.max_results {
            warn!("Only {} of {} results were available", leads.len(), params.max_results);
        }
        Ok(leads)
    }

    /// Poll the open detail panel until it shows a phone or website
    fn read_detail(&self) -> Result<DetailInfo> {
        let deadline = Instant::now() + self.pacing.detail_timeout;
        loop {
            let detail = extract::parse_detail(&self.page.detail_html()?);
            if !detail.is_empty() || Instant::now() >= deadline {
                return Ok(detail);
            }
            self.pause(self.pacing.detail_poll);
        }
    }

    /// Detail pass: open the cards of leads missing a phone or website and
    /// fill in whatever the detail panel shows. Each lead is opened once.
    pub fn enrich_missing(
        &self,
        mut leads: Vec<Lead>,
        params: &SearchParams,
        max_clicks: usize,
    ) -> Result<Vec<Lead>> {
        let mut pending: HashMap<String, usize> = HashMap::new();
        for (idx, lead) in leads.iter().enumerate() {
            if lead.missing_contact() {
                pending.entry(lead.name.clone()).or_insert(idx);
            }
        }
        if pending.is_empty() || max_clicks == 0 {
            return Ok(leads);
        }

        info!(
            "Enriching {} leads (up to {} clicks) for '{}' in '{}'",
            pending.len(),
            max_clicks,
            params.query,
            params.location
        );

        self.page.open_search_url(&params.search_text())?;
        if !self.load_initial_results()? {
            warn!("Enrich pass: could not load results list");
            return Ok(leads);
        }

        let mut clicks = 0;
        let mut idle_rounds = 0;

        while clicks < max_clicks
            && idle_rounds < self.pacing.enrich_idle_rounds
            && !pending.is_empty()
        {
            let cards = self.page.result_cards()?;
            let target = cards.iter().enumerate().find_map(|(i, html)| {
                let name = extract::card_name(html)?;
                pending.get(&name).map(|&idx| (i, name, idx))
            });

            let Some((card_index, name, idx)) = target else {
                if !self.page.scroll_results()? {
                    break;
                }
                idle_rounds += 1;
                self.pause(self.pacing.settle);
                continue;
            };
            idle_rounds = 0;
            pending.remove(&name);

            if !self.page.open_card(card_index)? {
                debug!("Enrich pass: timeout waiting for details of '{}'", name);
                if let Err(e) = self.page.back_to_results() {
                    warn!("Enrich pass: could not return to results: {}", e);
                    break;
                }
                continue;
            }

            let detail = self.read_detail()?;
            let lead = &mut leads[idx];
            if lead.phone.is_none() {
                if let Some(phone) = detail.phone {
                    info!("Enrich pass: found phone {} for '{}'", phone, name);
                    lead.phone = Some(phone);
                }
            }
            if lead.website.is_none() {
                if let Some(website) = detail.website {
                    info!("Enrich pass: found website {} for '{}'", website, name);
                    lead.website = Some(website);
                }
            }
            clicks += 1;

            if let Err(e) = self.page.back_to_results() {
                warn!("Enrich pass: could not return to results, stopping: {}", e);
                break;
            }
            self.pause(self.pacing.settle);
        }

        info!("Enrich pass complete, {} clicks used", clicks);
        Ok(leads)
    }
}
