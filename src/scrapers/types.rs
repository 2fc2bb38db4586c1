use crate::config::{BrowserConfig, ScrapeConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One map search: a business category in a location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchParams {
    /// Business category, e.g. "bars"
    pub query: String,
    /// City or area, e.g. "Queens, NY"
    pub location: String,
    /// Stop once this many leads are collected
    pub max_results: usize,
}

impl SearchParams {
    pub fn new(query: impl Into<String>, location: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            location: location.into(),
            max_results,
        }
    }

    /// Text typed into the search box
    pub fn search_text(&self) -> String {
        format!("{} in {}", self.query, self.location)
    }
}

/// Bounds and pauses of the scroll and enrichment loops
#[derive(Debug, Clone)]
pub struct Pacing {
    pub max_idle_scrolls: usize,
    pub max_empty_scrolls: usize,
    pub search_retries: usize,
    /// Scrolls tried while waiting for the first cards
    pub initial_scrolls: usize,
    /// Idle rounds before the enrichment pass gives up
    pub enrich_idle_rounds: usize,
    pub settle: Duration,
    pub detail_timeout: Duration,
    pub detail_poll: Duration,
}

impl Pacing {
    pub fn from_config(scrape: &ScrapeConfig, browser: &BrowserConfig) -> Self {
        Self {
            max_idle_scrolls: scrape.max_idle_scrolls,
            max_empty_scrolls: scrape.max_empty_scrolls,
            search_retries: scrape.search_retries,
            initial_scrolls: 6,
            enrich_idle_rounds: 4,
            settle: Duration::from_millis(browser.settle_millis),
            detail_timeout: Duration::from_secs(browser.detail_timeout_secs),
            detail_poll: Duration::from_millis(300),
        }
    }

    /// No sleeping at all
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            max_idle_scrolls: 15,
            max_empty_scrolls: 5,
            search_retries: 2,
            initial_scrolls: 6,
            enrich_idle_rounds: 4,
            settle: Duration::ZERO,
            detail_timeout: Duration::ZERO,
            detail_poll: Duration::ZERO,
        }
    }
}
