use std::collections::BTreeMap;
use tracing::{info, warn};

/// Counters for one scrape run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScrapeStats {
    pub successful_searches: usize,
    pub zero_result_searches: usize,
    pub failed_searches: usize,
    pub leads_by_location: BTreeMap<String, usize>,
    pub leads_by_category: BTreeMap<String, usize>,
}

impl ScrapeStats {
    /// Start with every location and category at zero so empty ones show up
    pub fn new(locations: &[String], categories: &[String]) -> Self {
        Self {
            leads_by_location: locations.iter().map(|l| (l.clone(), 0)).collect(),
            leads_by_category: categories.iter().map(|c| (c.clone(), 0)).collect(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, location: &str, category: &str, found: usize) {
        if found == 0 {
            self.zero_result_searches += 1;
        } else {
            self.successful_searches += 1;
        }
        *self.leads_by_location.entry(location.to_string()).or_default() += found;
        *self.leads_by_category.entry(category.to_string()).or_default() += found;
    }

    pub fn record_failure(&mut self) {
        self.failed_searches += 1;
    }

    pub fn total_searches(&self) -> usize {
        self.successful_searches + self.zero_result_searches + self.failed_searches
    }

    pub fn total_leads(&self) -> usize {
        self.leads_by_location.values().sum()
    }

    /// Categories that found nothing in any location
    pub fn empty_categories(&self) -> Vec<&str> {
        self.leads_by_category
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    pub fn log_summary(&self) {
        info!("==========================================");
        info!("Scrape summary");
        info!(
            "Searches: {} total, {} with results, {} empty, {} failed",
            self.total_searches(),
            self.successful_searches,
            self.zero_result_searches,
            self.failed_searches
        );
        info!("Leads found: {}", self.total_leads());
        for (location, n) in &self.leads_by_location {
            info!("  {}: {}", location, n);
        }
        for (category, n) in &self.leads_by_category {
            info!("  {}: {}", category, n);
        }

        let empty = self.empty_categories();
        if !empty.is_empty() {
            warn!(
                "No results in any location for: {}. Check the category wording",
                empty.join(", ")
            );
        }
        info!("==========================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_searches_and_leads() {
        let locations = vec!["Queens, NY".to_string(), "Bronx, NY".to_string()];
        let categories = vec!["bars".to_string(), "florists".to_string()];
        let mut stats = ScrapeStats::new(&locations, &categories);

        stats.record("Queens, NY", "bars", 4);
        stats.record("Queens, NY", "florists", 0);
        stats.record("Bronx, NY", "bars", 2);
        stats.record_failure();

        assert_eq!(stats.total_searches(), 4);
        assert_eq!(stats.successful_searches, 2);
        assert_eq!(stats.zero_result_searches, 1);
        assert_eq!(stats.total_leads(), 6);
        assert_eq!(stats.leads_by_location["Bronx, NY"], 2);
        assert_eq!(stats.empty_categories(), ["florists"]);
    }
}
