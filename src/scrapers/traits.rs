use anyhow::Result;

/// Browser operations the map scraper needs.
///
/// Implemented by [`ChromeMapsPage`](super::ChromeMapsPage) for real runs; the
/// scroll and enrichment loops only ever talk to this trait.
pub trait MapsPage {
    /// Open the map home page and submit `text` through the search box
    fn open_search(&self, text: &str) -> Result<()>;

    /// Navigate straight to the search URL for `text`
    fn open_search_url(&self, text: &str) -> Result<()>;

    /// Wait for the results list. `false` when it never shows up
    fn wait_for_results(&self) -> Result<bool>;

    /// Outer HTML of every visible result card, in list order
    fn result_cards(&self) -> Result<Vec<String>>;

    /// Scroll the results list. `false` when it did not move
    fn scroll_results(&self) -> Result<bool>;

    /// Click card `index` and wait for its detail panel. `false` on timeout
    fn open_card(&self, index: usize) -> Result<bool>;

    /// HTML of the page while a detail panel is open
    fn detail_html(&self) -> Result<String>;

    /// Leave the detail panel and wait for the results list again
    fn back_to_results(&self) -> Result<()>;
}
