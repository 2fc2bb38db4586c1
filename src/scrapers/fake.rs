//! In-memory [`MapsPage`] for tests.

use super::extract;
use super::traits::MapsPage;
use anyhow::{anyhow, bail, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// Result list revealed one batch per successful scroll
pub struct FakePage {
    batches: Vec<Vec<String>>,
    revealed: Cell<usize>,
    failed_loads: Cell<usize>,
    never_loads: bool,
    search_box_broken: bool,
    back_broken: bool,
    card_reads_left: Cell<Option<usize>>,
    scroll_calls: Cell<usize>,
    details: HashMap<String, String>,
    current: RefCell<Option<String>>,
    searches: RefCell<Vec<String>>,
    url_loads: Cell<usize>,
    opened: RefCell<Vec<String>>,
}

impl FakePage {
    pub fn new(batches: Vec<Vec<String>>) -> Self {
        Self {
            batches,
            revealed: Cell::new(1),
            failed_loads: Cell::new(0),
            never_loads: false,
            search_box_broken: false,
            back_broken: false,
            card_reads_left: Cell::new(None),
            scroll_calls: Cell::new(0),
            details: HashMap::new(),
            current: RefCell::new(None),
            searches: RefCell::new(Vec::new()),
            url_loads: Cell::new(0),
            opened: RefCell::new(Vec::new()),
        }
    }

    pub fn without_results(mut self) -> Self {
        self.never_loads = true;
        self
    }

    /// Every search box submit fails; direct URL loads still work
    pub fn with_broken_search_box(mut self) -> Self {
        self.search_box_broken = true;
        self
    }

    /// Going back from a detail panel always fails
    pub fn with_broken_back(mut self) -> Self {
        self.back_broken = true;
        self
    }

    /// Cards are listed for the first `n` reads, then the list is empty
    pub fn cards_vanish_after(self, n: usize) -> Self {
        self.card_reads_left.set(Some(n));
        self
    }

    /// The first `n` waits for results fail
    pub fn results_after(self, n: usize) -> Self {
        self.failed_loads.set(n);
        self
    }

    pub fn with_detail(mut self, name: &str, html: String) -> Self {
        self.details.insert(name.to_string(), html);
        self
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.borrow().clone()
    }

    pub fn url_loads(&self) -> usize {
        self.url_loads.get()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }

    pub fn scroll_calls(&self) -> usize {
        self.scroll_calls.get()
    }

    fn visible(&self) -> Vec<String> {
        let n = self.revealed.get().min(self.batches.len());
        self.batches[..n].concat()
    }
}

impl MapsPage for FakePage {
    fn open_search(&self, text: &str) -> Result<()> {
        self.searches.borrow_mut().push(text.to_string());
        if self.search_box_broken {
            bail!("Could not find the search box");
        }
        Ok(())
    }

    fn open_search_url(&self, _text: &str) -> Result<()> {
        self.url_loads.set(self.url_loads.get() + 1);
        Ok(())
    }

    fn wait_for_results(&self) -> Result<bool> {
        if self.never_loads {
            return Ok(false);
        }
        let failures = self.failed_loads.get();
        if failures > 0 {
            self.failed_loads.set(failures - 1);
            return Ok(false);
        }
        Ok(true)
    }

    fn result_cards(&self) -> Result<Vec<String>> {
        match self.card_reads_left.get() {
            Some(0) => return Ok(Vec::new()),
            Some(n) => self.card_reads_left.set(Some(n - 1)),
            None => {}
        }
        Ok(self.visible())
    }

    fn scroll_results(&self) -> Result<bool> {
        self.scroll_calls.set(self.scroll_calls.get() + 1);
        let n = self.revealed.get();
        if n < self.batches.len() {
            self.revealed.set(n + 1);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn open_card(&self, index: usize) -> Result<bool> {
        let cards = self.visible();
        let html = cards.get(index).ok_or_else(|| anyhow!("no card {}", index))?;
        let name = extract::card_name(html).unwrap_or_default();
        self.opened.borrow_mut().push(name.clone());
        let found = self.details.contains_key(&name);
        *self.current.borrow_mut() = Some(name);
        Ok(found)
    }

    fn detail_html(&self) -> Result<String> {
        let current = self.current.borrow();
        let name = current.as_ref().ok_or_else(|| anyhow!("no detail open"))?;
        Ok(self.details.get(name).cloned().unwrap_or_default())
    }

    fn back_to_results(&self) -> Result<()> {
        *self.current.borrow_mut() = None;
        if self.back_broken {
            bail!("Results list did not come back");
        }
        Ok(())
    }
}

/// Result card HTML
pub fn card(name: &str, phone: Option<&str>) -> String {
    let phone = phone
        .map(|p| format!("<div>{}</div>", p))
        .unwrap_or_default();
    format!(
        r#"<div role="article" aria-label="{name}"><div>{name}</div><div>Bar · 1 Main St, Queens, NY 11101</div>{phone}</div>"#
    )
}

/// Detail panel HTML
pub fn detail(phone: Option<&str>, website: Option<&str>) -> String {
    let phone = phone
        .map(|p| format!(r#"<button aria-label="Phone: {}"></button>"#, p))
        .unwrap_or_default();
    let website = website
        .map(|w| format!(r#"<a data-item-id="authority" href="{}">site</a>"#, w))
        .unwrap_or_default();
    format!("<html><body><h1>Place</h1>{phone}{website}</body></html>")
}
