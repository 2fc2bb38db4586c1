use crate::config::BrowserConfig;
use crate::scrapers::traits::MapsPage;
use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const CONSENT_JS: &str = r#"
(() => {
    const wanted = ['Accept all', 'I agree', 'Accept'];
    const button = Array.from(document.querySelectorAll('button'))
        .find(b => wanted.some(w => (b.innerText || '').includes(w)));
    if (button) { button.click(); return true; }
    return false;
})()
"#;

/// [`MapsPage`] backed by a Chrome tab
pub struct ChromeMapsPage {
    // dropping the browser closes Chrome
    _browser: Browser,
    tab: Arc<Tab>,
    config: BrowserConfig,
}

impl ChromeMapsPage {
    /// Launch Chrome and open a tab
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", config.headless);

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((1366, 900)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open a browser tab")?;

        Ok(Self {
            _browser: browser,
            tab,
            config: config.clone(),
        })
    }

    fn settle(&self) {
        thread::sleep(Duration::from_millis(self.config.settle_millis));
    }

    fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to open {}", url))?;
        self.tab.wait_until_navigated()?;
        self.settle();
        self.accept_consent();
        Ok(())
    }

    fn accept_consent(&self) {
        match self.tab.evaluate(CONSENT_JS, false) {
            Ok(result) if result.value == Some(Value::Bool(true)) => {
                info!("Clicked consent button");
                self.settle();
            }
            Ok(_) => {}
            Err(e) => debug!("Consent check failed: {}", e),
        }
    }

    /// JS expression yielding the card elements of the first matching selector
    fn cards_js(&self) -> Result<String> {
        let selectors = serde_json::to_string(&self.config.result_cards)?;
        Ok(format!(
            "(() => {{ for (const sel of {selectors}) {{ \
                 const els = document.querySelectorAll(sel); \
                 if (els.length) return Array.from(els); \
             }} return []; }})()"
        ))
    }

    fn feed_js(&self) -> Result<String> {
        Ok(format!(
            "document.querySelector({})",
            serde_json::to_string(&self.config.results_feed)?
        ))
    }

    fn eval(&self, js: &str) -> Result<Option<Value>> {
        Ok(self.tab.evaluate(js, false)?.value)
    }

    fn scroll_top(&self) -> Result<Option<f64>> {
        let js = format!("(() => {{ const el = {}; return el ? el.scrollTop : null; }})()", self.feed_js()?);
        Ok(self.eval(&js)?.and_then(|v| v.as_f64()))
    }

    fn results_timeout(&self) -> Duration {
        Duration::from_secs(self.config.results_timeout_secs)
    }
}

impl MapsPage for ChromeMapsPage {
    fn open_search(&self, text: &str) -> Result<()> {
        self.navigate(&self.config.base_url)?;

        let search_box = self
            .tab
            .wait_for_element_with_custom_timeout(
                &self.config.search_box,
                Duration::from_secs(self.config.search_box_timeout_secs),
            )
            .context("Could not find the search box")?;
        search_box.click()?;

        let clear = format!(
            "(() => {{ const el = document.querySelector({}); if (el) el.value = ''; }})()",
            serde_json::to_string(&self.config.search_box)?
        );
        self.tab.evaluate(&clear, false)?;

        search_box.type_into(text)?;
        self.tab.press_key("Enter")?;
        self.settle();
        Ok(())
    }

    fn open_search_url(&self, text: &str) -> Result<()> {
        let url = format!("{}{}", self.config.search_url, urlencoding::encode(text));
        self.navigate(&url)
    }

    fn wait_for_results(&self) -> Result<bool> {
        match self
            .tab
            .wait_for_element_with_custom_timeout(&self.config.results_feed, self.results_timeout())
        {
            Ok(_) => Ok(true),
            Err(_) => {
                let body = self
                    .tab
                    .find_element("body")
                    .and_then(|b| b.get_inner_text())
                    .unwrap_or_default()
                    .to_lowercase();
                if body.contains("no results") || body.contains("didn't match") {
                    warn!("The map shows no results for this search");
                } else {
                    warn!("Results list did not appear in time");
                }
                Ok(false)
            }
        }
    }

    fn result_cards(&self) -> Result<Vec<String>> {
        let js = format!(
            "JSON.stringify({}.map(e => e.outerHTML))",
            self.cards_js()?
        );
        let cards = match self.eval(&js)? {
            Some(Value::String(json)) => serde_json::from_str(&json)?,
            _ => Vec::new(),
        };
        Ok(cards)
    }

    fn scroll_results(&self) -> Result<bool> {
        let Some(before) = self.scroll_top()? else {
            return Ok(false);
        };
        let js = format!(
            "(() => {{ const el = {}; if (el) el.scrollTop = el.scrollHeight; }})()",
            self.feed_js()?
        );
        self.tab.evaluate(&js, false)?;
        self.settle();

        let after = self.scroll_top()?.unwrap_or(before);
        if after == before && after > 0.0 {
            debug!("Reached end of results list");
            return Ok(false);
        }
        Ok(true)
    }

    fn open_card(&self, index: usize) -> Result<bool> {
        let js = format!(
            "(() => {{ const el = {}[{index}]; if (!el) return false; \
                 el.scrollIntoView(); (el.querySelector('a') || el).click(); return true; }})()",
            self.cards_js()?
        );
        if self.eval(&js)? != Some(Value::Bool(true)) {
            return Ok(false);
        }

        let opened = self
            .tab
            .wait_for_element_with_custom_timeout(
                &self.config.detail_header,
                Duration::from_secs(self.config.detail_timeout_secs),
            )
            .is_ok();
        if opened {
            self.settle();
        }
        Ok(opened)
    }

    fn detail_html(&self) -> Result<String> {
        self.tab.get_content()
    }

    fn back_to_results(&self) -> Result<()> {
        self.tab.evaluate("window.history.back()", false)?;
        self.settle();
        self.tab
            .wait_for_element_with_custom_timeout(&self.config.results_feed, self.results_timeout())
            .context("Results list did not come back")?;
        Ok(())
    }
}
