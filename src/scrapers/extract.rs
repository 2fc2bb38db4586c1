//! Field extraction from result cards and detail panels.
//!
//! Everything here works on captured HTML so it can run without a browser.

use crate::models::{present, Lead};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

const STREET_KEYWORDS: &str = r"\b(St|Street|Ave|Avenue|Blvd|Boulevard|Road|Rd|Dr|Drive|Lane|Ln|Way|Pl|Place|Hwy|Pkwy)\b";

/// Phone and website read from a place detail panel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailInfo {
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl DetailInfo {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.website.is_none()
    }
}

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn street_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, STREET_KEYWORDS)
}

fn phone_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(\+?\d[\d\-.\s()]{7,}\d)")
}

fn phone_text_res() -> &'static [Regex; 2] {
    static RES: OnceLock<[Regex; 2]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // US, optional country code
            Regex::new(r"(\+?1?[\s\-.]?\(?\d{3}\)?[\s\-.]?\d{3}[\s\-.]?\d{4})").expect("static regex"),
            // international
            Regex::new(r"(\+\d{1,3}[\s\-.]?\d{1,4}[\s\-.]?\d{1,4}[\s\-.]?\d{1,9})").expect("static regex"),
        ]
    })
}

fn rating_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"(\d\.\d)\s*★").expect("static regex"),
            Regex::new(r"Rated\s+(\d\.\d)\s+out of").expect("static regex"),
            Regex::new(r"(\d\.\d)\s+stars?").expect("static regex"),
        ]
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(https?://[^\s]+)")
}

/// Outermost element of a fragment
fn top_element(fragment: &Html) -> Option<ElementRef<'_>> {
    let any = sel("*");
    fragment
        .select(&any)
        .find(|e| !matches!(e.value().name(), "html" | "head" | "body"))
}

fn lines_of(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .flat_map(|chunk| chunk.split('\n'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Visible text lines of a card, in document order
pub fn card_lines(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    match top_element(&fragment) {
        Some(root) => lines_of(root),
        None => Vec::new(),
    }
}

/// Business name shown on a card
pub fn card_name(html: &str) -> Option<String> {
    card_lines(html).into_iter().next()
}

/// Stable key for a card: result id, then aria-label, then its name
pub fn card_identity(html: &str) -> Option<String> {
    let fragment = Html::parse_fragment(html);
    let root = top_element(&fragment)?;
    ["data-result-id", "aria-label"]
        .iter()
        .filter_map(|attr| root.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| lines_of(root).into_iter().next())
}

/// Two-letter state from `123 Main St, New York, NY 10001`
pub fn state_from_address(address: &str) -> Option<String> {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    if parts.len() < 3 {
        return None;
    }
    let token = parts.last()?.split_whitespace().next()?;
    if token.len() == 2 && token.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(token.to_ascii_uppercase())
    } else {
        None
    }
}

/// Strip `tel:`, `Phone:` and `Call:` prefixes
pub fn clean_phone(raw: &str) -> Option<String> {
    let mut text = raw.trim();
    for prefix in ["tel:", "Phone:", "Call:"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim();
        }
    }
    present(text)
}

fn is_map_link(url: &str) -> bool {
    url.contains("google.com/maps") || url.contains("maps.google.com")
}

fn is_web_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Website from an attribute value that may wrap the URL in other text
fn website_from(value: &str) -> Option<String> {
    let value = value.trim();
    let url = if is_web_url(value) {
        value.to_string()
    } else {
        url_re().captures(value)?.get(1)?.as_str().to_string()
    };
    (!is_map_link(&url)).then_some(url)
}

fn card_address(lines: &[String]) -> Option<String> {
    let rest = lines.get(1..)?;
    rest.iter()
        .find(|line| street_re().is_match(line) && line.chars().any(|c| c.is_ascii_digit()))
        .or_else(|| {
            rest.iter()
                .find(|line| line.contains(',') && line.chars().any(char::is_alphabetic))
        })
        .cloned()
}

fn card_phone(root: ElementRef<'_>, lines: &[String]) -> Option<String> {
    let tel = root
        .select(&sel("a[href^='tel:']"))
        .filter_map(|a| a.value().attr("href"))
        .find_map(clean_phone);
    if tel.is_some() {
        return tel;
    }

    let labelled = root
        .select(&sel("button[data-item-id*='phone'], button[aria-label*='Phone'], button[aria-label*='Call']"))
        .find_map(|button| {
            let label = button.value().attr("aria-label").unwrap_or_default();
            let text = button.text().collect::<String>();
            [label, text.as_str()]
                .iter()
                .find_map(|s| phone_label_re().captures(s).map(|c| c[1].trim().to_string()))
        });
    if labelled.is_some() {
        return labelled.and_then(|p| clean_phone(&p));
    }

    lines.iter().find_map(|line| {
        phone_text_res()
            .iter()
            .find_map(|re| re.captures(line))
            .and_then(|c| clean_phone(&c[1]))
    })
}

fn card_rating(root: ElementRef<'_>, lines: &[String]) -> Option<String> {
    let labelled = sel("[aria-label]");
    let labels = root
        .select(&labelled)
        .filter_map(|e| e.value().attr("aria-label"))
        .map(str::to_string);
    let haystacks: Vec<String> = std::iter::once(lines.join("\n")).chain(labels).collect();

    rating_res().iter().find_map(|re| {
        haystacks
            .iter()
            .find_map(|h| re.captures(h).map(|c| c[1].to_string()))
    })
}

fn card_website(root: ElementRef<'_>, lines: &[String]) -> Option<String> {
    let linked = root
        .select(&sel("a[href]"))
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| is_web_url(href))
        .find_map(website_from);
    if linked.is_some() {
        return linked;
    }

    let labelled = root
        .select(&sel("button[aria-label*='Website'], button[aria-label*='website'], button[data-item-id*='authority']"))
        .filter_map(|b| b.value().attr("aria-label"))
        .find_map(|label| url_re().captures(label).and_then(|c| website_from(&c[1])));
    if labelled.is_some() {
        return labelled;
    }

    lines
        .iter()
        .find_map(|line| url_re().captures(line).and_then(|c| website_from(&c[1])))
}

/// Read a result card without opening its detail panel
pub fn parse_card(html: &str, query: &str, location: &str) -> Option<Lead> {
    let fragment = Html::parse_fragment(html);
    let root = top_element(&fragment)?;
    let lines = lines_of(root);
    let name = lines.first()?.clone();

    let address = card_address(&lines);
    let state = address
        .as_deref()
        .and_then(state_from_address)
        .or_else(|| {
            location
                .rsplit_once(',')
                .and_then(|(_, state)| present(state))
        });

    Some(Lead {
        name,
        phone: card_phone(root, &lines),
        rating: card_rating(root, &lines),
        website: card_website(root, &lines),
        address,
        state,
        category: present(query),
        search_location: None,
        search_category: None,
    })
}

/// Read phone and website from an opened place panel
pub fn parse_detail(html: &str) -> DetailInfo {
    let doc = Html::parse_document(html);

    let phone = doc
        .select(&sel("button[data-item-id^='phone:tel:']"))
        .filter_map(|b| b.value().attr("data-item-id"))
        .find_map(|id| clean_phone(id.trim_start_matches("phone:tel:")))
        .or_else(|| {
            doc.select(&sel("button[aria-label^='Phone:'], button[aria-label^='Call:']"))
                .filter_map(|b| b.value().attr("aria-label"))
                .find_map(clean_phone)
        })
        .or_else(|| {
            doc.select(&sel("a[href^='tel:']"))
                .filter_map(|a| a.value().attr("href"))
                .find_map(clean_phone)
        });

    let website = doc
        .select(&sel("a[data-item-id='authority'], a[aria-label^='Website']"))
        .filter_map(|a| a.value().attr("href"))
        .find_map(website_from)
        .or_else(|| {
            doc.select(&sel("button[aria-label^='Website']"))
                .filter_map(|b| b.value().attr("aria-label"))
                .find_map(website_from)
        });

    DetailInfo { phone, website }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <div role="article" aria-label="Joe's Tavern">
          <a href="https://www.google.com/maps/place/joes"></a>
          <div class="name">Joe's Tavern</div>
          <span role="img" aria-label="4.6 stars 312 Reviews"></span>
          <div>Bar · 12-34 Broadway St, Astoria, NY 11106</div>
          <div>Open ⋅ Closes 2 AM</div>
          <div>(718) 555-0134</div>
          <a href="https://joestavern.example.com/">Website</a>
        </div>"#;

    #[test]
    fn reads_every_field_from_a_card() {
        let lead = parse_card(CARD, "bars", "Queens, NY").unwrap();
        assert_eq!(lead.name, "Joe's Tavern");
        assert_eq!(
            lead.address.as_deref(),
            Some("Bar · 12-34 Broadway St, Astoria, NY 11106")
        );
        assert_eq!(lead.state.as_deref(), Some("NY"));
        assert_eq!(lead.phone.as_deref(), Some("(718) 555-0134"));
        assert_eq!(lead.rating.as_deref(), Some("4.6"));
        assert_eq!(lead.website.as_deref(), Some("https://joestavern.example.com/"));
        assert_eq!(lead.category.as_deref(), Some("bars"));
    }

    #[test]
    fn sparse_card_falls_back_to_location_state() {
        let html = r#"<div role="article"><div>Corner Deli</div><div>Deli</div></div>"#;
        let lead = parse_card(html, "delis", "Staten Island, NY").unwrap();
        assert_eq!(lead.name, "Corner Deli");
        assert_eq!(lead.address, None);
        assert_eq!(lead.state.as_deref(), Some("NY"));
        assert_eq!(lead.phone, None);
        assert_eq!(lead.website, None);
        assert_eq!(lead.rating, None);
        assert!(lead.missing_contact());
    }

    #[test]
    fn empty_card_is_skipped() {
        assert!(parse_card(r#"<div role="article">   </div>"#, "bars", "Queens, NY").is_none());
    }

    #[test]
    fn comma_line_is_the_address_fallback() {
        let html = r#"<div><div>Harbor Hotel</div><div>4.1★</div><div>Pier 9, Brooklyn</div></div>"#;
        let lead = parse_card(html, "hotels", "Brooklyn").unwrap();
        assert_eq!(lead.address.as_deref(), Some("Pier 9, Brooklyn"));
        assert_eq!(lead.rating.as_deref(), Some("4.1"));
        assert_eq!(lead.state, None);
    }

    #[test]
    fn tel_link_wins_over_text() {
        let html = r#"<div><div>Club 9</div><a href="tel:+17185550000">call</a><div>212-555-9999</div></div>"#;
        let lead = parse_card(html, "nightclubs", "Manhattan, NY").unwrap();
        assert_eq!(lead.phone.as_deref(), Some("+17185550000"));
    }

    #[test]
    fn identity_prefers_result_id() {
        let html = r#"<div data-result-id="r-42" aria-label="Club 9"><div>Club 9</div></div>"#;
        assert_eq!(card_identity(html).as_deref(), Some("r-42"));
        assert_eq!(card_identity(CARD).as_deref(), Some("Joe's Tavern"));
        let plain = r#"<div><div>Only Text</div></div>"#;
        assert_eq!(card_identity(plain).as_deref(), Some("Only Text"));
        assert_eq!(card_name(CARD).as_deref(), Some("Joe's Tavern"));
    }

    #[test]
    fn state_needs_three_parts_and_two_letters() {
        assert_eq!(state_from_address("123 Main St, New York, ny 10001").as_deref(), Some("NY"));
        assert_eq!(state_from_address("123 Main St, New York"), None);
        assert_eq!(state_from_address("1 A St, Town, 10001"), None);
    }

    #[test]
    fn cleans_phone_prefixes() {
        assert_eq!(clean_phone("Phone: (718) 555-0134").as_deref(), Some("(718) 555-0134"));
        assert_eq!(clean_phone("tel:+17185550134").as_deref(), Some("+17185550134"));
        assert_eq!(clean_phone("Call: "), None);
        assert_eq!(clean_phone("N/A"), None);
    }

    #[test]
    fn reads_detail_panel() {
        let html = r#"<html><body>
            <h1>Joe's Tavern</h1>
            <a data-item-id="authority" href="https://joestavern.example.com">joestavern.example.com</a>
            <button data-item-id="phone:tel:+17185550134" aria-label="Phone: (718) 555-0134"></button>
        </body></html>"#;
        let detail = parse_detail(html);
        assert_eq!(detail.phone.as_deref(), Some("+17185550134"));
        assert_eq!(detail.website.as_deref(), Some("https://joestavern.example.com"));
    }

    #[test]
    fn detail_ignores_map_links() {
        let html = r#"<html><body>
            <a aria-label="Website" href="https://www.google.com/maps/place/x"></a>
            <button aria-label="Call: 212-555-0101"></button>
        </body></html>"#;
        let detail = parse_detail(html);
        assert_eq!(detail.phone.as_deref(), Some("212-555-0101"));
        assert_eq!(detail.website, None);
        assert!(DetailInfo::default().is_empty());
    }
}
