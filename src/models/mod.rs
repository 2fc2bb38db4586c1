use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Placeholder written to the sheet for absent fields
pub const NOT_AVAILABLE: &str = "N/A";

/// Column layout of the leads worksheet
pub const SHEET_HEADER: [&str; 13] = [
    "Date Added",
    "Business Name",
    "Address",
    "State",
    "Phone",
    "Website",
    "Category",
    "Search Location",
    "Search Category",
    "Rating",
    "SMS Sent",
    "SMS Date",
    "Notes",
];

/// 1-based column of "SMS Sent"
pub const SMS_SENT_COLUMN: usize = 11;

/// Business lead collected from a map search
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub name: String,
    pub address: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
    pub rating: Option<String>,
    pub search_location: Option<String>,
    pub search_category: Option<String>,
}

impl Lead {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// True when the phone or website still needs to be found
    pub fn missing_contact(&self) -> bool {
        self.phone.is_none() || self.website.is_none()
    }

    /// Digits of the phone number, if there are any
    pub fn normalized_phone(&self) -> Option<String> {
        self.phone
            .as_deref()
            .map(normalize_phone)
            .filter(|digits| !digits.is_empty())
    }

    /// Lowercased `name|address`, only when both are known
    pub fn name_address_key(&self) -> Option<String> {
        let name = self.name.trim();
        let address = self.address.as_deref()?.trim();
        if name.is_empty() || address.is_empty() {
            return None;
        }
        Some(format!("{}|{}", name.to_lowercase(), address.to_lowercase()))
    }

    /// Render the lead as a worksheet row
    pub fn to_row(&self, added_at: DateTime<Local>) -> Vec<String> {
        let or_na = |v: &Option<String>| v.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
        vec![
            added_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.name.trim().to_string(),
            or_na(&self.address),
            or_na(&self.state),
            or_na(&self.phone),
            or_na(&self.website),
            or_na(&self.category),
            or_na(&self.search_location),
            or_na(&self.search_category),
            or_na(&self.rating),
            "No".to_string(),
            String::new(),
            String::new(),
        ]
    }
}

/// Lead as read back from the worksheet
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoredLead {
    /// 1-based sheet row
    pub row: usize,
    pub date_added: String,
    pub business_name: String,
    pub address: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub category: Option<String>,
    pub search_location: Option<String>,
    pub search_category: Option<String>,
    pub rating: Option<String>,
    pub sms_sent: bool,
    pub sms_date: Option<String>,
    pub notes: Option<String>,
}

impl StoredLead {
    /// Build from a sheet row, looking fields up by header name
    pub fn from_row(row_number: usize, header: &[String], row: &[String]) -> Self {
        let cell = |name: &str| -> Option<String> {
            let idx = header.iter().position(|h| h.trim() == name)?;
            present(row.get(idx)?)
        };

        Self {
            row: row_number,
            date_added: cell("Date Added").unwrap_or_default(),
            business_name: cell("Business Name").unwrap_or_default(),
            address: cell("Address"),
            state: cell("State"),
            phone: cell("Phone"),
            website: cell("Website"),
            category: cell("Category"),
            search_location: cell("Search Location"),
            search_category: cell("Search Category"),
            rating: cell("Rating"),
            sms_sent: cell("SMS Sent")
                .map(|v| v.eq_ignore_ascii_case("yes"))
                .unwrap_or(false),
            sms_date: cell("SMS Date"),
            notes: cell("Notes"),
        }
    }
}

/// Trimmed value, or None when empty or the `N/A` placeholder
pub fn present(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value == NOT_AVAILABLE {
        None
    } else {
        Some(value.to_string())
    }
}

/// Keep only the digits of a phone number
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Drop leads whose normalized phone was already seen. Leads without a phone
/// are always kept.
pub fn dedupe_by_phone(leads: Vec<Lead>) -> (Vec<Lead>, usize) {
    let mut seen = HashSet::new();
    let mut removed = 0;
    let unique = leads
        .into_iter()
        .filter(|lead| match lead.normalized_phone() {
            Some(phone) => {
                if seen.insert(phone) {
                    true
                } else {
                    removed += 1;
                    false
                }
            }
            None => true,
        })
        .collect();
    (unique, removed)
}
