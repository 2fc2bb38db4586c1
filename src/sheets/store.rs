use crate::error::SheetsError;
use crate::models::{normalize_phone, present, Lead, StoredLead, SHEET_HEADER, SMS_SENT_COLUMN};
use crate::sheets::retry::with_backoff;
use crate::sheets::SheetBackend;
use chrono::Local;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Rows per append request
pub const BATCH_SIZE: usize = 50;

const NAME_COL: usize = 1;
const ADDRESS_COL: usize = 2;
const PHONE_COL: usize = 4;

/// Result of a batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Phones and name+address keys already in the sheet
#[derive(Debug, Default)]
struct DedupIndex {
    phones: HashSet<String>,
    name_address: HashSet<String>,
}

impl DedupIndex {
    fn from_rows(rows: &[Vec<String>]) -> Self {
        let mut index = Self::default();
        for row in rows.iter().skip(1) {
            let cell = |i: usize| row.get(i).and_then(|v| present(v));
            let lead = Lead {
                address: cell(ADDRESS_COL),
                phone: cell(PHONE_COL),
                ..Lead::new(cell(NAME_COL).unwrap_or_default())
            };
            index.insert(&lead);
        }
        index
    }

    fn insert(&mut self, lead: &Lead) {
        if let Some(phone) = lead.normalized_phone() {
            self.phones.insert(phone);
        }
        if let Some(key) = lead.name_address_key() {
            self.name_address.insert(key);
        }
    }

    /// Register the lead, `false` when it duplicates one already known
    fn admit(&mut self, lead: &Lead) -> bool {
        if let Some(phone) = lead.normalized_phone() {
            if self.phones.contains(&phone) {
                debug!("Duplicate (phone): {}", lead.name);
                return false;
            }
        }
        if let Some(key) = lead.name_address_key() {
            if self.name_address.contains(&key) {
                debug!("Duplicate (name+address): {}", lead.name);
                return false;
            }
        }
        self.insert(lead);
        true
    }
}

/// The leads worksheet
pub struct LeadSheet<B: SheetBackend> {
    backend: B,
    retry_base: Duration,
    batch_pause: Duration,
}

impl<B: SheetBackend> LeadSheet<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            retry_base: Duration::from_secs(2),
            batch_pause: Duration::from_secs(1),
        }
    }

    /// No backoff or pauses
    #[cfg(test)]
    pub fn immediate(backend: B) -> Self {
        Self {
            backend,
            retry_base: Duration::ZERO,
            batch_pause: Duration::ZERO,
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SheetsError> {
        with_backoff("Reading sheet", self.retry_base, || self.backend.read_rows()).await
    }

    /// Make sure the worksheet exists and starts with the expected header
    pub async fn connect(&self) -> Result<(), SheetsError> {
        with_backoff("Opening worksheet", self.retry_base, || {
            self.backend.ensure_worksheet()
        })
        .await?;

        let rows = self.read_rows().await?;
        let header: Vec<String> = SHEET_HEADER.iter().map(|h| h.to_string()).collect();
        match rows.first() {
            Some(current) if *current == header => {}
            Some(current) if current.iter().any(|c| !c.trim().is_empty()) => {
                warn!("Header row differs from the expected layout, rewriting it");
                self.backend.update_cells(1, 1, &header).await?;
            }
            _ if rows.len() > 1 => {
                self.backend.update_cells(1, 1, &header).await?;
            }
            _ => {
                info!("Writing header row");
                self.backend.append_rows(&[header]).await?;
            }
        }
        Ok(())
    }

    /// Append leads in chunks, skipping nameless leads and duplicates of
    /// rows already in the sheet or earlier in the batch
    pub async fn add_leads_batch(&self, leads: &[Lead]) -> Result<BatchOutcome, SheetsError> {
        let mut outcome = BatchOutcome::default();
        if leads.is_empty() {
            return Ok(outcome);
        }

        info!("Loading existing rows for duplicate check...");
        let mut index = DedupIndex::from_rows(&self.read_rows().await?);
        info!(
            "Found {} existing phones, {} name+address combinations",
            index.phones.len(),
            index.name_address.len()
        );

        let now = Local::now();
        let mut rows = Vec::new();
        for lead in leads {
            if lead.name.trim().is_empty() || !index.admit(lead) {
                outcome.skipped += 1;
                continue;
            }
            rows.push(lead.to_row(now));
        }

        if rows.is_empty() {
            info!("No new leads to add (all duplicates or invalid)");
            return Ok(outcome);
        }

        let total_batches = rows.len().div_ceil(BATCH_SIZE);
        for (n, chunk) in rows.chunks(BATCH_SIZE).enumerate() {
            info!("Inserting batch {}/{} ({} rows)...", n + 1, total_batches, chunk.len());
            match with_backoff("Appending rows", self.retry_base, || {
                self.backend.append_rows(chunk)
            })
            .await
            {
                Ok(()) => outcome.added += chunk.len(),
                Err(e) => {
                    error!("Failed to insert batch {}: {}", n + 1, e);
                    outcome.failed += chunk.len();
                }
            }

            if n + 1 < total_batches && !self.batch_pause.is_zero() {
                tokio::time::sleep(self.batch_pause).await;
            }
        }

        info!(
            "Batch insert complete: {} added, {} skipped, {} failed",
            outcome.added, outcome.skipped, outcome.failed
        );
        Ok(outcome)
    }

    /// Append one lead. `false` when it has no name or is a duplicate
    pub async fn add_lead(&self, lead: &Lead) -> Result<bool, SheetsError> {
        if lead.name.trim().is_empty() {
            warn!("Skipping lead with no name");
            return Ok(false);
        }

        let mut index = DedupIndex::from_rows(&self.read_rows().await?);
        if !index.admit(lead) {
            return Ok(false);
        }

        let row = lead.to_row(Local::now());
        with_backoff("Appending row", self.retry_base, || {
            self.backend.append_rows(std::slice::from_ref(&row))
        })
        .await?;
        info!(
            "Added lead: {} | {}",
            lead.name,
            lead.phone.as_deref().unwrap_or("No phone")
        );
        Ok(true)
    }

    pub async fn all_leads(&self) -> Result<Vec<StoredLead>, SheetsError> {
        let rows = self.read_rows().await?;
        let Some((header, body)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        Ok(body
            .iter()
            .enumerate()
            .map(|(i, row)| StoredLead::from_row(i + 2, header, row))
            .collect())
    }

    pub async fn leads_without_sms(&self) -> Result<Vec<StoredLead>, SheetsError> {
        Ok(self
            .all_leads()
            .await?
            .into_iter()
            .filter(|lead| !lead.sms_sent)
            .collect())
    }

    /// Number of lead rows, header excluded
    pub async fn count(&self) -> Result<usize, SheetsError> {
        Ok(self.read_rows().await?.len().saturating_sub(1))
    }

    /// Set "SMS Sent" to Yes and record the send time on `row`
    pub async fn mark_sms_sent(&self, row: usize, sent_at: &str) -> Result<(), SheetsError> {
        let values = ["Yes".to_string(), sent_at.to_string()];
        with_backoff("Updating SMS status", self.retry_base, || {
            self.backend.update_cells(row, SMS_SENT_COLUMN, &values)
        })
        .await?;
        info!("Updated SMS status for row {}", row);
        Ok(())
    }
}

/// Normalized phone of a stored lead, for log lines and matching
pub fn stored_phone_digits(lead: &StoredLead) -> Option<String> {
    lead.phone
        .as_deref()
        .map(normalize_phone)
        .filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::memory::MemorySheet;

    fn header() -> Vec<String> {
        SHEET_HEADER.iter().map(|h| h.to_string()).collect()
    }

    fn lead(name: &str, address: Option<&str>, phone: Option<&str>) -> Lead {
        Lead {
            address: address.map(str::to_string),
            phone: phone.map(str::to_string),
            ..Lead::new(name)
        }
    }

    fn existing_row(name: &str, address: &str, phone: &str, sms: &str) -> Vec<String> {
        let mut row = vec![String::new(); SHEET_HEADER.len()];
        row[NAME_COL] = name.into();
        row[ADDRESS_COL] = address.into();
        row[PHONE_COL] = phone.into();
        row[SMS_SENT_COLUMN - 1] = sms.into();
        row
    }

    #[tokio::test]
    async fn connect_writes_header_to_empty_sheet() {
        let sheet = LeadSheet::immediate(MemorySheet::default());
        sheet.connect().await.unwrap();
        assert_eq!(sheet.backend().rows(), vec![header()]);
        assert!(sheet.backend().worksheet_ensured());

        // second connect leaves it alone
        sheet.connect().await.unwrap();
        assert_eq!(sheet.backend().rows().len(), 1);
    }

    #[tokio::test]
    async fn connect_rewrites_wrong_header_in_place() {
        let backend = MemorySheet::with_rows(vec![
            vec!["Name".into(), "Phone".into()],
            existing_row("Joe's", "1 Main St", "718-555-0134", "No"),
        ]);
        let sheet = LeadSheet::immediate(backend);
        sheet.connect().await.unwrap();
        let rows = sheet.backend().rows();
        assert_eq!(rows[0], header());
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn batch_skips_duplicates_and_nameless_leads() {
        let backend = MemorySheet::with_rows(vec![
            header(),
            existing_row("Joe's", "1 Main St, Queens, NY 11101", "(718) 555-0134", "No"),
        ]);
        let sheet = LeadSheet::immediate(backend);

        let leads = vec![
            lead("Other", None, Some("718.555.0134")),               // phone already stored
            lead("JOE'S", Some("1 main st, queens, ny 11101"), None), // name+address stored
            lead("  ", None, None),                                 // no name
            lead("New Bar", Some("2 Main St"), Some("718-555-0999")),
            lead("New Bar Again", None, Some("7185550999")),          // duplicate within batch
            lead("No Phone Cafe", None, None),
        ];
        let outcome = sheet.add_leads_batch(&leads).await.unwrap();
        assert_eq!(
            outcome,
            BatchOutcome {
                added: 2,
                skipped: 4,
                failed: 0
            }
        );

        let rows = sheet.backend().rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2][NAME_COL], "New Bar");
        assert_eq!(rows[3][NAME_COL], "No Phone Cafe");
        assert_eq!(rows[3][PHONE_COL], "N/A");
    }

    #[tokio::test]
    async fn batch_splits_into_chunks_and_counts_failures() {
        let backend = MemorySheet::with_rows(vec![header()]).failing_appends(5);
        let sheet = LeadSheet::immediate(backend);
        let leads: Vec<Lead> = (0..120).map(|i| lead(&format!("Biz {i}"), None, None)).collect();

        // the first chunk exhausts all five attempts, the rest go through
        let outcome = sheet.add_leads_batch(&leads).await.unwrap();
        assert_eq!(outcome.added, 70);
        assert_eq!(outcome.failed, 50);
        assert_eq!(sheet.backend().append_calls(), 5 + 2);
        assert_eq!(sheet.count().await.unwrap(), 70);
    }

    #[tokio::test]
    async fn single_insert_checks_duplicates() {
        let backend = MemorySheet::with_rows(vec![
            header(),
            existing_row("Joe's", "1 Main St", "718-555-0134", "No"),
        ]);
        let sheet = LeadSheet::immediate(backend);
        assert!(!sheet.add_lead(&lead("X", None, Some("7185550134"))).await.unwrap());
        assert!(!sheet.add_lead(&lead("", None, None)).await.unwrap());
        assert!(sheet.add_lead(&lead("Y", None, Some("7185550000"))).await.unwrap());
        assert_eq!(sheet.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reads_leads_and_marks_sms() {
        let backend = MemorySheet::with_rows(vec![
            header(),
            existing_row("A", "1 Main St", "718-555-0001", "Yes"),
            existing_row("B", "2 Main St", "718-555-0002", "no"),
            existing_row("C", "3 Main St", "N/A", ""),
        ]);
        let sheet = LeadSheet::immediate(backend);

        let pending = sheet.leads_without_sms().await.unwrap();
        let names: Vec<_> = pending.iter().map(|l| l.business_name.as_str()).collect();
        assert_eq!(names, ["B", "C"]);
        assert_eq!(pending[0].row, 3);
        assert_eq!(stored_phone_digits(&pending[0]).as_deref(), Some("7185550002"));
        assert_eq!(stored_phone_digits(&pending[1]), None);

        sheet.mark_sms_sent(3, "2026-03-01 10:00:00").await.unwrap();
        let rows = sheet.backend().rows();
        assert_eq!(rows[2][SMS_SENT_COLUMN - 1], "Yes");
        assert_eq!(rows[2][SMS_SENT_COLUMN], "2026-03-01 10:00:00");
        assert_eq!(sheet.leads_without_sms().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_sheet_has_no_leads() {
        let sheet = LeadSheet::immediate(MemorySheet::default());
        assert!(sheet.all_leads().await.unwrap().is_empty());
        assert_eq!(sheet.count().await.unwrap(), 0);
    }
}
