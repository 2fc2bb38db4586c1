pub mod auth;
pub mod client;
pub mod retry;
pub mod store;

#[cfg(test)]
pub mod memory;

use crate::error::SheetsError;
use async_trait::async_trait;

pub use client::SheetsClient;
pub use store::LeadSheet;

/// Row-level access to one worksheet
#[async_trait]
pub trait SheetBackend: Send + Sync {
    /// Create the worksheet if it does not exist yet
    async fn ensure_worksheet(&self) -> Result<(), SheetsError>;

    /// Every non-empty row, header included
    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SheetsError>;

    /// Append rows after the last row of the table
    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SheetsError>;

    /// Overwrite consecutive cells of one row, starting at 1-based `first_column`
    async fn update_cells(
        &self,
        row: usize,
        first_column: usize,
        values: &[String],
    ) -> Result<(), SheetsError>;
}
