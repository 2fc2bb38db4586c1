//! In-memory [`SheetBackend`] for tests.

use crate::error::SheetsError;
use crate::sheets::SheetBackend;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemorySheet {
    rows: Mutex<Vec<Vec<String>>>,
    ensured: AtomicBool,
    failing_appends: AtomicUsize,
    failing_reads: AtomicUsize,
    append_calls: AtomicUsize,
}

impl MemorySheet {
    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    /// The next `n` appends fail as rate limited
    pub fn failing_appends(self, n: usize) -> Self {
        self.failing_appends.store(n, Ordering::SeqCst);
        self
    }

    /// The next `n` reads fail with a server error
    pub fn failing_reads(self, n: usize) -> Self {
        self.failing_reads.store(n, Ordering::SeqCst);
        self
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }

    pub fn worksheet_ensured(&self) -> bool {
        self.ensured.load(Ordering::SeqCst)
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SheetBackend for MemorySheet {
    async fn ensure_worksheet(&self) -> Result<(), SheetsError> {
        self.ensured.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SheetsError> {
        let failing = self.failing_reads.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_reads.store(failing - 1, Ordering::SeqCst);
            return Err(SheetsError::Api {
                status: 503,
                message: "backend unavailable".into(),
            });
        }
        Ok(self.rows())
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_appends.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_appends.store(failing - 1, Ordering::SeqCst);
            return Err(SheetsError::RateLimited);
        }
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(())
    }

    async fn update_cells(
        &self,
        row: usize,
        first_column: usize,
        values: &[String],
    ) -> Result<(), SheetsError> {
        let mut rows = self.rows.lock().unwrap();
        while rows.len() < row {
            rows.push(Vec::new());
        }
        let target = &mut rows[row - 1];
        let end = first_column - 1 + values.len();
        if target.len() < end {
            target.resize(end, String::new());
        }
        target[first_column - 1..end].clone_from_slice(values);
        Ok(())
    }
}
