//! In-memory store for exercising callers without a network.

use crate::a1::{CellAddress, SheetRange};
use crate::credentials::CredentialError;
use crate::store::{Grid, SheetsError, StoreProvider, TabularStore};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    grid: Grid,
    reads: Vec<String>,
    writes: Vec<(String, String)>,
    fail_reads: bool,
    fail_writes_after: Option<usize>,
}

/// A grid held in memory. Writes mutate the grid and are recorded in order.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new(grid: Grid) -> Self {
        MemoryStore {
            state: Arc::new(Mutex::new(MemoryState {
                grid,
                ..Default::default()
            })),
        }
    }

    pub fn from_rows(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn fail_reads(&self) {
        self.state().fail_reads = true;
    }

    /// Lets `n` writes succeed, then fails every following write.
    pub fn fail_writes_after(&self, n: usize) {
        self.state().fail_writes_after = Some(n);
    }

    pub fn reads(&self) -> Vec<String> {
        self.state().reads.clone()
    }

    /// `(cell, value)` pairs in the order they were written.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state().writes.clone()
    }

    pub fn grid(&self) -> Grid {
        self.state().grid.clone()
    }

    fn unavailable() -> SheetsError {
        SheetsError::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            body: "memory store unavailable".into(),
        }
    }
}

fn column_index(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0, |acc, b| acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize)
        - 1
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn get_values(&self, range: &SheetRange) -> Result<Grid, SheetsError> {
        let mut state = self.state();
        state.reads.push(range.to_string());

        if state.fail_reads {
            return Err(Self::unavailable());
        }
        Ok(state.grid.clone())
    }

    async fn update_value(&self, cell: &CellAddress, value: &str) -> Result<(), SheetsError> {
        let mut state = self.state();

        if let Some(limit) = state.fail_writes_after {
            if state.writes.len() >= limit {
                return Err(Self::unavailable());
            }
        }

        let row = cell.row - 1;
        let col = column_index(&cell.column);

        if state.grid.len() <= row {
            state.grid.resize(row + 1, Vec::new());
        }
        let cells = &mut state.grid[row];
        if cells.len() <= col {
            cells.resize(col + 1, String::new());
        }
        cells[col] = value.to_string();

        state.writes.push((cell.to_string(), value.to_string()));
        Ok(())
    }
}

/// Hands out a shared `MemoryStore` and counts connections.
pub struct MemoryProvider {
    store: MemoryStore,
    connects: AtomicUsize,
    fail_credentials: bool,
}

impl MemoryProvider {
    pub fn new(store: MemoryStore) -> Self {
        MemoryProvider {
            store,
            connects: AtomicUsize::new(0),
            fail_credentials: false,
        }
    }

    /// A provider whose credentials are missing.
    pub fn without_credentials(store: MemoryStore) -> Self {
        MemoryProvider {
            fail_credentials: true,
            ..Self::new(store)
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreProvider for MemoryProvider {
    async fn connect(&self) -> Result<Arc<dyn TabularStore>, SheetsError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.fail_credentials {
            return Err(CredentialError::Missing("MEMORY_CREDENTIALS".into()).into());
        }
        Ok(Arc::new(self.store.clone()))
    }

    fn credentials_available(&self) -> bool {
        !self.fail_credentials
    }
}
