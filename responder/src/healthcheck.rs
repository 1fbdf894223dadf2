use serde::Serialize;
use sheets::{Grid, SheetRange, SheetsError, StoreProvider};

const SAMPLE_ROWS: usize = 3;

/// Connectivity check against the sheet: can we authenticate and read it,
/// and what does it look like.
#[derive(Serialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum HealthReport {
    Ok {
        ok: bool,
        headers: Vec<String>,
        sample_rows: Grid,
        total_rows: usize,
    },
    Failed {
        ok: bool,
        error: String,
    },
}

impl HealthReport {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthReport::Ok { .. })
    }
}

async fn read_grid(provider: &dyn StoreProvider, range: &SheetRange) -> Result<Grid, SheetsError> {
    let store = provider.connect().await?;
    store.get_values(range).await
}

pub async fn sheet_healthcheck(provider: &dyn StoreProvider, range: &SheetRange) -> HealthReport {
    match read_grid(provider, range).await {
        Ok(mut grid) => {
            let total_rows = grid.len();
            let sample_rows = grid.iter().skip(1).take(SAMPLE_ROWS).cloned().collect();
            let headers = if grid.is_empty() {
                Vec::new()
            } else {
                grid.swap_remove(0)
            };

            HealthReport::Ok {
                ok: true,
                headers,
                sample_rows,
                total_rows,
            }
        }
        Err(e) => {
            tracing::error!(range = %range, error = %e, "sheet healthcheck failed");
            HealthReport::Failed {
                ok: false,
                error: e.to_string(),
            }
        }
    }
}
