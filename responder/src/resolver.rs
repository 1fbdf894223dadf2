//! Maps an identifier value to the sheet row and column to update.
//!
//! Headers are compared trimmed and case-insensitively. The identifier column
//! is chosen by walking the priority list, not by header position: with
//! priority `[ID, Placa, Cedula]` and headers `[Cedula, Placa]`, `Placa` wins.
//! Rows are compared trimmed and uppercased, and the first matching row wins.

use sheets::Grid;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    #[error("Empty sheet")]
    EmptyGrid,

    #[error("Target header '{0}' not found")]
    HeaderMissing(String),

    #[error("No identifier column found (tried: {})", .0.join(", "))]
    IdentifierColumnMissing(Vec<String>),

    #[error("Row not found for id='{0}'")]
    RowMissing(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// 1-based sheet row; the header occupies row 1.
    pub row_number: usize,
    /// 0-based index of the column receiving the flag.
    pub target_column_index: usize,
    /// 0-based index of the identifier column.
    pub identifier_column_index: usize,
    /// Entry of the priority list that matched a header.
    pub identifier_header_used: String,
}

/// Trimmed header row; absent cells read as "".
pub fn normalized_headers(grid: &Grid) -> Vec<String> {
    grid.first()
        .map(|row| row.iter().map(|h| h.trim().to_string()).collect())
        .unwrap_or_default()
}

fn find_header(headers: &[String], name: &str) -> Option<usize> {
    let name = name.trim().to_lowercase();
    headers.iter().position(|h| h.to_lowercase() == name)
}

pub fn resolve(
    grid: &Grid,
    identifier_priority: &[String],
    target_header: &str,
    identifier_value: &str,
) -> Result<Resolution, NotFound> {
    if grid.is_empty() {
        return Err(NotFound::EmptyGrid);
    }

    let headers = normalized_headers(grid);

    let target_column_index = find_header(&headers, target_header)
        .ok_or_else(|| NotFound::HeaderMissing(target_header.to_string()))?;

    let (identifier_column_index, identifier_header_used) = identifier_priority
        .iter()
        .find_map(|candidate| find_header(&headers, candidate).map(|idx| (idx, candidate)))
        .ok_or_else(|| NotFound::IdentifierColumnMissing(identifier_priority.to_vec()))?;

    let wanted = identifier_value.trim().to_uppercase();
    let data_index = grid
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, row)| {
            let cell = row.get(identifier_column_index).map_or("", String::as_str);
            cell.trim().to_uppercase() == wanted
        })
        .map(|(idx, _)| idx)
        .ok_or(NotFound::RowMissing(wanted))?;

    Ok(Resolution {
        row_number: data_index + 1,
        target_column_index,
        identifier_column_index,
        identifier_header_used: identifier_header_used.clone(),
    })
}
