use std::fmt;

/// Converts a 1-based column number to its spreadsheet letters
/// (1 = A, 26 = Z, 27 = AA). There is no zero digit, so 0 yields "".
pub fn column_letter(mut n: usize) -> String {
    let mut letters = Vec::new();

    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - rem) / 26;
    }

    letters.iter().rev().map(|&b| b as char).collect()
}

pub fn is_column_letters(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Writes a sheet name as it must appear before the `!` of an A1 range.
/// Names other than plain ASCII letters, digits and underscores are wrapped
/// in single quotes, with embedded quotes doubled.
fn write_sheet_name(f: &mut fmt::Formatter<'_>, sheet: &str) -> fmt::Result {
    let plain = !sheet.is_empty()
        && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        f.write_str(sheet)
    } else {
        write!(f, "'{}'", sheet.replace('\'', "''"))
    }
}

/// A single cell, rendered as `Sheet!C5`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellAddress {
    pub sheet: String,
    pub column: String,
    pub row: usize,
}

impl CellAddress {
    /// `column_index` is 0-based, `row` is the 1-based sheet row.
    pub fn from_index(sheet: &str, column_index: usize, row: usize) -> Self {
        CellAddress {
            sheet: sheet.to_string(),
            column: column_letter(column_index + 1),
            row,
        }
    }

    pub fn with_column(sheet: &str, column: &str, row: usize) -> Self {
        CellAddress {
            sheet: sheet.to_string(),
            column: column.to_ascii_uppercase(),
            row,
        }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_name(f, &self.sheet)?;
        write!(f, "!{}{}", self.column, self.row)
    }
}

/// A column span of a sheet, rendered as `Sheet!A:Z`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetRange {
    pub sheet: String,
    pub span: String,
}

impl SheetRange {
    pub fn new(sheet: &str, span: &str) -> Self {
        SheetRange {
            sheet: sheet.to_string(),
            span: span.to_string(),
        }
    }
}

impl fmt::Display for SheetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_sheet_name(f, &self.sheet)?;
        write!(f, "!{}", self.span)
    }
}
