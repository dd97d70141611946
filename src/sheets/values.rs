use crate::error::Result;
use std::io::Write;

const NO_DATA: &str = "No data found.";

/// Rows returned by a range read. `rows` is `None` when the API omitted the
/// values entirely, which it does for ranges with no data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRange {
    pub range: Option<String>,
    pub rows: Option<Vec<Vec<String>>>,
}

impl ValueRange {
    pub fn from_cells<C: CellText>(range: Option<String>, values: Option<Vec<Vec<C>>>) -> Self {
        let rows = values.map(|rows| {
            rows.iter()
                .map(|row| row.iter().map(CellText::cell_text).collect())
                .collect()
        });
        Self { range, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.as_ref().is_none_or(|rows| rows.is_empty())
    }

    /// First cell of every row that has one, in row order
    pub fn first_column(&self) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|row| row.first())
            .map(String::as_str)
    }
}

/// String form of a cell as returned by the API.
pub trait CellText {
    fn cell_text(&self) -> String;
}

impl CellText for serde_json::Value {
    fn cell_text(&self) -> String {
        match self {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl CellText for String {
    fn cell_text(&self) -> String {
        self.clone()
    }
}

/// Write the first cell of each non-empty row on its own line, or a single
/// "No data found." line when the range returned no rows.
pub fn print_first_column<W: Write>(value_range: &ValueRange, out: &mut W) -> Result<()> {
    if value_range.is_empty() {
        writeln!(out, "{}", NO_DATA)?;
        return Ok(());
    }

    for cell in value_range.first_column() {
        writeln!(out, "{}", cell)?;
    }

    Ok(())
}
