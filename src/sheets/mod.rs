mod client;
mod values;

pub use client::{AUTH_SCOPE, SheetsClient};
pub use values::{ValueRange, print_first_column};

#[cfg(test)]
pub(crate) use values::test_helpers;

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SheetOperations {
    /// Read the cells of `range` (A1 notation) as rows.
    async fn read_range(&self, spreadsheet_id: &str, range: &str) -> Result<ValueRange>;
}
