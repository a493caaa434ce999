//! Recipient tables and the sources they are read from.

mod model;

pub use model::{Columns, RowMap, Table};

use std::future::Future;
use std::sync::Arc;

/// Reads a recipient table from a spreadsheet-like store.
pub trait TableSource {
    /// Error returned by the source.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reads sheet `sheet_index` (0-based) of spreadsheet `sheet_id`.
    ///
    /// The first `header_row_count` rows are excluded from the data and the
    /// first of them supplies the column names (see [`Table::from_grid`]).
    fn read_table(
        &self,
        sheet_id: &str,
        sheet_index: usize,
        header_row_count: u32,
    ) -> impl Future<Output = Result<Table, Self::Error>> + Send;
}

impl<T: TableSource + Send + Sync> TableSource for Arc<T> {
    type Error = T::Error;

    fn read_table(
        &self,
        sheet_id: &str,
        sheet_index: usize,
        header_row_count: u32,
    ) -> impl Future<Output = Result<Table, Self::Error>> + Send {
        (**self).read_table(sheet_id, sheet_index, header_row_count)
    }
}
