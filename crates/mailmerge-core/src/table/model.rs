//! Table data model.

use std::collections::HashMap;

/// Per-row mapping from column name to cell value.
pub type RowMap = HashMap<String, String>;

/// Ordered column names of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns(Vec<String>);

impl Columns {
    /// Creates columns from names, trimming surrounding whitespace.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(names.into_iter().map(|n| n.as_ref().trim().to_string()).collect())
    }

    /// Position of the first column with this exact name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c == name)
    }

    /// Cell value of `name` in `row`, or `""` when the column is unknown or
    /// the row is too short.
    #[must_use]
    pub fn cell<'a>(&self, name: &str, row: &'a [String]) -> &'a str {
        self.index_of(name)
            .and_then(|idx| row.get(idx))
            .map_or("", String::as_str)
    }

    /// Zips `row` against the columns.
    ///
    /// Missing trailing cells map to empty strings, cells beyond the last
    /// column are ignored. Unnamed columns are skipped and the first of
    /// several same-named columns wins.
    #[must_use]
    pub fn row_map(&self, row: &[String]) -> RowMap {
        let mut map = RowMap::with_capacity(self.0.len());
        for (idx, name) in self.0.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            map.entry(name.clone())
                .or_insert_with(|| row.get(idx).cloned().unwrap_or_default());
        }
        map
    }

    /// Iterates over column names.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Recipient table: column names plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Column names, establishing the positional mapping of cells.
    pub columns: Columns,
    /// Data rows, header rows excluded.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table from columns and rows.
    #[must_use]
    pub const fn new(columns: Columns, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Splits a raw cell grid into a table.
    ///
    /// The first `header_row_count` rows are excluded from the data; the first
    /// of them supplies the column names. With a header row count of zero the
    /// table has no column names and every row is data.
    #[must_use]
    pub fn from_grid(grid: Vec<Vec<String>>, header_row_count: u32) -> Self {
        let header_rows = usize::try_from(header_row_count).unwrap_or(usize::MAX);
        let mut grid = grid.into_iter();

        let columns = if header_rows > 0 {
            grid.next().map(Columns::new).unwrap_or_default()
        } else {
            Columns::default()
        };
        let rows = grid.skip(header_rows.saturating_sub(1)).collect();

        Self { columns, rows }
    }

    /// Returns true if every cell of `row` is empty after trimming.
    #[must_use]
    pub fn is_blank_row(row: &[String]) -> bool {
        row.iter().all(|cell| cell.trim().is_empty())
    }

    /// Iterates over non-blank data rows with their 1-based row numbers.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| !Self::is_blank_row(row))
            .map(|(idx, row)| (idx + 1, row.as_slice()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(ToString::to_string).collect())
            .collect()
    }

    #[test]
    fn test_from_grid_single_header() {
        let table = Table::from_grid(
            grid(&[&[" TO ", "NAME"], &["a@x.com", "Alice"], &["b@x.com", "Bob"]]),
            1,
        );
        assert_eq!(table.columns.iter().collect::<Vec<_>>(), vec!["TO", "NAME"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_from_grid_multiple_headers() {
        let table = Table::from_grid(
            grid(&[&["TO", "NAME"], &["(email)", "(first name)"], &["a@x.com", "Alice"]]),
            2,
        );
        assert_eq!(table.columns.index_of("NAME"), Some(1));
        assert_eq!(table.rows, grid(&[&["a@x.com", "Alice"]]));
    }

    #[test]
    fn test_from_grid_counts_rows() {
        let raw = grid(&[&["TO"], &["a"], &[""], &["b"], &[" ", ""]]);
        let table = Table::from_grid(raw.clone(), 1);
        assert_eq!(table.rows.len(), raw.len() - 1);
        assert_eq!(table.data_rows().count(), 2);
        let numbers: Vec<_> = table.data_rows().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_from_grid_more_headers_than_rows() {
        let table = Table::from_grid(grid(&[&["TO"]]), 3);
        assert_eq!(table.columns.len(), 1);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn test_row_map_short_row() {
        let columns = Columns::new(["TO", "CC", "NAME"]);
        let map = columns.row_map(&["a@x.com".to_string()]);
        assert_eq!(map.get("TO").map(String::as_str), Some("a@x.com"));
        assert_eq!(map.get("CC").map(String::as_str), Some(""));
        assert_eq!(map.get("NAME").map(String::as_str), Some(""));
    }

    #[test]
    fn test_row_map_duplicates_and_unnamed() {
        let columns = Columns::new(["NAME", "", "NAME"]);
        let map = columns.row_map(&["first".to_string(), "x".to_string(), "second".to_string()]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("NAME").map(String::as_str), Some("first"));
    }

    #[test]
    fn test_cell() {
        let columns = Columns::new(["TO", "CC"]);
        let row = vec!["a@x.com".to_string()];
        assert_eq!(columns.cell("TO", &row), "a@x.com");
        assert_eq!(columns.cell("CC", &row), "");
        assert_eq!(columns.cell("BCC", &row), "");
    }
}
