//! Google Sheets recipient source.

use crate::client::GoogleClient;
use crate::error::{Error, Result};
use mailmerge_core::{Table, TableSource};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use tracing::debug;
use url::Url;

/// Extracts the spreadsheet id from a raw id or a Sheets URL.
///
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0` yields `<id>`.
/// Inputs without a `/` are taken as ids. Unrecognized URLs are returned
/// trimmed but otherwise unchanged.
#[must_use]
pub fn spreadsheet_id(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.contains('/') {
        return raw.to_string();
    }

    Url::parse(raw)
        .ok()
        .and_then(|url| {
            let segments: Vec<&str> = url.path_segments()?.collect();
            let start = segments.iter().position(|s| *s == "spreadsheets")?;
            segments[start..]
                .windows(2)
                .find(|w| w[0] == "d" && !w[1].is_empty())
                .map(|w| w[1].to_string())
        })
        .unwrap_or_else(|| raw.to_string())
}

/// A1 range covering a whole sheet.
fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Renders a cell value as the string shown in the sheet.
fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl ValueRange {
    fn into_grid(self) -> Vec<Vec<String>> {
        self.values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect()
    }
}

impl GoogleClient {
    /// Resolves the title of sheet `sheet_index` from spreadsheet metadata.
    async fn sheet_title(&self, spreadsheet: &str, sheet_index: usize) -> Result<String> {
        let mut url = self.sheets_url(&["spreadsheets", spreadsheet])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let metadata: Spreadsheet = self.get_json(url).await?;
        let count = metadata.sheets.len();
        metadata
            .sheets
            .into_iter()
            .nth(sheet_index)
            .map(|sheet| sheet.properties.title)
            .ok_or(Error::SheetNotFound {
                index: sheet_index,
                count,
            })
    }

    /// Reads every cell of a sheet as displayed text.
    ///
    /// Rows keep their positions; trailing empty cells are omitted by the API
    /// and read back as empty strings through the column mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if a request fails or the sheet index is out of range.
    pub async fn read_grid(&self, sheet_id: &str, sheet_index: usize) -> Result<Vec<Vec<String>>> {
        let spreadsheet = spreadsheet_id(sheet_id);
        let title = self.sheet_title(&spreadsheet, sheet_index).await?;

        let range = sheet_range(&title);
        let mut url = self.sheets_url(&["spreadsheets", &spreadsheet, "values", &range])?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");

        let values: ValueRange = self.get_json(url).await?;
        let grid = values.into_grid();
        debug!(spreadsheet = %spreadsheet, sheet = %title, rows = grid.len(), "read sheet");
        Ok(grid)
    }
}

impl TableSource for GoogleClient {
    type Error = Error;

    fn read_table(
        &self,
        sheet_id: &str,
        sheet_index: usize,
        header_row_count: u32,
    ) -> impl Future<Output = Result<Table>> + Send {
        async move {
            let grid = self.read_grid(sheet_id, sheet_index).await?;
            Ok(Table::from_grid(grid, header_row_count))
        }
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

    #[test]
    fn test_spreadsheet_id_from_url() {
        assert_eq!(
            spreadsheet_id("https://docs.google.com/spreadsheets/d/1AbC-xyz_9/edit#gid=0"),
            "1AbC-xyz_9"
        );
        assert_eq!(
            spreadsheet_id(" https://docs.google.com/spreadsheets/u/1/d/1AbC/view "),
            "1AbC"
        );
    }

    #[test]
    fn test_spreadsheet_id_passthrough() {
        assert_eq!(spreadsheet_id("  1AbC  "), "1AbC");
        assert_eq!(spreadsheet_id("not/a/url"), "not/a/url");
        assert_eq!(
            spreadsheet_id("https://docs.google.com/document/d/1AbC/edit"),
            "https://docs.google.com/document/d/1AbC/edit"
        );
    }

    #[test]
    fn test_sheet_range_quotes_title() {
        assert_eq!(sheet_range("Sheet1"), "'Sheet1'");
        assert_eq!(sheet_range("Bob's list"), "'Bob''s list'");
    }

    #[test]
    fn test_metadata_deserialize() {
        let body = r#"{"sheets": [
            {"properties": {"title": "Recipients"}},
            {"properties": {"title": "Archive"}}
        ]}"#;
        let metadata: Spreadsheet = serde_json::from_str(body).unwrap();
        let titles: Vec<_> = metadata.sheets.iter().map(|s| s.properties.title.as_str()).collect();
        assert_eq!(titles, vec!["Recipients", "Archive"]);
    }

    #[test]
    fn test_values_into_table() {
        let body = r#"{
            "range": "'Recipients'!A1:D3",
            "majorDimension": "ROWS",
            "values": [
                ["TO", "CC", "BCC", "NAME"],
                ["a@x.com", "", "", "Alice"],
                ["b@x.com"],
                [],
                ["c@x.com", null, false, 42]
            ]
        }"#;
        let values: ValueRange = serde_json::from_str(body).unwrap();
        let table = Table::from_grid(values.into_grid(), 1);

        assert_eq!(table.columns.len(), 4);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.columns.cell("NAME", &table.rows[1]), "");
        assert_eq!(table.rows[3], vec!["c@x.com", "", "false", "42"]);
        assert_eq!(table.data_rows().count(), 3);
    }

    #[test]
    fn test_empty_sheet_has_no_values() {
        let values: ValueRange = serde_json::from_str(r#"{"range": "'Empty'!A1:Z1000"}"#).unwrap();
        assert!(values.into_grid().is_empty());
    }
}
