use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// One CSV data row: the header's columns paired with this row's values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRecord {
    /// 1-based position among the data rows
    pub position: usize,
    columns: Arc<[String]>,
    values: Vec<String>,
}

impl RowRecord {
    pub fn new(
        position: usize,
        columns: Arc<[String]>,
        values: Vec<String>,
    ) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self {
            position,
            columns,
            values,
        }
    }

    /// Column/value pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }
}

/// A loaded CSV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseTable {
    pub columns: Arc<[String]>,
    pub rows: Vec<RowRecord>,
}

impl CaseTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the identifier column, if one is configured and present.
    pub fn identifier_index(&self, column: Option<&str>) -> Option<usize> {
        let column = column?;
        let index = self.columns.iter().position(|name| name == column);
        if index.is_none() {
            warn!(
                "Column '{}' not found in the CSV. Available columns are: {:?}. Using row index as the case identifier instead.",
                column, self.columns
            );
        }
        index
    }
}

/// Decodes file contents as UTF-8, falling back to Latin-1.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(_) => {
            warn!("UTF-8 decoding failed, trying latin1 encoding...");
            // WHATWG maps the latin1 label onto windows-1252
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text
        }
    }
}

/// Parses CSV bytes into a [`CaseTable`]. Missing trailing cells become
/// empty strings; a row wider than the header is an error.
pub fn parse_csv_bytes(bytes: &[u8]) -> Result<CaseTable> {
    let text = decode_text(bytes);
    if text.trim().is_empty() {
        bail!("The CSV file is empty");
    }

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Arc<[String]> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let position = index + 1;
        let record = record
            .with_context(|| format!("Failed to parse CSV row {}", position))?;
        if record.len() > columns.len() {
            bail!(
                "Malformed CSV row {}: expected {} fields, found {}",
                position,
                columns.len(),
                record.len()
            );
        }

        let values = (0..columns.len())
            .map(|i| record.get(i).unwrap_or_default().to_string())
            .collect();
        rows.push(RowRecord::new(position, columns.clone(), values));
    }

    Ok(CaseTable { columns, rows })
}

#[instrument]
pub fn load_csv(path: &Path) -> Result<CaseTable> {
    let bytes = std::fs::read(path).with_context(|| {
        format!("Input CSV file not found or unreadable at '{}'", path.display())
    })?;
    let table = parse_csv_bytes(&bytes).with_context(|| {
        format!("Error reading CSV file '{}'", path.display())
    })?;
    info!(
        "Successfully read {} rows from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}
