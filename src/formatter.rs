use crate::loader::RowRecord;

/// Renders a row as `column: value` lines, skipping blank cells.
///
/// An empty result means the row has nothing to annotate.
pub fn format_case_text(row: &RowRecord) -> String {
    row.iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(column, value)| format!("{column}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
