use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

use crate::annotator::{Annotation, Annotator, TaskKind};
use crate::formatter::format_case_text;
use crate::loader::{self, CaseTable};
use crate::AppState;

/// Per-row output of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationResult {
    /// 1-based position of the row in the input
    pub case_number: usize,
    /// Identifier column value, or `Row <n>`
    pub case_id: String,
    pub summary: Annotation,
    pub priority: Annotation,
}

/// The record shape returned by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRecord {
    #[serde(rename = "Case_No")]
    pub case_no: usize,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Priority")]
    pub priority: String,
}

impl AnnotationResult {
    pub fn to_legacy(&self) -> LegacyRecord {
        LegacyRecord {
            case_no: self.case_number,
            summary: self.summary.render(TaskKind::Summary),
            priority: self.priority.render(TaskKind::Priority),
        }
    }

    /// Human-readable block for terminal output.
    pub fn render_text(&self) -> String {
        let heavy = "=".repeat(40);
        format!(
            "{heavy}\nCase Identifier: {}\n{heavy}\n\nSummary:\n{}\n\nPriority Assessment:\n{}\n{}",
            self.case_id,
            self.summary.render(TaskKind::Summary),
            self.priority.render(TaskKind::Priority),
            "-".repeat(40),
        )
    }
}

/// A row that survived formatting and is waiting for its model calls.
#[derive(Debug)]
struct PendingCase {
    case_number: usize,
    case_id: String,
    case_text: String,
}

fn pending_cases(
    table: &CaseTable,
    identifier_column: Option<&str>,
) -> Vec<PendingCase> {
    let identifier = table.identifier_index(identifier_column);

    table
        .rows
        .iter()
        .filter_map(|row| {
            let case_text = format_case_text(row);
            if case_text.is_empty() {
                info!(
                    "Skipping row {} as it contains no data after filtering empty values",
                    row.position
                );
                return None;
            }

            let case_id = identifier
                .and_then(|index| row.value_at(index))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Row {}", row.position));

            Some(PendingCase {
                case_number: row.position,
                case_id,
                case_text,
            })
        })
        .collect()
}

async fn annotate_case(
    annotator: &Annotator,
    case: PendingCase,
) -> AnnotationResult {
    info!("Generating summary for case {}", case.case_id);
    let summary = annotator
        .annotate(TaskKind::Summary, &case.case_text)
        .await;

    info!("Generating priority for case {}", case.case_id);
    let priority = annotator
        .annotate(TaskKind::Priority, &case.case_text)
        .await;

    AnnotationResult {
        case_number: case.case_number,
        case_id: case.case_id,
        summary,
        priority,
    }
}

/// Annotates every non-empty row of the table, in row order.
///
/// Rows run one at a time unless `max_concurrent_rows` allows more; the
/// two calls of a row are always made in order.
#[instrument(skip_all, fields(rows = table.len()))]
pub async fn process_table(
    state: &AppState,
    table: CaseTable,
) -> Vec<AnnotationResult> {
    let config = &state.config;
    let cases = pending_cases(&table, config.identifier_column.as_deref());
    let total = cases.len();
    let annotator = state.annotator();

    let mut results = Vec::with_capacity(total);

    if config.max_concurrent_rows <= 1 {
        for (index, case) in cases.into_iter().enumerate() {
            info!("Processing case {}/{}", index + 1, total);
            results.push(annotate_case(&annotator, case).await);
        }
    } else {
        let annotator = Arc::new(annotator);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_rows));
        let mut tasks = JoinSet::new();

        for case in cases {
            let annotator = annotator.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                annotate_case(&annotator, case).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Case task failed: {}", e),
            }
        }
        results.sort_by_key(|result| result.case_number);
    }

    info!("Processing complete: {} cases annotated", results.len());
    results
}

/// Loads a CSV file and annotates it. Load failures abort the batch
/// before any model call is made.
pub async fn process_file(
    state: &AppState,
    path: &Path,
) -> Result<Vec<AnnotationResult>> {
    let table = loader::load_csv(path)?;
    Ok(process_table(state, table).await)
}
