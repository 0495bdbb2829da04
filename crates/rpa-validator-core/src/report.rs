use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use crate::compliance::ComplianceResult;

pub const SHEET_NAME: &str = "Results";
pub const COLUMNS: [&str; 4] = ["Tool", "Compliance Score", "Issue", "Recommendation"];

/// One spreadsheet row of a rendered compliance report.
///
/// Only the first row of a report carries `tool` and `score`; later rows leave
/// them blank so the sheet reads as a merged header. Blank cells there do not
/// mean the data is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub tool: String,
    pub score: Option<i64>,
    pub issue: String,
    pub recommendation: String,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to build report workbook: {0}")]
    Workbook(#[from] XlsxError),
}

/// Lay a result out as index-aligned issue/recommendation rows.
///
/// Always yields at least one row so the tool and score are never dropped.
pub fn render(result: &ComplianceResult) -> Vec<ReportRow> {
    let row_count = result
        .issues
        .len()
        .max(result.recommendations.len())
        .max(1);
    (0..row_count)
        .map(|idx| {
            let first = idx == 0;
            ReportRow {
                tool: if first {
                    result.tool.clone()
                } else {
                    String::new()
                },
                score: first.then_some(result.compliance_score),
                issue: result.issues.get(idx).cloned().unwrap_or_default(),
                recommendation: result.recommendations.get(idx).cloned().unwrap_or_default(),
            }
        })
        .collect()
}

/// Write rows into a single-sheet xlsx workbook and return its bytes.
pub fn render_workbook(rows: &[ReportRow]) -> Result<Vec<u8>, ReportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let line = idx as u32 + 1;
        if !row.tool.is_empty() {
            sheet.write_string(line, 0, row.tool.as_str())?;
        }
        if let Some(score) = row.score {
            sheet.write_number(line, 1, score as f64)?;
        }
        if !row.issue.is_empty() {
            sheet.write_string(line, 2, row.issue.as_str())?;
        }
        if !row.recommendation.is_empty() {
            sheet.write_string(line, 3, row.recommendation.as_str())?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Attachment name used when the report for `upload_name` is emailed or saved.
pub fn report_filename(upload_name: &str) -> String {
    format!("validation_{upload_name}.xlsx")
}
