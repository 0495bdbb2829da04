use serde::{Deserialize, Serialize};

/// Structured outcome of reviewing one workflow file.
///
/// `issues` and `recommendations` are independent lists and may differ in
/// length. The score is passed through as reported by the model; its range is
/// not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub tool: String,
    pub compliance_score: i64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ComplianceResult {
    pub fn new(
        tool: impl Into<String>,
        compliance_score: i64,
        issues: Vec<String>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            compliance_score,
            issues,
            recommendations,
        }
    }
}
