use std::fmt;

use crate::workflow::ToolKind;

const TEMPLATE_HEAD: &str = "You are an expert RPA code reviewer specializing in {tool} development.
Analyze the following workflow file.

Respond ONLY with valid JSON in this exact schema:
{
  \"tool\": \"<UiPath or Blue Prism>\",
  \"compliance_score\": 0,
  \"issues\": [\"issue1\", \"issue2\"],
  \"recommendations\": [\"rec1\", \"rec2\"]
}

Workflow content:
";

/// Fully composed review request sent to the inference gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPrompt(String);

impl ReviewPrompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReviewPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build the review prompt for a workflow.
///
/// `content` is appended verbatim with no escaping and no size cap; very large
/// uploads produce equally large prompts.
pub fn compose(tool_kind: ToolKind, content: &str) -> ReviewPrompt {
    let head = TEMPLATE_HEAD.replacen("{tool}", tool_kind.display_name(), 1);
    let mut prompt = String::with_capacity(head.len() + content.len() + 1);
    prompt.push_str(&head);
    prompt.push_str(content);
    prompt.push('\n');
    ReviewPrompt(prompt)
}
