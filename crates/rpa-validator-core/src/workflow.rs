use std::fmt;

use serde::{Deserialize, Serialize};

/// Automation platforms whose workflow exports can be reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutomationTool {
    #[serde(rename = "UiPath")]
    UiPath,
    #[serde(rename = "Blue Prism")]
    BluePrism,
}

impl AutomationTool {
    pub fn name(self) -> &'static str {
        match self {
            Self::UiPath => "UiPath",
            Self::BluePrism => "Blue Prism",
        }
    }
}

/// Outcome of classifying an upload by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Known(AutomationTool),
    Unrecognized,
}

impl ToolKind {
    /// Name substituted into the review prompt.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Known(tool) => tool.name(),
            Self::Unrecognized => "Unrecognized",
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Self::Known(_))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lower-case suffixes mapped to the tool that produces them. Checked in order.
const EXTENSIONS: &[(&str, AutomationTool)] = &[
    (".xaml", AutomationTool::UiPath),
    (".bprelease", AutomationTool::BluePrism),
    (".bpprocess", AutomationTool::BluePrism),
    (".bpobject", AutomationTool::BluePrism),
];

/// Map an uploaded file name to the automation tool that produced it.
///
/// Matching is a case-insensitive suffix test against a fixed extension table;
/// the first matching suffix wins. `content` is accepted so callers can pass
/// the decoded upload alongside the name, but it does not influence the result.
pub fn classify(filename: &str, _content: &str) -> ToolKind {
    let name = filename.to_lowercase();
    EXTENSIONS
        .iter()
        .find(|(suffix, _)| name.ends_with(*suffix))
        .map(|(_, tool)| ToolKind::Known(*tool))
        .unwrap_or(ToolKind::Unrecognized)
}

/// A single uploaded workflow file. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct UploadedWorkflow {
    filename: String,
    raw_bytes: Vec<u8>,
    decoded_text: String,
}

impl UploadedWorkflow {
    /// Wrap raw upload bytes, decoding them as UTF-8 and falling back to
    /// Latin-1 when the bytes are not valid UTF-8.
    pub fn new(filename: impl Into<String>, raw_bytes: Vec<u8>) -> Self {
        let decoded_text = decode_lossless(&raw_bytes);
        Self {
            filename: filename.into(),
            raw_bytes,
            decoded_text,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn decoded_text(&self) -> &str {
        &self.decoded_text
    }

    pub fn tool_kind(&self) -> ToolKind {
        classify(&self.filename, &self.decoded_text)
    }
}

fn decode_lossless(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        // Latin-1 maps every byte to the code point of the same value.
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(
            classify("Main.xaml", ""),
            ToolKind::Known(AutomationTool::UiPath)
        );
        for name in ["release.bprelease", "proc.bpprocess", "obj.bpobject"] {
            assert_eq!(
                classify(name, ""),
                ToolKind::Known(AutomationTool::BluePrism),
                "{name}"
            );
        }
    }

    #[test]
    fn classification_ignores_case() {
        assert_eq!(
            classify("INVOICE.XAML", ""),
            ToolKind::Known(AutomationTool::UiPath)
        );
        assert_eq!(
            classify("Export.BPRelease", ""),
            ToolKind::Known(AutomationTool::BluePrism)
        );
    }

    #[test]
    fn unknown_and_empty_names_are_unrecognized() {
        assert_eq!(classify("", ""), ToolKind::Unrecognized);
        assert_eq!(classify("script.py", "<Activity>"), ToolKind::Unrecognized);
        assert_eq!(classify("xaml", ""), ToolKind::Unrecognized);
        assert_eq!(classify("main.xaml.bak", ""), ToolKind::Unrecognized);
    }

    #[test]
    fn decodes_latin1_when_not_utf8() {
        let workflow = UploadedWorkflow::new("a.xaml", vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(workflow.decoded_text(), "café");
        assert_eq!(workflow.raw_bytes().len(), 4);
    }

    #[test]
    fn keeps_valid_utf8() {
        let workflow = UploadedWorkflow::new("a.xaml", "naïve ✓".as_bytes().to_vec());
        assert_eq!(workflow.decoded_text(), "naïve ✓");
        assert_eq!(
            workflow.tool_kind(),
            ToolKind::Known(AutomationTool::UiPath)
        );
    }

    proptest! {
        #[test]
        fn known_suffix_always_wins(stem in "[A-Za-z0-9 _\\-.]{0,32}", idx in 0usize..4) {
            let (suffix, tool) = EXTENSIONS[idx];
            let name = format!("{stem}{}", suffix.to_uppercase());
            prop_assert_eq!(classify(&name, ""), ToolKind::Known(tool));
        }

        #[test]
        fn other_names_are_unrecognized(name in "[A-Za-z0-9 _\\-]{0,32}(\\.(txt|json|py|xml))?") {
            prop_assert_eq!(classify(&name, ""), ToolKind::Unrecognized);
        }

        #[test]
        fn never_panics_on_arbitrary_input(name in any::<String>(), content in any::<String>()) {
            let _ = classify(&name, &content);
        }
    }
}
