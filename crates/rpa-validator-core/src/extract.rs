//! Recovery of a JSON object embedded in free-form model output.
//!
//! Models asked to "respond only with JSON" still wrap their answer in prose
//! or code fences. The extractor locates the first balanced `{...}` span and
//! parses it; anything before the first `{` and after the matching `}` is
//! ignored. This is not a JSON repair tool: a span that is not valid JSON is
//! reported as malformed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compliance::ComplianceResult;

/// How braces are counted while looking for the end of the first object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Count every `{` and `}`, including those inside string literals.
    ///
    /// A string value with an unpaired brace (`"use } carefully"`) ends the
    /// span early or keeps it open, so such replies fail to parse.
    #[default]
    BraceCount,
    /// Ignore braces inside JSON string literals, honoring `\"` escapes.
    StringAware,
}

/// Failure to recover a JSON object from model output.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("JSON not found in model response")]
    NotFound,
    #[error("unbalanced JSON: object opened at byte {start} never closes")]
    Unbalanced { start: usize },
    #[error("malformed JSON in model response: {source}")]
    Malformed {
        span: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Locates and parses the first top-level JSON object in a block of text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor {
    mode: ScanMode,
}

impl JsonExtractor {
    pub fn new(mode: ScanMode) -> Self {
        Self { mode }
    }

    /// Return the first balanced `{...}` span of `text`, braces inclusive.
    pub fn locate<'a>(&self, text: &'a str) -> Result<&'a str, ExtractError> {
        let start = text.find('{').ok_or(ExtractError::NotFound)?;
        let string_aware = self.mode == ScanMode::StringAware;

        // Braces and quotes are ASCII, so byte offsets always land on char
        // boundaries when slicing the span back out.
        let mut depth: i64 = 0;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, &byte) in text.as_bytes()[start..].iter().enumerate() {
            if in_string {
                match byte {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' if string_aware => in_string = true,
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                return Ok(&text[start..=start + offset]);
            }
        }
        Err(ExtractError::Unbalanced { start })
    }

    /// Locate the first object in `text` and deserialize it into `T`.
    pub fn extract<T: DeserializeOwned>(&self, text: &str) -> Result<T, ExtractError> {
        let span = self.locate(text)?;
        serde_json::from_str(span).map_err(|source| ExtractError::Malformed {
            span: span.to_string(),
            source,
        })
    }

    pub fn extract_compliance(&self, text: &str) -> Result<ComplianceResult, ExtractError> {
        self.extract(text)
    }
}

/// Extract a [`ComplianceResult`] using the default brace-counting scan.
pub fn extract(text: &str) -> Result<ComplianceResult, ExtractError> {
    JsonExtractor::default().extract_compliance(text)
}
