mod smtp;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub use smtp::SmtpNotifier;

pub const REPORT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;\r\n]+").expect("recipient separator pattern is valid"));

/// Email recipients for a report, in the order they were supplied.
///
/// Entries are trimmed and blanks dropped; addresses are neither deduplicated
/// nor validated here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl RecipientSet {
    /// Build a recipient set from optional comma-separated fields.
    /// Semicolons and newlines are accepted as separators too.
    pub fn from_fields(to: Option<&str>, cc: Option<&str>, bcc: Option<&str>) -> Self {
        Self {
            to: split_addresses(to),
            cc: split_addresses(cc),
            bcc: split_addresses(bcc),
        }
    }

    /// Dispatch happens only when at least one `to` address is present.
    pub fn wants_dispatch(&self) -> bool {
        !self.to.is_empty()
    }

    /// Envelope recipients: `to`, then `cc`, then `bcc`.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }
}

fn split_addresses(field: Option<&str>) -> Vec<String> {
    let Some(field) = field else {
        return Vec::new();
    };
    SEPARATORS
        .split(field)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// A rendered report ready for delivery.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub recipients: RecipientSet,
    pub subject: String,
    pub body: String,
    pub attachment: Vec<u8>,
    pub attachment_name: String,
}

impl Dispatch {
    /// Standard report email for an uploaded workflow.
    pub fn report(
        upload_name: &str,
        recipients: RecipientSet,
        attachment: Vec<u8>,
        attachment_name: String,
    ) -> Self {
        Self {
            recipients,
            subject: format!("Validation results for {upload_name}"),
            body: "Attached are the script validation results.".into(),
            attachment,
            attachment_name,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("report dispatch requested but no mail transport is configured")]
    NotConfigured,
    #[error("invalid recipient address `{address}`: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("failed to build report email: {0}")]
    Message(String),
    #[error("email sending failed: {0}")]
    Transport(String),
}

/// Delivers rendered reports to their recipients.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, dispatch: &Dispatch) -> Result<(), DispatchError>;
}
