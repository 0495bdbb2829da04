mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::ReviewPrompt;

pub use gemini::GeminiGateway;

/// Failure talking to the external model service.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Endpoint or credential configuration is absent or unusable.
    #[error("inference gateway configuration error: {0}")]
    Configuration(String),
    /// The remote call failed or returned a non-success status.
    #[error("{}", upstream_message(.status, .message))]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

fn upstream_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("inference API error ({code}): {message}"),
        None => format!("inference API call failed: {message}"),
    }
}

/// Sends a review prompt to a hosted model and returns its raw text reply.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Perform exactly one remote call for `prompt`. No retries.
    async fn invoke(&self, prompt: &ReviewPrompt) -> Result<String, GatewayError>;
}
