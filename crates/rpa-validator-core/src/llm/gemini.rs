use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::{GatewayError, InferenceGateway};
use crate::prompt::ReviewPrompt;
use crate::settings::GatewaySettings;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Google Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiGateway {
    http: Client,
    url: String,
    api_key: String,
}

impl GeminiGateway {
    pub fn new(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::Configuration(
                    "Gemini API key must be provided via GEMINI_API_KEY".into(),
                )
            })?;
        let url = resolve_url(settings.endpoint.as_deref(), settings.model.as_deref());
        let http = Client::builder()
            .user_agent(concat!("rpa-validator/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout())
            .build()
            .map_err(|err| {
                GatewayError::Configuration(format!("failed to build Gemini HTTP client: {err}"))
            })?;
        Ok(Self { http, url, api_key })
    }
}

impl fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl InferenceGateway for GeminiGateway {
    #[instrument(name = "gemini_generate", skip(self, prompt), fields(prompt_len = prompt.as_str().len()))]
    async fn invoke(&self, prompt: &ReviewPrompt) -> Result<String, GatewayError> {
        let payload = GeminiRequest {
            contents: vec![GeminiRequestContent {
                parts: vec![GeminiRequestPart {
                    text: prompt.as_str(),
                }],
            }],
        };

        debug!(url = %self.url, "calling Gemini generateContent API");
        let response = self
            .http
            .post(&self.url)
            .query(&[("key", &self.api_key)])
            .json(&payload)
            .send()
            .await
            .map_err(|err| GatewayError::Upstream {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Upstream {
                status: Some(status.as_u16()),
                message: error_body(response.text().await),
            });
        }

        let data: Value = response.json().await.map_err(|err| GatewayError::Upstream {
            status: Some(status.as_u16()),
            message: format!("failed to read Gemini response body: {err}"),
        })?;
        Ok(reply_text(data))
    }
}

/// Build the `generateContent` URL from an endpoint that is either already
/// complete or a base URL.
fn resolve_url(endpoint: Option<&str>, model: Option<&str>) -> String {
    let endpoint = endpoint.unwrap_or(DEFAULT_BASE_URL);
    if endpoint.contains(":generateContent") {
        return endpoint.to_string();
    }
    format!(
        "{}/v1beta/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model.unwrap_or(DEFAULT_MODEL)
    )
}

/// Body of a non-2xx reply; a failed read keeps its cause in the message.
fn error_body<E: fmt::Display>(body: Result<String, E>) -> String {
    body.unwrap_or_else(|err| format!("<unreadable body: {err}>"))
}

/// Pull generated text out of a Gemini reply.
///
/// Replies without text at `candidates[0].content.parts[0].text` (safety
/// blocks, schema changes) come back as the serialized provider JSON so the
/// extractor can still look for an object in it.
fn reply_text(data: Value) -> String {
    match data.pointer("/candidates/0/content/parts/0/text") {
        Some(Value::String(text)) => text.clone(),
        _ => {
            warn!("Gemini response missing candidate text; returning raw response");
            data.to_string()
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiRequestContent<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestContent<'a> {
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}
