use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::extract::ScanMode;

const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the hosted model.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    pub api_key: Option<String>,
    /// Either a base URL or a full `...:generateContent` URL.
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            model: None,
            timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
        }
    }
}

impl GatewaySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Mail relay used to deliver reports.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address; falls back to `username`.
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_smtp_timeout() -> u64 {
    DEFAULT_SMTP_TIMEOUT_SECS
}

impl SmtpSettings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from: None,
            timeout_secs: DEFAULT_SMTP_TIMEOUT_SECS,
        }
    }

    pub fn sender(&self) -> Option<&str> {
        self.from
            .as_deref()
            .or(self.username.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("from", &self.from)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Debug stand-in for a secret: shows whether it is set, never its value.
fn redact(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Upper bound for each network stage (inference, dispatch).
    pub stage_timeout_secs: Option<u64>,
    pub scan_mode: ScanMode,
}

impl PipelineSettings {
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }
}

/// Process-wide configuration, built once at startup and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewSettings {
    pub gateway: GatewaySettings,
    pub smtp: Option<SmtpSettings>,
    pub pipeline: PipelineSettings,
}

impl ReviewSettings {
    const API_KEY_ENV: &'static str = "GEMINI_API_KEY";
    const API_URL_ENV: &'static str = "GEMINI_API_URL";
    const MODEL_ENV: &'static str = "GEMINI_API_MODEL";
    const TIMEOUT_ENV: &'static str = "GEMINI_TIMEOUT_SECS";
    const SMTP_HOST_ENV: &'static str = "SMTP_HOST";
    const SMTP_PORT_ENV: &'static str = "SMTP_PORT";
    const SMTP_USER_ENV: &'static str = "SMTP_USER";
    const SMTP_PASSWORD_ENV: &'static str = "SMTP_PASSWORD";
    const EMAIL_FROM_ENV: &'static str = "EMAIL_FROM";
    const STAGE_TIMEOUT_ENV: &'static str = "RPA_VALIDATOR_STAGE_TIMEOUT_SECS";
    const SCAN_MODE_ENV: &'static str = "RPA_VALIDATOR_SCAN_MODE";

    /// Load settings purely from environment variables.
    ///
    /// * `GEMINI_API_KEY` / `GEMINI_API_URL` / `GEMINI_API_MODEL` — model access.
    /// * `SMTP_HOST` / `SMTP_PORT` / `SMTP_USER` / `SMTP_PASSWORD` / `EMAIL_FROM` — mail relay.
    /// * `RPA_VALIDATOR_STAGE_TIMEOUT_SECS`, `RPA_VALIDATOR_SCAN_MODE` — pipeline tuning.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Overlay environment variables on top of already-loaded settings.
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(&std::env::vars().collect())
    }

    fn with_vars(mut self, vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get(Self::API_KEY_ENV) {
            self.gateway.api_key = Some(key);
        }
        if let Some(url) = get(Self::API_URL_ENV) {
            self.gateway.endpoint = Some(url);
        }
        if let Some(model) = get(Self::MODEL_ENV) {
            self.gateway.model = Some(model);
        }
        if let Some(raw) = get(Self::TIMEOUT_ENV) {
            self.gateway.timeout_secs = parse_var(Self::TIMEOUT_ENV, &raw)?;
        }

        if let Some(host) = get(Self::SMTP_HOST_ENV) {
            match self.smtp.as_mut() {
                Some(smtp) => smtp.host = host,
                None => self.smtp = Some(SmtpSettings::new(host)),
            }
        }
        if let Some(smtp) = self.smtp.as_mut() {
            if let Some(raw) = get(Self::SMTP_PORT_ENV) {
                smtp.port = parse_var(Self::SMTP_PORT_ENV, &raw)?;
            }
            if let Some(user) = get(Self::SMTP_USER_ENV) {
                smtp.username = Some(user);
            }
            if let Some(password) = vars.get(Self::SMTP_PASSWORD_ENV).filter(|v| !v.is_empty()) {
                smtp.password = Some(password.clone());
            }
            if let Some(from) = get(Self::EMAIL_FROM_ENV) {
                smtp.from = Some(from);
            }
        }

        if let Some(raw) = get(Self::STAGE_TIMEOUT_ENV) {
            self.pipeline.stage_timeout_secs = Some(parse_var(Self::STAGE_TIMEOUT_ENV, &raw)?);
        }
        if let Some(raw) = get(Self::SCAN_MODE_ENV) {
            self.pipeline.scan_mode = match raw.to_lowercase().as_str() {
                "brace_count" => ScanMode::BraceCount,
                "string_aware" => ScanMode::StringAware,
                other => bail!(
                    "{} must be `brace_count` or `string_aware` (got `{other}`)",
                    Self::SCAN_MODE_ENV
                ),
            };
        }

        Ok(self)
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("invalid value `{raw}` for environment variable {name}"))
}
