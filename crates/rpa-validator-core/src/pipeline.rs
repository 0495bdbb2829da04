//! Orchestration of a single workflow review.
//!
//! A run moves strictly forward through
//! `Received → Classified → PromptBuilt → Inferred → Parsed → Rendered →
//! (Dispatched) → Completed`. The first failing stage aborts the run with a
//! [`PipelineError`] naming that stage. Nothing is retried and nothing is
//! shared between runs. Dropping the future returned by
//! [`ValidationPipeline::run`] abandons any in-flight network call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::compliance::ComplianceResult;
use crate::dispatch::{Dispatch, DispatchError, Notifier, RecipientSet, SmtpNotifier};
use crate::extract::{ExtractError, JsonExtractor};
use crate::llm::{GatewayError, GeminiGateway, InferenceGateway};
use crate::prompt::compose;
use crate::report::{render, render_workbook, report_filename, ReportError, ReportRow};
use crate::settings::ReviewSettings;
use crate::workflow::{ToolKind, UploadedWorkflow};

const RAW_EXCERPT_CHARS: usize = 500;

/// Pipeline states, in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classified,
    PromptBuilt,
    Inferred,
    Parsed,
    Rendered,
    Dispatched,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Received => "upload",
            Self::Classified => "classification",
            Self::PromptBuilt => "prompt construction",
            Self::Inferred => "inference",
            Self::Parsed => "response parsing",
            Self::Rendered => "report rendering",
            Self::Dispatched => "dispatch",
            Self::Completed => "completion",
        };
        f.write_str(label)
    }
}

/// Underlying reason a stage failed.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("{source}; raw response: {raw_excerpt}")]
    Extract {
        #[source]
        source: ExtractError,
        raw_excerpt: String,
    },
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A run that stopped before `Completed`.
///
/// When the failure happens after the model reply was parsed (rendering or
/// dispatch), `result` still holds the computed compliance result.
#[derive(Debug, Error)]
#[error("{stage} failed: {cause}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub cause: StageError,
    pub result: Option<ComplianceResult>,
}

impl PipelineError {
    fn new(stage: Stage, cause: StageError) -> Self {
        Self {
            stage,
            cause,
            result: None,
        }
    }

    fn with_result(mut self, result: &ComplianceResult) -> Self {
        self.result = Some(result.clone());
        self
    }
}

/// Everything the caller supplies for one review.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub workflow: UploadedWorkflow,
    pub recipients: RecipientSet,
}

impl ValidationRequest {
    pub fn new(workflow: UploadedWorkflow) -> Self {
        Self {
            workflow,
            recipients: RecipientSet::default(),
        }
    }

    pub fn with_recipients(mut self, recipients: RecipientSet) -> Self {
        self.recipients = recipients;
        self
    }
}

/// Product of a completed run.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub tool_kind: ToolKind,
    pub result: ComplianceResult,
    pub rows: Vec<ReportRow>,
    pub workbook: Vec<u8>,
    pub report_name: String,
    pub dispatched: bool,
}

impl ValidationOutcome {
    /// JSON returned to the caller: the parsed result, not the spreadsheet.
    pub fn response_body(&self) -> Value {
        json!({ "result": self.result })
    }
}

pub struct ValidationPipeline {
    gateway: Arc<dyn InferenceGateway>,
    notifier: Option<Arc<dyn Notifier>>,
    extractor: JsonExtractor,
    stage_timeout: Option<Duration>,
}

impl ValidationPipeline {
    pub fn new(gateway: Arc<dyn InferenceGateway>) -> Self {
        Self {
            gateway,
            notifier: None,
            extractor: JsonExtractor::default(),
            stage_timeout: None,
        }
    }

    /// Wire the Gemini gateway and, when SMTP is configured, the mail notifier.
    ///
    /// An unusable SMTP section only disables dispatch: runs that ask for it
    /// fail at the dispatch stage with [`DispatchError::NotConfigured`].
    pub fn from_settings(settings: &ReviewSettings) -> anyhow::Result<Self> {
        let gateway =
            GeminiGateway::new(&settings.gateway).context("failed to configure inference gateway")?;
        let mut pipeline = Self::new(Arc::new(gateway))
            .with_extractor(JsonExtractor::new(settings.pipeline.scan_mode))
            .with_stage_timeout(settings.pipeline.stage_timeout());
        if let Some(smtp) = &settings.smtp {
            match SmtpNotifier::new(smtp) {
                Ok(notifier) => pipeline = pipeline.with_notifier(Arc::new(notifier)),
                Err(err) => warn!(
                    host = %smtp.host,
                    error = %err,
                    "SMTP settings unusable; report dispatch disabled"
                ),
            }
        }
        Ok(pipeline)
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_extractor(mut self, extractor: JsonExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_stage_timeout(mut self, limit: Option<Duration>) -> Self {
        self.stage_timeout = limit;
        self
    }

    #[instrument(name = "validate_workflow", skip_all, fields(filename = %request.workflow.filename()))]
    pub async fn run(&self, request: ValidationRequest) -> Result<ValidationOutcome, PipelineError> {
        let ValidationRequest {
            workflow,
            recipients,
        } = request;
        debug!(stage = %Stage::Received, bytes = workflow.raw_bytes().len(), "workflow received");

        let tool_kind = workflow.tool_kind();
        if !tool_kind.is_known() {
            warn!(filename = workflow.filename(), "unrecognized workflow extension");
        }
        debug!(stage = %Stage::Classified, tool = %tool_kind);

        let prompt = compose(tool_kind, workflow.decoded_text());
        debug!(stage = %Stage::PromptBuilt, prompt_len = prompt.as_str().len());

        let raw = self
            .bounded(self.gateway.invoke(&prompt))
            .await
            .map_err(|cause| PipelineError::new(Stage::Inferred, cause))?;
        debug!(stage = %Stage::Inferred, reply_len = raw.len());

        let result = self
            .extractor
            .extract_compliance(&raw)
            .map_err(|source| {
                PipelineError::new(
                    Stage::Parsed,
                    StageError::Extract {
                        source,
                        raw_excerpt: truncate(&raw, RAW_EXCERPT_CHARS),
                    },
                )
            })?;
        debug!(stage = %Stage::Parsed, score = result.compliance_score);

        let rows = render(&result);
        let mut workbook = render_workbook(&rows).map_err(|err| {
            PipelineError::new(Stage::Rendered, err.into()).with_result(&result)
        })?;
        let report_name = report_filename(workflow.filename());
        debug!(stage = %Stage::Rendered, rows = rows.len(), bytes = workbook.len());

        let dispatched = recipients.wants_dispatch();
        if dispatched {
            let notifier = self.notifier.as_ref().ok_or_else(|| {
                PipelineError::new(Stage::Dispatched, DispatchError::NotConfigured.into())
                    .with_result(&result)
            })?;
            let dispatch =
                Dispatch::report(workflow.filename(), recipients, workbook, report_name.clone());
            self.bounded(notifier.deliver(&dispatch))
                .await
                .map_err(|cause| {
                    PipelineError::new(Stage::Dispatched, cause).with_result(&result)
                })?;
            debug!(stage = %Stage::Dispatched, to = dispatch.recipients.to.len());
            workbook = dispatch.attachment;
        }

        info!(
            stage = %Stage::Completed,
            tool = %tool_kind,
            score = result.compliance_score,
            issues = result.issues.len(),
            dispatched,
            "workflow validation completed"
        );
        Ok(ValidationOutcome {
            tool_kind,
            result,
            rows,
            workbook,
            report_name,
            dispatched,
        })
    }

    /// Await a network stage, bounded by the configured timeout if any.
    async fn bounded<T, E, F>(&self, future: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StageError>,
    {
        match self.stage_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| StageError::Timeout(limit))?
                .map_err(Into::into),
            None => future.await.map_err(Into::into),
        }
    }
}

fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    input.chars().take(max_chars).collect::<String>() + "…"
}
