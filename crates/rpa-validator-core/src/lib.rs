pub mod compliance;
pub mod dispatch;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod settings;
pub mod workflow;

pub use compliance::ComplianceResult;
pub use dispatch::{Dispatch, DispatchError, Notifier, RecipientSet, SmtpNotifier};
pub use extract::{extract, ExtractError, JsonExtractor, ScanMode};
pub use llm::{GatewayError, GeminiGateway, InferenceGateway};
pub use pipeline::{
    PipelineError, Stage, StageError, ValidationOutcome, ValidationPipeline, ValidationRequest,
};
pub use prompt::{compose, ReviewPrompt};
pub use report::{render, render_workbook, report_filename, ReportError, ReportRow};
pub use settings::{GatewaySettings, PipelineSettings, ReviewSettings, SmtpSettings};
pub use workflow::{classify, AutomationTool, ToolKind, UploadedWorkflow};
