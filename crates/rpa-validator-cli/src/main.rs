use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpa_validator_core::{
    classify, JsonExtractor, RecipientSet, ReviewSettings, ScanMode, UploadedWorkflow,
    ValidationPipeline, ValidationRequest,
};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "rpa-validator",
    author,
    version,
    about = "LLM-backed best-practice review for RPA workflow files"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON); environment variables take precedence
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Review a workflow file and print the compliance result as JSON
    Validate {
        /// Workflow export (.xaml, .bprelease, .bpprocess, .bpobject)
        file: PathBuf,
        /// Comma-separated recipients; when set the report is emailed
        #[arg(long, value_name = "EMAILS")]
        to: Option<String>,
        /// Comma-separated CC recipients
        #[arg(long, value_name = "EMAILS")]
        cc: Option<String>,
        /// Comma-separated BCC recipients
        #[arg(long, value_name = "EMAILS")]
        bcc: Option<String>,
        /// Save the spreadsheet report to this file or directory
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Recover the compliance JSON from a saved model reply (file or stdin)
    Extract {
        file: Option<PathBuf>,
        /// Ignore braces that appear inside JSON strings
        #[arg(long)]
        string_aware: bool,
    },
    /// Show which automation tool each file is attributed to
    Classify {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate {
            file,
            to,
            cc,
            bcc,
            report,
            pretty,
        } => {
            let settings = load_settings(cli.config.as_deref())?;
            let recipients = RecipientSet::from_fields(to.as_deref(), cc.as_deref(), bcc.as_deref());
            validate(&settings, &file, recipients, report.as_deref(), pretty).await?
        }
        Commands::Extract { file, string_aware } => {
            let settings = load_settings(cli.config.as_deref())?;
            let mode = if string_aware {
                ScanMode::StringAware
            } else {
                settings.pipeline.scan_mode
            };
            extract(file.as_deref(), mode).await?
        }
        Commands::Classify { files } => {
            for file in files {
                let name = file_name(&file);
                println!("{}: {}", file.display(), classify(&name, ""));
            }
        }
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<ReviewSettings> {
    let base = match path {
        Some(path) => config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<ReviewSettings>())
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => ReviewSettings::default(),
    };
    base.with_env()
}

async fn validate(
    settings: &ReviewSettings,
    file: &Path,
    recipients: RecipientSet,
    report: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read workflow file {}", file.display()))?;
    let workflow = UploadedWorkflow::new(file_name(file), bytes);
    let pipeline = ValidationPipeline::from_settings(settings)?;

    let request = ValidationRequest::new(workflow).with_recipients(recipients);
    let outcome = match pipeline.run(request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            // Dispatch and rendering failures still carry the parsed result.
            if let Some(result) = &err.result {
                println!("{}", serde_json::to_string(&serde_json::json!({ "result": result }))?);
            }
            return Err(err.into());
        }
    };

    if let Some(target) = report {
        let path = if target.is_dir() {
            target.join(&outcome.report_name)
        } else {
            target.to_path_buf()
        };
        tokio::fs::write(&path, &outcome.workbook)
            .await
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "report saved");
    }

    let body = outcome.response_body();
    if pretty {
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", serde_json::to_string(&body)?);
    }
    Ok(())
}

async fn extract(file: Option<&Path>, mode: ScanMode) -> Result<()> {
    let text = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buffer)
                .await
                .context("failed to read model reply from stdin")?;
            buffer
        }
    };
    let result = JsonExtractor::new(mode).extract_compliance(&text)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
