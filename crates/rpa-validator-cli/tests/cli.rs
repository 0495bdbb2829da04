use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;
use std::fs::{read, write};
use std::path::{Path, PathBuf};

const ENV_VARS: &[&str] = &[
    "GEMINI_API_KEY",
    "GEMINI_API_URL",
    "GEMINI_API_MODEL",
    "GEMINI_TIMEOUT_SECS",
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASSWORD",
    "EMAIL_FROM",
    "RPA_VALIDATOR_STAGE_TIMEOUT_SECS",
    "RPA_VALIDATOR_SCAN_MODE",
];

fn validator() -> Command {
    let mut cmd = Command::cargo_bin("rpa-validator").unwrap();
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn classify_reports_tool_per_file() {
    validator()
        .args(["classify", "Main.xaml", "Release.BPRELEASE", "notes.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Main.xaml: UiPath"))
        .stdout(predicate::str::contains("Release.BPRELEASE: Blue Prism"))
        .stdout(predicate::str::contains("notes.txt: Unrecognized"));
}

#[test]
fn extract_reads_model_reply_from_stdin() {
    validator()
        .arg("extract")
        .write_stdin(
            "Sure! {\"tool\":\"UiPath\",\"compliance_score\":72,\"issues\":[\"ne1\"],\"recommendations\":[\"r1\"]} Thanks.",
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("\"compliance_score\": 72"))
        .stdout(predicate::str::contains("\"ne1\""));
}

#[test]
fn extract_fails_without_json() {
    validator()
        .arg("extract")
        .write_stdin("I am unable to review this workflow.")
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON not found"));
}

#[test]
fn extract_string_aware_flag_handles_braces_in_strings() {
    let reply = "{\"tool\":\"UiPath\",\"compliance_score\":5,\"issues\":[\"stray {\"],\"recommendations\":[]}";

    validator()
        .arg("extract")
        .write_stdin(reply)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unbalanced JSON"));

    validator()
        .args(["extract", "--string-aware"])
        .write_stdin(reply)
        .assert()
        .success()
        .stdout(predicate::str::contains("stray {"));
}

#[test]
fn extract_reads_reply_file() {
    let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    write(
        file.path(),
        "```json\n{\"tool\":\"Blue Prism\",\"compliance_score\":61}\n```",
    )
    .unwrap();

    validator()
        .args(["extract", file.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blue Prism"));
}

#[test]
fn validate_without_api_key_is_a_configuration_error() {
    let file = tempfile::Builder::new().suffix(".xaml").tempfile().unwrap();
    write(file.path(), "<Activity/>").unwrap();

    validator()
        .args(["validate", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GEMINI_API_KEY"));
}

#[test]
fn validate_reports_unreadable_settings_file() {
    let workflow = tempfile::Builder::new().suffix(".xaml").tempfile().unwrap();
    write(workflow.path(), "<Activity/>").unwrap();
    let settings = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write(settings.path(), "gateway = [this is not toml").unwrap();

    validator()
        .args([
            "--config",
            settings.path().to_str().unwrap(),
            "validate",
            workflow.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load settings"));
}

#[test]
fn extract_honours_scan_mode_from_settings_file() {
    let settings = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write(
        settings.path(),
        "[pipeline]\nscan_mode = \"string_aware\"\nstage_timeout_secs = 30\n",
    )
    .unwrap();

    validator()
        .args(["--config", settings.path().to_str().unwrap(), "extract"])
        .write_stdin("{\"tool\":\"UiPath\",\"compliance_score\":5,\"issues\":[\"stray {\"],\"recommendations\":[]}")
        .assert()
        .success()
        .stdout(predicate::str::contains("stray {"));
}

const MODEL: &str = "gemini-test";
const API_KEY: &str = "test-key";

fn mock_review<'a>(server: &'a MockServer, reply: &str) -> httpmock::Mock<'a> {
    let body = json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": reply}]}}]
    });
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/v1beta/models/{MODEL}:generateContent"))
            .query_param("key", API_KEY);
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body);
    })
}

const REVIEW: &str = "Here is the review: {\"tool\":\"UiPath\",\"compliance_score\":72,\"issues\":[\"No error handling\"],\"recommendations\":[\"Add try-catch\",\"Log exceptions\"]}";

fn workflow_in(dir: &Path) -> PathBuf {
    let path = dir.join("Main.xaml");
    write(&path, "<Activity x:Class=\"Main\"/>").unwrap();
    path
}

fn validator_against(server: &MockServer) -> Command {
    let mut cmd = validator();
    cmd.env("GEMINI_API_KEY", API_KEY)
        .env("GEMINI_API_URL", server.base_url())
        .env("GEMINI_API_MODEL", MODEL);
    cmd
}

#[test]
#[ignore = "requires loopback networking"]
fn validate_prints_result_and_saves_report_into_directory() {
    let server = MockServer::start();
    let mock = mock_review(&server, REVIEW);
    let uploads = tempfile::tempdir().unwrap();
    let reports = tempfile::tempdir().unwrap();
    let workflow = workflow_in(uploads.path());

    validator_against(&server)
        .args([
            "validate",
            workflow.to_str().unwrap(),
            "--report",
            reports.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{\"result\":"))
        .stdout(predicate::str::contains("\"compliance_score\":72"))
        .stdout(predicate::str::contains("Log exceptions"));

    let workbook = read(reports.path().join("validation_Main.xaml.xlsx")).unwrap();
    assert!(workbook.starts_with(b"PK"));
    mock.assert();
}

#[test]
#[ignore = "requires loopback networking"]
fn validate_writes_report_to_named_file() {
    let server = MockServer::start();
    let mock = mock_review(&server, REVIEW);
    let uploads = tempfile::tempdir().unwrap();
    let workflow = workflow_in(uploads.path());
    let target = uploads.path().join("review.xlsx");

    validator_against(&server)
        .args([
            "validate",
            workflow.to_str().unwrap(),
            "--report",
            target.to_str().unwrap(),
            "--pretty",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"compliance_score\": 72"));

    assert!(read(&target).unwrap().starts_with(b"PK"));
    mock.assert();
}

#[test]
#[ignore = "requires loopback networking"]
fn validate_prints_result_before_failing_dispatch() {
    let server = MockServer::start();
    let mock = mock_review(&server, REVIEW);
    let uploads = tempfile::tempdir().unwrap();
    let workflow = workflow_in(uploads.path());

    validator_against(&server)
        .args([
            "validate",
            workflow.to_str().unwrap(),
            "--to",
            "qa@example.com",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"compliance_score\":72"))
        .stderr(predicate::str::contains("dispatch failed"));
    mock.assert();
}

#[test]
#[ignore = "requires loopback networking"]
fn validate_reads_gateway_and_pipeline_from_settings_file() {
    let server = MockServer::start();
    let mock = mock_review(
        &server,
        "{\"tool\":\"UiPath\",\"compliance_score\":40,\"issues\":[\"Selector uses {wildcard}\"],\"recommendations\":[]}",
    );
    let uploads = tempfile::tempdir().unwrap();
    let workflow = workflow_in(uploads.path());
    let settings = uploads.path().join("validator.toml");
    write(
        &settings,
        format!(
            "[gateway]\napi_key = \"{API_KEY}\"\nendpoint = \"{}\"\nmodel = \"{MODEL}\"\ntimeout_secs = 10\n\n[pipeline]\nscan_mode = \"string_aware\"\nstage_timeout_secs = 30\n",
            server.base_url()
        ),
    )
    .unwrap();

    validator()
        .args([
            "--config",
            settings.to_str().unwrap(),
            "validate",
            workflow.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selector uses {wildcard}"));
    mock.assert();
}
