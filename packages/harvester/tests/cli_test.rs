//! Command-line behaviour of `counter-harvester`.

use std::fs;
use std::path::Path;

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

async fn pr_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/pr"))
        .and(query_param("api_key", "secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(load_fixture("pr_report.json"), "application/json"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reports/tr"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_raw(load_fixture("not_authorized.json"), "application/json"),
        )
        .mount(&server)
        .await;
    server
}

#[test]
fn test_help_lists_download() {
    cargo_bin_cmd!("counter-harvester")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"));
}

#[test]
fn test_invalid_report_type() {
    cargo_bin_cmd!("counter-harvester")
        .args([
            "download",
            "https://sushi.example.com",
            "--customer-id",
            "cust",
            "--report-type",
            "xx_y1",
            "-b",
            "2019-01",
            "-e",
            "2019-02",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid report type: 'xx_y1'"));
}

#[test]
fn test_invalid_month() {
    cargo_bin_cmd!("counter-harvester")
        .args([
            "download",
            "https://sushi.example.com",
            "--customer-id",
            "cust",
            "-b",
            "2019-01-01",
            "-e",
            "2019-02",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Expected YYYY-MM"));
}

#[test]
fn test_unsupported_release() {
    cargo_bin_cmd!("counter-harvester")
        .args([
            "download",
            "https://sushi.example.com",
            "--customer-id",
            "cust",
            "--version",
            "4",
            "-b",
            "2019-01",
            "-e",
            "2019-02",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("COUNTER release"));
}

#[test]
fn test_missing_url() {
    cargo_bin_cmd!("counter-harvester")
        .args(["download", "--customer-id", "cust", "-b", "2019-01", "-e", "2019-02"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No SUSHI URL given"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_records_as_csv() {
    let server = pr_server().await;
    let uri = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("counter-harvester")
            .env_remove("COUNTER_LONG_DATE_FORMAT_FIRST")
            .args([
                "download",
                uri.as_str(),
                "--customer-id",
                "cust",
                "--api-key",
                "secret",
                "-t",
                "pr",
                "-b",
                "2019-01",
                "-e",
                "2019-02",
                "--records",
            ])
            .output()
            .expect("run counter-harvester")
    })
    .await
    .expect("blocking task");

    output
        .assert()
        .success()
        .stdout(predicate::str::starts_with("start,end,"))
        .stdout(predicate::str::contains(",Searches_Platform,17"))
        .stderr(predicate::str::contains("Records: 3"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_raw_body_from_config_file() {
    let server = pr_server().await;
    let credentials = tempfile::NamedTempFile::new().expect("temp file");
    fs::write(
        credentials.path(),
        format!("url: {}\ncustomer_id: cust\napi_key: secret\n", server.uri()),
    )
    .expect("write credentials");
    let config_path = credentials.path().to_path_buf();

    let output = tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("counter-harvester")
            .env_remove("COUNTER_LONG_DATE_FORMAT_FIRST")
            .arg("download")
            .arg("--config")
            .arg(&config_path)
            .args(["-t", "pr", "-b", "2019-01", "-e", "2019-02"])
            .output()
            .expect("run counter-harvester")
    })
    .await
    .expect("blocking task");

    output
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Report_ID\": \"PR\""));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_exits_with_failure() {
    let server = pr_server().await;
    let uri = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("counter-harvester")
            .args([
                "download", uri.as_str(), "--customer-id", "cust", "-b", "2019-01", "-e", "2019-02",
            ])
            .output()
            .expect("run counter-harvester")
    })
    .await
    .expect("blocking task");

    output
        .assert()
        .code(1)
        .stdout(predicate::str::contains("2010"))
        .stderr(predicate::str::contains("Error error 2010"));
}
