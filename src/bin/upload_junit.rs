//! CLI tool to upload a JUnit XML report to a running server.
//!
//! Usage:
//!   cargo run --bin upload-junit -- --project-id 1 --suite-id 2 --file target/junit.xml
//!
//! The server base URL is read from `API_BASE_URL` (default: http://localhost:8080).

use std::env;
use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, PartialEq)]
struct UploadArgs {
    project_id: i64,
    suite_id: i64,
    file: PathBuf,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let upload = match parse_args(&args[1..]) {
        Ok(upload) => upload,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    let base_url = env::var("API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

    if let Err(e) = upload_report(&base_url, &upload).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<UploadArgs, String> {
    let mut project_id: Option<i64> = None;
    let mut suite_id: Option<i64> = None;
    let mut file: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args
            .get(i + 1)
            .ok_or_else(|| format!("{} requires a value", flag))?;
        match flag {
            "--project-id" | "-p" => project_id = Some(parse_id(flag, value)?),
            "--suite-id" | "-s" => suite_id = Some(parse_id(flag, value)?),
            "--file" | "-f" => file = Some(PathBuf::from(value)),
            _ => return Err(format!("Unknown argument: {}", flag)),
        }
        i += 2;
    }

    Ok(UploadArgs {
        project_id: project_id.ok_or("--project-id is required")?,
        suite_id: suite_id.ok_or("--suite-id is required")?,
        file: file.ok_or("--file is required")?,
    })
}

fn parse_id(flag: &str, value: &str) -> Result<i64, String> {
    match value.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(format!("{} must be a positive integer, got '{}'", flag, value)),
    }
}

fn import_url(base_url: &str, project_id: i64, suite_id: i64) -> String {
    format!(
        "{}/api/projects/{}/suites/{}/junit_imports",
        base_url.trim_end_matches('/'),
        project_id,
        suite_id
    )
}

async fn upload_report(base_url: &str, upload: &UploadArgs) -> Result<(), String> {
    let data = tokio::fs::read(&upload.file)
        .await
        .map_err(|e| format!("Failed to read {}: {}", upload.file.display(), e))?;

    let file_name = file_name_of(&upload.file);
    println!("Uploading {} ({} bytes)...", file_name, data.len());

    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str("application/xml")
        .map_err(|e| format!("Invalid content type: {}", e))?;
    let form = Form::new().part("junitFile", part);

    let url = import_url(base_url, upload.project_id, upload.suite_id);
    let response = reqwest::Client::new()
        .post(&url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| format!("Request to {} failed: {}", url, e))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response: {}", e))?;

    println!("HTTP {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| body.clone())
        ),
        Err(_) => println!("{}", body),
    }

    if status.as_u16() >= 400 {
        return Err(format!("Upload rejected with status {}", status));
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "junit.xml".to_string())
}

fn print_usage() {
    println!("Usage: upload-junit --project-id <ID> --suite-id <ID> --file <PATH>");
    println!();
    println!("Options:");
    println!("  -p, --project-id <ID>   Project that owns the suite");
    println!("  -s, --suite-id <ID>     Test suite receiving the build");
    println!("  -f, --file <PATH>       JUnit XML report to upload");
    println!();
    println!("Environment:");
    println!("  API_BASE_URL            Server URL (default: {})", DEFAULT_API_BASE_URL);
}
