#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use markup::{Location, MarkupDocument, ValidationError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use uuid::Uuid;

const USER_ID_HEADER: &str = "x-user-id";
const ROLE_HEADER: &str = "x-user-role";
const SITE_ID_HEADER: &str = "x-site-id";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {body}")]
    Server { status: u16, body: String },
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("document is not valid: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Parser, Debug)]
#[command(name = "markup-cli", about = "Blueprint markup document API CLI")]
struct Cli {
    #[arg(long, env = "MARKUP_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "MARKUP_USER_ID")]
    user_id: Uuid,

    #[arg(long, env = "MARKUP_ROLE", default_value = "worker")]
    role: String,

    #[arg(long, env = "MARKUP_SITE_ID")]
    site_id: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    user_id: Uuid,
    role: String,
    site_id: Option<Uuid>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the server health endpoint.
    Ping,
    /// List documents visible to the caller.
    List {
        #[arg(long, value_parser = parse_location)]
        location: Option<Location>,
        #[arg(long)]
        site: Option<Uuid>,
        /// Request the administrator view.
        #[arg(long, default_value_t = false)]
        admin: bool,
    },
    /// Fetch one document.
    Get { id: Uuid },
    /// Create or update a document from a JSON file.
    Save { file: PathBuf },
    /// Soft-delete a document.
    Delete { id: Uuid },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, user_id: cli.user_id, role: cli.role, site_id: cli.site_id };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::List { location, site, admin } => {
            let json = api_request(&ctx, reqwest::Method::GET, &list_path(location, site, admin), None).await?;
            print_json(&json)
        }
        Command::Get { id } => {
            let json = api_request(&ctx, reqwest::Method::GET, &format!("/markup-documents/{id}"), None).await?;
            print_json(&json)
        }
        Command::Save { file } => {
            let doc = load_document(&file)?;
            let body = serde_json::to_value(&doc)?;
            let json = api_request(&ctx, reqwest::Method::POST, "/markup-documents", Some(body)).await?;
            print_json(&json)
        }
        Command::Delete { id } => {
            api_request(&ctx, reqwest::Method::DELETE, &format!("/markup-documents/{id}"), None).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let url = format!("{}/healthz", cli.base_url.trim_end_matches('/'));
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::Server { status: status.as_u16(), body: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let client = reqwest::Client::builder()
        .default_headers(identity_headers(cli)?)
        .build()?;
    let url = format!("{}{}", cli.base_url.trim_end_matches('/'), path);

    let request = client.request(method, &url);
    let request = if let Some(json) = body { request.json(&json) } else { request };

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(CliError::Server { status: status.as_u16(), body: text });
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

fn identity_headers(cli: &CliContext) -> Result<HeaderMap, CliError> {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(USER_ID_HEADER), HeaderValue::from_str(&cli.user_id.to_string())?);
    headers.insert(HeaderName::from_static(ROLE_HEADER), HeaderValue::from_str(&cli.role)?);
    if let Some(site_id) = cli.site_id {
        headers.insert(HeaderName::from_static(SITE_ID_HEADER), HeaderValue::from_str(&site_id.to_string())?);
    }
    Ok(headers)
}

fn list_path(location: Option<Location>, site: Option<Uuid>, admin: bool) -> String {
    let mut params = Vec::new();
    if let Some(location) = location {
        params.push(format!("location={}", location.as_str()));
    }
    if let Some(site) = site {
        params.push(format!("site={site}"));
    }
    if admin {
        params.push("admin=true".to_owned());
    }
    if params.is_empty() {
        "/markup-documents".to_owned()
    } else {
        format!("/markup-documents?{}", params.join("&"))
    }
}

fn parse_location(raw: &str) -> Result<Location, String> {
    Location::parse(raw).ok_or_else(|| format!("expected `personal` or `shared`, got {raw:?}"))
}

/// Read and validate a document file before anything is sent.
fn load_document(path: &Path) -> Result<MarkupDocument, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_owned(), source })?;
    parse_document(&raw)
}

fn parse_document(raw: &str) -> Result<MarkupDocument, CliError> {
    let doc: MarkupDocument = serde_json::from_str(raw)?;
    doc.validate()?;
    Ok(doc)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
