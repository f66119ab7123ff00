//! HTTP access for the checker
//!
//! Two capabilities: a lightweight no-body HEAD request used to classify
//! liveness, and a full GET used only for local HTML pages. Both follow
//! redirects. A transport error or a non-2xx status is a `Failure` outcome,
//! never a panic or a retry; retrying is the frontier's job on a later pass.

use crate::model::STATUS_UNREACHABLE;
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;

/// Response metadata carried downstream after a successful request
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub status: i32,
    /// Normalized content type: lowercased, parameters stripped
    pub content_type: String,
    /// From the content-length header, or inferred from the body
    pub content_length: i64,
    /// Final effective URL after redirects
    pub final_url: String,
}

impl ResponseMeta {
    pub fn is_html(&self) -> bool {
        self.content_type == "text/html"
    }
}

/// A classified request failure: the HTTP status, or the unreachable
/// sentinel for transport-level errors.
#[derive(Debug, Clone)]
pub struct Failure {
    pub status: i32,
    pub message: String,
}

/// Strips parameters from a content-type header value and lowercases it
fn normalize_content_type(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Builds the HTTP client used for all checker requests
///
/// # Arguments
///
/// * `user_agent` - Full user agent string to send
/// * `timeout_secs` - Request timeout in seconds
pub fn build_http_client(user_agent: &str, timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

fn meta_from_response(response: &Response) -> ResponseMeta {
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(normalize_content_type)
        .unwrap_or_default();

    let content_length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(0);

    ResponseMeta {
        status: response.status().as_u16() as i32,
        content_type,
        content_length,
        final_url: response.url().to_string(),
    }
}

fn transport_failure(url: &str, err: &reqwest::Error) -> Failure {
    let message = if err.is_timeout() {
        format!("Connection error: timeout for {}", url)
    } else if err.is_connect() {
        format!("Connection error: {}", err)
    } else {
        format!("Request error: {}", err)
    };
    Failure {
        status: STATUS_UNREACHABLE,
        message,
    }
}

/// Issues a no-body HEAD request for the URL, following redirects.
///
/// A 2xx response is success, carrying the headers needed downstream.
/// Any other status, or a transport error, is a `Failure` with a code and
/// a human-readable message.
pub async fn head_url(client: &Client, url: &str) -> Result<ResponseMeta, Failure> {
    match client.head(url).send().await {
        Ok(response) => {
            let meta = meta_from_response(&response);
            if response.status().is_success() {
                Ok(meta)
            } else {
                Err(Failure {
                    status: meta.status,
                    message: format!("HTTP {} for {}", meta.status, url),
                })
            }
        }
        Err(e) => Err(transport_failure(url, &e)),
    }
}

/// Fetches the full body of a URL, following redirects.
///
/// The content length is inferred from the body when the header is absent.
pub async fn get_url(client: &Client, url: &str) -> Result<(ResponseMeta, String), Failure> {
    match client.get(url).send().await {
        Ok(response) => {
            let mut meta = meta_from_response(&response);
            if !response.status().is_success() {
                return Err(Failure {
                    status: meta.status,
                    message: format!("HTTP {} for {}", meta.status, url),
                });
            }
            match response.text().await {
                Ok(body) => {
                    if meta.content_length == 0 {
                        meta.content_length = body.len() as i64;
                    }
                    Ok((meta, body))
                }
                Err(e) => Err(transport_failure(url, &e)),
            }
        }
        Err(e) => Err(transport_failure(url, &e)),
    }
}
