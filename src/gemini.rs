//! Gemini generateContent wire types and blocking transport client.
//!
//! Every call is a single synchronous POST. Failures never surface as `Err`:
//! each step yields a [`StepResult`] whose text falls back to a sentinel
//! string, with the user-visible error carried alongside.

use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Text substituted when a 200 response carries no usable candidate.
pub const NO_CANDIDATES_SENTINEL: &str = "No candidates available in the response";

/// Request body for the generateContent endpoint.
#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct Part {
    pub text: String,
}

impl GenerateRequest {
    /// Wraps a single user-role message around the given text.
    pub fn from_user_text(text: &str) -> Self {
        Self {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }],
        }
    }
}

/// Outcome of one generation call.
///
/// `text` is always populated — with model output on success, or with a
/// sentinel describing the failure otherwise. `error` holds the message to
/// display to the user when something went wrong.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub text: String,
    pub error: Option<String>,
}

impl StepResult {
    pub fn ok(text: String) -> Self {
        Self { text, error: None }
    }

    pub fn failed(sentinel: String, error: String) -> Self {
        Self {
            text: sentinel,
            error: Some(error),
        }
    }
}

/// Seam between the orchestration chain and the wire.
///
/// Production uses [`GeminiClient`]; tests substitute scripted fakes.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> StepResult;
}

/// Blocking HTTP client bound to one model endpoint.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
}

impl GeminiClient {
    /// Builds a client for `{api_base}/v1/models/{model}:generateContent`,
    /// with the API key embedded as a query parameter.
    pub fn new(api_base: &str, model: &str, api_key: &str) -> Self {
        let endpoint = format!(
            "{}/v1/models/{}:generateContent?key={}",
            api_base.trim_end_matches('/'),
            model,
            api_key
        );
        Self {
            http: reqwest::blocking::Client::new(),
            endpoint,
        }
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> StepResult {
        let body = GenerateRequest::from_user_text(prompt);

        debug!(prompt_chars = prompt.chars().count(), "gemini_request");

        let response = match self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "gemini_transport_failed");
                return StepResult::failed(
                    format!("API request failed: {}", e),
                    format!("API request failed: {}", e),
                );
            }
        };

        let status = response.status();
        let raw_body = response.text().unwrap_or_default();
        classify_response(status, &raw_body)
    }
}

/// Maps an HTTP status and raw body onto a [`StepResult`].
///
/// Only two failure shapes exist: non-200 responses, and 200 responses where
/// the first candidate's text cannot be extracted.
pub fn classify_response(status: StatusCode, raw_body: &str) -> StepResult {
    if status != StatusCode::OK {
        let code = status.as_u16();
        warn!(status = code, "gemini_request_failed");
        return StepResult::failed(
            format!("API request failed with status code {}", code),
            format!(
                "API request failed with status code {}: {}",
                code, raw_body
            ),
        );
    }

    let json: Value = match serde_json::from_str(raw_body) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "gemini_response_unparseable");
            return StepResult::failed(
                NO_CANDIDATES_SENTINEL.to_string(),
                format!(
                    "No candidates available in the response. Full response: {}",
                    raw_body
                ),
            );
        }
    };

    match extract_candidate_text(&json) {
        Some(text) => StepResult::ok(text),
        None => {
            warn!("gemini_response_missing_candidates");
            StepResult::failed(
                NO_CANDIDATES_SENTINEL.to_string(),
                format!(
                    "No candidates available in the response. Full response: {}",
                    json
                ),
            )
        }
    }
}

/// Pulls `candidates[0].content.parts[0].text` out of a parsed response.
fn extract_candidate_text(json: &Value) -> Option<String> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}
