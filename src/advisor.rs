//! Free-text mortgage advice from a language model.
//!
//! The computed figures and the user's question are folded into one prompt
//! ([`format_prompt`]) and handed to an [`Advisor`]. [`get_advice`] is the only
//! entry point callers need: whatever goes wrong with the service comes back as
//! an `"Error: ..."` string, never as a panic or an `Err`.
use std::time::Duration;

use log::{debug, warn};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::loan::{AmortizationResult, LoanTerms};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("no API key configured (set GOOGLE_API_KEY)")]
    MissingApiKey,
    #[error("invalid endpoint: {0}")]
    InvalidUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("advisor returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A text-in, text-out advice service.
pub trait Advisor {
    fn advise(&self, prompt: &str) -> Result<String, AdvisorError>;
}

/// Figures quoted to the advisor.
#[derive(Clone, Copy, PartialEq, Debug, serde::Serialize)]
pub struct MortgageSummary {
    pub home_price: f64,
    pub down_payment: f64,
    pub interest_rate: f64,
    pub term_years: u32,
    pub loan_amount: f64,
    pub monthly_payment: f64,
    pub total_interest: f64,
    pub total_principal: f64,
}

impl MortgageSummary {
    pub fn new(
        home_price: f64,
        down_payment: f64,
        terms: &LoanTerms,
        result: &AmortizationResult,
    ) -> Self {
        Self {
            home_price,
            down_payment,
            interest_rate: terms.annual_rate_percent(),
            term_years: terms.term_years(),
            loan_amount: terms.principal(),
            monthly_payment: result.payment(),
            total_interest: result.total_interest(),
            total_principal: result.total_principal(),
        }
    }
}

pub fn format_prompt(summary: &MortgageSummary, question: &str) -> String {
    format!(
        "You are a mortgage advisor bot.

Given the following mortgage:
- Home price: ${}
- Down payment: ${}
- Interest rate: {}%
- Loan term: {} years
- Loan amount: ${}
- Monthly payment: ${:.2}
- Total interest paid: ${:.2}
- Total principal paid: ${:.2}

User question: {}

Provide advice in simple, friendly language.
",
        summary.home_price,
        summary.down_payment,
        summary.interest_rate,
        summary.term_years,
        summary.loan_amount,
        summary.monthly_payment,
        summary.total_interest,
        summary.total_principal,
        question.trim()
    )
}

/// Asks `advisor`, turning any failure into a displayable `"Error: ..."` message.
pub fn get_advice(advisor: &dyn Advisor, prompt: &str) -> String {
    match advisor.advise(prompt) {
        Ok(text) => text,
        Err(err) => {
            warn!("advice request failed: {err}");
            format!("Error: {err}")
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Google Gemini `generateContent` over a blocking HTTP client.
#[derive(Debug, Clone)]
pub struct GeminiAdvisor {
    endpoint: Url,
    api_key: String,
    http: reqwest::blocking::Client,
}

impl GeminiAdvisor {
    pub fn new(config: GeminiConfig) -> Result<Self, AdvisorError> {
        if config.api_key.trim().is_empty() {
            return Err(AdvisorError::MissingApiKey);
        }
        let endpoint = Url::parse(&config.base_url)
            .and_then(|base| base.join(&format!("v1beta/models/{}:generateContent", config.model)))
            .map_err(|err| AdvisorError::InvalidUrl(format!("{}: {err}", config.base_url)))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            endpoint,
            api_key: config.api_key,
            http,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl Advisor for GeminiAdvisor {
    fn advise(&self, prompt: &str) -> Result<String, AdvisorError> {
        debug!("POST {} ({} prompt bytes)", self.endpoint, prompt.len());
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let res = self
            .http
            .post(self.endpoint.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&payload)
            .send()?;

        let status = res.status();
        let body = res.text()?;
        if status.is_success() {
            return parse_response(&body);
        }

        Err(AdvisorError::Status {
            code: status.as_u16(),
            message: error_message(&body),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Text of the first candidate, with its parts joined.
fn parse_response(body: &str) -> Result<String, AdvisorError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|err| AdvisorError::Malformed(err.to_string()))?;
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AdvisorError::Malformed("no candidates in response".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(AdvisorError::Malformed(format!(
            "candidate has no text (finish reason {reason})"
        )));
    }
    Ok(text)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .map(|err| err.error.message)
        .unwrap_or_else(|_| "unknown error".to_string())
}
