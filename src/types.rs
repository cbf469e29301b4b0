//! Core types and errors for the recon client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::target::TargetError;

/// Longest response body excerpt kept on a service error.
pub const MAX_ERROR_BODY: usize = 500;

/// Errors that can occur while driving or consuming a scan.
#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Job {job_id} still processing after {attempts} status checks")]
    PollTimeout { job_id: String, attempts: u32 },

    #[error("Service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("Unexpected response format: {0}")]
    Unparseable(String),

    #[error("Scan job failed: {0}")]
    JobFailed(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ReconError>;

/// User-facing classification of every failure path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NetworkFailure,
    Timeout,
    ServiceError,
    UnparseableResponse,
}

impl ReconError {
    /// Build a service error, truncating the body for display.
    pub fn service(status: u16, body: &str) -> Self {
        ReconError::Service {
            status,
            body: truncate_chars(body, MAX_ERROR_BODY),
        }
    }

    /// Classify the error into one of the user-facing kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconError::InvalidTarget(_) | ReconError::Config(_) => ErrorKind::InvalidInput,
            ReconError::Network(_) | ReconError::Http(_) | ReconError::Io(_) => {
                ErrorKind::NetworkFailure
            }
            ReconError::Timeout(_) | ReconError::PollTimeout { .. } => ErrorKind::Timeout,
            ReconError::Service { .. } | ReconError::JobFailed(_) => ErrorKind::ServiceError,
            ReconError::Unparseable(_) | ReconError::Json(_) => ErrorKind::UnparseableResponse,
        }
    }

    /// Human-readable message shown to the operator.
    pub fn user_message(&self) -> String {
        match self {
            ReconError::InvalidTarget(TargetError::Empty) => {
                "Please enter a domain or URL (e.g., example.com)".to_string()
            }
            ReconError::InvalidTarget(TargetError::InvalidFormat) => {
                "Invalid URL format. Use example.com or https://example.com".to_string()
            }
            ReconError::Service { status: 404, .. } => "API endpoint not found (404).".to_string(),
            ReconError::Service {
                status: status @ (401 | 403),
                ..
            } => format!("Access denied ({}).", status),
            ReconError::Service { status, .. } if *status >= 500 => {
                format!("Server error ({}).", status)
            }
            ReconError::Service { status, body } => {
                format!("Scan request failed (HTTP {}): {}", status, body)
            }
            ReconError::Timeout(after) => format!("Scan timed out ({}s).", after.as_secs()),
            ReconError::PollTimeout { job_id, attempts } => format!(
                "Scan job {} did not finish after {} status checks. It may still complete server-side.",
                job_id, attempts
            ),
            ReconError::Unparseable(_) | ReconError::Json(_) => {
                "Unexpected response format (not JSON).".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Presentation tag attached to a display item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Warning,
    Error,
}

/// A single labelled value in a normalized category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayItem {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl DisplayItem {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

/// A detected technology, coerced into a fixed shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Technology {
    pub name: String,
    pub version: String,
    /// Integer confidence in [0, 100].
    pub confidence: u8,
    pub source: String,
    /// Untouched copy of the originating entry.
    pub raw: serde_json::Value,
}

/// The seven fixed display groupings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Security,
    Domain,
    Technologies,
    Content,
    Infrastructure,
    Evidence,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::General,
        Category::Security,
        Category::Domain,
        Category::Technologies,
        Category::Content,
        Category::Infrastructure,
        Category::Evidence,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Security => "security",
            Category::Domain => "domain",
            Category::Technologies => "technologies",
            Category::Content => "content",
            Category::Infrastructure => "infrastructure",
            Category::Evidence => "evidence",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::General => "General Information",
            Category::Security => "Security Analysis",
            Category::Domain => "Domain Intelligence",
            Category::Technologies => "Technology Profile",
            Category::Content => "Content Analysis",
            Category::Infrastructure => "Infrastructure Details",
            Category::Evidence => "Raw Evidence",
        }
    }
}

/// A raw report mapped into the fixed categories. Every category is always present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedReport {
    pub general: Vec<DisplayItem>,
    pub security: Vec<DisplayItem>,
    pub domain: Vec<DisplayItem>,
    pub technologies: Vec<Technology>,
    pub content: Vec<DisplayItem>,
    pub infrastructure: Vec<DisplayItem>,
    pub evidence: Vec<DisplayItem>,
}

impl NormalizedReport {
    /// Display items of a category; `None` for the technology list.
    pub fn items(&self, category: Category) -> Option<&[DisplayItem]> {
        match category {
            Category::General => Some(&self.general),
            Category::Security => Some(&self.security),
            Category::Domain => Some(&self.domain),
            Category::Technologies => None,
            Category::Content => Some(&self.content),
            Category::Infrastructure => Some(&self.infrastructure),
            Category::Evidence => Some(&self.evidence),
        }
    }

    /// Look up a display item by its label.
    pub fn find(&self, category: Category, label: &str) -> Option<&DisplayItem> {
        self.items(category)?.iter().find(|item| item.label == label)
    }
}

/// Qualitative security level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SecurityLevel {
    /// No report to judge.
    Unknown,
    Low,
    Medium,
    High,
}

impl SecurityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityLevel::Unknown => "Unknown",
            SecurityLevel::Low => "Low",
            SecurityLevel::Medium => "Medium",
            SecurityLevel::High => "High",
        }
    }

    pub fn status(self) -> Status {
        match self {
            SecurityLevel::High => Status::Success,
            SecurityLevel::Medium => Status::Warning,
            SecurityLevel::Low | SecurityLevel::Unknown => Status::Error,
        }
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic security score derived from a raw report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityAssessment {
    pub score: u8,
    pub level: SecurityLevel,
    /// One reason per triggered rule, in rule order.
    pub factors: Vec<String>,
}

/// Server-side job status as tracked by the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// An asynchronous scan job handed out by the service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanJob {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    /// Number of "still processing" replies seen so far.
    pub attempts: u32,
    pub status: JobStatus,
}

impl ScanJob {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            submitted_at: Utc::now(),
            attempts: 0,
            status: JobStatus::Pending,
        }
    }
}

/// A completed scan: the raw report together with its derived views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub raw: serde_json::Value,
    pub normalized: NormalizedReport,
    pub assessment: SecurityAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<ScanJob>,
    pub duration_secs: f64,
}

/// Serialized record of one scan attempt, used for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ScanReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub rate_limit: u32,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 120,
            rate_limit: 5,
            user_agent: "Mozilla/5.0 (compatible; superrecon/0.1)".to_string(),
        }
    }
}
