//! Error types for the billscan library.
//!
//! Every pipeline stage returns `Result<_, BillScanError>`. A stage never
//! hands back an empty record to signal failure, so "the model found nothing"
//! and "something broke" can never be confused.
//!
//! The variants are deliberately finer-grained than what a client sees.
//! [`BillScanError::kind`] collapses them onto the five outcome kinds an
//! upload can end in (plus configuration), and [`ErrorResponse`] is the
//! `{kind, message}` body handed back to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// All errors returned by the billscan library.
#[derive(Debug, Error)]
pub enum BillScanError {
    // ── Input / field validation ──────────────────────────────────────────
    /// The uploaded file was refused, or the extracted bill lacks a vendor
    /// or a positive total.
    #[error("{reason}")]
    Validation { reason: String },

    // ── Upstream (vision API) ─────────────────────────────────────────────
    /// The vision API answered with a non-success status, or the request
    /// never got an answer (`status` is `None` for transport failures).
    ///
    /// `body` holds the upstream response body for logging only.
    #[error("{}", upstream_message(*status, body))]
    Upstream { status: Option<u16>, body: String },

    /// The vision API did not answer within the configured timeout.
    #[error("Vision API did not respond within {secs}s")]
    UpstreamTimeout { secs: u64 },

    // ── Model output ──────────────────────────────────────────────────────
    /// The model answered but produced no usable text.
    #[error("{}", empty_message(reason.as_deref()))]
    ExtractionEmpty { reason: Option<String> },

    /// The model's text (or the envelope around it) is not valid JSON for a
    /// bill. `text` is kept for diagnostics and never shown to the caller.
    #[error("Model output could not be read as a bill: {source}")]
    Deserialization {
        #[source]
        source: serde_json::Error,
        text: String,
    },

    // ── Persistence ───────────────────────────────────────────────────────
    /// The bill store refused or failed the operation.
    #[error("Bill store error: {detail}")]
    Storage { detail: String },

    /// The bill store did not finish within the configured timeout.
    #[error("Bill store did not respond within {secs}s")]
    StorageTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Startup configuration is missing or invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn upstream_message(status: Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("Vision API request failed with HTTP {code}"),
        None if body.is_empty() => "Vision API request failed".to_string(),
        None => format!("Vision API request failed: {body}"),
    }
}

fn empty_message(reason: Option<&str>) -> String {
    match reason {
        Some(r) => format!("Model returned no extractable text ({r})"),
        None => "Model returned no extractable text".to_string(),
    }
}

impl BillScanError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn storage(detail: impl fmt::Display) -> Self {
        Self::Storage {
            detail: detail.to_string(),
        }
    }

    /// Outcome kind this error surfaces as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Upstream { .. } | Self::UpstreamTimeout { .. } => ErrorKind::Upstream,
            Self::ExtractionEmpty { .. } => ErrorKind::ExtractionEmpty,
            Self::Deserialization { .. } => ErrorKind::Deserialization,
            Self::Storage { .. } | Self::StorageTimeout { .. } => ErrorKind::Storage,
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

/// The client-visible classification of a failed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "UpstreamError")]
    Upstream,
    #[serde(rename = "ExtractionEmptyError")]
    ExtractionEmpty,
    #[serde(rename = "DeserializationError")]
    Deserialization,
    #[serde(rename = "StorageError")]
    Storage,
    #[serde(rename = "ConfigError")]
    Config,
}

impl ErrorKind {
    /// `true` when the caller sent something unusable (bad-request);
    /// everything else is a server-side failure.
    pub fn is_client_error(self) -> bool {
        matches!(self, ErrorKind::Validation)
    }

    /// HTTP status an outer REST layer should answer with.
    pub fn http_status(self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Upstream => "UpstreamError",
            ErrorKind::ExtractionEmpty => "ExtractionEmptyError",
            ErrorKind::Deserialization => "DeserializationError",
            ErrorKind::Storage => "StorageError",
            ErrorKind::Config => "ConfigError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{kind, message}` body returned to the caller of a rejected upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&BillScanError> for ErrorResponse {
    fn from(err: &BillScanError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
