//! Error types for each stage of the pipeline.

use std::path::PathBuf;

use chrono::NaiveDate;
use reqwest::StatusCode;
use thiserror::Error;

use crate::process::DatasetLabel;

/// A single transport call failed after its retry budget.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (connect, timeout, body read).
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Every attempt came back with a retryable status.
    #[error("{url} still returned {status} after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        status: StatusCode,
        attempts: u32,
    },
}

/// No report could be obtained for a report identifier.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no report for {fid} on any of {} business days tried", .attempted.len())]
    Exhausted {
        fid: String,
        attempted: Vec<NaiveDate>,
    },

    #[error("failed to stage report at {}: {source}", .path.display())]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SectionError {
    #[error("section start marker `{marker}` not found")]
    StartNotFound { marker: String },

    #[error("section end marker `{marker}` not found after line {start}")]
    EndNotFound { marker: String, start: usize },
}

/// A row could not be brought to the canonical width.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("{label}: no repair rule for a row of {tokens} tokens")]
    NoRule { label: DatasetLabel, tokens: usize },

    #[error("{label}: row has {tokens} tokens, more than the canonical {width}")]
    Overflow {
        label: DatasetLabel,
        tokens: usize,
        width: usize,
    },

    #[error("{label}: repairing {tokens} tokens produced {produced} fields")]
    Misaligned {
        label: DatasetLabel,
        tokens: usize,
        produced: usize,
    },
}

/// Anything that fails one data-set without touching its siblings.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error(transparent)]
    Section(#[from] SectionError),

    /// `line` is one-based.
    #[error("line {line}: {source}")]
    Reconcile {
        line: usize,
        #[source]
        source: ReconcileError,
    },

    #[error("table assembly failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("table assembly failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0} section has no data rows")]
    EmptySection(DatasetLabel),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid base endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}
