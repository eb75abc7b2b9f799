//! Error types for Certflow.
//!
//! All errors in Certflow are represented by the `CertflowError` enum,
//! which provides specific variants for different error categories.

use std::io::ErrorKind;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Certflow operations.
///
/// Graph mutators surface a missing target as [`CertflowError::NodeNotFound`]
/// instead of silently handing back the unchanged graph.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum CertflowError {
    /// No node with the given id exists anywhere in the graph.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Structural violations (wrong node kind, branch index, duplicate id).
    #[error("{0}")]
    Graph(String),

    /// Workflow envelope errors (release, enable, parse).
    #[error("{0}")]
    Workflow(String),

    /// Console-level errors (lifecycle, repository operations).
    #[error("{0}")]
    Console(String),

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors.
    #[error("{0}")]
    Convert(String),

    /// Storage operation errors.
    #[error("{0}")]
    Store(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// Realtime subscription errors.
    #[error("{0}")]
    Subscription(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl From<CertflowError> for String {
    fn from(val: CertflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for CertflowError {
    fn from(error: std::io::Error) -> Self {
        CertflowError::IoError(error.to_string())
    }
}

impl From<CertflowError> for std::io::Error {
    fn from(val: CertflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for CertflowError {
    fn from(error: serde_json::Error) -> Self {
        CertflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for CertflowError {
    fn from(error: toml::de::Error) -> Self {
        CertflowError::Config(error.to_string())
    }
}
