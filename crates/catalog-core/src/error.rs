// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for catalog-core operations.

use thiserror::Error;

/// Raw product input that cannot become a [`Submission`](crate::Submission).
///
/// These are caller mistakes: they are reported before anything is routed
/// and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    FieldEmpty { field: &'static str },

    #[error("invalid {field}: '{value}' is not a number")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("{field} cannot be negative")]
    Negative { field: &'static str },

    #[error("invalid product type: '{0}'\n  hint: valid types are: Shoes, Electronics, Service, Product, Clothing, Others")]
    UnknownCategory(String),
}

/// A submission that cannot be turned into a request body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("image is attached but contains no bytes")]
    EmptyImage,
}

/// Failures reading or writing JSONL files.
#[derive(Debug, Error)]
pub enum JsonlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("json error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A specialized Result type for JSONL operations.
pub type JsonlResult<T> = std::result::Result<T, JsonlError>;
