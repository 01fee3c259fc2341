// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Multipart encoding of submissions.
//!
//! The catalog service accepts `multipart/form-data` with four text parts,
//! in this order:
//!
//! ```text
//! product_name, price, tax, product_type
//! ```
//!
//! followed by an optional `files[]` part holding JPEG bytes.

use uuid::Uuid;

use crate::error::EncodingError;
use crate::submission::Submission;

const IMAGE_FIELD: &str = "files[]";
const IMAGE_FILENAME: &str = "product.jpg";
const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// An encoded request body together with the boundary that delimits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl RequestBody {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the `Content-Type` request header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Checks that a submission can be encoded, without building the body.
pub fn validate(submission: &Submission) -> Result<(), EncodingError> {
    match submission.image() {
        Some(bytes) if bytes.is_empty() => Err(EncodingError::EmptyImage),
        _ => Ok(()),
    }
}

/// Serializes a submission into a multipart body with a fresh boundary.
pub fn encode(submission: &Submission) -> Result<RequestBody, EncodingError> {
    validate(submission)?;

    let boundary = format!("Boundary-{}", Uuid::new_v4());
    let mut bytes = Vec::new();

    let price = submission.price().to_string();
    let tax = submission.tax_rate().to_string();
    let fields = [
        ("product_name", submission.name()),
        ("price", price.as_str()),
        ("tax", tax.as_str()),
        ("product_type", submission.category().as_str()),
    ];
    for (name, value) in fields {
        write_text_part(&mut bytes, &boundary, name, value);
    }

    if let Some(image) = submission.image() {
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        bytes.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{IMAGE_FIELD}\"; filename=\"{IMAGE_FILENAME}\"\r\n"
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(format!("Content-Type: {IMAGE_CONTENT_TYPE}\r\n\r\n").as_bytes());
        bytes.extend_from_slice(image);
        bytes.extend_from_slice(b"\r\n");
    }

    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok(RequestBody { boundary, bytes })
}

fn write_text_part(out: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    out.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
#[path = "encoder_tests.rs"]
mod tests;
