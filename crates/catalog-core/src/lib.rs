// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! catalog-core: product submissions and their wire encoding.
//!
//! This crate holds the pieces of the catalog client that need neither a
//! runtime nor a network:
//! - [`Submission`] and [`Category`], the validated product record
//! - [`ProductForm`], raw form input that converts into a submission
//! - [`encode`], the multipart body the catalog service expects
//! - [`jsonl`], durable line-oriented file helpers

pub mod encoder;
pub mod error;
pub mod jsonl;
pub mod submission;

pub use encoder::{encode, RequestBody};
pub use error::{EncodingError, JsonlError, ValidationError};
pub use submission::{Category, ProductForm, Submission};
