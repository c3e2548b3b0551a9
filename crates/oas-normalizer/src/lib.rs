#![allow(clippy::doc_markdown)] // README uses "OpenAPI" proper noun throughout
#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! ## API Reference

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod generate;
pub mod naming;
mod passes;
mod pipeline;
pub mod refs;
pub mod walk;

pub use error::{Error, Result};
pub use generate::{generate_client, DEFAULT_GENERATOR};
pub use oas_model as model;
pub use pipeline::{fix, normalize, parse_document, serialize};
