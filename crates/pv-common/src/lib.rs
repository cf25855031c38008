//! POMDP value iteration common types and errors.
//!
//! This crate provides foundational types shared across the solver crates:
//! - The unified error type with stable codes
//! - Output format specifications

pub mod error;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError, SuggestedAction};
pub use output::OutputFormat;
