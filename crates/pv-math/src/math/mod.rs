//! Core math modules.

pub mod compare;
pub mod linalg;
