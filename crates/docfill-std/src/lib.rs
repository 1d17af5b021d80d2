//! Additional functions wrapping Rust's standard library for docfill.

pub mod error;
pub mod time;

pub use error::{ErrKind, Error, Result};
