//! # ldgradnja-core
//!
//! Core crate for the LDGradnja backend. Contains configuration schemas
//! and the unified error system shared by the converter and API crates.
//!
//! This crate has **no** internal dependencies on other LDGradnja crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
