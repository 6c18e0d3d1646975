//! Shared value types for the drawroom turn-orchestration core.
//!
//! This crate has no async runtime and no I/O of its own — it is the
//! leaf dependency every other crate in the workspace builds on.

pub mod config;
pub mod error;
pub mod model;
pub mod token;

pub use error::{Error, Result};
