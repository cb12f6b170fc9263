//! # featscope Common Library
//!
//! Shared code for the featscope services including:
//! - Wire types of the Feature Data Service
//! - Event types (ExplorerEvent enum)
//! - Configuration loading
//! - Server-Sent Events helpers

pub mod config;
pub mod error;
pub mod events;
pub mod sse;
pub mod types;

pub use error::{Error, Result};
pub use types::FeatureId;
