//! Vigil Core - Shared types, configuration, and error handling

pub mod backoff;
pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use backoff::Backoff;
pub use config::*;
pub use constants::*;
pub use error::{Error, Result};
pub use types::*;
