//! Core module - shared infrastructure for Carelink
//!
//! This module contains foundational types, configuration, logging and error
//! handling used throughout the application.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::Config;
pub use error::{CarelinkError, Result};
pub use types::*;
