//! Core types for vecdb-setup
//!
//! Configuration, validation errors and constants shared across all other crates.

mod config;
pub mod constants;
mod env_config;
mod error;

pub use config::*;
pub use constants::*;
pub use env_config::{env_non_blank, env_parse_with_default};
pub use error::*;
