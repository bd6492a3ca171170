//! Utility functions
//!
//! Environment variable loading and parsing shared by configuration.

pub mod env;

pub use env::{env_string, env_u64, load_env};
