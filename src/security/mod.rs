//! Security module
//!
//! Input validation for anything that will be handed to the page auditor

pub mod url_validation;

pub use url_validation::validate_target_url;
