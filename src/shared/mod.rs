//! Shared components - configuration and errors

pub mod errors;
pub mod config;
