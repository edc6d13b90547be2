//! Shared types for the podcast client: backend wire format, configuration
//! and platform paths.

pub mod config;
pub mod platform;
pub mod protocol;
