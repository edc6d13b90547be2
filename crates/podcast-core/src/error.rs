//! Error types for backend calls.
//!
//! The stores themselves never fail; these only cross the client and merge
//! boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport, timeout or body decode failure
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx HTTP status
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// Backend envelope carried a non-zero code
    #[error("backend error {code}: {message}")]
    Api { code: u32, message: String },

    /// Envelope was successful but `result` was empty
    #[error("backend returned no result for {0}")]
    MissingResult(&'static str),

    #[error("no stages selected for merge")]
    EmptySelection,

    #[error("merge title is required")]
    MissingTitle,
}

pub type Result<T> = std::result::Result<T, Error>;
