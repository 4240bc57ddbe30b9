//! Error types for RDAP lookups.
//!
//! These surface only inside the crate: the public `check` API folds every
//! failure into `DomainStatus::Unknown` so a lookup can never report a
//! domain as available by accident.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RdapError>;

#[derive(Debug, Error)]
pub enum RdapError {
    /// Network-level failure (connect, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx, non-404 response from an RDAP server
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The TLD has no RDAP server in the IANA bootstrap file
    #[error("No RDAP server found for TLD .{0}")]
    UnsupportedTld(String),

    /// Response body was not valid RDAP JSON
    #[error("Parse error: {0}")]
    Parse(String),
}
