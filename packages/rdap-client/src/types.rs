//! RDAP lookup result types.

use serde::{Deserialize, Serialize};

/// Registration status of a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainStatus {
    /// The registry returned no record (404) — appears registerable
    Available,
    /// A registration record exists
    Registered,
    /// Could not determine (server error, rate limit, unsupported TLD)
    Unknown,
}

/// Result of a single availability check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainCheck {
    /// The checked domain, lowercased
    pub domain: String,

    pub status: DomainStatus,

    /// Registrar name, when registered and reported
    pub registrar: Option<String>,

    /// Expiration date (YYYY-MM-DD), when reported
    pub expiration: Option<String>,

    /// Registration date (YYYY-MM-DD), when reported
    pub creation: Option<String>,

    /// Why the status is unknown, when it is
    pub error: Option<String>,
}

impl DomainCheck {
    pub fn available(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            status: DomainStatus::Available,
            registrar: None,
            expiration: None,
            creation: None,
            error: None,
        }
    }

    pub fn registered(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            status: DomainStatus::Registered,
            registrar: None,
            expiration: None,
            creation: None,
            error: None,
        }
    }

    pub fn unknown(domain: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            status: DomainStatus::Unknown,
            registrar: None,
            expiration: None,
            creation: None,
            error: Some(error.into()),
        }
    }
}
