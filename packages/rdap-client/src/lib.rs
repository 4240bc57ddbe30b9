//! RDAP domain availability client.
//!
//! A minimal client for the Registration Data Access Protocol, the IETF
//! replacement for WHOIS. No API keys required. For each domain the client
//! resolves the TLD's RDAP server from IANA's bootstrap file (fetched once
//! and cached), then queries `<server>/domain/<name>`: a 404 means the
//! domain appears available, a record means it is registered, and anything
//! else maps to unknown — never to available.
//!
//! # Example
//!
//! ```rust,ignore
//! use rdap_client::RdapClient;
//!
//! let client = RdapClient::new();
//! let check = client.check("example.com").await;
//! println!("{}: {:?}", check.domain, check.status);
//! ```

pub mod error;
pub mod types;

pub use error::{RdapError, Result};
pub use types::{DomainCheck, DomainStatus};

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

const IANA_BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";
const USER_AGENT: &str = "domain-search-rdap/0.1 (bulk availability checks)";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONCURRENCY: usize = 5;
const DEFAULT_SLOT_INTERVAL: Duration = Duration::from_millis(500);

/// RDAP availability client.
///
/// Stateless apart from the cached bootstrap map; safe to share behind an
/// `Arc` and call concurrently.
pub struct RdapClient {
    http_client: reqwest::Client,
    bootstrap_url: String,
    bootstrap: OnceCell<HashMap<String, String>>,
    concurrency: usize,
    slot_interval: Duration,
}

impl RdapClient {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            bootstrap_url: IANA_BOOTSTRAP_URL.to_string(),
            bootstrap: OnceCell::new(),
            concurrency: DEFAULT_CONCURRENCY,
            slot_interval: DEFAULT_SLOT_INTERVAL,
        }
    }

    /// Override the bootstrap URL (test servers).
    pub fn with_bootstrap_url(mut self, url: impl Into<String>) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// Set the bulk-check worker count.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the minimum interval between request dispatches in bulk checks.
    pub fn with_slot_interval(mut self, interval: Duration) -> Self {
        self.slot_interval = interval;
        self
    }

    /// Check a single domain.
    ///
    /// Infallible by construction: lookup failures come back as
    /// `DomainStatus::Unknown` with the reason attached.
    pub async fn check(&self, domain: &str) -> DomainCheck {
        let domain = domain.trim().to_lowercase();

        let server = match self.rdap_server_for(&domain).await {
            Ok(server) => server,
            Err(e) => {
                debug!(domain = %domain, error = %e, "no RDAP server");
                return DomainCheck::unknown(domain, e.to_string());
            }
        };

        match self.query_domain(&server, &domain).await {
            Ok(check) => check,
            Err(RdapError::Http { status: 404, .. }) => DomainCheck::available(domain),
            Err(RdapError::Http { status: 429, .. }) => {
                warn!(domain = %domain, "RDAP rate limited");
                DomainCheck::unknown(domain, "Rate limited - try again later")
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "RDAP lookup failed");
                DomainCheck::unknown(domain, e.to_string())
            }
        }
    }

    /// Check many domains with a bounded worker pool.
    ///
    /// At most `concurrency` lookups run at once and dispatches are spaced
    /// by `slot_interval` so free registry endpoints are not hammered.
    /// Results come back in input order.
    pub async fn check_bulk(&self, domains: &[String]) -> Vec<DomainCheck> {
        let semaphore = Semaphore::new(self.concurrency);
        let next_slot = Mutex::new(Instant::now());

        let futures = domains.iter().map(|domain| {
            let semaphore = &semaphore;
            let next_slot = &next_slot;

            async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");

                // Claim the next dispatch slot, then wait for it
                let dispatch_at = {
                    let mut slot = next_slot.lock().await;
                    let at = (*slot).max(Instant::now());
                    *slot = at + self.slot_interval;
                    at
                };
                tokio::time::sleep_until(dispatch_at).await;

                self.check(domain).await
            }
        });

        futures::future::join_all(futures).await
    }

    /// Resolve the RDAP server for a domain's TLD from the bootstrap map.
    async fn rdap_server_for(&self, domain: &str) -> Result<String> {
        let tld = domain.rsplit('.').next().unwrap_or(domain).to_lowercase();

        let map = self
            .bootstrap
            .get_or_try_init(|| self.fetch_bootstrap())
            .await?;

        map.get(&tld)
            .cloned()
            .ok_or(RdapError::UnsupportedTld(tld))
    }

    /// Fetch IANA's bootstrap file and build the TLD → server map.
    async fn fetch_bootstrap(&self) -> Result<HashMap<String, String>> {
        debug!(url = %self.bootstrap_url, "fetching RDAP bootstrap");

        let response = self.http_client.get(&self.bootstrap_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RdapError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| RdapError::Parse(e.to_string()))?;

        Ok(parse_bootstrap(&value))
    }

    async fn query_domain(&self, server: &str, domain: &str) -> Result<DomainCheck> {
        let url = format!("{}/domain/{}", server.trim_end_matches('/'), domain);

        let response = self
            .http_client
            .get(&url)
            .header("accept", "application/rdap+json, application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RdapError::Http {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| RdapError::Parse(e.to_string()))?;

        Ok(parse_domain_record(domain, &value))
    }
}

impl Default for RdapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the TLD → server map from a bootstrap document.
///
/// Each service entry is `[[tlds...], [servers...]]`; the first server wins.
fn parse_bootstrap(value: &Value) -> HashMap<String, String> {
    let mut map = HashMap::new();

    if let Some(services) = value.get("services").and_then(|s| s.as_array()) {
        for entry in services {
            let tlds = entry.get(0).and_then(|t| t.as_array());
            let server = entry
                .get(1)
                .and_then(|s| s.as_array())
                .and_then(|s| s.first())
                .and_then(|s| s.as_str());

            if let (Some(tlds), Some(server)) = (tlds, server) {
                let server = server.trim_end_matches('/').to_string();
                for tld in tlds.iter().filter_map(|t| t.as_str()) {
                    map.insert(tld.to_lowercase(), server.clone());
                }
            }
        }
    }

    map
}

/// Extract registration details from an RDAP domain record.
///
/// A record that parses at all means the domain is registered; registrar and
/// event dates are best-effort.
fn parse_domain_record(domain: &str, value: &Value) -> DomainCheck {
    let mut check = DomainCheck::registered(domain);

    // Registrar: the entity with the "registrar" role, preferring the vcard
    // formatted name over the handle
    if let Some(entities) = value.get("entities").and_then(|e| e.as_array()) {
        for entity in entities {
            let is_registrar = entity
                .get("roles")
                .and_then(|r| r.as_array())
                .map(|roles| roles.iter().any(|r| r.as_str() == Some("registrar")))
                .unwrap_or(false);
            if !is_registrar {
                continue;
            }

            check.registrar = vcard_formatted_name(entity)
                .or_else(|| entity.get("handle").and_then(|h| h.as_str()).map(String::from));
            break;
        }
    }

    // Event dates, trimmed to the date part
    if let Some(events) = value.get("events").and_then(|e| e.as_array()) {
        for event in events {
            let action = event.get("eventAction").and_then(|a| a.as_str());
            let date = event
                .get("eventDate")
                .and_then(|d| d.as_str())
                .map(|d| d.chars().take(10).collect::<String>());

            match action {
                Some("expiration") => check.expiration = date,
                Some("registration") => check.creation = date,
                _ => {}
            }
        }
    }

    check
}

/// Pull the `fn` (formatted name) out of a jCard array.
fn vcard_formatted_name(entity: &Value) -> Option<String> {
    let items = entity.get("vcardArray")?.get(1)?.as_array()?;
    for item in items {
        let item = item.as_array()?;
        if item.first()?.as_str()? == "fn" {
            return item.get(3)?.as_str().map(String::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bootstrap_first_server_wins() {
        let value = json!({
            "services": [
                [["com", "net"], ["https://rdap.verisign.com/com/v1/", "https://backup.example/"]],
                [["io"], ["https://rdap.identitydigital.services/rdap"]]
            ]
        });

        let map = parse_bootstrap(&value);
        assert_eq!(map["com"], "https://rdap.verisign.com/com/v1");
        assert_eq!(map["net"], "https://rdap.verisign.com/com/v1");
        assert_eq!(map["io"], "https://rdap.identitydigital.services/rdap");
    }

    #[test]
    fn test_parse_domain_record_full() {
        let value = json!({
            "entities": [
                {
                    "roles": ["registrant"],
                    "handle": "ignore-me"
                },
                {
                    "roles": ["registrar"],
                    "handle": "376",
                    "vcardArray": ["vcard", [
                        ["version", {}, "text", "4.0"],
                        ["fn", {}, "text", "Porkbun LLC"]
                    ]]
                }
            ],
            "events": [
                {"eventAction": "registration", "eventDate": "2019-03-02T08:00:00Z"},
                {"eventAction": "expiration", "eventDate": "2027-03-02T08:00:00Z"}
            ]
        });

        let check = parse_domain_record("example.com", &value);
        assert_eq!(check.status, DomainStatus::Registered);
        assert_eq!(check.registrar.as_deref(), Some("Porkbun LLC"));
        assert_eq!(check.creation.as_deref(), Some("2019-03-02"));
        assert_eq!(check.expiration.as_deref(), Some("2027-03-02"));
    }

    #[test]
    fn test_parse_domain_record_registrar_handle_fallback() {
        let value = json!({
            "entities": [{"roles": ["registrar"], "handle": "1479"}]
        });

        let check = parse_domain_record("example.io", &value);
        assert_eq!(check.registrar.as_deref(), Some("1479"));
        assert!(check.expiration.is_none());
    }

    #[test]
    fn test_parse_domain_record_bare() {
        let check = parse_domain_record("example.dev", &json!({}));
        assert_eq!(check.status, DomainStatus::Registered);
        assert!(check.registrar.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_tld_maps_to_unknown() {
        // Bootstrap URL points nowhere routable; the fetch error must fold
        // into Unknown, never Available.
        let client = RdapClient::new().with_bootstrap_url("http://127.0.0.1:1/dns.json");
        let check = client.check("example.zzzz").await;

        assert_eq!(check.status, DomainStatus::Unknown);
        assert!(check.error.is_some());
    }

    #[tokio::test]
    async fn test_bulk_preserves_input_order() {
        let client = RdapClient::new()
            .with_bootstrap_url("http://127.0.0.1:1/dns.json")
            .with_slot_interval(Duration::from_millis(0));
        let domains = vec!["a.zz".to_string(), "b.zz".to_string(), "c.zz".to_string()];

        let checks = client.check_bulk(&domains).await;
        let returned: Vec<_> = checks.iter().map(|c| c.domain.as_str()).collect();
        assert_eq!(returned, ["a.zz", "b.zz", "c.zz"]);
    }
}
