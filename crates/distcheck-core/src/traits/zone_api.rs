// # Zone API Trait
//
// Defines the interface the check engine needs from a DNS provider's
// managing API: create a record, ask whether it has been distributed to
// every authoritative name server, delete it again.
//
// ## Implementations
//
// - DNSimple: `distcheck-dnsimple` crate
//
// ## Usage
//
// ```rust,ignore
// use distcheck_core::traits::{RecordAttributes, ZoneApi};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let api = /* ZoneApi implementation */;
//
//     let account = api.whoami().await?;
//     let attrs = RecordAttributes::txt("_probe", "hello");
//     let id = api.create_record(&account, "example.com", &attrs).await?;
//
//     while !api.check_distribution(&account, "example.com", &id).await? {
//         tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//     }
//
//     api.delete_record(&account, "example.com", &id).await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Provider account identifier, resolved once at startup
pub type AccountId = String;

/// Provider record identifier, as returned by record creation
pub type RecordId = String;

/// Attributes of a record to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAttributes {
    /// Record name relative to the zone (e.g. "_distribution_check_20240101000000")
    pub name: String,

    /// Record type (e.g. "TXT")
    #[serde(rename = "type")]
    pub record_type: String,

    /// Record content
    pub content: String,

    /// Time-to-live; provider default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl RecordAttributes {
    /// Build TXT record attributes
    pub fn txt(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: "TXT".to_string(),
            content: content.into(),
            ttl: None,
        }
    }
}

/// Trait for zone API implementations
///
/// Handles are shared read-only across every concurrently running check
/// cycle, so implementations must be stateless per call and thread-safe.
///
/// # Cancellation
///
/// Deadlines and cancellation are applied by the caller, which drops the
/// returned future when the cycle's deadline or shutdown fires. Implementations
/// must therefore be cancel-safe: dropping a pending call must not leave
/// shared state inconsistent.
///
/// # Single-shot
///
/// Each method performs exactly one API request. Implementations must NOT
/// retry: a failed poll aborts the cycle, and the next cycle starts on the
/// next scheduler tick.
#[async_trait]
pub trait ZoneApi: Send + Sync {
    /// Resolve the account the credentials belong to
    ///
    /// Called once at startup. Failure is fatal to the daemon.
    async fn whoami(&self) -> Result<AccountId, crate::Error>;

    /// Create a record in the zone
    ///
    /// # Returns
    ///
    /// - `Ok(RecordId)`: Identifier of the created record
    /// - `Err(Error)`: If the provider rejected the record or the request failed
    async fn create_record(
        &self,
        account_id: &str,
        domain: &str,
        attributes: &RecordAttributes,
    ) -> Result<RecordId, crate::Error>;

    /// Query whether a record has reached every authoritative name server
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The record is fully distributed
    /// - `Ok(false)`: Distribution is still in progress
    /// - `Err(Error)`: If the request failed
    async fn check_distribution(
        &self,
        account_id: &str,
        domain: &str,
        record_id: &str,
    ) -> Result<bool, crate::Error>;

    /// Delete a record from the zone
    async fn delete_record(
        &self,
        account_id: &str,
        domain: &str,
        record_id: &str,
    ) -> Result<(), crate::Error>;

    /// Get the API name (for logging/debugging)
    fn api_name(&self) -> &'static str;
}

/// Helper trait for constructing zone APIs from configuration
pub trait ZoneApiFactory: Send + Sync {
    /// Create a ZoneApi instance from configuration
    fn create(&self, config: &crate::config::ApiConfig) -> Result<Box<dyn ZoneApi>, crate::Error>;
}
