// # DNSimple Zone API
//
// This crate provides a DNSimple API v2 implementation of `ZoneApi` for the
// distribution monitor.
//
// ## Behaviour
//
// - One HTTP request per trait call (the check engine owns polling and deadlines)
// - No retry, no backoff: a failed poll ends the cycle, the next tick starts a new one
// - HTTP timeout configured (60 seconds)
// - Specific error handling for HTTP status codes (400, 401, 403, 404, 429, 5xx)
// - Account ID either configured or resolved once via `whoami`
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Construction fails fast if the token is empty
//
// ## API Reference
//
// - DNSimple API v2: https://developer.dnsimple.com/v2/
// - Whoami: GET `/whoami`
// - Create Record: POST `/:account/zones/:zone/records`
// - Check Distribution: GET `/:account/zones/:zone/records/:record/distribution`
// - Delete Record: DELETE `/:account/zones/:zone/records/:record`

use async_trait::async_trait;
use distcheck_core::config::ApiConfig;
use distcheck_core::traits::{AccountId, RecordAttributes, RecordId, ZoneApi, ZoneApiFactory};
use distcheck_core::{Error, Result};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// DNSimple production API base URL
pub const DNSIMPLE_API_BASE: &str = "https://api.dnsimple.com/v2";

/// DNSimple sandbox API base URL
pub const DNSIMPLE_SANDBOX_API_BASE: &str = "https://api.sandbox.dnsimple.com/v2";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

const PROVIDER: &str = "dnsimple";

/// DNSimple zone API client
///
/// Stateless per call and cheap to share across concurrent cycles: the
/// underlying `reqwest::Client` is internally reference-counted.
pub struct DnsimpleApi {
    /// API access token
    /// ⚠️ NEVER log this value
    token: String,

    /// Pre-configured account ID, returned by `whoami` without a request
    account_id: Option<String>,

    /// API base URL (production, sandbox or test server)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DnsimpleApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsimpleApi")
            .field("token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DnsimpleApi {
    /// Create a new DNSimple API client
    ///
    /// # Parameters
    ///
    /// - `token`: Account or user access token
    /// - `account_id`: Optional account ID (resolved via `whoami` when absent)
    /// - `sandbox`: Use the sandbox environment
    pub fn new(token: impl Into<String>, account_id: Option<String>, sandbox: bool) -> Result<Self> {
        let base_url = if sandbox {
            DNSIMPLE_SANDBOX_API_BASE
        } else {
            DNSIMPLE_API_BASE
        };
        Self::with_base_url(token, account_id, base_url)
    }

    /// Create a client against an arbitrary base URL
    pub fn with_base_url(
        token: impl Into<String>,
        account_id: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::config("DNSimple API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("distcheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token,
            account_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// API base URL in use
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn records_url(&self, account_id: &str, domain: &str) -> String {
        format!("{}/{}/zones/{}/records", self.base_url, account_id, domain)
    }

    fn record_url(&self, account_id: &str, domain: &str, record_id: &str) -> String {
        format!("{}/{}", self.records_url(account_id, domain), record_id)
    }

    fn distribution_url(&self, account_id: &str, domain: &str, record_id: &str) -> String {
        format!("{}/distribution", self.record_url(account_id, domain, record_id))
    }

    /// Send a request and return the JSON body of a successful response
    ///
    /// `context` names the operation in error messages.
    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<Value> {
        let response = request
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("{}: HTTP request failed: {}", context, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &body, context));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("{}: Failed to parse response: {}", context, e)))
    }
}

#[async_trait]
impl ZoneApi for DnsimpleApi {
    /// Resolve the account of the configured token
    ///
    /// ```http
    /// GET /whoami
    /// Authorization: Bearer <token>
    /// ```
    async fn whoami(&self) -> Result<AccountId> {
        if let Some(ref account_id) = self.account_id {
            tracing::debug!("Using pre-configured account ID");
            return Ok(account_id.clone());
        }

        let url = format!("{}/whoami", self.base_url);
        let json = self.send(self.client.get(&url), "Whoami").await?;
        let account_id = parse_account_id(&json)?;

        tracing::debug!(account_id = %account_id, "Resolved account ID");
        Ok(account_id)
    }

    /// Create a zone record
    ///
    /// ```http
    /// POST /:account/zones/:zone/records
    /// {"name": "_distribution_check_...", "type": "TXT", "content": "..."}
    /// ```
    async fn create_record(
        &self,
        account_id: &str,
        domain: &str,
        attributes: &RecordAttributes,
    ) -> Result<RecordId> {
        tracing::debug!(
            name = %attributes.name,
            record_type = %attributes.record_type,
            domain = %domain,
            "Creating DNSimple record"
        );

        let url = self.records_url(account_id, domain);
        let json = self
            .send(self.client.post(&url).json(attributes), "Create record")
            .await?;

        parse_record_id(&json)
    }

    /// Check whether a record is distributed to all name servers
    ///
    /// ```http
    /// GET /:account/zones/:zone/records/:record/distribution
    /// ```
    async fn check_distribution(
        &self,
        account_id: &str,
        domain: &str,
        record_id: &str,
    ) -> Result<bool> {
        let url = self.distribution_url(account_id, domain, record_id);
        let json = self
            .send(self.client.get(&url), "Check distribution")
            .await?;

        parse_distributed(&json)
    }

    /// Delete a zone record
    ///
    /// ```http
    /// DELETE /:account/zones/:zone/records/:record
    /// ```
    async fn delete_record(&self, account_id: &str, domain: &str, record_id: &str) -> Result<()> {
        tracing::debug!(record_id = %record_id, domain = %domain, "Deleting DNSimple record");

        let url = self.record_url(account_id, domain, record_id);
        self.send(self.client.delete(&url), "Delete record").await?;
        Ok(())
    }

    fn api_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, body: &str, context: &str) -> Error {
    let message = error_message(body);

    match status.as_u16() {
        400 | 422 => Error::invalid_input(format!("{}: {} ({})", context, message, status)),
        401 | 403 => Error::auth(format!(
            "{}: Invalid API token or insufficient permissions. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: {}", context, message)),
        429 => Error::rate_limited(format!(
            "{}: Rate limit exceeded. Please retry later. Status: {}",
            context, status
        )),
        500..=599 => Error::provider_transient(
            PROVIDER,
            format!("{}: DNSimple server error (transient): {} - {}", context, status, message),
        ),
        _ => Error::provider(PROVIDER, format!("{}: {} - {}", context, status, message)),
    }
}

/// Extract the `message` of a DNSimple error body, or the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Parse `data.account.id` from a whoami response
fn parse_account_id(json: &Value) -> Result<AccountId> {
    let account = &json["data"]["account"];
    if account.is_null() {
        return Err(Error::auth(
            "Token is not an account token; configure the account ID explicitly",
        ));
    }

    id_to_string(&account["id"])
        .ok_or_else(|| Error::provider(PROVIDER, "Invalid response format: account.id is missing"))
}

/// Parse `data.id` from a create record response
fn parse_record_id(json: &Value) -> Result<RecordId> {
    id_to_string(&json["data"]["id"])
        .ok_or_else(|| Error::provider(PROVIDER, "Invalid response format: record.id is missing"))
}

/// Parse `data.distributed` from a distribution response
fn parse_distributed(json: &Value) -> Result<bool> {
    json["data"]["distributed"].as_bool().ok_or_else(|| {
        Error::provider(PROVIDER, "Invalid response format: distributed is not a boolean")
    })
}

fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Factory for creating DNSimple zone APIs
pub struct DnsimpleFactory;

impl ZoneApiFactory for DnsimpleFactory {
    fn create(&self, config: &ApiConfig) -> Result<Box<dyn ZoneApi>> {
        match config {
            ApiConfig::Dnsimple {
                token,
                account_id,
                sandbox,
            } => {
                if token.is_empty() {
                    return Err(Error::config("DNSimple API token is required"));
                }

                if *sandbox {
                    tracing::warn!("DNSimple API running against the sandbox environment");
                }

                Ok(Box::new(DnsimpleApi::new(
                    token.clone(),
                    account_id.clone(),
                    *sandbox,
                )?))
            }
            _ => Err(Error::config("Invalid config for DNSimple API")),
        }
    }
}

/// Register the DNSimple API with a registry
///
/// # Example
///
/// ```rust
/// use distcheck_core::ApiRegistry;
///
/// let registry = ApiRegistry::new();
/// distcheck_dnsimple::register(&registry);
/// assert!(registry.has_api("dnsimple"));
/// ```
pub fn register(registry: &distcheck_core::ApiRegistry) {
    registry.register_api(PROVIDER, Box::new(DnsimpleFactory));
}
