//! Plugin-based zone API registry
//!
//! The registry maps API type names to factories, so the daemon can build
//! whichever zone API the configuration names without hard-coded branches.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use distcheck_core::registry::ApiRegistry;
//! use distcheck_core::config::ApiConfig;
//!
//! let registry = ApiRegistry::new();
//! distcheck_dnsimple::register(&registry);
//!
//! let config = ApiConfig::Dnsimple { token, account_id: None, sandbox: false };
//! let api = registry.create_api(&config)?;
//! ```

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::traits::{ZoneApi, ZoneApiFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of zone API factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ApiRegistry {
    apis: RwLock<HashMap<String, Box<dyn ZoneApiFactory>>>,
}

impl ApiRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone API factory
    ///
    /// # Parameters
    ///
    /// - `name`: API type name (e.g., "dnsimple")
    /// - `factory`: Factory object for creating API instances
    ///
    /// Registering a name twice replaces the earlier factory.
    pub fn register_api(&self, name: impl Into<String>, factory: Box<dyn ZoneApiFactory>) {
        let mut apis = self.apis.write().unwrap_or_else(PoisonError::into_inner);
        apis.insert(name.into(), factory);
    }

    /// Create a zone API from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ZoneApi>)`: Created API instance
    /// - `Err(Error)`: If the API type is not registered or creation fails
    pub fn create_api(&self, config: &ApiConfig) -> Result<Box<dyn ZoneApi>> {
        let api_type = config.type_name();
        let apis = self.apis.read().unwrap_or_else(PoisonError::into_inner);

        let factory = apis
            .get(api_type)
            .ok_or_else(|| Error::config(format!("Unknown zone API type: {}", api_type)))?;

        factory.create(config)
    }

    /// List all registered API types
    pub fn list_apis(&self) -> Vec<String> {
        let apis = self.apis.read().unwrap_or_else(PoisonError::into_inner);
        apis.keys().cloned().collect()
    }

    /// Check if an API type is registered
    pub fn has_api(&self, name: &str) -> bool {
        let apis = self.apis.read().unwrap_or_else(PoisonError::into_inner);
        apis.contains_key(name)
    }
}
