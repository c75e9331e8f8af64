//! Endpoint registry
//!
//! Maps logical endpoint names to the base URL they are called on. Bases are
//! resolved lazily to the API gateway unless an override prefix matches, and
//! are cached for the life of the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use error::ConfigError;
use serde::{Deserialize, Serialize};
use url::Url;

/// Resolved `protocol://host:port` of a remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointBase {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl EndpointBase {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse a base from a URL such as `https://ci.example:443`.
    ///
    /// A missing port falls back to the scheme's default.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::Invalid {
            key: "endpoint base".to_string(),
            value: raw.to_string(),
        };

        let url = Url::parse(raw).map_err(|_| invalid())?;
        let host = url.host_str().ok_or_else(invalid)?.to_string();
        let port = url.port_or_known_default().ok_or_else(invalid)?;

        Ok(Self::new(url.scheme(), host, port))
    }

    /// Full URL of `endpoint` on this base
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}{}", self, endpoint)
    }
}

impl fmt::Display for EndpointBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Process-lifetime cache of endpoint bases.
///
/// Writes only happen on the resolution path and through `override_endpoint`;
/// a cached entry is never replaced.
#[derive(Debug)]
pub struct EndpointRegistry {
    gateway: Result<EndpointBase, ConfigError>,
    bases: RwLock<HashMap<String, EndpointBase>>,
    overrides: RwLock<Vec<(String, EndpointBase)>>,
}

impl EndpointRegistry {
    /// Create a registry whose default base is the given gateway
    pub fn new(gateway: EndpointBase) -> Self {
        Self::with_default(Ok(gateway))
    }

    /// Create a registry whose default base may be unresolvable.
    ///
    /// Resolution of an endpoint that needs the gateway then fails with the
    /// stored configuration error.
    pub fn with_default(gateway: Result<EndpointBase, ConfigError>) -> Self {
        Self {
            gateway,
            bases: RwLock::new(HashMap::new()),
            overrides: RwLock::new(Vec::new()),
        }
    }

    /// The default gateway base
    pub fn gateway(&self) -> Result<EndpointBase, ConfigError> {
        self.gateway.clone()
    }

    /// Resolve the base for an endpoint, caching on first use
    pub fn resolve(&self, endpoint: &str) -> Result<EndpointBase, ConfigError> {
        if let Some(base) = self.read_bases().get(endpoint) {
            return Ok(base.clone());
        }

        let base = match self.matching_override(endpoint) {
            Some(base) => base,
            None => self.gateway.clone()?,
        };

        let mut bases = self.bases.write().unwrap_or_else(|e| e.into_inner());
        let base = bases
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                tracing::info!("Setting base for \"{}\" to \"{}\"", endpoint, base);
                base
            })
            .clone();

        Ok(base)
    }

    /// Bind every endpoint starting with `prefix` to `base`.
    ///
    /// Endpoints already resolved keep their cached base.
    pub fn override_endpoint(&self, prefix: impl Into<String>, base: EndpointBase) {
        let prefix = prefix.into();
        tracing::info!("Overriding base for \"{}\" with \"{}\"", prefix, base);

        let mut overrides = self.overrides.write().unwrap_or_else(|e| e.into_inner());
        overrides.retain(|(p, _)| *p != prefix);
        overrides.push((prefix, base));
    }

    /// Number of cached endpoint bases
    pub fn resolved_count(&self) -> usize {
        self.read_bases().len()
    }

    fn matching_override(&self, endpoint: &str) -> Option<EndpointBase> {
        let overrides = self.overrides.read().unwrap_or_else(|e| e.into_inner());
        overrides
            .iter()
            .filter(|(prefix, _)| endpoint.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, base)| base.clone())
    }

    fn read_bases(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, EndpointBase>> {
        self.bases.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> EndpointBase {
        EndpointBase::new("http", "gateway.local", 8080)
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let registry = EndpointRegistry::new(gateway());

        let first = registry.resolve("/categories").unwrap();
        let second = registry.resolve("/categories").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.to_string(), "http://gateway.local:8080");
        assert_eq!(registry.resolved_count(), 1);
    }

    #[test]
    fn test_each_distinct_path_is_cached() {
        let registry = EndpointRegistry::new(gateway());

        registry.resolve("/cases/1/events").unwrap();
        registry.resolve("/cases/2/events").unwrap();
        registry.resolve("/cases/1/events").unwrap();

        assert_eq!(registry.resolved_count(), 2);
    }

    #[test]
    fn test_override_prefix_wins_over_gateway() {
        let registry = EndpointRegistry::new(gateway());
        registry.override_endpoint(
            "/collection-instrument-api",
            EndpointBase::parse("https://ci.example").unwrap(),
        );

        let base = registry
            .resolve("/collection-instrument-api/1.0.2/collectioninstrument/id/42")
            .unwrap();
        assert_eq!(base, EndpointBase::new("https", "ci.example", 443));

        let other = registry.resolve("/cases/1/events").unwrap();
        assert_eq!(other, gateway());
    }

    #[test]
    fn test_longest_override_prefix_is_used() {
        let registry = EndpointRegistry::new(gateway());
        registry.override_endpoint("/api", EndpointBase::new("http", "short", 1));
        registry.override_endpoint("/api/1.0.0/surveys", EndpointBase::new("http", "long", 2));

        let base = registry.resolve("/api/1.0.0/surveys/todo/7").unwrap();
        assert_eq!(base.host, "long");
    }

    #[test]
    fn test_cached_base_is_never_replaced() {
        let registry = EndpointRegistry::new(gateway());
        let before = registry.resolve("/cases/1").unwrap();

        registry.override_endpoint("/cases", EndpointBase::new("http", "direct", 9000));

        assert_eq!(registry.resolve("/cases/1").unwrap(), before);
        assert_eq!(registry.resolve("/cases/2").unwrap().host, "direct");
    }

    #[test]
    fn test_missing_gateway_is_configuration_error() {
        let registry =
            EndpointRegistry::with_default(Err(ConfigError::Missing("API_HOST".to_string())));

        assert_eq!(
            registry.resolve("/categories"),
            Err(ConfigError::Missing("API_HOST".to_string()))
        );
        assert_eq!(registry.resolved_count(), 0);
    }

    #[test]
    fn test_parse_base() {
        let base = EndpointBase::parse("http://localhost:8171").unwrap();
        assert_eq!(base, EndpointBase::new("http", "localhost", 8171));
        assert_eq!(base.url_for("/categories"), "http://localhost:8171/categories");

        assert!(EndpointBase::parse("not a url").is_err());
    }
}
