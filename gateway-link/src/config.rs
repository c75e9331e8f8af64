use std::path::PathBuf;
use std::time::Duration;

use error::ConfigError;
use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointBase;

/// Gateway link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// API gateway protocol
    pub api_protocol: String,

    /// API gateway host (required for any gateway call)
    pub api_host: Option<String>,

    /// API gateway port
    pub api_port: u16,

    /// Protocol this service advertises to the gateway
    pub service_protocol: String,

    /// Host this service advertises to the gateway
    pub service_host: String,

    /// Port this service advertises to the gateway
    pub service_port: u16,

    /// Configured registration identity
    pub ident: Option<String>,

    /// Friendly name attached to UI routes
    pub name: String,

    /// Path to the JSON API spec
    pub swagger_path: PathBuf,

    /// Mount point of the API UI
    pub swagger_ui: String,

    /// Public host fronting the API routes, if any
    pub remote_ms: Option<String>,

    /// Basic auth user for outbound calls
    pub security_user_name: Option<String>,

    /// Basic auth password for outbound calls
    pub security_user_password: Option<String>,

    /// Run the registration heartbeat
    pub enable_registration: bool,

    /// Seconds between gateway pings
    pub heartbeat_interval_secs: u64,

    /// Default blocking call deadline in seconds
    pub call_timeout_secs: u64,

    /// Endpoint prefixes bound directly to a base URL
    pub endpoint_overrides: Vec<(String, String)>,

    /// Service version
    pub version: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            api_protocol: "http".to_string(),
            api_host: None,
            api_port: 80,
            service_protocol: "http".to_string(),
            service_host: "localhost".to_string(),
            service_port: 8080,
            ident: None,
            name: "no local name".to_string(),
            swagger_path: PathBuf::from("swagger_server/swagger/swagger.json"),
            swagger_ui: "ui".to_string(),
            remote_ms: None,
            security_user_name: None,
            security_user_password: None,
            enable_registration: true,
            heartbeat_interval_secs: 5,
            call_timeout_secs: 3,
            endpoint_overrides: Vec::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl LinkConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(protocol) = get("API_PROTOCOL") {
            config.api_protocol = protocol;
        }
        config.api_host = get("API_HOST");
        if let Some(port) = get("API_PORT") {
            config.api_port = parse_number("API_PORT", &port)?;
        }

        if let Some(protocol) = get("FLASK_PROTOCOL") {
            config.service_protocol = protocol;
        }
        if let Some(host) = get("FLASK_HOST") {
            config.service_host = host;
        }
        if let Some(port) = get("FLASK_PORT") {
            config.service_port = parse_number("FLASK_PORT", &port)?;
        }

        config.ident = get("MY_IDENT");
        if let Some(name) = get("MY_NAME") {
            config.name = name;
        }
        if let Some(path) = get("SWAGGER") {
            config.swagger_path = PathBuf::from(path);
        }
        if let Some(ui) = get("SWAGGER_UI") {
            config.swagger_ui = ui;
        }
        config.remote_ms = get("REMOTE_MS");
        config.security_user_name = get("SECURITY_USER_NAME");
        config.security_user_password = get("SECURITY_USER_PASSWORD");

        if let Some(enabled) = get("ENABLE_REGISTRATION") {
            config.enable_registration = parse_flag(&enabled);
        }
        if let Some(secs) = get("HEARTBEAT_INTERVAL_SECS") {
            config.heartbeat_interval_secs = parse_number("HEARTBEAT_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = get("CALL_TIMEOUT_SECS") {
            config.call_timeout_secs = parse_number("CALL_TIMEOUT_SECS", &secs)?;
        }
        if let Some(overrides) = get("ENDPOINT_OVERRIDES") {
            config.endpoint_overrides = parse_overrides(&overrides)?;
        }

        Ok(config)
    }

    /// Point the link at a gateway
    pub fn with_gateway(mut self, protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        self.api_protocol = protocol.into();
        self.api_host = Some(host.into());
        self.api_port = port;
        self
    }

    /// Set the location this service advertises
    pub fn with_service(mut self, protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        self.service_protocol = protocol.into();
        self.service_host = host.into();
        self.service_port = port;
        self
    }

    /// Set the registration identity
    pub fn with_ident(mut self, ident: impl Into<String>) -> Self {
        self.ident = Some(ident.into());
        self
    }

    /// Set basic auth credentials for outbound calls
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.security_user_name = Some(user.into());
        self.security_user_password = Some(password.into());
        self
    }

    /// Set the heartbeat interval
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_secs = interval.as_secs().max(1);
        self
    }

    /// Set the default blocking call deadline
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Bind an endpoint prefix directly to a base URL
    pub fn with_endpoint_override(mut self, prefix: impl Into<String>, url: impl Into<String>) -> Self {
        self.endpoint_overrides.push((prefix.into(), url.into()));
        self
    }

    /// Base of the API gateway
    pub fn gateway_base(&self) -> Result<EndpointBase, ConfigError> {
        let host = self
            .api_host
            .clone()
            .ok_or_else(|| ConfigError::Missing("API_HOST".to_string()))?;
        Ok(EndpointBase::new(self.api_protocol.clone(), host, self.api_port))
    }

    /// Identity used as the gateway registration key
    pub fn registration_key(&self) -> String {
        self.ident
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.service_host, self.service_port))
    }

    /// Basic auth pair, when both halves are configured
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.security_user_name, &self.security_user_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            (Some(user), None) => Some((user.clone(), String::new())),
            _ => None,
        }
    }

    /// Get heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Get call timeout as Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "yes" | "true")
}

fn parse_overrides(value: &str) -> Result<Vec<(String, String)>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((prefix, url)) if !prefix.trim().is_empty() && !url.trim().is_empty() => {
                Ok((prefix.trim().to_string(), url.trim().to_string()))
            }
            _ => Err(ConfigError::Invalid {
                key: "ENDPOINT_OVERRIDES".to_string(),
                value: pair.to_string(),
            }),
        })
        .collect()
}
