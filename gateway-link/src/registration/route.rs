use serde::{Deserialize, Serialize};

/// Where this service can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLocation {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl ServiceLocation {
    pub fn new(protocol: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
        }
    }
}

/// Source of the location advertised in route records.
///
/// Asked once per publish pass, so an implementation may return a different
/// location each time the platform reassigns host or port.
pub trait LocationSource: Send + Sync {
    fn current(&self) -> ServiceLocation;
}

impl LocationSource for ServiceLocation {
    fn current(&self) -> ServiceLocation {
        self.clone()
    }
}

/// Reads `FLASK_PROTOCOL`, `FLASK_HOST` and `FLASK_PORT` on every pass,
/// falling back to the location the process started with.
#[derive(Debug, Clone)]
pub struct EnvLocation {
    fallback: ServiceLocation,
}

impl EnvLocation {
    pub fn new(fallback: ServiceLocation) -> Self {
        Self { fallback }
    }
}

impl LocationSource for EnvLocation {
    fn current(&self) -> ServiceLocation {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        let port = match var("FLASK_PORT").map(|p| p.trim().parse::<u16>()) {
            Some(Ok(port)) => port,
            Some(Err(_)) => {
                tracing::warn!("Ignoring invalid FLASK_PORT, keeping {}", self.fallback.port);
                self.fallback.port
            }
            None => self.fallback.port,
        };

        ServiceLocation {
            protocol: var("FLASK_PROTOCOL").unwrap_or_else(|| self.fallback.protocol.clone()),
            host: var("FLASK_HOST").unwrap_or_else(|| self.fallback.host.clone()),
            port,
        }
    }
}

/// One route announced to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub uri: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ui: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
}

impl RouteRecord {
    /// Record for an API path
    pub fn api(location: &ServiceLocation, uri: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            protocol: location.protocol.clone(),
            host: location.host.clone(),
            port: location.port,
            uri: uri.into(),
            key: key.into(),
            ui: None,
            name: None,
        }
    }

    /// Record for a UI asset path
    pub fn asset(
        location: &ServiceLocation,
        uri: impl Into<String>,
        key: impl Into<String>,
        ui: bool,
        name: impl Into<String>,
    ) -> Self {
        Self {
            ui: Some(ui),
            name: Some(name.into()),
            ..Self::api(location, uri, key)
        }
    }

    /// JSON text sent as the `details` form field
    pub fn to_details(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_record_omits_ui_fields() {
        let location = ServiceLocation::new("http", "10.0.0.4", 8080);
        let record = RouteRecord::api(&location, "/api/1.0.0/cases", "case-service");

        let value: serde_json::Value = serde_json::from_str(&record.to_details().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "protocol": "http",
                "host": "10.0.0.4",
                "port": 8080,
                "uri": "/api/1.0.0/cases",
                "key": "case-service"
            })
        );
    }

    #[test]
    fn test_asset_record_carries_ui_and_name() {
        let location = ServiceLocation::new("http", "localhost", 8080);
        let record = RouteRecord::asset(&location, "/api/1.0.0/ui/", "k", true, "cases");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["ui"], json!(true));
        assert_eq!(value["name"], json!("cases"));
    }

    #[test]
    fn test_static_location_source() {
        let location = ServiceLocation::new("https", "svc", 443);
        assert_eq!(location.current(), location);
    }
}
