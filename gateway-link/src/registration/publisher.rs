//! Route publisher
//!
//! Announces every route this service exposes to the gateway. Each pass is
//! stateless: records are rebuilt from the current location and each one is
//! posted independently on the reactor.

use std::sync::Arc;

use crate::bridge::Dispatcher;
use crate::config::LinkConfig;
use crate::result::CallResult;
use crate::swagger::ApiSpec;
use crate::transport::TransportClient;

use super::route::{LocationSource, RouteRecord, ServiceLocation};
use super::REGISTER_ENDPOINT;

/// Static UI asset paths, in the order they are announced
const UI_ASSET_PATHS: [&str; 4] = ["/ui/css", "/ui/lib", "/ui/images", "/swagger.json"];

/// Anything that can run a publish pass
pub trait RoutePublishing: Send + Sync {
    /// Kick off a publish pass.
    ///
    /// `true` means every record was built and handed to the reactor, not that
    /// the gateway accepted them.
    fn publish_routes(&self) -> bool;
}

/// Builds route records from the API spec and posts them to the gateway
pub struct RoutePublisher {
    spec: ApiSpec,
    swagger_ui: String,
    key: String,
    name: String,
    remote_ms: Option<String>,
    location: Arc<dyn LocationSource>,
    transport: TransportClient,
    dispatcher: Dispatcher,
}

impl RoutePublisher {
    pub fn new(
        spec: ApiSpec,
        config: &LinkConfig,
        location: Arc<dyn LocationSource>,
        transport: TransportClient,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            spec,
            swagger_ui: config.swagger_ui.clone(),
            key: config.registration_key(),
            name: config.name.clone(),
            remote_ms: config.remote_ms.clone(),
            location,
            transport,
            dispatcher,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Declared API paths collapsed to their static prefix
    pub fn api_paths(&self) -> Vec<String> {
        self.spec.paths.iter().map(|path| static_prefix(path)).collect()
    }

    /// Fixed UI asset paths, ending with the UI root
    pub fn ui_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = UI_ASSET_PATHS.iter().map(|p| p.to_string()).collect();
        paths.push(self.ui_root());
        paths
    }

    /// API paths followed by the UI asset paths
    pub fn enumerate_paths(&self) -> Vec<String> {
        let mut paths = self.api_paths();
        paths.extend(self.ui_paths());
        paths
    }

    /// Route records for one publish pass, built from the current location
    pub fn route_records(&self) -> Vec<RouteRecord> {
        let local = self.location.current();
        let api_location = match &self.remote_ms {
            Some(remote) => ServiceLocation::new("https", remote.clone(), 443),
            None => local.clone(),
        };

        let mut records: Vec<RouteRecord> = self
            .api_paths()
            .into_iter()
            .map(|path| {
                RouteRecord::api(&api_location, format!("{}{}", self.spec.base_path, path), &self.key)
            })
            .collect();

        let asset_base = self.spec.base_path.strip_suffix('/').unwrap_or(&self.spec.base_path);
        let ui_root = self.ui_root();
        for path in self.ui_paths() {
            records.push(RouteRecord::asset(
                &local,
                format!("{}{}", asset_base, path),
                &self.key,
                path == ui_root,
                &self.name,
            ));
        }

        records
    }

    fn ui_root(&self) -> String {
        format!("/{}/", self.swagger_ui)
    }

    fn dispatch_record(&self, record: RouteRecord) -> Result<(), String> {
        let details = record
            .to_details()
            .map_err(|e| format!("unable to encode route \"{}\": {}", record.uri, e))?;

        let transport = self.transport.clone();
        let uri = record.uri;
        let queued = self.dispatcher.dispatch(async move {
            match transport.post_form(REGISTER_ENDPOINT, &[("details", details)]).await {
                CallResult::Success { status: 200, .. } => {}
                CallResult::Success { status, body } => {
                    tracing::error!("{} {}", status, body);
                }
                CallResult::HttpError { status, body } => {
                    tracing::error!("{} {}", status, body.into_value());
                }
                CallResult::TransportError(message) => {
                    tracing::error!("Unable to register \"{}\": {}", uri, message);
                }
                CallResult::Timeout => {
                    tracing::error!("Registration of \"{}\" timed out", uri);
                }
            }
        });

        if queued {
            Ok(())
        } else {
            Err("reactor is not running".to_string())
        }
    }
}

impl RoutePublishing for RoutePublisher {
    fn publish_routes(&self) -> bool {
        if let Err(e) = self.transport.registry().resolve(REGISTER_ENDPOINT) {
            tracing::error!("error registering routes \"{}\"", e);
            return false;
        }

        let records = self.route_records();
        tracing::info!("Publishing {} routes for \"{}\"", records.len(), self.key);

        for record in records {
            if let Err(e) = self.dispatch_record(record) {
                tracing::error!("error registering routes \"{}\"", e);
                return false;
            }
        }
        true
    }
}

/// Strip a path template at its first `{`, then drop trailing slashes
fn static_prefix(path: &str) -> String {
    let head = path.split('{').next().unwrap_or(path);
    head.trim_end_matches('/').to_string()
}
