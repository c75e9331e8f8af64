//! Service link
//!
//! Wires configuration, endpoint registry, call bridge, transport, blocking
//! client and the registration heartbeat into one running link.

use std::sync::Arc;

use error::ConfigError;
use thiserror::Error;

use crate::bridge::{BridgeError, CallBridge};
use crate::client::ServiceClient;
use crate::config::LinkConfig;
use crate::endpoint::{EndpointBase, EndpointRegistry};
use crate::registration::{
    ping_endpoint, EnvLocation, Heartbeat, HeartbeatHandle, HeartbeatStats, LocationSource,
    PingOutcome, RoutePublisher, ServiceLocation,
};
use crate::swagger::ApiSpec;
use crate::transport::TransportClient;

/// Errors raised while starting a link
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Heartbeat could not be started")]
    Heartbeat,
}

/// A running gateway link
pub struct ServiceLink {
    config: LinkConfig,
    registry: Arc<EndpointRegistry>,
    bridge: Arc<CallBridge>,
    client: ServiceClient,
    publisher: Arc<RoutePublisher>,
    heartbeat: Option<HeartbeatHandle>,
}

impl ServiceLink {
    /// Start a link that advertises the location found in `FLASK_*` at each pass
    pub fn start(config: LinkConfig, spec: ApiSpec) -> Result<Self, LinkError> {
        let fallback = ServiceLocation::new(
            config.service_protocol.clone(),
            config.service_host.clone(),
            config.service_port,
        );
        Self::start_with_location(config, spec, Arc::new(EnvLocation::new(fallback)))
    }

    /// Start a link with an explicit location source
    pub fn start_with_location(
        config: LinkConfig,
        spec: ApiSpec,
        location: Arc<dyn LocationSource>,
    ) -> Result<Self, LinkError> {
        tracing::info!("Starting gateway link v{} for \"{}\"", config.version, config.registration_key());

        let gateway = config.gateway_base();
        match &gateway {
            Ok(base) => tracing::info!("API gateway at {}", base),
            Err(e) => tracing::warn!("No API gateway configured: {}", e),
        }

        let registry = Arc::new(EndpointRegistry::with_default(gateway));
        for (prefix, url) in &config.endpoint_overrides {
            registry.override_endpoint(prefix.clone(), EndpointBase::parse(url)?);
        }

        let bridge = Arc::new(CallBridge::start(config.call_timeout())?);
        let transport = TransportClient::new(registry.clone(), config.call_timeout())
            .with_credentials(config.credentials());
        let client = ServiceClient::new(bridge.clone(), transport.clone());

        let publisher = Arc::new(RoutePublisher::new(
            spec,
            &config,
            location,
            transport.clone(),
            bridge.dispatcher(),
        ));

        let heartbeat = if config.enable_registration {
            let heartbeat = Arc::new(Heartbeat::new(
                config.registration_key(),
                config.heartbeat_interval(),
                transport,
                publisher.clone(),
            ));
            Some(heartbeat.start(&bridge.dispatcher()).map_err(|_| LinkError::Heartbeat)?)
        } else {
            tracing::info!("Service registration is disabled");
            None
        };

        Ok(Self {
            config,
            registry,
            bridge,
            client,
            publisher,
            heartbeat,
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Arc<CallBridge> {
        &self.bridge
    }

    /// Blocking client for request-handling code
    pub fn client(&self) -> ServiceClient {
        self.client.clone()
    }

    pub fn publisher(&self) -> &Arc<RoutePublisher> {
        &self.publisher
    }

    /// Heartbeat counters, when registration is enabled
    pub fn heartbeat_stats(&self) -> Option<HeartbeatStats> {
        self.heartbeat.as_ref().map(|handle| handle.stats())
    }

    /// Ping the gateway once and wait for the outcome. Does not publish.
    pub fn ping_once(&self) -> PingOutcome {
        let transport = self.client.transport().clone();
        let endpoint = ping_endpoint(&self.config.registration_key());

        self.bridge
            .run_blocking(
                async move { PingOutcome::from_status(transport.ping_status(&endpoint).await) },
                self.config.call_timeout(),
            )
            .unwrap_or_else(|failure| PingOutcome::Failed(format!("{:?}", failure)))
    }

    /// Stop the heartbeat and the reactor
    pub fn shutdown(&self) {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.stop();
        }
        self.bridge.shutdown();
        tracing::info!("Gateway link stopped");
    }
}
