//! Gateway self-registration
//!
//! The heartbeat pings the gateway with this service's registration key and
//! runs the route publisher whenever the gateway reports the service unknown.

mod heartbeat;
mod publisher;
mod route;

pub use heartbeat::{Heartbeat, HeartbeatHandle, HeartbeatState, HeartbeatStats, PingOutcome};
pub use publisher::{RoutePublisher, RoutePublishing};
pub use route::{EnvLocation, LocationSource, RouteRecord, ServiceLocation};

/// Gateway endpoint that accepts route records
pub const REGISTER_ENDPOINT: &str = "/api/1.0.0/register";

/// Gateway ping endpoint for a registration key
pub fn ping_endpoint(key: &str) -> String {
    format!("/api/1.0.0/ping/{}/None", key)
}
