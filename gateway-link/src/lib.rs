//! Gateway link library
//!
//! Lets a blocking microservice call its remote endpoints through a single
//! async reactor thread, and keeps the service registered with the API
//! gateway by a periodic heartbeat.

pub mod bridge;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod link;
pub mod registration;
pub mod result;
pub mod swagger;
pub mod transport;

pub use bridge::{BridgeError, BridgeFailure, CallBridge, Dispatcher};
pub use client::{RemoteEndpoints, ServiceClient};
pub use config::LinkConfig;
pub use endpoint::{EndpointBase, EndpointRegistry};
pub use link::{LinkError, ServiceLink};
pub use registration::{
    Heartbeat, HeartbeatHandle, HeartbeatState, HeartbeatStats, PingOutcome, RoutePublisher,
    RoutePublishing, RouteRecord, ServiceLocation,
};
pub use result::{CallResult, ResponseBody};
pub use swagger::ApiSpec;
pub use transport::{TransportClient, UploadFile};
