//! Blocking client used by request-handling code
//!
//! Each method runs one transport call on the reactor through the call bridge
//! and blocks the calling thread until it resolves or the deadline passes.
//! Nothing here panics or propagates a fault from the reactor; every failure
//! comes back as a `CallError`.

use std::sync::Arc;
use std::time::Duration;

use error::CallError;
use serde_json::Value;

use crate::bridge::CallBridge;
use crate::result::CallResult;
use crate::transport::{TransportClient, UploadFile};

/// Calls a dependent service can make to its remote endpoints
pub trait RemoteEndpoints: Send + Sync {
    /// GET an endpoint and return its decoded JSON
    fn access_endpoint(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, CallError>;

    /// POST a JSON payload. Any answer from the remote side, including a
    /// non-2xx one, comes back as `(status, body)`.
    fn post_route(&self, endpoint: &str, payload: Value) -> Result<(u16, Value), CallError>;

    /// Upload a file to `<endpoint>/<id>`. `Ok(())` on a 2xx answer.
    fn post_upload(&self, endpoint: &str, id: &str, file: UploadFile) -> Result<(), CallError>;
}

/// `RemoteEndpoints` over the call bridge and transport client
#[derive(Clone)]
pub struct ServiceClient {
    bridge: Arc<CallBridge>,
    transport: TransportClient,
    timeout: Duration,
}

impl ServiceClient {
    pub fn new(bridge: Arc<CallBridge>, transport: TransportClient) -> Self {
        let timeout = bridge.default_timeout();
        Self {
            bridge,
            transport,
            timeout,
        }
    }

    /// Same client with a different blocking deadline
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &TransportClient {
        &self.transport
    }

    /// Blocking GET returning the raw call outcome
    pub fn get(&self, endpoint: &str, params: &[(String, String)]) -> CallResult {
        let transport = self.transport.clone();
        let endpoint = endpoint.to_string();
        let params = params.to_vec();
        self.bridge.call_blocking_with_timeout(
            async move { transport.get(&endpoint, &params).await },
            self.timeout,
        )
    }

    /// Blocking JSON POST returning the raw call outcome
    pub fn post(&self, endpoint: &str, payload: Value) -> CallResult {
        let transport = self.transport.clone();
        let endpoint = endpoint.to_string();
        self.bridge.call_blocking_with_timeout(
            async move { transport.post(&endpoint, &payload).await },
            self.timeout,
        )
    }

    /// Blocking multipart upload returning the raw call outcome
    pub fn upload(&self, endpoint: &str, id: &str, file: UploadFile) -> CallResult {
        let transport = self.transport.clone();
        let endpoint = endpoint.to_string();
        let id = id.to_string();
        self.bridge.call_blocking_with_timeout(
            async move { transport.post_upload(&endpoint, &id, file).await },
            self.timeout,
        )
    }
}

impl RemoteEndpoints for ServiceClient {
    fn access_endpoint(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, CallError> {
        self.get(endpoint, params).into_result().map(|(_, body)| body)
    }

    fn post_route(&self, endpoint: &str, payload: Value) -> Result<(u16, Value), CallError> {
        match self.post(endpoint, payload) {
            CallResult::HttpError { status, body } => Ok((status, body.into_value())),
            other => other.into_result(),
        }
    }

    fn post_upload(&self, endpoint: &str, id: &str, file: UploadFile) -> Result<(), CallError> {
        self.upload(endpoint, id, file).into_result().map(|_| ())
    }
}
