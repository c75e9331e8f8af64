//! Transport client
//!
//! Async HTTP calls against logical endpoints. Every call resolves its base
//! through the endpoint registry and comes back as a `CallResult`; nothing in
//! here returns an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::endpoint::EndpointRegistry;
use crate::result::{CallResult, ResponseBody};

/// File content for a multipart upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: None,
        }
    }

    /// Set the MIME type of the file part
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// HTTP client bound to an endpoint registry
#[derive(Clone)]
pub struct TransportClient {
    client: Client,
    registry: Arc<EndpointRegistry>,
    credentials: Option<(String, String)>,
    request_timeout: Duration,
}

impl TransportClient {
    /// Create a new TransportClient
    pub fn new(registry: Arc<EndpointRegistry>, request_timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            registry,
            credentials: None,
            request_timeout,
        }
    }

    /// Attach basic auth credentials to every call
    pub fn with_credentials(mut self, credentials: Option<(String, String)>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn registry(&self) -> &Arc<EndpointRegistry> {
        &self.registry
    }

    /// GET an endpoint and decode the JSON response
    pub async fn get(&self, endpoint: &str, params: &[(String, String)]) -> CallResult {
        let url = match self.url_for(endpoint) {
            Ok(url) => url,
            Err(failure) => return failure,
        };
        tracing::info!("GET {}", url);

        let request = self.client.get(&url).query(params);
        self.execute(&url, request).await
    }

    /// POST a JSON payload to an endpoint
    pub async fn post(&self, endpoint: &str, payload: &Value) -> CallResult {
        let url = match self.url_for(endpoint) {
            Ok(url) => url,
            Err(failure) => return failure,
        };
        tracing::info!("POST {}", url);

        let request = self.client.post(&url).json(payload);
        self.execute(&url, request).await
    }

    /// POST url-encoded form fields to an endpoint
    pub async fn post_form(&self, endpoint: &str, fields: &[(&str, String)]) -> CallResult {
        let url = match self.url_for(endpoint) {
            Ok(url) => url,
            Err(failure) => return failure,
        };
        tracing::info!("POST {}", url);

        let request = self.client.post(&url).form(fields);
        self.execute(&url, request).await
    }

    /// Upload a file as multipart form data to `<endpoint>/<id>`
    pub async fn post_upload(&self, endpoint: &str, id: &str, file: UploadFile) -> CallResult {
        let url = match self.url_for(endpoint) {
            Ok(base_url) => format!("{}/{}", base_url, id),
            Err(failure) => return failure,
        };
        tracing::info!("Posting to {}", url);

        let mut part = Part::bytes(file.content).file_name(file.filename.clone());
        if let Some(content_type) = &file.content_type {
            part = match part.mime_str(content_type) {
                Ok(part) => part,
                Err(e) => {
                    tracing::error!("Invalid content type \"{}\" for upload: {}", content_type, e);
                    return CallResult::TransportError(format!(
                        "invalid content type \"{}\": {}",
                        content_type, e
                    ));
                }
            };
        }

        let form = Form::new()
            .text("name", file.filename.clone())
            .text("filename", file.filename)
            .part("file", part);

        let request = self.client.post(&url).multipart(form);
        self.execute(&url, request).await
    }

    /// GET an endpoint and report only the status code
    pub async fn ping_status(&self, endpoint: &str) -> Result<u16, String> {
        let url = match self.url_for(endpoint) {
            Ok(url) => url,
            Err(CallResult::TransportError(message)) => return Err(message),
            Err(_) => return Err(format!("unable to resolve \"{}\"", endpoint)),
        };
        tracing::info!("GET {}", url);

        self.authorize(self.client.get(&url))
            .send()
            .await
            .map(|response| response.status().as_u16())
            .map_err(|e| e.to_string())
    }

    fn url_for(&self, endpoint: &str) -> Result<String, CallResult> {
        self.registry
            .resolve(endpoint)
            .map(|base| base.url_for(endpoint))
            .map_err(|e| {
                tracing::error!("Unable to resolve base for \"{}\": {}", endpoint, e);
                CallResult::TransportError(format!("configuration error: {}", e))
            })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.timeout(self.request_timeout);
        match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }

    async fn execute(&self, url: &str, request: RequestBuilder) -> CallResult {
        let response = match self.authorize(request).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Call to \"{}\" failed: {}", url, e);
                return CallResult::TransportError(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Unable to read response from \"{}\": {}", url, e);
                return CallResult::TransportError(e.to_string());
            }
        };

        if !(200..=299).contains(&status) {
            tracing::error!("Call to \"{}\" yielded error code \"{}\"", url, status);
            return CallResult::HttpError {
                status,
                body: ResponseBody::from_text(text),
            };
        }

        decode_success(url, status, &text)
    }
}

fn decode_success(url: &str, status: u16, text: &str) -> CallResult {
    if text.trim().is_empty() {
        return CallResult::Success { status, body: Value::Null };
    }

    match serde_json::from_str(text) {
        Ok(body) => CallResult::Success { status, body },
        Err(e) => {
            tracing::error!("Unable to decode response from \"{}\": {}", url, e);
            CallResult::TransportError(format!("invalid JSON in response: {}", e))
        }
    }
}
