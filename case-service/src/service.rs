//! Case service
//!
//! Validates and posts case events, and looks up cases and the surveys a party
//! still has to complete.

use std::sync::Arc;

use error::{AppError, CallError, ErrorResponse};
use gateway_link::RemoteEndpoints;
use serde_json::Value;
use thiserror::Error;

use crate::cache::CategoryCache;
use crate::models::EventRequest;

/// Service errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    #[error("insufficient arguments")]
    InsufficientArguments,

    #[error("error loading categories")]
    CategoriesUnavailable,

    #[error("invalid category code - {0}")]
    InvalidCategory(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Remote(#[from] CallError),
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::InsufficientArguments => 500,
            ServiceError::CategoriesUnavailable
            | ServiceError::InvalidCategory(_)
            | ServiceError::NotFound(_) => 404,
            ServiceError::Remote(e) => ErrorResponse::from(e).code,
        }
    }

    /// `{"code": .., "text": ..}` body for the caller
    pub fn to_response(&self) -> ErrorResponse {
        match self {
            ServiceError::Remote(e) => ErrorResponse::from(e),
            other => ErrorResponse::new(other.status_code(), other.to_string()),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InsufficientArguments => AppError::Validation(err.to_string()),
            ServiceError::Remote(e) => AppError::Call(e),
            other => AppError::NotFound(other.to_string()),
        }
    }
}

/// Fetch a single record, treating any failure or an empty answer as not found
pub(crate) fn fetch_record(
    endpoints: &dyn RemoteEndpoints,
    endpoint: &str,
    not_found: &str,
) -> Result<Value, ServiceError> {
    match endpoints.access_endpoint(endpoint, &[]) {
        Ok(record) if !is_empty(&record) => Ok(record),
        Ok(_) => Err(ServiceError::NotFound(not_found.to_string())),
        Err(e) => {
            tracing::warn!("Lookup of \"{}\" failed: {}", endpoint, e);
            Err(ServiceError::NotFound(not_found.to_string()))
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Case service for event posting and case lookups
pub struct CaseService {
    endpoints: Arc<dyn RemoteEndpoints>,
    categories: CategoryCache,
}

impl CaseService {
    pub fn new(endpoints: Arc<dyn RemoteEndpoints>) -> Self {
        Self {
            endpoints,
            categories: CategoryCache::new(),
        }
    }

    pub fn categories(&self) -> &CategoryCache {
        &self.categories
    }

    /// Post an event against a case, returning the case service's answer
    pub fn post_event(&self, case_id: &str, request: EventRequest) -> Result<(u16, Value), ServiceError> {
        let summary = format!(
            "description={:?} category={:?} party_id={:?} created_by={:?}",
            request.description, request.category, request.party_id, request.created_by
        );
        let message = match request.into_message() {
            Some(message) => message,
            None => {
                tracing::error!("Insufficient arguments: {}", summary);
                return Err(ServiceError::InsufficientArguments);
            }
        };

        self.ensure_categories()?;

        if !self.categories.contains(&message.category) {
            tracing::error!("invalid category code \"{}\"", message.category);
            return Err(ServiceError::InvalidCategory(message.category));
        }

        let endpoint = format!("/cases/{}/events", case_id);
        Ok(self.endpoints.post_route(&endpoint, message.to_json())?)
    }

    /// Recover a case by id
    pub fn get_by_id(&self, case_id: &str) -> Result<Value, ServiceError> {
        fetch_record(
            self.endpoints.as_ref(),
            &format!("/cases/{}", case_id),
            "unable to find case for this case_id",
        )
    }

    /// Surveys a party still has to complete, filtered by status
    pub fn my_surveys(&self, party_id: &str, statuses: &[String]) -> Result<Value, ServiceError> {
        let params: Vec<(String, String)> = statuses
            .iter()
            .map(|status| ("status".to_string(), status.clone()))
            .collect();

        let endpoint = format!("/api/1.0.0/surveys/todo/{}", party_id);
        Ok(self.endpoints.access_endpoint(&endpoint, &params)?)
    }

    fn ensure_categories(&self) -> Result<(), ServiceError> {
        if self.categories.is_loaded() {
            return Ok(());
        }

        tracing::info!("first pass :: caching event category list");
        let listing = match self.endpoints.access_endpoint("/categories", &[]) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!("Unable to load categories: {}", e);
                return Err(ServiceError::CategoriesUnavailable);
            }
        };

        match self.categories.fill(&listing) {
            Some(count) => {
                tracing::info!("first pass :: cached ({}) categories", count);
                Ok(())
            }
            None => Err(ServiceError::CategoriesUnavailable),
        }
    }
}
