//! Case Service
//!
//! Collaborators that talk to the case, collection exercise and collection
//! instrument services through the gateway link's blocking client.

pub mod cache;
pub mod exercise;
pub mod instrument;
pub mod models;
pub mod service;

use std::sync::Arc;

use gateway_link::{RemoteEndpoints, ServiceLink};

pub use cache::CategoryCache;
pub use exercise::ExerciseService;
pub use instrument::CollectionInstrumentService;
pub use models::{Category, EventMessage, EventRequest};
pub use service::{CaseService, ServiceError};

/// All collaborators sharing one set of remote endpoints
pub struct CaseServices {
    pub cases: CaseService,
    pub exercises: ExerciseService,
    pub instruments: CollectionInstrumentService,
}

impl CaseServices {
    pub fn new(endpoints: Arc<dyn RemoteEndpoints>) -> Self {
        Self {
            cases: CaseService::new(endpoints.clone()),
            exercises: ExerciseService::new(endpoints.clone()),
            instruments: CollectionInstrumentService::new(endpoints),
        }
    }

    /// Collaborators calling through a running link
    pub fn from_link(link: &ServiceLink) -> Self {
        Self::new(Arc::new(link.client()))
    }
}
