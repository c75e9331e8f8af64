//! Collection exercise lookups

use std::sync::Arc;

use gateway_link::RemoteEndpoints;
use serde_json::Value;

use crate::service::{fetch_record, ServiceError};

pub struct ExerciseService {
    endpoints: Arc<dyn RemoteEndpoints>,
}

impl ExerciseService {
    pub fn new(endpoints: Arc<dyn RemoteEndpoints>) -> Self {
        Self { endpoints }
    }

    /// Recover an exercise by id
    pub fn get_by_id(&self, exercise_id: &str) -> Result<Value, ServiceError> {
        fetch_record(
            self.endpoints.as_ref(),
            &format!("/collectionexercises/{}", exercise_id),
            "unable to find exercise for this exercise_id",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubEndpoints;
    use serde_json::json;

    #[test]
    fn test_get_by_id() {
        let stub = Arc::new(StubEndpoints::default());
        stub.respond("/collectionexercises/ex-1", Ok(json!({"id": "ex-1", "state": "LIVE"})));
        let service = ExerciseService::new(stub);

        assert_eq!(service.get_by_id("ex-1").unwrap()["state"], json!("LIVE"));

        let err = service.get_by_id("ex-2").unwrap_err();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.to_string(), "unable to find exercise for this exercise_id");
    }
}
