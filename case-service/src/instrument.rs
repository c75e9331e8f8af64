//! Collection instrument lookups and survey response uploads

use std::sync::Arc;

use gateway_link::{RemoteEndpoints, UploadFile};
use serde_json::Value;

use crate::service::{fetch_record, ServiceError};

const INSTRUMENT_ENDPOINT: &str = "/collection-instrument-api/1.0.2/collectioninstrument/id";
const UPLOAD_ENDPOINT: &str = "/collection-instrument-api/1.0.2/survey_responses";

pub struct CollectionInstrumentService {
    endpoints: Arc<dyn RemoteEndpoints>,
}

impl CollectionInstrumentService {
    pub fn new(endpoints: Arc<dyn RemoteEndpoints>) -> Self {
        Self { endpoints }
    }

    /// Recover an instrument by id
    pub fn get_by_id(&self, instrument_id: &str) -> Result<Value, ServiceError> {
        fetch_record(
            self.endpoints.as_ref(),
            &format!("{}/{}", INSTRUMENT_ENDPOINT, instrument_id),
            "unable to find instrument for this instrument_id",
        )
    }

    /// Upload a completed survey response for a case
    pub fn upload(&self, case_id: &str, file: UploadFile) -> Result<(), ServiceError> {
        let filename = file.filename.clone();
        match self.endpoints.post_upload(UPLOAD_ENDPOINT, case_id, file) {
            Ok(()) => {
                tracing::info!("Uploaded \"{}\" for case {}", filename, case_id);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Upload of \"{}\" for case {} failed: {}", filename, case_id, e);
                Err(ServiceError::NotFound("unable to upload instrument".to_string()))
            }
        }
    }
}
