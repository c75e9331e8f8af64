//! Case models
//!
//! Event categories and the event messages posted against a case.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event category as listed by `/categories`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Caller input for posting an event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRequest {
    pub description: Option<String>,
    pub category: Option<String>,
    pub party_id: Option<String>,
    pub created_by: Option<String>,
    pub payload: Map<String, Value>,
}

impl EventRequest {
    pub fn new(
        description: impl Into<String>,
        category: impl Into<String>,
        party_id: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            description: Some(description.into()),
            category: Some(category.into()),
            party_id: Some(party_id.into()),
            created_by: Some(created_by.into()),
            payload: Map::new(),
        }
    }

    /// Add an optional payload merged into the posted message
    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    /// The complete message, or None when a descriptive field is missing or empty
    pub fn into_message(self) -> Option<EventMessage> {
        let present = |field: Option<String>| field.filter(|value| !value.is_empty());

        Some(EventMessage {
            description: present(self.description)?,
            category: present(self.category)?,
            party_id: present(self.party_id)?,
            created_by: present(self.created_by)?,
            payload: self.payload,
        })
    }
}

/// Event body posted to `/cases/{id}/events`
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub description: String,
    pub category: String,
    pub party_id: String,
    pub created_by: String,
    pub payload: Map<String, Value>,
}

impl EventMessage {
    /// Wire form. Payload keys win over the descriptive fields.
    pub fn to_json(&self) -> Value {
        let mut message = Map::new();
        message.insert("description".to_string(), Value::String(self.description.clone()));
        message.insert("category".to_string(), Value::String(self.category.clone()));
        message.insert("partyId".to_string(), Value::String(self.party_id.clone()));
        message.insert("createdBy".to_string(), Value::String(self.created_by.clone()));
        for (key, value) in &self.payload {
            message.insert(key.clone(), value.clone());
        }
        Value::Object(message)
    }
}
