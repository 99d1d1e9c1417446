use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::record::{FieldValue, RecordData, RecordKind, ValidationError, require_email, require_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Client {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ClientPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Option<String>>,
}

impl Client {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            email: None,
            address: None,
        }
    }
}

impl RecordData for Client {
    const KIND: RecordKind = RecordKind::Client;
    type Patch = ClientPatch;

    fn search_projection(&self) -> Vec<String> {
        let mut parts = vec![self.name.clone(), self.phone.clone()];
        parts.extend(self.email.clone());
        parts.extend(self.address.clone());
        parts
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "name" => Some(FieldValue::text(&self.name)),
            "phone" => Some(FieldValue::text(&self.phone)),
            "email" => self.email.as_deref().map(FieldValue::text),
            "address" => self.address.as_deref().map(FieldValue::text),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        require_text("phone", &self.phone)?;
        match self.email.as_deref() {
            Some(email) if !email.trim().is_empty() => require_email("email", email),
            _ => Ok(()),
        }
    }
}
