use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::record::{FieldValue, RecordData, RecordKind, ValidationError, require_email, require_text};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Technician {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TechnicianPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl Technician {
    pub fn new(full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            email: email.into(),
            phone: None,
            specialization: None,
            active: true,
        }
    }
}

impl RecordData for Technician {
    const KIND: RecordKind = RecordKind::Technician;
    type Patch = TechnicianPatch;

    fn search_projection(&self) -> Vec<String> {
        let mut parts = vec![self.full_name.clone(), self.email.clone()];
        parts.extend(self.phone.clone());
        parts.extend(self.specialization.clone());
        parts
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "full_name" => Some(FieldValue::text(&self.full_name)),
            "email" => Some(FieldValue::text(&self.email)),
            "phone" => self.phone.as_deref().map(FieldValue::text),
            "specialization" => self.specialization.as_deref().map(FieldValue::text),
            "active" => Some(FieldValue::Bool(self.active)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("full_name", &self.full_name)?;
        require_email("email", &self.email)
    }
}
