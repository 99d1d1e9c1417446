use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::record::{
    Aggregatable, FieldValue, RecordData, RecordKind, ValidationError, require_non_negative,
    require_text,
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobOrderStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Released,
    Cancelled,
}

/// A repair ticket for one customer device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct JobOrder {
    pub client_name: String,
    pub device: String,
    pub problem: String,
    #[serde(default)]
    pub status: JobOrderStatus,
    pub technician_id: Option<Uuid>, // Assigned technician record
    pub total_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct JobOrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobOrderStatus>,
    /// `Some(None)` unassigns the technician.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

impl JobOrder {
    pub fn new(
        client_name: impl Into<String>,
        device: impl Into<String>,
        problem: impl Into<String>,
        total_cost: f64,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            device: device.into(),
            problem: problem.into(),
            status: JobOrderStatus::Pending,
            technician_id: None,
            total_cost,
        }
    }
}

impl RecordData for JobOrder {
    const KIND: RecordKind = RecordKind::JobOrder;
    type Patch = JobOrderPatch;

    fn search_projection(&self) -> Vec<String> {
        vec![
            self.client_name.clone(),
            self.device.clone(),
            self.problem.clone(),
            self.status.to_string(),
            self.total_cost.to_string(),
        ]
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "client_name" => Some(FieldValue::text(&self.client_name)),
            "device" => Some(FieldValue::text(&self.device)),
            "problem" => Some(FieldValue::text(&self.problem)),
            "status" => Some(FieldValue::Text(self.status.to_string())),
            "technician_id" => self.technician_id.map(|id| FieldValue::Text(id.to_string())),
            "total_cost" => Some(FieldValue::Number(self.total_cost)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("client_name", &self.client_name)?;
        require_text("device", &self.device)?;
        require_text("problem", &self.problem)?;
        require_non_negative("total_cost", self.total_cost)
    }
}

impl Aggregatable for JobOrder {
    fn amount(&self) -> f64 {
        self.total_cost
    }

    fn category(&self) -> String {
        self.status.to_string()
    }
}
