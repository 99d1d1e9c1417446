use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::record::{
    Aggregatable, FieldValue, RecordData, RecordKind, ValidationError, require_non_negative,
    require_text,
};

/// A bill paid by a branch (rent, utilities, supplies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Expense {
    pub bill_name: String,
    pub amount: f64,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ExpensePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// `Some(None)` clears the remarks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<Option<String>>,
}

impl Expense {
    pub fn new(bill_name: impl Into<String>, amount: f64) -> Self {
        Self {
            bill_name: bill_name.into(),
            amount,
            remarks: None,
        }
    }
}

impl RecordData for Expense {
    const KIND: RecordKind = RecordKind::Expense;
    type Patch = ExpensePatch;

    fn search_projection(&self) -> Vec<String> {
        let mut parts = vec![self.bill_name.clone(), self.amount.to_string()];
        parts.extend(self.remarks.clone());
        parts
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "bill_name" => Some(FieldValue::text(&self.bill_name)),
            "amount" => Some(FieldValue::Number(self.amount)),
            "remarks" => self.remarks.as_deref().map(FieldValue::text),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("bill_name", &self.bill_name)?;
        require_non_negative("amount", self.amount)
    }
}

impl Aggregatable for Expense {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn category(&self) -> String {
        self.bill_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_name_and_negative_amount() {
        assert!(Expense::new("Rent", 12000.0).validate().is_ok());
        assert_eq!(Expense::new("  ", 10.0).validate().unwrap_err().field, "bill_name");
        assert_eq!(Expense::new("Rent", -1.0).validate().unwrap_err().field, "amount");
    }

    #[test]
    fn test_patch_serialises_only_set_fields() {
        let patch = ExpensePatch {
            amount: Some(99.0),
            remarks: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({ "amount": 99.0, "remarks": null }));
    }
}
