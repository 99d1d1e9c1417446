use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::record::{
    Aggregatable, FieldValue, RecordData, RecordKind, ValidationError, require_non_negative,
    require_text,
};

/// Spare parts and consumables kept in stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Material {
    pub name: String,
    pub supplier: Option<String>,
    pub quantity: i64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct MaterialPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<f64>,
}

impl Material {
    pub fn new(name: impl Into<String>, quantity: i64, unit_cost: f64) -> Self {
        Self {
            name: name.into(),
            supplier: None,
            quantity,
            unit_cost,
        }
    }

    pub fn stock_value(&self) -> f64 {
        self.quantity as f64 * self.unit_cost
    }
}

impl RecordData for Material {
    const KIND: RecordKind = RecordKind::Material;
    type Patch = MaterialPatch;

    fn search_projection(&self) -> Vec<String> {
        let mut parts = vec![self.name.clone()];
        parts.extend(self.supplier.clone());
        parts.push(self.quantity.to_string());
        parts.push(self.unit_cost.to_string());
        parts
    }

    fn field(&self, key: &str) -> Option<FieldValue> {
        match key {
            "name" => Some(FieldValue::text(&self.name)),
            "supplier" => self.supplier.as_deref().map(FieldValue::text),
            "quantity" => Some(FieldValue::Number(self.quantity as f64)),
            "unit_cost" => Some(FieldValue::Number(self.unit_cost)),
            "stock_value" => Some(FieldValue::Number(self.stock_value())),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.quantity < 0 {
            return Err(ValidationError::new("quantity", "must not be negative"));
        }
        require_non_negative("unit_cost", self.unit_cost)
    }
}

impl Aggregatable for Material {
    fn amount(&self) -> f64 {
        self.stock_value()
    }

    fn category(&self) -> String {
        self.supplier
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.name)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_falls_back_to_name() {
        let mut material = Material::new("LCD iPhone 11", 3, 1800.0);
        assert_eq!(material.category(), "LCD iPhone 11");
        material.supplier = Some("Gilmore Parts".to_string());
        assert_eq!(material.category(), "Gilmore Parts");
        assert_eq!(material.amount(), 5400.0);
    }

    #[test]
    fn test_validate_rejects_negative_quantity() {
        let material = Material::new("Flex cable", -2, 50.0);
        assert_eq!(material.validate().unwrap_err().field, "quantity");
    }
}
