use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PropertyId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProperty {
    pub id: PropertyId,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub list_price: f64,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<f64>,
    pub external_estimate: Option<f64>,
}

impl SubjectProperty {
    pub fn known_sqft(&self) -> Option<f64> {
        self.sqft.filter(|s| s.is_finite() && *s > 0.0)
    }
}
