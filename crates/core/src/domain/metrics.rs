use crate::domain::recommendation::MarketPosition;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTrend {
    Rising,
    Falling,
    Stable,
}

impl PriceTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceTrend::Rising => "rising",
            PriceTrend::Falling => "falling",
            PriceTrend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMetrics {
    pub comp_count: usize,
    pub median_sale_price: Option<f64>,
    pub avg_price_per_sqft: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub price_trend: Option<PriceTrend>,
    pub trend_pct: Option<f64>,
    pub subject_vs_market: Option<MarketPosition>,
    pub subject_difference_pct: Option<f64>,
    pub estimate_difference_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalMetrics {
    pub comp_count: usize,
    // Monthly.
    pub median_rent: Option<f64>,
    pub avg_rent_per_sqft: Option<f64>,
    pub rental_yield: Option<f64>,
}
