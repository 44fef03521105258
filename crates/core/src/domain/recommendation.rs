use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPosition {
    UnderMarket,
    AtMarket,
    OverMarket,
}

impl MarketPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketPosition::UnderMarket => "under_market",
            MarketPosition::AtMarket => "at_market",
            MarketPosition::OverMarket => "over_market",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRecommendation {
    pub text: String,
    pub position: Option<MarketPosition>,
    pub difference_pct: Option<f64>,
    pub comp_count: usize,
}
