use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Research,
    History,
    Portfolio,
}

impl SourceTag {
    pub const ALL: [SourceTag; 3] = [SourceTag::Research, SourceTag::History, SourceTag::Portfolio];

    // Lower value wins when duplicates are collapsed.
    pub fn precedence(self) -> u8 {
        match self {
            SourceTag::Research => 0,
            SourceTag::History => 1,
            SourceTag::Portfolio => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Research => "research",
            SourceTag::History => "history",
            SourceTag::Portfolio => "portfolio",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompKind {
    Sale,
    Rental,
    Portfolio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Sale,
    Rental,
}

impl CompKind {
    pub fn transaction_type(self) -> TransactionType {
        match self {
            CompKind::Sale | CompKind::Portfolio => TransactionType::Sale,
            CompKind::Rental => TransactionType::Rental,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance: f64,
    pub price: f64,
    pub sqft: f64,
    pub room_match: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompRecord {
    pub kind: CompKind,
    pub source: SourceTag,
    pub merged_sources: Vec<SourceTag>,
    pub external_id: Option<String>,
    pub address: String,
    pub price: f64,
    pub sqft: Option<f64>,
    pub beds: Option<u32>,
    pub baths: Option<f64>,
    // Supplied by the source; `None` is scored as the saturation distance, never as zero.
    pub distance_mi: Option<f64>,
    pub transaction_date: Option<NaiveDate>,
    pub similarity_score: Option<f64>,
    pub score_breakdown: Option<ScoreBreakdown>,
}

impl CompRecord {
    pub fn known_sqft(&self) -> Option<f64> {
        self.sqft.filter(|s| s.is_finite() && *s > 0.0)
    }

    pub fn price_per_sqft(&self) -> Option<f64> {
        self.known_sqft().map(|sqft| self.price / sqft)
    }

    pub fn normalized_address(&self) -> String {
        normalize_address(&self.address)
    }
}

pub fn normalize_address(address: &str) -> String {
    address
        .to_lowercase()
        .replace([',', '.', '#'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_address_ignores_case_whitespace_and_punctuation() {
        assert_eq!(
            normalize_address("  123 Main St.,   Austin "),
            normalize_address("123 main st austin")
        );
        assert_eq!(normalize_address("Unit #4, 9 Elm"), "unit 4 9 elm");
    }

    #[test]
    fn portfolio_collapses_as_sale() {
        assert_eq!(CompKind::Portfolio.transaction_type(), TransactionType::Sale);
        assert_eq!(CompKind::Rental.transaction_type(), TransactionType::Rental);
    }

    #[test]
    fn research_has_highest_precedence() {
        let mut tags = vec![SourceTag::Portfolio, SourceTag::Research, SourceTag::History];
        tags.sort_by_key(|t| t.precedence());
        assert_eq!(tags, SourceTag::ALL.to_vec());
    }
}
