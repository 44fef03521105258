use crate::domain::comp::{CompRecord, SourceTag};
use crate::domain::metrics::{MarketMetrics, RentalMetrics};
use crate::domain::property::{PropertyId, SubjectProperty};
use crate::domain::recommendation::PricingRecommendation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Empty,
    Failed,
    TimedOut,
}

impl SourceStatus {
    pub fn is_degraded(self) -> bool {
        matches!(self, SourceStatus::Failed | SourceStatus::TimedOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub status: SourceStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceSummary {
    pub has_research: bool,
    pub has_history: bool,
    pub has_portfolio: bool,
    pub research: SourceReport,
    pub history: SourceReport,
    pub portfolio: SourceReport,
    pub total_raw: usize,
    pub total_deduplicated: usize,
}

impl DataSourceSummary {
    pub fn report(&self, tag: SourceTag) -> SourceReport {
        match tag {
            SourceTag::Research => self.research,
            SourceTag::History => self.history,
            SourceTag::Portfolio => self.portfolio,
        }
    }

    pub fn any_available(&self) -> bool {
        self.has_research || self.has_history || self.has_portfolio
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardResult {
    pub subject: SubjectProperty,
    pub as_of_date: NaiveDate,
    pub sale_comps: Vec<CompRecord>,
    pub rental_comps: Vec<CompRecord>,
    pub portfolio_comps: Vec<CompRecord>,
    pub market_metrics: MarketMetrics,
    pub rental_metrics: RentalMetrics,
    pub recommendation: PricingRecommendation,
    pub data_sources: DataSourceSummary,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesDashboard {
    pub property_id: PropertyId,
    pub as_of_date: NaiveDate,
    pub sale_comps: Vec<CompRecord>,
    pub market_metrics: MarketMetrics,
    pub recommendation: PricingRecommendation,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalsDashboard {
    pub property_id: PropertyId,
    pub as_of_date: NaiveDate,
    pub rental_comps: Vec<CompRecord>,
    pub rental_metrics: RentalMetrics,
    pub summary: String,
}
