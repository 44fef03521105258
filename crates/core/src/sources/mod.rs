use crate::domain::property::{PropertyId, SubjectProperty};
use anyhow::Result;
use serde_json::Value;

pub mod http;
pub mod loader;
pub mod memory;

pub use loader::{
    CompLoader, HistoricalSalesLoader, NormalizedBatch, PortfolioCompsLoader, ResearchCompsLoader,
    SourceLoad,
};

#[async_trait::async_trait]
pub trait SubjectRepository: Send + Sync {
    // `Ok(None)` means the id is unknown; `Err` means the lookup itself failed.
    async fn get_subject(&self, property_id: PropertyId) -> Result<Option<SubjectProperty>>;
}

#[async_trait::async_trait]
pub trait ResearchCompsSource: Send + Sync {
    async fn load_research_comps(&self, property_id: PropertyId) -> Result<Vec<Value>>;
}

#[async_trait::async_trait]
pub trait HistoryCompsSource: Send + Sync {
    async fn load_history_comps(&self, property_id: PropertyId) -> Result<Vec<Value>>;
}

#[async_trait::async_trait]
pub trait PortfolioCompsSource: Send + Sync {
    async fn load_portfolio_comps(&self, subject: &SubjectProperty) -> Result<Vec<Value>>;
}
