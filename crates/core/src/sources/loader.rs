use crate::domain::comp::{CompRecord, SourceTag};
use crate::domain::contract::RawComp;
use crate::domain::dashboard::SourceStatus;
use crate::domain::property::SubjectProperty;
use crate::sources::{HistoryCompsSource, PortfolioCompsSource, ResearchCompsSource};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub raw_count: usize,
    pub comps: Vec<CompRecord>,
}

#[async_trait::async_trait]
pub trait CompLoader: Send + Sync {
    fn source(&self) -> SourceTag;

    async fn load(&self, subject: &SubjectProperty, as_of_date: NaiveDate)
        -> Result<NormalizedBatch>;
}

pub struct ResearchCompsLoader {
    inner: Arc<dyn ResearchCompsSource>,
}

impl ResearchCompsLoader {
    pub fn new(inner: Arc<dyn ResearchCompsSource>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl CompLoader for ResearchCompsLoader {
    fn source(&self) -> SourceTag {
        SourceTag::Research
    }

    async fn load(
        &self,
        subject: &SubjectProperty,
        as_of_date: NaiveDate,
    ) -> Result<NormalizedBatch> {
        let raw = self
            .inner
            .load_research_comps(subject.id)
            .await
            .context("load research comps failed")?;
        Ok(normalize_batch(self.source(), raw, as_of_date))
    }
}

pub struct HistoricalSalesLoader {
    inner: Arc<dyn HistoryCompsSource>,
}

impl HistoricalSalesLoader {
    pub fn new(inner: Arc<dyn HistoryCompsSource>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl CompLoader for HistoricalSalesLoader {
    fn source(&self) -> SourceTag {
        SourceTag::History
    }

    async fn load(
        &self,
        subject: &SubjectProperty,
        as_of_date: NaiveDate,
    ) -> Result<NormalizedBatch> {
        let raw = self
            .inner
            .load_history_comps(subject.id)
            .await
            .context("load price history comps failed")?;
        Ok(normalize_batch(self.source(), raw, as_of_date))
    }
}

pub struct PortfolioCompsLoader {
    inner: Arc<dyn PortfolioCompsSource>,
}

impl PortfolioCompsLoader {
    pub fn new(inner: Arc<dyn PortfolioCompsSource>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl CompLoader for PortfolioCompsLoader {
    fn source(&self) -> SourceTag {
        SourceTag::Portfolio
    }

    async fn load(
        &self,
        subject: &SubjectProperty,
        as_of_date: NaiveDate,
    ) -> Result<NormalizedBatch> {
        let raw = self
            .inner
            .load_portfolio_comps(subject)
            .await
            .context("load portfolio comps failed")?;
        Ok(normalize_batch(self.source(), raw, as_of_date))
    }
}

// Rows are parsed one at a time so a malformed row is a single reject, not a failed source.
pub fn normalize_batch(source: SourceTag, raw: Vec<Value>, as_of_date: NaiveDate) -> NormalizedBatch {
    let raw_count = raw.len();
    let mut comps = Vec::with_capacity(raw_count);
    let mut rejected: usize = 0;

    for (idx, row) in raw.into_iter().enumerate() {
        let parsed = serde_json::from_value::<RawComp>(row)
            .context("malformed comp row")
            .and_then(|item| item.validate_and_into_record(source, as_of_date));
        match parsed {
            Ok(rec) => comps.push(rec),
            Err(err) => {
                rejected += 1;
                tracing::debug!(%source, idx, error = %format!("{err:#}"), "comp rejected by normalizer");
            }
        }
    }

    if rejected > 0 {
        tracing::debug!(%source, raw_count, rejected, "normalized source batch");
    }

    NormalizedBatch { raw_count, comps }
}

#[derive(Debug, Clone)]
pub struct SourceLoad {
    pub source: SourceTag,
    pub status: SourceStatus,
    pub raw_count: usize,
    pub comps: Vec<CompRecord>,
}

impl SourceLoad {
    pub fn degraded(source: SourceTag, status: SourceStatus) -> Self {
        Self {
            source,
            status,
            raw_count: 0,
            comps: Vec::new(),
        }
    }

    pub fn from_batch(source: SourceTag, batch: NormalizedBatch) -> Self {
        let status = if batch.comps.is_empty() {
            SourceStatus::Empty
        } else {
            SourceStatus::Ok
        };
        Self {
            source,
            status,
            raw_count: batch.raw_count,
            comps: batch.comps,
        }
    }
}

// Runs a loader under `timeout`. Errors and timeouts never escape; they degrade the source.
pub async fn load_bounded(
    loader: &dyn CompLoader,
    subject: &SubjectProperty,
    as_of_date: NaiveDate,
    timeout: Duration,
) -> SourceLoad {
    let source = loader.source();
    let t0 = Instant::now();

    match tokio::time::timeout(timeout, loader.load(subject, as_of_date)).await {
        Ok(Ok(batch)) => {
            tracing::debug!(
                %source,
                property_id = %subject.id,
                raw_count = batch.raw_count,
                comps = batch.comps.len(),
                elapsed_ms = t0.elapsed().as_millis(),
                "source loaded"
            );
            SourceLoad::from_batch(source, batch)
        }
        Ok(Err(err)) => {
            tracing::warn!(
                %source,
                property_id = %subject.id,
                error = %format!("{err:#}"),
                "source unavailable; continuing without it"
            );
            SourceLoad::degraded(source, SourceStatus::Failed)
        }
        Err(_) => {
            tracing::warn!(
                %source,
                property_id = %subject.id,
                timeout_ms = timeout.as_millis(),
                "source timed out; continuing without it"
            );
            SourceLoad::degraded(source, SourceStatus::TimedOut)
        }
    }
}
