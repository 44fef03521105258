pub mod dashboard;
pub mod dedup;
pub mod metrics;
pub mod rank;
pub mod recommend;
pub mod scoring;

use crate::domain::comp::{CompKind, CompRecord};
use crate::domain::dashboard::{DashboardResult, RentalsDashboard, SalesDashboard};
use crate::domain::property::{PropertyId, SubjectProperty};
use crate::error::{EngineError, EngineResult};
use crate::sources::loader::load_bounded;
use crate::sources::{
    CompLoader, HistoricalSalesLoader, HistoryCompsSource, PortfolioCompsLoader,
    PortfolioCompsSource, ResearchCompsLoader, ResearchCompsSource, SourceLoad,
    SubjectRepository,
};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_DISTANCE_SATURATION_MI: f64 = 5.0;
pub const DEFAULT_LOADER_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub distance_saturation_mi: f64,
    // Per-source budget; a source that exceeds it contributes nothing.
    pub loader_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            distance_saturation_mi: DEFAULT_DISTANCE_SATURATION_MI,
            loader_timeout: Duration::from_millis(DEFAULT_LOADER_TIMEOUT_MS),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("COMPS_DISTANCE_SATURATION_MI") {
            if let Ok(n) = s.parse::<f64>() {
                if n.is_finite() && n > 0.0 {
                    out.distance_saturation_mi = n;
                }
            }
        }

        if let Ok(s) = std::env::var("COMPS_LOADER_TIMEOUT_MS") {
            if let Ok(n) = s.parse::<u64>() {
                if n > 0 {
                    out.loader_timeout = Duration::from_millis(n);
                }
            }
        }

        out
    }
}

pub struct CompsEngine {
    subjects: Arc<dyn SubjectRepository>,
    research: ResearchCompsLoader,
    history: HistoricalSalesLoader,
    portfolio: PortfolioCompsLoader,
    config: EngineConfig,
}

impl CompsEngine {
    pub fn new(
        subjects: Arc<dyn SubjectRepository>,
        research: ResearchCompsLoader,
        history: HistoricalSalesLoader,
        portfolio: PortfolioCompsLoader,
        config: EngineConfig,
    ) -> Self {
        Self {
            subjects,
            research,
            history,
            portfolio,
            config,
        }
    }

    pub fn from_store<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: SubjectRepository
            + ResearchCompsSource
            + HistoryCompsSource
            + PortfolioCompsSource
            + 'static,
    {
        Self::new(
            store.clone(),
            ResearchCompsLoader::new(store.clone()),
            HistoricalSalesLoader::new(store.clone()),
            PortfolioCompsLoader::new(store),
            config,
        )
    }

    async fn subject(&self, property_id: PropertyId) -> EngineResult<SubjectProperty> {
        self.subjects
            .get_subject(property_id)
            .await
            .map_err(EngineError::Repository)?
            .ok_or(EngineError::SubjectNotFound(property_id))
    }

    pub async fn load_sources(
        &self,
        subject: &SubjectProperty,
        as_of_date: NaiveDate,
    ) -> Vec<SourceLoad> {
        let timeout = self.config.loader_timeout;
        let (research, history, portfolio) = tokio::join!(
            load_bounded(&self.research as &dyn CompLoader, subject, as_of_date, timeout),
            load_bounded(&self.history as &dyn CompLoader, subject, as_of_date, timeout),
            load_bounded(&self.portfolio as &dyn CompLoader, subject, as_of_date, timeout),
        );
        vec![research, history, portfolio]
    }

    pub async fn full_dashboard(
        &self,
        property_id: PropertyId,
        as_of_date: NaiveDate,
    ) -> EngineResult<DashboardResult> {
        let t0 = Instant::now();
        // Unknown ids must surface before any loader runs.
        let subject = self.subject(property_id).await?;
        let loads = self.load_sources(&subject, as_of_date).await;
        let result = analyze(subject, loads, as_of_date, &self.config);
        if !result.data_sources.any_available() {
            tracing::warn!(%property_id, %as_of_date, "no comp source returned data");
        }

        tracing::info!(
            %property_id,
            %as_of_date,
            sale_comps = result.market_metrics.comp_count,
            rental_comps = result.rental_metrics.comp_count,
            position = result.recommendation.position.map(|p| p.as_str()).unwrap_or("none"),
            elapsed_ms = t0.elapsed().as_millis(),
            "comps dashboard computed"
        );
        Ok(result)
    }

    pub async fn sales_dashboard(
        &self,
        property_id: PropertyId,
        as_of_date: NaiveDate,
    ) -> EngineResult<SalesDashboard> {
        Ok(self
            .full_dashboard(property_id, as_of_date)
            .await?
            .into_sales_view())
    }

    pub async fn rentals_dashboard(
        &self,
        property_id: PropertyId,
        as_of_date: NaiveDate,
    ) -> EngineResult<RentalsDashboard> {
        Ok(self
            .full_dashboard(property_id, as_of_date)
            .await?
            .into_rentals_view())
    }
}

// Statistics see the whole deduplicated population; only the returned lists are truncated.
pub fn analyze(
    subject: SubjectProperty,
    loads: Vec<SourceLoad>,
    as_of_date: NaiveDate,
    config: &EngineConfig,
) -> DashboardResult {
    let all: Vec<CompRecord> = loads.iter().flat_map(|l| l.comps.iter().cloned()).collect();
    let mut comps = dedup::deduplicate(all);
    let data_sources = dashboard::source_summary(&loads, comps.len());

    scoring::score_all(&subject, &mut comps, config.distance_saturation_mi);

    let mut sales = Vec::new();
    let mut rentals = Vec::new();
    let mut portfolio = Vec::new();
    for comp in comps {
        match comp.kind {
            CompKind::Sale => sales.push(comp),
            CompKind::Rental => rentals.push(comp),
            CompKind::Portfolio => portfolio.push(comp),
        }
    }

    let market = metrics::market_metrics(&subject, &sales);
    let rental = metrics::rental_metrics(&subject, &rentals);
    let recommendation = recommend::recommend(&subject, &market);

    let ranked = dashboard::RankedComps {
        sales: rank::rank_and_truncate(sales, rank::SALE_COMPS_CAP),
        rentals: rank::rank_and_truncate(rentals, rank::RENTAL_COMPS_CAP),
        portfolio: rank::rank_and_truncate(portfolio, rank::PORTFOLIO_COMPS_CAP),
    };

    dashboard::assemble(
        subject,
        as_of_date,
        ranked,
        market,
        rental,
        recommendation,
        data_sources,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dashboard::SourceStatus;
    use crate::domain::recommendation::MarketPosition;
    use crate::sources::memory::InMemoryStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    fn subject(list_price: f64) -> SubjectProperty {
        SubjectProperty {
            id: uuid::Uuid::new_v4(),
            address: "100 Subject Way".to_string(),
            city: Some("Austin".to_string()),
            state: Some("TX".to_string()),
            list_price,
            bedrooms: Some(3),
            bathrooms: Some(2.0),
            sqft: Some(1800.0),
            external_estimate: None,
        }
    }

    fn raw(v: serde_json::Value) -> Vec<serde_json::Value> {
        v.as_array().cloned().unwrap()
    }

    fn reference_sales() -> Vec<serde_json::Value> {
        raw(json!([
            {"address": "1 A St", "price": 860000.0, "sqft": 1850.0, "beds": 3, "baths": 2.0, "distance": 0.5, "date": "2026-01-15"},
            {"address": "2 B St", "price": 845000.0, "sqft": 1790.0, "beds": 3, "baths": 2.0, "distance": 0.8, "date": "2026-02-15"},
            {"address": "3 C St", "price": 850000.0, "sqft": 1800.0, "beds": 3, "baths": 2.5, "distance": 1.1, "date": "2026-03-15"},
            {"address": "4 D St", "price": 720000.0, "sqft": 1500.0, "beds": 2, "baths": 1.0, "distance": 2.0, "date": "2026-04-15"},
            {"address": "5 E St", "price": 950000.0, "sqft": 2100.0, "beds": 4, "baths": 3.0, "distance": 3.5, "date": "2026-05-15"}
        ]))
    }

    fn engine_for(store: InMemoryStore) -> CompsEngine {
        CompsEngine::from_store(Arc::new(store), EngineConfig::default())
    }

    #[tokio::test]
    async fn reference_scenario_end_to_end() {
        let s = subject(850_000.0);
        let id = s.id;
        let store = InMemoryStore::new()
            .with_subject(s)
            .with_research(id, reference_sales())
            .with_history(
                id,
                raw(json!([
                    {"address": "20 Rent Rd", "monthly_rent": 2700.0, "event": "Listed for rent", "date": "2026-03-01"},
                    {"address": "21 Rent Rd", "monthly_rent": 2750.0, "event": "Rented", "date": "2026-03-05"},
                    {"address": "22 Rent Rd", "monthly_rent": 2900.0, "event": "Rented", "date": "2026-04-01"},
                    {"address": "2 b st.", "price": 846000.0, "event": "Sold", "date": "2026-02-17"},
                    {"address": "30 Listing Ln", "price": 990000.0, "event": "Listed for sale"}
                ])),
            );

        let result = engine_for(store).full_dashboard(id, as_of()).await.unwrap();

        let m = &result.market_metrics;
        assert_eq!(m.comp_count, 5);
        assert_eq!(m.median_sale_price, Some(850_000.0));
        assert_eq!(m.subject_difference_pct, Some(0.0));
        assert_eq!(m.subject_vs_market, Some(MarketPosition::AtMarket));
        assert_eq!(
            result.recommendation.text,
            "Property is priced at market value based on 5 comparable sales."
        );

        let r = &result.rental_metrics;
        assert_eq!(r.comp_count, 3);
        assert_eq!(r.median_rent, Some(2750.0));
        assert!((r.rental_yield.unwrap() - 0.0388).abs() < 1e-4);

        let ds = &result.data_sources;
        assert!(ds.has_research && ds.has_history && !ds.has_portfolio);
        assert_eq!(ds.research.count, 5);
        // The "Listed for sale" event is rejected by the normalizer.
        assert_eq!(ds.history.count, 4);
        assert_eq!(ds.total_raw, 10);
        assert_eq!(ds.total_deduplicated, 8);

        let dup = result
            .sale_comps
            .iter()
            .find(|c| c.address == "2 B St")
            .unwrap();
        assert_eq!(dup.price, 845_000.0);
        assert_eq!(dup.merged_sources.len(), 2);

        for c in result.sale_comps.iter().chain(&result.rental_comps) {
            let score = c.similarity_score.unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
        assert_eq!(result.sale_comps[0].address, "1 A St");
        assert!(result.summary.contains("median $850,000"));
        assert!(result.summary.contains("Sources: research 5, history 4, portfolio 0."));
    }

    #[tokio::test]
    async fn over_market_subject() {
        let s = subject(920_000.0);
        let id = s.id;
        let store = InMemoryStore::new()
            .with_subject(s)
            .with_research(id, reference_sales());

        let sales = engine_for(store).sales_dashboard(id, as_of()).await.unwrap();
        assert_eq!(
            sales.market_metrics.subject_vs_market,
            Some(MarketPosition::OverMarket)
        );
        assert!((sales.market_metrics.subject_difference_pct.unwrap() - 8.24).abs() < 0.01);
        assert!(sales.recommendation.text.contains("8.2% above market"));
        assert!(sales.summary.ends_with(&sales.recommendation.text));
    }

    #[tokio::test]
    async fn truncation_does_not_affect_metrics() {
        let s = subject(850_000.0);
        let id = s.id;
        let comps: Vec<serde_json::Value> = (0..25)
            .map(|i| {
                json!({
                    "address": format!("{i} Many St"),
                    "price": 800_000.0 + (i as f64) * 1_000.0,
                    "date": "2026-01-01",
                })
            })
            .collect();
        let store = InMemoryStore::new()
            .with_subject(s)
            .with_history(
                id,
                comps
                    .into_iter()
                    .map(|mut v| {
                        v["event"] = json!("Sold");
                        v
                    })
                    .collect(),
            );

        let result = engine_for(store).full_dashboard(id, as_of()).await.unwrap();
        assert_eq!(result.market_metrics.comp_count, 25);
        assert_eq!(result.sale_comps.len(), 20);
        assert_eq!(result.market_metrics.median_sale_price, Some(812_000.0));
        // Same-day sales carry no time signal.
        assert_eq!(result.market_metrics.price_trend, None);
        assert_eq!(result.market_metrics.trend_pct, None);
    }

    #[tokio::test]
    async fn zero_comps_is_a_valid_result() {
        let s = subject(850_000.0);
        let id = s.id;
        let engine = engine_for(InMemoryStore::new().with_subject(s));

        let result = engine.full_dashboard(id, as_of()).await.unwrap();
        assert_eq!(result.market_metrics.comp_count, 0);
        assert_eq!(result.market_metrics.subject_vs_market, None);
        assert_eq!(result.market_metrics.median_sale_price, None);
        assert_eq!(result.recommendation.text, recommend::NO_COMPS_TEXT);
        assert!(!result.data_sources.any_available());
        assert_eq!(result.data_sources.research.status, SourceStatus::Empty);

        let rentals = engine.rentals_dashboard(id, as_of()).await.unwrap();
        assert_eq!(rentals.rental_metrics.comp_count, 0);
        assert!(rentals.summary.starts_with("No rental comps found"));
    }

    struct CountingStore {
        inner: InMemoryStore,
        loads: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SubjectRepository for CountingStore {
        async fn get_subject(&self, id: PropertyId) -> anyhow::Result<Option<SubjectProperty>> {
            self.inner.get_subject(id).await
        }
    }

    #[async_trait::async_trait]
    impl ResearchCompsSource for CountingStore {
        async fn load_research_comps(&self, id: PropertyId) -> anyhow::Result<Vec<serde_json::Value>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_research_comps(id).await
        }
    }

    #[async_trait::async_trait]
    impl HistoryCompsSource for CountingStore {
        async fn load_history_comps(&self, _: PropertyId) -> anyhow::Result<Vec<serde_json::Value>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("price history store unreachable")
        }
    }

    #[async_trait::async_trait]
    impl PortfolioCompsSource for CountingStore {
        async fn load_portfolio_comps(&self, s: &SubjectProperty) -> anyhow::Result<Vec<serde_json::Value>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            self.inner.load_portfolio_comps(s).await
        }
    }

    #[tokio::test]
    async fn unknown_subject_fails_before_loaders_run() {
        let store = Arc::new(CountingStore {
            inner: InMemoryStore::new(),
            loads: AtomicUsize::new(0),
        });
        let engine = CompsEngine::from_store(store.clone(), EngineConfig::default());

        let missing = uuid::Uuid::new_v4();
        let err = engine.full_dashboard(missing, as_of()).await.unwrap_err();
        assert!(matches!(err, EngineError::SubjectNotFound(id) if id == missing));
        assert_eq!(store.loads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_and_slow_sources_degrade_without_failing() {
        let s = subject(850_000.0);
        let id = s.id;
        let store = Arc::new(CountingStore {
            inner: InMemoryStore::new()
                .with_subject(s)
                .with_research(id, reference_sales()),
            loads: AtomicUsize::new(0),
        });
        let config = EngineConfig {
            loader_timeout: Duration::from_millis(50),
            ..EngineConfig::default()
        };
        let engine = CompsEngine::from_store(store.clone(), config);

        let result = engine.full_dashboard(id, as_of()).await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 3);
        assert_eq!(result.market_metrics.comp_count, 5);

        let ds = &result.data_sources;
        assert!(ds.has_research);
        assert!(!ds.has_history);
        assert!(!ds.has_portfolio);
        assert_eq!(ds.history.status, SourceStatus::Failed);
        assert_eq!(ds.portfolio.status, SourceStatus::TimedOut);
        assert!(result
            .summary
            .contains("Sources: research 5, history unavailable, portfolio unavailable."));
    }

    #[test]
    fn portfolio_comps_are_listed_but_not_in_sale_statistics() {
        let s = subject(850_000.0);
        let portfolio = crate::sources::loader::normalize_batch(
            crate::domain::comp::SourceTag::Portfolio,
            raw(json!([{"address": "9 Owned Ct", "list_price": 2_000_000.0, "distance": 0.2}])),
            as_of(),
        );
        let loads = vec![SourceLoad::from_batch(
            crate::domain::comp::SourceTag::Portfolio,
            portfolio,
        )];

        let result = analyze(s, loads, as_of(), &EngineConfig::default());
        assert_eq!(result.portfolio_comps.len(), 1);
        assert_eq!(result.market_metrics.comp_count, 0);
        assert!(result.data_sources.has_portfolio);
        assert_eq!(result.recommendation.text, recommend::NO_COMPS_TEXT);
    }
}
