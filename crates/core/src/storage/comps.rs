use crate::config::Settings;
use crate::domain::property::{PropertyId, SubjectProperty};
use crate::engine::{CompsEngine, EngineConfig};
use crate::sources::http::HttpResearchSource;
use crate::sources::{
    HistoricalSalesLoader, HistoryCompsSource, PortfolioCompsLoader, PortfolioCompsSource,
    ResearchCompsLoader, ResearchCompsSource, SubjectRepository,
};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;

const DEFAULT_PORTFOLIO_LIMIT: i64 = 200;

// Earth radius in miles for the haversine distance computed in SQL.
const PORTFOLIO_SQL: &str = "\
SELECT p.id, p.address, p.list_price, p.sqft, p.bedrooms, p.bathrooms, p.listed_at, \
       CASE WHEN p.latitude IS NOT NULL AND p.longitude IS NOT NULL \
             AND s.latitude IS NOT NULL AND s.longitude IS NOT NULL \
            THEN 3958.8 * 2 * asin(sqrt( \
                 power(sin(radians(p.latitude - s.latitude) / 2), 2) \
                 + cos(radians(s.latitude)) * cos(radians(p.latitude)) \
                 * power(sin(radians(p.longitude - s.longitude) / 2), 2))) \
       END AS distance_mi \
FROM properties p \
JOIN properties s ON s.id = $1 \
WHERE p.id <> s.id \
  AND p.status = 'active' \
  AND p.city IS NOT DISTINCT FROM s.city \
  AND p.state IS NOT DISTINCT FROM s.state \
ORDER BY distance_mi ASC NULLS LAST, p.listed_at DESC NULLS LAST \
LIMIT $2";

#[derive(Debug, Clone)]
pub struct PgCompsStore {
    pool: sqlx::PgPool,
    portfolio_limit: i64,
}

impl PgCompsStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        let portfolio_limit = std::env::var("PORTFOLIO_COMPS_LIMIT")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PORTFOLIO_LIMIT);
        Self {
            pool,
            portfolio_limit,
        }
    }

    pub fn engine(self: Arc<Self>, settings: &Settings, config: EngineConfig) -> Result<CompsEngine> {
        let research = match settings.research_source_base_url.as_deref() {
            Some(base_url) => {
                let http = HttpResearchSource::from_settings(settings, config.loader_timeout)?;
                tracing::info!(%base_url, "research comps served over http");
                ResearchCompsLoader::new(Arc::new(http))
            }
            None => ResearchCompsLoader::new(self.clone()),
        };
        Ok(CompsEngine::new(
            self.clone(),
            research,
            HistoricalSalesLoader::new(self.clone()),
            PortfolioCompsLoader::new(self),
            config,
        ))
    }

    pub async fn active_property_ids(&self) -> Result<Vec<PropertyId>> {
        let rows: Vec<(PropertyId,)> =
            sqlx::query_as("SELECT id FROM properties WHERE status = 'active' ORDER BY id")
                .persistent(false)
                .fetch_all(&self.pool)
                .await
                .context("select active properties failed")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[async_trait::async_trait]
impl SubjectRepository for PgCompsStore {
    async fn get_subject(&self, property_id: PropertyId) -> Result<Option<SubjectProperty>> {
        let row = sqlx::query_as::<
            _,
            (
                PropertyId,
                String,
                Option<String>,
                Option<String>,
                f64,
                Option<i32>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
            ),
        >(
            "SELECT id, address, city, state, list_price, bedrooms, bathrooms, sqft, external_estimate \
             FROM properties \
             WHERE id = $1",
        )
        .persistent(false)
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select subject property failed (id={property_id})"))?;

        let Some((id, address, city, state, list_price, bedrooms, bathrooms, sqft, external_estimate)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(SubjectProperty {
            id,
            address,
            city,
            state,
            list_price,
            bedrooms: bedrooms.and_then(|b| u32::try_from(b).ok()),
            bathrooms,
            sqft,
            external_estimate,
        }))
    }
}

#[async_trait::async_trait]
impl ResearchCompsSource for PgCompsStore {
    async fn load_research_comps(&self, property_id: PropertyId) -> Result<Vec<Value>> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            "SELECT comps FROM research_comps \
             WHERE property_id = $1 \
             ORDER BY generated_at DESC \
             LIMIT 1",
        )
        .persistent(false)
        .bind(property_id)
        .fetch_optional(&self.pool)
        .await
        .context("select research_comps failed")?;

        let Some((comps,)) = row else {
            return Ok(Vec::new());
        };
        match comps {
            Value::Array(rows) => Ok(rows),
            other => anyhow::bail!(
                "research_comps payload is not an array (property_id={property_id}, got {})",
                json_kind(&other)
            ),
        }
    }
}

#[async_trait::async_trait]
impl HistoryCompsSource for PgCompsStore {
    async fn load_history_comps(&self, property_id: PropertyId) -> Result<Vec<Value>> {
        let rows = sqlx::query_as::<
            _,
            (
                Option<String>,
                String,
                String,
                Option<NaiveDate>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
                Option<f64>,
            ),
        >(
            "SELECT source_listing_id, address, event, event_date, price, sqft, bedrooms, bathrooms, distance_mi \
             FROM price_history \
             WHERE property_id = $1 \
             ORDER BY event_date DESC NULLS LAST",
        )
        .persistent(false)
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .context("select price_history failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(external_id, address, event, date, price, sqft, beds, baths, distance_mi)| {
                    json!({
                        "external_id": external_id,
                        "address": address,
                        "price": price,
                        "sqft": sqft,
                        "beds": beds,
                        "baths": baths,
                        "distance_mi": distance_mi,
                        "transaction_date": date,
                        "transaction_type": event,
                    })
                },
            )
            .collect())
    }
}

#[async_trait::async_trait]
impl PortfolioCompsSource for PgCompsStore {
    async fn load_portfolio_comps(&self, subject: &SubjectProperty) -> Result<Vec<Value>> {
        let rows = sqlx::query_as::<
            _,
            (
                PropertyId,
                String,
                f64,
                Option<f64>,
                Option<i32>,
                Option<f64>,
                Option<NaiveDate>,
                Option<f64>,
            ),
        >(PORTFOLIO_SQL)
        .persistent(false)
        .bind(subject.id)
        .bind(self.portfolio_limit)
        .fetch_all(&self.pool)
        .await
        .context("select portfolio comps failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, address, list_price, sqft, beds, baths, listed_at, distance_mi)| {
                    json!({
                        "external_id": id.to_string(),
                        "address": address,
                        "price": list_price,
                        "sqft": sqft,
                        "beds": beds,
                        "baths": baths,
                        "distance_mi": distance_mi,
                        "transaction_date": listed_at,
                    })
                },
            )
            .collect())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
