use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use comps_core::domain::dashboard::{DashboardResult, RentalsDashboard, SalesDashboard};
use comps_core::domain::property::PropertyId;
use comps_core::engine::{CompsEngine, EngineConfig};
use comps_core::error::EngineError;
use comps_core::storage::PgCompsStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = comps_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match comps_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let engine = match &pool {
        Some(pool) => {
            let store = Arc::new(PgCompsStore::new(pool.clone()));
            match store.engine(&settings, EngineConfig::from_env()) {
                Ok(engine) => Some(Arc::new(engine)),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "comps engine setup failed; starting API in degraded mode");
                    None
                }
            }
        }
        None => None,
    };

    let state = AppState { engine, pool };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/properties/:property_id/comps", get(get_full_dashboard))
        .route("/properties/:property_id/comps/sales", get(get_sales_dashboard))
        .route(
            "/properties/:property_id/comps/rentals",
            get(get_rentals_dashboard),
        )
        .route(
            "/properties/:property_id/comps/snapshots/latest",
            get(get_latest_snapshot),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    engine: Option<Arc<CompsEngine>>,
    pool: Option<PgPool>,
}

#[derive(Debug, Default, Deserialize)]
struct AsOfQuery {
    as_of_date: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiSnapshot {
    snapshot_id: Uuid,
    generated_at: DateTime<Utc>,
    dashboard: DashboardResult,
}

fn parse_property_id(raw: &str) -> Result<PropertyId, StatusCode> {
    Uuid::parse_str(raw).map_err(|_| StatusCode::BAD_REQUEST)
}

fn parse_as_of_date(query: &AsOfQuery) -> Result<NaiveDate, StatusCode> {
    match query.as_of_date.as_deref() {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST),
        None => Ok(Utc::now().date_naive()),
    }
}

fn engine_error_status(err: EngineError) -> StatusCode {
    match err {
        EngineError::SubjectNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Repository(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %format!("{e:#}"), "subject lookup failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn request_inputs(
    state: &AppState,
    property_id: &str,
    query: &AsOfQuery,
) -> Result<(Arc<CompsEngine>, PropertyId, NaiveDate), StatusCode> {
    let Some(engine) = &state.engine else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    let property_id = parse_property_id(property_id)?;
    let as_of_date = parse_as_of_date(query)?;
    Ok((engine.clone(), property_id, as_of_date))
}

async fn get_full_dashboard(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<DashboardResult>, StatusCode> {
    let (engine, property_id, as_of_date) = request_inputs(&state, &property_id, &query)?;
    let dashboard = engine
        .full_dashboard(property_id, as_of_date)
        .await
        .map_err(engine_error_status)?;
    Ok(Json(dashboard))
}

async fn get_sales_dashboard(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<SalesDashboard>, StatusCode> {
    let (engine, property_id, as_of_date) = request_inputs(&state, &property_id, &query)?;
    let dashboard = engine
        .sales_dashboard(property_id, as_of_date)
        .await
        .map_err(engine_error_status)?;
    Ok(Json(dashboard))
}

async fn get_rentals_dashboard(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<Json<RentalsDashboard>, StatusCode> {
    let (engine, property_id, as_of_date) = request_inputs(&state, &property_id, &query)?;
    let dashboard = engine
        .rentals_dashboard(property_id, as_of_date)
        .await
        .map_err(engine_error_status)?;
    Ok(Json(dashboard))
}

async fn get_latest_snapshot(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> Result<Json<ApiSnapshot>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    let property_id = parse_property_id(&property_id)?;

    let stored = comps_core::storage::snapshots::fetch_latest_snapshot(pool, property_id)
        .await
        .map_err(|e| {
            sentry_anyhow::capture_anyhow(&e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(ApiSnapshot {
        snapshot_id: stored.id,
        generated_at: stored.generated_at,
        dashboard: stored.dashboard,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &comps_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
