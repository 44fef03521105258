use anyhow::Context;
use clap::Parser;
use comps_core::engine::{CompsEngine, EngineConfig};
use comps_core::sources::memory::InMemoryStore;
use comps_core::storage::PgCompsStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod run;

#[derive(Debug, Parser)]
#[command(name = "comps_worker")]
struct Args {
    /// Subject property to analyze. Repeatable.
    #[arg(long = "property-id")]
    property_ids: Vec<Uuid>,

    /// Analyze every active property (ignored when --property-id is given).
    #[arg(long)]
    all: bool,

    /// Which slice of the dashboard to print.
    #[arg(long, value_enum, default_value_t = run::View::Full)]
    view: run::View,

    /// As-of date (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Read subjects and comps from a JSON fixture instead of the database.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Do everything except writing snapshots to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = comps_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let as_of_date = resolve_as_of_date(args.as_of_date.as_deref())?;
    let config = EngineConfig::from_env();

    if let Some(path) = &args.fixture {
        let store = InMemoryStore::load_fixture(path)?;
        let targets = run::select_targets(&args.property_ids, args.all, store.subject_ids())?;
        let engine = CompsEngine::from_store(Arc::new(store), config);
        tracing::info!(%as_of_date, fixture = %path.display(), targets = targets.len(), "comps run from fixture");

        for property_id in targets {
            let dashboard = engine
                .full_dashboard(property_id, as_of_date)
                .await
                .with_context(|| format!("comps run failed (property_id={property_id})"))?;
            println!("{}", run::render(args.view, dashboard)?);
        }
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    comps_core::storage::migrate(&pool).await?;

    let store = Arc::new(PgCompsStore::new(pool.clone()));
    let known = if args.property_ids.is_empty() && args.all {
        store.active_property_ids().await?
    } else {
        Vec::new()
    };
    let targets = run::select_targets(&args.property_ids, args.all, known)?;
    let engine = store.engine(&settings, config)?;

    // Held for the whole run; the lock lives on this session.
    let mut lock_conn = pool.acquire().await.context("acquire lock connection failed")?;
    if !args.dry_run {
        let acquired =
            comps_core::storage::lock::try_acquire_snapshot_lock(&mut lock_conn, as_of_date)
                .await?;
        if !acquired {
            tracing::warn!(%as_of_date, "snapshot lock not acquired; another run in progress");
            return Ok(());
        }
    }

    let mut failures = 0usize;
    for property_id in &targets {
        let property_id = *property_id;
        let generated_at = chrono::Utc::now();

        match engine.full_dashboard(property_id, as_of_date).await {
            Ok(dashboard) => {
                if args.dry_run {
                    tracing::info!(%property_id, %as_of_date, dry_run = true, "snapshot not persisted");
                } else {
                    let snapshot_id = comps_core::storage::snapshots::persist_success(
                        &pool,
                        &dashboard,
                        generated_at,
                    )
                    .await?;
                    tracing::info!(%property_id, %as_of_date, %snapshot_id, "persisted comps snapshot");
                }
                println!("{}", run::render(args.view, dashboard)?);
            }
            Err(err) => {
                failures += 1;
                let err = anyhow::Error::new(err);
                sentry_anyhow::capture_anyhow(&err);
                if !args.dry_run {
                    let snapshot_id = comps_core::storage::snapshots::persist_failure(
                        &pool,
                        property_id,
                        as_of_date,
                        generated_at,
                        &format!("{err:#}"),
                    )
                    .await?;
                    tracing::error!(%property_id, %snapshot_id, error = %format!("{err:#}"), "comps run failed");
                } else {
                    tracing::error!(%property_id, error = %format!("{err:#}"), "comps run failed");
                }
            }
        }
    }

    if !args.dry_run {
        let _ =
            comps_core::storage::lock::release_snapshot_lock(&mut lock_conn, as_of_date).await;
    }

    tracing::info!(%as_of_date, targets = targets.len(), failures, "comps run finished");
    Ok(())
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

fn resolve_as_of_date(as_of_date_arg: Option<&str>) -> anyhow::Result<chrono::NaiveDate> {
    match as_of_date_arg {
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of-date {s:?}; expected YYYY-MM-DD")),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}
