use anyhow::Context;
use fritz_api::{app, worker, AppState};
use fritz_booking::HoldPolicy;
use fritz_catalog::{FareCalculator, FareConfig};
use fritz_store::{Config, DbClient, PostgresReservationRepository, PostgresTimetableRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fritz_api=debug,fritz_booking=debug,fritz_store=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting FritzLine API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let timetable = Arc::new(PostgresTimetableRepository::new(db.pool.clone()));
    let reservations = Arc::new(PostgresReservationRepository::new(
        db.pool.clone(),
        Duration::from_millis(config.reservations.lock_timeout_ms),
    ));

    let holds = HoldPolicy::from_ttl_seconds(config.reservations.hold_ttl_seconds)
        .context("Invalid reservations.hold_ttl_seconds")?;
    let sweeps = holds.ttl.is_some();

    let fares = FareCalculator::new(FareConfig {
        rounding_unit: config.fares.rounding_unit,
    })
    .context("Invalid fares.rounding_unit")?;

    let state = AppState::new(timetable, reservations, fares, holds);

    if sweeps {
        worker::spawn_hold_sweeper(
            state.reservations.clone(),
            Duration::from_secs(config.reservations.sweep_interval_seconds.max(1)),
        );
    }

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
