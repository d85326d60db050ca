use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use salonbook::config::{AppConfig, WorkHoursSource};
use salonbook::db::{self, SqliteSchedule};
use salonbook::handlers;
use salonbook::services::availability::WorkHoursProvider;
use salonbook::services::work_hours::WeeklyWorkHours;
use salonbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    anyhow::ensure!(
        config.work_day_start < config.work_day_end,
        "WORK_DAY_START must be before WORK_DAY_END"
    );

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));
    let schedule = SqliteSchedule::new(Arc::clone(&db));

    let work_hours: Box<dyn WorkHoursProvider> = match config.work_hours_source {
        WorkHoursSource::Weekly => {
            tracing::info!(
                "using weekly work hours {}-{}, rest day {}",
                config.work_day_start.format("%H:%M"),
                config.work_day_end.format("%H:%M"),
                config.rest_day
            );
            Box::new(WeeklyWorkHours::from_config(&config))
        }
        WorkHoursSource::Database => {
            tracing::info!("using per-date master schedules from the database");
            Box::new(schedule.clone())
        }
    };

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        work_hours,
        bookings: Box::new(schedule),
    });

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
