// storefront/src/main.rs

use std::sync::Arc;

use actix_web::{web as actix_data, App, HttpServer};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use storefront::config::{AppConfig, LogFormat};
use storefront::db::{MemoryStore, PgStore, Store};
use storefront::services::token_service::TokenService;
use storefront::state::AppState;
use storefront::web::configure_app_routes;

fn init_tracing(format: LogFormat) {
  // RUST_LOG overrides the default level.
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

async fn build_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
  if config.uses_memory_store() {
    tracing::warn!("Using the in-memory store; data is lost on shutdown.");
    return Ok(Arc::new(MemoryStore::from_config(config)));
  }

  let store = PgStore::connect(config).await?;
  if config.run_migrations {
    store.run_migrations().await?;
  }
  Ok(Arc::new(store))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let app_config = AppConfig::from_env()?;
  init_tracing(app_config.log_format);
  tracing::info!("Starting storefront server...");

  let store = build_store(&app_config).await.inspect_err(|e| {
    tracing::error!(error = %e, "Failed to initialise the store.");
  })?;
  let app_state = AppState::new(store, TokenService::from_config(&app_config));

  let server_address = app_config.server_address();
  tracing::info!("Attempting to bind server to {}...", server_address);

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(tracing_actix_web::TracingLogger::default())
      .configure(configure_app_routes)
  })
  .bind(&server_address)?
  .run()
  .await?;

  tracing::info!("Server stopped.");
  Ok(())
}
