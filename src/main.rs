mod coerce;
mod config;
mod errors;
mod logger;
mod models;
mod ollama;
mod prompt;
mod router;
mod schema;
mod validation;

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use tracing::info;

use ollama::OllamaClient;
use router::{run_router, RouterState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  let config = config::from_env().context("loading configuration")?;
  logger::init(config.log_path.as_deref().map(Path::new)).context("initializing logging")?;

  let gateway_config = config.gateway()?;
  let gateway = OllamaClient::new(&gateway_config).context("building model client")?;

  let listener = tokio::net::TcpListener::bind(&config.bind_addr)
    .await
    .with_context(|| format!("binding {}", config.bind_addr))?;
  info!(
    addr = %listener.local_addr()?,
    backend = %gateway_config.chat_url,
    model = %gateway_config.model,
    schema = schema::SCHEMA_VERSION,
    "CodeOps backend listening"
  );

  let state = RouterState {
    started_at: Instant::now(),
    gateway,
  };
  run_router(listener, state).await
}
