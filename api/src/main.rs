use std::sync::Arc;

use clap::Parser;
use hnf1b_api::{config::Hnf1bApiConfig, server};
use hnf1b_db::storage::memory::MemoryStore;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Hnf1bApiConfig::parse();

    if config.dump_openapi {
        let (_, api) = server::make(config, Arc::new(MemoryStore::default()))?;
        print!("{}", api.to_pretty_json()?);
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or("hnf1b_api=info,hnf1b_common=info,hnf1b_db=info".into()),
        )
        .pretty()
        .init();

    let db = config.connect_storage().await?;
    let (router, _) = server::make(config.clone(), db)?;

    let listener = TcpListener::bind(config.bind_addr).await?;

    info!(storage = ?config.storage, "Listening on http://{:?}", config.bind_addr);

    axum::serve(listener, router).await?;
    Ok(())
}
