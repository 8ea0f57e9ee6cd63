use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::{Parser, ValueEnum};
use hnf1b_common::params::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageLimits};
use hnf1b_db::storage::{Storage, memory::MemoryStore, postgres::PgStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug, Parser)]
pub struct Hnf1bApiConfig {
    #[clap(
        short,
        long,
        env = "HNF1B_API_BIND_ADDR",
        default_value = "0.0.0.0:8000"
    )]
    pub bind_addr: SocketAddr,

    /// Origin allowed by CORS.
    #[clap(
        long,
        env = "HNF1B_API_PUBLIC_URL",
        default_value = "http://localhost:8000"
    )]
    pub public_url: String,

    #[clap(long, default_value_t = false)]
    pub dump_openapi: bool,

    #[clap(long, env = "HNF1B_API_STORAGE", value_enum, default_value = "postgres")]
    pub storage: StorageBackend,

    /// PostgreSQL connection URL, required for the `postgres` backend.
    #[clap(long, env = "HNF1B_API_DATABASE_URL")]
    pub database_url: Option<String>,

    #[clap(long, env = "HNF1B_API_POOL_SIZE", default_value_t = 10)]
    pub pool_size: u32,

    /// How long a request waits for a pooled connection, in milliseconds.
    #[clap(long, env = "HNF1B_API_POOL_TIMEOUT_MS", default_value_t = 30000)]
    pub pool_timeout_ms: u64,

    /// Per-statement timeout enforced by PostgreSQL, in milliseconds.
    #[clap(long, env = "HNF1B_API_STATEMENT_TIMEOUT_MS", default_value_t = 5000)]
    pub statement_timeout_ms: u64,

    #[clap(long, env = "HNF1B_API_DEFAULT_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub default_page_size: u64,

    /// Requests for larger pages are clamped to this size.
    #[clap(long, env = "HNF1B_API_MAX_PAGE_SIZE", default_value_t = MAX_PAGE_SIZE)]
    pub max_page_size: u64,

    /// JSON array of phenopackets loaded into the `memory` backend at startup.
    #[clap(long, env = "HNF1B_API_SEED_FILE")]
    pub seed_file: Option<PathBuf>,
}

impl Hnf1bApiConfig {
    pub fn page_limits(&self) -> anyhow::Result<PageLimits> {
        Ok(PageLimits::new(self.default_page_size, self.max_page_size)?)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    /// Connect to the configured storage backend.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the `postgres` backend is selected without a database URL
    /// - the database cannot be reached
    /// - the seed file cannot be read or parsed
    pub async fn connect_storage(&self) -> anyhow::Result<Arc<dyn Storage>> {
        match self.storage {
            StorageBackend::Postgres => {
                let url = self.database_url.as_deref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "no database URL configured (set HNF1B_API_DATABASE_URL or use --storage memory)"
                    )
                })?;
                let store = PgStore::connect(
                    url,
                    self.pool_size,
                    self.pool_timeout(),
                    self.statement_timeout(),
                )
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to connect to PostgreSQL: {}", e))?;
                Ok(Arc::new(store))
            }
            StorageBackend::Memory => {
                let store = match &self.seed_file {
                    Some(path) => MemoryStore::load_json(path)
                        .await
                        .map_err(|e| anyhow::anyhow!("failed to load seed file: {}", e))?,
                    None => MemoryStore::default(),
                };
                Ok(Arc::new(store))
            }
        }
    }
}
