use std::sync::Arc;

use hnf1b_db::{pagination::Paginator, storage::Storage};

#[derive(Clone)]
pub struct ApiContext {
    pub _config: crate::config::Hnf1bApiConfig,
    pub db: Arc<dyn Storage>,
    pub paginator: Arc<Paginator>,
}

impl ApiContext {
    pub fn new(
        config: crate::config::Hnf1bApiConfig,
        db: Arc<dyn Storage>,
        paginator: Paginator,
    ) -> Self {
        Self {
            _config: config,
            db,
            paginator: Arc::new(paginator),
        }
    }
}
