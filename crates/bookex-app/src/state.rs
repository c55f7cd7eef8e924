use std::sync::Arc;

use bookex_dal::Pool;
use bookex_store::FileStore;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool, store: FileStore) -> Self {
        AppState {
            state: Arc::new(AppStateInner {
                app_config,
                pool,
                store,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub fn store(&self) -> &FileStore {
        &self.state.store
    }
}

struct AppStateInner {
    pool: Pool,
    store: FileStore,
    app_config: AppConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub upload_limit_mb: usize,
    /// URL prefix under which stored pictures are served
    pub media_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            upload_limit_mb: 10,
            media_url: "/media".to_string(),
        }
    }
}
