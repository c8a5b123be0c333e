use std::sync::Arc;

use axum::extract::FromRef;
use tokio_util::sync::CancellationToken;

use crate::auth::{jwt::TokenService, repo::UserRepo};
use crate::config::AppConfig;
use crate::datasets::repo::DatasetRepo;
use crate::db::PgStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub datasets: Arc<dyn DatasetRepo>,
    pub tokens: TokenService,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn from_pg(config: Arc<AppConfig>, store: PgStore, shutdown: CancellationToken) -> Self {
        let store = Arc::new(store);
        Self::from_parts(config, store.clone(), store, shutdown)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        datasets: Arc<dyn DatasetRepo>,
        shutdown: CancellationToken,
    ) -> Self {
        let tokens = TokenService::from_config(&config.jwt);
        Self {
            config,
            users,
            datasets,
            tokens,
            shutdown,
        }
    }
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}
