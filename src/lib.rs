use std::sync::Arc;

use config::Config;
use generation::GenerationService;
use sqlx::PgPool;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod generation;
pub mod middleware;
pub mod result;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub generation: Arc<GenerationService>,
}
