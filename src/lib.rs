//! Libris library loan server
//!
//! A REST JSON API for a small library: a book catalog, a borrower
//! directory, and the loan lifecycle tying them together.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub repository: repository::Repository,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repository: repository::Repository,
        clock: Arc<dyn services::clock::Clock>,
    ) -> Self {
        let services = services::Services::new(repository.clone(), &config.loans, clock);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            repository,
        }
    }
}
