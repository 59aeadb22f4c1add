//! Application state shared across handlers

use std::sync::Arc;

use crate::repositories::GeocacheRepository;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn GeocacheRepository>,
}

impl AppState {
    pub fn new(repository: Arc<dyn GeocacheRepository>) -> Self {
        Self { repository }
    }
}
