use std::sync::Arc;

use crate::services::{providers::ProviderChain, Recommender, ServiceHandles};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    pub providers: Arc<ProviderChain>,
    pub providers_ready: bool,
}

impl AppState {
    pub fn new(services: ServiceHandles) -> Self {
        Self {
            recommender: Arc::new(Recommender::new(&services)),
            providers: services.providers.clone(),
            providers_ready: services.providers_ready,
        }
    }
}
