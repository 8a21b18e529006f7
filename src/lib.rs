//! SD Bridge Gateway
//!
//! Exposes a Stable-Diffusion-style image API and forwards each request to
//! one of a pool of chat-completion backends, with sticky endpoint selection,
//! quota rotation, ban handling, retries and failover.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pool;
pub mod translator;

pub use error::{AppError, Result};

use std::sync::Arc;

use backend::{ChatBackend, ImageFetcher};
use gateway::{BanSweeper, CallOrchestrator};
use pool::{EndpointRegistry, PoolStore};
use translator::Translator;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<crate::config::Settings>,
    pub registry: Arc<EndpointRegistry>,
    pub orchestrator: Arc<CallOrchestrator>,
    pub translator: Arc<Translator>,
    pub ban_sweeper: Arc<BanSweeper>,
}

impl AppState {
    /// Wire the registry, orchestrator and translator around one backend
    pub fn new<B>(settings: crate::config::Settings, store: Arc<dyn PoolStore>, backend: Arc<B>) -> Self
    where
        B: ChatBackend + ImageFetcher + 'static,
    {
        let registry = Arc::new(EndpointRegistry::new(store));
        let orchestrator = Arc::new(CallOrchestrator::new(registry.clone(), backend.clone()));
        let translator = Arc::new(Translator::new(backend));
        let ban_sweeper = Arc::new(BanSweeper::new(registry.clone()));

        Self {
            settings: Arc::new(settings),
            registry,
            orchestrator,
            translator,
            ban_sweeper,
        }
    }
}
