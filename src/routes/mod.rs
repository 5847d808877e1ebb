pub mod health;
pub mod jobs;
pub mod webhooks;

use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::services::inbox::WebhookInbox;
use crate::services::queue::SharedQueue;
use crate::services::resolver::StatusResolver;
use crate::services::store::ResultStore;

/// Servizi condivisi, creati all'avvio e vivi per tutto il processo
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: ResultStore,
    pub inbox: WebhookInbox,
    pub queue: SharedQueue,
    pub resolver: StatusResolver,
}

impl AppState {
    pub fn new(config: Config, store: ResultStore, inbox: WebhookInbox, queue: SharedQueue) -> Self {
        let resolver = StatusResolver::new(store.clone(), queue.clone());
        Self {
            config: Arc::new(config),
            store,
            inbox,
            queue,
            resolver,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router(state.clone()))
        .merge(jobs::router(state.clone()))
        .merge(webhooks::router(state))
}
