use axum::{routing::get, Router};
use std::sync::Arc;

use crate::api::handlers;
use crate::model::{Behavior, EditableRecord, Entity, Module};
use crate::store::memory::InMemoryBackend;

/// Backing collections of the reference server, one per record kind.
#[derive(Debug, Clone, Default)]
pub struct ServerState {
    pub entities: Arc<InMemoryBackend<Entity>>,
    pub modules: Arc<InMemoryBackend<Module>>,
    pub behaviors: Arc<InMemoryBackend<Behavior>>,
}

pub fn create_router(state: &ServerState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .nest(
            &format!("/{}", Entity::KIND.collection()),
            collection_router(state.entities.clone()),
        )
        .nest(
            &format!("/{}", Module::KIND.collection()),
            collection_router(state.modules.clone()),
        )
        .nest(
            &format!("/{}", Behavior::KIND.collection()),
            collection_router(state.behaviors.clone()),
        )
}

/// Collection endpoints of one record kind, addressed by business key.
pub fn collection_router<R: EditableRecord>(collection: Arc<InMemoryBackend<R>>) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::list_records::<R>).post(handlers::create_record::<R>),
        )
        .route(
            "/:key",
            get(handlers::get_record::<R>)
                .put(handlers::update_record::<R>)
                .delete(handlers::delete_record::<R>),
        )
        .with_state(collection)
}
