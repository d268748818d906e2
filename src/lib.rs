pub mod api;
pub mod config;
pub mod context;
pub mod editor;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::routes::{create_router, ServerState};

pub use context::{AppContext, Backends};
pub use editor::{EditorCommand, EditorView, RecordEditor};
pub use error::{CoreError, ValidationErrors, ValidationIssue};
pub use logic::{RecordRef, ReferenceValidation};

// Export all model types
pub use model::*;

// Export store types
pub use store::{HttpBackend, InMemoryBackend, RecordBackend, RecordListStore, ReferenceSource};

/// Serve the reference backend for `state` on an already bound listener.
pub async fn serve_backend(listener: tokio::net::TcpListener, state: &ServerState) -> anyhow::Result<()> {
    let app = create_router(state);
    log::info!("Serving record collections on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
