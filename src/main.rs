use ecs_editor_rust::config::AppConfig;
use ecs_editor_rust::{seed, serve_backend, ServerState};
use log::info;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("ECS editor: reference record backend");

    let config = AppConfig::load()?;
    info!(
        "Configuration loaded: server={}:{}",
        config.server.host, config.server.port
    );

    let state = ServerState::default();

    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        info!("Loading seed data...");
        seed::load_seed_data(&state)?;
    }

    let listener = TcpListener::bind(config.server_address()).await?;
    serve_backend(listener, &state).await?;

    Ok(())
}
