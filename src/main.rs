use std::sync::Arc;

use dailycard_mcp::{
    build_app, config::Config, domain::resources::WidgetTemplate, logging, mcp::engine::McpEngine,
    AppState,
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let widget = WidgetTemplate::load(&config.widget_path)
        .await
        .inspect_err(|err| {
            error!(
                path = %config.widget_path.display(),
                error = %err,
                "failed to load widget bundle"
            )
        })?;

    let bind_socket = config.bind_socket()?;
    let state =
        AppState::new(Arc::new(McpEngine::new(widget))).with_max_body_bytes(config.max_body_bytes);
    let session = state.sessions.ensure_connected().await?;
    info!(session_id = %session.id(), "initial session ready");

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(bind_socket).await?;

    info!(
        bind_addr = %config.bind_addr,
        bind_port = config.bind_port,
        max_body_bytes = config.max_body_bytes,
        endpoint = "/mcp",
        "server starting"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
