use anyhow::Result;
use release_valet::{init_telemetry, router, AppState, ValetConfig};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    ValetConfig::load_env_file()?;
    init_telemetry()?;

    let config = Arc::new(ValetConfig::load()?);
    let state = AppState::from_config(Arc::clone(&config))?;
    let app = router(state);

    let listener = TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(addr = %config.server.bind_addr, "release-valet listening");
    axum::serve(listener, app).await?;

    Ok(())
}
