use clap::Parser;
use portal_server::{
    app_config::{init_console_subscriber, AppConfig},
    app_env::AppEnv,
    service,
};
use std::sync::Arc;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_console_subscriber();
    let cli = AppConfig::parse();
    debug!("{}", serde_json::to_string_pretty(&cli)?);

    let app_env = {
        let e = AppEnv::new(&cli)?;
        Arc::new(e)
    };

    let (_, handle) = service::serve(app_env, cli.listen_addr()).await?;

    // Keep the server running until Ctrl+C is pressed
    tokio::signal::ctrl_c().await?;

    handle.stop()?;
    info!("JSON-RPC server stopped");

    Ok(())
}
