//! `parley serve`: start the HTTP API server.

use anyhow::Context;
use parley_config::AppConfig;

pub async fn run(mut config: AppConfig, port_override: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let service = super::build_service(&config).await?;

    println!("Parley gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Store:     {} ({})", config.store.backend, config.store.path);

    parley_gateway::start(service, &config.gateway)
        .await
        .context("Gateway failed")?;
    Ok(())
}
