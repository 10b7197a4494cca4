//! `delve serve`: Start the HTTP gateway.

use delve_config::AppConfig;
use std::sync::Arc;

use super::build_context;

pub async fn run(
    mut config: AppConfig,
    port_override: Option<u16>,
    ephemeral: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let ctx = build_context(&config, ephemeral).await?;

    println!("Delve Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.default_model);
    if ephemeral {
        println!("   Store:     in-memory");
    } else {
        println!("   Store:     {}", config.store.path.display());
    }

    delve_gateway::serve(Arc::new(ctx)).await
}
