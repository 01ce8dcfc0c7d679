//! `gavel serve` — Start the HTTP gateway server.

use std::path::PathBuf;

pub async fn run(config_path: Option<PathBuf>, port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("Gavel gateway");
    println!("  Listening:  {}:{}", config.server.host, config.server.port);
    println!("  Data files: {}", config.data.files_dir.display());
    println!("  Model:      {}", config.provider.model);

    gavel_gateway::start(config)
        .await
        .map_err(|e| anyhow::anyhow!("gateway failed: {e}"))?;

    Ok(())
}
