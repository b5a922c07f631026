//! Serve command

use std::path::PathBuf;

use anyhow::{Context, Result};
use one_oauth::config::ProxyConfig;
use one_oauth::observability::{self, LogFormat};

/// Load configuration and run the proxy until shutdown
pub struct ServeCommand {
    config: PathBuf,
    port: Option<u16>,
    log_format: LogFormat,
}

impl ServeCommand {
    /// Create a new command instance
    pub const fn new(config: PathBuf, port: Option<u16>, log_format: LogFormat) -> Self {
        Self {
            config,
            port,
            log_format,
        }
    }

    /// Execute the command
    pub async fn execute(self) -> Result<()> {
        observability::init_with(self.log_format)?;

        let mut config = ProxyConfig::load(Some(&self.config))
            .with_context(|| format!("invalid configuration in {}", self.config.display()))?;
        if let Some(port) = self.port {
            config.server.port = port;
        }

        tracing::info!(config = %self.config.display(), "starting one-oauth");
        one_oauth::server::serve(&config).await
    }
}
