//! Configuration check command

use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use one_oauth::config::ProxyConfig;
use one_oauth::registry::Registry;

/// Validate a configuration file without binding a port
pub struct CheckCommand {
    config: PathBuf,
}

impl CheckCommand {
    /// Create a new command instance
    pub const fn new(config: PathBuf) -> Self {
        Self { config }
    }

    /// Execute the command
    pub fn execute(&self) -> Result<()> {
        let routes = self.routes()?;

        println!(
            "{} {}",
            style("Valid").green().bold(),
            style(self.config.display()).bold()
        );
        println!();
        for route in routes {
            println!("  {}", style(route).cyan());
        }

        Ok(())
    }

    /// Routes the configuration would mount
    pub fn routes(&self) -> Result<Vec<String>> {
        let config = ProxyConfig::load(Some(&self.config))
            .with_context(|| format!("invalid configuration in {}", self.config.display()))?;
        let registry = Registry::from_config(&config)?;
        Ok(registry.routes())
    }
}
