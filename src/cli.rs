//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, ConfigError, ProxyConfig};
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Forwarding HTTP/WebSocket proxy with CORS and redirect rewriting", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listen address, overriding `listener.bind_address`.
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Log level, overriding `observability.log_level`.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Load the configuration file (or defaults) and apply overrides.
    pub fn resolve_config(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
