//! Configuration management for alertdispatch
//!
//! This module defines the main `Config` struct, responsible for holding all
//! application settings. It uses the `figment` crate to layer built-in
//! defaults, an `alertdispatch.toml` file, `ALERTDISPATCH_` environment
//! variables and command-line arguments, in that order.

use crate::cli::Cli;
use crate::core::ChannelConfig;
use crate::dispatch::DispatchSettings;
use crate::template::TemplateSet;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Base URL of the alerting UI, used for links in notifications.
    pub external_url: String,
    /// Product name shown to providers (e.g. VictorOps `monitoring_tool`).
    pub product_name: String,
    /// Product version shown next to the name.
    pub build_version: String,
    /// Delivery timeout for channels that don't set `timeout_secs`.
    pub default_timeout_secs: u64,
    /// Extra template files, loaded after the built-in templates.
    #[serde(default)]
    pub template_files: Vec<PathBuf>,
    /// Configured notification channels.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file named by
    /// `--config` (if any), environment variables and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            ensure_exists(path)?;
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            // Allow overriding with environment variables, e.g., ALERTDISPATCH_EXTERNAL_URL=...
            .merge(Env::prefixed("ALERTDISPATCH_"))
            .merge(cli)
            .extract()
            .context("failed to load configuration")?;
        Ok(config)
    }

    /// Loads defaults merged with the TOML file at `path` only.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        ensure_exists(path.as_ref())?;
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load {}", path.as_ref().display()))?;
        Ok(config)
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            external_url: self.external_url.clone(),
            product_name: self.product_name.clone(),
            product_version: self.build_version.clone(),
            default_timeout: Duration::from_secs(self.default_timeout_secs),
        }
    }

    /// Compiles the built-in templates plus `template_files`.
    pub fn templates(&self) -> Result<TemplateSet> {
        let templates = TemplateSet::builtin()?.with_files(&self.template_files)?;
        Ok(templates)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            external_url: "http://localhost:3000".to_string(),
            product_name: "alertdispatch".to_string(),
            build_version: env!("CARGO_PKG_VERSION").to_string(),
            default_timeout_secs: 30,
            template_files: vec![],
            channels: vec![],
        }
    }
}

/// `Toml::file` treats a missing file as empty; an explicitly named file
/// must exist.
fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("configuration file not found: {}", path.display());
    }
    Ok(())
}
