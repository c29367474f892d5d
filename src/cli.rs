//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the TOML file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Dispatches a batch of alerts to every configured notification channel.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON file holding the alert batch. Reads stdin when omitted.
    #[arg(short, long, value_name = "FILE")]
    pub batch: Option<PathBuf>,

    /// Base URL of the alerting UI.
    #[arg(long, value_name = "URL")]
    pub external_url: Option<String>,

    /// Default delivery timeout per channel, in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// Log level filter (e.g. "info", "alertdispatch=debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Only validate the configured channels and templates, don't dispatch.
    #[arg(long)]
    pub check: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(url) = &self.external_url {
            dict.insert("external_url".into(), Value::from(url.clone()));
        }

        if let Some(timeout) = self.timeout_secs {
            dict.insert("default_timeout_secs".into(), Value::from(timeout));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
