//! Runtime configuration, resolved once at startup

use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::cli::{Cli, DATABASE_URL_ENV};
use crate::loader::LoadOptions;

/// Connection string used when neither the flag nor the env var is set
pub const DEFAULT_DATABASE_URL: &str = "sqlite://sfils.db?mode=rwc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub input: PathBuf,
    pub batch_size: usize,
    pub result_limit: usize,
    pub run_shell: bool,
}

impl Config {
    /// Collapse parsed arguments into a config, validating as we go
    pub fn resolve(cli: Cli) -> Result<Self> {
        let database_url = match cli.database_url.filter(|url| !url.trim().is_empty()) {
            Some(url) => url,
            None => {
                log::warn!(
                    "{} not set, using default connection string {}",
                    DATABASE_URL_ENV,
                    DEFAULT_DATABASE_URL
                );
                DEFAULT_DATABASE_URL.to_string()
            }
        };

        if cli.batch_size == 0 {
            bail!("--batch-size must be at least 1");
        }
        if cli.limit == 0 {
            bail!("--limit must be at least 1");
        }

        Ok(Self {
            database_url,
            input: cli.input,
            batch_size: cli.batch_size,
            result_limit: cli.limit,
            run_shell: !cli.no_shell,
        })
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            batch_size: self.batch_size,
        }
    }
}
