//! Configuration module for the connection pooler.
//!
//! Parses and validates the TOML configuration file and keeps the result
//! globally available.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::info;
use once_cell::sync::Lazy;
use serde_derive::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::errors::Error;

// Sub-modules
mod address;
mod general;
mod pool;
mod user;

#[cfg(test)]
mod tests;

// Re-exports
pub use address::Address;
pub use general::General;
pub use pool::Pool;
pub use user::{AuthMode, User};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Globally available configuration.
static CONFIG: Lazy<ArcSwap<Config>> = Lazy::new(|| ArcSwap::from_pointee(Config::default()));

/// Configuration wrapper.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(
        default = "Config::default_path",
        skip_serializing_if = "String::is_empty"
    )]
    pub path: String,

    // General and global settings.
    #[serde(default)]
    pub general: General,

    // Routes, one section per database, each with its own users.
    #[serde(default)]
    pub pools: HashMap<String, Pool>,
}

impl Config {
    pub fn default_path() -> String {
        String::from("pg_usher.toml")
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            path: Self::default_path(),
            general: General::default(),
            pools: HashMap::default(),
        }
    }
}

impl Config {
    /// Print the effective configuration.
    pub fn show(&self) {
        info!("Listening on {}:{}", self.general.host, self.general.port);
        info!("Worker threads: {}", self.general.worker_threads);
        info!("Connection timeout: {}ms", self.general.connect_timeout);
        info!(
            "Log client connections: {}",
            self.general.log_client_connections
        );
        info!(
            "Log client disconnections: {}",
            self.general.log_client_disconnections
        );
        match self.general.tls_certificate.clone() {
            Some(tls_certificate) => {
                info!("TLS certificate: {tls_certificate}");

                if let Some(tls_private_key) = self.general.tls_private_key.clone() {
                    info!("TLS private key: {tls_private_key}");
                }
            }
            None => {
                info!("TLS support is disabled");
            }
        };

        for (pool_name, pool) in &self.pools {
            info!(
                "[pool: {}] Server: {}:{}",
                pool_name, pool.server_host, pool.server_port
            );
            for user in &pool.users {
                info!(
                    "[pool: {}] User {}: auth mode {}",
                    pool_name, user.username, user.auth_mode
                );
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        // Validate TLS
        {
            if self.general.tls_certificate.is_none() && self.general.tls_private_key.is_some() {
                return Err(Error::BadConfig(
                    "tls_private_key is set but tls_certificate is not".to_string(),
                ));
            }

            if self.general.tls_certificate.is_some() && self.general.tls_private_key.is_none() {
                return Err(Error::BadConfig(
                    "tls_certificate is set but tls_private_key is not".to_string(),
                ));
            }

            if let (Some(tls_certificate), Some(tls_private_key)) = (
                self.general.tls_certificate.as_ref(),
                self.general.tls_private_key.as_ref(),
            ) {
                if let Err(err) = crate::app::tls::load_identity(
                    Path::new(tls_certificate),
                    Path::new(tls_private_key),
                ) {
                    return Err(Error::BadConfig(format!(
                        "tls is incorrectly configured: {err}"
                    )));
                }
            }
        }

        for (pool_name, pool) in &self.pools {
            pool.validate(pool_name)?;
        }

        Ok(())
    }
}

/// Get a read-only instance of the configuration
/// from anywhere in the app.
/// ArcSwap makes this cheap and quick.
pub fn get_config() -> Config {
    (*(*CONFIG.load())).clone()
}

async fn load_file(path: &str) -> Result<String, Error> {
    let mut contents = String::new();
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            return Err(Error::BadConfig(format!("Could not open '{path}': {err}")));
        }
    };
    match file.read_to_string(&mut contents).await {
        Ok(_) => (),
        Err(err) => {
            return Err(Error::BadConfig(format!(
                "Could not read config file: {err}"
            )));
        }
    };
    Ok(contents)
}

/// Parse the configuration file located at the path.
pub async fn parse(path: &str) -> Result<(), Error> {
    let contents = load_file(path).await?;

    let mut config: Config = toml::from_str(&contents)
        .map_err(|err| Error::BadConfig(format!("Could not parse config file {path}: {err}")))?;

    config.validate()?;

    config.path = path.to_string();

    // Update the configuration globally.
    CONFIG.store(Arc::new(config));

    Ok(())
}
