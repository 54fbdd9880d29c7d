//! Per-database pool configuration.

use std::collections::HashSet;

use serde_derive::{Deserialize, Serialize};

use super::User;
use crate::errors::Error;

/// One `[pools.<database>]` section.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct Pool {
    pub server_host: String,

    #[serde(default = "Pool::default_server_port")]
    pub server_port: u16,

    // Real database name on the server, defaults to the pool name.
    pub server_database: Option<String>,

    pub application_name: Option<String>,

    #[serde(default = "Pool::default_server_tls")]
    pub server_tls: bool,

    #[serde(default)]
    pub users: Vec<User>,
}

impl Pool {
    pub fn default_server_port() -> u16 {
        5432
    }

    pub fn default_server_tls() -> bool {
        false
    }

    pub fn validate(&self, pool_name: &str) -> Result<(), Error> {
        if self.users.is_empty() {
            return Err(Error::BadConfig(format!(
                "pool {pool_name} has no users configured"
            )));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            if !seen.insert(user.username.as_str()) {
                return Err(Error::BadConfig(format!(
                    "pool {pool_name} has user {} configured more than once",
                    user.username
                )));
            }
            user.validate()?;
        }

        Ok(())
    }
}
