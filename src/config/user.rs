//! Per-route user configuration.

use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::errors::Error;

/// Authentication mode for a route.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Admit the client without a challenge.
    None,
    /// Plaintext password exchange.
    Cleartext,
    /// MD5 challenge/response.
    Md5,
    /// TLS client certificate common name check.
    Cert,
    /// Reject the user outright.
    #[default]
    Block,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::None => write!(f, "none"),
            AuthMode::Cleartext => write!(f, "cleartext"),
            AuthMode::Md5 => write!(f, "md5"),
            AuthMode::Cert => write!(f, "cert"),
            AuthMode::Block => write!(f, "block"),
        }
    }
}

/// A route user.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct User {
    pub username: String,

    #[serde(default)]
    pub auth_mode: AuthMode,

    pub password: Option<String>,

    // Stored-password lookup against a backend instead of static config.
    pub auth_query: Option<String>,
    pub auth_query_user: Option<String>,
    pub auth_query_password: Option<String>,
    pub auth_query_database: Option<String>,

    // Common names accepted in cert mode. The default flag also accepts
    // the route's own user name.
    #[serde(default)]
    pub auth_common_name_default: bool,
    #[serde(default)]
    pub auth_common_names: Vec<String>,

    // If server_username is specified, authorization on the server is
    // performed with THIS server_username and server_password.
    pub server_username: Option<String>,
    pub server_password: Option<String>,

    #[serde(default = "User::default_pool_size")]
    pub pool_size: u32,
}

impl Default for User {
    fn default() -> User {
        User {
            username: String::from("postgres"),
            auth_mode: AuthMode::default(),
            password: None,
            auth_query: None,
            auth_query_user: None,
            auth_query_password: None,
            auth_query_database: None,
            auth_common_name_default: false,
            auth_common_names: Vec::new(),
            server_username: None,
            server_password: None,
            pool_size: Self::default_pool_size(),
        }
    }
}

impl User {
    pub fn default_pool_size() -> u32 {
        40
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self.auth_mode {
            AuthMode::Cleartext | AuthMode::Md5 => {
                if self.password.is_none() && self.auth_query.is_none() {
                    return Err(Error::BadConfig(format!(
                        "user {} has auth mode {} but neither password nor auth_query",
                        self.username, self.auth_mode
                    )));
                }
            }
            AuthMode::Cert => {
                if !self.auth_common_name_default && self.auth_common_names.is_empty() {
                    return Err(Error::BadConfig(format!(
                        "user {} has auth mode cert but no accepted common names",
                        self.username
                    )));
                }
            }
            AuthMode::None | AuthMode::Block => {}
        }

        if self.auth_query.is_some() && self.auth_query_user.is_none() {
            return Err(Error::BadConfig(format!(
                "user {} has auth_query but no auth_query_user",
                self.username
            )));
        }

        if (self.server_password.is_some() && self.server_username.is_none())
            || (self.server_password.is_none() && self.server_username.is_some())
        {
            return Err(Error::BadConfig(
                "both the server_password and server_username must be specified at the same time"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
