//! Errors.

/// Various errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("socket error: {0}")]
    SocketError(String),
    #[error("protocol synchronization error: {0}")]
    ProtocolSyncError(String),
    #[error("broken startup message from client")]
    ClientBadStartup,
    #[error("{0}")]
    ClientError(String),
    #[error("{0}")]
    AuthError(String),
    #[error("auth query failed: {0}")]
    AuthQueryError(String),
    #[error("{0} for {1}")]
    ServerAuthError(String, ServerIdentifier),
    #[error("error reading {0} on server startup {1}")]
    ServerStartupError(String, ServerIdentifier),
    #[error("bad configuration: {0}")]
    BadConfig(String),
    #[error("tls error: {0}")]
    TlsError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentifier {
    pub addr: String,
    pub application_name: String,
    pub username: String,
    pub database: String,
}

impl ClientIdentifier {
    pub fn new(
        application_name: &str,
        username: &str,
        database: &str,
        addr: &str,
    ) -> ClientIdentifier {
        ClientIdentifier {
            addr: addr.into(),
            application_name: application_name.into(),
            username: username.into(),
            database: database.into(),
        }
    }
}

impl std::fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let Self {
            addr,
            application_name,
            username,
            database,
        } = self;
        write!(
            f,
            "{{ {username}@{addr}/{database}?application_name={application_name} }}",
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentifier {
    pub username: String,
    pub database: String,
}

impl ServerIdentifier {
    pub fn new(username: String, database: &str) -> ServerIdentifier {
        ServerIdentifier {
            username,
            database: database.into(),
        }
    }
}

impl std::fmt::Display for ServerIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let Self { username, database } = self;
        write!(f, "{{ username: {username}, database: {database} }}")
    }
}
