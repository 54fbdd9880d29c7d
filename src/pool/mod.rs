//! Route registry.
//!
//! A route is the resolved policy for one (database, user) pair: where the
//! server lives, how clients authenticate, and the admission accounting
//! for the route's clients.

pub mod clients;

pub use clients::{ClientPool, ClientState, ProcessId};

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use arc_swap::ArcSwap;
use log::info;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::config::{get_config, Address, User};

pub type RouteMap = HashMap<RouteIdentifier, Arc<Route>>;

/// All configured routes, globally available.
/// This is atomic and safe and read-optimized.
/// The registry is recreated when the configuration is loaded.
pub static ROUTES: Lazy<ArcSwap<RouteMap>> = Lazy::new(|| ArcSwap::from_pointee(HashMap::default()));

/// An identifier for a route.
#[derive(Hash, Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteIdentifier {
    // The name of the database clients want to connect to.
    pub db: String,

    // The username the client connects with. Each user gets its own route.
    pub user: String,
}

impl RouteIdentifier {
    pub fn new(db: &str, user: &str) -> RouteIdentifier {
        RouteIdentifier {
            db: db.to_string(),
            user: user.to_string(),
        }
    }
}

impl Display for RouteIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user, self.db)
    }
}

/// Route settings resolved from configuration.
#[derive(Clone, Debug)]
pub struct RouteSettings {
    /// Authentication policy and credentials.
    pub user: User,

    /// Database name clients ask for.
    pub db: String,

    /// Database name on the server.
    pub server_database: String,

    /// application_name presented to the server.
    pub application_name: String,

    /// Dial the server over TLS.
    pub server_tls: bool,
}

/// One resolved route.
#[derive(Debug)]
pub struct Route {
    /// The server address (host, port).
    pub address: Address,

    /// Route policy.
    pub settings: RouteSettings,

    /// Admission accounting for this route's clients.
    pub clients: Mutex<ClientPool>,
}

/// Build the route registry from the configuration.
pub fn from_config() {
    let config = get_config();

    let mut new_routes = RouteMap::new();

    for (pool_name, pool_config) in &config.pools {
        let server_database = pool_config
            .server_database
            .clone()
            .unwrap_or_else(|| pool_name.clone());

        let application_name = pool_config
            .application_name
            .clone()
            .unwrap_or_else(|| "pg_usher".to_string());

        for user in &pool_config.users {
            let identifier = RouteIdentifier::new(pool_name, &user.username);
            info!("[route: {identifier}] auth mode: {}", user.auth_mode);

            let address = Address {
                host: pool_config.server_host.clone(),
                port: pool_config.server_port,
                database: pool_name.clone(),
                username: user.username.clone(),
            };

            let route = Route {
                address,
                settings: RouteSettings {
                    user: user.clone(),
                    db: pool_name.clone(),
                    server_database: server_database.clone(),
                    application_name: application_name.clone(),
                    server_tls: pool_config.server_tls,
                },
                clients: Mutex::new(ClientPool::new()),
            };

            new_routes.insert(identifier, Arc::new(route));
        }
    }

    ROUTES.store(Arc::new(new_routes));
}

/// Look up the route for a (database, user) pair.
pub fn get_route(db: &str, user: &str) -> Option<Arc<Route>> {
    (*(*ROUTES.load()))
        .get(&RouteIdentifier::new(db, user))
        .cloned()
}
