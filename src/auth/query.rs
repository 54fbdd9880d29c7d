//! Stored-password lookup against a backend ("auth query").
//!
//! Borrows a dedicated connection to the route's server under the
//! configured auth-query user, runs the lookup for the connecting client,
//! and hands the fetched password to the caller. The connection is
//! released on every path.

use std::time::Duration;

use log::debug;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::NoTls;

use super::Password;
use crate::config::get_config;
use crate::errors::Error;
use crate::pool::Route;

/// Fetch the stored password for `client_user` via the route's auth query.
pub(crate) async fn fetch_stored_password(
    route: &Route,
    client_user: &str,
) -> Result<Password, Error> {
    let user = &route.settings.user;

    let Some(query) = user.auth_query.as_deref() else {
        return Err(Error::AuthQueryError("auth_query is not configured".into()));
    };
    let Some(auth_user) = user.auth_query_user.as_deref() else {
        return Err(Error::AuthQueryError(
            "auth_query_user is not configured".into(),
        ));
    };
    let database = user
        .auth_query_database
        .as_deref()
        .unwrap_or(&route.settings.server_database);

    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&route.address.host)
        .port(route.address.port)
        .user(auth_user)
        .dbname(database)
        .application_name("pg_usher (auth query)")
        .connect_timeout(Duration::from_millis(get_config().general.connect_timeout));
    if let Some(password) = user.auth_query_password.as_deref() {
        pg_config.password(password);
    }

    let client = if route.settings.server_tls {
        let connector = TlsConnector::builder()
            .build()
            .map_err(|err| Error::AuthQueryError(format!("tls connector: {err}")))?;
        let (client, connection) = pg_config
            .connect(MakeTlsConnector::new(connector))
            .await
            .map_err(|err| Error::AuthQueryError(format!("connect: {err}")))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!("auth query connection closed: {err}");
            }
        });
        client
    } else {
        let (client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|err| Error::AuthQueryError(format!("connect: {err}")))?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                debug!("auth query connection closed: {err}");
            }
        });
        client
    };

    // The client handle is dropped on every path below, which hangs up
    // the borrowed connection.
    let row = client
        .query_opt(query, &[&client_user])
        .await
        .map_err(|err| Error::AuthQueryError(format!("lookup: {err}")))?
        .ok_or_else(|| Error::AuthQueryError(format!("no stored password for {client_user}")))?;

    // The lookup returns (usename, passwd) or a single passwd column.
    let column = if row.len() > 1 { 1 } else { 0 };
    let password: String = row
        .try_get(column)
        .map_err(|err| Error::AuthQueryError(format!("bad result row: {err}")))?;

    Ok(Password::new(password.into_bytes()))
}
