//! Frontend authentication.
//!
//! Drives the handshake with a freshly routed client to AuthenticationOk
//! or a terminal ErrorResponse, according to the route's auth mode.

mod query;

#[cfg(test)]
mod mocks;

// External crate imports
use bytes::BytesMut;
use log::{error, info};
use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncWrite};

// Internal crate imports
use crate::config::AuthMode;
use crate::errors::{ClientIdentifier, Error};
use crate::messages::{
    auth_ok, error_response_terminal, md5_challenge, md5_hash_password, password_from_message,
    plain_password_challenge, read_password_message, SQLSTATE_INVALID_AUTHORIZATION,
    SQLSTATE_INVALID_PASSWORD, SQLSTATE_PROTOCOL_VIOLATION,
};
use crate::pool::Route;

/// Interface the cert mode uses to check the negotiated client
/// certificate. Implemented by the TLS layer; the authentication code
/// never parses X.509 itself.
pub trait VerifyCommonName: Sync {
    fn verify_common_name(&self, expected: &str) -> bool;
}

/// An owned password buffer. Fetched credentials are scrubbed before the
/// buffer is freed.
pub struct Password(Vec<u8>);

impl Password {
    pub(crate) fn new(bytes: Vec<u8>) -> Password {
        Password(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        for byte in self.0.iter_mut() {
            // SAFETY: the pointer comes from a live &mut element; the
            // volatile write keeps the scrub from being elided.
            unsafe { std::ptr::write_volatile(byte, 0) };
        }
    }
}

/// Reference password for a handshake: borrowed from static route
/// configuration, or owned when it came back from the auth query.
enum StoredPassword<'a> {
    Config(&'a str),
    Fetched(Password),
}

impl StoredPassword<'_> {
    fn as_bytes(&self) -> &[u8] {
        match self {
            StoredPassword::Config(password) => password.as_bytes(),
            StoredPassword::Fetched(password) => password.as_bytes(),
        }
    }
}

/// Authenticate a routed client whose StartupMessage has been read.
///
/// On success the last message written is AuthenticationOk. On failure an
/// ErrorResponse has been written before the error is returned, unless the
/// socket itself failed.
pub async fn authenticate<S, T>(
    read: &mut S,
    write: &mut T,
    tls: Option<&dyn VerifyCommonName>,
    salt_key: u32,
    client_identifier: &ClientIdentifier,
    route: &Route,
) -> Result<(), Error>
where
    S: AsyncRead + std::marker::Unpin,
    T: AsyncWrite + std::marker::Unpin,
{
    match route.settings.user.auth_mode {
        AuthMode::None => {}
        AuthMode::Block => return reject_blocked_user(write, client_identifier).await,
        AuthMode::Cleartext => {
            authenticate_cleartext(read, write, client_identifier, route).await?
        }
        AuthMode::Md5 => authenticate_md5(read, write, salt_key, client_identifier, route).await?,
        AuthMode::Cert => authenticate_cert(write, tls, client_identifier, route).await?,
    }

    auth_ok(write).await
}

async fn reject_blocked_user<T>(
    write: &mut T,
    client_identifier: &ClientIdentifier,
) -> Result<(), Error>
where
    T: AsyncWrite + std::marker::Unpin,
{
    info!("user {client_identifier} is blocked");
    error_response_terminal(write, "user blocked", SQLSTATE_INVALID_AUTHORIZATION).await?;
    Err(Error::AuthError(format!(
        "user {client_identifier} is blocked"
    )))
}

async fn authenticate_cleartext<S, T>(
    read: &mut S,
    write: &mut T,
    client_identifier: &ClientIdentifier,
    route: &Route,
) -> Result<(), Error>
where
    S: AsyncRead + std::marker::Unpin,
    T: AsyncWrite + std::marker::Unpin,
{
    plain_password_challenge(write).await?;

    let message = read_password_message(read).await?;
    let client_token = read_client_token(write, message, client_identifier).await?;

    let stored = stored_password(write, client_identifier, route).await?;

    if !constant_time_eq(stored.as_bytes(), &client_token) {
        return incorrect_password(write, client_identifier).await;
    }

    Ok(())
}

async fn authenticate_md5<S, T>(
    read: &mut S,
    write: &mut T,
    salt_key: u32,
    client_identifier: &ClientIdentifier,
    route: &Route,
) -> Result<(), Error>
where
    S: AsyncRead + std::marker::Unpin,
    T: AsyncWrite + std::marker::Unpin,
{
    let salt = md5_salt(salt_key);
    md5_challenge(write, &salt).await?;

    let message = read_password_message(read).await?;
    let client_token = read_client_token(write, message, client_identifier).await?;

    let stored = stored_password(write, client_identifier, route).await?;
    let expected = md5_hash_password(&client_identifier.username, stored.as_bytes(), &salt);

    if !constant_time_eq(&expected, &client_token) {
        return incorrect_password(write, client_identifier).await;
    }

    Ok(())
}

async fn authenticate_cert<T>(
    write: &mut T,
    tls: Option<&dyn VerifyCommonName>,
    client_identifier: &ClientIdentifier,
    route: &Route,
) -> Result<(), Error>
where
    T: AsyncWrite + std::marker::Unpin,
{
    let Some(tls) = tls else {
        error!("TLS connection required for {client_identifier}");
        error_response_terminal(write, "TLS connection required", SQLSTATE_INVALID_AUTHORIZATION)
            .await?;
        return Err(Error::AuthError(format!(
            "TLS connection required for {client_identifier}"
        )));
    };

    let user = &route.settings.user;
    if user.auth_common_name_default && tls.verify_common_name(&user.username) {
        return Ok(());
    }

    for name in &user.auth_common_names {
        if tls.verify_common_name(name) {
            return Ok(());
        }
    }

    error!("TLS certificate common name mismatch for {client_identifier}");
    error_response_terminal(
        write,
        "TLS certificate common name mismatch",
        SQLSTATE_INVALID_PASSWORD,
    )
    .await?;
    Err(Error::AuthError(format!(
        "TLS certificate common name mismatch for {client_identifier}"
    )))
}

/// Extract the client's password from a PasswordMessage body, reporting a
/// protocol violation to the client when it is malformed.
async fn read_client_token<T>(
    write: &mut T,
    message: BytesMut,
    client_identifier: &ClientIdentifier,
) -> Result<BytesMut, Error>
where
    T: AsyncWrite + std::marker::Unpin,
{
    match password_from_message(message) {
        Ok(token) => Ok(token),
        Err(err) => {
            error!("password read error for {client_identifier}: {err}");
            error_response_terminal(write, "bad password message", SQLSTATE_PROTOCOL_VIOLATION)
                .await?;
            Err(Error::AuthError(format!(
                "bad password message from {client_identifier}"
            )))
        }
    }
}

/// Resolve the reference password: the auth query when the route has one,
/// the static route password otherwise.
async fn stored_password<'a, T>(
    write: &mut T,
    client_identifier: &ClientIdentifier,
    route: &'a Route,
) -> Result<StoredPassword<'a>, Error>
where
    T: AsyncWrite + std::marker::Unpin,
{
    let user = &route.settings.user;

    if user.auth_query.is_some() {
        return match query::fetch_stored_password(route, &client_identifier.username).await {
            Ok(password) => Ok(StoredPassword::Fetched(password)),
            Err(err) => {
                error!("failed to make auth query for {client_identifier}: {err}");
                error_response_terminal(
                    write,
                    "failed to make auth query",
                    SQLSTATE_INVALID_AUTHORIZATION,
                )
                .await?;
                Err(err)
            }
        };
    }

    match user.password.as_deref() {
        Some(password) => Ok(StoredPassword::Config(password)),
        None => {
            error!("password required for {client_identifier}");
            error_response_terminal(write, "password required", SQLSTATE_INVALID_AUTHORIZATION)
                .await?;
            Err(Error::AuthError(format!(
                "password required for {client_identifier}"
            )))
        }
    }
}

async fn incorrect_password<T>(
    write: &mut T,
    client_identifier: &ClientIdentifier,
) -> Result<(), Error>
where
    T: AsyncWrite + std::marker::Unpin,
{
    info!("user {client_identifier} incorrect password");
    error_response_terminal(write, "incorrect password", SQLSTATE_INVALID_PASSWORD).await?;
    Err(Error::AuthError(format!(
        "incorrect password for {client_identifier}"
    )))
}

/// Derive the 4-byte md5 challenge salt from the client's connection key.
/// The same client sees the same salt for the lifetime of its connection.
pub(crate) fn md5_salt(key: u32) -> [u8; 4] {
    let digest = Md5::digest(key.to_be_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Compare two byte strings without short-circuiting on the first
/// mismatching byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
