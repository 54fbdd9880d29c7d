//! Backend authentication.
//!
//! Answers the server's authentication challenge after our
//! StartupMessage, then waits for the verdict.

use bytes::{Buf, BytesMut};
use log::{debug, error, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::User;
use crate::errors::{Error, ServerIdentifier};
use crate::messages::{
    md5_hash_password, parse_error_response, password_message, read_message,
    AUTHENTICATION_CLEAR_PASSWORD, AUTHENTICATION_MD5_PASSWORD, AUTHENTICATION_SUCCESSFUL,
};

/// Respond to the first Authentication message received from the server.
///
/// `first` is the message body, starting with the authentication subtype.
/// For subtypes that need a password response, the reply is sent and the
/// server's follow-up is awaited.
pub(crate) async fn handle_authentication<S>(
    stream: &mut S,
    mut first: BytesMut,
    user: &User,
    server_identifier: &ServerIdentifier,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + std::marker::Unpin,
{
    if first.remaining() < 4 {
        return Err(Error::ServerAuthError(
            "failed to parse authentication message".into(),
            server_identifier.clone(),
        ));
    }
    let auth_code = first.get_i32();

    match auth_code {
        AUTHENTICATION_SUCCESSFUL => return Ok(()),

        AUTHENTICATION_CLEAR_PASSWORD => {
            debug!("server {server_identifier} requested clear-text authentication");

            let password = resolve_password(user, server_identifier)?;
            password_message(stream, password).await?;
        }

        AUTHENTICATION_MD5_PASSWORD => {
            debug!("server {server_identifier} requested md5 authentication");

            if first.remaining() < 4 {
                return Err(Error::ServerAuthError(
                    "failed to parse authentication message".into(),
                    server_identifier.clone(),
                ));
            }
            let mut salt = [0u8; 4];
            first.copy_to_slice(&mut salt);

            let username = user.server_username.as_deref().unwrap_or(&user.username);
            let password = resolve_password(user, server_identifier)?;
            let hash = md5_hash_password(username, password, &salt);
            password_message(stream, &hash).await?;
        }

        _ => {
            error!(
                "unsupported authentication method {auth_code} requested by server {server_identifier}"
            );
            return Err(Error::ServerAuthError(
                "unsupported authentication method".into(),
                server_identifier.clone(),
            ));
        }
    }

    await_authentication_ok(stream, server_identifier).await
}

/// Credentials for the server side: the dedicated server pair when
/// configured, the route's own password otherwise.
fn resolve_password<'a>(
    user: &'a User,
    server_identifier: &ServerIdentifier,
) -> Result<&'a [u8], Error> {
    if let Some(password) = user.server_password.as_deref() {
        Ok(password.as_bytes())
    } else if let Some(password) = user.password.as_deref() {
        Ok(password.as_bytes())
    } else {
        error!("password required for {server_identifier}");
        Err(Error::ServerAuthError(
            "password required".into(),
            server_identifier.clone(),
        ))
    }
}

/// Wait for the server's verdict after our password response.
async fn await_authentication_ok<S>(
    stream: &mut S,
    server_identifier: &ServerIdentifier,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + std::marker::Unpin,
{
    loop {
        let (tag, mut body) = read_message(stream).await?;
        match tag {
            b'R' => {
                if body.remaining() < 4 {
                    return Err(Error::ServerAuthError(
                        "failed to parse authentication message".into(),
                        server_identifier.clone(),
                    ));
                }
                let auth_code = body.get_i32();
                if auth_code != AUTHENTICATION_SUCCESSFUL {
                    // Tolerate a stray non-zero code after the password
                    // response.
                    warn!(
                        "incorrect authentication flow on server {server_identifier}, auth code: {auth_code}"
                    );
                }
                return Ok(());
            }
            b'E' => {
                let (severity, code, message) = parse_error_response(&body);
                error!("server {server_identifier} error: {severity} {code} {message}");
                return Err(Error::ServerAuthError(message, server_identifier.clone()));
            }
            _ => {
                debug!(
                    "skipping '{}' message from server {server_identifier}",
                    tag as char
                );
            }
        }
    }
}
