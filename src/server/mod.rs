//! Backend server connections.

mod authentication;
mod parameters;

pub use parameters::ServerParameters;

use bytes::Buf;
use log::{debug, error};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::config::Address;
use crate::errors::{Error, ServerIdentifier};
use crate::messages::{
    configure_tcp_socket, parse_error_response, parse_parameter_status, read_message, startup,
};
use crate::pool::Route;

/// One established, authenticated connection to a server.
pub struct Server {
    stream: TcpStream,

    /// The address (host, port).
    pub address: Address,

    /// ParameterStatus values reported on startup, passed to the client
    /// in its greeting.
    pub server_parameters: ServerParameters,

    /// Cancellation key the server handed back.
    pub process_id: i32,
    pub secret_key: i32,
}

impl Server {
    /// Dial the route's server, send the StartupMessage and run the
    /// authentication handshake, then consume the startup chatter up to
    /// ReadyForQuery.
    pub async fn startup(route: &Route) -> Result<Server, Error> {
        let address = &route.address;
        let user = &route.settings.user;

        let username = user
            .server_username
            .clone()
            .unwrap_or_else(|| user.username.clone());
        let server_identifier =
            ServerIdentifier::new(username.clone(), &route.settings.server_database);

        let mut stream = TcpStream::connect((address.host.as_str(), address.port))
            .await
            .map_err(|err| Error::SocketError(format!("failed to connect to {address}: {err}")))?;
        configure_tcp_socket(&stream)?;

        startup(
            &mut stream,
            &username,
            &route.settings.server_database,
            &route.settings.application_name,
        )
        .await?;

        let mut server_parameters = ServerParameters::new();
        let mut process_id = 0;
        let mut secret_key = 0;

        loop {
            let (tag, mut body) = read_message(&mut stream).await?;
            match tag {
                b'R' => {
                    authentication::handle_authentication(
                        &mut stream,
                        body,
                        user,
                        &server_identifier,
                    )
                    .await?
                }
                b'S' => {
                    let (key, value) = parse_parameter_status(&body)?;
                    server_parameters.set(key, value);
                }
                b'K' => {
                    if body.remaining() < 8 {
                        return Err(Error::ServerStartupError(
                            "backend key data".into(),
                            server_identifier.clone(),
                        ));
                    }
                    process_id = body.get_i32();
                    secret_key = body.get_i32();
                }
                b'Z' => break,
                b'E' => {
                    let (severity, code, message) = parse_error_response(&body);
                    error!("server {server_identifier} error: {severity} {code} {message}");
                    return Err(Error::ServerStartupError(message, server_identifier.clone()));
                }
                b'N' => {
                    let (severity, _, message) = parse_error_response(&body);
                    debug!("server {server_identifier} notice: {severity} {message}");
                }
                _ => {
                    debug!(
                        "skipping '{}' message from server {server_identifier} on startup",
                        tag as char
                    );
                }
            }
        }

        debug!("server connection established for {server_identifier} at {address}");

        Ok(Server {
            stream,
            address: address.clone(),
            server_parameters,
            process_id,
            secret_key,
        })
    }

    /// Split the underlying stream for bidirectional relaying.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }
}
