//! Accepted client connections: startup, admission, and session service.

mod startup;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

use crate::app::tls::TlsCertificateInfo;
use crate::auth::{self, VerifyCommonName};
use crate::config::get_config;
use crate::errors::{ClientIdentifier, Error};
use crate::messages::{
    backend_key_data, configure_tcp_socket, error_response_terminal, parse_startup,
    ready_for_query, write_all_flush, SQLSTATE_CONNECTION_FAILURE, SQLSTATE_UNDEFINED_DATABASE,
};
use crate::pool::{self, ClientState};
use crate::server::Server;

use startup::{get_startup, ClientConnectionType};

/// Serve one accepted connection to completion.
pub async fn handle(
    mut stream: TcpStream,
    addr: SocketAddr,
    tls_acceptor: Option<Arc<tokio_native_tls::TlsAcceptor>>,
) -> Result<(), Error> {
    configure_tcp_socket(&stream)?;

    loop {
        match get_startup(&mut stream).await? {
            ClientConnectionType::SslRequest => match &tls_acceptor {
                Some(acceptor) => {
                    write_all_flush(&mut stream, b"S").await?;
                    let tls_stream = acceptor
                        .accept(stream)
                        .await
                        .map_err(|err| Error::TlsError(format!("handshake failed: {err}")))?;
                    return startup_tls(tls_stream, addr).await;
                }
                None => {
                    // No TLS configured; the client may retry in plain text.
                    write_all_flush(&mut stream, b"N").await?;
                    continue;
                }
            },

            ClientConnectionType::GssEncRequest => {
                write_all_flush(&mut stream, b"N").await?;
                continue;
            }

            ClientConnectionType::Startup(bytes) => {
                let (read, write) = stream.into_split();
                return startup_flow(BufReader::new(read), write, None, addr, bytes).await;
            }

            ClientConnectionType::CancelRequest(mut bytes) => {
                if bytes.remaining() >= 8 {
                    let process_id = bytes.get_i32();
                    let _secret_key = bytes.get_i32();
                    info!("cancel request for process {process_id} from {addr} ignored");
                }
                return Ok(());
            }
        }
    }
}

/// Continue startup on a negotiated TLS stream.
async fn startup_tls(mut tls_stream: TlsStream<TcpStream>, addr: SocketAddr) -> Result<(), Error> {
    let certificate_info = TlsCertificateInfo::from_stream(&tls_stream);

    match get_startup(&mut tls_stream).await? {
        ClientConnectionType::Startup(bytes) => {
            let (read, write) = tokio::io::split(tls_stream);
            startup_flow(BufReader::new(read), write, certificate_info, addr, bytes).await
        }
        _ => Err(Error::ProtocolSyncError(
            "bad postgres client (tls)".into(),
        )),
    }
}

/// Route, admit and authenticate the client, then serve its session.
async fn startup_flow<S, T>(
    mut read: S,
    mut write: T,
    tls: Option<TlsCertificateInfo>,
    addr: SocketAddr,
    bytes: BytesMut,
) -> Result<(), Error>
where
    S: AsyncRead + std::marker::Unpin,
    T: AsyncWrite + std::marker::Unpin,
{
    let parameters = parse_startup(bytes)?;

    let username = match parameters.get("user") {
        Some(user) => user.clone(),
        None => return Err(Error::ClientBadStartup),
    };
    let database = parameters
        .get("database")
        .unwrap_or(&username)
        .to_string();
    let application_name = parameters
        .get("application_name")
        .map(String::as_str)
        .unwrap_or("pg_usher");

    let client_identifier = ClientIdentifier::new(
        application_name,
        &username,
        &database,
        addr.to_string().as_str(),
    );

    let route = match pool::get_route(&database, &username) {
        Some(route) => route,
        None => {
            error_response_terminal(
                &mut write,
                &format!("no route configured for database: {database}, user: {username}"),
                SQLSTATE_UNDEFINED_DATABASE,
            )
            .await?;
            return Err(Error::ClientError(format!(
                "no route configured for {client_identifier}"
            )));
        }
    };

    let process_id: i32 = rand::random();
    let secret_key: i32 = rand::random();
    let salt_key: u32 = rand::random();

    let config = get_config();
    if config.general.log_client_connections {
        info!(
            "client {client_identifier} connected (tls: {})",
            tls.is_some()
        );
    }

    route.clients.lock().set(process_id, ClientState::Pending);
    // Detach from the admission sets on every exit path.
    let route = scopeguard::guard(route, |route| {
        route.clients.lock().set(process_id, ClientState::Undef);
    });

    auth::authenticate(
        &mut read,
        &mut write,
        tls.as_ref().map(|info| info as &dyn VerifyCommonName),
        salt_key,
        &client_identifier,
        &route,
    )
    .await?;

    route.clients.lock().set(process_id, ClientState::Queued);
    let server = match Server::startup(&route).await {
        Ok(server) => server,
        Err(err) => {
            let _ = error_response_terminal(
                &mut write,
                "server connection failure",
                SQLSTATE_CONNECTION_FAILURE,
            )
            .await;
            return Err(err);
        }
    };

    route.clients.lock().set(process_id, ClientState::Active);

    let mut greeting = BytesMut::new();
    let server_parameters: BytesMut = (&server.server_parameters).into();
    greeting.put(server_parameters);
    greeting.put(backend_key_data(process_id, secret_key));
    greeting.put(ready_for_query(false));
    write_all_flush(&mut write, &greeting).await?;

    relay(read, write, server).await?;

    if config.general.log_client_disconnections {
        info!("client {client_identifier} disconnected");
    }
    Ok(())
}

/// Shovel bytes between the client and its server until either side
/// hangs up.
async fn relay<S, T>(mut client_read: S, mut client_write: T, server: Server) -> Result<(), Error>
where
    S: AsyncRead + std::marker::Unpin,
    T: AsyncWrite + std::marker::Unpin,
{
    let (mut server_read, mut server_write) = server.into_split();

    let client_to_server = tokio::io::copy(&mut client_read, &mut server_write);
    let server_to_client = tokio::io::copy(&mut server_read, &mut client_write);

    tokio::select! {
        result = client_to_server => {
            if let Err(err) = result {
                debug!("client stream closed: {err}");
            }
        }
        result = server_to_client => {
            if let Err(err) = result {
                debug!("server stream closed: {err}");
            }
        }
    }

    Ok(())
}
