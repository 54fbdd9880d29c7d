//! Listener and accept loop.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use super::tls;
use crate::client;
use crate::config::get_config;
use crate::errors::Error;

/// Accept and serve client connections until shutdown.
pub async fn run() -> Result<(), Error> {
    let config = get_config();

    let addr: SocketAddr = format!("{}:{}", config.general.host, config.general.port)
        .parse()
        .map_err(|err| Error::BadConfig(format!("bad listen address: {err}")))?;
    let listener = bind_listener(addr, config.general.backlog)?;
    info!("Listening on {addr}");

    let tls_acceptor = match (
        config.general.tls_certificate.as_ref(),
        config.general.tls_private_key.as_ref(),
    ) {
        (Some(cert), Some(key)) => {
            let identity = tls::load_identity(Path::new(cert), Path::new(key))?;
            Some(Arc::new(tls::build_acceptor(identity)?))
        }
        _ => None,
    };

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        error!("accept failed: {err}");
                        continue;
                    }
                };
                let acceptor = tls_acceptor.clone();
                tokio::spawn(async move {
                    if let Err(err) = client::handle(stream, peer, acceptor).await {
                        error!("client {peer}: {err}");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Got shutdown signal, exiting");
                break;
            }
        }
    }

    Ok(())
}

fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, Error> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|err| Error::SocketError(format!("could not create socket: {err}")))?;
    socket
        .set_reuse_address(true)
        .map_err(|err| Error::SocketError(format!("could not set SO_REUSEADDR: {err}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|err| Error::SocketError(format!("could not set nonblocking: {err}")))?;
    socket
        .bind(&addr.into())
        .map_err(|err| Error::SocketError(format!("could not bind {addr}: {err}")))?;
    socket
        .listen(backlog as i32)
        .map_err(|err| Error::SocketError(format!("could not listen on {addr}: {err}")))?;

    TcpListener::from_std(socket.into())
        .map_err(|err| Error::SocketError(format!("could not register listener: {err}")))
}
