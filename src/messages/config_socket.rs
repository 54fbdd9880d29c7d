//! TCP socket tuning applied to accepted and dialed connections.

use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

use crate::config::get_config;
use crate::errors::Error;

pub fn configure_tcp_socket(stream: &TcpStream) -> Result<(), Error> {
    let general = get_config().general;
    let sock = SockRef::from(stream);

    sock.set_tcp_nodelay(general.tcp_no_delay)
        .map_err(|err| Error::SocketError(format!("failed to set TCP_NODELAY: {err}")))?;

    if general.tcp_keepalives_idle > 0 {
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(general.tcp_keepalives_idle))
            .with_interval(Duration::from_secs(general.tcp_keepalives_interval))
            .with_retries(general.tcp_keepalives_count);
        sock.set_tcp_keepalive(&keepalive)
            .map_err(|err| Error::SocketError(format!("failed to set TCP keepalive: {err}")))?;
    }

    Ok(())
}
