//! First-message handling for accepted connections.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::Error;
use crate::messages::{
    CANCEL_REQUEST_CODE, GSSENC_REQUEST_CODE, MAX_STARTUP_PACKET_SIZE, PROTOCOL_VERSION_NUMBER,
    SSL_REQUEST_CODE,
};

/// Type of connection received from a client.
pub(crate) enum ClientConnectionType {
    Startup(BytesMut),
    SslRequest,
    GssEncRequest,
    CancelRequest(BytesMut),
}

/// Read and classify the first message the client sends.
pub(crate) async fn get_startup<S>(stream: &mut S) -> Result<ClientConnectionType, Error>
where
    S: AsyncRead + std::marker::Unpin,
{
    // Get startup message length.
    let len = match stream.read_i32().await {
        Ok(len) => len,
        Err(_) => return Err(Error::ClientBadStartup),
    };

    // Minimum is 8 bytes (4 for the length field + 4 for the protocol
    // code); oversized packets are rejected outright.
    if !(8..=MAX_STARTUP_PACKET_SIZE).contains(&len) {
        return Err(Error::ClientBadStartup);
    }

    // Get the rest of the message.
    let mut startup = vec![0u8; (len - 4) as usize];
    match stream.read_exact(&mut startup).await {
        Ok(_) => (),
        Err(_) => return Err(Error::ClientBadStartup),
    };

    let mut bytes = BytesMut::from(&startup[..]);
    let code = bytes.get_i32();

    match code {
        // Client is requesting SSL (TLS).
        SSL_REQUEST_CODE => Ok(ClientConnectionType::SslRequest),

        // Client is requesting GSSAPI encryption.
        GSSENC_REQUEST_CODE => Ok(ClientConnectionType::GssEncRequest),

        // Client wants to proceed with a regular startup.
        PROTOCOL_VERSION_NUMBER => Ok(ClientConnectionType::Startup(bytes)),

        // Client is requesting to cancel a running query.
        CANCEL_REQUEST_CODE => Ok(ClientConnectionType::CancelRequest(bytes)),

        // Something else, probably a badly implemented client.
        _ => Err(Error::ProtocolSyncError(format!(
            "unexpected startup code: {code}"
        ))),
    }
}
