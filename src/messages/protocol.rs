// Standard library imports
use std::collections::HashMap;

// External crate imports
use bytes::{BufMut, BytesMut};
use log::debug;
use md5::{Digest, Md5};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// Internal crate imports
use crate::errors::Error;
use crate::messages::MAX_MESSAGE_SIZE;

/// Write a buffer and flush the socket.
pub async fn write_all_flush<S>(stream: &mut S, buf: &[u8]) -> Result<(), Error>
where
    S: AsyncWrite + std::marker::Unpin,
{
    stream
        .write_all(buf)
        .await
        .map_err(|err| Error::SocketError(format!("failed to write to socket: {err}")))?;
    stream
        .flush()
        .await
        .map_err(|err| Error::SocketError(format!("failed to flush socket: {err}")))
}

/// Send AuthenticationOk.
pub async fn auth_ok<S>(stream: &mut S) -> Result<(), Error>
where
    S: AsyncWrite + std::marker::Unpin,
{
    let mut res = BytesMut::with_capacity(9);
    res.put_u8(b'R');
    res.put_i32(8);
    res.put_i32(0);

    write_all_flush(stream, &res).await
}

/// Send an md5 password challenge with the given salt.
pub async fn md5_challenge<S>(stream: &mut S, salt: &[u8; 4]) -> Result<(), Error>
where
    S: AsyncWrite + std::marker::Unpin,
{
    let mut res = BytesMut::with_capacity(13);
    res.put_u8(b'R');
    res.put_i32(12);
    res.put_i32(5); // MD5
    res.put_slice(&salt[..]);

    write_all_flush(stream, &res).await
}

/// Send a plain password challenge.
pub async fn plain_password_challenge<S>(stream: &mut S) -> Result<(), Error>
where
    S: AsyncWrite + std::marker::Unpin,
{
    let mut res = BytesMut::with_capacity(9);
    res.put_u8(b'R');
    res.put_i32(8);
    res.put_i32(3); // Plain password

    write_all_flush(stream, &res).await
}

/// Read the next framed message: a one-byte tag followed by a
/// length-prefixed body. Returns the tag and the body.
pub async fn read_message<S>(stream: &mut S) -> Result<(u8, BytesMut), Error>
where
    S: AsyncRead + std::marker::Unpin,
{
    let tag = stream
        .read_u8()
        .await
        .map_err(|err| Error::SocketError(format!("failed to read message tag: {err}")))?;

    let len = stream
        .read_i32()
        .await
        .map_err(|err| Error::SocketError(format!("failed to read message length: {err}")))?;

    if !(4..=MAX_MESSAGE_SIZE).contains(&len) {
        return Err(Error::ProtocolSyncError(format!(
            "invalid message length {len} for message '{}'",
            tag as char
        )));
    }

    let mut body = vec![0u8; (len - 4) as usize];
    stream
        .read_exact(&mut body)
        .await
        .map_err(|err| Error::SocketError(format!("failed to read message body: {err}")))?;

    Ok((tag, BytesMut::from(&body[..])))
}

/// Read messages until a PasswordMessage arrives, returning its body.
/// Anything else received in the meantime is logged and dropped.
pub async fn read_password_message<S>(stream: &mut S) -> Result<BytesMut, Error>
where
    S: AsyncRead + std::marker::Unpin,
{
    loop {
        let (tag, body) = read_message(stream).await?;
        if tag == b'p' {
            return Ok(body);
        }
        debug!(
            "skipping '{}' message while waiting for password",
            tag as char
        );
    }
}

/// Extract the password from a PasswordMessage body. The payload is a
/// nul-terminated string; the terminator is stripped.
pub fn password_from_message(mut body: BytesMut) -> Result<BytesMut, Error> {
    match body.last() {
        Some(0) => {
            let len = body.len() - 1;
            body.truncate(len);
            Ok(body)
        }
        _ => Err(Error::ProtocolSyncError(
            "password message is not nul-terminated".into(),
        )),
    }
}

/// Send a PasswordMessage carrying the given password.
pub async fn password_message<S>(stream: &mut S, password: &[u8]) -> Result<(), Error>
where
    S: AsyncWrite + std::marker::Unpin,
{
    let mut res = BytesMut::with_capacity(password.len() + 6);
    res.put_u8(b'p');
    res.put_i32(password.len() as i32 + 4 + 1);
    res.put_slice(password);
    res.put_u8(0);

    write_all_flush(stream, &res).await
}

/// Create an md5 password hash given a salt: "md5" followed by the hex
/// digest of md5(md5(password || user) || salt).
pub fn md5_hash_password(user: &str, password: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut md5 = Md5::new();

    // First pass
    md5.update(password);
    md5.update(user.as_bytes());

    let output = md5.finalize_reset();

    // Second pass
    md5.update(format!("{output:x}"));
    md5.update(salt);

    format!("md5{:x}", md5.finalize()).into_bytes()
}

/// Send a StartupMessage to the server.
pub async fn startup<S>(
    stream: &mut S,
    user: &str,
    database: &str,
    application_name: &str,
) -> Result<(), Error>
where
    S: AsyncWrite + std::marker::Unpin,
{
    let mut bytes = BytesMut::new();

    // Protocol version
    bytes.put_i32(crate::messages::PROTOCOL_VERSION_NUMBER);

    // User
    bytes.put(&b"user\0"[..]);
    bytes.put_slice(user.as_bytes());
    bytes.put_u8(0);

    // Application name
    bytes.put(&b"application_name\0"[..]);
    bytes.put_slice(application_name.as_bytes());
    bytes.put_u8(0);

    // Database
    bytes.put(&b"database\0"[..]);
    bytes.put_slice(database.as_bytes());
    bytes.put_u8(0);
    bytes.put_u8(0); // Null terminator

    let len = bytes.len() as i32 + 4i32;

    let mut startup = BytesMut::with_capacity(len as usize);
    startup.put_i32(len);
    startup.put(bytes);

    write_all_flush(stream, &startup).await
}

/// Parse the params the client sends as a key/value format.
pub fn parse_params(bytes: BytesMut) -> Result<HashMap<String, String>, Error> {
    let mut fields = Vec::new();
    for chunk in bytes.as_ref().split(|b| *b == 0) {
        if !chunk.is_empty() {
            fields.push(String::from_utf8_lossy(chunk).to_string());
        }
    }

    // Expect pairs of name and value
    // and at least one pair to be present.
    if fields.len() % 2 != 0 || fields.len() < 2 {
        return Err(Error::ProtocolSyncError(format!(
            "expected key-value pairs in startup message, got {} fields",
            fields.len()
        )));
    }

    let mut result = HashMap::new();
    for pair in fields.chunks(2) {
        result.insert(pair[0].clone(), pair[1].clone());
    }

    Ok(result)
}

/// Parse StartupMessage parameters, e.g. user, database, application_name.
pub fn parse_startup(bytes: BytesMut) -> Result<HashMap<String, String>, Error> {
    let result = parse_params(bytes)?;

    // The user parameter is mandatory by the protocol spec.
    if !result.contains_key("user") {
        return Err(Error::ClientBadStartup);
    }

    Ok(result)
}

pub fn error_message(message: &str, code: &str) -> BytesMut {
    let mut error = BytesMut::new();

    // Error level
    error.put_u8(b'S');
    error.put_slice(&b"FATAL\0"[..]);

    // Error level (non-translatable)
    error.put_u8(b'V');
    error.put_slice(&b"FATAL\0"[..]);

    // Error code
    error.put_u8(b'C');
    error.put_slice(format!("{code}\0").as_bytes());

    // The short error message.
    error.put_u8(b'M');
    error.put_slice(format!("{message}\0").as_bytes());

    // No more fields follow.
    error.put_u8(0);

    let mut res = BytesMut::with_capacity(error.len() + 5);
    res.put_u8(b'E');
    res.put_i32(error.len() as i32 + 4);
    res.put(error);
    res
}

pub async fn error_response_terminal<S>(
    stream: &mut S,
    message: &str,
    code: &str,
) -> Result<(), Error>
where
    S: AsyncWrite + std::marker::Unpin,
{
    let res = error_message(message, code);
    write_all_flush(stream, &res).await
}

/// Decode the severity, code and message fields of an ErrorResponse body.
/// Unknown fields are skipped.
pub fn parse_error_response(body: &[u8]) -> (String, String, String) {
    let mut severity = String::new();
    let mut code = String::new();
    let mut message = String::new();

    let mut pos = 0;
    while pos < body.len() {
        let field = body[pos];
        if field == 0 {
            break;
        }
        pos += 1;
        let end = body[pos..]
            .iter()
            .position(|b| *b == 0)
            .map(|i| pos + i)
            .unwrap_or(body.len());
        let value = String::from_utf8_lossy(&body[pos..end]).to_string();
        match field {
            b'S' => severity = value,
            b'C' => code = value,
            b'M' => message = value,
            _ => {}
        }
        pos = end + 1;
    }

    (severity, code, message)
}

/// Decode a ParameterStatus body into its key and value.
pub fn parse_parameter_status(body: &[u8]) -> Result<(String, String), Error> {
    let mut parts = body.split(|b| *b == 0);
    let key = parts
        .next()
        .filter(|part| !part.is_empty())
        .ok_or_else(|| Error::ProtocolSyncError("empty ParameterStatus message".into()))?;
    let value = parts.next().unwrap_or(&[]);

    Ok((
        String::from_utf8_lossy(key).to_string(),
        String::from_utf8_lossy(value).to_string(),
    ))
}

/// Create a BackendKeyData message.
pub fn backend_key_data(process_id: i32, secret_key: i32) -> BytesMut {
    let mut bytes = BytesMut::with_capacity(13);
    bytes.put_u8(b'K');
    bytes.put_i32(12);
    bytes.put_i32(process_id);
    bytes.put_i32(secret_key);
    bytes
}

/// Create a ReadyForQuery message.
pub fn ready_for_query(in_transaction: bool) -> BytesMut {
    let mut bytes = BytesMut::with_capacity(6);
    bytes.put_u8(b'Z');
    bytes.put_i32(5);
    if in_transaction {
        bytes.put_u8(b'T');
    } else {
        bytes.put_u8(b'I');
    }

    bytes
}

/// Create a ParameterStatus message.
pub fn server_parameter_message(key: &str, value: &str) -> BytesMut {
    let mut server_info = BytesMut::new();
    server_info.put_u8(b'S');
    server_info.put_i32(4 + key.len() as i32 + 1 + value.len() as i32 + 1);
    server_info.put_slice(key.as_bytes());
    server_info.put_bytes(0, 1);
    server_info.put_slice(value.as_bytes());
    server_info.put_bytes(0, 1);

    server_info
}
