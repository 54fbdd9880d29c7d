//! Tests for protocol message handling.

use bytes::{BufMut, BytesMut};
use md5::{Digest, Md5};

use super::protocol::*;
use crate::errors::Error;

fn startup_params(pairs: &[(&str, &str)]) -> BytesMut {
    let mut bytes = BytesMut::new();
    for (key, value) in pairs {
        bytes.put_slice(key.as_bytes());
        bytes.put_u8(0);
        bytes.put_slice(value.as_bytes());
        bytes.put_u8(0);
    }
    bytes.put_u8(0);
    bytes
}

#[test]
fn md5_hash_has_prefix_and_lowercase_hex_digest() {
    let hash = md5_hash_password("u", b"p", &[1, 2, 3, 4]);

    assert_eq!(hash.len(), 35);
    assert_eq!(&hash[..3], b"md5");
    assert!(hash[3..]
        .iter()
        .all(|byte| byte.is_ascii_hexdigit() && !byte.is_ascii_uppercase()));
}

#[test]
fn md5_hash_is_the_salted_double_digest() {
    let user = "alice";
    let password = b"wonderland";
    let salt = [0xAA, 0xBB, 0xCC, 0xDD];

    let mut first = Md5::new();
    first.update(password);
    first.update(user.as_bytes());
    let inner = format!("{:x}", first.finalize());

    let mut second = Md5::new();
    second.update(inner.as_bytes());
    second.update(salt);
    let expected = format!("md5{:x}", second.finalize());

    assert_eq!(
        md5_hash_password(user, password, &salt),
        expected.into_bytes()
    );
}

#[test]
fn md5_hash_depends_on_user_password_and_salt() {
    let base = md5_hash_password("u", b"p", &[1, 2, 3, 4]);
    assert_ne!(base, md5_hash_password("v", b"p", &[1, 2, 3, 4]));
    assert_ne!(base, md5_hash_password("u", b"q", &[1, 2, 3, 4]));
    assert_ne!(base, md5_hash_password("u", b"p", &[4, 3, 2, 1]));
}

#[test]
fn parse_startup_extracts_parameters() {
    let bytes = startup_params(&[("user", "u"), ("database", "d"), ("application_name", "a")]);

    let params = parse_startup(bytes).unwrap();
    assert_eq!(params.get("user").map(String::as_str), Some("u"));
    assert_eq!(params.get("database").map(String::as_str), Some("d"));
    assert_eq!(params.get("application_name").map(String::as_str), Some("a"));
}

#[test]
fn parse_startup_requires_the_user_parameter() {
    let bytes = startup_params(&[("database", "d")]);
    assert!(matches!(
        parse_startup(bytes),
        Err(Error::ClientBadStartup)
    ));
}

#[test]
fn parse_params_rejects_unpaired_fields() {
    let mut bytes = BytesMut::new();
    bytes.put_slice(b"user\0");
    bytes.put_u8(0);
    assert!(parse_params(bytes).is_err());
}

#[test]
fn password_from_message_strips_the_terminator() {
    let mut body = BytesMut::new();
    body.put_slice(b"secret\0");
    assert_eq!(&password_from_message(body).unwrap()[..], b"secret");
}

#[test]
fn password_from_message_rejects_unterminated_payloads() {
    let mut body = BytesMut::new();
    body.put_slice(b"secret");
    assert!(password_from_message(body).is_err());

    assert!(password_from_message(BytesMut::new()).is_err());
}

#[test]
fn error_message_carries_severity_code_and_text() {
    let message = error_message("incorrect password", "28P01");

    assert_eq!(message[0], b'E');
    let len = i32::from_be_bytes([message[1], message[2], message[3], message[4]]);
    assert_eq!(len as usize, message.len() - 1);

    let body = &message[5..];
    let (severity, code, text) = parse_error_response(body);
    assert_eq!(severity, "FATAL");
    assert_eq!(code, "28P01");
    assert_eq!(text, "incorrect password");
}

#[test]
fn parse_error_response_skips_unknown_fields() {
    let body = b"SERROR\0Vwhatever\0C57014\0Mcanceled\0Fpostgres.c\0\0";
    let (severity, code, message) = parse_error_response(body);
    assert_eq!(severity, "ERROR");
    assert_eq!(code, "57014");
    assert_eq!(message, "canceled");
}

#[test]
fn parse_parameter_status_splits_key_and_value() {
    let (key, value) = parse_parameter_status(b"server_version\016.3\0").unwrap();
    assert_eq!(key, "server_version");
    assert_eq!(value, "16.3");

    assert!(parse_parameter_status(b"\0\0").is_err());
}

#[test]
fn ready_for_query_reports_transaction_status() {
    assert_eq!(&ready_for_query(false)[..], &[b'Z', 0, 0, 0, 5, b'I']);
    assert_eq!(&ready_for_query(true)[..], &[b'Z', 0, 0, 0, 5, b'T']);
}

#[test]
fn backend_key_data_encodes_the_cancellation_key() {
    let bytes = backend_key_data(0x01020304, 0x0A0B0C0D);
    assert_eq!(
        &bytes[..],
        &[b'K', 0, 0, 0, 12, 1, 2, 3, 4, 0x0A, 0x0B, 0x0C, 0x0D]
    );
}
