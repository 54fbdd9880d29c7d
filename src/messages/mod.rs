// Helper functions to build, send and read one-off protocol messages.

pub mod config_socket;
pub mod protocol;

pub use config_socket::configure_tcp_socket;
pub use protocol::{
    auth_ok, backend_key_data, error_message, error_response_terminal, md5_challenge,
    md5_hash_password, parse_error_response, parse_parameter_status, parse_params, parse_startup,
    password_from_message, password_message, plain_password_challenge, read_message,
    read_password_message, ready_for_query, server_parameter_message, startup, write_all_flush,
};

// Startup packet codes.
pub const PROTOCOL_VERSION_NUMBER: i32 = 196608;
pub const SSL_REQUEST_CODE: i32 = 80877103;
pub const CANCEL_REQUEST_CODE: i32 = 80877102;
pub const GSSENC_REQUEST_CODE: i32 = 80877104;

// Authentication message subtypes.
pub const AUTHENTICATION_SUCCESSFUL: i32 = 0;
pub const AUTHENTICATION_CLEAR_PASSWORD: i32 = 3;
pub const AUTHENTICATION_MD5_PASSWORD: i32 = 5;

// SQLSTATE codes written by the authentication path.
pub const SQLSTATE_PROTOCOL_VIOLATION: &str = "08P01";
pub const SQLSTATE_INVALID_PASSWORD: &str = "28P01";
pub const SQLSTATE_INVALID_AUTHORIZATION: &str = "28000";
pub const SQLSTATE_CONNECTION_FAILURE: &str = "08006";
pub const SQLSTATE_UNDEFINED_DATABASE: &str = "3D000";

// Size limits.
pub const MAX_STARTUP_PACKET_SIZE: i32 = 8 * 1024;
pub const MAX_MESSAGE_SIZE: i32 = 256 * 1024 * 1024;

#[cfg(test)]
mod protocol_tests;
