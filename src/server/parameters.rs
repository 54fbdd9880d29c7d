//! Server startup parameters retained for the client greeting.

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};

use crate::messages::server_parameter_message;

/// ParameterStatus values the server reported during startup.
#[derive(Debug, Clone, Default)]
pub struct ServerParameters {
    parameters: HashMap<String, String>,
}

impl ServerParameters {
    pub fn new() -> ServerParameters {
        ServerParameters::default()
    }

    pub fn set(&mut self, key: String, value: String) {
        self.parameters.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.parameters.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl From<&ServerParameters> for BytesMut {
    fn from(server_parameters: &ServerParameters) -> BytesMut {
        let mut bytes = BytesMut::new();
        for (key, value) in &server_parameters.parameters {
            bytes.put(server_parameter_message(key, value));
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_each_parameter_as_a_status_message() {
        let mut parameters = ServerParameters::new();
        parameters.set("server_version".into(), "16.3".into());

        let bytes: BytesMut = (&parameters).into();
        assert_eq!(bytes[0], b'S');
        let len = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        assert_eq!(len as usize, bytes.len() - 1);
        assert!(bytes[5..].starts_with(b"server_version\0"));
        assert!(bytes[5..].ends_with(b"16.3\0"));
    }

    #[test]
    fn empty_set_encodes_to_nothing() {
        let parameters = ServerParameters::new();
        assert!(parameters.is_empty());
        let bytes: BytesMut = (&parameters).into();
        assert!(bytes.is_empty());
    }
}
