//! General configuration settings for the connection pooler.

use serde_derive::{Deserialize, Serialize};

/// General configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct General {
    #[serde(default = "General::default_host")]
    pub host: String,

    #[serde(default = "General::default_port")]
    pub port: u16,

    #[serde(default = "General::default_worker_threads")]
    pub worker_threads: usize,

    #[serde(default = "General::default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(default = "General::default_backlog")]
    pub backlog: u32,

    #[serde(default = "General::default_tcp_keepalives_idle")]
    pub tcp_keepalives_idle: u64,
    #[serde(default = "General::default_tcp_keepalives_count")]
    pub tcp_keepalives_count: u32,
    #[serde(default = "General::default_tcp_keepalives_interval")]
    pub tcp_keepalives_interval: u64,
    #[serde(default = "General::default_tcp_no_delay")]
    pub tcp_no_delay: bool,

    #[serde(default = "General::default_log_client_connections")]
    pub log_client_connections: bool,

    #[serde(default = "General::default_log_client_disconnections")]
    pub log_client_disconnections: bool,

    pub tls_certificate: Option<String>,
    pub tls_private_key: Option<String>,

    pub syslog_prog_name: Option<String>,
}

impl General {
    pub fn default_host() -> String {
        "0.0.0.0".into()
    }

    pub fn default_port() -> u16 {
        6432
    }

    pub fn default_worker_threads() -> usize {
        num_cpus::get()
    }

    pub fn default_connect_timeout() -> u64 {
        5_000
    }

    pub fn default_backlog() -> u32 {
        1_024
    }

    pub fn default_tcp_keepalives_idle() -> u64 {
        60
    }

    pub fn default_tcp_keepalives_count() -> u32 {
        5
    }

    pub fn default_tcp_keepalives_interval() -> u64 {
        5
    }

    pub fn default_tcp_no_delay() -> bool {
        true
    }

    pub fn default_log_client_connections() -> bool {
        true
    }

    pub fn default_log_client_disconnections() -> bool {
        true
    }
}

impl Default for General {
    fn default() -> General {
        General {
            host: Self::default_host(),
            port: Self::default_port(),
            worker_threads: Self::default_worker_threads(),
            connect_timeout: Self::default_connect_timeout(),
            backlog: Self::default_backlog(),
            tcp_keepalives_idle: Self::default_tcp_keepalives_idle(),
            tcp_keepalives_count: Self::default_tcp_keepalives_count(),
            tcp_keepalives_interval: Self::default_tcp_keepalives_interval(),
            tcp_no_delay: Self::default_tcp_no_delay(),
            log_client_connections: Self::default_log_client_connections(),
            log_client_disconnections: Self::default_log_client_disconnections(),
            tls_certificate: None,
            tls_private_key: None,
            syslog_prog_name: None,
        }
    }
}
