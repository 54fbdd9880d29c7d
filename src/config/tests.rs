//! Tests for configuration parsing and validation.

use super::*;

fn parse_toml(contents: &str) -> Config {
    toml::from_str(contents).unwrap()
}

const VALID_CONFIG: &str = r#"
[general]
host = "127.0.0.1"
port = 6432

[pools.marketplace]
server_host = "10.0.0.1"
server_port = 5432

[[pools.marketplace.users]]
username = "app"
auth_mode = "md5"
password = "hunter2"

[[pools.marketplace.users]]
username = "batch"
auth_mode = "cleartext"
auth_query = "SELECT usename, passwd FROM pg_shadow WHERE usename = $1"
auth_query_user = "usher"
auth_query_password = "lookup"
"#;

#[test]
fn a_valid_config_parses_and_validates() {
    let config = parse_toml(VALID_CONFIG);
    config.validate().unwrap();

    assert_eq!(config.general.host, "127.0.0.1");
    assert_eq!(config.general.port, 6432);

    let pool = config.pools.get("marketplace").unwrap();
    assert_eq!(pool.server_host, "10.0.0.1");
    assert_eq!(pool.users.len(), 2);
    assert_eq!(pool.users[0].auth_mode, AuthMode::Md5);
    assert_eq!(pool.users[1].auth_mode, AuthMode::Cleartext);
}

#[test]
fn auth_mode_defaults_to_block() {
    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"

[[pools.db.users]]
username = "nobody"
"#,
    );
    config.validate().unwrap();
    assert_eq!(config.pools["db"].users[0].auth_mode, AuthMode::Block);
}

#[test]
fn password_modes_require_a_password_source() {
    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"

[[pools.db.users]]
username = "app"
auth_mode = "md5"
"#,
    );
    assert!(matches!(config.validate(), Err(Error::BadConfig(_))));
}

#[test]
fn auth_query_requires_a_lookup_user() {
    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"

[[pools.db.users]]
username = "app"
auth_mode = "cleartext"
auth_query = "SELECT usename, passwd FROM pg_shadow WHERE usename = $1"
"#,
    );
    assert!(matches!(config.validate(), Err(Error::BadConfig(_))));
}

#[test]
fn cert_mode_requires_accepted_common_names() {
    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"

[[pools.db.users]]
username = "app"
auth_mode = "cert"
"#,
    );
    assert!(matches!(config.validate(), Err(Error::BadConfig(_))));

    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"

[[pools.db.users]]
username = "app"
auth_mode = "cert"
auth_common_name_default = true
"#,
    );
    config.validate().unwrap();
}

#[test]
fn server_credentials_must_come_in_pairs() {
    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"

[[pools.db.users]]
username = "app"
auth_mode = "none"
server_username = "storage"
"#,
    );
    assert!(matches!(config.validate(), Err(Error::BadConfig(_))));
}

#[test]
fn pools_must_have_users() {
    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"
"#,
    );
    assert!(matches!(config.validate(), Err(Error::BadConfig(_))));
}

#[test]
fn duplicate_users_in_a_pool_are_rejected() {
    let config = parse_toml(
        r#"
[pools.db]
server_host = "10.0.0.1"

[[pools.db.users]]
username = "app"
auth_mode = "none"

[[pools.db.users]]
username = "app"
auth_mode = "none"
"#,
    );
    assert!(matches!(config.validate(), Err(Error::BadConfig(_))));
}

#[test]
fn tls_files_must_come_in_pairs() {
    let config = parse_toml(
        r#"
[general]
tls_certificate = "server.pem"
"#,
    );
    assert!(matches!(config.validate(), Err(Error::BadConfig(_))));
}

#[tokio::test]
async fn parse_loads_and_publishes_the_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(VALID_CONFIG.as_bytes()).unwrap();
    let path = file.path().to_str().unwrap().to_string();

    parse(&path).await.unwrap();

    let config = get_config();
    assert_eq!(config.path, path);
    assert!(config.pools.contains_key("marketplace"));
}

#[tokio::test]
async fn parse_rejects_a_missing_file() {
    assert!(matches!(
        parse("/nonexistent/pg_usher.toml").await,
        Err(Error::BadConfig(_))
    ));
}
