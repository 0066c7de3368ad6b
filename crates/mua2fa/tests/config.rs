//! Loading and repairing `mua2fa-server.toml` on disk.

use mua2fa::{ConfigError, DEFAULT_PORT, ServerConfig};
use mua2fa_oauth::Period;

fn read_table(path: &std::path::Path) -> toml::Table {
    std::fs::read_to_string(path).unwrap().parse().unwrap()
}

// =========================================================================
// Creation and persistence
// =========================================================================

#[test]
fn test_load_missing_file_writes_every_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mua2fa-server.toml");

    let config = ServerConfig::load(&path).unwrap();

    assert_eq!(config.validity_period, Period::years(1));
    assert_eq!(config.external_uri.as_str(), "http://localhost:58888/");
    assert_eq!(config.internal_address.port, DEFAULT_PORT);
    assert!(config.http_enabled());
    assert!(!config.require_union_auth);
    assert_eq!(config.client_id, "${MUA_UNION_AUTH_CLIENT_ID}");

    let table = read_table(&path);
    for (section, key) in [
        ("token", "secretSignKey"),
        ("token", "validityPeriod"),
        ("server", "externalUri"),
        ("server", "internalAddress"),
        ("mua", "requireUnionAuth"),
        ("mua", "unionAuthClientId"),
        ("mua", "unionAuthClientSecret"),
    ] {
        assert!(table[section].get(key).is_some(), "{section}.{key}");
    }
}

#[test]
fn test_load_twice_keeps_generated_sign_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mua2fa-server.toml");

    let first = ServerConfig::load(&path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    let second = ServerConfig::load(&path).unwrap();

    assert_eq!(first.sign_key.public(), second.sign_key.public());
    // nothing to correct the second time
    assert_eq!(std::fs::read_to_string(&path).unwrap(), written);
}

// =========================================================================
// Corrections
// =========================================================================

#[test]
fn test_load_corrects_invalid_values_and_keeps_valid_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mua2fa-server.toml");
    std::fs::write(
        &path,
        r#"
[token]
validityPeriod = "-P1D"

[server]
externalUri = "https://mc.example.com/mua/"
internalAddress = "not an address:x"

[mua]
requireUnionAuth = true
unionAuthClientId = "client-1"
"#,
    )
    .unwrap();

    let config = ServerConfig::load(&path).unwrap();

    assert_eq!(config.validity_period, Period::years(1));
    assert_eq!(config.internal_address.to_string(), "0.0.0.0:58888");
    assert_eq!(config.external_uri.as_str(), "https://mc.example.com/mua/");
    assert!(config.require_union_auth);
    assert_eq!(config.client_id, "client-1");

    let table = read_table(&path);
    assert_eq!(table["token"]["validityPeriod"].as_str(), Some("P1Y"));
    assert_eq!(table["mua"]["unionAuthClientId"].as_str(), Some("client-1"));
}

#[test]
fn test_load_keeps_unresolved_variable_literal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mua2fa-server.toml");
    std::fs::write(
        &path,
        "[mua]\nunionAuthClientSecret = \"${MUA2FA_TEST_VARIABLE_THAT_IS_NEVER_SET}\"\n",
    )
    .unwrap();

    let config = ServerConfig::load(&path).unwrap();
    assert_eq!(
        config.client_secret,
        "${MUA2FA_TEST_VARIABLE_THAT_IS_NEVER_SET}"
    );
}

#[test]
fn test_load_port_zero_disables_http() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mua2fa-server.toml");
    std::fs::write(&path, "[server]\ninternalAddress = \"127.0.0.1:0\"\n").unwrap();

    let config = ServerConfig::load(&path).unwrap();
    assert!(!config.http_enabled());
}

#[test]
fn test_load_syntax_error_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mua2fa-server.toml");
    std::fs::write(&path, "[token\nsecretSignKey = ").unwrap();

    assert!(matches!(
        ServerConfig::load(&path),
        Err(ConfigError::Parse(_))
    ));
}

// =========================================================================
// Derived settings
// =========================================================================

#[test]
fn test_session_config_resolves_endpoints_under_external_uri() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mua2fa-server.toml");
    std::fs::write(
        &path,
        "[server]\nexternalUri = \"https://mc.example.com/mua/\"\n",
    )
    .unwrap();

    let config = ServerConfig::load(&path).unwrap();
    let session = config.session_config().unwrap();
    assert_eq!(session.auth_uri, "https://mc.example.com/mua/redirect");
    assert_eq!(session.record_uri, "https://mc.example.com/mua/record");

    let oauth = config.oauth_config();
    assert_eq!(oauth.external_uri, "https://mc.example.com/mua/");
    assert_eq!(oauth.validity_period, Period::years(1));
}
