//! Server configuration: a TOML file that repairs itself.
//!
//! ```toml
//! [token]
//! secretSignKey = "…40 base-85 chars…"
//! validityPeriod = "P1Y"
//!
//! [server]
//! externalUri = "http://localhost:58888/"
//! internalAddress = "0.0.0.0:58888"
//!
//! [mua]
//! requireUnionAuth = false
//! unionAuthClientId = "${MUA_UNION_AUTH_CLIENT_ID}"
//! unionAuthClientSecret = "${MUA_UNION_AUTH_CLIENT_SECRET}"
//! ```
//!
//! String values may reference environment variables as `${NAME}`; unset
//! ones stay literal. A missing or invalid value is replaced by its default
//! and the file is written back, so loading never fails on content. Only
//! I/O and TOML syntax errors are reported.

use std::fs;
use std::io;
use std::path::Path;

use chrono::TimeDelta;
use mua2fa_oauth::{OAuthConfig, OAuthError, Period, Url, user_agent};
use mua2fa_protocol::{Hash, ProtocolError};
use mua2fa_record::{KeyPair, NETWORK_TOLERANCE, POLL_INTERVAL};
use mua2fa_session::{MUA_REQUEST_COUNTDOWN, SessionConfig};
use toml::{Table, Value};

pub const DEFAULT_PORT: u16 = 58888;

const SIGN_KEY_LEN: usize = 40;
const DEFAULT_EXTERNAL_URI: &str = "http://localhost:58888/";
const DEFAULT_INTERNAL_ADDRESS: &str = "0.0.0.0:58888";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config i/o: {0}")]
    Io(#[from] io::Error),

    #[error("config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config write: {0}")]
    Write(#[from] toml::ser::Error),

    /// Generating a replacement sign key failed to encode.
    #[error(transparent)]
    Key(#[from] ProtocolError),

    /// A built-in default did not parse.
    #[error("invalid default: {0}")]
    Default(String),
}

/// `host:port` for the HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAndPort {
    pub host: String,
    pub port: u16,
}

impl HostAndPort {
    /// Parses `host`, `host:port`, `[v6]`, or `[v6]:port`; the port
    /// defaults to [`DEFAULT_PORT`].
    pub fn parse(input: &str) -> Option<Self> {
        let (host, port) = if let Some(rest) = input.strip_prefix('[') {
            let (host, after) = rest.split_once(']')?;
            match after {
                "" => (host, None),
                _ => (host, Some(after.strip_prefix(':')?)),
            }
        } else {
            match input.split_once(':') {
                Some((host, port)) if !port.contains(':') => (host, Some(port)),
                // a bare IPv6 address
                Some(_) => (input, None),
                None => (input, None),
            }
        };
        if host.is_empty() || host.chars().any(char::is_whitespace) {
            return None;
        }
        let port = match port {
            Some(p) => p.parse().ok()?,
            None => DEFAULT_PORT,
        };
        Some(Self {
            host: host.to_owned(),
            port,
        })
    }
}

impl std::fmt::Display for HostAndPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// The validated server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub sign_key: KeyPair,
    pub validity_period: Period,
    pub external_uri: Url,
    pub internal_address: HostAndPort,
    pub require_union_auth: bool,
    pub client_id: String,
    pub client_secret: String,
}

impl ServerConfig {
    /// Loads `path`, creating it if missing and rewriting it if anything
    /// had to be corrected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut table = match fs::read_to_string(path) {
            Ok(text) => text.parse::<Table>()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Table::new(),
            Err(e) => return Err(e.into()),
        };
        let (config, corrected) = resolve(&mut table)?;
        if !corrected.is_empty() {
            tracing::info!(path = %path.display(), keys = ?corrected, "corrected server config");
            fs::write(path, toml::to_string_pretty(&table)?)?;
        }
        Ok(config)
    }

    /// Port 0 turns the HTTP server off.
    pub fn http_enabled(&self) -> bool {
        self.internal_address.port != 0
    }

    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            internal_address: self.internal_address.to_string(),
            external_uri: self.external_uri.to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            validity_period: self.validity_period,
            poll_interval: to_std(POLL_INTERVAL),
            network_tolerance: to_std(NETWORK_TOLERANCE),
            user_agent: user_agent(),
            ..OAuthConfig::default()
        }
    }

    pub fn session_config(&self) -> Result<SessionConfig, OAuthError> {
        Ok(SessionConfig {
            request_countdown: MUA_REQUEST_COUNTDOWN,
            poll_interval: POLL_INTERVAL,
            network_tolerance: NETWORK_TOLERANCE,
            require_union_auth: self.require_union_auth,
            auth_uri: mua2fa_oauth::auth_uri(&self.external_uri)?.to_string(),
            record_uri: mua2fa_oauth::record_uri(&self.external_uri)?.to_string(),
        })
    }
}

fn to_std(delta: TimeDelta) -> std::time::Duration {
    delta.to_std().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Keys and corrections
// ---------------------------------------------------------------------------

struct Key {
    section: &'static str,
    name: &'static str,
}

const SECRET_SIGN_KEY: Key = Key { section: "token", name: "secretSignKey" };
const VALIDITY_PERIOD: Key = Key { section: "token", name: "validityPeriod" };
const EXTERNAL_URI: Key = Key { section: "server", name: "externalUri" };
const INTERNAL_ADDRESS: Key = Key { section: "server", name: "internalAddress" };
const REQUIRE_UNION_AUTH: Key = Key { section: "mua", name: "requireUnionAuth" };
const CLIENT_ID: Key = Key { section: "mua", name: "unionAuthClientId" };
const CLIENT_SECRET: Key = Key { section: "mua", name: "unionAuthClientSecret" };

fn lookup<'a>(table: &'a Table, key: &Key) -> Option<&'a Value> {
    table.get(key.section)?.as_table()?.get(key.name)
}

/// Reads every key, writing the default back into `table` wherever a
/// value is missing or invalid. Also returns the dotted names of the keys
/// it corrected.
fn resolve(table: &mut Table) -> Result<(ServerConfig, Vec<String>), ConfigError> {
    let mut corrected = Vec::new();
    let mut fix = |table: &mut Table, key: &Key, default: Value| {
        let section = table
            .entry(key.section)
            .or_insert_with(|| Value::Table(Table::new()));
        if !section.is_table() {
            *section = Value::Table(Table::new());
        }
        if let Value::Table(section) = section {
            section.insert(key.name.to_owned(), default);
        }
        corrected.push(format!("{}.{}", key.section, key.name));
    };

    let validity_period = match text(table, &VALIDITY_PERIOD).and_then(parse_period) {
        Some(period) => period,
        None => {
            let period = Period::years(1);
            fix(table, &VALIDITY_PERIOD, Value::from(period.to_string()));
            period
        }
    };

    let sign_key = match text(table, &SECRET_SIGN_KEY).and_then(parse_sign_key) {
        Some(keys) => keys,
        None => {
            let keys = KeyPair::generate();
            fix(table, &SECRET_SIGN_KEY, Value::from(keys.seed().to_base85()?));
            keys
        }
    };

    let external_uri = match text(table, &EXTERNAL_URI).and_then(parse_uri) {
        Some(uri) => uri,
        None => {
            fix(table, &EXTERNAL_URI, Value::from(DEFAULT_EXTERNAL_URI));
            Url::parse(DEFAULT_EXTERNAL_URI).map_err(|e| ConfigError::Default(e.to_string()))?
        }
    };

    let internal_address = match text(table, &INTERNAL_ADDRESS).and_then(parse_address) {
        Some(address) => address,
        None => {
            fix(table, &INTERNAL_ADDRESS, Value::from(DEFAULT_INTERNAL_ADDRESS));
            HostAndPort {
                host: "0.0.0.0".to_owned(),
                port: DEFAULT_PORT,
            }
        }
    };

    let require_union_auth = match lookup(table, &REQUIRE_UNION_AUTH).and_then(Value::as_bool) {
        Some(required) => required,
        None => {
            fix(table, &REQUIRE_UNION_AUTH, Value::from(false));
            false
        }
    };

    let mut ascii = |table: &mut Table, key: &Key, default: &str| {
        match text(table, key).and_then(parse_ascii) {
            Some(value) => value,
            None => {
                fix(table, key, Value::from(default));
                parse_ascii(default).unwrap_or_default()
            }
        }
    };
    let client_id = ascii(table, &CLIENT_ID, "${MUA_UNION_AUTH_CLIENT_ID}");
    let client_secret = ascii(table, &CLIENT_SECRET, "${MUA_UNION_AUTH_CLIENT_SECRET}");

    let config = ServerConfig {
        sign_key,
        validity_period,
        external_uri,
        internal_address,
        require_union_auth,
        client_id,
        client_secret,
    };
    Ok((config, corrected))
}

fn text<'a>(table: &'a Table, key: &Key) -> Option<&'a str> {
    lookup(table, key).and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Value parsers
// ---------------------------------------------------------------------------

/// Expands `${NAME}` from the environment; unknown names stay as written.
pub fn substitute(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn parse_period(input: &str) -> Option<Period> {
    substitute(input)
        .parse::<Period>()
        .ok()
        .filter(|p| !p.is_negative())
}

fn parse_sign_key(input: &str) -> Option<KeyPair> {
    let input = substitute(input);
    if input.len() != SIGN_KEY_LEN {
        return None;
    }
    let seed = Hash::from_base85(&input).ok()?;
    KeyPair::from_seed(&seed).ok()
}

fn parse_uri(input: &str) -> Option<Url> {
    Url::parse(&substitute(input))
        .ok()
        .filter(|uri| matches!(uri.scheme(), "http" | "https") && uri.has_host())
}

fn parse_address(input: &str) -> Option<HostAndPort> {
    HostAndPort::parse(&substitute(input))
}

fn parse_ascii(input: &str) -> Option<String> {
    let value = substitute(input).trim().to_owned();
    value
        .chars()
        .all(|c| (' '..='~').contains(&c))
        .then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_with_known_and_unknown_names() {
        let lookup = |name: &str| (name == "ID").then(|| "abc".to_owned());
        assert_eq!(substitute_with("x-${ID}-y", lookup), "x-abc-y");
        assert_eq!(substitute_with("${NOPE}", lookup), "${NOPE}");
        assert_eq!(substitute_with("${ID}${ID}", lookup), "abcabc");
        assert_eq!(substitute_with("tail ${ID", lookup), "tail ${ID");
    }

    #[test]
    fn test_host_and_port_forms() {
        assert_eq!(
            HostAndPort::parse("0.0.0.0:58888"),
            Some(HostAndPort { host: "0.0.0.0".into(), port: 58888 })
        );
        assert_eq!(HostAndPort::parse("example.com").unwrap().port, DEFAULT_PORT);
        assert_eq!(HostAndPort::parse("[::1]:8080").unwrap().host, "::1");
        assert_eq!(HostAndPort::parse("::1").unwrap().port, DEFAULT_PORT);
        assert_eq!(HostAndPort::parse("host:0").unwrap().port, 0);
        assert_eq!(HostAndPort::parse("[::1]:80").unwrap().to_string(), "[::1]:80");
        for bad in ["", ":80", "host:99999", "host:x", "[::1", "a b:1"] {
            assert!(HostAndPort::parse(bad).is_none(), "{bad:?}");
        }
    }

    #[test]
    fn test_parse_uri_requires_web_scheme() {
        assert!(parse_uri("https://mc.example.com/mua/").is_some());
        assert!(parse_uri("ftp://mc.example.com/").is_none());
        assert!(parse_uri("not a uri").is_none());
    }

    #[test]
    fn test_parse_period_rejects_negative() {
        assert_eq!(parse_period("P6M"), Some(Period::new(0, 6, 0)));
        assert!(parse_period("-P1D").is_none());
    }

    #[test]
    fn test_parse_ascii_trims_and_rejects_control() {
        assert_eq!(parse_ascii("  id-1 ").as_deref(), Some("id-1"));
        assert!(parse_ascii("tab\there").is_none());
        assert!(parse_ascii("ünicode").is_none());
    }

    #[test]
    fn test_resolve_fills_empty_table() {
        let mut table = Table::new();
        let (first, corrected) = resolve(&mut table).unwrap();
        assert_eq!(corrected.len(), 7);

        let (second, corrected) = resolve(&mut table).unwrap();
        assert!(corrected.is_empty());
        assert_eq!(first.sign_key.public(), second.sign_key.public());
        assert_eq!(text(&table, &SECRET_SIGN_KEY).unwrap().len(), SIGN_KEY_LEN);
        assert_eq!(second.internal_address.to_string(), DEFAULT_INTERNAL_ADDRESS);
    }

    #[test]
    fn test_resolve_replaces_wrong_types_only() {
        let mut table: Table = r#"
            [token]
            validityPeriod = 5
            [server]
            externalUri = "https://mc.example.com/"
            [mua]
            requireUnionAuth = "yes"
        "#
        .parse()
        .unwrap();
        let (config, corrected) = resolve(&mut table).unwrap();
        assert_eq!(config.validity_period, Period::years(1));
        assert_eq!(config.external_uri.as_str(), "https://mc.example.com/");
        assert!(corrected.contains(&"token.validityPeriod".to_owned()));
        assert!(corrected.contains(&"mua.requireUnionAuth".to_owned()));
        assert!(!corrected.contains(&"server.externalUri".to_owned()));
    }
}
