//! # Connection Address Resolution
//!
//! Parses and validates `fernq://` connection URLs.
//!
//! ## URL Form
//! ```text
//! fernq://[user@]host[:port]/<roomId>#<roomName>[?room_pass=<password>]
//! ```
//!
//! Only the direct `user@host` form is accepted. The `room_pass` query may sit
//! after the fragment (the relay's documented placement) or in the usual
//! position before it.
//!
//! ## Validation
//! - IPv4 and bracketed IPv6 literals go through the standard address parsers
//! - Domain names: letters, digits, `-` and `.` only, at most 253 characters,
//!   and not made only of digits and dots
//! - Domain names are never resolved here; DNS belongs to the transport
//! - Missing port defaults to 9147
//!
//! Every failure is reported as [`ProtocolError::InvalidAddress`]; no partial
//! address is ever returned.

use crate::config::{DEFAULT_PORT, URL_SCHEME};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::message::{create_room_verify, parse_room_verify};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::{debug, instrument};
use url::{Host, Url};

/// Longest domain name accepted, per RFC 1035
const MAX_DOMAIN_LEN: usize = 253;

/// Query parameter carrying the room password
const ROOM_PASS_PARAM: &str = "room_pass";

/// Relay host as written in the connection URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayHost {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Domain(String),
}

impl fmt::Display for RelayHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayHost::Ipv4(addr) => write!(f, "{addr}"),
            RelayHost::Ipv6(addr) => write!(f, "[{addr}]"),
            RelayHost::Domain(name) => f.write_str(name),
        }
    }
}

/// Fully validated connection URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUrl {
    /// User part before `@`, empty when absent
    pub username: String,
    pub host: RelayHost,
    pub port: u16,
    pub room_id: String,
    /// Percent-decoded room name from the fragment
    pub room_name: String,
    /// Empty when the URL carries no `room_pass`
    pub password: String,
}

impl RoomUrl {
    /// Dialable `host:port`, with IPv6 literals bracketed
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Output of [`resolve`]: where to dial and what to send first.
#[derive(Debug, Clone)]
pub struct ResolvedAddress {
    pub address: String,
    pub room_name: String,
    pub verify_frame: Vec<u8>,
}

/// Room membership details recovered from a join request (relay side).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub client_id: String,
    pub username: String,
    pub room_id: String,
    pub room_name: String,
    pub password: String,
    pub address: String,
}

fn invalid(reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidAddress(reason.into())
}

fn percent_decode(field: &str, raw: &str) -> Result<String> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| invalid(format!("{field} is not valid UTF-8 after decoding: {e}")))
}

/// Check a domain name against the relay's accepted syntax.
pub fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(invalid(constants::ERR_MISSING_HOST));
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(invalid(constants::ERR_DOMAIN_TOO_LONG));
    }
    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(invalid(format!(
            "{}: {domain}",
            constants::ERR_DOMAIN_CHARSET
        )));
    }
    if domain.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid(format!(
            "{}: {domain}",
            constants::ERR_DOMAIN_NUMERIC
        )));
    }
    Ok(())
}

fn classify_host(host: Host<&str>) -> Result<RelayHost> {
    match host {
        Host::Ipv4(addr) => Ok(RelayHost::Ipv4(addr)),
        Host::Ipv6(addr) => Ok(RelayHost::Ipv6(addr)),
        Host::Domain(name) => {
            if let Ok(addr) = name.parse::<Ipv4Addr>() {
                return Ok(RelayHost::Ipv4(addr));
            }
            validate_domain(name)?;
            Ok(RelayHost::Domain(name.to_owned()))
        }
    }
}

/// Parse and validate a connection URL.
pub fn parse_url(raw: &str) -> Result<RoomUrl> {
    let has_scheme = raw
        .split_once("://")
        .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case(URL_SCHEME));
    if !has_scheme {
        return Err(invalid(constants::ERR_MISSING_SCHEME));
    }

    let url = Url::parse(raw).map_err(|e| invalid(format!("malformed URL: {e}")))?;

    let host = url
        .host()
        .ok_or_else(|| invalid(constants::ERR_MISSING_HOST))?;
    let host = classify_host(host)?;

    let port = match url.port() {
        Some(0) => return Err(invalid("port must be non-zero")),
        Some(port) => port,
        None => DEFAULT_PORT,
    };

    let room_id = url.path().trim_matches('/');
    if room_id.is_empty() {
        return Err(invalid(constants::ERR_MISSING_ROOM_ID));
    }
    let room_id = percent_decode("room id", room_id)?;

    let fragment = url
        .fragment()
        .ok_or_else(|| invalid(constants::ERR_MISSING_ROOM_NAME))?;
    let (name_part, trailing_query) = match fragment.split_once('?') {
        Some((name, query)) => (name, Some(query)),
        None => (fragment, None),
    };
    if name_part.is_empty() {
        return Err(invalid(constants::ERR_MISSING_ROOM_NAME));
    }
    let room_name = percent_decode("room name", name_part)?;

    let password = trailing_query
        .into_iter()
        .chain(url.query())
        .flat_map(|query| url::form_urlencoded::parse(query.as_bytes()))
        .find(|(key, _)| key == ROOM_PASS_PARAM)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    let username = percent_decode("user", url.username())?;

    Ok(RoomUrl {
        username,
        host,
        port,
        room_id,
        room_name,
        password,
    })
}

/// Resolve a connection URL into a dialable address and the join frame.
///
/// # Errors
/// Returns `ProtocolError::InvalidAddress` for any malformed URL or host.
#[instrument(skip(url), fields(client_id = %client_id))]
pub fn resolve(url: &str, client_id: &str) -> Result<ResolvedAddress> {
    let parsed = parse_url(url)?;
    let address = parsed.address();
    debug!(%address, room = %parsed.room_name, "Resolved connection URL");

    Ok(ResolvedAddress {
        address,
        room_name: parsed.room_name,
        verify_frame: create_room_verify(client_id, url),
    })
}

/// Decode a join frame body and re-validate the embedded URL (relay side).
///
/// # Errors
/// Envelope decode failures, or `InvalidAddress` when the token is not a
/// valid connection URL.
pub fn extract_info(verify_payload: &[u8]) -> Result<RoomInfo> {
    let envelope = parse_room_verify(verify_payload)?;
    let parsed = parse_url(&envelope.token)?;
    let address = parsed.address();

    Ok(RoomInfo {
        client_id: envelope.client_id,
        username: parsed.username,
        room_id: parsed.room_id,
        room_name: parsed.room_name,
        password: parsed.password,
        address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_default_port() {
        let url = parse_url("fernq://alice@127.0.0.1/r#room").unwrap();
        assert_eq!(url.address(), "127.0.0.1:9147");
        assert_eq!(url.username, "alice");
        assert_eq!(url.host, RelayHost::Ipv4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_ipv6_bracketed() {
        let url = parse_url("fernq://alice@[::1]:8080/r#room").unwrap();
        assert_eq!(url.address(), "[::1]:8080");
    }

    #[test]
    fn test_password_after_fragment() {
        let url = parse_url("fernq://alice@127.0.0.1/uuid#test?room_pass=123456").unwrap();
        assert_eq!(url.room_name, "test");
        assert_eq!(url.password, "123456");
    }

    #[test]
    fn test_password_before_fragment() {
        let url = parse_url("fernq://alice@127.0.0.1/uuid?room_pass=s3cret#test").unwrap();
        assert_eq!(url.room_name, "test");
        assert_eq!(url.password, "s3cret");
    }

    #[test]
    fn test_missing_password_is_empty() {
        let url = parse_url("fernq://alice@127.0.0.1/uuid#test").unwrap();
        assert_eq!(url.password, "");
    }

    #[test]
    fn test_room_name_percent_decoded() {
        let url = parse_url("fernq://alice@127.0.0.1/uuid#my%20room").unwrap();
        assert_eq!(url.room_name, "my room");
    }

    #[test]
    fn test_user_is_optional() {
        let url = parse_url("fernq://node.example.com:7000/uuid#room").unwrap();
        assert_eq!(url.username, "");
        assert_eq!(url.address(), "node.example.com:7000");
    }

    #[test]
    fn test_rejects_wrong_scheme() {
        let err = parse_url("tcp://alice@127.0.0.1/r#room").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_rejects_missing_fragment() {
        assert!(parse_url("fernq://alice@127.0.0.1/r").is_err());
        assert!(parse_url("fernq://alice@127.0.0.1/r#").is_err());
        assert!(parse_url("fernq://alice@127.0.0.1/r#?room_pass=1").is_err());
    }

    #[test]
    fn test_rejects_missing_room_id() {
        assert!(parse_url("fernq://alice@127.0.0.1#room").is_err());
        assert!(parse_url("fernq://alice@127.0.0.1/#room").is_err());
    }

    #[test]
    fn test_rejects_bad_ipv4_shaped_host() {
        assert!(parse_url("fernq://alice@999.1.1.1/r#room").is_err());
        assert!(parse_url("fernq://alice@1.2.3/r#room").is_err());
    }

    #[test]
    fn test_rejects_domain_charset() {
        assert!(validate_domain("node_1.example.com").is_err());
        assert!(validate_domain("node.example.com").is_ok());
        assert!(validate_domain("relay-01").is_ok());
    }

    #[test]
    fn test_rejects_long_domain() {
        let long = format!("{}.com", "a".repeat(250));
        assert!(validate_domain(&long).is_err());
    }

    #[test]
    fn test_resolve_embeds_url_and_identity() {
        let url = "fernq://alice@127.0.0.1/uuid#lobby?room_pass=pw";
        let resolved = resolve(url, "client-7").unwrap();
        assert_eq!(resolved.address, "127.0.0.1:9147");
        assert_eq!(resolved.room_name, "lobby");

        let frame = crate::core::frame::Frame::from_bytes(&resolved.verify_frame).unwrap();
        assert_eq!(frame.code, 0x9E);
        let info = extract_info(&frame.payload).unwrap();
        assert_eq!(info.client_id, "client-7");
        assert_eq!(info.username, "alice");
        assert_eq!(info.room_id, "uuid");
        assert_eq!(info.room_name, "lobby");
        assert_eq!(info.password, "pw");
        assert_eq!(info.address, "127.0.0.1:9147");
    }
}
