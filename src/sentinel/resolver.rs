//! Connection Resolution
//!
//! Operators hand the exporter Sentinel addresses in whatever form their tooling
//! produces: `redis://:secret@sentinel:26379`, `tcp://10.0.0.5:26379`,
//! `unix:///var/run/sentinel.sock` or a bare `sentinel:26379`. The resolver tries
//! each interpretation in turn and returns the first connection that opens.
//!
//! # Resolution Order
//!
//! 1. The whole address as a `redis://` / `rediss://` URI
//! 2. `network://address` split on the scheme separator, dialed on that network
//! 3. The whole address as a bare host dialed over TCP
//!
//! Step 2 and step 3 are exclusive: an address containing exactly one `://`
//! never falls through to the bare-host dial. When every attempt fails the
//! error of the last attempt is returned.

use crate::error::{ExporterError, Result};
use crate::options::Options;
use tracing::debug;

/// Network used when the address carries no scheme
pub const DEFAULT_NETWORK: &str = "tcp";

/// Port used when a URI names no port
pub const DEFAULT_SENTINEL_PORT: u16 = 26379;

/// A transport able to open connections to a Sentinel
///
/// Every attempt receives the same [`Options`]: timeouts, password and TLS
/// material are identical across the fallbacks.
pub trait Dialer {
    type Conn;

    /// Dial a complete `redis://` or `rediss://` URI
    fn dial_url(&self, url: &str, options: &Options) -> Result<Self::Conn>;

    /// Dial `address` on an explicit network (`tcp`, `unix`)
    fn dial(&self, network: &str, address: &str, options: &Options) -> Result<Self::Conn>;
}

/// Opens connections for heterogeneous address forms
#[derive(Debug, Clone, Default)]
pub struct ConnectionResolver<D> {
    dialer: D,
}

impl<D: Dialer> ConnectionResolver<D> {
    pub fn new(dialer: D) -> Self {
        Self { dialer }
    }

    /// Open a connection to `address`, trying each address form in order
    pub fn resolve(&self, address: &str, options: &Options) -> Result<D::Conn> {
        debug!("Trying URI dial: {}", address);
        let err = match self.dialer.dial_url(address, options) {
            Ok(conn) => return Ok(conn),
            Err(e) => e,
        };
        debug!("URI dial failed: {}", err);

        let frags: Vec<&str> = address.split("://").collect();
        let result = if let [network, host] = frags.as_slice() {
            debug!("Trying dial: {} {}", network, host);
            self.dialer.dial(network, host, options)
        } else {
            debug!("Trying dial: {} {}", DEFAULT_NETWORK, address);
            self.dialer.dial(DEFAULT_NETWORK, address, options)
        };

        match result {
            Ok(conn) => {
                debug!("Connected to: {}", address);
                Ok(conn)
            }
            Err(e) => {
                debug!("Aborting for addr: {} - redis sentinel err: {}", address, e);
                Err(e)
            }
        }
    }
}

/// A parsed `redis://` or `rediss://` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisUrl {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: u32,
}

impl RedisUrl {
    /// Parse `scheme://[user[:password]@]host[:port][/db]`
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| ExporterError::InvalidAddress(format!("{}: missing scheme", url)))?;

        let tls = match scheme.to_ascii_lowercase().as_str() {
            "redis" => false,
            "rediss" => true,
            other => {
                return Err(ExporterError::InvalidAddress(format!(
                    "invalid redis URL scheme: {}",
                    other
                )))
            }
        };

        // Query and fragment carry nothing we use
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (rest, ""),
        };

        let (userinfo, host_port) = match authority.rsplit_once('@') {
            Some((userinfo, host_port)) => (Some(userinfo), host_port),
            None => (None, authority),
        };

        let (username, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (non_empty(percent_decode(user)), Some(percent_decode(pass))),
                None => (non_empty(percent_decode(info)), None),
            },
            None => (None, None),
        };

        let (host, port) = split_host_port(host_port)?;
        let host = if host.is_empty() {
            "localhost".to_string()
        } else {
            host.to_string()
        };

        let db_str = path.trim_matches('/');
        let db = if db_str.is_empty() {
            0
        } else {
            db_str.parse().map_err(|_| {
                ExporterError::InvalidAddress(format!("invalid database: {}", db_str))
            })?
        };

        Ok(Self {
            tls,
            host,
            port: port.unwrap_or(DEFAULT_SENTINEL_PORT),
            username,
            password,
            db,
        })
    }

    /// `host:port` suitable for socket address resolution
    pub fn host_port(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn split_host_port(host_port: &str) -> Result<(&str, Option<u16>)> {
    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']').ok_or_else(|| {
            ExporterError::InvalidAddress(format!("unterminated IPv6 host: {}", host_port))
        })?;
        (host, after.strip_prefix(':'))
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    let port = match port.filter(|p| !p.is_empty()) {
        Some(p) => Some(
            p.parse::<u16>()
                .map_err(|_| ExporterError::InvalidAddress(format!("invalid port: {}", p)))?,
        ),
        None => None,
    };

    Ok((host, port))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
