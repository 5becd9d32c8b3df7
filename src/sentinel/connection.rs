//! Sentinel Connection
//!
//! A short-lived, blocking connection used for exactly one scrape. Each scrape
//! dials, optionally authenticates, issues `INFO` and drops the connection;
//! nothing is pooled or reused between scrapes.

use crate::error::{ExporterError, Result};
use crate::options::Options;
use crate::sentinel::resolver::{Dialer, RedisUrl};
use crate::sentinel::resp::{self, RespValue};
use native_tls::{TlsConnector, TlsStream};
use secrecy::ExposeSecret;
use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Transport underneath a [`SentinelConnection`]
enum Stream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            Stream::Tls(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            Stream::Tls(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            Stream::Tls(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

/// An open connection to a Sentinel instance
///
/// The socket is closed when the connection is dropped, so a scrape releases it
/// on every exit path.
pub struct SentinelConnection {
    stream: BufReader<Stream>,
    peer: String,
}

impl SentinelConnection {
    /// Open a plain TCP connection to `address` (`host:port`)
    pub fn connect_tcp(address: &str, options: &Options) -> Result<Self> {
        let tcp = tcp_connect(address, options.connection_timeout)?;
        Ok(Self::from_stream(Stream::Tcp(tcp), address))
    }

    /// Open a TLS connection to `address`, verifying the certificate against `host`
    pub fn connect_tls(host: &str, address: &str, options: &Options) -> Result<Self> {
        let mut builder = TlsConnector::builder();

        if options.tls.skip_verification {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        for cert in &options.tls.ca_certificates {
            builder.add_root_certificate(cert.clone());
        }
        if let Some(identity) = &options.tls.client_identity {
            builder.identity(identity.clone());
        }

        let connector = builder
            .build()
            .map_err(|e| ExporterError::Tls(format!("Failed to build TLS connector: {}", e)))?;

        let tcp = tcp_connect(address, options.connection_timeout)?;
        let tls = connector
            .connect(host, tcp)
            .map_err(|e| ExporterError::Tls(format!("TLS handshake with {} failed: {}", address, e)))?;

        Ok(Self::from_stream(Stream::Tls(Box::new(tls)), address))
    }

    /// Open a Unix-domain socket connection to `path`
    #[cfg(unix)]
    pub fn connect_unix(path: &str, options: &Options) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .map_err(|e| ExporterError::Connection(format!("dial unix {}: {}", path, e)))?;
        let timeout = socket_timeout(options.connection_timeout);
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        Ok(Self::from_stream(Stream::Unix(stream), path))
    }

    fn from_stream(stream: Stream, peer: &str) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer: peer.to_string(),
        }
    }

    /// Address this connection was opened against
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one command and read its reply
    fn command(&mut self, args: &[&str]) -> Result<RespValue> {
        let encoded = resp::encode_command(args);
        let inner = self.stream.get_mut();
        inner
            .write_all(&encoded)
            .and_then(|_| inner.flush())
            .map_err(|e| ExporterError::Command(format!("{} to {}: {}", args[0], self.peer, e)))?;

        resp::decode(&mut self.stream)
            .map_err(|e| ExporterError::Command(format!("{} from {}: {}", args[0], self.peer, e)))
    }

    /// Authenticate with `AUTH [username] password`
    pub fn authenticate(&mut self, username: Option<&str>, password: &str) -> Result<()> {
        let reply = match username {
            Some(user) => self.command(&["AUTH", user, password])?,
            None => self.command(&["AUTH", password])?,
        };
        match reply {
            RespValue::Error(msg) => Err(ExporterError::Auth(msg)),
            _ => Ok(()),
        }
    }

    /// Switch to database `db`
    pub fn select(&mut self, db: u32) -> Result<()> {
        match self.command(&["SELECT", &db.to_string()])? {
            RespValue::Error(msg) => Err(ExporterError::Command(format!("SELECT {}: {}", db, msg))),
            _ => Ok(()),
        }
    }

    /// Issue `INFO` and return the raw status report
    pub fn info(&mut self) -> Result<String> {
        match self.command(&["INFO"])? {
            RespValue::Error(msg) => Err(ExporterError::Command(format!("INFO: {}", msg))),
            reply => reply.into_string().ok_or_else(|| {
                ExporterError::Command("INFO: unexpected reply type".to_string())
            }),
        }
    }
}

impl Drop for SentinelConnection {
    fn drop(&mut self) {
        if let Stream::Tls(tls) = self.stream.get_mut() {
            let _ = tls.shutdown();
        }
        debug!("Closed connection to {}", self.peer);
    }
}

/// Dialer backed by real sockets
#[derive(Debug, Clone, Copy, Default)]
pub struct SentinelDialer;

impl Dialer for SentinelDialer {
    type Conn = SentinelConnection;

    fn dial_url(&self, url: &str, options: &Options) -> Result<SentinelConnection> {
        let url = RedisUrl::parse(url)?;
        let address = url.host_port();

        let mut conn = if url.tls {
            SentinelConnection::connect_tls(&url.host, &address, options)?
        } else {
            SentinelConnection::connect_tcp(&address, options)?
        };

        // Credentials embedded in the URI win over the configured password
        let password = url
            .password
            .clone()
            .or_else(|| options.password.as_ref().map(|p| p.expose_secret().to_string()))
            .filter(|p| !p.is_empty());
        if let Some(password) = password {
            conn.authenticate(url.username.as_deref(), &password)?;
        }
        if url.db != 0 {
            conn.select(url.db)?;
        }

        Ok(conn)
    }

    fn dial(&self, network: &str, address: &str, options: &Options) -> Result<SentinelConnection> {
        let mut conn = match network {
            "tcp" | "tcp4" | "tcp6" => SentinelConnection::connect_tcp(address, options)?,
            #[cfg(unix)]
            "unix" => SentinelConnection::connect_unix(address, options)?,
            other => {
                return Err(ExporterError::Connection(format!(
                    "dial {} {}: unknown network {}",
                    other, address, other
                )))
            }
        };

        let password = options
            .password
            .as_ref()
            .map(|p| p.expose_secret())
            .filter(|p| !p.is_empty());
        if let Some(password) = password {
            conn.authenticate(None, password)?;
        }

        Ok(conn)
    }
}

fn tcp_connect(address: &str, timeout: Duration) -> Result<TcpStream> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|e| ExporterError::Connection(format!("dial tcp {}: {}", address, e)))?;

    let mut last_err = None;
    for addr in addrs {
        let attempt = if timeout.is_zero() {
            TcpStream::connect(addr)
        } else {
            TcpStream::connect_timeout(&addr, timeout)
        };
        match attempt {
            Ok(stream) => {
                stream.set_nodelay(true).ok();
                stream.set_read_timeout(socket_timeout(timeout))?;
                stream.set_write_timeout(socket_timeout(timeout))?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) => ExporterError::Connection(format!("dial tcp {}: {}", address, e)),
        None => ExporterError::Connection(format!("dial tcp {}: no addresses found", address)),
    })
}

/// A zero duration means no timeout; the socket API rejects `Some(0)`
fn socket_timeout(timeout: Duration) -> Option<Duration> {
    if timeout.is_zero() {
        None
    } else {
        Some(timeout)
    }
}
