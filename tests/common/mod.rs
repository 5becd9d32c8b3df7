//! Shared test helpers
//!
//! `FakeSentinel` is a tiny RESP server on a loopback port that answers `AUTH`,
//! `SELECT` and `INFO` the way a Sentinel would, over plain TCP, TLS or a
//! unix socket.

#![allow(dead_code)]

use native_tls::{Identity, TlsAcceptor};
use prometheus::Registry;
use redis_sentinel_exporter::metrics::{self, MetricRegistry};
use redis_sentinel_exporter::sentinel::resp::{self, RespValue};
use std::io::{BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

pub const SENTINEL_INFO: &str = "# Server\r\n\
redis_version:7.2.4\r\n\
redis_git_sha1:00000000\r\n\
redis_build_id:d2a1b8e8a1b2c3d4\r\n\
redis_mode:sentinel\r\n\
process_id:42\r\n\
uptime_in_seconds:3600\r\n\
\r\n\
# Clients\r\n\
connected_clients:3\r\n\
blocked_clients:0\r\n\
\r\n\
# Stats\r\n\
total_connections_received:120\r\n\
total_commands_processed:5000\r\n\
expired_keys:0\r\n\
\r\n\
# CPU\r\n\
used_cpu_sys:1.25\r\n\
used_cpu_user:2.50\r\n\
\r\n\
# Sentinel\r\n\
sentinel_masters:2\r\n\
sentinel_tilt:0\r\n\
sentinel_running_scripts:0\r\n\
sentinel_scripts_queue_length:0\r\n\
sentinel_simulate_failure_flags:0\r\n\
master0:name=mymaster,status=ok,address=10.0.0.1:6379,slaves=2,sentinels=3\r\n\
master1:name=cache,status=sdown,address=10.0.0.2:6379,slaves=1,sentinels=3\r\n";

/// What the fake answers to `INFO`
#[derive(Debug, Clone)]
pub enum Reply {
    Info(String),
    Error(String),
    /// Bytes written verbatim in place of a reply
    Raw(Vec<u8>),
    /// Close the connection without answering
    Hangup,
}

#[derive(Clone)]
struct Shared {
    reply: Arc<Mutex<Reply>>,
    connections: Arc<AtomicUsize>,
    commands: Arc<Mutex<Vec<Vec<String>>>>,
    password: Option<String>,
}

pub struct FakeSentinel {
    /// `host:port`, or the socket path for a unix-socket fake
    pub addr: String,
    shared: Shared,
    _dir: Option<tempfile::TempDir>,
}

impl FakeSentinel {
    pub fn start(info: &str) -> Self {
        Self::start_with_password(info, None)
    }

    pub fn start_with_password(info: &str, password: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake sentinel");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let shared = Shared::new(info, password);

        let state = shared.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                state.connections.fetch_add(1, Ordering::SeqCst);
                let state = state.clone();
                thread::spawn(move || serve(stream, state));
            }
        });

        Self {
            addr: addr.to_string(),
            shared,
            _dir: None,
        }
    }

    /// A fake that speaks TLS with the fixture server certificate
    pub fn start_tls(info: &str, password: Option<&str>) -> Self {
        let identity = Identity::from_pkcs8(&fixture("server.crt"), &fixture("server.key"))
            .expect("Failed to load server identity");
        let acceptor = Arc::new(TlsAcceptor::new(identity).expect("Failed to build acceptor"));

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake sentinel");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let shared = Shared::new(info, password);

        let state = shared.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                state.connections.fetch_add(1, Ordering::SeqCst);
                let state = state.clone();
                let acceptor = acceptor.clone();
                thread::spawn(move || {
                    if let Ok(tls) = acceptor.accept(stream) {
                        serve(tls, state);
                    }
                });
            }
        });

        Self {
            addr: addr.to_string(),
            shared,
            _dir: None,
        }
    }

    /// A fake listening on a unix-domain socket; `addr` is the socket path
    #[cfg(unix)]
    pub fn start_unix(info: &str) -> Self {
        use std::os::unix::net::UnixListener;

        let dir = tempfile::tempdir().expect("Failed to create socket dir");
        let path = dir.path().join("sentinel.sock");
        let listener = UnixListener::bind(&path).expect("Failed to bind unix socket");
        let shared = Shared::new(info, None);

        let state = shared.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                state.connections.fetch_add(1, Ordering::SeqCst);
                let state = state.clone();
                thread::spawn(move || serve(stream, state));
            }
        });

        Self {
            addr: path.display().to_string(),
            shared,
            _dir: Some(dir),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.shared.reply.lock().unwrap() = reply;
    }

    pub fn set_info(&self, info: &str) {
        self.set_reply(Reply::Info(info.to_string()));
    }

    pub fn connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Every command received so far, upper-cased command name first
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.shared.commands.lock().unwrap().clone()
    }
}

impl Shared {
    fn new(info: &str, password: Option<&str>) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Reply::Info(info.to_string()))),
            connections: Arc::new(AtomicUsize::new(0)),
            commands: Arc::new(Mutex::new(Vec::new())),
            password: password.map(str::to_string),
        }
    }
}

/// Contents of a file under `tests/fixtures/tls`
pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture_path(name)).expect("Failed to read fixture")
}

pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/tls/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn serve<S: Read + Write>(stream: S, state: Shared) {
    let mut reader = BufReader::new(stream);
    let password = state.password.as_deref();
    let mut authenticated = password.is_none();

    loop {
        let args = match resp::decode(&mut reader) {
            Ok(RespValue::Array(items)) => items
                .into_iter()
                .filter_map(RespValue::into_string)
                .collect::<Vec<_>>(),
            _ => return,
        };
        let Some(name) = args.first().map(|a| a.to_ascii_uppercase()) else {
            return;
        };
        state.commands.lock().unwrap().push(
            std::iter::once(name.clone())
                .chain(args.iter().skip(1).cloned())
                .collect(),
        );

        let response: Vec<u8> = match name.as_str() {
            "AUTH" => {
                if password == args.last().map(String::as_str) {
                    authenticated = true;
                    b"+OK\r\n".to_vec()
                } else {
                    b"-WRONGPASS invalid username-password pair\r\n".to_vec()
                }
            }
            "INFO" if !authenticated => b"-NOAUTH Authentication required.\r\n".to_vec(),
            "INFO" => match state.reply.lock().unwrap().clone() {
                Reply::Info(body) => format!("${}\r\n{}\r\n", body.len(), body).into_bytes(),
                Reply::Error(msg) => format!("-{}\r\n", msg).into_bytes(),
                Reply::Raw(bytes) => bytes,
                Reply::Hangup => return,
            },
            "SELECT" => b"+OK\r\n".to_vec(),
            _ => format!("-ERR unknown command '{}'\r\n", name).into_bytes(),
        };

        let writer = reader.get_mut();
        if writer.write_all(&response).and_then(|_| writer.flush()).is_err() {
            return;
        }
    }
}

/// An address nothing listens on
pub fn unreachable_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read local addr");
    drop(listener);
    addr.to_string()
}

/// Render the exporter's families without triggering a scrape
pub fn snapshot(metrics: &MetricRegistry) -> String {
    let registry = Registry::new();
    registry
        .register(Box::new(metrics.duration.clone()))
        .unwrap();
    registry
        .register(Box::new(metrics.scrapes_total.clone()))
        .unwrap();
    registry
        .register(Box::new(metrics.scrape_error.clone()))
        .unwrap();
    for family in metrics.families() {
        registry.register(Box::new(family.clone())).unwrap();
    }
    metrics::render(&registry).expect("Failed to render metrics")
}

/// Sample lines (no comments) of the family `name`
pub fn samples<'a>(rendered: &'a str, name: &str) -> Vec<&'a str> {
    rendered
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .collect()
}

/// Value of the single sample line `line`
pub fn value_of(line: &str) -> f64 {
    line.rsplit(' ')
        .next()
        .and_then(|v| v.parse().ok())
        .expect("Sample line has no numeric value")
}
