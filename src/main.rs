use anyhow::Result;
use clap::Parser;
use redis_sentinel_exporter::config::{parse_duration, Config, LogFormat, LoggingConfig};
use redis_sentinel_exporter::{options::Options, server};
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// Redis Sentinel address, URI or host:port (overrides config)
    #[arg(long = "sentinel.addr", env = "SENTINEL_ADDR")]
    sentinel_addr: Option<String>,

    /// Redis Sentinel password (overrides config)
    #[arg(long = "sentinel.password", env = "SENTINEL_PASSWORD", hide_env_values = true)]
    sentinel_password: Option<String>,

    /// Path to Redis Sentinel password file (overrides config)
    #[arg(long = "sentinel.password-file", env = "SENTINEL_PASSWORD_FILE")]
    sentinel_password_file: Option<String>,

    /// Timeout for connection to Redis Sentinel, e.g. 5s or 500ms
    #[arg(
        long = "sentinel.connection-timeout",
        env = "SENTINEL_CONNECTION_TIMEOUT",
        value_parser = parse_duration
    )]
    sentinel_connection_timeout: Option<Duration>,

    /// Skip TLS certificate verification
    #[arg(long = "sentinel.skip-tls-verification", env = "SENTINEL_SKIP_TLS_VERIFICATION")]
    skip_tls_verification: bool,

    /// CA certificate file (PEM)
    #[arg(long = "sentinel.tls-ca-cert-file", env = "SENTINEL_TLS_CA_CERT_FILE")]
    tls_ca_cert_file: Option<String>,

    /// Client certificate file (PEM)
    #[arg(long = "sentinel.tls-client-cert-file", env = "SENTINEL_TLS_CLIENT_CERT_FILE")]
    tls_client_cert_file: Option<String>,

    /// Client key file, PKCS#8 PEM ("BEGIN PRIVATE KEY"). Convert RSA or EC keys
    /// with `openssl pkcs8 -topk8 -nocrypt -in client.key -out client.pk8.key`
    #[arg(long = "sentinel.tls-client-key-file", env = "SENTINEL_TLS_CLIENT_KEY_FILE")]
    tls_client_key_file: Option<String>,

    /// Address to listen on for web interface and telemetry
    #[arg(long = "web.listen-address", env = "LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long = "web.telemetry-path", env = "TELEMETRY_PATH")]
    metrics_path: Option<String>,

    /// Namespace for metrics
    #[arg(long, env = "NAMESPACE")]
    namespace: Option<String>,

    /// Output verbose debug information
    #[arg(long, env = "DEBUG")]
    debug: bool,

    /// Log format, txt or json
    #[arg(long, env = "LOG_FORMAT")]
    log_format: Option<LogFormat>,
}

impl Args {
    /// Apply CLI overrides on top of the loaded configuration
    fn apply(self, config: &mut Config) {
        if let Some(addr) = self.sentinel_addr {
            config.sentinel.addr = addr;
        }
        if let Some(password) = self.sentinel_password {
            config.sentinel.password = Some(secrecy::SecretString::new(password.into()));
        }
        if self.sentinel_password_file.is_some() {
            config.sentinel.password_file = self.sentinel_password_file;
        }
        if let Some(timeout) = self.sentinel_connection_timeout {
            config.sentinel.set_connection_timeout(timeout);
        }
        if self.skip_tls_verification {
            config.tls.skip_verification = true;
        }
        if self.tls_ca_cert_file.is_some() {
            config.tls.ca_cert_file = self.tls_ca_cert_file;
        }
        if self.tls_client_cert_file.is_some() {
            config.tls.client_cert_file = self.tls_client_cert_file;
        }
        if self.tls_client_key_file.is_some() {
            config.tls.client_key_file = self.tls_client_key_file;
        }
        if let Some(listen_address) = self.listen_address {
            config.server.listen_address = listen_address;
        }
        if let Some(metrics_path) = self.metrics_path {
            config.server.metrics_path = metrics_path;
        }
        if let Some(namespace) = self.namespace {
            config.metrics.namespace = namespace;
        }
        if self.debug {
            config.logging.level = "debug".to_string();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

fn init_tracing(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;
    args.apply(&mut config);

    init_tracing(&config.logging);
    info!(
        "Starting Redis Sentinel Exporter v{}",
        env!("CARGO_PKG_VERSION")
    );
    debug!("Enabling debug output");

    let options = match Options::from_config(&config) {
        Ok(options) => options,
        Err(e) => {
            error!("Validation failed: {:#}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully");
    info!("Sentinel address: {}", options.addr);

    // Start the metrics server
    if let Err(e) = server::start(options).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
