//! Redis Sentinel Prometheus Exporter
//!
//! A Prometheus metrics exporter for Redis Sentinel.
//!
//! # Overview
//!
//! On every scrape the exporter connects to a Sentinel instance, issues `INFO`,
//! and republishes the selected fields as Prometheus gauges: Sentinel identity,
//! per-master status and replica/Sentinel counts, and server, client, stats and
//! CPU counters. Scrapes are driven entirely by Prometheus; nothing is cached
//! between them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐      RESP INFO      ┌──────────────┐
//! │    Redis    │ ◄─────────────────► │   Exporter   │
//! │  Sentinel   │  TCP / TLS / unix   │              │
//! └─────────────┘                     │  ┌────────┐  │      HTTP      ┌────────────┐
//!                                     │  │Resolver│  │ ◄────────────► │ Prometheus │
//!                                     │  └────────┘  │   /metrics     └────────────┘
//!                                     │  ┌────────┐  │
//!                                     │  │Metrics │  │
//!                                     │  └────────┘  │
//!                                     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`sentinel`] - Connection resolution, RESP wire protocol and INFO parsing
//! - [`metrics`] - Field table and Prometheus metric families
//! - [`exporter`] - The scrape orchestrator (a `prometheus` collector)
//! - [`server`] - HTTP exposition
//! - [`config`] - File/environment configuration
//! - [`options`] - Validated runtime options
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use redis_sentinel_exporter::{config::Config, options::Options, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     let options = Options::from_config(&config)?;
//!     server::start(options).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod metrics;
pub mod options;
pub mod sentinel;
pub mod server;
