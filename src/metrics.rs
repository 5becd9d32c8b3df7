//! Prometheus Metrics Definitions
//!
//! This module defines every metric family the Sentinel exporter publishes.
//!
//! # Metric Categories
//!
//! ## Identity
//! - `info{version, build_id, mode}` - always 1, labels carry the Sentinel build
//!
//! ## Masters
//! - `master_status{name, address}` - 1 when the master is reported `ok`
//! - `master_slaves{name, address}` - replicas attached to the master
//! - `master_sentinels{name, address}` - Sentinels watching the master
//!
//! ## INFO fields
//! - One label-free gauge per [`FieldTable`] entry (clients, stats, CPU, Sentinel)
//!
//! ## Scrape lifecycle
//! - `exporter_last_scrape_duration_seconds`
//! - `exporter_scrapes_total`
//! - `exporter_last_scrape_error`
//!
//! All names are prefixed with the configured namespace (`redis_sentinel` by
//! default).

use crate::sentinel::types::IDENTITY_FIELDS;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// INFO field name to exported metric name
pub const SENTINEL_FIELDS: &[(&str, &str)] = &[
    // Server
    ("uptime_in_seconds", "uptime_in_seconds"),
    ("process_id", "process_id"),
    // Clients
    ("connected_clients", "connected_clients"),
    ("client_longest_output_list", "client_longest_output_list"),
    ("client_biggest_input_buf", "client_biggest_input_buf"),
    ("blocked_clients", "blocked_clients"),
    // Stats
    ("total_connections_received", "connections_received_total"),
    ("total_commands_processed", "commands_processed_total"),
    ("instantaneous_ops_per_sec", "instantaneous_ops_per_sec"),
    ("total_net_input_bytes", "net_input_bytes_total"),
    ("total_net_output_bytes", "net_output_bytes_total"),
    ("instantaneous_input_kbps", "instantaneous_input_kbps"),
    ("instantaneous_output_kbps", "instantaneous_output_kbps"),
    ("rejected_connections", "rejected_connections_total"),
    ("expired_keys", "expired_keys_total"),
    ("evicted_keys", "evicted_keys_total"),
    ("keyspace_hits", "keyspace_hits_total"),
    ("keyspace_misses", "keyspace_misses_total"),
    ("pubsub_channels", "pubsub_channels"),
    ("pubsub_patterns", "pubsub_patterns"),
    ("latest_fork_usec", "latest_fork_usec"),
    // CPU
    ("used_cpu_sys", "used_cpu_sys"),
    ("used_cpu_user", "used_cpu_user"),
    ("used_cpu_sys_children", "used_cpu_sys_children"),
    ("used_cpu_user_children", "used_cpu_user_children"),
    // Sentinel
    ("sentinel_masters", "masters"),
    ("sentinel_tilt", "tilt"),
    ("sentinel_running_scripts", "running_scripts"),
    ("sentinel_scripts_queue_length", "scripts_queue_length"),
    ("sentinel_simulate_failure_flags", "simulate_failure_flags"),
];

/// Fixed mapping of INFO fields to exported gauge names
///
/// Built once and handed to each exporter by reference; entries never change
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTable {
    entries: Vec<(String, String)>,
}

impl FieldTable {
    pub fn new<I, S, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(source, exported)| (source.into(), exported.into()))
                .collect(),
        }
    }

    /// The standard Sentinel field table
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_FIELDS.iter().copied())
    }

    /// `(source field, exported name)` pairs in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(source, exported)| (source.as_str(), exported.as_str()))
    }

    /// Every INFO key the parser must keep: identity fields plus table sources
    pub fn required_keys(&self) -> Vec<&str> {
        IDENTITY_FIELDS
            .iter()
            .copied()
            .chain(self.entries.iter().map(|(source, _)| source.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::sentinel()
    }
}

/// The metric families owned by one exporter
///
/// Family keys are fixed at construction; scrapes only change sample values.
pub struct MetricRegistry {
    pub info: GaugeVec,
    pub master_status: GaugeVec,
    pub master_slaves: GaugeVec,
    pub master_sentinels: GaugeVec,
    /// Label-free gauges keyed by INFO source field, in table order
    pub fields: Vec<(String, GaugeVec)>,

    pub duration: Gauge,
    pub scrapes_total: IntCounter,
    pub scrape_error: Gauge,
}

impl MetricRegistry {
    pub fn new(namespace: &str, table: &FieldTable) -> prometheus::Result<Self> {
        let info = GaugeVec::new(
            Opts::new("info", "Information about Sentinel").namespace(namespace),
            &["version", "build_id", "mode"],
        )?;

        // Masters
        let master_status = GaugeVec::new(
            Opts::new("master_status", "Status of master (1=ok, 0=otherwise)")
                .namespace(namespace),
            &["name", "address"],
        )?;
        let master_slaves = GaugeVec::new(
            Opts::new("master_slaves", "Slaves of master").namespace(namespace),
            &["name", "address"],
        )?;
        let master_sentinels = GaugeVec::new(
            Opts::new("master_sentinels", "Sentinels of master").namespace(namespace),
            &["name", "address"],
        )?;

        // All other fields
        let fields = table
            .iter()
            .map(|(source, exported)| {
                GaugeVec::new(
                    Opts::new(exported, format!("Value of INFO field {}", source))
                        .namespace(namespace),
                    &[],
                )
                .map(|gauge| (source.to_string(), gauge))
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        let duration = Gauge::with_opts(
            Opts::new(
                "exporter_last_scrape_duration_seconds",
                "The last scrape duration.",
            )
            .namespace(namespace),
        )?;
        let scrapes_total = IntCounter::with_opts(
            Opts::new("exporter_scrapes_total", "Current total redis scrapes.")
                .namespace(namespace),
        )?;
        let scrape_error = Gauge::with_opts(
            Opts::new("exporter_last_scrape_error", "The last scrape error status.")
                .namespace(namespace),
        )?;

        Ok(Self {
            info,
            master_status,
            master_slaves,
            master_sentinels,
            fields,
            duration,
            scrapes_total,
            scrape_error,
        })
    }

    /// Label-free gauge for an INFO source field
    pub fn field(&self, source: &str) -> Option<&GaugeVec> {
        self.fields
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, gauge)| gauge)
    }

    /// Every data family: info, the three master families, then the fields
    pub fn families(&self) -> impl Iterator<Item = &GaugeVec> {
        [
            &self.info,
            &self.master_status,
            &self.master_slaves,
            &self.master_sentinels,
        ]
        .into_iter()
        .chain(self.fields.iter().map(|(_, gauge)| gauge))
    }

    /// Drop every sample from every data family
    pub fn reset_families(&self) {
        for family in self.families() {
            family.reset();
        }
    }

    /// Descriptors of the lifecycle metrics followed by every data family
    pub fn descs(&self) -> Vec<&Desc> {
        let mut descs = Vec::new();
        descs.extend(self.duration.desc());
        descs.extend(self.scrapes_total.desc());
        descs.extend(self.scrape_error.desc());
        for family in self.families() {
            descs.extend(family.desc());
        }
        descs
    }

    /// Current samples, lifecycle metrics first
    pub fn collect(&self) -> Vec<MetricFamily> {
        let mut families = Vec::new();
        families.extend(self.duration.collect());
        families.extend(self.scrapes_total.collect());
        families.extend(self.scrape_error.collect());
        for family in self.families() {
            families.extend(family.collect());
        }
        families
    }
}

/// `{prefix}_build_info{version}`, always 1
///
/// Registered as `{namespace}_exporter_build_info`, and once more as the older
/// `{namespace}_build_info` that existing dashboards still query.
pub fn build_info_gauge(prefix: &str) -> prometheus::Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(
        Opts::new(
            "build_info",
            "Exporter build information (value is always 1)",
        )
        .namespace(prefix),
        &["version"],
    )?;
    gauge
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1);
    Ok(gauge)
}

/// Render a registry in Prometheus text format
pub fn render(registry: &Registry) -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
