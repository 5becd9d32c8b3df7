//! Sentinel Exporter
//!
//! [`SentinelExporter`] is a [`prometheus::core::Collector`]: the registry that
//! owns it calls [`Collector::collect`] once per inbound scrape, and every call
//! runs one full scrape against Sentinel.
//!
//! # Scrape Sequence
//!
//! 1. Increment `exporter_scrapes_total` and start the clock
//! 2. Resolve a connection and issue `INFO`; the connection is dropped right after
//! 3. Parse the reply, then reset and repopulate every data family
//! 4. Set `exporter_last_scrape_error` (0 on success, 1 on any failure)
//! 5. Set `exporter_last_scrape_duration_seconds` and publish all samples
//!
//! # Failure Handling
//!
//! Connection, command and parse failures are treated alike: the error gauge is
//! set to 1 and every data family is emptied, so no per-master or per-field
//! sample from an earlier scrape outlives an outage. Nothing is retried within
//! a scrape and no failure is fatal.
//!
//! # Concurrency
//!
//! The whole collect sequence runs under one lock, so overlapping scrapes never
//! interleave samples from different `INFO` replies.

use crate::error::Result;
use crate::metrics::{FieldTable, MetricRegistry};
use crate::options::Options;
use crate::sentinel::{parse_info, ConnectionResolver, SentinelDialer, SentinelInfo};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

/// Scrapes Sentinel `INFO` on demand and projects it onto Prometheus families
#[derive(Clone)]
pub struct SentinelExporter {
    options: Arc<Options>,
    resolver: ConnectionResolver<SentinelDialer>,
    required_keys: Arc<Vec<String>>,
    metrics: Arc<MetricRegistry>,
    scrape_lock: Arc<Mutex<()>>,
}

impl SentinelExporter {
    /// Build an exporter whose field gauges follow `table`
    ///
    /// Nothing is dialed here; descriptors are available immediately whether
    /// or not Sentinel is reachable.
    pub fn new(options: Arc<Options>, table: &FieldTable) -> prometheus::Result<Self> {
        let metrics = MetricRegistry::new(&options.metrics_namespace, table)?;
        let required_keys = table
            .required_keys()
            .into_iter()
            .map(str::to_string)
            .collect();

        Ok(Self {
            options,
            resolver: ConnectionResolver::new(SentinelDialer),
            required_keys: Arc::new(required_keys),
            metrics: Arc::new(metrics),
            scrape_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    /// Connect, issue `INFO` and return the raw reply
    pub fn scrape_info(&self) -> Result<String> {
        let mut conn = self.resolver.resolve(&self.options.addr, &self.options)?;
        debug!("Connected to: {}", conn.peer());

        conn.info().inspect_err(|e| debug!("Cannot execute command info: {}", e))
    }

    fn scrape(&self) -> Result<SentinelInfo> {
        let raw = self.scrape_info()?;
        let keys: Vec<&str> = self.required_keys.iter().map(String::as_str).collect();
        parse_info(&raw, &keys, true)
    }

    /// Replace every data family's samples with the contents of `info`
    ///
    /// Families are emptied first, so masters and fields missing from `info`
    /// disappear from the output.
    pub fn set_metrics(&self, info: &SentinelInfo) {
        self.metrics.reset_families();

        self.metrics
            .info
            .with_label_values(&[
                info.version.as_str(),
                info.build_id.as_str(),
                info.mode.as_str(),
            ])
            .set(1.0);

        for master in &info.masters {
            let labels = [master.name.as_str(), master.address.as_str()];
            self.metrics
                .master_status
                .with_label_values(&labels)
                .set(master.status);
            self.metrics
                .master_slaves
                .with_label_values(&labels)
                .set(master.slaves);
            self.metrics
                .master_sentinels
                .with_label_values(&labels)
                .set(master.sentinels);
        }

        for (source, gauge) in &self.metrics.fields {
            if let Some(value) = info.fields.get(source) {
                gauge.with_label_values(&[] as &[&str]).set(*value);
            }
        }
    }

    /// Drop every sample from every data family
    pub fn reset_metrics(&self) {
        self.metrics.reset_families();
    }
}

impl Collector for SentinelExporter {
    fn desc(&self) -> Vec<&Desc> {
        self.metrics.descs()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _guard = self
            .scrape_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.metrics.scrapes_total.inc();
        let start = Instant::now();

        match self.scrape() {
            Ok(info) => {
                debug!(
                    "Scraped {}: {} fields, {} masters",
                    self.options.addr,
                    info.fields.len(),
                    info.masters.len()
                );
                self.set_metrics(&info);
                self.metrics.scrape_error.set(0.0);
            }
            Err(e) => {
                warn!("Failed to scrape Sentinel at {}: {}", self.options.addr, e);
                self.metrics.scrape_error.set(1.0);
                self.reset_metrics();
            }
        }

        self.metrics
            .duration
            .set(start.elapsed().as_secs_f64());

        self.metrics.collect()
    }
}
