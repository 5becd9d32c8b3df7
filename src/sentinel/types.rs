//! Parsed Sentinel INFO Types
//!
//! The strongly typed result of one `INFO` reply. Identity fields are kept as
//! strings, every other requested field as `f64`, and each monitored master as
//! a [`Master`] record.

use std::collections::HashMap;

/// Field names that identify the Sentinel build rather than measure it
pub const VERSION_FIELD: &str = "redis_version";
pub const BUILD_ID_FIELD: &str = "redis_build_id";
pub const MODE_FIELD: &str = "redis_mode";

pub const IDENTITY_FIELDS: [&str; 3] = [VERSION_FIELD, BUILD_ID_FIELD, MODE_FIELD];

/// One scrape's worth of Sentinel state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentinelInfo {
    pub version: String,
    pub build_id: String,
    pub mode: String,
    /// Requested numeric fields present in the reply, keyed by source name
    pub fields: HashMap<String, f64>,
    /// Monitored masters in reply order
    pub masters: Vec<Master>,
}

/// A master monitored by the Sentinel
#[derive(Debug, Clone, PartialEq)]
pub struct Master {
    pub name: String,
    pub address: String,
    /// 1 when the Sentinel reports the master `ok`, 0 otherwise
    pub status: f64,
    pub slaves: f64,
    pub sentinels: f64,
}

impl Master {
    /// Map a reported status string to its gauge value
    pub fn status_value(status: &str) -> f64 {
        if status == "ok" {
            1.0
        } else {
            0.0
        }
    }
}
