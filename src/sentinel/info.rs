//! Sentinel INFO Parser
//!
//! Decomposes the text returned by `INFO` into a [`SentinelInfo`].
//!
//! The reply is a sequence of `# Section` headers followed by `key:value` lines.
//! Sentinel adds one `masterN:` line per monitored master whose value is a
//! comma-separated `k=v` list:
//!
//! ```text
//! # Sentinel
//! sentinel_masters:1
//! master0:name=mymaster,status=ok,address=127.0.0.1:6379,slaves=2,sentinels=3
//! ```
//!
//! Only requested keys are kept. Requested keys missing from the reply are never
//! an error. With `strict` set, structurally malformed lines fail the parse;
//! otherwise they are skipped.

use crate::error::{ExporterError, Result};
use crate::sentinel::types::{
    Master, SentinelInfo, BUILD_ID_FIELD, MODE_FIELD, VERSION_FIELD,
};
use tracing::debug;

/// Parse a raw `INFO` reply, keeping only `required_keys`
pub fn parse_info(raw: &str, required_keys: &[&str], strict: bool) -> Result<SentinelInfo> {
    let mut info = SentinelInfo::default();

    for (index, line) in raw.split('\n').enumerate() {
        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            malformed(strict, index, format!("expected key:value, got '{}'", line))?;
            continue;
        };

        if is_master_key(key) {
            match parse_master(value) {
                Ok(master) => info.masters.push(master),
                Err(reason) => malformed(strict, index, format!("{}: {}", key, reason))?,
            }
            continue;
        }

        if !required_keys.contains(&key) {
            continue;
        }

        match key {
            VERSION_FIELD => info.version = value.to_string(),
            BUILD_ID_FIELD => info.build_id = value.to_string(),
            MODE_FIELD => info.mode = value.to_string(),
            _ => match value.parse::<f64>() {
                Ok(number) => {
                    info.fields.insert(key.to_string(), number);
                }
                Err(_) => malformed(
                    strict,
                    index,
                    format!("{} is not numeric: '{}'", key, value),
                )?,
            },
        }
    }

    Ok(info)
}

fn malformed(strict: bool, index: usize, reason: String) -> Result<()> {
    if strict {
        return Err(ExporterError::Parse(format!("line {}: {}", index + 1, reason)));
    }
    debug!("Skipping INFO line {}: {}", index + 1, reason);
    Ok(())
}

/// `master0`, `master1`, ...
fn is_master_key(key: &str) -> bool {
    key.strip_prefix("master")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn parse_master(value: &str) -> std::result::Result<Master, String> {
    let mut name = None;
    let mut address = None;
    let mut status = None;
    let mut slaves = 0.0;
    let mut sentinels = 0.0;

    for part in value.split(',') {
        let (k, v) = part
            .split_once('=')
            .ok_or_else(|| format!("expected k=v, got '{}'", part))?;
        match k {
            "name" => name = Some(v.to_string()),
            "address" => address = Some(v.to_string()),
            "status" => status = Some(Master::status_value(v)),
            "slaves" => slaves = parse_count(k, v)?,
            "sentinels" => sentinels = parse_count(k, v)?,
            _ => {}
        }
    }

    Ok(Master {
        name: name.ok_or("missing name")?,
        address: address.ok_or("missing address")?,
        status: status.unwrap_or(0.0),
        slaves,
        sentinels,
    })
}

fn parse_count(key: &str, value: &str) -> std::result::Result<f64, String> {
    value
        .parse()
        .map_err(|_| format!("{} is not numeric: '{}'", key, value))
}
