//! Remote store connection settings
//!
//! Settings come from the server's YAML file and may be overridden by the
//! historical `CERESDB_*` environment variables.

use crate::error::{Result, StorageError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_ADDR: &str = "CERESDB_GRPC_ADDR";
pub const ENV_TIMEOUT: &str = "CERESDB_GRPC_TIMEOUT";
pub const ENV_DEBUG: &str = "CERESDB_ENABLE_DEBUG";
pub const ENV_REMOTE_WRITE: &str = "CERESDB_REMOTE_WRITE";

/// Remote store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Address of the storage service, `host:port` or a full URL
    pub address: String,
    /// Timeout applied to every query and write call (e.g. "1m", "30s")
    pub timeout: String,
    /// Route Prometheus remote-write requests into the remote store
    pub remote_write: bool,
    /// Dump wire requests and responses
    pub debug: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            address: ":8831".to_string(),
            timeout: "1m".to_string(),
            remote_write: false,
            debug: false,
        }
    }
}

impl RemoteConfig {
    /// Apply `CERESDB_*` environment overrides
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(addr) = get(ENV_ADDR) {
            self.address = addr;
        }
        if let Some(timeout) = get(ENV_TIMEOUT) {
            self.timeout = timeout;
        }
        if let Some(debug) = get(ENV_DEBUG) {
            self.debug = debug == "true";
        }
        if let Some(remote_write) = get(ENV_REMOTE_WRITE) {
            self.remote_write = remote_write == "true";
        }
    }

    /// Parsed call timeout
    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(&self.timeout)
    }

    /// Base URL for HTTP transports; a bare `:port` means localhost
    pub fn base_url(&self) -> String {
        let addr = self.address.trim_end_matches('/');
        if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else if let Some(port) = addr.strip_prefix(':') {
            format!("http://127.0.0.1:{}", port)
        } else {
            format!("http://{}", addr)
        }
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration such as "1m", "90s", "1h30m", "1.5s" or "250ms"
///
/// A bare number is taken as seconds and may be fractional. Amounts that do
/// not fit in a `Duration` are rejected.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(StorageError::Config("Empty duration".to_string()));
    }
    let config_err = |msg: &str| StorageError::Config(format!("{}: {}", msg, s));

    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|_| config_err("Duration out of range"));
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let int_len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let frac_part = match rest.strip_prefix('.') {
            Some(after) => {
                let frac_len = after
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after.len());
                rest = &after[frac_len..];
                &after[..frac_len]
            }
            None => "",
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(config_err("Invalid duration"));
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            "" => return Err(config_err("Missing duration unit")),
            unit => {
                return Err(StorageError::Config(format!(
                    "Unknown duration unit '{}' in {}",
                    unit, s
                )))
            }
        };
        rest = &rest[unit_len..];

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| config_err("Duration out of range"))?
        };
        let mut part = whole
            .checked_mul(unit)
            .ok_or_else(|| config_err("Duration out of range"))?;

        // digits past the 18th are below nanosecond precision for every unit
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        if !frac_digits.is_empty() {
            let frac: u128 = frac_digits
                .parse()
                .map_err(|_| config_err("Invalid duration"))?;
            let scale = 10u128.pow(frac_digits.len() as u32);
            part = part
                .checked_add(frac * unit / scale)
                .ok_or_else(|| config_err("Duration out of range"))?;
        }

        total = total
            .checked_add(part)
            .ok_or_else(|| config_err("Duration out of range"))?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC)
        .map_err(|_| config_err("Duration out of range"))?;
    Ok(Duration::new(secs, (total % NANOS_PER_SEC) as u32))
}
