//! Engine configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard memory cap (in bytes) shared by every set engine of one query.
    /// Exceeding it aborts the query.
    pub mem_cap_bytes: usize,

    /// Maximum rows per batch produced by sources (CSV readers, splitters).
    pub batch_rows: usize,

    /// Full scheduler passes without progress tolerated before the executor
    /// reports the graph as stalled.
    pub max_idle_passes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mem_cap_bytes: 512 * 1024 * 1024, // 512 MiB default
            batch_rows: 8192,
            max_idle_passes: 1,
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SETFLOW_MEM_CAP_BYTES`: memory cap in bytes
    /// - `SETFLOW_BATCH_ROWS`: rows per source batch
    /// - `SETFLOW_MAX_IDLE_PASSES`: idle scheduler passes before stalling
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_parse::<usize>("SETFLOW_MEM_CAP_BYTES") {
            cfg.mem_cap_bytes = v;
        }

        if let Some(v) = env_parse::<usize>("SETFLOW_BATCH_ROWS") {
            cfg.batch_rows = v;
        }

        if let Some(v) = env_parse::<usize>("SETFLOW_MAX_IDLE_PASSES") {
            cfg.max_idle_passes = v;
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.mem_cap_bytes == 0 {
            return Err(Error::Config("mem_cap_bytes must be positive".into()));
        }
        if self.batch_rows == 0 {
            return Err(Error::Config("batch_rows must be positive".into()));
        }
        if self.max_idle_passes == 0 {
            return Err(Error::Config("max_idle_passes must be positive".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
