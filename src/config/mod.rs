//! Configuration for the writer pools and upload queue.
//!
//! All tuning knobs resolve once at startup from environment overrides, with
//! a fixed precedence order: the most specific recognized name wins, then the
//! generic names, then the built-in default. An override that is present but
//! unparseable is a hard [`ConfigError`], never a silent fallback.
//!
//! Recognized names:
//!
//! - worker count: `FLOE_{KIND}_WORKERS`, `FLOE_WRITER_WORKERS`, `FLOE_WORKERS`
//! - chunk size: `FLOE_CHUNK_SIZE`
//! - compression level: `FLOE_COMPRESSION_LEVEL`
//! - upload concurrency: `FLOE_UPLOAD_CONCURRENCY`
//! - water marks: `FLOE_UPLOAD_HIGH_WATER`, `FLOE_UPLOAD_LOW_WATER`

use std::env;
use std::str::FromStr;

use crate::backoff::BackoffPolicy;
use crate::error::{
    ConfigError, InvalidOverrideSnafu, InvalidWaterMarksSnafu, ZeroConcurrencySnafu,
};
use snafu::prelude::*;

/// Byte size constants (binary/IEC units).
pub const KB: usize = 1024;
pub const MB: usize = 1024 * KB;

/// Default chunk size for writer jobs.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * KB;
/// Default compression level for writer jobs.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 1;
/// Default number of concurrent uploads.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;
/// Default queue depth at which writes pause.
pub const DEFAULT_HIGH_WATER: usize = 100;
/// Default queue depth at which writes resume.
pub const DEFAULT_LOW_WATER: usize = 20;

/// The two writer pool instantiations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Compressed binary artifacts.
    Binary,
    /// Columnar (parquet) artifacts.
    Parquet,
}

impl PoolKind {
    /// Label used in metrics and log messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Binary => "binary",
            PoolKind::Parquet => "parquet",
        }
    }

    /// The most specific worker-count override name for this pool.
    fn worker_var(&self) -> &'static str {
        match self {
            PoolKind::Binary => "FLOE_BINARY_WORKERS",
            PoolKind::Parquet => "FLOE_PARQUET_WORKERS",
        }
    }
}

/// Read an override, failing loudly when it is present but unparseable.
fn parse_override<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => {
            let parsed = value.parse::<T>().ok().context(InvalidOverrideSnafu {
                name: name.to_string(),
                value: value.clone(),
            })?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

/// Resolve the first matching override in priority order.
fn first_override<T: FromStr>(names: &[&str]) -> Result<Option<T>, ConfigError> {
    for name in names {
        if let Some(value) = parse_override(name)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Default worker count: leave one core for the coordinator, floor of 2.
fn default_worker_count() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2);
    std::cmp::max(2, parallelism.saturating_sub(1))
}

/// Writer pool configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct WriterPoolConfig {
    /// Which instantiation this pool is.
    pub kind: PoolKind,
    /// Worker capacity.
    pub max_workers: usize,
    /// Chunk size attached to jobs at submission time.
    pub chunk_size: usize,
    /// Compression level attached to jobs at submission time.
    pub compression_level: i32,
    /// Retry schedule for transient job failures.
    pub retry: BackoffPolicy,
}

impl WriterPoolConfig {
    /// Resolve configuration from the environment for the given pool kind.
    pub fn from_env(kind: PoolKind) -> Result<Self, ConfigError> {
        let max_workers =
            first_override(&[kind.worker_var(), "FLOE_WRITER_WORKERS", "FLOE_WORKERS"])?
                .unwrap_or_else(default_worker_count);
        ensure!(max_workers >= 1, ZeroConcurrencySnafu { name: "worker count" });
        let chunk_size =
            parse_override("FLOE_CHUNK_SIZE")?.unwrap_or(DEFAULT_CHUNK_SIZE);
        let compression_level =
            parse_override("FLOE_COMPRESSION_LEVEL")?.unwrap_or(DEFAULT_COMPRESSION_LEVEL);

        Ok(Self {
            kind,
            max_workers,
            chunk_size,
            compression_level,
            retry: BackoffPolicy::writer_pool(),
        })
    }

    /// Built-in defaults without consulting the environment.
    pub fn defaults(kind: PoolKind) -> Self {
        Self {
            kind,
            max_workers: default_worker_count(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            retry: BackoffPolicy::writer_pool(),
        }
    }
}

/// Upload queue configuration.
#[derive(Debug, Clone)]
pub struct UploadQueueConfig {
    /// Maximum concurrent transfers.
    pub max_concurrent: usize,
    /// Queue depth at which `is_paused` becomes true.
    pub high_water: usize,
    /// Queue depth at which `is_paused` becomes false again.
    pub low_water: usize,
    /// Retry schedule for transient transfer failures.
    pub retry: BackoffPolicy,
}

impl UploadQueueConfig {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_concurrent =
            parse_override("FLOE_UPLOAD_CONCURRENCY")?.unwrap_or(DEFAULT_UPLOAD_CONCURRENCY);
        let high_water =
            parse_override("FLOE_UPLOAD_HIGH_WATER")?.unwrap_or(DEFAULT_HIGH_WATER);
        let low_water = parse_override("FLOE_UPLOAD_LOW_WATER")?.unwrap_or(DEFAULT_LOW_WATER);

        Self::validated(max_concurrent, high_water, low_water)
    }

    /// Build a config with explicit values, enforcing `max_concurrent >= 1`
    /// and `high > low`.
    pub fn validated(
        max_concurrent: usize,
        high_water: usize,
        low_water: usize,
    ) -> Result<Self, ConfigError> {
        ensure!(
            max_concurrent >= 1,
            ZeroConcurrencySnafu {
                name: "upload concurrency"
            }
        );
        ensure!(
            high_water > low_water,
            InvalidWaterMarksSnafu {
                high: high_water,
                low: low_water
            }
        );

        Ok(Self {
            max_concurrent,
            high_water,
            low_water,
            retry: BackoffPolicy::upload(),
        })
    }
}

impl Default for UploadQueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_UPLOAD_CONCURRENCY,
            high_water: DEFAULT_HIGH_WATER,
            low_water: DEFAULT_LOW_WATER,
            retry: BackoffPolicy::upload(),
        }
    }
}
