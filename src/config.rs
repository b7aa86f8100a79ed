//! CLI flag resolution and pre-run validation.
//!
//! Flags are parsed by clap into [`Args`], then checked into a [`SweepConfig`].
//! Everything here fails before any connection is opened: an unknown operation
//! name is rejected at parse time, and operation-specific requirements (a
//! positive TTL for `expire`, a non-empty prefix list for `del`) are rejected
//! by [`SweepConfig::from_args`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use thiserror::Error;

/// A pre-run configuration error. Always fatal; reported to the operator
/// before any network I/O happens.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `--op expire` without a usable TTL.
    #[error("--op expire requires --expire-ttl with a positive number of seconds")]
    ExpireTtlRequired,

    /// `--op del` without any preserved prefixes.
    #[error("--op del requires --except-prefix with at least one non-empty prefix")]
    ExceptPrefixRequired,

    /// `--progress 0` would mean a report after every zeroth key.
    #[error("--progress must be a positive key count")]
    ProgressIntervalZero,

    /// A zero `COUNT` hint is rejected by the store.
    #[error("--scan-count must be a positive key count")]
    ScanCountZero,
}

/// The per-key operation to apply across the keyspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Operation {
    /// Copy each key's full value from the source store to the destination.
    Migrate,
    /// Clear the destination TTL of keys that have no expiration in the source.
    Persist,
    /// Set the destination TTL of keys that have no expiration in the source.
    Expire,
    /// Delete keys from the destination unless their name matches a preserved prefix.
    Del,
    /// Relocate each key from the source logical database to the destination one.
    Move,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Migrate => write!(f, "migrate"),
            Self::Persist => write!(f, "persist"),
            Self::Expire => write!(f, "expire"),
            Self::Del => write!(f, "del"),
            Self::Move => write!(f, "move"),
        }
    }
}

/// One side of the sweep: a host, port, and logical database number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub db: u32,
}

impl Endpoint {
    /// Connection URL in the Redis convention: `redis://host:port/db`.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/db{}", self.host, self.port, self.db)
    }
}

/// keysweep - apply one maintenance operation to every key in a keyspace
#[derive(Parser, Debug)]
#[command(name = "keysweep")]
#[command(author, version, about = "Bulk per-key maintenance for Redis-compatible keyspaces")]
pub struct Args {
    /// Source store host
    #[arg(long, default_value = "127.0.0.1")]
    pub src_host: String,

    /// Source store port
    #[arg(long, default_value = "6379")]
    pub src_port: u16,

    /// Source logical database number
    #[arg(long, default_value = "0")]
    pub src_db: u32,

    /// Destination store host
    #[arg(long, default_value = "127.0.0.1")]
    pub dst_host: String,

    /// Destination store port
    #[arg(long, default_value = "6379")]
    pub dst_port: u16,

    /// Destination logical database number
    #[arg(long, default_value = "0")]
    pub dst_db: u32,

    /// Operation to apply to every scanned key
    #[arg(long, value_enum)]
    pub op: Operation,

    /// TTL in seconds written by the expire operation (required when --op expire)
    #[arg(long, value_name = "SECONDS")]
    pub expire_ttl: Option<u64>,

    /// Comma-separated key-name prefixes preserved by the del operation
    #[arg(long, value_name = "p1,p2,...", value_delimiter = ',')]
    pub except_prefix: Vec<String>,

    /// Append log lines to this file in addition to stdout
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Emit a throughput report every N processed keys
    #[arg(long, value_name = "N")]
    pub progress: Option<u64>,

    /// COUNT hint forwarded to the store's SCAN command
    #[arg(long, value_name = "N", default_value = "100")]
    pub scan_count: usize,

    /// Seconds to wait for each initial store connection
    #[arg(long, value_name = "SECONDS", default_value = "10")]
    pub connect_timeout: u64,
}

/// Fully validated configuration for one sweep pass.
///
/// Invariant: operation-specific fields are present and usable before
/// execution begins — `expire_ttl` is `Some` and positive when the operation
/// is [`Operation::Expire`], and `except_prefixes` is non-empty when it is
/// [`Operation::Del`].
#[derive(Clone, Debug)]
pub struct SweepConfig {
    pub src: Endpoint,
    pub dst: Endpoint,
    pub op: Operation,
    pub expire_ttl: Option<u64>,
    pub except_prefixes: Vec<String>,
    pub log_file: Option<PathBuf>,
    pub progress_interval: Option<u64>,
    pub scan_count: usize,
    pub connect_timeout: Duration,
}

impl SweepConfig {
    /// Validate parsed flags into a runnable configuration.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        // Empty segments come from stray commas in --except-prefix.
        let except_prefixes: Vec<String> = args
            .except_prefix
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();

        match args.op {
            Operation::Expire => {
                if !args.expire_ttl.is_some_and(|ttl| ttl > 0) {
                    return Err(ConfigError::ExpireTtlRequired);
                }
            }
            Operation::Del => {
                if except_prefixes.is_empty() {
                    return Err(ConfigError::ExceptPrefixRequired);
                }
            }
            _ => {}
        }

        if args.progress == Some(0) {
            return Err(ConfigError::ProgressIntervalZero);
        }
        if args.scan_count == 0 {
            return Err(ConfigError::ScanCountZero);
        }

        Ok(Self {
            src: Endpoint {
                host: args.src_host,
                port: args.src_port,
                db: args.src_db,
            },
            dst: Endpoint {
                host: args.dst_host,
                port: args.dst_port,
                db: args.dst_db,
            },
            op: args.op,
            expire_ttl: args.expire_ttl,
            except_prefixes,
            log_file: args.log,
            progress_interval: args.progress,
            scan_count: args.scan_count,
            connect_timeout: Duration::from_secs(args.connect_timeout),
        })
    }
}
