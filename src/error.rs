//! Typed errors for the protocol-violation half of the §7 error taxonomy.
//!
//! Resource exhaustion and invariant violations are `panic!`/`assert!` by
//! design (see `pool.rs`, `ring_queue.rs`, `order_book.rs`) and never show
//! up here; this module only covers things that are reflected back on the
//! wire rather than terminating the process.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("short read: need {need} bytes, got {got}")]
    ShortRead { need: usize, got: usize },
    #[error("unknown wire enum discriminant {0} for {1}")]
    UnknownDiscriminant(u8, &'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid value for {flag}: '{value}' ({reason})")]
    InvalidValue {
        flag: &'static str,
        value: String,
        reason: String,
    },
    #[error("bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("multicast join failed on {group}: {source}")]
    MulticastJoin {
        group: String,
        #[source]
        source: std::io::Error,
    },
}
