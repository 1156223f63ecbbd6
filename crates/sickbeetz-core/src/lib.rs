//! Core types: timestamp encoding, tracing setup

pub mod time;
pub mod tracing;

pub use time::{TimestampError, encode_timestamp, epoch, is_after, parse_timestamp};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
