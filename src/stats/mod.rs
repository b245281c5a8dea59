//! Per-channel relay statistics

pub mod metrics;

pub use metrics::{ChannelStats, StatsSnapshot};
