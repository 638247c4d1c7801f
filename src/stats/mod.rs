//! Per-session activity statistics.

pub mod counters;

pub use counters::{
    create_shared_stats, create_shared_stats_with_persistence, SessionStats, SharedSessionStats,
    StatsSnapshot,
};
