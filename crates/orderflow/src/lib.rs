pub mod bar;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod ladder;
pub mod profile;
pub mod store;

pub use bar::{BarAggregate, BarSummary};
pub use classifier::{classify, classify_f64, classify_tick, Classification, DropReason};
pub use config::EngineConfig;
pub use engine::{BoundaryOutcome, EngineStats, FeedOutcome, OrderFlowEngine, TickOutcome};
pub use ladder::{Imbalance, PriceLadder, Rung};
pub use profile::{VolumeProfile, VolumeProfileSnapshot, DEFAULT_WARMUP_FLOOR};
pub use store::BarStore;

/// Errors surfaced by the order-flow engine.
///
/// Feed problems (bad ticks, stale bar indices) are absorbed and logged; only
/// misuse of the engine itself reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum OrderFlowError {
    #[error("No bar store: the engine has not received a bar boundary yet")]
    StoreNotInitialized,
    #[error("Invalid configuration: {0}")]
    Config(String),
}
