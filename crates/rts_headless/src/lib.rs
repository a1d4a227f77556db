//! Headless match runner for the AI decision engine.
//!
//! Pits two [`rts_ai::director::Director`]s against each other in an
//! abstract [`Arena`] without graphics. This enables:
//!
//! - **Strategy testing**: Compare strategy profiles over many seeds
//! - **CI verification**: Check that matches replay to identical state hashes
//! - **Tuning**: Collect per-team metrics from the engine's event stream
//!
//! # Example
//!
//! ```bash
//! # Play one match
//! cargo run -p rts_headless -- run --seed 42 --player-strategy "Kingdom Rush"
//!
//! # Run a batch of matches
//! cargo run -p rts_headless -- batch --count 200 --output results/
//!
//! # Verify determinism
//! cargo run -p rts_headless -- verify --seed 12345 --runs 5
//! ```

pub mod arena;
pub mod batch;
pub mod error;
pub mod metrics;
pub mod runner;

pub use arena::{unit_stats, Arena, ArenaConfig, StepReport};
pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use error::HeadlessError;
pub use metrics::{BatchSummary, MatchMetrics, MetricsCollector};
pub use runner::{load_library, run_match, MatchConfig, MatchRunner, SideConfig};
