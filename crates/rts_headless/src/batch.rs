//! Batch match runner for strategy testing.
//!
//! Runs many matches in parallel using rayon and aggregates their metrics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rts_ai::strategy::StrategyLibrary;

use crate::error::{HeadlessError, Result};
use crate::metrics::{BatchSummary, MatchMetrics};
use crate::runner::{run_match, MatchConfig};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of matches to run
    pub game_count: u32,
    /// Maximum parallel matches (0 = use rayon default)
    pub parallel_games: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Starting seed; match `i` runs with `seed_start + i`
    pub seed_start: u64,
    /// Template every match is built from
    pub template: MatchConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            game_count: 100,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            template: MatchConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Create config for a number of matches
    pub fn new(game_count: u32) -> Self {
        Self {
            game_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set the match template
    pub fn with_template(mut self, template: MatchConfig) -> Self {
        self.template = template;
        self
    }

    /// The configuration of match `index`.
    #[must_use]
    pub fn match_config(&self, index: u32) -> MatchConfig {
        let seed = self.seed_start.wrapping_add(u64::from(index));
        MatchConfig {
            match_id: format!("match_{seed}"),
            seed,
            ..self.template.clone()
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual match metrics
    pub games: Vec<MatchMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HeadlessError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| HeadlessError::io(path, e))
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| HeadlessError::io(path, e))?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Match index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total matches
    pub total: u32,
    completed: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed match, returning the new count
    pub fn record_completion(&self) -> u32 {
        self.completed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Matches per wall-clock second so far
    pub fn rate(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            f64::from(self.current()) / elapsed
        } else {
            0.0
        }
    }
}

/// Run a batch of matches
pub fn run_batch(config: BatchConfig, library: Arc<StrategyLibrary>) -> BatchResults {
    let start = Instant::now();
    let progress = BatchProgress::new(config.game_count);

    info!(
        games = config.game_count,
        seed_start = config.seed_start,
        player = ?config.template.player.race,
        enemy = ?config.template.enemy.race,
        "Starting batch run"
    );

    // Configure thread pool if specified
    if config.parallel_games > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_games as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<std::result::Result<MatchMetrics, BatchError>> = (0..config.game_count)
        .into_par_iter()
        .map(|i| {
            let match_config = config.match_config(i);
            let seed = match_config.seed;
            match run_match(match_config, Arc::clone(&library)) {
                Ok(result) => {
                    let completed = progress.record_completion();
                    if completed % 10 == 0 {
                        debug!(
                            "Progress: {}/{} ({:.0}%)",
                            completed,
                            config.game_count,
                            progress.percentage()
                        );
                    }
                    Ok(result.metrics)
                }
                Err(e) => {
                    warn!("Match {} failed: {}", i, e);
                    Err(BatchError {
                        game_index: i,
                        seed,
                        message: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let mut games = Vec::with_capacity(results.len());
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(metrics) => games.push(metrics),
            Err(error) => errors.push(error),
        }
    }

    let summary = BatchSummary::from_matches(&games);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} matches in {:.1}s ({:.1} matches/sec)",
        games.len(),
        duration_seconds,
        progress.rate()
    );

    BatchResults {
        config,
        games,
        summary,
        duration_seconds,
        errors,
    }
}

/// Outcome of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismReport {
    /// Final state hash of every run.
    pub hashes: Vec<u64>,
}

impl DeterminismReport {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Run the same match `runs` times and compare final state hashes.
pub fn verify_determinism(
    config: &MatchConfig,
    library: &Arc<StrategyLibrary>,
    runs: u32,
) -> Result<DeterminismReport> {
    let hashes = (0..runs)
        .map(|_| run_match(config.clone(), Arc::clone(library)).map(|r| r.final_state_hash))
        .collect::<Result<Vec<_>>>()?;
    Ok(DeterminismReport { hashes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_template() -> MatchConfig {
        MatchConfig {
            max_seconds: 60,
            ticks_per_second: 5,
            ..MatchConfig::default()
        }
    }

    fn library() -> Arc<StrategyLibrary> {
        Arc::new(StrategyLibrary::builtin())
    }

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.game_count, 100);
        assert_eq!(config.seed_start, 0);
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new(500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345);

        assert_eq!(config.game_count, 500);
        assert_eq!(config.seed_start, 12345);
        let third = config.match_config(2);
        assert_eq!(third.seed, 12347);
        assert_eq!(third.match_id, "match_12347");
    }

    #[test]
    fn test_progress_tracking() {
        let progress = BatchProgress::new(4);
        assert_eq!(progress.current(), 0);
        assert_eq!(progress.record_completion(), 1);
        assert_eq!(progress.record_completion(), 2);
        assert!((progress.percentage() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_batch_small() {
        let config = BatchConfig::new(4).with_template(quick_template());
        let results = run_batch(config, library());

        assert_eq!(results.games.len(), 4);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 4);
    }

    #[test]
    fn test_failed_matches_are_collected() {
        let mut template = quick_template();
        template.player.strategy = Some("Missing".to_string());
        let results = run_batch(BatchConfig::new(2).with_template(template), library());

        assert!(results.games.is_empty());
        assert_eq!(results.errors.len(), 2);
        assert!(results.errors[0].message.contains("Missing"));
    }

    #[test]
    fn test_verify_determinism() {
        let report = verify_determinism(&quick_template(), &library(), 3).expect("runs");
        assert_eq!(report.hashes.len(), 3);
        assert!(report.is_deterministic());
    }

    #[test]
    fn test_batch_results_save_load() {
        let config = BatchConfig::new(2).with_template(quick_template());
        let results = run_batch(config, library());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 2);
        assert_eq!(loaded.config.template, results.config.template);
    }
}
