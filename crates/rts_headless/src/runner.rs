//! Runs one match between two directors in an [`Arena`].
//!
//! The enemy side is a bot; the player side is the same engine running as
//! auto-pilot, with the runner standing in for the human who toggles Siege.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use rts_ai::config::EngineConfig;
use rts_ai::director::{Director, FactionContext};
use rts_ai::factions::{ControlMode, Race, Team};
use rts_ai::math::Fixed;
use rts_ai::strategy::StrategyLibrary;
use rts_ai::tactics::TacticalState;

use crate::arena::{Arena, ArenaConfig};
use crate::error::{HeadlessError, Result};
use crate::metrics::{MatchMetrics, MetricsCollector};

/// Progress logging interval (ticks).
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// One side of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideConfig {
    /// Race played.
    pub race: Race,
    /// Strategy to force; drawn from the race pool when unset.
    #[serde(default)]
    pub strategy: Option<String>,
}

impl SideConfig {
    /// A side with a random strategy.
    #[must_use]
    pub const fn new(race: Race) -> Self {
        Self {
            race,
            strategy: None,
        }
    }

    /// Force a named strategy.
    #[must_use]
    pub fn with_strategy(mut self, name: &str) -> Self {
        self.strategy = Some(name.to_string());
        self
    }
}

/// Configuration for a single match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Match identifier for logs and metrics.
    pub match_id: String,
    /// Seed for the map layout and both directors.
    pub seed: u64,
    /// Match length cap in simulated seconds.
    pub max_seconds: u32,
    /// Arena steps per simulated second.
    pub ticks_per_second: u32,
    /// Auto-pilot side.
    pub player: SideConfig,
    /// Bot side.
    pub enemy: SideConfig,
    /// Toggle the auto-pilot's Siege when its bases are threatened.
    pub autopilot_siege: bool,
    /// Engine tuning shared by both sides.
    pub engine: EngineConfig,
    /// Arena layout.
    pub arena: ArenaConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            match_id: "match_0".to_string(),
            seed: 0,
            max_seconds: 900,
            ticks_per_second: 10,
            player: SideConfig::new(Race::Kingdom),
            enemy: SideConfig::new(Race::Horde),
            autopilot_siege: true,
            engine: EngineConfig::default(),
            arena: ArenaConfig::default(),
        }
    }
}

impl MatchConfig {
    /// Default match with a given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            match_id: format!("match_{seed}"),
            seed,
            ..Default::default()
        }
    }

    /// Seconds per arena step.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.ticks_per_second.max(1))
    }

    /// Steps before the match times out.
    #[must_use]
    pub fn max_ticks(&self) -> u64 {
        u64::from(self.max_seconds) * u64::from(self.ticks_per_second)
    }

    /// Reject setups that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.ticks_per_second == 0 {
            return Err(HeadlessError::InvalidSetup(
                "ticks_per_second must be positive".to_string(),
            ));
        }
        if self.max_seconds == 0 {
            return Err(HeadlessError::InvalidSetup(
                "max_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of running a match.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// Collected metrics.
    pub metrics: MatchMetrics,
    /// Hash of the arena and both directors at the end.
    pub final_state_hash: u64,
}

/// Load strategies from a directory of RON files, or the built-in set.
pub fn load_library(dir: Option<&Path>) -> Result<StrategyLibrary> {
    match dir {
        Some(dir) => {
            let library = StrategyLibrary::load_dir(dir)?;
            info!(profiles = library.len(), dir = %dir.display(), "Loaded strategy library");
            Ok(library)
        }
        None => Ok(StrategyLibrary::builtin()),
    }
}

/// Drives an arena and two directors step by step.
pub struct MatchRunner {
    config: MatchConfig,
    arena: Arena,
    player: Director,
    enemy: Director,
    collector: MetricsCollector,
    dt: Fixed,
    ticks: u64,
    max_ticks: u64,
    outcome: Option<(Option<Team>, &'static str)>,
}

impl MatchRunner {
    /// Lay out the arena and activate both directors.
    pub fn new(config: MatchConfig, library: Arc<StrategyLibrary>) -> Result<Self> {
        config.validate()?;

        let arena = Arena::new(
            config.arena.clone(),
            config.player.race,
            config.enemy.race,
            config.seed,
        );
        let mut collector = MetricsCollector::new(&config.match_id, config.seed);

        let player_seed = config.seed.wrapping_mul(2);
        let mut player = Director::new(
            FactionContext::new(
                Team::Player,
                config.player.race,
                ControlMode::AutoPilot,
                &config.engine.ledger,
            ),
            config.engine.clone(),
            Arc::clone(&library),
            player_seed,
        );
        let mut enemy = Director::new(
            FactionContext::new(
                Team::Enemy,
                config.enemy.race,
                ControlMode::Bot,
                &config.engine.ledger,
            ),
            config.engine.clone(),
            library,
            player_seed.wrapping_add(1),
        );

        collector.on_setup(Team::Player, config.player.race);
        collector.on_events(
            Team::Player,
            &player.activate(config.player.strategy.as_deref())?,
        );
        collector.on_setup(Team::Enemy, config.enemy.race);
        collector.on_events(
            Team::Enemy,
            &enemy.activate(config.enemy.strategy.as_deref())?,
        );

        Ok(Self {
            dt: config.dt(),
            max_ticks: config.max_ticks(),
            config,
            arena,
            player,
            enemy,
            collector,
            ticks: 0,
            outcome: None,
        })
    }

    /// The arena.
    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable arena, for scripting situations in tests.
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Director playing `team`.
    #[must_use]
    pub const fn director(&self, team: Team) -> &Director {
        match team {
            Team::Player => &self.player,
            Team::Enemy => &self.enemy,
        }
    }

    /// Steps taken.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Winner and end condition, once the match is over.
    #[must_use]
    pub const fn outcome(&self) -> Option<(Option<Team>, &'static str)> {
        self.outcome
    }

    /// Metrics collected so far.
    #[must_use]
    pub const fn metrics(&self) -> &MatchMetrics {
        self.collector.current()
    }

    /// Advance one step. Returns `false` once the match is over.
    pub fn step(&mut self) -> bool {
        if self.outcome.is_some() {
            return false;
        }

        let report = self.arena.step(self.dt);
        for &(team, amount) in &report.mined {
            let director = match team {
                Team::Player => &mut self.player,
                Team::Enemy => &mut self.enemy,
            };
            director.ledger_mut().add(amount.gold, amount.lumber);
            self.collector.on_mined(team, amount);
        }
        for &(team, unit_type) in &report.units_lost {
            self.collector.on_unit_lost(team, unit_type);
        }
        for team in &report.bases_lost {
            info!(match_id = %self.config.match_id, team = ?team, "Base lost");
        }

        self.ticks += 1;
        self.collector.set_time(self.arena.elapsed());

        let events = self.player.tick(self.dt, &mut self.arena);
        self.collector.on_events(Team::Player, &events);
        let events = self.enemy.tick(self.dt, &mut self.arena);
        self.collector.on_events(Team::Enemy, &events);

        if self.config.autopilot_siege {
            self.drive_autopilot_siege();
        }

        self.outcome = self.check_outcome();
        self.outcome.is_none()
    }

    /// Run to the end and collect the result.
    pub fn run(mut self) -> Result<MatchResult> {
        info!(
            match_id = %self.config.match_id,
            seed = self.config.seed,
            max_ticks = self.max_ticks,
            player = ?self.config.player.race,
            enemy = ?self.config.enemy.race,
            "Starting match"
        );

        while self.step() {
            if self.ticks % PROGRESS_LOG_INTERVAL == 0 {
                debug!(
                    match_id = %self.config.match_id,
                    tick = self.ticks,
                    player_units = self.arena.unit_count(Team::Player),
                    enemy_units = self.arena.unit_count(Team::Enemy),
                    "Match progress"
                );
            }
        }

        self.finish()
    }

    /// Stop here and collect the result.
    pub fn finish(self) -> Result<MatchResult> {
        let final_state_hash = self.state_hash()?;
        let (winner, condition) = self.outcome.unwrap_or((None, "unfinished"));
        info!(
            match_id = %self.config.match_id,
            ticks = self.ticks,
            winner = ?winner,
            condition,
            "Match complete"
        );
        let metrics = self
            .collector
            .finalize(self.ticks, winner, condition, final_state_hash);
        Ok(MatchResult {
            metrics,
            final_state_hash,
        })
    }

    /// Combined hash of the arena and both directors' snapshots.
    pub fn state_hash(&self) -> Result<u64> {
        let mut hasher = DefaultHasher::new();
        self.arena.state_hash().hash(&mut hasher);
        self.player.snapshot().state_hash()?.hash(&mut hasher);
        self.enemy.snapshot().state_hash()?.hash(&mut hasher);
        Ok(hasher.finish())
    }

    fn drive_autopilot_siege(&mut self) {
        let threatened = self.player.tactics().threat_detected();
        let on = match self.player.tactical_state() {
            TacticalState::Defend if threatened => true,
            TacticalState::Siege if !threatened => false,
            _ => return,
        };
        let events = self.player.set_siege(on, &mut self.arena);
        self.collector.on_events(Team::Player, &events);
    }

    fn check_outcome(&self) -> Option<(Option<Team>, &'static str)> {
        let player_out = self.arena.is_eliminated(Team::Player);
        let enemy_out = self.arena.is_eliminated(Team::Enemy);
        match (player_out, enemy_out) {
            (true, true) => Some((None, "mutual_destruction")),
            (true, false) => Some((Some(Team::Enemy), "elimination")),
            (false, true) => Some((Some(Team::Player), "elimination")),
            (false, false) if self.ticks >= self.max_ticks => Some((None, "timeout")),
            (false, false) => None,
        }
    }
}

/// Run one match to completion.
pub fn run_match(config: MatchConfig, library: Arc<StrategyLibrary>) -> Result<MatchResult> {
    MatchRunner::new(config, library)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rts_ai::error::AiError;
    use rts_ai::math::Vec2Fixed;
    use rts_ai::units::UnitType;

    fn library() -> Arc<StrategyLibrary> {
        Arc::new(StrategyLibrary::builtin())
    }

    fn short_match(seed: u64) -> MatchConfig {
        MatchConfig {
            max_seconds: 120,
            ticks_per_second: 5,
            ..MatchConfig::new(seed)
        }
    }

    #[test]
    fn test_match_config_defaults() {
        let config = MatchConfig::new(7);
        assert_eq!(config.match_id, "match_7");
        assert_eq!(config.max_ticks(), 9000);
        assert_eq!(config.player.race, Race::Kingdom);
        assert_eq!(config.enemy.race, Race::Horde);
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        let config = MatchConfig {
            ticks_per_second: 0,
            ..MatchConfig::new(1)
        };
        assert!(matches!(
            MatchRunner::new(config, library()),
            Err(HeadlessError::InvalidSetup(_))
        ));
    }

    #[test]
    fn test_unknown_strategy_is_error() {
        let config = MatchConfig {
            enemy: SideConfig::new(Race::Horde).with_strategy("Kingdom Rush"),
            ..MatchConfig::new(1)
        };
        assert!(matches!(
            MatchRunner::new(config, library()),
            Err(HeadlessError::Ai(AiError::UnknownStrategy(_)))
        ));
    }

    #[test]
    fn test_forced_strategies_are_recorded() {
        let config = MatchConfig {
            player: SideConfig::new(Race::Kingdom).with_strategy("Kingdom Economic"),
            enemy: SideConfig::new(Race::Horde).with_strategy("Horde Raid"),
            ..short_match(3)
        };
        let runner = MatchRunner::new(config, library()).expect("valid setup");
        let metrics = runner.metrics();
        let opening = |team| {
            metrics
                .team(team)
                .and_then(|t| t.opening_strategy.clone())
        };
        assert_eq!(opening(Team::Player).as_deref(), Some("Kingdom Economic"));
        assert_eq!(opening(Team::Enemy).as_deref(), Some("Horde Raid"));
    }

    #[test]
    fn test_timeout_without_winner() {
        let config = MatchConfig {
            max_seconds: 1,
            ..MatchConfig::new(2)
        };
        let result = run_match(config, library()).expect("match runs");
        assert_eq!(result.metrics.ticks, 10);
        assert!(result.metrics.winner.is_none());
        assert_eq!(result.metrics.win_condition, "timeout");
    }

    #[test]
    fn test_mining_credits_the_ledgers() {
        let mut runner = MatchRunner::new(short_match(4), library()).expect("valid setup");
        for _ in 0..50 {
            runner.step();
        }
        let player = runner.metrics().team(Team::Player).expect("player recorded");
        assert!(player.gold_mined > 0);
    }

    #[test]
    fn test_same_seed_same_match() {
        let a = run_match(short_match(11), library()).expect("match runs");
        let b = run_match(short_match(11), library()).expect("match runs");
        assert_eq!(a.final_state_hash, b.final_state_hash);
        assert_eq!(a.metrics.winner, b.metrics.winner);
        assert_eq!(a.metrics.ticks, b.metrics.ticks);
    }

    #[test]
    fn test_autopilot_sieges_when_base_threatened() {
        let mut runner = MatchRunner::new(short_match(5), library()).expect("valid setup");
        let home = runner.arena().home(Team::Player);
        for _ in 0..4 {
            runner
                .arena_mut()
                .spawn(Team::Enemy, UnitType::Ogre, home + Vec2Fixed::from_ints(150, 0));
        }

        for _ in 0..20 {
            runner.step();
        }

        assert_eq!(
            runner.director(Team::Player).tactical_state(),
            TacticalState::Siege
        );
        let player = runner.metrics().team(Team::Player).expect("player recorded");
        assert_eq!(player.siege_entries, 1);
    }

    #[test]
    fn test_sample_profiles_load_and_play() {
        let dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data/strategies"));
        let library = Arc::new(load_library(Some(dir)).expect("sample profiles parse"));
        assert_eq!(library.len(), 4);
        assert_eq!(library.pool(Race::Kingdom).count(), 1);

        let config = MatchConfig {
            player: SideConfig::new(Race::Kingdom).with_strategy("Kingdom Archer Line"),
            ..short_match(9)
        };
        let result = run_match(config, library).expect("match runs");
        let enemy = result.metrics.teams.get("enemy").expect("enemy recorded");
        assert_eq!(enemy.opening_strategy.as_deref(), Some("Horde Ogre Push"));
    }
}
