//! Match metrics collection for strategy analysis.
//!
//! The collector turns the engine's event stream (plus what the arena
//! reports about mining and losses) into per-team counters, and aggregates
//! many matches into a batch summary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use rts_ai::economy::Cost;
use rts_ai::events::{AiEvent, DropReason};
use rts_ai::factions::{Race, Team};
use rts_ai::math::Fixed;
use rts_ai::strategy::BuildStep;
use rts_ai::tactics::TacticalState;
use rts_ai::units::UnitType;

/// Maximum notable events kept per match.
const MAX_EVENTS: usize = 10_000;

/// Stable key for a team in metric maps.
#[must_use]
pub fn team_key(team: Team) -> &'static str {
    match team {
        Team::Player => "player",
        Team::Enemy => "enemy",
    }
}

/// Complete metrics for a single match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchMetrics {
    /// Unique match identifier.
    pub match_id: String,
    /// Seed the match ran with.
    pub seed: u64,
    /// Simulated duration in seconds.
    pub duration_seconds: f64,
    /// Number of arena steps.
    pub ticks: u64,
    /// Winning team key (None = draw or timeout).
    pub winner: Option<String>,
    /// How the match ended.
    pub win_condition: String,
    /// Per-team metrics.
    pub teams: HashMap<String, TeamMetrics>,
    /// Notable engine decisions, in order.
    pub events: Vec<TimedEvent>,
    /// Final combined state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl MatchMetrics {
    /// Create a new match metrics instance.
    #[must_use]
    pub fn new(match_id: impl Into<String>, seed: u64) -> Self {
        Self {
            match_id: match_id.into(),
            seed,
            ..Default::default()
        }
    }

    /// Get or create team metrics.
    pub fn team_mut(&mut self, team: Team) -> &mut TeamMetrics {
        self.teams
            .entry(team_key(team).to_string())
            .or_insert_with(|| TeamMetrics::new(team))
    }

    /// Metrics of one team, if it has recorded anything.
    #[must_use]
    pub fn team(&self, team: Team) -> Option<&TeamMetrics> {
        self.teams.get(team_key(team))
    }
}

/// Metrics for one team in a match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Team key.
    pub team: String,
    /// Race played.
    pub race: Option<Race>,
    /// First strategy activated.
    pub opening_strategy: Option<String>,
    /// Strategy active at the end.
    pub final_strategy: Option<String>,
    /// Fallback switches taken.
    pub strategy_switches: u32,

    // === Economy ===
    /// Gold mined.
    pub gold_mined: i64,
    /// Lumber mined.
    pub lumber_mined: i64,
    /// Units bought by type.
    pub units_purchased: HashMap<String, u32>,
    /// Upgrades bought.
    pub upgrades_purchased: u32,
    /// Outposts started.
    pub expansions: u32,
    /// Queue steps dropped unbought, by reason.
    pub steps_dropped: HashMap<String, u32>,
    /// Workers moved between resource kinds.
    pub labor_reassignments: u32,

    // === Military ===
    /// Scheduled waves launched.
    pub waves_launched: u32,
    /// All-out attacks ordered.
    pub all_out_attacks: u32,
    /// Seconds into the match of the first wave.
    pub first_wave_seconds: Option<f64>,
    /// Times the team entered Siege.
    pub siege_entries: u32,
    /// Waves reported stalled.
    pub stalled_waves: u32,
    /// Units lost by type.
    pub units_lost: HashMap<String, u32>,
}

impl TeamMetrics {
    /// Create empty metrics for a team.
    #[must_use]
    pub fn new(team: Team) -> Self {
        Self {
            team: team_key(team).to_string(),
            ..Default::default()
        }
    }

    /// Total units bought.
    #[must_use]
    pub fn total_units_purchased(&self) -> u32 {
        self.units_purchased.values().sum()
    }

    /// Total units lost.
    #[must_use]
    pub fn total_units_lost(&self) -> u32 {
        self.units_lost.values().sum()
    }
}

/// One notable engine decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Seconds into the match.
    pub seconds: f64,
    /// Team key.
    pub team: String,
    /// The decision.
    pub event: AiEvent,
}

fn is_notable(event: &AiEvent) -> bool {
    !matches!(
        event,
        AiEvent::Enqueued { .. }
            | AiEvent::Purchased { .. }
            | AiEvent::Dropped { .. }
            | AiEvent::LaborReassigned { .. }
    )
}

/// Tracks events during a match.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: MatchMetrics,
    seconds: f64,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(match_id: &str, seed: u64) -> Self {
        Self {
            metrics: MatchMetrics::new(match_id, seed),
            seconds: 0.0,
        }
    }

    /// Set the current match time.
    pub fn set_time(&mut self, time: Fixed) {
        self.seconds = time.to_num::<f64>();
    }

    /// Record which race a team plays.
    pub fn on_setup(&mut self, team: Team, race: Race) {
        self.metrics.team_mut(team).race = Some(race);
    }

    /// Record resources the arena credited to a team.
    pub fn on_mined(&mut self, team: Team, amount: Cost) {
        let metrics = self.metrics.team_mut(team);
        metrics.gold_mined += i64::from(amount.gold);
        metrics.lumber_mined += i64::from(amount.lumber);
    }

    /// Record a unit killed.
    pub fn on_unit_lost(&mut self, team: Team, unit_type: UnitType) {
        *self
            .metrics
            .team_mut(team)
            .units_lost
            .entry(format!("{unit_type:?}"))
            .or_insert(0) += 1;
    }

    /// Record every event one engine emitted this tick.
    pub fn on_events(&mut self, team: Team, events: &[AiEvent]) {
        for event in events {
            self.on_event(team, event);
        }
    }

    /// Record one engine event.
    pub fn on_event(&mut self, team: Team, event: &AiEvent) {
        let seconds = self.seconds;
        let metrics = self.metrics.team_mut(team);
        match event {
            AiEvent::StrategyActivated { name } => {
                metrics.opening_strategy.get_or_insert_with(|| name.clone());
                metrics.final_strategy = Some(name.clone());
            }
            AiEvent::StrategySwitched { to, .. } => {
                metrics.strategy_switches += 1;
                metrics.final_strategy = Some(to.clone());
            }
            AiEvent::Purchased { step } => match step {
                BuildStep::Unit { unit_type, .. } => {
                    *metrics
                        .units_purchased
                        .entry(format!("{unit_type:?}"))
                        .or_insert(0) += 1;
                }
                BuildStep::Upgrade { .. } => metrics.upgrades_purchased += 1,
                BuildStep::Expansion { .. } => {}
            },
            AiEvent::ExpansionBuilt => metrics.expansions += 1,
            AiEvent::Dropped { reason, .. } => {
                *metrics
                    .steps_dropped
                    .entry(drop_key(*reason).to_string())
                    .or_insert(0) += 1;
            }
            AiEvent::WaveLaunched { .. } => {
                metrics.waves_launched += 1;
                metrics.first_wave_seconds.get_or_insert(seconds);
            }
            AiEvent::AllOutAttack { .. } => metrics.all_out_attacks += 1,
            AiEvent::LaborReassigned { .. } => metrics.labor_reassignments += 1,
            AiEvent::TacticalStateChanged { to, .. } => {
                if *to == TacticalState::Siege {
                    metrics.siege_entries += 1;
                }
            }
            AiEvent::WaveStalled { .. } => metrics.stalled_waves += 1,
            AiEvent::Enqueued { .. } => {}
        }

        if is_notable(event) && self.metrics.events.len() < MAX_EVENTS {
            self.metrics.events.push(TimedEvent {
                seconds,
                team: team_key(team).to_string(),
                event: event.clone(),
            });
        }
    }

    /// Get current metrics (for inspection during the match).
    #[must_use]
    pub const fn current(&self) -> &MatchMetrics {
        &self.metrics
    }

    /// Finalize and return the metrics.
    #[must_use]
    pub fn finalize(
        mut self,
        ticks: u64,
        winner: Option<Team>,
        condition: &str,
        final_state_hash: u64,
    ) -> MatchMetrics {
        self.metrics.duration_seconds = self.seconds;
        self.metrics.ticks = ticks;
        self.metrics.winner = winner.map(|t| team_key(t).to_string());
        self.metrics.win_condition = condition.to_string();
        self.metrics.final_state_hash = final_state_hash;
        self.metrics
    }
}

const fn drop_key(reason: DropReason) -> &'static str {
    match reason {
        DropReason::Redundant => "redundant",
        DropReason::Unresearchable => "unresearchable",
        DropReason::ConfigurationMissing => "configuration_missing",
        DropReason::BuildFailed => "build_failed",
        DropReason::SpawnRefused => "spawn_refused",
    }
}

/// Summary statistics across multiple matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total matches played.
    pub total_games: u32,
    /// Matches won by each team.
    pub wins_by_team: HashMap<String, u32>,
    /// Win rates by team.
    pub win_rates: HashMap<String, f64>,
    /// Matches won by each opening strategy.
    pub wins_by_strategy: HashMap<String, u32>,
    /// Draws and timeouts.
    pub draws: u32,
    /// Average match duration in seconds.
    pub avg_duration_seconds: f64,
    /// Shortest match.
    pub min_duration_seconds: f64,
    /// Longest match.
    pub max_duration_seconds: f64,

    // === Aggregated Stats ===
    /// Average units bought per match by team.
    pub avg_units_purchased: HashMap<String, f64>,
    /// Average waves launched per match by team.
    pub avg_waves_launched: HashMap<String, f64>,
    /// Average gold mined per match by team.
    pub avg_gold_mined: HashMap<String, f64>,
    /// Average first-wave time by team, over matches that launched one.
    pub avg_first_wave_seconds: HashMap<String, f64>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl BatchSummary {
    /// Calculate summary from a list of match metrics.
    #[must_use]
    pub fn from_matches(matches: &[MatchMetrics]) -> Self {
        if matches.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total_games: matches.len() as u32,
            min_duration_seconds: f64::MAX,
            ..Default::default()
        };

        let mut durations = Vec::with_capacity(matches.len());
        let mut units: HashMap<String, Vec<f64>> = HashMap::new();
        let mut waves: HashMap<String, Vec<f64>> = HashMap::new();
        let mut gold: HashMap<String, Vec<f64>> = HashMap::new();
        let mut first_wave: HashMap<String, Vec<f64>> = HashMap::new();

        for game in matches {
            durations.push(game.duration_seconds);
            summary.min_duration_seconds = summary.min_duration_seconds.min(game.duration_seconds);
            summary.max_duration_seconds = summary.max_duration_seconds.max(game.duration_seconds);

            if let Some(winner) = &game.winner {
                *summary.wins_by_team.entry(winner.clone()).or_default() += 1;
                if let Some(strategy) = game
                    .teams
                    .get(winner)
                    .and_then(|t| t.opening_strategy.clone())
                {
                    *summary.wins_by_strategy.entry(strategy).or_default() += 1;
                }
            } else {
                summary.draws += 1;
            }

            for (key, team) in &game.teams {
                units
                    .entry(key.clone())
                    .or_default()
                    .push(f64::from(team.total_units_purchased()));
                waves
                    .entry(key.clone())
                    .or_default()
                    .push(f64::from(team.waves_launched));
                gold.entry(key.clone())
                    .or_default()
                    .push(team.gold_mined as f64);
                if let Some(seconds) = team.first_wave_seconds {
                    first_wave.entry(key.clone()).or_default().push(seconds);
                }
            }
        }

        summary.avg_duration_seconds = mean(&durations);

        for (team, wins) in &summary.wins_by_team {
            summary.win_rates.insert(
                team.clone(),
                f64::from(*wins) / f64::from(summary.total_games),
            );
        }

        let averages = |samples: HashMap<String, Vec<f64>>| {
            samples
                .into_iter()
                .map(|(k, v)| (k, mean(&v)))
                .collect::<HashMap<_, _>>()
        };
        summary.avg_units_purchased = averages(units);
        summary.avg_waves_launched = averages(waves);
        summary.avg_gold_mined = averages(gold);
        summary.avg_first_wave_seconds = averages(first_wave);

        summary
    }

    /// Check whether both teams win within `threshold` of an even split.
    #[must_use]
    pub fn is_balanced(&self, threshold: f64) -> bool {
        self.win_rates
            .values()
            .all(|rate| (rate - 0.5).abs() <= threshold)
    }

    /// The team winning more than `0.5 + threshold` of matches, if any.
    #[must_use]
    pub fn dominant_team(&self, threshold: f64) -> Option<&String> {
        self.win_rates
            .iter()
            .find(|(_, rate)| **rate > 0.5 + threshold)
            .map(|(team, _)| team)
    }
}
