//! Top-level orchestration of one faction's engine.
//!
//! A [`Director`] owns the assessor, tactical controller and production
//! scheduler for one team and drives them once per simulated frame. It
//! selects the strategy, advances attack waves and replaces a failing
//! strategy with its fallback.
//!
//! Two directors run side by side in a match, one per team. They share
//! nothing but the strategy library and the world they are handed on each
//! tick.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::assessor::{Assessment, BattlefieldAssessor};
use crate::config::EngineConfig;
use crate::economy::{LedgerConfig, ResourceLedger};
use crate::error::{AiError, Result};
use crate::events::AiEvent;
use crate::factions::{ControlMode, Race, Team};
use crate::math::{fixed_serde, Fixed};
use crate::production::ProductionScheduler;
use crate::strategy::{BuildStep, StrategyLibrary, StrategyProfile};
use crate::tactics::{TacticalController, TacticalState};
use crate::world::GameWorld;

/// Everything that distinguishes one faction's engine from the other's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactionContext {
    /// Team tag used to filter the registries.
    pub team: Team,
    /// Race, for strategy selection and worker types.
    pub race: Race,
    /// Bot or auto-pilot.
    pub mode: ControlMode,
    /// The faction's own resource store.
    pub ledger: ResourceLedger,
}

impl FactionContext {
    /// Build a context with a fresh ledger.
    #[must_use]
    pub fn new(team: Team, race: Race, mode: ControlMode, ledger: &LedgerConfig) -> Self {
        Self {
            team,
            race,
            mode,
            ledger: ResourceLedger::new(ledger),
        }
    }
}

/// Lifecycle of a director.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectorState {
    /// No strategy active; ticks do nothing.
    Uninitialized,
    /// Running the named strategy.
    Running(String),
}

/// A wave that is past its trigger time and still cannot launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveStall {
    /// Index of the pending wave.
    pub index: usize,
    /// Seconds past its trigger time.
    #[serde(with = "fixed_serde")]
    pub overdue: Fixed,
}

/// Serializable view of a director's decision state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Team.
    pub team: Team,
    /// Active strategy name.
    pub strategy: Option<String>,
    /// Seconds since the director started ticking.
    #[serde(with = "fixed_serde")]
    pub game_time: Fixed,
    /// Next unresolved wave.
    pub wave_index: usize,
    /// Whether the opening script has finished.
    pub opening_finished: bool,
    /// Shared queue, head first.
    pub queue: Vec<BuildStep>,
    /// Runtime build list with current weights.
    pub runtime_list: Vec<BuildStep>,
    /// Tactical posture.
    pub tactical_state: TacticalState,
    /// Gold balance.
    pub gold: i32,
    /// Lumber balance.
    pub lumber: i32,
}

impl Snapshot {
    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| AiError::Snapshot(e.to_string()))
    }

    /// Decode from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| AiError::Snapshot(e.to_string()))
    }

    /// Hash of the encoded snapshot.
    ///
    /// Two directors fed identical inputs produce identical hashes.
    pub fn state_hash(&self) -> Result<u64> {
        let bytes = self.to_bytes()?;
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Ok(hasher.finish())
    }
}

/// One faction's decision engine.
#[derive(Debug, Clone)]
pub struct Director {
    ctx: FactionContext,
    config: EngineConfig,
    library: Arc<StrategyLibrary>,
    rng: ChaCha8Rng,
    active: Option<StrategyProfile>,
    assessor: BattlefieldAssessor,
    tactics: TacticalController,
    scheduler: ProductionScheduler,
    game_time: Fixed,
    activated_at: Fixed,
    wave_index: usize,
    stall: Option<WaveStall>,
    previous_state: TacticalState,
}

impl Director {
    /// Create an uninitialized director.
    ///
    /// `seed` drives strategy selection and the macro-phase picks.
    #[must_use]
    pub fn new(ctx: FactionContext, config: EngineConfig, library: Arc<StrategyLibrary>, seed: u64) -> Self {
        let assessor = BattlefieldAssessor::new(ctx.team, config.scout_interval);
        let tactics = TacticalController::new(ctx.team, ctx.mode, &config);
        let scheduler = ProductionScheduler::new(ctx.team, ctx.race, &config);
        Self {
            ctx,
            config,
            library,
            rng: ChaCha8Rng::seed_from_u64(seed),
            active: None,
            assessor,
            tactics,
            scheduler,
            game_time: Fixed::ZERO,
            activated_at: Fixed::ZERO,
            wave_index: 0,
            stall: None,
            previous_state: TacticalState::Defend,
        }
    }

    /// Pick and install a strategy.
    ///
    /// With `forced` the named profile is used; otherwise one is drawn from
    /// the race's pool. On error the director keeps its previous state and
    /// the failure is logged.
    pub fn activate(&mut self, forced: Option<&str>) -> Result<Vec<AiEvent>> {
        let race = self.ctx.race;
        let picked = match forced {
            Some(name) => self
                .library
                .get(name)
                .filter(|p| p.race == race)
                .cloned()
                .ok_or_else(|| AiError::UnknownStrategy(name.to_string())),
            None => self.library.pick(race, &mut self.rng).cloned(),
        };

        let profile = match picked {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(team = ?self.ctx.team, error = %err, "Strategy activation failed");
                return Err(err);
            }
        };

        tracing::info!(team = ?self.ctx.team, strategy = %profile.name, "Strategy activated");
        let events = vec![AiEvent::StrategyActivated {
            name: profile.name.clone(),
        }];
        self.install(profile);
        Ok(events)
    }

    /// Advance the engine by `dt` seconds.
    ///
    /// Order within a tick: assessment, tactics, production, regeneration,
    /// wave check, failure check. Does nothing while uninitialized.
    pub fn tick<W: GameWorld + ?Sized>(&mut self, dt: Fixed, world: &mut W) -> Vec<AiEvent> {
        let mut events = Vec::new();
        if self.active.is_none() {
            return events;
        }

        self.game_time = self.game_time.saturating_add(dt);

        self.assessor.update(dt, world);
        let assessment = *self.assessor.latest();

        self.tactics.update(dt, &assessment, world, &mut events);

        let next_wave = self
            .active
            .as_ref()
            .and_then(|p| p.waves.get(self.wave_index));
        let report = self.scheduler.update(
            dt,
            &mut self.ctx.ledger,
            world,
            next_wave,
            &mut self.rng,
            &mut events,
        );
        if report.expansion_built {
            self.tactics.notify_expansion();
        }
        if report.all_out_attack {
            self.tactics.all_out_attack(&assessment, world, &mut events);
        }

        let in_siege = self.tactics.state() == TacticalState::Siege;
        self.ctx.ledger.tick_regen(dt, in_siege);

        self.check_wave(&assessment, world, &mut events);
        self.check_failure(&mut events);
        self.previous_state = self.tactics.state();

        events
    }

    /// Toggle the Siege posture.
    pub fn set_siege<W: GameWorld + ?Sized>(&mut self, on: bool, world: &mut W) -> Vec<AiEvent> {
        let mut events = Vec::new();
        self.tactics.set_siege(on, world, &mut events);
        events
    }

    /// Throw every army unit at the enemy now.
    pub fn all_out_attack<W: GameWorld + ?Sized>(&mut self, world: &mut W) -> Vec<AiEvent> {
        let mut events = Vec::new();
        let assessment = *self.assessor.latest();
        self.tactics.all_out_attack(&assessment, world, &mut events);
        events
    }

    /// Lifecycle state.
    #[must_use]
    pub fn state(&self) -> DirectorState {
        self.active
            .as_ref()
            .map_or(DirectorState::Uninitialized, |p| DirectorState::Running(p.name.clone()))
    }

    /// The active profile.
    #[must_use]
    pub const fn active_strategy(&self) -> Option<&StrategyProfile> {
        self.active.as_ref()
    }

    /// Team this director plays.
    #[must_use]
    pub const fn team(&self) -> Team {
        self.ctx.team
    }

    /// Faction context.
    #[must_use]
    pub const fn context(&self) -> &FactionContext {
        &self.ctx
    }

    /// The faction's ledger.
    #[must_use]
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ctx.ledger
    }

    /// Mutable ledger, for the host crediting mined resources.
    pub fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ctx.ledger
    }

    /// Seconds ticked so far.
    #[must_use]
    pub const fn game_time(&self) -> Fixed {
        self.game_time
    }

    /// Index of the next unresolved wave.
    #[must_use]
    pub const fn wave_index(&self) -> usize {
        self.wave_index
    }

    /// Current tactical posture.
    #[must_use]
    pub const fn tactical_state(&self) -> TacticalState {
        self.tactics.state()
    }

    /// Latest battlefield assessment.
    #[must_use]
    pub const fn assessment(&self) -> &Assessment {
        self.assessor.latest()
    }

    /// Tactical controller.
    #[must_use]
    pub const fn tactics(&self) -> &TacticalController {
        &self.tactics
    }

    /// Production scheduler.
    #[must_use]
    pub const fn scheduler(&self) -> &ProductionScheduler {
        &self.scheduler
    }

    /// The pending wave, if it has been overdue longer than the warning delay.
    #[must_use]
    pub const fn stalled_wave(&self) -> Option<WaveStall> {
        self.stall
    }

    /// Capture the decision state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            team: self.ctx.team,
            strategy: self.active.as_ref().map(|p| p.name.clone()),
            game_time: self.game_time,
            wave_index: self.wave_index,
            opening_finished: self.scheduler.is_opening_finished(),
            queue: self.scheduler.queue().iter().cloned().collect(),
            runtime_list: self.scheduler.runtime_list().steps().to_vec(),
            tactical_state: self.tactics.state(),
            gold: self.ctx.ledger.gold(),
            lumber: self.ctx.ledger.lumber(),
        }
    }

    fn install(&mut self, profile: StrategyProfile) {
        self.scheduler.activate(&profile);
        self.tactics.configure(&profile);
        self.wave_index = 0;
        self.activated_at = self.game_time;
        self.stall = None;
        self.active = Some(profile);
    }

    fn check_wave<W: GameWorld + ?Sized>(
        &mut self,
        assessment: &Assessment,
        world: &mut W,
        events: &mut Vec<AiEvent>,
    ) {
        let Some(wave) = self
            .active
            .as_ref()
            .and_then(|p| p.waves.get(self.wave_index))
            .cloned()
        else {
            return;
        };

        let elapsed = self.game_time.saturating_sub(self.activated_at);
        if elapsed < wave.trigger_time {
            return;
        }

        if let Some(units) = self.tactics.try_trigger_wave(&wave, assessment, world, events) {
            let index = self.wave_index;
            self.wave_index += 1;
            self.scheduler.reset_runtime_weights();
            self.stall = None;
            tracing::info!(team = ?self.ctx.team, wave = index, units, "Wave launched");
            events.push(AiEvent::WaveLaunched { index, units });
            return;
        }

        let overdue = elapsed.saturating_sub(wave.trigger_time);
        if overdue < self.config.wave_stall_warning {
            return;
        }
        match &mut self.stall {
            Some(stall) => stall.overdue = overdue,
            None => {
                tracing::warn!(
                    team = ?self.ctx.team,
                    wave = self.wave_index,
                    overdue = %overdue,
                    "Wave requirements still unmet"
                );
                events.push(AiEvent::WaveStalled {
                    index: self.wave_index,
                });
                self.stall = Some(WaveStall {
                    index: self.wave_index,
                    overdue,
                });
            }
        }
    }

    fn check_failure(&mut self, events: &mut Vec<AiEvent>) {
        let Some(profile) = self.active.as_ref().filter(|p| p.has_failure_trigger()) else {
            return;
        };

        let limit = profile.transition_time_limit;
        let timed_out =
            limit > Fixed::ZERO && self.game_time.saturating_sub(self.activated_at) >= limit;
        let repelled = profile.switch_on_repelled
            && self.previous_state == TacticalState::Attack
            && self.tactics.state() == TacticalState::Defend;
        if !timed_out && !repelled {
            return;
        }

        let Some(fallback) = self.library.fallback_of(profile).cloned() else {
            return;
        };

        let from = profile.name.clone();
        tracing::info!(
            team = ?self.ctx.team,
            from = %from,
            to = %fallback.name,
            timed_out,
            repelled,
            "Strategy switched"
        );
        events.push(AiEvent::StrategySwitched {
            from,
            to: fallback.name.clone(),
        });
        self.install(fallback);
        self.scheduler.arm();
    }
}
