//! Production scheduling: the shared build queue, the opening script, the
//! weighted macro phase, worker replenishment and labor rebalancing.
//!
//! The scheduler never spends resources it has not checked for first, and
//! never skips past the head of the queue: an unaffordable head blocks
//! everything behind it until income catches up.

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::economy::{Cost, ResourceKind, ResourceLedger};
use crate::events::{AiEvent, DropReason};
use crate::factions::{Race, Team};
use crate::math::{consume_interval, Fixed};
use crate::strategy::{
    effective_weight, AttackWave, BuildStep, ExpansionPolicy, ExpansionTuning, StrategyProfile,
};
use crate::world::{GameWorld, UnitInfo, UnitRegistry};

/// Strict FIFO of build steps.
///
/// Only the head is ever considered for purchase.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductionQueue {
    steps: VecDeque<BuildStep>,
}

impl ProductionQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step at the back.
    pub fn push(&mut self, step: BuildStep) {
        self.steps.push_back(step);
    }

    /// The step next in line.
    #[must_use]
    pub fn head(&self) -> Option<&BuildStep> {
        self.steps.front()
    }

    /// Remove and return the head.
    pub fn pop(&mut self) -> Option<BuildStep> {
        self.steps.pop_front()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.steps.clear();
    }

    /// Iterate from head to back.
    pub fn iter(&self) -> impl Iterator<Item = &BuildStep> {
        self.steps.iter()
    }
}

/// Mutable working copy of a macro composition.
///
/// Holds the authored source next to the live copy so weights can be
/// restored without going back to the profile. The two always have the
/// same length and order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuntimeBuildList {
    source: Vec<BuildStep>,
    steps: Vec<BuildStep>,
}

impl RuntimeBuildList {
    /// Start from the authored composition.
    #[must_use]
    pub fn new(source: Vec<BuildStep>) -> Self {
        Self {
            steps: source.clone(),
            source,
        }
    }

    /// Live steps with their current weights.
    #[must_use]
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// Current weights, in composition order.
    #[must_use]
    pub fn weights(&self) -> Vec<Fixed> {
        self.steps.iter().map(BuildStep::weight).collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Restore every weight to its authored value.
    pub fn reset(&mut self) {
        self.steps.clone_from(&self.source);
    }

    /// Multiply the weight of every unit entry the wave still lacks.
    ///
    /// An entry qualifies when its unit type is required by `wave` and
    /// `live_count` reports fewer than required. Weights compound across
    /// calls and saturate at `cap`. Returns how many entries were raised.
    pub fn amplify<F>(&mut self, wave: &AttackWave, factor: Fixed, cap: Fixed, live_count: F) -> usize
    where
        F: Fn(crate::units::UnitType) -> u32,
    {
        let mut raised = 0;
        for step in &mut self.steps {
            let Some(unit_type) = step.unit_type() else {
                continue;
            };
            let Some(&required) = wave.required_units.get(&unit_type) else {
                continue;
            };
            if live_count(unit_type) >= required {
                continue;
            }
            let amplified = step.effective_weight().saturating_mul(factor).min(cap);
            step.set_weight(amplified);
            raised += 1;
        }

        #[cfg(feature = "debug-validation")]
        assert_eq!(self.steps.len(), self.source.len());

        raised
    }
}

/// Pick one candidate with probability proportional to its weight.
///
/// Weights `<= 0` count as 1. Walks the cumulative weights with a single
/// uniform roll over the total. Returns `None` only for an empty slice.
pub fn weighted_pick<'a, R: Rng + ?Sized>(candidates: &'a [BuildStep], rng: &mut R) -> Option<&'a BuildStep> {
    let weights: Vec<Fixed> = candidates.iter().map(BuildStep::weight).collect();
    weighted_index(&weights, rng).map(|i| &candidates[i])
}

/// Index form of [`weighted_pick`] over raw weights.
pub fn weighted_index<R: Rng + ?Sized>(weights: &[Fixed], rng: &mut R) -> Option<usize> {
    let total = weights
        .iter()
        .fold(0u64, |acc, w| acc.saturating_add(effective_weight(*w).to_bits() as u64));
    if total == 0 {
        return None;
    }

    let roll = rng.gen_range(0..total);
    let mut cumulative = 0u64;
    for (i, w) in weights.iter().enumerate() {
        cumulative = cumulative.saturating_add(effective_weight(*w).to_bits() as u64);
        if roll < cumulative {
            return Some(i);
        }
    }
    Some(weights.len() - 1)
}

/// Side effects of one scheduler update that the director must act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductionReport {
    /// An outpost was started this update.
    pub expansion_built: bool,
    /// The economy is exhausted and no site is free: attack with everything.
    pub all_out_attack: bool,
}

/// Fills and drains one faction's production queue.
#[derive(Debug, Clone)]
pub struct ProductionScheduler {
    team: Team,
    race: Race,
    config: EngineConfig,
    queue: ProductionQueue,
    opening: VecDeque<BuildStep>,
    opening_finished: bool,
    runtime: RuntimeBuildList,
    expansion: ExpansionTuning,
    policy: ExpansionPolicy,
    ideal_workers: u32,
    production_timer: Fixed,
    labor_timer: Fixed,
}

impl ProductionScheduler {
    /// Create an idle scheduler. Nothing is produced until [`Self::activate`].
    #[must_use]
    pub fn new(team: Team, race: Race, config: &EngineConfig) -> Self {
        Self {
            team,
            race,
            config: config.clone(),
            queue: ProductionQueue::new(),
            opening: VecDeque::new(),
            opening_finished: false,
            runtime: RuntimeBuildList::default(),
            expansion: ExpansionTuning::default(),
            policy: ExpansionPolicy::default(),
            ideal_workers: 0,
            production_timer: Fixed::ZERO,
            labor_timer: Fixed::ZERO,
        }
    }

    /// Load a profile, discarding all queued and scripted work.
    ///
    /// Resources already spent stay spent.
    pub fn activate(&mut self, profile: &StrategyProfile) {
        self.queue.clear();
        self.opening = profile.opening.iter().flat_map(BuildStep::expand).collect();
        self.opening_finished = false;
        self.runtime = RuntimeBuildList::new(profile.macro_composition.clone());
        self.expansion = profile.expansion;
        self.policy = profile.expansion_policy;
        self.ideal_workers = profile.ideal_workers;
        self.production_timer = Fixed::ZERO;
        self.labor_timer = Fixed::ZERO;
    }

    /// Make the next update run a production pass regardless of the timer.
    pub fn arm(&mut self) {
        self.production_timer = self.config.production_interval;
    }

    /// Restore the runtime build list to authored weights.
    pub fn reset_runtime_weights(&mut self) {
        self.runtime.reset();
    }

    /// The shared queue.
    #[must_use]
    pub const fn queue(&self) -> &ProductionQueue {
        &self.queue
    }

    /// The runtime build list.
    #[must_use]
    pub const fn runtime_list(&self) -> &RuntimeBuildList {
        &self.runtime
    }

    /// Whether the opening script has run to completion.
    #[must_use]
    pub const fn is_opening_finished(&self) -> bool {
        self.opening_finished
    }

    /// Opening steps not yet handed to the shared queue.
    #[must_use]
    pub fn opening_remaining(&self) -> usize {
        self.opening.len()
    }

    /// Advance timers and run whichever passes are due.
    ///
    /// The production pass drains the head, then fills the queue from the
    /// opening script or the macro phase, then tops up workers. The labor
    /// pass runs on its own cadence.
    pub fn update<W, R>(
        &mut self,
        dt: Fixed,
        ledger: &mut ResourceLedger,
        world: &mut W,
        next_wave: Option<&AttackWave>,
        rng: &mut R,
        events: &mut Vec<AiEvent>,
    ) -> ProductionReport
    where
        W: GameWorld + ?Sized,
        R: Rng + ?Sized,
    {
        let mut report = ProductionReport::default();

        self.production_timer = self.production_timer.saturating_add(dt);
        if consume_interval(&mut self.production_timer, self.config.production_interval) {

            if self.drain_head(ledger, world, events) {
                report.expansion_built = true;
            }

            if !self.opening_finished {
                self.run_opening(events);
            }
            if self.opening_finished {
                report.all_out_attack = self.run_macro(ledger, world, next_wave, rng, events);
                if !report.all_out_attack {
                    self.top_up_workers(ledger, world, events);
                }
            }
        }

        self.labor_timer = self.labor_timer.saturating_add(dt);
        if consume_interval(&mut self.labor_timer, self.config.labor_interval) {
            self.rebalance_labor(ledger, world, events);
        }

        report
    }

    /// Cost of a step, if the world knows it.
    pub fn step_cost<W: GameWorld + ?Sized>(&self, step: &BuildStep, world: &W) -> Option<Cost> {
        match step {
            BuildStep::Unit { unit_type, .. } => world.unit_cost(*unit_type),
            BuildStep::Upgrade { upgrade, .. } => world.upgrade_cost(*upgrade),
            BuildStep::Expansion { .. } => world.outpost_cost(self.race),
        }
    }

    /// Try to buy the head step. Returns true when an outpost was started.
    fn drain_head<W: GameWorld + ?Sized>(
        &mut self,
        ledger: &mut ResourceLedger,
        world: &mut W,
        events: &mut Vec<AiEvent>,
    ) -> bool {
        let Some(step) = self.queue.head().cloned() else {
            return false;
        };

        match step.clone() {
            BuildStep::Unit { unit_type, .. } => {
                let Some(cost) = world.unit_cost(unit_type) else {
                    self.drop_head(step, DropReason::SpawnRefused, events);
                    return false;
                };
                if !ledger.can_afford(cost) {
                    return false;
                }
                self.queue.pop();
                if world.try_purchase(self.team, unit_type, ledger) {
                    tracing::debug!(team = ?self.team, unit = ?unit_type, "Unit purchased");
                    events.push(AiEvent::Purchased { step });
                } else {
                    events.push(AiEvent::Dropped {
                        step,
                        reason: DropReason::SpawnRefused,
                    });
                }
                false
            }
            BuildStep::Upgrade { upgrade, .. } => {
                if world.is_unlocked(upgrade, self.team) || world.is_researching(upgrade, self.team) {
                    self.drop_head(step, DropReason::Redundant, events);
                    return false;
                }
                if !world.is_researchable(upgrade, self.team) {
                    self.drop_head(step, DropReason::Unresearchable, events);
                    return false;
                }
                let Some(cost) = world.upgrade_cost(upgrade) else {
                    self.drop_head(step, DropReason::ConfigurationMissing, events);
                    return false;
                };
                if !ledger.can_afford(cost) {
                    return false;
                }
                self.queue.pop();
                ledger.spend_cost(cost);
                world.purchase(upgrade, self.team);
                tracing::debug!(team = ?self.team, upgrade = upgrade.0, "Upgrade purchased");
                events.push(AiEvent::Purchased { step });
                false
            }
            BuildStep::Expansion { .. } => {
                let cost = match world.price_outpost(self.race) {
                    Ok(cost) => cost,
                    Err(error) => {
                        tracing::warn!(team = ?self.team, %error, "Dropping expansion");
                        self.drop_head(step, DropReason::ConfigurationMissing, events);
                        return false;
                    }
                };
                if !ledger.can_afford(cost) {
                    return false;
                }
                self.queue.pop();
                if world.try_build_outpost(self.team, self.race, self.policy) {
                    ledger.spend_cost(cost);
                    tracing::info!(team = ?self.team, policy = ?self.policy, "Outpost started");
                    events.push(AiEvent::Purchased { step });
                    events.push(AiEvent::ExpansionBuilt);
                    true
                } else {
                    tracing::debug!(team = ?self.team, "Outpost build failed, dropping");
                    events.push(AiEvent::Dropped {
                        step,
                        reason: DropReason::BuildFailed,
                    });
                    false
                }
            }
        }
    }

    fn drop_head(&mut self, step: BuildStep, reason: DropReason, events: &mut Vec<AiEvent>) {
        self.queue.pop();
        tracing::debug!(team = ?self.team, step = %step.label(), ?reason, "Dropped head step");
        events.push(AiEvent::Dropped { step, reason });
    }

    fn enqueue(&mut self, step: BuildStep, events: &mut Vec<AiEvent>) {
        tracing::debug!(team = ?self.team, step = %step.label(), depth = self.queue.len(), "Enqueued");
        self.queue.push(step.clone());
        events.push(AiEvent::Enqueued { step });
    }

    fn run_opening(&mut self, events: &mut Vec<AiEvent>) {
        if self.opening.is_empty() {
            if self.queue.is_empty() {
                self.opening_finished = true;
                self.runtime.reset();
                tracing::info!(team = ?self.team, "Opening finished");
            }
            return;
        }

        if self.queue.len() < self.config.opening_queue_depth {
            if let Some(step) = self.opening.pop_front() {
                self.enqueue(step, events);
            }
        }
    }

    /// Returns true when the economy is spent and an all-out attack is due.
    fn run_macro<W, R>(
        &mut self,
        ledger: &ResourceLedger,
        world: &W,
        next_wave: Option<&AttackWave>,
        rng: &mut R,
        events: &mut Vec<AiEvent>,
    ) -> bool
    where
        W: GameWorld + ?Sized,
        R: Rng + ?Sized,
    {
        while self.queue.len() < self.config.macro_queue_depth {
            let current = ledger.amount(ResourceKind::Gold);
            let remaining = self.remaining_gold(world);
            let cost = world
                .outpost_cost(self.race)
                .map_or(0, |c| c.of(ResourceKind::Gold));
            let reserves = current.saturating_add(remaining);

            if reserves <= cost {
                return self.critical_economy(world, events);
            }

            let shortfall = cost
                .saturating_mul(self.config.expansion_reserve_outposts)
                .saturating_sub(reserves)
                .max(0);
            let expansion_weight = self
                .expansion
                .base_weight
                .saturating_add(self.expansion.scarcity_sensitivity.saturating_mul(Fixed::from_num(shortfall)))
                .max(Fixed::ONE);

            let mut candidates: Vec<BuildStep> = self.runtime.steps().to_vec();
            candidates.push(BuildStep::Expansion {
                weight: expansion_weight,
            });

            let Some(picked) = weighted_pick(&candidates, rng).cloned() else {
                break;
            };
            self.enqueue(picked, events);

            if let Some(wave) = next_wave {
                let team = self.team;
                self.runtime.amplify(
                    wave,
                    self.config.amplification_factor,
                    self.config.amplification_cap,
                    |unit_type| world.live_count(team, unit_type),
                );
            }
        }
        false
    }

    fn critical_economy<W: GameWorld + ?Sized>(&mut self, world: &W, events: &mut Vec<AiEvent>) -> bool {
        self.queue.clear();
        if world.has_free_build_site(self.team) {
            tracing::info!(team = ?self.team, "Critical economy, forcing expansion");
            self.enqueue(BuildStep::expansion(self.config.critical_expansion_weight), events);
            false
        } else {
            tracing::info!(team = ?self.team, "Critical economy with no free site");
            true
        }
    }

    fn remaining_gold<W: GameWorld + ?Sized>(&self, world: &W) -> i32 {
        world
            .bases()
            .iter()
            .filter(|b| b.team == self.team && b.constructed)
            .fold(0i32, |acc, b| {
                acc.saturating_add(world.remaining_at(b.id, ResourceKind::Gold).max(0))
            })
    }

    fn top_up_workers<W: GameWorld + ?Sized>(
        &mut self,
        ledger: &ResourceLedger,
        world: &W,
        events: &mut Vec<AiEvent>,
    ) {
        if self.queue.len() >= self.config.worker_queue_depth {
            return;
        }

        let (primary, secondary) = self.race.workers();
        let live = world.live_count(self.team, primary) + world.live_count(self.team, secondary);
        let queued = self
            .queue
            .iter()
            .filter(|s| s.unit_type().is_some_and(|t| t == primary || t == secondary))
            .count() as u32;
        if live + queued >= self.ideal_workers {
            return;
        }

        let Some(worker_cost) = world.unit_cost(primary) else {
            return;
        };
        let reserved = self
            .queue
            .head()
            .and_then(|head| self.step_cost(head, world))
            .unwrap_or(Cost::ZERO);
        if !ledger.can_afford(reserved + worker_cost) {
            return;
        }

        self.enqueue(BuildStep::unit(primary), events);
    }

    fn rebalance_labor<W: GameWorld + ?Sized>(
        &self,
        ledger: &ResourceLedger,
        world: &mut W,
        events: &mut Vec<AiEvent>,
    ) {
        let Some(head_cost) = self.queue.head().and_then(|head| self.step_cost(head, world)) else {
            return;
        };
        let (lacks_gold, lacks_lumber) = ledger.shortfall(head_cost);

        let units = world.units();
        for (lacking, to) in [(lacks_lumber, ResourceKind::Lumber), (lacks_gold, ResourceKind::Gold)] {
            if lacking && self.shift_worker(&units, to, world, events) {
                return;
            }
        }
    }

    /// Move one worker from the other resource onto `to`.
    ///
    /// Gold workers move once no longer busy; lumber keeps at least one
    /// active harvester.
    fn shift_worker<W: GameWorld + ?Sized>(
        &self,
        units: &[UnitInfo],
        to: ResourceKind,
        world: &mut W,
        events: &mut Vec<AiEvent>,
    ) -> bool {
        let from = to.other();
        let donors: Vec<_> = units
            .iter()
            .filter(|u| u.is_live_on(self.team) && u.unit_type.is_worker())
            .filter_map(|u| u.labor.map(|labor| (u.id, labor)))
            .filter(|(_, l)| {
                l.kind == from
                    && match from {
                        ResourceKind::Gold => l.activity.is_reassignable(),
                        ResourceKind::Lumber => l.activity.is_active(),
                    }
            })
            .map(|(id, _)| id)
            .collect();
        let keep = match from {
            ResourceKind::Gold => 0,
            ResourceKind::Lumber => 1,
        };
        if donors.len() <= keep {
            return false;
        }

        let id = donors[0];
        world.assign_labor(id, to);
        tracing::debug!(team = ?self.team, worker = id, ?from, ?to, "Worker reassigned");
        events.push(AiEvent::LaborReassigned { worker: id, to });
        true
    }
}
