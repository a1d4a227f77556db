//! Test fixtures and helpers.
//!
//! [`MockWorld`] implements every collaborator trait the engine needs with
//! plain in-memory tables, so tests can script a battlefield, tick a
//! director against it and inspect the orders it issued.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use fixed::types::I32F32;
use rts_ai::prelude::*;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In engine code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Combat stats for a unit type: `(health, attack_damage, attack_cooldown)`.
#[must_use]
pub fn unit_stats(unit_type: UnitType) -> (i32, i32, Fixed) {
    match unit_type {
        UnitType::Peasant | UnitType::Thrall => (40, 3, fixed_f(1.5)),
        UnitType::Engineer | UnitType::Digger => (50, 4, fixed_f(1.5)),
        UnitType::Swordsman => (100, 10, fixed(2)),
        UnitType::Archer => (60, 8, fixed_f(1.5)),
        UnitType::Knight => (180, 16, fixed(2)),
        UnitType::Ballista => (90, 30, fixed(4)),
        UnitType::GuardTower => (300, 12, fixed_f(1.5)),
        UnitType::Raider => (80, 9, fixed_f(1.5)),
        UnitType::Spearman => (100, 11, fixed(2)),
        UnitType::Shaman => (60, 12, fixed_f(2.5)),
        UnitType::Ogre => (220, 20, fixed(3)),
        UnitType::Watchpost => (250, 10, fixed_f(1.5)),
    }
}

/// Default price list.
#[must_use]
pub fn standard_unit_costs() -> BTreeMap<UnitType, Cost> {
    UnitType::ALL
        .iter()
        .map(|&t| {
            let cost = match t {
                UnitType::Peasant | UnitType::Thrall => Cost::new(50, 0),
                UnitType::Engineer | UnitType::Digger => Cost::new(60, 0),
                UnitType::Swordsman | UnitType::Spearman => Cost::new(60, 20),
                UnitType::Archer | UnitType::Raider => Cost::new(50, 30),
                UnitType::Knight | UnitType::Ogre => Cost::new(120, 40),
                UnitType::Ballista | UnitType::Shaman => Cost::new(100, 80),
                UnitType::GuardTower | UnitType::Watchpost => Cost::new(80, 60),
            };
            (t, cost)
        })
        .collect()
}

/// An order the engine issued to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// `attack_move`.
    AttackMove {
        /// Unit.
        unit: EntityId,
        /// Target.
        target: Vec2Fixed,
    },
    /// `move_to`.
    MoveTo {
        /// Unit.
        unit: EntityId,
        /// Target.
        target: Vec2Fixed,
    },
    /// `assign_labor`.
    AssignLabor {
        /// Worker.
        unit: EntityId,
        /// Resource kind.
        kind: ResourceKind,
    },
    /// `garrison`.
    Garrison {
        /// Unit.
        unit: EntityId,
    },
}

/// Scriptable in-memory world.
///
/// Every table is public; tests adjust whatever they need directly.
#[derive(Debug, Clone)]
pub struct MockWorld {
    /// Units of both teams.
    pub units: Vec<UnitInfo>,
    /// Bases of both teams.
    pub bases: Vec<BaseInfo>,
    /// Unit price list. Missing types have no cost data.
    pub unit_costs: BTreeMap<UnitType, Cost>,
    /// Upgrade prices overriding `default_upgrade_cost`.
    pub upgrade_costs: BTreeMap<UpgradeId, Cost>,
    /// Price of any upgrade not listed.
    pub default_upgrade_cost: Option<Cost>,
    /// Outpost price per race. Missing races have no outpost data.
    pub outpost_costs: BTreeMap<Race, Cost>,
    /// Whether the construction subsystem is running.
    pub construction_available: bool,
    /// Free outpost sites, shared by both teams.
    pub free_sites: u32,
    /// Forces every outpost build attempt to fail.
    pub fail_builds: bool,
    /// Forces every unit purchase to be refused.
    pub refuse_spawns: bool,
    /// Researched upgrades.
    pub unlocked: BTreeSet<(Team, UpgradeId)>,
    /// Upgrades in progress.
    pub researching: BTreeSet<(Team, UpgradeId)>,
    /// Upgrades whose prerequisites are not met.
    pub locked: BTreeSet<(Team, UpgradeId)>,
    /// In-ground resources per base.
    pub fields: BTreeMap<(EntityId, ResourceKind), i32>,
    /// Every order received, in order.
    pub orders: Vec<Order>,
    /// Units bought through the spawner.
    pub purchases: Vec<(Team, UnitType)>,
    /// Upgrades bought.
    pub upgrades_bought: Vec<(Team, UpgradeId)>,
    /// Outposts started.
    pub outposts_built: Vec<(Team, ExpansionPolicy)>,
    next_id: EntityId,
}

impl Default for MockWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorld {
    /// Empty battlefield with the standard price list, both races' outpost
    /// costs and two free sites.
    #[must_use]
    pub fn new() -> Self {
        let mut outpost_costs = BTreeMap::new();
        outpost_costs.insert(Race::Kingdom, Cost::new(300, 150));
        outpost_costs.insert(Race::Horde, Cost::new(280, 160));
        Self {
            units: Vec::new(),
            bases: Vec::new(),
            unit_costs: standard_unit_costs(),
            upgrade_costs: BTreeMap::new(),
            default_upgrade_cost: Some(Cost::new(100, 50)),
            outpost_costs,
            construction_available: true,
            free_sites: 2,
            fail_builds: false,
            refuse_spawns: false,
            unlocked: BTreeSet::new(),
            researching: BTreeSet::new(),
            locked: BTreeSet::new(),
            fields: BTreeMap::new(),
            orders: Vec::new(),
            purchases: Vec::new(),
            upgrades_bought: Vec::new(),
            outposts_built: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a constructed base with plenty of gold and lumber in the ground.
    pub fn add_base(&mut self, team: Team, x: i32, y: i32) -> EntityId {
        let id = self.allocate_id();
        self.bases.push(BaseInfo {
            id,
            team,
            position: Vec2Fixed::from_ints(x, y),
            constructed: true,
        });
        self.fields.insert((id, ResourceKind::Gold), 10_000);
        self.fields.insert((id, ResourceKind::Lumber), 10_000);
        id
    }

    /// Set the in-ground amount of one resource at a base.
    pub fn set_remaining(&mut self, base: EntityId, kind: ResourceKind, amount: i32) {
        self.fields.insert((base, kind), amount);
    }

    /// Spawn a unit with the standard stats. Workers start idle on gold.
    pub fn spawn(&mut self, team: Team, unit_type: UnitType, x: i32, y: i32) -> EntityId {
        let id = self.allocate_id();
        let (health, attack_damage, attack_cooldown) = unit_stats(unit_type);
        let labor = unit_type.is_worker().then_some(Labor {
            kind: ResourceKind::Gold,
            activity: LaborActivity::Idle,
        });
        self.units.push(UnitInfo {
            id,
            team,
            unit_type,
            position: Vec2Fixed::from_ints(x, y),
            health,
            attack_damage,
            attack_cooldown,
            alive: true,
            labor,
        });
        id
    }

    /// Spawn `count` units at one spot.
    pub fn spawn_many(&mut self, team: Team, unit_type: UnitType, count: u32, x: i32, y: i32) -> Vec<EntityId> {
        (0..count).map(|_| self.spawn(team, unit_type, x, y)).collect()
    }

    /// Spawn a worker already busy on a resource.
    pub fn spawn_worker(
        &mut self,
        team: Team,
        unit_type: UnitType,
        kind: ResourceKind,
        activity: LaborActivity,
    ) -> EntityId {
        let id = self.spawn(team, unit_type, 0, 0);
        if let Some(unit) = self.unit_mut(id) {
            unit.labor = Some(Labor { kind, activity });
        }
        id
    }

    /// Mark a unit dead.
    pub fn kill(&mut self, id: EntityId) {
        if let Some(unit) = self.unit_mut(id) {
            unit.alive = false;
            unit.health = 0;
        }
    }

    /// Kill every live unit of a team and type.
    pub fn kill_all(&mut self, team: Team, unit_type: UnitType) {
        for unit in &mut self.units {
            if unit.team == team && unit.unit_type == unit_type {
                unit.alive = false;
                unit.health = 0;
            }
        }
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&UnitInfo> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Look up a unit mutably.
    pub fn unit_mut(&mut self, id: EntityId) -> Option<&mut UnitInfo> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    /// Units that received an attack-move order.
    #[must_use]
    pub fn attack_orders(&self) -> Vec<EntityId> {
        self.orders
            .iter()
            .filter_map(|o| match o {
                Order::AttackMove { unit, .. } => Some(*unit),
                _ => None,
            })
            .collect()
    }

    /// Labor reassignments, in order.
    #[must_use]
    pub fn labor_orders(&self) -> Vec<(EntityId, ResourceKind)> {
        self.orders
            .iter()
            .filter_map(|o| match o {
                Order::AssignLabor { unit, kind } => Some((*unit, *kind)),
                _ => None,
            })
            .collect()
    }

    /// Finish every base under construction.
    pub fn finish_construction(&mut self) {
        for base in &mut self.bases {
            base.constructed = true;
        }
    }
}

impl UnitRegistry for MockWorld {
    fn units(&self) -> Vec<UnitInfo> {
        self.units.clone()
    }

    fn bases(&self) -> Vec<BaseInfo> {
        self.bases.clone()
    }
}

impl ConstructionSites for MockWorld {
    fn construction_available(&self) -> bool {
        self.construction_available
    }

    fn outpost_cost(&self, race: Race) -> Option<Cost> {
        self.outpost_costs.get(&race).copied()
    }

    fn has_free_build_site(&self, _team: Team) -> bool {
        self.free_sites > 0
    }

    fn try_build_outpost(&mut self, team: Team, _race: Race, policy: ExpansionPolicy) -> bool {
        if self.fail_builds || self.free_sites == 0 {
            return false;
        }
        self.free_sites -= 1;

        let id = self.allocate_id();
        let offset = 200 * (self.bases.len() as i32 + 1);
        self.bases.push(BaseInfo {
            id,
            team,
            position: Vec2Fixed::from_ints(offset, 0),
            constructed: false,
        });
        self.fields.insert((id, ResourceKind::Gold), 10_000);
        self.fields.insert((id, ResourceKind::Lumber), 10_000);
        self.outposts_built.push((team, policy));
        tracing::debug!(?team, ?policy, "Mock outpost started");
        true
    }
}

impl UpgradeLedger for MockWorld {
    fn is_unlocked(&self, upgrade: UpgradeId, team: Team) -> bool {
        self.unlocked.contains(&(team, upgrade))
    }

    fn is_researching(&self, upgrade: UpgradeId, team: Team) -> bool {
        self.researching.contains(&(team, upgrade))
    }

    fn is_researchable(&self, upgrade: UpgradeId, team: Team) -> bool {
        !self.locked.contains(&(team, upgrade))
    }

    fn upgrade_cost(&self, upgrade: UpgradeId) -> Option<Cost> {
        self.upgrade_costs
            .get(&upgrade)
            .copied()
            .or(self.default_upgrade_cost)
    }

    fn purchase(&mut self, upgrade: UpgradeId, team: Team) {
        self.researching.insert((team, upgrade));
        self.upgrades_bought.push((team, upgrade));
    }
}

impl UnitSpawner for MockWorld {
    fn unit_cost(&self, unit_type: UnitType) -> Option<Cost> {
        self.unit_costs.get(&unit_type).copied()
    }

    fn try_purchase(&mut self, team: Team, unit_type: UnitType, ledger: &mut ResourceLedger) -> bool {
        if self.refuse_spawns {
            return false;
        }
        let Some(cost) = self.unit_cost(unit_type) else {
            return false;
        };
        if !ledger.can_afford(cost) {
            return false;
        }
        ledger.spend_cost(cost);

        let spot = self
            .bases
            .iter()
            .find(|b| b.team == team)
            .map_or(Vec2Fixed::ZERO, |b| b.position);
        self.spawn(team, unit_type, 0, 0);
        if let Some(unit) = self.units.last_mut() {
            unit.position = spot;
        }
        self.purchases.push((team, unit_type));
        true
    }
}

impl ResourceFields for MockWorld {
    fn remaining_at(&self, base: EntityId, kind: ResourceKind) -> i32 {
        self.fields.get(&(base, kind)).copied().unwrap_or(0)
    }
}

impl UnitOrders for MockWorld {
    fn attack_move(&mut self, unit: EntityId, target: Vec2Fixed) {
        self.orders.push(Order::AttackMove { unit, target });
    }

    fn move_to(&mut self, unit: EntityId, target: Vec2Fixed) {
        self.orders.push(Order::MoveTo { unit, target });
    }

    fn assign_labor(&mut self, unit: EntityId, kind: ResourceKind) {
        if let Some(info) = self.unit_mut(unit) {
            info.labor = Some(Labor {
                kind,
                activity: LaborActivity::Moving,
            });
        }
        self.orders.push(Order::AssignLabor { unit, kind });
    }

    fn garrison(&mut self, unit: EntityId) {
        self.orders.push(Order::Garrison { unit });
    }
}

/// Ledger configuration with fixed balances and no passive income.
#[must_use]
pub fn still_ledger(gold: i32, lumber: i32) -> LedgerConfig {
    LedgerConfig {
        starting_gold: gold,
        starting_lumber: lumber,
        regen_amount: 0,
        ..LedgerConfig::default()
    }
}

/// A minimal valid profile: no opening, one swordsman entry, no waves.
#[must_use]
pub fn bare_profile(name: &str, race: Race) -> StrategyProfile {
    let soldier = match race {
        Race::Kingdom => UnitType::Swordsman,
        Race::Horde => UnitType::Spearman,
    };
    StrategyProfile {
        name: name.to_string(),
        race,
        in_pool: true,
        opening: Vec::new(),
        macro_composition: vec![BuildStep::unit(soldier)],
        expansion: ExpansionTuning::default(),
        waves: Vec::new(),
        fallback: None,
        transition_time_limit: Fixed::ZERO,
        switch_on_repelled: false,
        ideal_workers: 0,
        expansion_policy: ExpansionPolicy::Safe,
        retreat_mode: RetreatMode::FixedFloor,
        siege_when_threatened: false,
    }
}

/// Build a library from profiles.
///
/// # Panics
///
/// Panics if the profiles do not form a valid library.
#[must_use]
pub fn library_of(profiles: Vec<StrategyProfile>) -> Arc<StrategyLibrary> {
    Arc::new(StrategyLibrary::new(profiles).expect("fixture profiles must be valid"))
}

/// An Enemy-team bot director with `active` already activated.
///
/// # Panics
///
/// Panics if `active` is not in `profiles` or the library is invalid.
#[must_use]
pub fn bot_director(profiles: Vec<StrategyProfile>, active: &str, ledger: &LedgerConfig, seed: u64) -> Director {
    let race = profiles
        .iter()
        .find(|p| p.name == active)
        .map_or(Race::Kingdom, |p| p.race);
    let ctx = FactionContext::new(Team::Enemy, race, ControlMode::Bot, ledger);
    let mut director = Director::new(ctx, EngineConfig::default(), library_of(profiles), seed);
    director
        .activate(Some(active))
        .expect("fixture strategy must activate");
    director
}

/// Tick a director `n` times at `dt` seconds, collecting every event.
pub fn run_ticks(director: &mut Director, world: &mut MockWorld, dt: Fixed, n: usize) -> Vec<AiEvent> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(director.tick(dt, world));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_kill() {
        let mut world = MockWorld::new();
        let ids = world.spawn_many(Team::Enemy, UnitType::Swordsman, 3, 0, 0);
        assert_eq!(world.live_count(Team::Enemy, UnitType::Swordsman), 3);

        world.kill(ids[0]);
        assert_eq!(world.live_count(Team::Enemy, UnitType::Swordsman), 2);
    }

    #[test]
    fn test_purchase_spends_and_spawns() {
        let mut world = MockWorld::new();
        world.add_base(Team::Enemy, 10, 20);
        let mut ledger = ResourceLedger::new(&still_ledger(100, 100));

        assert!(world.try_purchase(Team::Enemy, UnitType::Peasant, &mut ledger));
        assert_eq!(ledger.gold(), 50);
        assert_eq!(world.live_count(Team::Enemy, UnitType::Peasant), 1);
        assert_eq!(world.units[0].position, Vec2Fixed::from_ints(10, 20));

        assert!(!world.try_purchase(Team::Enemy, UnitType::Knight, &mut ledger));
        assert_eq!(ledger.gold(), 50);
    }

    #[test]
    fn test_outposts_consume_sites() {
        let mut world = MockWorld::new();
        world.free_sites = 1;

        assert!(world.try_build_outpost(Team::Enemy, Race::Kingdom, ExpansionPolicy::Forward));
        assert!(!world.has_free_build_site(Team::Enemy));
        assert!(!world.try_build_outpost(Team::Enemy, Race::Kingdom, ExpansionPolicy::Safe));
        assert_eq!(world.outposts_built, vec![(Team::Enemy, ExpansionPolicy::Forward)]);
    }

    #[test]
    fn test_bare_profile_is_valid() {
        assert!(bare_profile("Test", Race::Horde).validate().is_ok());
    }
}
