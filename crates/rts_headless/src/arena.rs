//! Abstract two-team sandbox the directors play in.
//!
//! Workers mine straight out of the fields of their team's bases, purchases
//! spawn instantly at a base, and units walk axis by axis and fight anything
//! hostile within range.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rts_ai::economy::{Cost, ResourceKind, ResourceLedger};
use rts_ai::factions::{Race, Team};
use rts_ai::math::{fixed_decimal, nearest_by, Fixed, Vec2Fixed};
use rts_ai::strategy::ExpansionPolicy;
use rts_ai::units::{UnitType, UpgradeId};
use rts_ai::world::{
    BaseInfo, ConstructionSites, EntityId, Labor, LaborActivity, ResourceFields, UnitInfo,
    UnitOrders, UnitRegistry, UnitSpawner, UpgradeLedger,
};

/// Units can hit a base from this far outside their own range.
const BASE_RADIUS: i32 = 40;

/// Combat and price data for one unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStats {
    /// Purchase price.
    pub cost: Cost,
    /// Starting health.
    pub health: i32,
    /// Damage per attack.
    pub damage: i32,
    /// Seconds between attacks.
    pub cooldown: Fixed,
    /// Distance covered per second along each axis. Zero for static units.
    pub speed: Fixed,
    /// Attack range.
    pub range: Fixed,
}

/// Stat table for every unit type.
#[must_use]
pub fn unit_stats(unit_type: UnitType) -> UnitStats {
    let (gold, lumber, health, damage, cooldown, speed, range) = match unit_type {
        UnitType::Peasant => (50, 0, 40, 3, 1.5, 60, 20),
        UnitType::Engineer => (70, 10, 50, 4, 1.5, 60, 20),
        UnitType::Swordsman => (120, 0, 120, 12, 1.0, 50, 24),
        UnitType::Archer => (100, 40, 70, 9, 1.2, 50, 120),
        UnitType::Knight => (220, 60, 220, 20, 1.5, 80, 28),
        UnitType::Ballista => (250, 150, 90, 45, 3.0, 30, 200),
        UnitType::GuardTower => (150, 100, 300, 15, 1.0, 0, 150),
        UnitType::Thrall => (50, 0, 45, 3, 1.5, 60, 20),
        UnitType::Digger => (70, 10, 55, 4, 1.5, 60, 20),
        UnitType::Raider => (100, 0, 90, 10, 0.8, 90, 24),
        UnitType::Spearman => (90, 30, 80, 9, 1.2, 50, 110),
        UnitType::Shaman => (150, 80, 60, 18, 2.0, 45, 100),
        UnitType::Ogre => (260, 40, 320, 24, 1.6, 45, 30),
        UnitType::Watchpost => (140, 100, 280, 14, 1.0, 0, 140),
    };
    UnitStats {
        cost: Cost::new(gold, lumber),
        health,
        damage,
        cooldown: Fixed::from_num(cooldown),
        speed: Fixed::from_num(speed),
        range: Fixed::from_num(range),
    }
}

/// Price and prerequisite of one researchable upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDef {
    /// Upgrade identifier.
    pub id: UpgradeId,
    /// Research price.
    pub cost: Cost,
    /// Upgrade that must be researched first.
    #[serde(default)]
    pub requires: Option<UpgradeId>,
}

/// Arena layout and pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Map width.
    pub width: i32,
    /// Map height.
    pub height: i32,
    /// Number of free outpost sites.
    pub build_sites: u32,
    /// Primary workers each side starts with.
    pub starting_workers: u32,
    /// Gold reachable from a home base.
    pub gold_per_base: i32,
    /// Lumber reachable from a home base.
    pub lumber_per_base: i32,
    /// Health of every base.
    pub base_health: i32,
    /// Resource extracted per worker per second.
    #[serde(with = "fixed_decimal")]
    pub mining_rate: Fixed,
    /// Seconds an outpost takes to finish.
    #[serde(with = "fixed_decimal")]
    pub outpost_build_time: Fixed,
    /// Seconds a research takes to finish.
    #[serde(with = "fixed_decimal")]
    pub research_time: Fixed,
    /// Whether outposts can be built at all.
    pub construction_enabled: bool,
    /// Kingdom outpost price.
    pub kingdom_outpost: Cost,
    /// Horde outpost price.
    pub horde_outpost: Cost,
    /// Researchable upgrades.
    pub upgrades: Vec<UpgradeDef>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 2400,
            height: 1600,
            build_sites: 6,
            starting_workers: 5,
            gold_per_base: 6000,
            lumber_per_base: 4000,
            base_health: 1500,
            mining_rate: Fixed::from_num(2),
            outpost_build_time: Fixed::from_num(30),
            research_time: Fixed::from_num(40),
            construction_enabled: true,
            kingdom_outpost: Cost::new(300, 150),
            horde_outpost: Cost::new(280, 160),
            upgrades: vec![
                UpgradeDef {
                    id: UpgradeId(1),
                    cost: Cost::new(150, 100),
                    requires: None,
                },
                UpgradeDef {
                    id: UpgradeId(2),
                    cost: Cost::new(200, 150),
                    requires: Some(UpgradeId(1)),
                },
                UpgradeDef {
                    id: UpgradeId(11),
                    cost: Cost::new(150, 100),
                    requires: None,
                },
                UpgradeDef {
                    id: UpgradeId(12),
                    cost: Cost::new(200, 150),
                    requires: Some(UpgradeId(11)),
                },
            ],
        }
    }
}

/// What one arena step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Resources mined per team; the host credits these to the ledgers.
    pub mined: Vec<(Team, Cost)>,
    /// Units killed, by owner.
    pub units_lost: Vec<(Team, UnitType)>,
    /// Bases destroyed, by owner.
    pub bases_lost: Vec<Team>,
    /// Outposts that finished construction.
    pub outposts_completed: Vec<Team>,
    /// Research that finished.
    pub upgrades_completed: Vec<(Team, UpgradeId)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Command {
    Hold,
    Move(Vec2Fixed),
    AttackMove(Vec2Fixed),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Research {
    InProgress(Fixed),
    Done,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Unit(usize),
    Base(usize),
}

#[derive(Debug, Clone)]
struct ArenaUnit {
    info: UnitInfo,
    command: Command,
    speed: Fixed,
    range: Fixed,
    reload: Fixed,
    mined: Fixed,
}

#[derive(Debug, Clone)]
struct ArenaBase {
    info: BaseInfo,
    health: i32,
    build_left: Fixed,
    gold: i32,
    lumber: i32,
    site: Option<usize>,
}

impl ArenaBase {
    fn remaining(&self, kind: ResourceKind) -> i32 {
        match kind {
            ResourceKind::Gold => self.gold,
            ResourceKind::Lumber => self.lumber,
        }
    }

    fn take(&mut self, kind: ResourceKind, amount: i32) -> i32 {
        let field = match kind {
            ResourceKind::Gold => &mut self.gold,
            ResourceKind::Lumber => &mut self.lumber,
        };
        let taken = amount.min(*field).max(0);
        *field -= taken;
        taken
    }
}

#[derive(Debug, Clone)]
struct BuildSite {
    position: Vec2Fixed,
    gold: i32,
    lumber: i32,
    claimed_by: Option<Team>,
}

fn slot(team: Team) -> usize {
    match team {
        Team::Player => 0,
        Team::Enemy => 1,
    }
}

fn amount_of(kind: ResourceKind, amount: i32) -> Cost {
    match kind {
        ResourceKind::Gold => Cost::new(amount, 0),
        ResourceKind::Lumber => Cost::new(0, amount),
    }
}

fn approach(from: Vec2Fixed, to: Vec2Fixed, step: Fixed) -> Vec2Fixed {
    let axis = |a: Fixed, b: Fixed| a.saturating_add(b.saturating_sub(a).clamp(-step, step));
    Vec2Fixed::new(axis(from.x, to.x), axis(from.y, to.y))
}

/// The sandbox world. Implements every collaborator trait the engine needs.
#[derive(Debug, Clone)]
pub struct Arena {
    config: ArenaConfig,
    races: [Race; 2],
    homes: [Vec2Fixed; 2],
    next_id: EntityId,
    units: Vec<ArenaUnit>,
    bases: Vec<ArenaBase>,
    sites: Vec<BuildSite>,
    research: BTreeMap<(Team, UpgradeId), Research>,
    elapsed: Fixed,
}

impl Arena {
    /// Lay out a map: one home base and a few workers per side, plus
    /// seeded outpost sites in between.
    #[must_use]
    pub fn new(config: ArenaConfig, player_race: Race, enemy_race: Race, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mid_y = config.height / 2;
        let homes = [
            Vec2Fixed::from_ints(200, mid_y),
            Vec2Fixed::from_ints(config.width - 200, mid_y),
        ];

        let sites = (0..config.build_sites)
            .map(|_| {
                let x = rng.gen_range(config.width / 6..=config.width * 5 / 6);
                let y = rng.gen_range(config.height / 8..=config.height * 7 / 8);
                let richness = rng.gen_range(80..=120);
                BuildSite {
                    position: Vec2Fixed::from_ints(x, y),
                    gold: config.gold_per_base * richness / 100,
                    lumber: config.lumber_per_base * richness / 100,
                    claimed_by: None,
                }
            })
            .collect();

        let mut arena = Self {
            config,
            races: [player_race, enemy_race],
            homes,
            next_id: 1,
            units: Vec::new(),
            bases: Vec::new(),
            sites,
            research: BTreeMap::new(),
            elapsed: Fixed::ZERO,
        };

        for team in [Team::Player, Team::Enemy] {
            let home = arena.homes[slot(team)];
            let (gold, lumber) = (arena.config.gold_per_base, arena.config.lumber_per_base);
            arena.add_base(team, home, true, gold, lumber, None);
            let worker = arena.race(team).primary_worker();
            for _ in 0..arena.config.starting_workers {
                arena.spawn(team, worker, home);
            }
        }

        arena
    }

    /// Arena configuration.
    #[must_use]
    pub const fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Race playing `team`.
    #[must_use]
    pub const fn race(&self, team: Team) -> Race {
        match team {
            Team::Player => self.races[0],
            Team::Enemy => self.races[1],
        }
    }

    /// Starting position of `team`.
    #[must_use]
    pub fn home(&self, team: Team) -> Vec2Fixed {
        self.homes[slot(team)]
    }

    /// Seconds simulated so far.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Live units of `team`.
    #[must_use]
    pub fn unit_count(&self, team: Team) -> usize {
        self.units.iter().filter(|u| u.info.is_live_on(team)).count()
    }

    /// Bases of `team`, finished or not.
    #[must_use]
    pub fn base_count(&self, team: Team) -> usize {
        self.bases.iter().filter(|b| b.info.team == team).count()
    }

    /// Whether `team` has lost every base.
    #[must_use]
    pub fn is_eliminated(&self, team: Team) -> bool {
        self.base_count(team) == 0
    }

    /// Unclaimed outpost sites.
    #[must_use]
    pub fn free_sites(&self) -> usize {
        self.sites.iter().filter(|s| s.claimed_by.is_none()).count()
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&UnitInfo> {
        self.units.iter().find(|u| u.info.id == id).map(|u| &u.info)
    }

    /// Place a unit without paying for it.
    pub fn spawn(&mut self, team: Team, unit_type: UnitType, position: Vec2Fixed) -> EntityId {
        let stats = unit_stats(unit_type);
        let id = self.next_entity();
        let labor = unit_type.is_worker().then_some(Labor {
            kind: ResourceKind::Gold,
            activity: LaborActivity::Moving,
        });
        self.units.push(ArenaUnit {
            info: UnitInfo {
                id,
                team,
                unit_type,
                position,
                health: stats.health,
                attack_damage: stats.damage,
                attack_cooldown: stats.cooldown,
                alive: true,
                labor,
            },
            command: Command::Hold,
            speed: stats.speed,
            range: stats.range,
            reload: Fixed::ZERO,
            mined: Fixed::ZERO,
        });
        id
    }

    /// Advance the world by `dt` seconds.
    pub fn step(&mut self, dt: Fixed) -> StepReport {
        let mut report = StepReport::default();
        self.advance_construction(dt, &mut report);
        self.advance_research(dt, &mut report);
        self.move_units(dt);
        self.mine(dt, &mut report);
        self.resolve_combat(dt, &mut report);
        self.elapsed = self.elapsed.saturating_add(dt);
        report
    }

    /// Hash of the full world state.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.elapsed.to_bits().hash(&mut hasher);
        for unit in &self.units {
            let info = &unit.info;
            info.id.hash(&mut hasher);
            info.team.hash(&mut hasher);
            info.unit_type.hash(&mut hasher);
            info.position.hash(&mut hasher);
            info.health.hash(&mut hasher);
            info.labor.hash(&mut hasher);
            unit.command.hash(&mut hasher);
        }
        for base in &self.bases {
            base.info.id.hash(&mut hasher);
            base.info.team.hash(&mut hasher);
            base.info.constructed.hash(&mut hasher);
            base.health.hash(&mut hasher);
            base.gold.hash(&mut hasher);
            base.lumber.hash(&mut hasher);
        }
        for site in &self.sites {
            site.position.hash(&mut hasher);
            site.gold.hash(&mut hasher);
            site.lumber.hash(&mut hasher);
            site.claimed_by.hash(&mut hasher);
        }
        self.research.hash(&mut hasher);
        hasher.finish()
    }

    fn next_entity(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn add_base(
        &mut self,
        team: Team,
        position: Vec2Fixed,
        constructed: bool,
        gold: i32,
        lumber: i32,
        site: Option<usize>,
    ) -> EntityId {
        let id = self.next_entity();
        self.bases.push(ArenaBase {
            info: BaseInfo {
                id,
                team,
                position,
                constructed,
            },
            health: self.config.base_health,
            build_left: if constructed {
                Fixed::ZERO
            } else {
                self.config.outpost_build_time
            },
            gold,
            lumber,
            site,
        });
        id
    }

    fn unit_mut(&mut self, id: EntityId) -> Option<&mut ArenaUnit> {
        self.units
            .iter_mut()
            .find(|u| u.info.id == id && u.info.alive)
    }

    fn spawn_point(&self, team: Team) -> Option<Vec2Fixed> {
        self.bases
            .iter()
            .find(|b| b.info.team == team && b.info.constructed)
            .map(|b| b.info.position)
    }

    fn upgrade_def(&self, upgrade: UpgradeId) -> Option<&UpgradeDef> {
        self.config.upgrades.iter().find(|u| u.id == upgrade)
    }

    fn advance_construction(&mut self, dt: Fixed, report: &mut StepReport) {
        for base in self.bases.iter_mut().filter(|b| !b.info.constructed) {
            base.build_left = base.build_left.saturating_sub(dt);
            if base.build_left <= Fixed::ZERO {
                base.info.constructed = true;
                debug!(team = ?base.info.team, base = base.info.id, "Outpost completed");
                report.outposts_completed.push(base.info.team);
            }
        }
    }

    fn advance_research(&mut self, dt: Fixed, report: &mut StepReport) {
        for (&(team, upgrade), research) in &mut self.research {
            if let Research::InProgress(left) = research {
                let remaining = left.saturating_sub(dt);
                *research = if remaining <= Fixed::ZERO {
                    report.upgrades_completed.push((team, upgrade));
                    Research::Done
                } else {
                    Research::InProgress(remaining)
                };
            }
        }
    }

    fn engaged(&self, index: usize) -> bool {
        self.pick_target(index).is_some()
    }

    fn move_units(&mut self, dt: Fixed) {
        for i in 0..self.units.len() {
            let destination = match self.units[i].command {
                Command::Hold => continue,
                Command::Move(target) => target,
                Command::AttackMove(target) => {
                    if self.engaged(i) {
                        continue;
                    }
                    target
                }
            };
            let unit = &mut self.units[i];
            let step = unit.speed.saturating_mul(dt);
            unit.info.position = approach(unit.info.position, destination, step);
            if unit.info.position == destination {
                unit.command = Command::Hold;
            }
        }
    }

    fn mine(&mut self, dt: Fixed, report: &mut StepReport) {
        let mut credit = [Cost::ZERO; 2];

        for i in 0..self.units.len() {
            let Some(labor) = self.units[i].info.labor else {
                continue;
            };
            match labor.activity {
                LaborActivity::Moving => {
                    self.units[i].info.labor = Some(Labor {
                        activity: LaborActivity::Mining,
                        ..labor
                    });
                    continue;
                }
                LaborActivity::Mining => {}
                _ => continue,
            }

            let team = self.units[i].info.team;
            let Some(base) = self.bases.iter().position(|b| {
                b.info.team == team && b.info.constructed && b.remaining(labor.kind) > 0
            }) else {
                self.units[i].info.labor = Some(Labor {
                    activity: LaborActivity::Idle,
                    ..labor
                });
                continue;
            };

            let unit = &mut self.units[i];
            unit.mined = unit
                .mined
                .saturating_add(self.config.mining_rate.saturating_mul(dt));
            let whole = unit.mined.to_num::<i32>();
            if whole <= 0 {
                continue;
            }
            unit.mined -= Fixed::from_num(whole);
            let taken = self.bases[base].take(labor.kind, whole);
            credit[slot(team)] = credit[slot(team)] + amount_of(labor.kind, taken);
        }

        for team in [Team::Player, Team::Enemy] {
            let amount = credit[slot(team)];
            if amount != Cost::ZERO {
                report.mined.push((team, amount));
            }
        }
    }

    fn pick_target(&self, index: usize) -> Option<Target> {
        let unit = &self.units[index];
        if unit.info.attack_damage <= 0 || matches!(unit.command, Command::Move(_)) {
            return None;
        }
        let enemy = unit.info.team.opponent();
        let origin = unit.info.position;

        let units_in_range = self.units.iter().enumerate().filter(|(_, u)| {
            u.info.is_live_on(enemy) && origin.within(u.info.position, unit.range)
        });
        if let Some((j, _)) = nearest_by(units_in_range, origin, |&(_, u)| u.info.position) {
            return Some(Target::Unit(j));
        }

        let reach = unit.range.saturating_add(Fixed::from_num(BASE_RADIUS));
        let bases_in_range = self
            .bases
            .iter()
            .enumerate()
            .filter(|(_, b)| b.info.team == enemy && origin.within(b.info.position, reach));
        nearest_by(bases_in_range, origin, |&(_, b)| b.info.position).map(|(j, _)| Target::Base(j))
    }

    fn resolve_combat(&mut self, dt: Fixed, report: &mut StepReport) {
        let mut hits = Vec::new();
        for i in 0..self.units.len() {
            if !self.units[i].info.alive {
                continue;
            }
            let reload = self.units[i].reload.saturating_sub(dt).max(Fixed::ZERO);
            self.units[i].reload = reload;
            if reload > Fixed::ZERO {
                continue;
            }
            if let Some(target) = self.pick_target(i) {
                let UnitInfo {
                    attack_damage,
                    attack_cooldown,
                    ..
                } = self.units[i].info;
                hits.push((target, attack_damage));
                self.units[i].reload = attack_cooldown;
            }
        }

        for (target, damage) in hits {
            match target {
                Target::Unit(j) => {
                    let victim = &mut self.units[j].info;
                    if !victim.alive {
                        continue;
                    }
                    victim.health -= damage;
                    if victim.health <= 0 {
                        victim.alive = false;
                        report.units_lost.push((victim.team, victim.unit_type));
                    }
                }
                Target::Base(j) => self.bases[j].health -= damage,
            }
        }

        self.units.retain(|u| u.info.alive);

        let mut index = 0;
        while index < self.bases.len() {
            if self.bases[index].health > 0 {
                index += 1;
                continue;
            }
            let base = self.bases.remove(index);
            debug!(team = ?base.info.team, base = base.info.id, "Base destroyed");
            if let Some(site) = base.site {
                self.sites[site].claimed_by = None;
            }
            report.bases_lost.push(base.info.team);
        }
    }
}

impl UnitRegistry for Arena {
    fn units(&self) -> Vec<UnitInfo> {
        self.units.iter().map(|u| u.info).collect()
    }

    fn bases(&self) -> Vec<BaseInfo> {
        self.bases.iter().map(|b| b.info).collect()
    }
}

impl ConstructionSites for Arena {
    fn construction_available(&self) -> bool {
        self.config.construction_enabled
    }

    fn outpost_cost(&self, race: Race) -> Option<Cost> {
        Some(match race {
            Race::Kingdom => self.config.kingdom_outpost,
            Race::Horde => self.config.horde_outpost,
        })
    }

    fn has_free_build_site(&self, _team: Team) -> bool {
        self.free_sites() > 0
    }

    fn try_build_outpost(&mut self, team: Team, race: Race, policy: ExpansionPolicy) -> bool {
        if race != self.race(team) {
            return false;
        }
        let anchor = match policy {
            ExpansionPolicy::Safe => self.home(team),
            ExpansionPolicy::Forward => self.home(team.opponent()),
        };
        let free = self
            .sites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.claimed_by.is_none());
        let Some((index, _)) = nearest_by(free, anchor, |&(_, s)| s.position) else {
            return false;
        };

        let site = &mut self.sites[index];
        site.claimed_by = Some(team);
        let (position, gold, lumber) = (site.position, site.gold, site.lumber);
        let id = self.add_base(team, position, false, gold, lumber, Some(index));
        debug!(team = ?team, base = id, site = index, "Outpost placed");
        true
    }
}

impl UpgradeLedger for Arena {
    fn is_unlocked(&self, upgrade: UpgradeId, team: Team) -> bool {
        matches!(self.research.get(&(team, upgrade)), Some(Research::Done))
    }

    fn is_researching(&self, upgrade: UpgradeId, team: Team) -> bool {
        matches!(
            self.research.get(&(team, upgrade)),
            Some(Research::InProgress(_))
        )
    }

    fn is_researchable(&self, upgrade: UpgradeId, team: Team) -> bool {
        self.upgrade_def(upgrade)
            .is_some_and(|def| def.requires.map_or(true, |req| self.is_unlocked(req, team)))
    }

    fn upgrade_cost(&self, upgrade: UpgradeId) -> Option<Cost> {
        self.upgrade_def(upgrade).map(|def| def.cost)
    }

    fn purchase(&mut self, upgrade: UpgradeId, team: Team) {
        let time = self.config.research_time;
        self.research
            .insert((team, upgrade), Research::InProgress(time));
    }
}

impl UnitSpawner for Arena {
    fn unit_cost(&self, unit_type: UnitType) -> Option<Cost> {
        Some(unit_stats(unit_type).cost)
    }

    fn try_purchase(
        &mut self,
        team: Team,
        unit_type: UnitType,
        ledger: &mut ResourceLedger,
    ) -> bool {
        if unit_type.race() != self.race(team) {
            return false;
        }
        let cost = unit_stats(unit_type).cost;
        if !ledger.can_afford(cost) {
            return false;
        }
        let Some(position) = self.spawn_point(team) else {
            return false;
        };
        ledger.spend_cost(cost);
        self.spawn(team, unit_type, position);
        true
    }
}

impl ResourceFields for Arena {
    fn remaining_at(&self, base: EntityId, kind: ResourceKind) -> i32 {
        self.bases
            .iter()
            .find(|b| b.info.id == base)
            .map_or(0, |b| b.remaining(kind))
    }
}

impl UnitOrders for Arena {
    fn attack_move(&mut self, unit: EntityId, target: Vec2Fixed) {
        if let Some(u) = self.unit_mut(unit) {
            if u.speed > Fixed::ZERO {
                u.command = Command::AttackMove(target);
            }
        }
    }

    fn move_to(&mut self, unit: EntityId, target: Vec2Fixed) {
        if let Some(u) = self.unit_mut(unit) {
            if u.speed > Fixed::ZERO {
                u.command = Command::Move(target);
            }
        }
    }

    fn assign_labor(&mut self, unit: EntityId, kind: ResourceKind) {
        if let Some(u) = self.unit_mut(unit) {
            if u.info.labor.is_some() {
                u.info.labor = Some(Labor {
                    kind,
                    activity: LaborActivity::Moving,
                });
                u.command = Command::Hold;
                u.mined = Fixed::ZERO;
            }
        }
    }

    fn garrison(&mut self, unit: EntityId) {
        let Some(info) = self.unit(unit).copied() else {
            return;
        };
        let towers = self
            .units
            .iter()
            .filter(|u| u.info.is_live_on(info.team) && u.info.unit_type.is_fortification())
            .map(|u| u.info.position);
        let bases = self
            .bases
            .iter()
            .filter(|b| b.info.team == info.team)
            .map(|b| b.info.position);
        if let Some(shelter) = nearest_by(towers.chain(bases), info.position, |p| *p) {
            self.move_to(unit, shelter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rts_ai::economy::LedgerConfig;

    fn arena() -> Arena {
        Arena::new(ArenaConfig::default(), Race::Kingdom, Race::Horde, 7)
    }

    fn second() -> Fixed {
        Fixed::from_num(1)
    }

    #[test]
    fn test_initial_layout() {
        let arena = arena();
        assert_eq!(arena.base_count(Team::Player), 1);
        assert_eq!(arena.base_count(Team::Enemy), 1);
        assert_eq!(arena.unit_count(Team::Player), 5);
        assert_eq!(arena.free_sites(), 6);
        assert!(arena
            .units()
            .iter()
            .filter(|u| u.team == Team::Enemy)
            .all(|u| u.unit_type == UnitType::Thrall));
    }

    #[test]
    fn test_same_seed_same_sites() {
        let a = arena();
        let b = arena();
        let c = Arena::new(ArenaConfig::default(), Race::Kingdom, Race::Horde, 8);
        assert_eq!(a.state_hash(), b.state_hash());
        let positions =
            |arena: &Arena| arena.sites.iter().map(|s| s.position).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));
        assert_ne!(positions(&a), positions(&c));
    }

    #[test]
    fn test_workers_mine_after_arriving() {
        let mut arena = arena();
        // First step walks the workers to the field.
        assert!(arena.step(second()).mined.is_empty());

        let report = arena.step(second());
        // 5 workers × 2 per second.
        assert_eq!(
            report.mined,
            vec![(Team::Player, Cost::new(10, 0)), (Team::Enemy, Cost::new(10, 0))]
        );
        let home = arena.bases()[0].id;
        assert_eq!(arena.remaining_at(home, ResourceKind::Gold), 5990);
    }

    #[test]
    fn test_exhausted_field_idles_workers() {
        let config = ArenaConfig {
            gold_per_base: 3,
            ..ArenaConfig::default()
        };
        let mut arena = Arena::new(config, Race::Kingdom, Race::Horde, 1);
        for _ in 0..4 {
            arena.step(second());
        }
        let idle = arena
            .units()
            .iter()
            .filter(|u| u.team == Team::Player)
            .filter(|u| u.labor.is_some_and(|l| l.activity == LaborActivity::Idle))
            .count();
        assert_eq!(idle, 5);
    }

    #[test]
    fn test_purchase_spends_and_spawns_at_base() {
        let mut arena = arena();
        let mut ledger = ResourceLedger::new(&LedgerConfig {
            starting_gold: 130,
            starting_lumber: 0,
            ..LedgerConfig::default()
        });
        assert!(arena.try_purchase(Team::Player, UnitType::Swordsman, &mut ledger));
        assert_eq!(ledger.gold(), 10);
        assert!(!arena.try_purchase(Team::Player, UnitType::Swordsman, &mut ledger));
        assert!(!arena.try_purchase(Team::Player, UnitType::Raider, &mut ledger));
        assert_eq!(arena.unit_count(Team::Player), 6);
    }

    #[test]
    fn test_outpost_builds_then_completes() {
        let mut arena = arena();
        assert!(arena.try_build_outpost(Team::Player, Race::Kingdom, ExpansionPolicy::Safe));
        assert!(!arena.try_build_outpost(Team::Player, Race::Horde, ExpansionPolicy::Safe));
        assert_eq!(arena.free_sites(), 5);
        assert_eq!(arena.base_count(Team::Player), 2);
        assert!(!arena.bases()[2].constructed);

        let mut completed = Vec::new();
        for _ in 0..30 {
            completed.extend(arena.step(second()).outposts_completed);
        }
        assert_eq!(completed, vec![Team::Player]);
        assert!(arena.bases()[2].constructed);
    }

    #[test]
    fn test_forward_policy_picks_site_nearest_enemy() {
        let mut arena = arena();
        let enemy_home = arena.home(Team::Enemy);
        let expected = arena
            .sites
            .iter()
            .map(|s| s.position)
            .min_by_key(|p| p.distance_squared(enemy_home).to_bits());
        assert!(arena.try_build_outpost(Team::Player, Race::Kingdom, ExpansionPolicy::Forward));
        assert_eq!(Some(arena.bases()[2].position), expected);
    }

    #[test]
    fn test_research_prerequisites() {
        let mut arena = arena();
        assert!(arena.is_researchable(UpgradeId(1), Team::Player));
        assert!(!arena.is_researchable(UpgradeId(2), Team::Player));
        assert!(!arena.is_researchable(UpgradeId(99), Team::Player));

        arena.purchase(UpgradeId(1), Team::Player);
        assert!(arena.is_researching(UpgradeId(1), Team::Player));
        for _ in 0..40 {
            arena.step(second());
        }
        assert!(arena.is_unlocked(UpgradeId(1), Team::Player));
        assert!(!arena.is_unlocked(UpgradeId(1), Team::Enemy));
        assert!(arena.is_researchable(UpgradeId(2), Team::Player));
    }

    #[test]
    fn test_move_is_axis_by_axis() {
        let p = approach(Vec2Fixed::ZERO, Vec2Fixed::from_ints(100, -10), Fixed::from_num(30));
        assert_eq!(p, Vec2Fixed::from_ints(30, -10));
    }

    #[test]
    fn test_units_fight_within_range() {
        let mut arena = arena();
        let spot = Vec2Fixed::from_ints(1200, 800);
        let knight = arena.spawn(Team::Player, UnitType::Knight, spot);
        arena.spawn(Team::Enemy, UnitType::Thrall, spot);

        let mut lost = Vec::new();
        for _ in 0..20 {
            lost.extend(arena.step(second()).units_lost);
        }
        assert_eq!(lost, vec![(Team::Enemy, UnitType::Thrall)]);
        assert!(arena.unit(knight).is_some());
    }

    #[test]
    fn test_attack_move_destroys_base() {
        let mut arena = arena();
        let target = arena.home(Team::Enemy);
        let start = target - Vec2Fixed::from_ints(100, 0);
        for _ in 0..6 {
            let id = arena.spawn(Team::Player, UnitType::Knight, start);
            arena.attack_move(id, target);
        }

        let mut lost = Vec::new();
        for _ in 0..200 {
            lost.extend(arena.step(second()).bases_lost);
            if arena.is_eliminated(Team::Enemy) {
                break;
            }
        }
        assert_eq!(lost, vec![Team::Enemy]);
        assert!(arena.is_eliminated(Team::Enemy));
    }

    #[test]
    fn test_garrison_moves_to_nearest_shelter() {
        let mut arena = arena();
        let home = arena.home(Team::Player);
        let tower_spot = home + Vec2Fixed::from_ints(300, 0);
        arena.spawn(Team::Player, UnitType::GuardTower, tower_spot);
        let soldier_spot = home + Vec2Fixed::from_ints(280, 0);
        let soldier = arena.spawn(Team::Player, UnitType::Swordsman, soldier_spot);
        arena.garrison(soldier);
        arena.step(second());
        assert_eq!(arena.unit(soldier).map(|u| u.position), Some(tower_spot));
    }

    #[test]
    fn test_assign_labor_switches_kind() {
        let mut arena = arena();
        let worker = arena.units()[0].id;
        arena.assign_labor(worker, ResourceKind::Lumber);
        let labor = arena.unit(worker).and_then(|u| u.labor);
        assert_eq!(
            labor,
            Some(Labor {
                kind: ResourceKind::Lumber,
                activity: LaborActivity::Moving,
            })
        );
    }
}
