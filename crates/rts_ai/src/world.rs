//! Collaborator contracts the engine calls into.
//!
//! The engine never owns units, bases or build sites. It sees the game
//! through these traits, the same way for the bot and the auto-pilot, and
//! only ever acts through [`UnitOrders`], [`UnitSpawner`],
//! [`ConstructionSites`] and [`UpgradeLedger`]. All calls are synchronous.

use serde::{Deserialize, Serialize};

use crate::economy::{Cost, ResourceKind, ResourceLedger};
use crate::error::{AiError, Result};
use crate::factions::{Race, Team};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::strategy::ExpansionPolicy;
use crate::units::{UnitType, UpgradeId};

/// Unique identifier for units and bases.
pub type EntityId = u64;

/// What a worker is doing with its assigned resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaborActivity {
    /// Extracting at the resource.
    Mining,
    /// Walking to the resource.
    Moving,
    /// Carrying a load back to a base.
    Returning,
    /// Assigned but waiting.
    Idle,
    /// Busy constructing; not available for reassignment.
    Building,
}

impl LaborActivity {
    /// Whether a worker in this activity may be pulled off its resource.
    #[must_use]
    pub const fn is_reassignable(self) -> bool {
        !matches!(self, Self::Building)
    }

    /// Whether the worker is actively working its resource.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Mining | Self::Moving | Self::Returning)
    }
}

/// A worker's current assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Labor {
    /// Resource kind the worker is assigned to.
    pub kind: ResourceKind,
    /// What the worker is doing right now.
    pub activity: LaborActivity,
}

/// Read-only view of a unit in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Entity ID.
    pub id: EntityId,
    /// Owning team.
    pub team: Team,
    /// Unit type.
    pub unit_type: UnitType,
    /// Current position.
    pub position: Vec2Fixed,
    /// Current health.
    pub health: i32,
    /// Damage per attack.
    pub attack_damage: i32,
    /// Seconds between attacks; zero for units that never fire.
    #[serde(with = "fixed_serde")]
    pub attack_cooldown: Fixed,
    /// Whether the unit is alive.
    pub alive: bool,
    /// Worker assignment, if this unit is a worker.
    pub labor: Option<Labor>,
}

impl UnitInfo {
    /// Whether this is a living unit of `team`.
    #[must_use]
    pub fn is_live_on(&self, team: Team) -> bool {
        self.alive && self.team == team
    }
}

/// Read-only view of a base (town hall / outpost).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseInfo {
    /// Entity ID.
    pub id: EntityId,
    /// Owning team.
    pub team: Team,
    /// Position.
    pub position: Vec2Fixed,
    /// Whether construction has finished.
    pub constructed: bool,
}

/// Enumerates every live combat participant and base.
pub trait UnitRegistry {
    /// All units, both teams. Dead units may be included with `alive == false`.
    fn units(&self) -> Vec<UnitInfo>;

    /// All bases, both teams, including ones still under construction.
    fn bases(&self) -> Vec<BaseInfo>;

    /// Live count of one unit type on a team.
    fn live_count(&self, team: Team, unit_type: UnitType) -> u32 {
        self.units()
            .iter()
            .filter(|u| u.is_live_on(team) && u.unit_type == unit_type)
            .count() as u32
    }
}

/// Outpost construction and build-site arbitration.
pub trait ConstructionSites {
    /// Whether the site-building subsystem is running at all.
    fn construction_available(&self) -> bool {
        true
    }

    /// Outpost price for a race, if the race has outpost data.
    fn outpost_cost(&self, race: Race) -> Option<Cost>;

    /// Outpost price, or why an outpost cannot be priced at all.
    fn price_outpost(&self, race: Race) -> Result<Cost> {
        if !self.construction_available() {
            return Err(AiError::ConstructionUnavailable);
        }
        self.outpost_cost(race).ok_or(AiError::OutpostDataMissing(race))
    }

    /// Whether at least one free build site exists for `team`.
    fn has_free_build_site(&self, team: Team) -> bool;

    /// Try to start an outpost on a site chosen by `policy`.
    ///
    /// Returns `false` when no site could be claimed.
    fn try_build_outpost(&mut self, team: Team, race: Race, policy: ExpansionPolicy) -> bool;
}

/// Research state of upgrades, per team.
pub trait UpgradeLedger {
    /// Already researched.
    fn is_unlocked(&self, upgrade: UpgradeId, team: Team) -> bool;

    /// Research in progress.
    fn is_researching(&self, upgrade: UpgradeId, team: Team) -> bool;

    /// Prerequisites satisfied.
    fn is_researchable(&self, upgrade: UpgradeId, team: Team) -> bool;

    /// Price of an upgrade, if known.
    fn upgrade_cost(&self, upgrade: UpgradeId) -> Option<Cost>;

    /// Start research. The caller has already paid.
    fn purchase(&mut self, upgrade: UpgradeId, team: Team);
}

/// Unit purchase and instantiation.
pub trait UnitSpawner {
    /// Price of a unit type, if the type is buildable.
    fn unit_cost(&self, unit_type: UnitType) -> Option<Cost>;

    /// Re-validate affordability, spend from `ledger` and spawn the unit.
    fn try_purchase(&mut self, team: Team, unit_type: UnitType, ledger: &mut ResourceLedger)
        -> bool;
}

/// In-ground resource reachable from bases.
pub trait ResourceFields {
    /// Remaining resource of `kind` reachable from a base.
    fn remaining_at(&self, base: EntityId, kind: ResourceKind) -> i32;
}

/// Command sink for unit orders.
pub trait UnitOrders {
    /// Attack-move toward a position.
    fn attack_move(&mut self, unit: EntityId, target: Vec2Fixed);

    /// Plain move (no engaging on the way).
    fn move_to(&mut self, unit: EntityId, target: Vec2Fixed);

    /// Send a worker to gather `kind`.
    fn assign_labor(&mut self, unit: EntityId, kind: ResourceKind);

    /// Garrison a mobile unit inside the nearest fortification.
    fn garrison(&mut self, unit: EntityId);
}

/// Everything the engine needs from the game, bundled.
pub trait GameWorld:
    UnitRegistry + ConstructionSites + UpgradeLedger + UnitSpawner + ResourceFields + UnitOrders
{
}

impl<T> GameWorld for T where
    T: UnitRegistry + ConstructionSites + UpgradeLedger + UnitSpawner + ResourceFields + UnitOrders
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labor_activity_classes() {
        assert!(LaborActivity::Idle.is_reassignable());
        assert!(!LaborActivity::Idle.is_active());
        assert!(LaborActivity::Returning.is_active());
        assert!(!LaborActivity::Building.is_reassignable());
    }
}
