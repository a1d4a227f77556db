//! Unit and upgrade identifiers.
//!
//! Costs and combat stats are owned by the game data layer and reach the
//! engine through the [`crate::world`] traits; this module only names
//! things and classifies them.

use serde::{Deserialize, Serialize};

use crate::factions::Race;

/// What a unit type is for, from the strategist's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    /// Gathers resources; never ordered to attack.
    Worker,
    /// Mobile army unit.
    Combat,
    /// Immobile defensive structure. Contributes no strategic power.
    Fortification,
}

/// Every trainable unit type, both races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitType {
    // Kingdom
    /// Kingdom primary worker.
    Peasant,
    /// Kingdom secondary worker.
    Engineer,
    /// Kingdom melee infantry.
    Swordsman,
    /// Kingdom ranged infantry.
    Archer,
    /// Kingdom heavy cavalry.
    Knight,
    /// Kingdom siege engine.
    Ballista,
    /// Kingdom fortification.
    GuardTower,

    // Horde
    /// Horde primary worker.
    Thrall,
    /// Horde secondary worker.
    Digger,
    /// Horde fast melee.
    Raider,
    /// Horde ranged infantry.
    Spearman,
    /// Horde caster.
    Shaman,
    /// Horde heavy melee.
    Ogre,
    /// Horde fortification.
    Watchpost,
}

impl UnitType {
    /// All unit types, in declaration order.
    pub const ALL: [Self; 14] = [
        Self::Peasant,
        Self::Engineer,
        Self::Swordsman,
        Self::Archer,
        Self::Knight,
        Self::Ballista,
        Self::GuardTower,
        Self::Thrall,
        Self::Digger,
        Self::Raider,
        Self::Spearman,
        Self::Shaman,
        Self::Ogre,
        Self::Watchpost,
    ];

    /// Race that trains this unit.
    #[must_use]
    pub const fn race(self) -> Race {
        match self {
            Self::Peasant
            | Self::Engineer
            | Self::Swordsman
            | Self::Archer
            | Self::Knight
            | Self::Ballista
            | Self::GuardTower => Race::Kingdom,
            Self::Thrall
            | Self::Digger
            | Self::Raider
            | Self::Spearman
            | Self::Shaman
            | Self::Ogre
            | Self::Watchpost => Race::Horde,
        }
    }

    /// Strategic role.
    #[must_use]
    pub const fn role(self) -> UnitRole {
        match self {
            Self::Peasant | Self::Engineer | Self::Thrall | Self::Digger => UnitRole::Worker,
            Self::GuardTower | Self::Watchpost => UnitRole::Fortification,
            _ => UnitRole::Combat,
        }
    }

    /// Whether this unit gathers resources.
    #[must_use]
    pub const fn is_worker(self) -> bool {
        matches!(self.role(), UnitRole::Worker)
    }

    /// Whether this unit is an immobile fortification.
    #[must_use]
    pub const fn is_fortification(self) -> bool {
        matches!(self.role(), UnitRole::Fortification)
    }

    /// Whether this unit can be ordered to attack-move.
    #[must_use]
    pub const fn is_mobile_army(self) -> bool {
        matches!(self.role(), UnitRole::Combat)
    }
}

/// Identifier of a researchable upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UpgradeId(pub u32);

impl UpgradeId {
    /// Create a new upgrade ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}
