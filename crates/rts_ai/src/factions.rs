//! Team, race and control-mode identifiers.

use serde::{Deserialize, Serialize};

use crate::units::UnitType;

/// Team tag used to filter the shared unit registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// The human player's side.
    Player,
    /// The computer opponent's side.
    Enemy,
}

impl Team {
    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }
}

/// Race affinity of a faction and of the strategy profiles it may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Race {
    /// Human kingdom: peasants, swordsmen, archers, knights.
    Kingdom,
    /// Orcish horde: thralls, raiders, spearmen, ogres.
    Horde,
}

impl Race {
    /// Primary and secondary worker types for this race.
    #[must_use]
    pub const fn workers(self) -> (UnitType, UnitType) {
        match self {
            Self::Kingdom => (UnitType::Peasant, UnitType::Engineer),
            Self::Horde => (UnitType::Thrall, UnitType::Digger),
        }
    }

    /// The worker type the scheduler buys when replenishing labor.
    #[must_use]
    pub const fn primary_worker(self) -> UnitType {
        self.workers().0
    }

    /// Display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Kingdom => "Kingdom",
            Self::Horde => "Horde",
        }
    }
}

/// Who the engine instance plays for.
///
/// Both modes run the same algorithms; they differ only in how Siege is
/// entered (see [`crate::tactics::TacticalController`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// Computer opponent.
    #[default]
    Bot,
    /// Auto-pilot for the human side; Siege is toggled from outside.
    AutoPilot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_is_involution() {
        assert_eq!(Team::Player.opponent(), Team::Enemy);
        assert_eq!(Team::Player.opponent().opponent(), Team::Player);
    }

    #[test]
    fn test_workers_belong_to_race() {
        for race in [Race::Kingdom, Race::Horde] {
            let (primary, secondary) = race.workers();
            assert!(primary.is_worker());
            assert!(secondary.is_worker());
            assert_eq!(primary.race(), race);
            assert_eq!(secondary.race(), race);
        }
    }
}
