//! Strategy profiles: opening scripts, macro compositions, attack waves
//! and fallback chains.
//!
//! Profiles are immutable data. The scheduler and director keep their own
//! mutable working copies; nothing here changes during a match.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use fixed::traits::ToFixed;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AiError, Result};
use crate::factions::Race;
use crate::math::{fixed_decimal, Fixed};
use crate::units::{UnitType, UpgradeId};

fn one() -> Fixed {
    Fixed::ONE
}

const fn default_count() -> u32 {
    1
}

const fn default_true() -> bool {
    true
}

/// One production step.
///
/// Weights are only consulted by the macro phase; any weight `<= 0` is
/// treated as 1 everywhere it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStep {
    /// Train `count` units of a type.
    Unit {
        /// Unit type to train.
        unit_type: UnitType,
        /// How many; the opening expands this into singletons.
        #[serde(default = "default_count")]
        count: u32,
        /// Macro-phase weight.
        #[serde(default = "one", with = "fixed_decimal")]
        weight: Fixed,
    },
    /// Research an upgrade.
    Upgrade {
        /// Upgrade to research.
        upgrade: UpgradeId,
        /// Macro-phase weight.
        #[serde(default = "one", with = "fixed_decimal")]
        weight: Fixed,
    },
    /// Build an outpost on a new site.
    Expansion {
        /// Macro-phase weight.
        #[serde(default = "one", with = "fixed_decimal")]
        weight: Fixed,
    },
}

impl BuildStep {
    /// A single-unit step with weight 1.
    #[must_use]
    pub fn unit(unit_type: UnitType) -> Self {
        Self::Unit {
            unit_type,
            count: 1,
            weight: Fixed::ONE,
        }
    }

    /// A unit step with explicit count and weight.
    #[must_use]
    pub fn units(unit_type: UnitType, count: u32, weight: impl ToFixed) -> Self {
        Self::Unit {
            unit_type,
            count,
            weight: Fixed::from_num(weight),
        }
    }

    /// An upgrade step.
    #[must_use]
    pub fn upgrade(upgrade: UpgradeId, weight: impl ToFixed) -> Self {
        Self::Upgrade {
            upgrade,
            weight: Fixed::from_num(weight),
        }
    }

    /// An expansion step.
    #[must_use]
    pub fn expansion(weight: impl ToFixed) -> Self {
        Self::Expansion {
            weight: Fixed::from_num(weight),
        }
    }

    /// Stored weight, as authored.
    #[must_use]
    pub const fn weight(&self) -> Fixed {
        match self {
            Self::Unit { weight, .. } | Self::Upgrade { weight, .. } | Self::Expansion { weight } => {
                *weight
            }
        }
    }

    /// Weight as every consumer reads it: non-positive weights count as 1.
    #[must_use]
    pub fn effective_weight(&self) -> Fixed {
        effective_weight(self.weight())
    }

    /// Replace the stored weight.
    pub fn set_weight(&mut self, new_weight: Fixed) {
        match self {
            Self::Unit { weight, .. } | Self::Upgrade { weight, .. } | Self::Expansion { weight } => {
                *weight = new_weight;
            }
        }
    }

    /// Unit type, for unit steps.
    #[must_use]
    pub const fn unit_type(&self) -> Option<UnitType> {
        match self {
            Self::Unit { unit_type, .. } => Some(*unit_type),
            _ => None,
        }
    }

    /// Expand a multi-count unit step into that many single-count copies.
    ///
    /// Non-unit steps and single units come back unchanged. A zero count
    /// yields nothing.
    #[must_use]
    pub fn expand(&self) -> Vec<Self> {
        match self {
            Self::Unit {
                unit_type,
                count,
                weight,
            } => (0..*count)
                .map(|_| Self::Unit {
                    unit_type: *unit_type,
                    count: 1,
                    weight: *weight,
                })
                .collect(),
            other => vec![other.clone()],
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Unit { unit_type, .. } => format!("{unit_type:?}"),
            Self::Upgrade { upgrade, .. } => format!("Upgrade#{}", upgrade.0),
            Self::Expansion { .. } => "Expansion".to_string(),
        }
    }
}

/// Apply the default-weight rule.
#[must_use]
pub fn effective_weight(weight: Fixed) -> Fixed {
    if weight <= Fixed::ZERO {
        Fixed::ONE
    } else {
        weight
    }
}

/// A timed attack trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackWave {
    /// Game time (seconds since activation) at which the wave becomes eligible.
    #[serde(with = "fixed_decimal")]
    pub trigger_time: Fixed,
    /// Required own-power / enemy-power ratio. Zero disables the check.
    #[serde(default, with = "fixed_decimal")]
    pub required_power_ratio: Fixed,
    /// Minimum live count per unit type.
    #[serde(default)]
    pub required_units: BTreeMap<UnitType, u32>,
    /// Own/enemy power ratio below which the attack is called off.
    ///
    /// Only read under [`RetreatMode::PerWave`].
    #[serde(default, with = "fixed_decimal")]
    pub retreat_threshold: Fixed,
}

impl AttackWave {
    /// A wave with no requirements.
    #[must_use]
    pub fn at(trigger_time: impl ToFixed) -> Self {
        Self {
            trigger_time: Fixed::from_num(trigger_time),
            required_power_ratio: Fixed::ZERO,
            required_units: BTreeMap::new(),
            retreat_threshold: Fixed::ZERO,
        }
    }

    /// Require at least `count` live units of a type.
    #[must_use]
    pub fn requiring(mut self, unit_type: UnitType, count: u32) -> Self {
        self.required_units.insert(unit_type, count);
        self
    }

    /// Require a power ratio.
    #[must_use]
    pub fn with_power_ratio(mut self, ratio: impl ToFixed) -> Self {
        self.required_power_ratio = Fixed::from_num(ratio);
        self
    }

    /// Set the per-wave retreat ratio.
    #[must_use]
    pub fn with_retreat_threshold(mut self, ratio: impl ToFixed) -> Self {
        self.retreat_threshold = Fixed::from_num(ratio);
        self
    }
}

/// Expansion tuning for the macro phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionTuning {
    /// Expansion weight when resources are plentiful.
    #[serde(with = "fixed_decimal")]
    pub base_weight: Fixed,
    /// Extra weight per unit of resource shortfall.
    #[serde(with = "fixed_decimal")]
    pub scarcity_sensitivity: Fixed,
}

impl Default for ExpansionTuning {
    fn default() -> Self {
        Self {
            base_weight: Fixed::ONE,
            scarcity_sensitivity: Fixed::from_num(0.01),
        }
    }
}

/// Where new outposts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExpansionPolicy {
    /// Site closest to the enemy.
    Forward,
    /// Site closest to home.
    #[default]
    Safe,
}

/// How an attack decides to fall back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RetreatMode {
    /// Retreat when own power drops below the engine's fixed floor.
    #[default]
    FixedFloor,
    /// Retreat when own/enemy power drops below the launched wave's threshold.
    PerWave,
}

/// Complete configuration for one strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// Unique name; fallbacks refer to profiles by name.
    pub name: String,
    /// Race this profile is written for.
    pub race: Race,
    /// Whether random activation may pick this profile.
    #[serde(default = "default_true")]
    pub in_pool: bool,
    /// Strictly ordered opening script; weights ignored.
    #[serde(default)]
    pub opening: Vec<BuildStep>,
    /// Weighted macro composition.
    pub macro_composition: Vec<BuildStep>,
    /// Expansion weighting.
    #[serde(default)]
    pub expansion: ExpansionTuning,
    /// Attack waves, ordered by trigger time.
    #[serde(default)]
    pub waves: Vec<AttackWave>,
    /// Profile to switch to when this one fails.
    #[serde(default)]
    pub fallback: Option<String>,
    /// Seconds after activation at which to switch. Zero disables.
    #[serde(default, with = "fixed_decimal")]
    pub transition_time_limit: Fixed,
    /// Switch when an attack is repelled.
    #[serde(default)]
    pub switch_on_repelled: bool,
    /// Target live worker count.
    pub ideal_workers: u32,
    /// Outpost site selection.
    #[serde(default)]
    pub expansion_policy: ExpansionPolicy,
    /// Attack fall-back rule.
    #[serde(default)]
    pub retreat_mode: RetreatMode,
    /// Whether the bot enters Siege on its own when a base is threatened.
    #[serde(default)]
    pub siege_when_threatened: bool,
}

impl StrategyProfile {
    /// Check internal consistency (not cross-profile references).
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| AiError::InvalidProfile {
            profile: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        if self.macro_composition.is_empty() {
            return Err(invalid("macro composition is empty".to_string()));
        }
        if let Some(step) = self
            .opening
            .iter()
            .chain(&self.macro_composition)
            .find_map(|s| s.unit_type().filter(|u| u.race() != self.race))
        {
            return Err(invalid(format!("{step:?} is not a {:?} unit", self.race)));
        }
        if self
            .waves
            .windows(2)
            .any(|w| w[1].trigger_time < w[0].trigger_time)
        {
            return Err(invalid("waves are not ordered by trigger time".to_string()));
        }
        if self.waves.iter().any(|w| {
            w.required_power_ratio < Fixed::ZERO || w.retreat_threshold < Fixed::ZERO
        }) {
            return Err(invalid("negative wave ratio".to_string()));
        }
        if self.transition_time_limit < Fixed::ZERO {
            return Err(invalid("negative transition time limit".to_string()));
        }
        if self.fallback.as_deref() == Some(self.name.as_str()) {
            return Err(invalid("profile falls back to itself".to_string()));
        }
        Ok(())
    }

    /// Whether any failure trigger is configured.
    #[must_use]
    pub fn has_failure_trigger(&self) -> bool {
        self.transition_time_limit > Fixed::ZERO || self.switch_on_repelled
    }
}

/// The set of profiles an engine may activate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyLibrary {
    profiles: Vec<StrategyProfile>,
}

impl StrategyLibrary {
    /// Build a library, validating every profile and every fallback link.
    pub fn new(profiles: Vec<StrategyProfile>) -> Result<Self> {
        let mut names = HashSet::new();
        for profile in &profiles {
            profile.validate()?;
            if !names.insert(profile.name.as_str()) {
                return Err(AiError::InvalidProfile {
                    profile: profile.name.clone(),
                    reason: "duplicate profile name".to_string(),
                });
            }
        }

        for profile in &profiles {
            let Some(fallback) = profile.fallback.as_deref() else {
                continue;
            };
            let Some(target) = profiles.iter().find(|p| p.name == fallback) else {
                return Err(AiError::InvalidProfile {
                    profile: profile.name.clone(),
                    reason: format!("fallback '{fallback}' does not exist"),
                });
            };
            if target.race != profile.race {
                return Err(AiError::InvalidProfile {
                    profile: profile.name.clone(),
                    reason: format!("fallback '{fallback}' is for {:?}", target.race),
                });
            }
        }

        Ok(Self { profiles })
    }

    /// Parse a RON list of profiles.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let profiles: Vec<StrategyProfile> = ron::from_str(ron).map_err(|source| AiError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        Self::new(profiles)
    }

    /// Load every `.ron` file in a directory, in file-name order.
    ///
    /// Each file holds a list of profiles.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let io_err = |source| AiError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut profiles = Vec::new();
        for path in paths {
            let contents = std::fs::read_to_string(&path).map_err(|source| AiError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let mut batch: Vec<StrategyProfile> =
                ron::from_str(&contents).map_err(|source| AiError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
            tracing::debug!("Loaded {} profiles from {}", batch.len(), path.display());
            profiles.append(&mut batch);
        }

        Self::new(profiles)
    }

    /// The built-in profiles for both races.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                builtin::kingdom_rush(),
                builtin::kingdom_economic(),
                builtin::kingdom_bastion(),
                builtin::horde_raid(),
                builtin::horde_warband(),
                builtin::horde_stronghold(),
            ],
        }
    }

    /// Look a profile up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StrategyProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// All profiles.
    #[must_use]
    pub fn profiles(&self) -> &[StrategyProfile] {
        &self.profiles
    }

    /// Number of profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles random activation may choose for a race.
    pub fn pool(&self, race: Race) -> impl Iterator<Item = &StrategyProfile> {
        self.profiles
            .iter()
            .filter(move |p| p.race == race && p.in_pool)
    }

    /// Pick a profile for a race uniformly at random from its pool.
    pub fn pick<R: Rng + ?Sized>(&self, race: Race, rng: &mut R) -> Result<&StrategyProfile> {
        let pool: Vec<&StrategyProfile> = self.pool(race).collect();
        if pool.is_empty() {
            return Err(AiError::NoStrategyForRace(race));
        }
        Ok(pool[rng.gen_range(0..pool.len())])
    }

    /// Resolve the fallback of a profile.
    #[must_use]
    pub fn fallback_of(&self, profile: &StrategyProfile) -> Option<&StrategyProfile> {
        profile.fallback.as_deref().and_then(|name| self.get(name))
    }
}

/// Built-in strategy profiles.
pub mod builtin {
    use super::*;

    const SHIELD_WALL: UpgradeId = UpgradeId(1);
    const STEEL_BOWS: UpgradeId = UpgradeId(2);
    const WAR_DRUMS: UpgradeId = UpgradeId(11);
    const TEMPERED_AXES: UpgradeId = UpgradeId(12);

    /// Early Kingdom infantry push; turtles up if it stalls.
    #[must_use]
    pub fn kingdom_rush() -> StrategyProfile {
        StrategyProfile {
            name: "Kingdom Rush".to_string(),
            race: Race::Kingdom,
            in_pool: true,
            opening: vec![
                BuildStep::units(UnitType::Peasant, 2, 1),
                BuildStep::units(UnitType::Swordsman, 3, 1),
                BuildStep::unit(UnitType::Archer),
            ],
            macro_composition: vec![
                BuildStep::units(UnitType::Swordsman, 1, 5),
                BuildStep::units(UnitType::Archer, 1, 3),
                BuildStep::upgrade(SHIELD_WALL, 1),
            ],
            expansion: ExpansionTuning {
                base_weight: Fixed::ONE,
                scarcity_sensitivity: Fixed::from_num(0.005),
            },
            waves: vec![
                AttackWave::at(150).requiring(UnitType::Swordsman, 5),
                AttackWave::at(300)
                    .requiring(UnitType::Swordsman, 6)
                    .requiring(UnitType::Archer, 4)
                    .with_power_ratio(1)
                    .with_retreat_threshold(0.5),
            ],
            fallback: Some("Kingdom Bastion".to_string()),
            transition_time_limit: Fixed::from_num(600),
            switch_on_repelled: true,
            ideal_workers: 8,
            expansion_policy: ExpansionPolicy::Forward,
            retreat_mode: RetreatMode::FixedFloor,
            siege_when_threatened: false,
        }
    }

    /// Kingdom economy first, knights later.
    #[must_use]
    pub fn kingdom_economic() -> StrategyProfile {
        StrategyProfile {
            name: "Kingdom Economic".to_string(),
            race: Race::Kingdom,
            in_pool: true,
            opening: vec![
                BuildStep::units(UnitType::Peasant, 4, 1),
                BuildStep::expansion(1),
                BuildStep::unit(UnitType::Engineer),
                BuildStep::units(UnitType::Swordsman, 2, 1),
            ],
            macro_composition: vec![
                BuildStep::units(UnitType::Knight, 1, 4),
                BuildStep::units(UnitType::Archer, 1, 3),
                BuildStep::units(UnitType::Ballista, 1, 1),
                BuildStep::upgrade(STEEL_BOWS, 2),
            ],
            expansion: ExpansionTuning {
                base_weight: Fixed::from_num(2),
                scarcity_sensitivity: Fixed::from_num(0.01),
            },
            waves: vec![
                AttackWave::at(420)
                    .requiring(UnitType::Knight, 4)
                    .requiring(UnitType::Archer, 4)
                    .with_power_ratio(1.2)
                    .with_retreat_threshold(0.6),
                AttackWave::at(720)
                    .requiring(UnitType::Knight, 6)
                    .requiring(UnitType::Ballista, 2)
                    .with_power_ratio(1),
            ],
            fallback: Some("Kingdom Bastion".to_string()),
            transition_time_limit: Fixed::ZERO,
            switch_on_repelled: true,
            ideal_workers: 14,
            expansion_policy: ExpansionPolicy::Safe,
            retreat_mode: RetreatMode::PerWave,
            siege_when_threatened: false,
        }
    }

    /// Kingdom defensive fallback.
    #[must_use]
    pub fn kingdom_bastion() -> StrategyProfile {
        StrategyProfile {
            name: "Kingdom Bastion".to_string(),
            race: Race::Kingdom,
            in_pool: false,
            opening: vec![
                BuildStep::unit(UnitType::GuardTower),
                BuildStep::units(UnitType::Archer, 2, 1),
            ],
            macro_composition: vec![
                BuildStep::units(UnitType::Archer, 1, 4),
                BuildStep::units(UnitType::Swordsman, 1, 3),
                BuildStep::units(UnitType::GuardTower, 1, 1),
                BuildStep::units(UnitType::Knight, 1, 2),
            ],
            expansion: ExpansionTuning::default(),
            waves: vec![AttackWave::at(900)
                .requiring(UnitType::Knight, 4)
                .requiring(UnitType::Archer, 8)
                .with_power_ratio(1.5)],
            fallback: None,
            transition_time_limit: Fixed::ZERO,
            switch_on_repelled: false,
            ideal_workers: 10,
            expansion_policy: ExpansionPolicy::Safe,
            retreat_mode: RetreatMode::FixedFloor,
            siege_when_threatened: true,
        }
    }

    /// Fast Horde raiders; regroups into a warband if repelled.
    #[must_use]
    pub fn horde_raid() -> StrategyProfile {
        StrategyProfile {
            name: "Horde Raid".to_string(),
            race: Race::Horde,
            in_pool: true,
            opening: vec![
                BuildStep::units(UnitType::Thrall, 2, 1),
                BuildStep::units(UnitType::Raider, 4, 1),
            ],
            macro_composition: vec![
                BuildStep::units(UnitType::Raider, 1, 6),
                BuildStep::units(UnitType::Spearman, 1, 2),
                BuildStep::upgrade(WAR_DRUMS, 1),
            ],
            expansion: ExpansionTuning {
                base_weight: Fixed::from_num(0.5),
                scarcity_sensitivity: Fixed::from_num(0.004),
            },
            waves: vec![
                AttackWave::at(120).requiring(UnitType::Raider, 6),
                AttackWave::at(240)
                    .requiring(UnitType::Raider, 8)
                    .requiring(UnitType::Spearman, 2)
                    .with_power_ratio(0.8),
            ],
            fallback: Some("Horde Warband".to_string()),
            transition_time_limit: Fixed::from_num(480),
            switch_on_repelled: true,
            ideal_workers: 7,
            expansion_policy: ExpansionPolicy::Forward,
            retreat_mode: RetreatMode::FixedFloor,
            siege_when_threatened: false,
        }
    }

    /// Horde mid-game army with ogres and shamans.
    #[must_use]
    pub fn horde_warband() -> StrategyProfile {
        StrategyProfile {
            name: "Horde Warband".to_string(),
            race: Race::Horde,
            in_pool: true,
            opening: vec![
                BuildStep::units(UnitType::Thrall, 3, 1),
                BuildStep::unit(UnitType::Digger),
                BuildStep::units(UnitType::Spearman, 2, 1),
                BuildStep::upgrade(TEMPERED_AXES, 1),
            ],
            macro_composition: vec![
                BuildStep::units(UnitType::Ogre, 1, 3),
                BuildStep::units(UnitType::Spearman, 1, 4),
                BuildStep::units(UnitType::Shaman, 1, 2),
                BuildStep::expansion(1),
            ],
            expansion: ExpansionTuning::default(),
            waves: vec![
                AttackWave::at(360)
                    .requiring(UnitType::Ogre, 3)
                    .requiring(UnitType::Spearman, 5)
                    .with_power_ratio(1)
                    .with_retreat_threshold(0.5),
                AttackWave::at(600)
                    .requiring(UnitType::Ogre, 5)
                    .requiring(UnitType::Shaman, 3)
                    .with_power_ratio(1.1),
            ],
            fallback: Some("Horde Stronghold".to_string()),
            transition_time_limit: Fixed::ZERO,
            switch_on_repelled: true,
            ideal_workers: 12,
            expansion_policy: ExpansionPolicy::Safe,
            retreat_mode: RetreatMode::PerWave,
            siege_when_threatened: false,
        }
    }

    /// Horde defensive fallback.
    #[must_use]
    pub fn horde_stronghold() -> StrategyProfile {
        StrategyProfile {
            name: "Horde Stronghold".to_string(),
            race: Race::Horde,
            in_pool: false,
            opening: vec![
                BuildStep::unit(UnitType::Watchpost),
                BuildStep::units(UnitType::Spearman, 2, 1),
            ],
            macro_composition: vec![
                BuildStep::units(UnitType::Spearman, 1, 4),
                BuildStep::units(UnitType::Ogre, 1, 2),
                BuildStep::units(UnitType::Watchpost, 1, 1),
            ],
            expansion: ExpansionTuning::default(),
            waves: vec![AttackWave::at(900)
                .requiring(UnitType::Ogre, 6)
                .with_power_ratio(1.5)],
            fallback: None,
            transition_time_limit: Fixed::ZERO,
            switch_on_repelled: false,
            ideal_workers: 10,
            expansion_policy: ExpansionPolicy::Safe,
            retreat_mode: RetreatMode::FixedFloor,
            siege_when_threatened: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_builtin_library_is_valid() {
        let builtin = StrategyLibrary::builtin();
        let validated = StrategyLibrary::new(builtin.profiles().to_vec());
        assert!(validated.is_ok(), "{:?}", validated.err());
    }

    #[test]
    fn test_effective_weight_rule() {
        assert_eq!(effective_weight(Fixed::ZERO), Fixed::ONE);
        assert_eq!(effective_weight(Fixed::from_num(-3)), Fixed::ONE);
        assert_eq!(effective_weight(Fixed::from_num(0.5)), Fixed::from_num(0.5));
    }

    #[test]
    fn test_expand_multi_count_step() {
        let step = BuildStep::units(UnitType::Swordsman, 3, 7);
        let expanded = step.expand();
        assert_eq!(expanded.len(), 3);
        assert!(expanded.iter().all(|s| *s == BuildStep::units(UnitType::Swordsman, 1, 7)));

        assert!(BuildStep::units(UnitType::Archer, 0, 1).expand().is_empty());
        assert_eq!(BuildStep::expansion(2).expand(), vec![BuildStep::expansion(2)]);
    }

    #[test]
    fn test_pick_respects_race_and_pool() {
        let library = StrategyLibrary::builtin();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let profile = library.pick(Race::Horde, &mut rng).unwrap();
            assert_eq!(profile.race, Race::Horde);
            assert!(profile.in_pool);
        }
    }

    #[test]
    fn test_pick_empty_pool_is_configuration_missing() {
        let library = StrategyLibrary::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = library.pick(Race::Kingdom, &mut rng).unwrap_err();
        assert!(err.is_configuration_missing());
    }

    #[test]
    fn test_missing_fallback_rejected() {
        let mut profile = builtin::kingdom_rush();
        profile.fallback = Some("Nowhere".to_string());
        let err = StrategyLibrary::new(vec![profile]).unwrap_err();
        assert!(matches!(err, AiError::InvalidProfile { .. }));
    }

    #[test]
    fn test_cross_race_fallback_rejected() {
        let mut rush = builtin::kingdom_rush();
        rush.fallback = Some("Horde Stronghold".to_string());
        let err = StrategyLibrary::new(vec![rush, builtin::horde_stronghold()]).unwrap_err();
        assert!(err.to_string().contains("is for Horde"));
    }

    #[test]
    fn test_unordered_waves_rejected() {
        let mut profile = builtin::horde_stronghold();
        profile.waves = vec![AttackWave::at(200), AttackWave::at(100)];
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_foreign_unit_rejected() {
        let mut profile = builtin::horde_stronghold();
        profile.macro_composition.push(BuildStep::unit(UnitType::Knight));
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_profiles_from_ron() {
        let ron = r#"[
            (
                name: "Tiny",
                race: Kingdom,
                opening: [Unit(unit_type: Peasant, count: 2)],
                macro_composition: [
                    Unit(unit_type: Swordsman, weight: 3.0),
                    Expansion(weight: 0.0),
                ],
                waves: [(trigger_time: 60.0, required_units: {Swordsman: 5})],
                ideal_workers: 6,
            ),
        ]"#;
        let library = StrategyLibrary::from_ron_str(ron).unwrap();
        let tiny = library.get("Tiny").unwrap();
        assert!(tiny.in_pool);
        assert_eq!(tiny.opening[0], BuildStep::units(UnitType::Peasant, 2, 1));
        assert_eq!(tiny.macro_composition[0].weight(), Fixed::from_num(3));
        assert_eq!(tiny.macro_composition[1].effective_weight(), Fixed::ONE);
        assert_eq!(tiny.waves[0].required_units[&UnitType::Swordsman], 5);
        assert_eq!(tiny.expansion_policy, ExpansionPolicy::Safe);
    }
}
