//! Periodic battlefield assessment.
//!
//! Once per scout interval the assessor walks the unit registry and
//! produces an [`Assessment`]: enemy strength, base counts and where to
//! hit. Everything downstream (wave gating, retreat checks, all-out
//! attacks) reads the latest assessment rather than re-scanning.

use serde::{Deserialize, Serialize};

use crate::factions::Team;
use crate::math::{consume_interval, fixed_serde, nearest_by, Fixed, Vec2Fixed};
use crate::world::{UnitInfo, UnitRegistry};

/// Rate-of-fire bonus numerator: a unit adds `10 / cooldown`.
const RATE_OF_FIRE_BONUS: i32 = 10;

/// Health contributes a tenth of its value.
const HEALTH_DIVISOR: i32 = 10;

/// Strategic combat power of one unit.
///
/// `0.1 × health + damage`, plus `10 / cooldown` for units that fire.
/// Fortifications are worth nothing; static defenses must never make a
/// side look stronger than its army.
#[must_use]
pub fn unit_power(unit: &UnitInfo) -> Fixed {
    if unit.unit_type.is_fortification() {
        return Fixed::ZERO;
    }

    let health = Fixed::from_num(unit.health.max(0)) / Fixed::from_num(HEALTH_DIVISOR);
    let mut power = health.saturating_add(Fixed::from_num(unit.attack_damage.max(0)));
    if unit.attack_cooldown > Fixed::ZERO {
        let bonus = Fixed::from_num(RATE_OF_FIRE_BONUS)
            .checked_div(unit.attack_cooldown)
            .unwrap_or(Fixed::MAX);
        power = power.saturating_add(bonus);
    }
    power
}

/// Total power of the live units of `team`.
#[must_use]
pub fn team_power(units: &[UnitInfo], team: Team) -> Fixed {
    units
        .iter()
        .filter(|u| u.is_live_on(team))
        .fold(Fixed::ZERO, |acc, u| acc.saturating_add(unit_power(u)))
}

/// Snapshot of the battlefield from one team's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Assessment {
    /// Summed power of every live opposing unit.
    #[serde(with = "fixed_serde")]
    pub enemy_total_power: Fixed,
    /// Live opposing units.
    pub enemy_unit_count: u32,
    /// Opposing bases.
    pub enemy_base_count: u32,
    /// Own bases.
    pub my_base_count: u32,
    /// Where attacks go: nearest enemy base, else nearest enemy unit.
    pub primary_target: Option<Vec2Fixed>,
    /// Reference point for "nearest": the first own base.
    pub home: Vec2Fixed,
}

/// Samples the battlefield on a fixed cadence.
#[derive(Debug, Clone)]
pub struct BattlefieldAssessor {
    team: Team,
    interval: Fixed,
    timer: Fixed,
    latest: Assessment,
    samples: u64,
}

impl BattlefieldAssessor {
    /// Create an assessor for `team` sampling every `interval` seconds.
    #[must_use]
    pub fn new(team: Team, interval: Fixed) -> Self {
        Self {
            team,
            interval,
            timer: Fixed::ZERO,
            latest: Assessment::default(),
            samples: 0,
        }
    }

    /// Latest assessment. All zeros until the first sample.
    #[must_use]
    pub const fn latest(&self) -> &Assessment {
        &self.latest
    }

    /// Number of samples taken.
    #[must_use]
    pub const fn samples(&self) -> u64 {
        self.samples
    }

    /// Advance the cadence timer; samples when it elapses.
    ///
    /// Returns `true` if a fresh sample was taken.
    pub fn update<R: UnitRegistry + ?Sized>(&mut self, dt: Fixed, registry: &R) -> bool {
        self.timer = self.timer.saturating_add(dt);
        if !consume_interval(&mut self.timer, self.interval) {
            return false;
        }
        self.sample(registry);
        true
    }

    /// Take a sample now, regardless of the cadence.
    pub fn sample<R: UnitRegistry + ?Sized>(&mut self, registry: &R) {
        let enemy = self.team.opponent();
        let units = registry.units();
        let bases = registry.bases();

        let mut assessment = Assessment::default();

        for unit in units.iter().filter(|u| u.is_live_on(enemy)) {
            assessment.enemy_total_power = assessment
                .enemy_total_power
                .saturating_add(unit_power(unit));
            assessment.enemy_unit_count += 1;
        }

        assessment.home = bases
            .iter()
            .find(|b| b.team == self.team)
            .map_or(Vec2Fixed::ZERO, |b| b.position);

        for base in &bases {
            if base.team == self.team {
                assessment.my_base_count += 1;
            } else if base.team == enemy {
                assessment.enemy_base_count += 1;
            }
        }

        let home = assessment.home;
        assessment.primary_target = nearest_by(
            bases.iter().filter(|b| b.team == enemy),
            home,
            |b| b.position,
        )
        .map(|b| b.position)
        .or_else(|| {
            nearest_by(units.iter().filter(|u| u.is_live_on(enemy)), home, |u| {
                u.position
            })
            .map(|u| u.position)
        });

        tracing::trace!(
            "{:?} assessment: enemy power {}, {} units, {} bases",
            self.team,
            assessment.enemy_total_power,
            assessment.enemy_unit_count,
            assessment.enemy_base_count
        );

        self.latest = assessment;
        self.samples += 1;
    }
}
