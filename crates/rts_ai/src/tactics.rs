//! Tactical state machine: Defend, Attack and Siege.
//!
//! Defend is the resting state. A wave (or an all-out attack) moves the
//! controller to Attack; the periodic decision drops it back to Defend once
//! the army is spent. Siege is orthogonal: toggled from outside for the
//! auto-pilot, or entered by a bot whose profile opts in when a base is
//! threatened.

use serde::{Deserialize, Serialize};

use crate::assessor::{team_power, Assessment};
use crate::config::EngineConfig;
use crate::events::AiEvent;
use crate::factions::{ControlMode, Team};
use crate::math::{consume_interval, nearest_by, Fixed, Vec2Fixed};
use crate::strategy::{AttackWave, RetreatMode, StrategyProfile};
use crate::world::{UnitInfo, UnitOrders, UnitRegistry};

/// Tactical posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TacticalState {
    /// Hold at home.
    #[default]
    Defend,
    /// Army committed to an attack.
    Attack,
    /// Garrisoned; resource regeneration boosted.
    Siege,
}

/// Decides when to attack, when to fall back and when to dig in.
#[derive(Debug, Clone)]
pub struct TacticalController {
    team: Team,
    mode: ControlMode,
    state: TacticalState,
    timer: Fixed,
    interval: Fixed,
    attack_floor: Fixed,
    scan_radius: Fixed,
    retreat_mode: RetreatMode,
    siege_when_threatened: bool,
    auto_siege: bool,
    threat_detected: bool,
    front_line: Option<Vec2Fixed>,
    front_line_dirty: bool,
    launched_wave: Option<AttackWave>,
}

impl TacticalController {
    /// Create a controller in Defend.
    #[must_use]
    pub fn new(team: Team, mode: ControlMode, config: &EngineConfig) -> Self {
        Self {
            team,
            mode,
            state: TacticalState::Defend,
            timer: Fixed::ZERO,
            interval: config.tactical_interval,
            attack_floor: config.attack_power_floor,
            scan_radius: config.defend_scan_radius,
            retreat_mode: RetreatMode::FixedFloor,
            siege_when_threatened: false,
            auto_siege: false,
            threat_detected: false,
            front_line: None,
            front_line_dirty: true,
            launched_wave: None,
        }
    }

    /// Adopt the tactical settings of a newly active profile.
    pub fn configure(&mut self, profile: &StrategyProfile) {
        self.retreat_mode = profile.retreat_mode;
        self.siege_when_threatened = profile.siege_when_threatened;
        self.launched_wave = None;
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TacticalState {
        self.state
    }

    /// Whether the last Defend scan found hostile army near an owned base.
    #[must_use]
    pub const fn threat_detected(&self) -> bool {
        self.threat_detected
    }

    /// Owned base closest to the current target.
    #[must_use]
    pub const fn front_line(&self) -> Option<Vec2Fixed> {
        self.front_line
    }

    /// An outpost was started; the front line needs recomputing.
    pub fn notify_expansion(&mut self) {
        self.front_line_dirty = true;
    }

    /// Try to launch a wave.
    ///
    /// Succeeds only when every required unit count is met and, if the
    /// wave sets a power ratio, own power divided by the last sampled enemy
    /// power reaches it. An enemy sampled at zero power leaves a ratio
    /// requirement unmet. On success every live army unit is sent at the
    /// primary target and the controller enters Attack; the number of
    /// units ordered is returned.
    pub fn try_trigger_wave<W>(
        &mut self,
        wave: &AttackWave,
        assessment: &Assessment,
        world: &mut W,
        events: &mut Vec<AiEvent>,
    ) -> Option<usize>
    where
        W: UnitRegistry + UnitOrders + ?Sized,
    {
        if self.state == TacticalState::Siege {
            return None;
        }

        let units = world.units();

        let composition_met = wave.required_units.iter().all(|(unit_type, required)| {
            let live = units
                .iter()
                .filter(|u| u.is_live_on(self.team) && u.unit_type == *unit_type)
                .count() as u32;
            live >= *required
        });
        if !composition_met {
            return None;
        }

        if wave.required_power_ratio > Fixed::ZERO {
            let enemy = assessment.enemy_total_power;
            if enemy <= Fixed::ZERO {
                return None;
            }
            let mine = team_power(&units, self.team);
            let ratio = mine.checked_div(enemy).unwrap_or(Fixed::MAX);
            if ratio < wave.required_power_ratio {
                return None;
            }
        }

        let Some(target) = assessment.primary_target else {
            tracing::debug!("{:?} wave ready but no target known", self.team);
            return None;
        };

        let ordered = self.order_attack(&units, target, world);
        self.launched_wave = Some(wave.clone());
        self.set_state(TacticalState::Attack, events);
        tracing::info!(
            "{:?} wave launched with {} units toward ({}, {})",
            self.team,
            ordered,
            target.x,
            target.y
        );
        Some(ordered)
    }

    /// Send every army unit at the primary target, regardless of waves.
    ///
    /// Returns the number of units ordered; zero when there is nothing to
    /// attack.
    pub fn all_out_attack<W>(
        &mut self,
        assessment: &Assessment,
        world: &mut W,
        events: &mut Vec<AiEvent>,
    ) -> usize
    where
        W: UnitRegistry + UnitOrders + ?Sized,
    {
        let Some(target) = assessment.primary_target else {
            tracing::debug!("{:?} all-out attack requested with no target", self.team);
            return 0;
        };

        let units = world.units();
        let ordered = self.order_attack(&units, target, world);
        self.launched_wave = None;
        self.auto_siege = false;
        self.set_state(TacticalState::Attack, events);
        events.push(AiEvent::AllOutAttack { units: ordered });
        tracing::info!("{:?} all-out attack with {} units", self.team, ordered);
        ordered
    }

    /// Enter or leave Siege.
    ///
    /// Entering garrisons every mobile army unit; leaving returns to Defend.
    pub fn set_siege<W>(&mut self, on: bool, world: &mut W, events: &mut Vec<AiEvent>)
    where
        W: UnitRegistry + UnitOrders + ?Sized,
    {
        if on == (self.state == TacticalState::Siege) {
            return;
        }

        if on {
            let garrisoned: Vec<_> = world
                .units()
                .into_iter()
                .filter(|u| u.is_live_on(self.team) && u.unit_type.is_mobile_army())
                .map(|u| u.id)
                .collect();
            for id in &garrisoned {
                world.garrison(*id);
            }
            tracing::info!("{:?} entering siege, {} garrisoned", self.team, garrisoned.len());
            self.set_state(TacticalState::Siege, events);
        } else {
            self.auto_siege = false;
            self.set_state(TacticalState::Defend, events);
        }
    }

    /// Periodic tactical decision.
    pub fn update<W>(
        &mut self,
        dt: Fixed,
        assessment: &Assessment,
        world: &mut W,
        events: &mut Vec<AiEvent>,
    ) where
        W: UnitRegistry + UnitOrders + ?Sized,
    {
        self.timer = self.timer.saturating_add(dt);
        if !consume_interval(&mut self.timer, self.interval) {
            return;
        }

        if self.front_line_dirty {
            self.recompute_front_line(assessment, world);
        }

        match self.state {
            TacticalState::Attack => self.evaluate_attack(assessment, world, events),
            TacticalState::Defend | TacticalState::Siege => {
                self.scan_bases(world);
                self.evaluate_siege(world, events);
            }
        }
    }

    fn evaluate_attack<W>(&mut self, assessment: &Assessment, world: &mut W, events: &mut Vec<AiEvent>)
    where
        W: UnitRegistry + UnitOrders + ?Sized,
    {
        let units = world.units();
        let mine = team_power(&units, self.team);

        let repelled = match (self.retreat_mode, &self.launched_wave) {
            (RetreatMode::PerWave, Some(wave)) if wave.retreat_threshold > Fixed::ZERO => {
                let enemy = assessment.enemy_total_power;
                enemy > Fixed::ZERO
                    && mine.checked_div(enemy).unwrap_or(Fixed::MAX) < wave.retreat_threshold
            }
            _ => mine < self.attack_floor,
        };

        if !repelled {
            return;
        }

        tracing::info!("{:?} attack repelled (power {}), falling back", self.team, mine);
        let rally = self.front_line.unwrap_or(assessment.home);
        for unit in units
            .iter()
            .filter(|u| u.is_live_on(self.team) && u.unit_type.is_mobile_army())
        {
            world.move_to(unit.id, rally);
        }
        self.launched_wave = None;
        self.set_state(TacticalState::Defend, events);
    }

    fn scan_bases<R: UnitRegistry + ?Sized>(&mut self, registry: &R) {
        let enemy = self.team.opponent();
        let units = registry.units();
        let hostile: Vec<&UnitInfo> = units
            .iter()
            .filter(|u| u.is_live_on(enemy) && u.unit_type.is_mobile_army())
            .collect();

        let was_threatened = self.threat_detected;
        self.threat_detected = registry
            .bases()
            .iter()
            .filter(|b| b.team == self.team)
            .any(|base| {
                hostile
                    .iter()
                    .any(|u| base.position.within(u.position, self.scan_radius))
            });

        if self.threat_detected && !was_threatened {
            tracing::debug!("{:?} hostile presence near a base", self.team);
        }
    }

    fn evaluate_siege<W>(&mut self, world: &mut W, events: &mut Vec<AiEvent>)
    where
        W: UnitRegistry + UnitOrders + ?Sized,
    {
        if self.mode != ControlMode::Bot || !self.siege_when_threatened {
            return;
        }

        match self.state {
            TacticalState::Defend if self.threat_detected => {
                self.set_siege(true, world, events);
                self.auto_siege = true;
            }
            TacticalState::Siege if self.auto_siege && !self.threat_detected => {
                self.set_siege(false, world, events);
            }
            _ => {}
        }
    }

    fn recompute_front_line<R: UnitRegistry + ?Sized>(&mut self, assessment: &Assessment, registry: &R) {
        let bases = registry.bases();
        let own = bases.iter().filter(|b| b.team == self.team);
        let anchor = assessment.primary_target.unwrap_or(assessment.home);
        self.front_line = nearest_by(own, anchor, |b| b.position).map(|b| b.position);
        self.front_line_dirty = false;
    }

    fn order_attack<W>(&self, units: &[UnitInfo], target: Vec2Fixed, world: &mut W) -> usize
    where
        W: UnitOrders + ?Sized,
    {
        let mut ordered = 0;
        for unit in units
            .iter()
            .filter(|u| u.is_live_on(self.team) && u.unit_type.is_mobile_army())
        {
            world.attack_move(unit.id, target);
            ordered += 1;
        }
        ordered
    }

    fn set_state(&mut self, next: TacticalState, events: &mut Vec<AiEvent>) {
        if next == self.state {
            return;
        }
        events.push(AiEvent::TacticalStateChanged {
            from: self.state,
            to: next,
        });
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitType;
    use crate::world::{BaseInfo, EntityId};

    #[derive(Default)]
    struct Field {
        units: Vec<UnitInfo>,
        bases: Vec<BaseInfo>,
        attacks: Vec<EntityId>,
        moves: Vec<EntityId>,
        garrisons: Vec<EntityId>,
    }

    impl UnitRegistry for Field {
        fn units(&self) -> Vec<UnitInfo> {
            self.units.clone()
        }

        fn bases(&self) -> Vec<BaseInfo> {
            self.bases.clone()
        }
    }

    impl UnitOrders for Field {
        fn attack_move(&mut self, unit: EntityId, _target: Vec2Fixed) {
            self.attacks.push(unit);
        }

        fn move_to(&mut self, unit: EntityId, _target: Vec2Fixed) {
            self.moves.push(unit);
        }

        fn assign_labor(&mut self, _unit: EntityId, _kind: crate::economy::ResourceKind) {}

        fn garrison(&mut self, unit: EntityId) {
            self.garrisons.push(unit);
        }
    }

    fn unit(id: EntityId, team: Team, unit_type: UnitType, x: i32) -> UnitInfo {
        UnitInfo {
            id,
            team,
            unit_type,
            position: Vec2Fixed::from_ints(x, 0),
            health: 100,
            attack_damage: 10,
            attack_cooldown: Fixed::from_num(2),
            alive: true,
            labor: None,
        }
    }

    fn swordsmen(team: Team, count: u64, x: i32) -> Vec<UnitInfo> {
        (0..count)
            .map(|i| unit(100 + i, team, UnitType::Swordsman, x))
            .collect()
    }

    fn assessment(enemy_power: i32) -> Assessment {
        Assessment {
            enemy_total_power: Fixed::from_num(enemy_power),
            primary_target: Some(Vec2Fixed::from_ints(1000, 0)),
            ..Assessment::default()
        }
    }

    fn controller() -> TacticalController {
        TacticalController::new(Team::Enemy, ControlMode::Bot, &EngineConfig::default())
    }

    fn tick(ctl: &mut TacticalController, a: &Assessment, field: &mut Field) -> Vec<AiEvent> {
        let mut events = Vec::new();
        ctl.update(Fixed::from_num(0.5), a, field, &mut events);
        events
    }

    #[test]
    fn test_wave_waits_for_full_composition() {
        let wave = AttackWave::at(0).requiring(UnitType::Swordsman, 5);
        let mut ctl = controller();
        let mut field = Field {
            units: swordsmen(Team::Enemy, 4, 0),
            ..Field::default()
        };
        let mut events = Vec::new();

        assert!(ctl.try_trigger_wave(&wave, &assessment(0), &mut field, &mut events).is_none());
        assert_eq!(ctl.state(), TacticalState::Defend);

        field.units = swordsmen(Team::Enemy, 5, 0);
        assert!(ctl.try_trigger_wave(&wave, &assessment(0), &mut field, &mut events).is_some());
        assert_eq!(ctl.state(), TacticalState::Attack);
        assert_eq!(field.attacks.len(), 5);
        assert!(events.contains(&AiEvent::TacticalStateChanged {
            from: TacticalState::Defend,
            to: TacticalState::Attack,
        }));
    }

    #[test]
    fn test_power_ratio_against_zero_enemy_is_unmet() {
        let wave = AttackWave::at(0).with_power_ratio(1.5);
        let mut ctl = controller();
        let mut field = Field {
            units: swordsmen(Team::Enemy, 10, 0),
            ..Field::default()
        };
        let mut events = Vec::new();

        assert!(ctl.try_trigger_wave(&wave, &assessment(0), &mut field, &mut events).is_none());
        // 10 swordsmen at 25 power each against 200.
        assert!(ctl.try_trigger_wave(&wave, &assessment(100), &mut field, &mut events).is_some());
    }

    #[test]
    fn test_power_ratio_too_low_refuses() {
        let wave = AttackWave::at(0).with_power_ratio(2);
        let mut ctl = controller();
        let mut field = Field {
            units: swordsmen(Team::Enemy, 4, 0),
            ..Field::default()
        };
        let mut events = Vec::new();

        assert!(ctl.try_trigger_wave(&wave, &assessment(100), &mut field, &mut events).is_none());
    }

    #[test]
    fn test_attack_falls_back_below_floor() {
        let mut ctl = controller();
        let mut field = Field {
            units: swordsmen(Team::Enemy, 6, 0),
            ..Field::default()
        };
        let mut events = Vec::new();
        ctl.all_out_attack(&assessment(50), &mut field, &mut events);
        assert_eq!(ctl.state(), TacticalState::Attack);

        // 150 power holds.
        tick(&mut ctl, &assessment(50), &mut field);
        assert_eq!(ctl.state(), TacticalState::Attack);

        // 75 power retreats and survivors head home.
        field.units.truncate(3);
        let events = tick(&mut ctl, &assessment(50), &mut field);
        assert_eq!(ctl.state(), TacticalState::Defend);
        assert_eq!(field.moves.len(), 3);
        assert!(events.contains(&AiEvent::TacticalStateChanged {
            from: TacticalState::Attack,
            to: TacticalState::Defend,
        }));
    }

    #[test]
    fn test_per_wave_retreat_uses_ratio() {
        let mut profile = crate::strategy::builtin::kingdom_rush();
        profile.retreat_mode = RetreatMode::PerWave;
        let wave = AttackWave::at(0).with_retreat_threshold(1);

        let mut ctl = controller();
        ctl.configure(&profile);
        let mut field = Field {
            units: swordsmen(Team::Enemy, 2, 0),
            ..Field::default()
        };
        let mut events = Vec::new();
        assert!(ctl.try_trigger_wave(&wave, &assessment(40), &mut field, &mut events).is_some());

        // 50 power is under the fixed floor but above the wave's ratio.
        tick(&mut ctl, &assessment(40), &mut field);
        assert_eq!(ctl.state(), TacticalState::Attack);

        tick(&mut ctl, &assessment(60), &mut field);
        assert_eq!(ctl.state(), TacticalState::Defend);
    }

    #[test]
    fn test_update_respects_cadence() {
        let mut ctl = controller();
        let mut field = Field::default();
        let mut events = Vec::new();
        ctl.all_out_attack(&assessment(50), &mut field, &mut events);

        let mut events = Vec::new();
        ctl.update(Fixed::from_num(0.25), &assessment(50), &mut field, &mut events);
        assert_eq!(ctl.state(), TacticalState::Attack);
        ctl.update(Fixed::from_num(0.25), &assessment(50), &mut field, &mut events);
        assert_eq!(ctl.state(), TacticalState::Defend);
    }

    #[test]
    fn test_threat_scan_ignores_workers_and_far_units() {
        let mut ctl = controller();
        let mut field = Field {
            bases: vec![BaseInfo {
                id: 1,
                team: Team::Enemy,
                position: Vec2Fixed::ZERO,
                constructed: true,
            }],
            units: vec![
                unit(10, Team::Player, UnitType::Peasant, 50),
                unit(11, Team::Player, UnitType::Knight, 5000),
            ],
            ..Field::default()
        };

        tick(&mut ctl, &assessment(0), &mut field);
        assert!(!ctl.threat_detected());

        field.units.push(unit(12, Team::Player, UnitType::Knight, 250));
        tick(&mut ctl, &assessment(0), &mut field);
        assert!(ctl.threat_detected());
        // Default profile settings never auto-siege.
        assert_eq!(ctl.state(), TacticalState::Defend);
    }

    #[test]
    fn test_bot_sieges_while_threatened() {
        let mut ctl = controller();
        ctl.configure(&crate::strategy::builtin::kingdom_bastion());
        let mut field = Field {
            bases: vec![BaseInfo {
                id: 1,
                team: Team::Enemy,
                position: Vec2Fixed::ZERO,
                constructed: true,
            }],
            units: vec![
                unit(1, Team::Enemy, UnitType::Archer, 0),
                unit(12, Team::Player, UnitType::Knight, 100),
            ],
            ..Field::default()
        };

        tick(&mut ctl, &assessment(25), &mut field);
        assert_eq!(ctl.state(), TacticalState::Siege);
        assert_eq!(field.garrisons, vec![1]);

        field.units.pop();
        tick(&mut ctl, &assessment(0), &mut field);
        assert_eq!(ctl.state(), TacticalState::Defend);
    }

    #[test]
    fn test_siege_blocks_waves() {
        let mut ctl = TacticalController::new(Team::Enemy, ControlMode::AutoPilot, &EngineConfig::default());
        let mut field = Field {
            units: swordsmen(Team::Enemy, 5, 0),
            ..Field::default()
        };
        let mut events = Vec::new();
        ctl.set_siege(true, &mut field, &mut events);
        assert_eq!(ctl.state(), TacticalState::Siege);
        assert_eq!(field.garrisons.len(), 5);

        let wave = AttackWave::at(0);
        assert!(ctl.try_trigger_wave(&wave, &assessment(0), &mut field, &mut events).is_none());

        ctl.set_siege(false, &mut field, &mut events);
        assert_eq!(ctl.state(), TacticalState::Defend);
        assert!(ctl.try_trigger_wave(&wave, &assessment(0), &mut field, &mut events).is_some());
    }

    #[test]
    fn test_front_line_is_base_nearest_target() {
        let mut ctl = controller();
        let mut field = Field {
            bases: vec![
                BaseInfo {
                    id: 1,
                    team: Team::Enemy,
                    position: Vec2Fixed::ZERO,
                    constructed: true,
                },
                BaseInfo {
                    id: 2,
                    team: Team::Enemy,
                    position: Vec2Fixed::from_ints(600, 0),
                    constructed: true,
                },
            ],
            ..Field::default()
        };

        tick(&mut ctl, &assessment(0), &mut field);
        assert_eq!(ctl.front_line(), Some(Vec2Fixed::from_ints(600, 0)));
    }

    #[test]
    fn test_retreat_check_runs_every_half_second_at_tenth_second_frames() {
        let mut ctl = controller();
        let mut field = Field::default();
        let mut events = Vec::new();
        ctl.all_out_attack(&assessment(50), &mut field, &mut events);

        let dt = Fixed::ONE / Fixed::from_num(10);
        for _ in 0..4 {
            ctl.update(dt, &assessment(50), &mut field, &mut events);
        }
        assert_eq!(ctl.state(), TacticalState::Attack);
        ctl.update(dt, &assessment(50), &mut field, &mut events);
        assert_eq!(ctl.state(), TacticalState::Defend);
    }
}
