//! Director behaviour over whole ticks: waves, strategy switching, siege.

use std::sync::Arc;

use rts_ai::prelude::*;
use rts_test_utils::fixtures::{bare_profile, bot_director, fixed, library_of, run_ticks, still_ledger};
use rts_test_utils::MockWorld;

/// Enemy base at the origin, Player base far east.
fn battlefield() -> MockWorld {
    let mut world = MockWorld::new();
    world.add_base(Team::Enemy, 0, 0);
    world.add_base(Team::Player, 3000, 0);
    world
}

fn launched(events: &[AiEvent]) -> Vec<(usize, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            AiEvent::WaveLaunched { index, units } => Some((*index, *units)),
            _ => None,
        })
        .collect()
}

fn switched(events: &[AiEvent]) -> Vec<(String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            AiEvent::StrategySwitched { from, to } => Some((from.clone(), to.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_wave_triggers_when_composition_met() {
    let mut profile = bare_profile("Rush", Race::Kingdom);
    profile.waves = vec![AttackWave::at(0).requiring(UnitType::Swordsman, 5)];
    let mut director = bot_director(vec![profile], "Rush", &still_ledger(0, 0), 1);
    let mut world = battlefield();
    world.spawn_many(Team::Enemy, UnitType::Swordsman, 4, 0, 0);

    let events = run_ticks(&mut director, &mut world, fixed(1), 5);
    assert!(launched(&events).is_empty());
    assert_eq!(director.wave_index(), 0);
    assert!(world.attack_orders().is_empty());

    world.spawn(Team::Enemy, UnitType::Swordsman, 0, 0);
    let events = director.tick(fixed(1), &mut world);

    assert_eq!(launched(&events), vec![(0, 5)]);
    assert_eq!(director.wave_index(), 1);
    assert_eq!(director.tactical_state(), TacticalState::Attack);
    assert_eq!(world.attack_orders().len(), 5);
}

#[test]
fn test_wave_waits_for_trigger_time() {
    let mut profile = bare_profile("Rush", Race::Kingdom);
    profile.waves = vec![AttackWave::at(10)];
    let mut director = bot_director(vec![profile], "Rush", &still_ledger(0, 0), 1);
    let mut world = battlefield();
    world.spawn(Team::Enemy, UnitType::Swordsman, 0, 0);

    let events = run_ticks(&mut director, &mut world, fixed(1), 9);
    assert!(launched(&events).is_empty());

    let events = director.tick(fixed(1), &mut world);
    assert_eq!(launched(&events), vec![(0, 1)]);
}

#[test]
fn test_power_ratio_blocks_wave_against_empty_enemy() {
    let mut profile = bare_profile("Rush", Race::Kingdom);
    profile.waves = vec![AttackWave::at(0).with_power_ratio(1)];
    let mut director = bot_director(vec![profile], "Rush", &still_ledger(0, 0), 1);
    let mut world = battlefield();
    world.spawn_many(Team::Enemy, UnitType::Knight, 3, 0, 0);

    // Base present but no enemy units: power zero, ratio unmet.
    let events = run_ticks(&mut director, &mut world, fixed(1), 3);
    assert!(launched(&events).is_empty());

    world.spawn(Team::Player, UnitType::Peasant, 3000, 0);
    let events = run_ticks(&mut director, &mut world, fixed(1), 2);
    assert_eq!(launched(&events).len(), 1);
}

#[test]
fn test_wave_amplifies_missing_units() {
    let mut profile = bare_profile("Rush", Race::Kingdom);
    profile.macro_composition = vec![
        BuildStep::unit(UnitType::Swordsman),
        BuildStep::unit(UnitType::Archer),
    ];
    profile.waves = vec![AttackWave::at(1000).requiring(UnitType::Swordsman, 5)];
    let mut director = bot_director(vec![profile], "Rush", &still_ledger(0, 0), 1);
    let mut world = battlefield();

    director.tick(fixed(2), &mut world);

    // Two macro picks this pass, each followed by an amplification.
    assert_eq!(
        director.scheduler().runtime_list().weights(),
        vec![Fixed::from_num(1.5625), Fixed::ONE]
    );
}

#[test]
fn test_wave_launch_resets_runtime_weights() {
    let mut profile = bare_profile("Rush", Race::Kingdom);
    profile.waves = vec![
        AttackWave::at(4).requiring(UnitType::Swordsman, 1),
        AttackWave::at(1000).requiring(UnitType::Swordsman, 50),
    ];
    let mut director = bot_director(vec![profile], "Rush", &still_ledger(0, 0), 1);
    let mut world = battlefield();

    director.tick(fixed(2), &mut world);
    assert!(director.scheduler().runtime_list().weights()[0] > Fixed::ONE);

    world.spawn(Team::Enemy, UnitType::Swordsman, 0, 0);
    let events = director.tick(fixed(2), &mut world);
    assert_eq!(launched(&events).len(), 1);
    assert_eq!(director.scheduler().runtime_list().weights(), vec![Fixed::ONE]);
}

#[test]
fn test_time_limit_switches_to_fallback() {
    let mut rush = bare_profile("Rush", Race::Kingdom);
    rush.opening = vec![BuildStep::unit(UnitType::Knight)];
    rush.waves = vec![AttackWave::at(0)];
    rush.fallback = Some("Hold".to_string());
    rush.transition_time_limit = fixed(10);
    let mut hold = bare_profile("Hold", Race::Kingdom);
    hold.in_pool = false;
    hold.macro_composition = vec![
        BuildStep::units(UnitType::Archer, 1, 4),
        BuildStep::units(UnitType::GuardTower, 1, 2),
    ];
    let mut director = bot_director(vec![rush, hold.clone()], "Rush", &still_ledger(0, 0), 3);
    let mut world = battlefield();
    world.spawn_many(Team::Enemy, UnitType::Knight, 6, 0, 0);

    let events = run_ticks(&mut director, &mut world, fixed(1), 9);
    assert!(switched(&events).is_empty());
    assert_eq!(director.wave_index(), 1);

    let events = director.tick(fixed(1), &mut world);
    assert_eq!(switched(&events), vec![("Rush".to_string(), "Hold".to_string())]);

    assert_eq!(director.state(), DirectorState::Running("Hold".into()));
    assert_eq!(director.wave_index(), 0);
    assert!(!director.scheduler().is_opening_finished());
    assert!(director.scheduler().queue().is_empty());
    assert_eq!(
        director.scheduler().runtime_list().steps(),
        &hold.macro_composition[..]
    );

    // The refill happens on the very next tick.
    director.tick(fixed(1), &mut world);
    assert!(!director.scheduler().queue().is_empty());
}

#[test]
fn test_fallback_time_limit_counts_from_its_activation() {
    let mut first = bare_profile("First", Race::Kingdom);
    first.fallback = Some("Second".to_string());
    first.transition_time_limit = fixed(5);
    let mut second = bare_profile("Second", Race::Kingdom);
    second.fallback = Some("Third".to_string());
    second.transition_time_limit = fixed(5);
    let third = bare_profile("Third", Race::Kingdom);
    let mut director = bot_director(vec![first, second, third], "First", &still_ledger(0, 0), 3);
    let mut world = battlefield();

    let events = run_ticks(&mut director, &mut world, fixed(1), 5);
    assert_eq!(switched(&events).len(), 1);
    assert_eq!(director.state(), DirectorState::Running("Second".into()));

    let events = run_ticks(&mut director, &mut world, fixed(1), 4);
    assert!(switched(&events).is_empty());

    let events = director.tick(fixed(1), &mut world);
    assert_eq!(switched(&events), vec![("Second".to_string(), "Third".to_string())]);
}

#[test]
fn test_repelled_attack_switches_when_opted_in() {
    let mut rush = bare_profile("Rush", Race::Kingdom);
    rush.waves = vec![AttackWave::at(0)];
    rush.fallback = Some("Hold".to_string());
    rush.switch_on_repelled = true;
    let hold = bare_profile("Hold", Race::Kingdom);
    let mut director = bot_director(vec![rush, hold], "Rush", &still_ledger(0, 0), 5);
    let mut world = battlefield();
    // Two swordsmen: 50 power, under the retreat floor.
    world.spawn_many(Team::Enemy, UnitType::Swordsman, 2, 0, 0);

    let events = director.tick(fixed(1), &mut world);
    assert_eq!(launched(&events).len(), 1);
    assert_eq!(director.tactical_state(), TacticalState::Attack);

    let events = director.tick(fixed(1), &mut world);
    assert_eq!(director.tactical_state(), TacticalState::Defend);
    assert_eq!(switched(&events), vec![("Rush".to_string(), "Hold".to_string())]);
}

#[test]
fn test_fallback_without_trigger_never_switches() {
    let mut rush = bare_profile("Rush", Race::Kingdom);
    rush.waves = vec![AttackWave::at(0)];
    rush.fallback = Some("Hold".to_string());
    assert!(!rush.has_failure_trigger());
    let hold = bare_profile("Hold", Race::Kingdom);
    let mut director = bot_director(vec![rush, hold], "Rush", &still_ledger(0, 0), 5);
    let mut world = battlefield();
    world.spawn_many(Team::Enemy, UnitType::Swordsman, 2, 0, 0);

    let events = run_ticks(&mut director, &mut world, fixed(1), 2);
    assert_eq!(launched(&events).len(), 1);
    assert_eq!(director.tactical_state(), TacticalState::Defend);
    assert!(switched(&events).is_empty());

    let events = run_ticks(&mut director, &mut world, fixed(1), 20);
    assert!(switched(&events).is_empty());
    assert_eq!(director.state(), DirectorState::Running("Rush".into()));
}

#[test]
fn test_failure_without_fallback_is_ignored() {
    let mut lone = bare_profile("Lone", Race::Kingdom);
    lone.transition_time_limit = fixed(3);
    let mut director = bot_director(vec![lone], "Lone", &still_ledger(0, 0), 5);
    let mut world = battlefield();

    let events = run_ticks(&mut director, &mut world, fixed(1), 20);
    assert!(switched(&events).is_empty());
    assert_eq!(director.state(), DirectorState::Running("Lone".into()));
}

#[test]
fn test_exhausted_economy_without_sites_attacks() {
    let mut director = bot_director(
        vec![bare_profile("Test", Race::Kingdom)],
        "Test",
        &still_ledger(0, 0),
        5,
    );
    let mut world = battlefield();
    let home = world.bases[0].id;
    world.set_remaining(home, ResourceKind::Gold, 0);
    world.free_sites = 0;
    world.spawn_many(Team::Enemy, UnitType::Archer, 3, 0, 0);

    let events = director.tick(fixed(2), &mut world);

    assert!(events.contains(&AiEvent::AllOutAttack { units: 3 }));
    assert_eq!(director.tactical_state(), TacticalState::Attack);
    assert_eq!(world.attack_orders().len(), 3);
}

#[test]
fn test_unreachable_wave_is_reported_once() {
    let mut profile = bare_profile("Rush", Race::Kingdom);
    profile.waves = vec![AttackWave::at(0).requiring(UnitType::Knight, 40)];
    let mut director = bot_director(vec![profile], "Rush", &still_ledger(0, 0), 1);
    let mut world = battlefield();

    let events = run_ticks(&mut director, &mut world, fixed(1), 59);
    assert!(director.stalled_wave().is_none());
    assert!(!events.contains(&AiEvent::WaveStalled { index: 0 }));

    let events = run_ticks(&mut director, &mut world, fixed(1), 20);
    let stalls = events
        .iter()
        .filter(|e| matches!(e, AiEvent::WaveStalled { .. }))
        .count();
    assert_eq!(stalls, 1);

    let stall = director.stalled_wave().expect("wave should be stalled");
    assert_eq!(stall.index, 0);
    assert_eq!(stall.overdue, fixed(79));
    assert_eq!(director.wave_index(), 0);
}

#[test]
fn test_siege_multiplies_regeneration() {
    let ledger = LedgerConfig {
        starting_gold: 0,
        starting_lumber: 0,
        regen_amount: 5,
        regen_interval: fixed(5),
        ..LedgerConfig::default()
    };
    let library: Arc<StrategyLibrary> = library_of(vec![bare_profile("Test", Race::Kingdom)]);
    let make = || {
        let ctx = FactionContext::new(Team::Enemy, Race::Kingdom, ControlMode::AutoPilot, &ledger);
        let mut d = Director::new(ctx, EngineConfig::default(), Arc::clone(&library), 1);
        d.activate(Some("Test")).expect("profile exists");
        d
    };

    let mut calm = make();
    let mut besieged = make();
    let mut calm_world = battlefield();
    let mut siege_world = battlefield();
    siege_world.spawn(Team::Enemy, UnitType::Swordsman, 0, 0);

    let events = besieged.set_siege(true, &mut siege_world);
    assert!(events.contains(&AiEvent::TacticalStateChanged {
        from: TacticalState::Defend,
        to: TacticalState::Siege,
    }));
    assert_eq!(siege_world.orders.len(), 1);

    run_ticks(&mut calm, &mut calm_world, fixed(1), 5);
    run_ticks(&mut besieged, &mut siege_world, fixed(1), 5);

    assert_eq!(calm.ledger().gold(), 5);
    assert_eq!(besieged.ledger().gold(), 25);
    assert_eq!(besieged.tactical_state(), TacticalState::Siege);
}

#[test]
fn test_siege_refuses_waves_until_lifted() {
    let mut profile = bare_profile("Rush", Race::Kingdom);
    profile.waves = vec![AttackWave::at(0)];
    let ctx = FactionContext::new(Team::Player, Race::Kingdom, ControlMode::AutoPilot, &still_ledger(0, 0));
    let mut director = Director::new(ctx, EngineConfig::default(), library_of(vec![profile]), 1);
    director.activate(Some("Rush")).expect("profile exists");

    let mut world = MockWorld::new();
    world.add_base(Team::Player, 0, 0);
    world.add_base(Team::Enemy, 3000, 0);
    world.spawn_many(Team::Player, UnitType::Knight, 2, 0, 0);

    director.set_siege(true, &mut world);
    let events = run_ticks(&mut director, &mut world, fixed(1), 3);
    assert!(launched(&events).is_empty());

    director.set_siege(false, &mut world);
    let events = director.tick(fixed(1), &mut world);
    assert_eq!(launched(&events), vec![(0, 2)]);
}

#[test]
fn test_uninitialized_director_does_nothing() {
    let ctx = FactionContext::new(Team::Enemy, Race::Horde, ControlMode::Bot, &still_ledger(0, 0));
    let mut director = Director::new(ctx, EngineConfig::default(), Arc::new(StrategyLibrary::builtin()), 1);
    let mut world = battlefield();

    let events = run_ticks(&mut director, &mut world, fixed(1), 10);

    assert!(events.is_empty());
    assert_eq!(director.game_time(), Fixed::ZERO);
    assert!(world.orders.is_empty());
}
