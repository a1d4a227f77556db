//! End-to-end matches in the headless arena.

use std::sync::Arc;

use rts_ai::factions::{Race, Team};
use rts_ai::strategy::StrategyLibrary;
use rts_headless::{run_match, MatchConfig, MatchRunner, SideConfig};
use rts_test_utils::determinism::verify_determinism;
use rts_test_utils::fixtures::{bare_profile, library_of};

fn mirror_library() -> Arc<StrategyLibrary> {
    library_of(vec![
        bare_profile("Kingdom Line", Race::Kingdom),
        bare_profile("Horde Line", Race::Horde),
    ])
}

fn short_config(seed: u64) -> MatchConfig {
    MatchConfig {
        max_seconds: 60,
        ticks_per_second: 5,
        ..MatchConfig::new(seed)
    }
}

#[test]
fn test_match_steps_are_deterministic() {
    let result = verify_determinism(
        3,
        200,
        || MatchRunner::new(short_config(21), mirror_library()).expect("valid setup"),
        |runner| {
            runner.step();
        },
        |runner| runner.state_hash().expect("hashable state"),
    );
    result.assert_deterministic();
}

#[test]
fn test_passive_profiles_time_out() {
    let config = MatchConfig {
        player: SideConfig::new(Race::Kingdom).with_strategy("Kingdom Line"),
        enemy: SideConfig::new(Race::Horde).with_strategy("Horde Line"),
        ..short_config(4)
    };
    let result = run_match(config, mirror_library()).expect("match runs");
    let metrics = &result.metrics;

    assert_eq!(metrics.winner, None);
    assert_eq!(metrics.win_condition, "timeout");
    assert_eq!(metrics.ticks, 300);
    for team in [Team::Player, Team::Enemy] {
        let stats = metrics.team(team).expect("team recorded");
        assert!(stats.gold_mined > 0);
        assert_eq!(stats.waves_launched, 0);
    }
}

#[test]
fn test_different_seeds_diverge() {
    let a = run_match(short_config(1), Arc::new(StrategyLibrary::builtin())).expect("match runs");
    let b = run_match(short_config(2), Arc::new(StrategyLibrary::builtin())).expect("match runs");
    assert_ne!(a.final_state_hash, b.final_state_hash);
}
