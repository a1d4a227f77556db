//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the engine makes identical
//! decisions given identical inputs.
//!
//! # Testing Strategy
//!
//! Two directors with the same seed, profile and world must issue the same
//! orders in the same order. Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`rts_ai::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Unit requirements live in `BTreeMap`s; registries are walked in the
//!   order the host returns them.
//!
//! - **System randomness**: Strategy selection and weighted picks draw from
//!   a `ChaCha8Rng` seeded at construction.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rts_ai::director::Director;
use rts_ai::math::Fixed;

use crate::fixtures::{MockWorld, Order};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Engine is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a setup multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of independent runs
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute the state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Hash a director's snapshot together with every order it has issued.
///
/// # Panics
///
/// Panics if the snapshot cannot be encoded.
#[must_use]
pub fn director_hash(director: &Director, world: &MockWorld) -> u64 {
    let snapshot_hash = director
        .snapshot()
        .state_hash()
        .expect("snapshot must encode");
    let mut hasher = DefaultHasher::new();
    snapshot_hash.hash(&mut hasher);
    hash_orders(&world.orders, &mut hasher);
    world.purchases.hash(&mut hasher);
    hasher.finish()
}

fn hash_orders(orders: &[Order], hasher: &mut DefaultHasher) {
    orders.len().hash(hasher);
    for order in orders {
        match *order {
            Order::AttackMove { unit, target } => {
                0u8.hash(hasher);
                unit.hash(hasher);
                target.x.to_bits().hash(hasher);
                target.y.to_bits().hash(hasher);
            }
            Order::MoveTo { unit, target } => {
                1u8.hash(hasher);
                unit.hash(hasher);
                target.x.to_bits().hash(hasher);
                target.y.to_bits().hash(hasher);
            }
            Order::AssignLabor { unit, kind } => {
                2u8.hash(hasher);
                unit.hash(hasher);
                kind.hash(hasher);
            }
            Order::Garrison { unit } => {
                3u8.hash(hasher);
                unit.hash(hasher);
            }
        }
    }
}

/// Run a director against a mock world twice and compare final hashes.
///
/// `setup` must build both from scratch each time.
pub fn verify_director_determinism<F>(setup: F, dt: Fixed, ticks: u64) -> DeterminismResult
where
    F: Fn() -> (Director, MockWorld),
{
    verify_determinism(
        2,
        ticks,
        &setup,
        |(director, world)| {
            director.tick(dt, world);
        },
        |(director, world)| director_hash(director, world),
    )
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(tick)` at the first tick
/// whose hashes differ.
pub fn find_first_divergence<F>(setup: F, dt: Fixed, ticks: u64) -> Option<u64>
where
    F: Fn() -> (Director, MockWorld),
{
    let (mut d1, mut w1) = setup();
    let (mut d2, mut w2) = setup();

    if director_hash(&d1, &w1) != director_hash(&d2, &w2) {
        return Some(0);
    }

    for tick in 1..=ticks {
        d1.tick(dt, &mut w1);
        d2.tick(dt, &mut w2);

        if director_hash(&d1, &w1) != director_hash(&d2, &w2) {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for engine inputs.
pub mod strategies {
    use proptest::prelude::*;
    use rts_ai::economy::Cost;
    use rts_ai::math::Fixed;
    use rts_ai::strategy::BuildStep;
    use rts_ai::units::{UnitType, UpgradeId};

    /// Any unit type.
    pub fn arb_unit_type() -> impl Strategy<Value = UnitType> {
        proptest::sample::select(UnitType::ALL.to_vec())
    }

    /// Weights in [-5, 50], including zero and negatives.
    pub fn arb_weight() -> impl Strategy<Value = Fixed> {
        (-5i32..=50i32).prop_map(Fixed::from_num)
    }

    /// Costs in a typical range.
    pub fn arb_cost() -> impl Strategy<Value = Cost> {
        (0i32..500, 0i32..300).prop_map(|(gold, lumber)| Cost::new(gold, lumber))
    }

    /// Any build step with a count in 0..=5.
    pub fn arb_build_step() -> impl Strategy<Value = BuildStep> {
        prop_oneof![
            (arb_unit_type(), 0u32..=5, arb_weight())
                .prop_map(|(t, count, w)| BuildStep::units(t, count, w)),
            (0u32..10, arb_weight()).prop_map(|(id, w)| BuildStep::upgrade(UpgradeId::new(id), w)),
            arb_weight().prop_map(|w| BuildStep::expansion(w)),
        ]
    }

    /// An opening script.
    pub fn arb_opening(max_len: usize) -> impl Strategy<Value = Vec<BuildStep>> {
        proptest::collection::vec(arb_build_step(), 0..max_len)
    }

    /// A non-empty weight list.
    pub fn arb_weights(max_len: usize) -> impl Strategy<Value = Vec<Fixed>> {
        proptest::collection::vec(arb_weight(), 1..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bot_director, still_ledger};
    use rts_ai::factions::Team;
    use rts_ai::strategy::builtin;
    use rts_ai::units::UnitType;

    fn setup() -> (Director, MockWorld) {
        let mut world = MockWorld::new();
        world.add_base(Team::Enemy, 0, 0);
        world.add_base(Team::Player, 2000, 0);
        world.spawn_many(Team::Player, UnitType::Thrall, 3, 2000, 0);
        let director = bot_director(
            vec![
                builtin::kingdom_rush(),
                builtin::kingdom_economic(),
                builtin::kingdom_bastion(),
            ],
            "Kingdom Rush",
            &still_ledger(2000, 1000),
            9,
        );
        (director, world)
    }

    #[test]
    fn test_verify_determinism_counter() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 2, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![20, 20, 20]);
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_verify_determinism_detects_drift() {
        use std::cell::Cell;
        let calls = Cell::new(0u64);
        let result = verify_determinism(
            2,
            1,
            || {
                calls.set(calls.get() + 1);
                calls.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_director_runs_are_deterministic() {
        verify_director_determinism(setup, Fixed::from_num(0.25), 400).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(setup, Fixed::from_num(0.5), 200), None);
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
    }
}
