//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! The simulation must be 100% deterministic for lockstep multiplayer.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`spice_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Objects are always visited in increasing entity ID order.
//!
//! - **System randomness**: Retry rolls and similar draws come from the
//!   seeded ChaCha RNG stored in the simulation.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual behaviours (booking, dispatch, salvo timing)
//! 2. **Property tests**: Random orders must still produce deterministic outputs
//! 3. **Integration tests**: Full scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use spice_core::simulation::Simulation;

/// Final state hashes of several runs of the same scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Hash of each run, in run order.
    pub hashes: Vec<u64>,
    /// Ticks every run advanced.
    pub ticks: u64,
}

impl RunReport {
    /// Whether every run ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|pair| pair[0] == pair[1])
    }

    /// Distinct hashes, sorted.
    #[must_use]
    pub fn distinct_hashes(&self) -> Vec<u64> {
        let mut distinct = self.hashes.clone();
        distinct.sort_unstable();
        distinct.dedup();
        distinct
    }

    /// Fail the calling test if the runs diverged.
    ///
    /// # Panics
    ///
    /// Panics listing every hash when more than one final state was seen.
    pub fn assert_deterministic(&self) {
        assert!(
            self.is_deterministic(),
            "{} runs of {} ticks ended in {} different states: {:?}",
            self.hashes.len(),
            self.ticks,
            self.distinct_hashes().len(),
            self.hashes
        );
    }
}

/// Run any stepped state machine `runs` times for `ticks` steps and hash
/// the end states.
///
/// # Example
///
/// ```
/// use spice_test_utils::determinism::verify_determinism;
/// use spice_test_utils::fixtures::economy_scenario;
///
/// verify_determinism(3, 50, economy_scenario, |sim| { sim.tick(); }, |sim| sim.state_hash())
///     .assert_deterministic();
/// ```
pub fn verify_determinism<S>(
    runs: usize,
    ticks: u64,
    setup: impl Fn() -> S,
    step: impl Fn(&mut S),
    hash: impl Fn(&S) -> u64,
) -> RunReport {
    let hashes = (0..runs)
        .map(|_| {
            let mut state = setup();
            (0..ticks).for_each(|_| step(&mut state));
            hash(&state)
        })
        .collect();

    RunReport { hashes, ticks }
}

/// Two runs of a simulation scenario end in the same state.
pub fn verify_simulation_determinism(setup: impl Fn() -> Simulation, ticks: u64) -> bool {
    verify_determinism(2, ticks, setup, |sim| drop(sim.tick()), Simulation::state_hash)
        .is_deterministic()
}

/// Run the scenario on `runs` scoped threads at once.
///
/// Catches state that leaks between simulations or depends on scheduling.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations(
    setup: impl Fn() -> Simulation + Sync,
    runs: usize,
    ticks: u64,
) -> RunReport {
    let setup = &setup;
    let hashes = thread::scope(|scope| {
        let workers: Vec<_> = (0..runs)
            .map(|_| {
                scope.spawn(move || {
                    let mut sim = setup();
                    (0..ticks).for_each(|_| drop(sim.tick()));
                    sim.state_hash()
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("simulation thread panicked"))
            .collect()
    });

    RunReport { hashes, ticks }
}

/// First tick at which two runs of the scenario disagree, on either state
/// or emitted events. `Some(0)` means the setup itself differs.
pub fn find_first_divergence(setup: impl Fn() -> Simulation, ticks: u64) -> Option<u64> {
    let (mut left, mut right) = (setup(), setup());
    if left.state_hash() != right.state_hash() {
        return Some(0);
    }

    (1..=ticks).find(|_| left.tick() != right.tick() || left.state_hash() != right.state_hash())
}

/// A save taken after `ticks` restores to the same state, and the restored
/// copy keeps evolving in lockstep with the original.
pub fn verify_serialization_determinism(setup: impl Fn() -> Simulation, ticks: u64) -> bool {
    let mut original = setup();
    (0..ticks).for_each(|_| drop(original.tick()));

    let restored = original
        .serialize()
        .and_then(|bytes| Simulation::deserialize(&bytes));
    let Ok(mut restored) = restored else {
        return false;
    };

    (0..=ticks).all(|step| {
        if step > 0 {
            original.tick();
            restored.tick();
        }
        original.state_hash() == restored.state_hash()
    })
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use proptest::prelude::*;
    use spice_core::math::{Coord, Fixed};

    /// Generate a tile inside a `size`×`size` map.
    pub fn arb_coord(size: i32) -> impl Strategy<Value = Coord> {
        (0..size, 0..size).prop_map(|(x, y)| Coord::new(x, y))
    }

    /// Generate a spice amount (0-500).
    pub fn arb_spice() -> impl Strategy<Value = Fixed> {
        (0i32..500i32).prop_map(Fixed::from_num)
    }

    /// Generate damage values (1-100).
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        1u32..100u32
    }

    /// Orders a test can issue to fixture units.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum TestOrder {
        /// Move the unit to a tile.
        MoveTo(Coord),
        /// Send the unit to a repair yard.
        Repair,
        /// Damage the unit.
        Damage(u32),
    }

    /// Generate a single order on a `size`×`size` map.
    pub fn arb_order(size: i32) -> impl Strategy<Value = TestOrder> {
        prop_oneof![
            arb_coord(size).prop_map(TestOrder::MoveTo),
            Just(TestOrder::Repair),
            arb_damage().prop_map(TestOrder::Damage),
        ]
    }

    /// Generate a sequence of orders.
    pub fn arb_order_sequence(size: i32, max_len: usize) -> impl Strategy<Value = Vec<TestOrder>> {
        proptest::collection::vec(arb_order(size), 0..max_len)
    }
}
