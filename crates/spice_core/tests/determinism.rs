//! Whole-simulation determinism and save/load checks.

use spice_core::prelude::*;
use spice_test_utils::determinism::{
    find_first_divergence, verify_determinism, verify_serialization_determinism,
};
use spice_test_utils::fixtures::{
    battle_scenario, economy_scenario, fixed, open_map, spawn, two_house_sim, ENEMY, PLAYER,
};

/// Launchers firing into fog and re-navigating on RNG rolls.
fn fogged_barrage() -> Simulation {
    let mut map = TileMap::new(40, 40);
    map.reveal_all(TeamId(1));
    for y in 0..12 {
        for x in 0..12 {
            map.reveal(Coord::new(x, y), TeamId(0));
        }
    }
    let rules = GameRules {
        seed: 99,
        retry_navigate_one_in: 4,
        ..GameRules::default()
    };
    let mut sim = Simulation::new(map, rules);
    sim.add_house(PLAYER, TeamId(0), fixed(500), fixed(5000));
    sim.add_house(ENEMY, TeamId(1), fixed(500), fixed(5000));

    let launchers = [
        spawn(&mut sim, ObjectKind::Launcher, PLAYER, Coord::new(8, 8)),
        spawn(&mut sim, ObjectKind::Launcher, PLAYER, Coord::new(10, 9)),
    ];
    let tank = spawn(&mut sim, ObjectKind::Tank, ENEMY, Coord::new(15, 12));
    spawn(&mut sim, ObjectKind::Carryall, ENEMY, Coord::new(14, 6));
    sim.order_attack(launchers[0], tank).unwrap();
    sim.order_attack_position(launchers[1], Coord::new(30, 30)).unwrap();
    sim
}

#[test]
fn test_scenarios_are_deterministic() {
    for setup in [economy_scenario, battle_scenario, fogged_barrage] {
        verify_determinism(3, 400, setup, |sim| drop(sim.tick()), Simulation::state_hash)
            .assert_deterministic();
        assert_eq!(find_first_divergence(setup, 200), None);
    }
}

#[test]
fn test_save_mid_game_resumes_identically() {
    assert!(verify_serialization_determinism(economy_scenario, 250));
    assert!(verify_serialization_determinism(battle_scenario, 90));
    assert!(verify_serialization_determinism(fogged_barrage, 45));
}

#[test]
fn test_seed_changes_random_outcome_only_through_rng() {
    let run = |seed| {
        let rules = GameRules {
            seed,
            ..GameRules::default()
        };
        let mut sim = two_house_sim(open_map(16, 16), rules);
        spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(2, 2));
        for _ in 0..20 {
            sim.tick();
        }
        sim
    };

    let (a, b) = (run(1), run(2));
    assert_eq!(a.registry(), b.registry());
    assert_eq!(a.get_tick(), b.get_tick());
}
