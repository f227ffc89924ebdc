//! Test fixtures and helpers.
//!
//! Pre-built maps and simulations for consistent testing.

use spice_core::prelude::*;

/// Player house used by fixtures (team 0).
pub const PLAYER: HouseId = HouseId::Atreides;

/// Opposing house used by fixtures (team 1).
pub const ENEMY: HouseId = HouseId::Harkonnen;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// Sand map explored by both fixture teams.
#[must_use]
pub fn open_map(width: i32, height: i32) -> TileMap {
    let mut map = TileMap::new(width, height);
    map.reveal_all(TeamId(0));
    map.reveal_all(TeamId(1));
    map
}

/// Put `amount` spice on every tile of the `size`×`size` square at `origin`.
pub fn spice_field(map: &mut TileMap, origin: Coord, size: i32, amount: Fixed) {
    for dy in 0..size {
        for dx in 0..size {
            map.set_spice(Coord::new(origin.x + dx, origin.y + dy), amount);
        }
    }
}

/// Simulation with [`PLAYER`] and [`ENEMY`] on opposing teams.
///
/// Both houses start with 1000 credits and 10000 storage.
#[must_use]
pub fn two_house_sim(map: TileMap, rules: GameRules) -> Simulation {
    let mut sim = Simulation::new(map, rules);
    sim.add_house(PLAYER, TeamId(0), fixed(1000), fixed(10_000));
    sim.add_house(ENEMY, TeamId(1), fixed(1000), fixed(10_000));
    sim
}

/// Spawn any object kind.
///
/// # Panics
///
/// Panics if the position is off the map.
pub fn spawn(sim: &mut Simulation, kind: ObjectKind, owner: HouseId, at: Coord) -> EntityId {
    let spawned = if kind.is_structure() {
        sim.spawn_structure(kind, owner, at)
    } else {
        sim.spawn_unit(kind, owner, at)
    };
    spawned.expect("fixture spawn position must be on the map")
}

/// Harvesting economy: two refineries, a repair yard, three harvesters,
/// two carryalls and a far spice field.
#[must_use]
pub fn economy_scenario() -> Simulation {
    let mut map = open_map(64, 64);
    spice_field(&mut map, Coord::new(40, 40), 6, fixed(300));
    spice_field(&mut map, Coord::new(8, 30), 3, fixed(150));
    let mut sim = two_house_sim(map, GameRules::default());

    spawn(&mut sim, ObjectKind::Refinery, PLAYER, Coord::new(4, 4));
    spawn(&mut sim, ObjectKind::Refinery, PLAYER, Coord::new(30, 4));
    spawn(&mut sim, ObjectKind::RepairYard, PLAYER, Coord::new(4, 12));
    spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(2, 2));
    spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(20, 2));

    for (x, zone) in [(8, Coord::new(42, 42)), (10, Coord::new(9, 31)), (12, Coord::new(44, 41))] {
        let harvester = spawn(&mut sim, ObjectKind::Harvester, PLAYER, Coord::new(x, 8));
        sim.order_harvest(harvester, zone)
            .expect("fixture harvester exists");
    }
    sim
}

/// Skirmish: turrets and launchers of one house against tanks and
/// carryalls of the other.
#[must_use]
pub fn battle_scenario() -> Simulation {
    let mut sim = two_house_sim(open_map(48, 48), GameRules::default());

    spawn(&mut sim, ObjectKind::GunTurret, PLAYER, Coord::new(10, 10));
    spawn(&mut sim, ObjectKind::RocketTurret, PLAYER, Coord::new(14, 10));
    spawn(&mut sim, ObjectKind::Launcher, PLAYER, Coord::new(12, 6));
    spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(12, 12));

    for x in [8, 12, 16] {
        let tank = spawn(&mut sim, ObjectKind::Tank, ENEMY, Coord::new(x, 30));
        sim.move_to(tank, Coord::new(x, 13))
            .expect("fixture tank exists");
    }
    let carryall = spawn(&mut sim, ObjectKind::Carryall, ENEMY, Coord::new(30, 12));
    sim.move_to(carryall, Coord::new(2, 12))
        .expect("fixture carryall exists");
    sim
}
