//! Tile-stepping movement.
//!
//! Units step along the 8-connected grid straight towards their
//! destination. Ground units stop when the next tile is impassable;
//! aircraft only need the tile to exist.

use crate::components::EntityId;
use crate::config::GameRules;
use crate::map::{MapOracle, Terrain};
use crate::math::Facing;
use crate::registry::ObjectRegistry;

/// Advance one object by its speed in tiles.
pub fn step(registry: &mut ObjectRegistry, map: &dyn MapOracle, rules: &GameRules, id: EntityId) {
    let Some(object) = registry.get_mut(id) else {
        return;
    };
    if !object.is_alive() || !object.is_on_map() || object.kind.is_structure() {
        return;
    }
    let Some(destination) = object.destination else {
        return;
    };

    let airborne = object.is_airborne();
    for _ in 0..rules.stats(object.kind).speed {
        if object.location == destination {
            break;
        }
        let next = object.location.step_towards(destination);
        let open = if airborne {
            map.tile_exists(next)
        } else {
            map.terrain_at(next).is_some_and(Terrain::is_passable)
        };
        if !open {
            tracing::trace!(object = id, ?next, "Path blocked");
            object.clear_path();
            return;
        }
        if let Some(facing) = Facing::between(object.location, next) {
            object.facing = facing;
        }
        object.location = next;
    }

    if object.location == destination {
        object.clear_path();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ObjectKind;
    use crate::factions::HouseId;
    use crate::map::TileMap;
    use crate::math::Coord;
    use crate::registry::GameObject;

    fn spawn(registry: &mut ObjectRegistry, kind: ObjectKind, at: Coord) -> EntityId {
        registry.insert(GameObject::spawn(kind, HouseId::Ordos, at, &GameRules::default()))
    }

    #[test]
    fn test_ground_unit_steps_one_tile() {
        let rules = GameRules::default();
        let map = TileMap::new(10, 10);
        let mut registry = ObjectRegistry::new();
        let tank = spawn(&mut registry, ObjectKind::Tank, Coord::new(0, 0));
        registry.get_mut(tank).unwrap().set_destination(Coord::new(3, 1));

        step(&mut registry, &map, &rules, tank);
        assert_eq!(registry.get(tank).unwrap().location, Coord::new(1, 1));
        assert_eq!(registry.get(tank).unwrap().facing, Facing::SouthEast);

        step(&mut registry, &map, &rules, tank);
        step(&mut registry, &map, &rules, tank);
        let tank = registry.get(tank).unwrap();
        assert_eq!(tank.location, Coord::new(3, 1));
        assert!(!tank.is_moving());
        assert_eq!(tank.destination, None);
    }

    #[test]
    fn test_aircraft_fly_two_tiles_over_mountains() {
        let rules = GameRules::default();
        let mut map = TileMap::new(10, 10);
        map.set_terrain(Coord::new(1, 0), Terrain::Mountain);
        let mut registry = ObjectRegistry::new();
        let carryall = spawn(&mut registry, ObjectKind::Carryall, Coord::new(0, 0));
        registry.get_mut(carryall).unwrap().set_destination(Coord::new(5, 0));

        step(&mut registry, &map, &rules, carryall);
        assert_eq!(registry.get(carryall).unwrap().location, Coord::new(2, 0));
    }

    #[test]
    fn test_mountain_blocks_ground_unit() {
        let rules = GameRules::default();
        let mut map = TileMap::new(10, 10);
        map.set_terrain(Coord::new(1, 0), Terrain::Mountain);
        let mut registry = ObjectRegistry::new();
        let tank = spawn(&mut registry, ObjectKind::Tank, Coord::new(0, 0));
        registry.get_mut(tank).unwrap().set_destination(Coord::new(5, 0));

        step(&mut registry, &map, &rules, tank);
        let tank = registry.get(tank).unwrap();
        assert_eq!(tank.location, Coord::new(0, 0));
        assert!(!tank.is_moving());
    }
}
