//! Object storage for the simulation.
//!
//! Objects are flat structs with optional capability components. Which
//! components are present is decided by the object's [`ObjectKind`] at
//! spawn time; update dispatch matches on the kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::booking::ServiceSlot;
use crate::carrier::Carryall;
use crate::components::{AttackMode, EntityId, Health, ObjectKind};
use crate::config::GameRules;
use crate::factions::HouseId;
use crate::ground_unit::GroundUnit;
use crate::harvester::Harvester;
use crate::math::{Coord, Facing, Fixed};
use crate::salvo::SalvoLauncher;
use crate::weapon::Targeting;

/// A simulation object with optional capability components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameObject {
    /// Unique identifier for this object.
    pub id: EntityId,
    /// What this object is.
    pub kind: ObjectKind,
    /// Owning house.
    pub owner: HouseId,
    /// Tile position (top-left tile for structures).
    pub location: Coord,
    /// Health points.
    pub health: Health,
    /// Engagement orders.
    pub attack_mode: AttackMode,
    /// Current facing (turret direction for emplacements).
    pub facing: Facing,
    /// Movement target, if moving.
    pub destination: Option<Coord>,
    /// Point the object returns to when it has nothing else to do.
    pub guard_point: Coord,
    /// Carryall or structure currently holding this unit.
    pub container: Option<EntityId>,
    /// Marked for removal at the end of the tick.
    pub destroyed: bool,
    /// Pickup and repair-trip state (ground units).
    pub ground: Option<GroundUnit>,
    /// Harvesting state (harvesters).
    pub harvester: Option<Harvester>,
    /// Transport state (carryalls).
    pub carryall: Option<Carryall>,
    /// Booking slot (refineries and repair yards).
    pub service: Option<ServiceSlot>,
    /// Targeting and single-shot weapon timer.
    pub weapon: Option<Targeting>,
    /// Multi-tube launcher timers.
    pub salvo: Option<SalvoLauncher>,
}

impl GameObject {
    /// Create a bare object of `kind` with no capability components.
    ///
    /// The registry assigns the real ID on insertion.
    #[must_use]
    pub fn new(kind: ObjectKind, owner: HouseId, location: Coord, max_health: u32) -> Self {
        Self {
            id: 0,
            kind,
            owner,
            location,
            health: Health::new(max_health),
            attack_mode: AttackMode::default(),
            facing: Facing::default(),
            destination: None,
            guard_point: location,
            container: None,
            destroyed: false,
            ground: None,
            harvester: None,
            carryall: None,
            service: None,
            weapon: None,
            salvo: None,
        }
    }

    /// Create an object of `kind` with the components its kind needs.
    #[must_use]
    pub fn spawn(kind: ObjectKind, owner: HouseId, location: Coord, rules: &GameRules) -> Self {
        let stats = rules.stats(kind);
        let mut object = Self::new(kind, owner, location, stats.max_health);

        if kind.is_ground_unit() {
            object.ground = Some(GroundUnit::new());
        }
        if kind.is_service_provider() {
            object.service = Some(ServiceSlot::new());
        }
        if stats.weapon.is_some() {
            object.weapon = Some(Targeting::new());
        }
        match kind {
            ObjectKind::Harvester => {
                object.harvester = Some(Harvester::new(rules.harvester_capacity));
            }
            ObjectKind::Carryall => object.carryall = Some(Carryall::new()),
            ObjectKind::Launcher => object.salvo = Some(SalvoLauncher::new(rules.salvo.tubes)),
            _ => {}
        }
        object
    }

    /// Alive and not scheduled for removal.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.destroyed && !self.health.is_dead()
    }

    /// On the map (not inside a carryall or structure).
    #[must_use]
    pub const fn is_on_map(&self) -> bool {
        self.container.is_none()
    }

    /// Check if this object flies.
    #[must_use]
    pub const fn is_airborne(&self) -> bool {
        self.kind.is_airborne()
    }

    /// Command the object to move to `target`.
    pub fn set_destination(&mut self, target: Coord) {
        self.destination = Some(target);
    }

    /// Drop the current movement order.
    pub fn clear_path(&mut self) {
        self.destination = None;
    }

    /// Whether the object still has somewhere to go.
    #[must_use]
    pub fn is_moving(&self) -> bool {
        self.destination.is_some_and(|d| d != self.location)
    }

    /// Footprint tile of this object closest to `point`.
    #[must_use]
    pub fn closest_tile(&self, point: Coord) -> Coord {
        let size = self.kind.size();
        Coord::new(
            point.x.clamp(self.location.x, self.location.x + size - 1),
            point.y.clamp(self.location.y, self.location.y + size - 1),
        )
    }

    /// Block distance from `point` to the nearest footprint tile.
    #[must_use]
    pub fn distance_from(&self, point: Coord) -> Fixed {
        self.closest_tile(point).block_distance(point)
    }

    /// Whether `point` touches the footprint (8-connected).
    #[must_use]
    pub fn is_adjacent(&self, point: Coord) -> bool {
        self.closest_tile(point).chebyshev_distance(point) <= 1
    }
}

/// Storage for all objects in the simulation.
///
/// IDs are handed out in increasing order and never reused, so the
/// ordered map iterates in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRegistry {
    objects: BTreeMap<EntityId, GameObject>,
    next_id: EntityId,
}

impl ObjectRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new object and return its ID.
    pub fn insert(&mut self, mut object: GameObject) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        object.id = id;
        self.objects.insert(id, object);
        id
    }

    /// Remove an object by ID.
    pub fn remove(&mut self, id: EntityId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    /// Get an object by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// Get an object by ID only if it is alive.
    #[must_use]
    pub fn get_live(&self, id: EntityId) -> Option<&GameObject> {
        self.objects.get(&id).filter(|object| object.is_alive())
    }

    /// Get a mutable reference to an object by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    /// Check if an object exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.objects.contains_key(&id)
    }

    /// Get the number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All IDs in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.objects.keys().copied().collect()
    }

    /// Iterate over all objects in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    /// Iterate mutably over all objects in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GameObject> {
        self.objects.values_mut()
    }

    /// Iterate over live objects of one kind in insertion order.
    pub fn iter_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &GameObject> {
        self.objects
            .values()
            .filter(move |object| object.kind == kind && object.is_alive())
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let mut registry = ObjectRegistry::new();
        let a = registry.insert(GameObject::new(
            ObjectKind::Tank,
            HouseId::Ordos,
            Coord::new(0, 0),
            10,
        ));
        let b = registry.insert(GameObject::new(
            ObjectKind::Tank,
            HouseId::Ordos,
            Coord::new(1, 0),
            10,
        ));

        assert!(a < b);
        assert_eq!(registry.ids(), vec![a, b]);
        assert_eq!(registry.get(b).unwrap().id, b);
    }

    #[test]
    fn test_iter_kind_skips_dead_and_other_kinds() {
        let mut registry = ObjectRegistry::new();
        let owner = HouseId::Ordos;
        let tank = registry.insert(GameObject::new(ObjectKind::Tank, owner, Coord::new(0, 0), 10));
        registry.insert(GameObject::new(ObjectKind::Carryall, owner, Coord::new(0, 0), 10));
        let dead = registry.insert(GameObject::new(ObjectKind::Tank, owner, Coord::new(0, 0), 10));
        registry.get_mut(dead).unwrap().health.current = 0;

        let tanks: Vec<_> = registry.iter_kind(ObjectKind::Tank).map(|o| o.id).collect();
        assert_eq!(tanks, vec![tank]);
    }

    #[test]
    fn test_structure_footprint_distance() {
        let refinery = GameObject::new(
            ObjectKind::Refinery,
            HouseId::Atreides,
            Coord::new(10, 10),
            100,
        );

        assert_eq!(refinery.closest_tile(Coord::new(0, 11)), Coord::new(10, 11));
        assert_eq!(refinery.distance_from(Coord::new(14, 12)), Fixed::from_num(2));
        assert!(refinery.is_adjacent(Coord::new(13, 13)));
        assert!(!refinery.is_adjacent(Coord::new(14, 13)));
    }

    #[test]
    fn test_spawn_attaches_components_by_kind() {
        let rules = GameRules::default();
        let owner = HouseId::Atreides;
        let at = Coord::new(0, 0);

        let harvester = GameObject::spawn(ObjectKind::Harvester, owner, at, &rules);
        assert!(harvester.harvester.is_some() && harvester.ground.is_some());
        assert!(harvester.weapon.is_none());

        let launcher = GameObject::spawn(ObjectKind::Launcher, owner, at, &rules);
        assert!(launcher.salvo.is_some() && launcher.weapon.is_some());

        let refinery = GameObject::spawn(ObjectKind::Refinery, owner, at, &rules);
        assert!(refinery.service.is_some() && refinery.ground.is_none());
        assert_eq!(refinery.health.max, rules.refinery.max_health);

        let carryall = GameObject::spawn(ObjectKind::Carryall, owner, at, &rules);
        assert!(carryall.carryall.is_some() && carryall.ground.is_none());
    }

    #[test]
    fn test_is_moving_follows_destination() {
        let mut tank = GameObject::new(ObjectKind::Tank, HouseId::Atreides, Coord::new(0, 0), 1);
        assert!(!tank.is_moving());
        tank.set_destination(Coord::new(3, 0));
        assert!(tank.is_moving());
        tank.set_destination(Coord::new(0, 0));
        assert!(!tank.is_moving());
        tank.clear_path();
        assert!(!tank.is_moving());
    }
}
