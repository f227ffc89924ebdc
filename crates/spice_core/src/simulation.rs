//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate and updates every object
//! deterministically, in registry order. Objects destroyed during a tick
//! stay in the registry (marked, but no longer resolvable) until the end
//! of the tick, when they are removed together with everything they carry.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - Randomness only from the seeded [`ChaCha8Rng`] stored in the simulation
//! - Consistent iteration order (increasing entity IDs)
//!
//! # Example
//!
//! ```
//! use spice_core::prelude::*;
//!
//! let mut sim = Simulation::new(TileMap::new(32, 32), GameRules::default());
//! sim.add_house(HouseId::Atreides, TeamId(0), Fixed::from_num(1000), Fixed::from_num(5000));
//!
//! let tank = sim
//!     .spawn_unit(ObjectKind::Tank, HouseId::Atreides, Coord::new(2, 2))
//!     .unwrap();
//! sim.move_to(tank, Coord::new(5, 2)).unwrap();
//! sim.tick();
//!
//! assert_eq!(sim.get_object(tank).unwrap().location, Coord::new(3, 2));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::{AttackMode, EntityId, ObjectKind};
use crate::config::GameRules;
use crate::context::{SimContext, SimEvent};
use crate::economy::{HouseEconomy, HouseTable};
use crate::error::{GameError, Result};
use crate::factions::{HouseId, TeamId};
use crate::harvester::{self, SelectionPolicy};
use crate::map::{MapOracle, TileMap};
use crate::math::{Coord, Fixed};
use crate::projectile::ProjectileRequest;
use crate::registry::{GameObject, ObjectRegistry};
use crate::{carrier, ground_unit, movement, refinery, repair_yard, salvo, weapon};

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Events generated during a simulation tick.
///
/// These events can be used by the game layer to spawn projectiles,
/// trigger sounds, animations, etc.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Projectiles fired this tick.
    pub projectiles: Vec<ProjectileRequest>,
    /// Bookings, deliveries, refining and repair notifications.
    pub events: Vec<SimEvent>,
    /// Objects removed at the end of this tick.
    pub destroyed: Vec<EntityId>,
}

/// The core game simulation.
///
/// Owns all game state and advances it one tick at a time.
///
/// # Update Order
///
/// Each tick, every live object is visited in ID order:
/// 1. **Ground upkeep** - carrier staleness and repair trips (ground units)
/// 2. **Behaviour** - harvesting, transport, service, weapons (by kind)
/// 3. **Movement** - one step towards the destination
///
/// Destroyed objects are removed after all objects were visited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Current simulation tick.
    tick: u64,
    /// All objects in the simulation.
    registry: ObjectRegistry,
    /// Terrain, spice and fog.
    map: TileMap,
    /// House economies.
    houses: HouseTable,
    /// Game rules.
    rules: GameRules,
    /// Seeded simulation RNG.
    rng: ChaCha8Rng,
    /// Events raised by commands between ticks.
    #[serde(skip)]
    pending: Vec<SimEvent>,
}

impl Simulation {
    /// Create a simulation on `map` with no objects and no houses.
    #[must_use]
    pub fn new(map: TileMap, rules: GameRules) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(rules.seed);
        Self {
            tick: 0,
            registry: ObjectRegistry::new(),
            map,
            houses: HouseTable::new(),
            rules,
            rng,
            pending: Vec::new(),
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// All objects.
    #[must_use]
    pub const fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// The map.
    #[must_use]
    pub const fn map(&self) -> &TileMap {
        &self.map
    }

    /// Mutable map access (fog updates, scenario setup).
    pub fn map_mut(&mut self) -> &mut TileMap {
        &mut self.map
    }

    /// House economies.
    #[must_use]
    pub const fn houses(&self) -> &HouseTable {
        &self.houses
    }

    /// Mutable house economies.
    pub fn houses_mut(&mut self) -> &mut HouseTable {
        &mut self.houses
    }

    /// Game rules.
    #[must_use]
    pub const fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Get an object by ID.
    #[must_use]
    pub fn get_object(&self, id: EntityId) -> Option<&GameObject> {
        self.registry.get(id)
    }

    /// Register a house and reveal nothing yet.
    pub fn add_house(&mut self, house: HouseId, team: TeamId, credits: Fixed, capacity: Fixed) {
        self.houses
            .insert(house, HouseEconomy::new(team, credits, capacity));
        tracing::info!(house = house.display_name(), team = team.0, "House added");
    }

    /// Spawn a mobile unit.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] for structure kinds or positions
    /// off the map.
    pub fn spawn_unit(&mut self, kind: ObjectKind, owner: HouseId, at: Coord) -> Result<EntityId> {
        if kind.is_structure() {
            return Err(GameError::InvalidState(format!("{kind:?} is not a unit")));
        }
        self.spawn(kind, owner, at)
    }

    /// Spawn a structure with its top-left tile at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidState`] for unit kinds or positions off
    /// the map.
    pub fn spawn_structure(
        &mut self,
        kind: ObjectKind,
        owner: HouseId,
        at: Coord,
    ) -> Result<EntityId> {
        if !kind.is_structure() {
            return Err(GameError::InvalidState(format!("{kind:?} is not a structure")));
        }
        self.spawn(kind, owner, at)
    }

    fn spawn(&mut self, kind: ObjectKind, owner: HouseId, at: Coord) -> Result<EntityId> {
        if !self.map.tile_exists(at) {
            return Err(GameError::InvalidState(format!("{at:?} is off the map")));
        }
        let id = self
            .registry
            .insert(GameObject::spawn(kind, owner, at, &self.rules));
        tracing::debug!(id, ?kind, house = owner.display_name(), ?at, "Object spawned");
        Ok(id)
    }

    fn with_context<R>(
        &mut self,
        projectiles: &mut Vec<ProjectileRequest>,
        f: impl FnOnce(&mut SimContext<'_>) -> R,
    ) -> R {
        let mut ctx = SimContext {
            registry: &mut self.registry,
            map: &mut self.map,
            houses: &mut self.houses,
            projectiles,
            rules: &self.rules,
            rng: &mut self.rng,
            events: &mut self.pending,
            tick: self.tick,
        };
        f(&mut ctx)
    }

    fn live(&self, id: EntityId) -> Result<&GameObject> {
        self.registry
            .get_live(id)
            .ok_or(GameError::EntityNotFound(id))
    }

    fn live_mut(&mut self, id: EntityId) -> Result<&mut GameObject> {
        self.registry
            .get_mut(id)
            .filter(|o| o.is_alive())
            .ok_or(GameError::EntityNotFound(id))
    }

    /// Advance the simulation by one tick.
    ///
    /// Returns events generated during this tick for use by the game layer.
    pub fn tick(&mut self) -> TickEvents {
        let mut projectiles = Vec::new();
        let ids = self.registry.ids();

        self.with_context(&mut projectiles, |ctx| {
            for id in ids {
                update_object(ctx, id);
            }
        });

        let destroyed = self.remove_destroyed();
        self.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents {
            projectiles,
            events: std::mem::take(&mut self.pending),
            destroyed,
        }
    }

    /// Remove objects marked destroyed, taking down whatever they hold and
    /// returning their travel bookings.
    fn remove_destroyed(&mut self) -> Vec<EntityId> {
        let mut doomed: Vec<EntityId> = self
            .registry
            .iter()
            .filter(|o| !o.is_alive())
            .map(|o| o.id)
            .collect();

        let mut next = 0;
        while next < doomed.len() {
            let id = doomed[next];
            next += 1;

            let held: Vec<EntityId> = self
                .registry
                .iter()
                .filter(|o| o.container == Some(id) && !doomed.contains(&o.id))
                .map(|o| o.id)
                .collect();
            for unit in held {
                if let Some(object) = self.registry.get_mut(unit) {
                    object.destroyed = true;
                }
                tracing::debug!(unit, container = id, "Destroyed with its container");
                doomed.push(unit);
            }

            self.release_bookings(id);
        }

        for id in &doomed {
            self.registry.remove(*id);
        }
        if !doomed.is_empty() {
            tracing::debug!(tick = self.tick, count = doomed.len(), "Objects removed");
        }
        doomed
    }

    fn release_bookings(&mut self, id: EntityId) {
        let Some(object) = self.registry.get(id) else {
            return;
        };

        let mut travel = Vec::new();
        if let Some(h) = object.harvester.as_ref().filter(|h| h.is_returning_to_refinery()) {
            travel.extend(h.refinery().id());
        }
        if let Some(ground) = object.ground {
            travel.extend(ground.repair_yard().id());
        }
        let container = object.container;

        for provider in travel {
            if let Some(slot) = self
                .registry
                .get_mut(provider)
                .and_then(|p| p.service.as_mut())
            {
                slot.remove_booking();
            }
        }

        let Some(structure) = container else {
            return;
        };
        if let Some(slot) = self
            .registry
            .get_mut(structure)
            .and_then(|c| c.service.as_mut())
            .filter(|slot| slot.occupant().id() == Some(id))
        {
            slot.unbook();
            for carrier in carrier::cancel_pickups(&mut self.registry, structure, id) {
                self.pending.push(SimEvent::CarrierReleased { carrier });
            }
        }
    }

    /// Assign a harvest zone.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not a live harvester.
    pub fn order_harvest(&mut self, id: EntityId, zone: Coord) -> Result<()> {
        self.live(id)?;
        if harvester::order_harvest(&mut self.registry, id, zone) {
            Ok(())
        } else {
            Err(GameError::WrongKind {
                id,
                expected: ObjectKind::Harvester,
            })
        }
    }

    /// Choose how a harvester picks spice sites.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not a live harvester.
    pub fn set_selection_policy(&mut self, id: EntityId, policy: SelectionPolicy) -> Result<()> {
        let harvester = self
            .live_mut(id)?
            .harvester
            .as_mut()
            .ok_or(GameError::WrongKind {
                id,
                expected: ObjectKind::Harvester,
            })?;
        harvester.set_policy(policy);
        Ok(())
    }

    /// Send a ground unit to a repair yard.
    ///
    /// Returns `false` if no repair yard is available.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not a live object.
    pub fn order_repair(&mut self, id: EntityId) -> Result<bool> {
        self.live(id)?;
        let mut projectiles = Vec::new();
        Ok(self.with_context(&mut projectiles, |ctx| ground_unit::order_repair(ctx, id)))
    }

    /// Attack a specific object.
    ///
    /// # Errors
    ///
    /// Fails if either object is missing or the attacker has no weapon.
    pub fn order_attack(&mut self, id: EntityId, target: EntityId) -> Result<()> {
        self.live(target)?;
        let object = self.live_mut(id)?;
        let targeting = object.weapon.as_mut().ok_or(GameError::InvalidState(format!(
            "Entity {id} has no weapon"
        )))?;
        targeting.force_target(target);
        Ok(())
    }

    /// Fire at a map tile.
    ///
    /// # Errors
    ///
    /// Fails if the attacker is missing or has no weapon.
    pub fn order_attack_position(&mut self, id: EntityId, position: Coord) -> Result<()> {
        let object = self.live_mut(id)?;
        let targeting = object.weapon.as_mut().ok_or(GameError::InvalidState(format!(
            "Entity {id} has no weapon"
        )))?;
        targeting.set_attack_position(Some(position));
        Ok(())
    }

    /// Change engagement orders.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not a live object.
    pub fn set_attack_mode(&mut self, id: EntityId, mode: AttackMode) -> Result<()> {
        let object = self.live_mut(id)?;
        object.attack_mode = mode;
        if mode == AttackMode::Stop {
            if let Some(targeting) = object.weapon.as_mut() {
                targeting.clear_target();
                targeting.set_attack_position(None);
            }
        }
        Ok(())
    }

    /// Move a unit and make `destination` its new guard point.
    ///
    /// Ground units going far ask for a carryall first.
    ///
    /// # Errors
    ///
    /// Fails if `id` is missing or a structure.
    pub fn move_to(&mut self, id: EntityId, destination: Coord) -> Result<()> {
        let object = self.live_mut(id)?;
        if object.kind.is_structure() {
            return Err(GameError::InvalidState(format!("Entity {id} cannot move")));
        }
        object.guard_point = destination;
        let ground = object.kind.is_ground_unit();

        let mut projectiles = Vec::new();
        let lifted = ground
            && self.with_context(&mut projectiles, |ctx| {
                ground_unit::request_carryall_drop(ctx, id, destination)
            });
        if !lifted {
            self.live_mut(id)?.set_destination(destination);
        }
        Ok(())
    }

    /// Damage an object. Returns `true` if it was killed.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not a live object.
    pub fn apply_damage(&mut self, id: EntityId, amount: u32) -> Result<bool> {
        let object = self.live_mut(id)?;
        object.health.apply_damage(amount);
        if object.health.is_dead() {
            object.destroyed = true;
            tracing::debug!(id, "Object killed");
            return Ok(true);
        }
        Ok(false)
    }

    /// Mark an object destroyed; it is removed at the end of the next tick.
    ///
    /// # Errors
    ///
    /// Fails if `id` is not a live object.
    pub fn destroy(&mut self, id: EntityId) -> Result<()> {
        self.live_mut(id)?.destroyed = true;
        Ok(())
    }

    /// Spice carried by a harvester.
    #[must_use]
    pub fn spice_of(&self, id: EntityId) -> Option<Fixed> {
        self.registry
            .get(id)
            .and_then(|o| o.harvester.as_ref())
            .map(harvester::Harvester::spice)
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Used for desync detection in multiplayer. Two simulations
    /// with identical state will produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.rng.get_word_pos().hash(&mut hasher);

        self.registry.len().hash(&mut hasher);
        for object in self.registry.iter() {
            object.id.hash(&mut hasher);
            object.kind.hash(&mut hasher);
            object.owner.hash(&mut hasher);
            object.location.hash(&mut hasher);
            object.health.hash(&mut hasher);
            object.facing.hash(&mut hasher);
            object.destination.hash(&mut hasher);
            object.container.hash(&mut hasher);
            object.destroyed.hash(&mut hasher);

            if let Some(ref h) = object.harvester {
                h.spice().to_bits().hash(&mut hasher);
                h.state().hash(&mut hasher);
                h.refinery().hash(&mut hasher);
            }
            if let Some(ref ground) = object.ground {
                ground.booked_carrier().hash(&mut hasher);
                ground.repair_yard().hash(&mut hasher);
            }
            if let Some(ref c) = object.carryall {
                c.is_booked().hash(&mut hasher);
                c.fellow().hash(&mut hasher);
                c.passenger().hash(&mut hasher);
                c.cargo().hash(&mut hasher);
            }
            if let Some(ref slot) = object.service {
                slot.occupant().hash(&mut hasher);
                slot.booking_count().hash(&mut hasher);
            }
            if let Some(ref targeting) = object.weapon {
                targeting.target().hash(&mut hasher);
                targeting.old_target().hash(&mut hasher);
                targeting.weapon_timer().hash(&mut hasher);
            }
            if let Some(ref launcher) = object.salvo {
                for tube in 0..launcher.tubes() {
                    launcher.timer(tube).hash(&mut hasher);
                }
                launcher.delay_counter().hash(&mut hasher);
            }
        }

        for (house, economy) in self.houses.iter() {
            house.hash(&mut hasher);
            economy.stored_credits().to_bits().hash(&mut hasher);
        }

        for y in 0..self.map.height() {
            for x in 0..self.map.width() {
                self.map.spice_at(Coord::new(x, y)).to_bits().hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    /// Serialize the simulation state for saves or network sync.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            GameError::Serialization(format!("Failed to serialize simulation: {e}"))
        })
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::Serialization(format!("Failed to deserialize simulation: {e}"))
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(TileMap::new(64, 64), GameRules::default())
    }
}

/// Run one object's per-tick behaviour, then move it.
fn update_object(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(kind) = ctx.registry.get_live(id).map(|o| o.kind) else {
        return;
    };

    if kind.is_ground_unit() {
        ground_unit::update(ctx, id);
    }
    match kind {
        ObjectKind::Harvester => harvester::update(ctx, id),
        ObjectKind::Carryall => carrier::update(ctx, id),
        ObjectKind::Refinery => refinery::update(ctx, id),
        ObjectKind::RepairYard => repair_yard::update(ctx, id),
        ObjectKind::Tank | ObjectKind::GunTurret | ObjectKind::RocketTurret => {
            weapon::update(ctx, id);
        }
        ObjectKind::Launcher => salvo::update(ctx, id),
    }

    movement::step(ctx.registry, &*ctx.map, ctx.rules, id);
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWN: HouseId = HouseId::Atreides;
    const ENEMY: HouseId = HouseId::Harkonnen;

    fn sim() -> Simulation {
        let mut map = TileMap::new(32, 32);
        map.reveal_all(TeamId(0));
        map.reveal_all(TeamId(1));
        let mut sim = Simulation::new(map, GameRules::default());
        sim.add_house(OWN, TeamId(0), Fixed::from_num(500), Fixed::from_num(5000));
        sim.add_house(ENEMY, TeamId(1), Fixed::from_num(500), Fixed::from_num(5000));
        sim
    }

    #[test]
    fn test_simulation_new() {
        let sim = sim();
        assert_eq!(sim.get_tick(), 0);
        assert!(sim.registry().is_empty());
    }

    #[test]
    fn test_spawn_checks_kind_and_bounds() {
        let mut sim = sim();
        assert!(sim.spawn_unit(ObjectKind::Tank, OWN, Coord::new(1, 1)).is_ok());
        assert!(sim.spawn_unit(ObjectKind::Refinery, OWN, Coord::new(1, 1)).is_err());
        assert!(sim.spawn_structure(ObjectKind::Tank, OWN, Coord::new(1, 1)).is_err());
        assert!(sim.spawn_unit(ObjectKind::Tank, OWN, Coord::new(-1, 1)).is_err());
    }

    #[test]
    fn test_tick_increments() {
        let mut sim = sim();
        sim.tick();
        sim.tick();
        assert_eq!(sim.get_tick(), 2);
    }

    #[test]
    fn test_commands_on_missing_entity() {
        let mut sim = sim();
        assert!(matches!(
            sim.move_to(42, Coord::new(0, 0)),
            Err(GameError::EntityNotFound(42))
        ));
        assert!(matches!(sim.destroy(42), Err(GameError::EntityNotFound(42))));
    }

    #[test]
    fn test_order_harvest_requires_harvester() {
        let mut sim = sim();
        let tank = sim.spawn_unit(ObjectKind::Tank, OWN, Coord::new(1, 1)).unwrap();
        assert!(matches!(
            sim.order_harvest(tank, Coord::new(5, 5)),
            Err(GameError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_destroyed_structure_takes_occupant() {
        let mut sim = sim();
        let yard = sim
            .spawn_structure(ObjectKind::RepairYard, OWN, Coord::new(10, 10))
            .unwrap();
        let tank = sim.spawn_unit(ObjectKind::Tank, OWN, Coord::new(9, 10)).unwrap();
        sim.apply_damage(tank, 10).unwrap();
        assert!(sim.order_repair(tank).unwrap());

        sim.tick();
        assert_eq!(sim.get_object(tank).unwrap().container, Some(yard));

        sim.destroy(yard).unwrap();
        let events = sim.tick();

        assert_eq!(events.destroyed, vec![yard, tank]);
        assert!(sim.get_object(tank).is_none());
    }

    #[test]
    fn test_destroyed_traveller_returns_booking() {
        let mut sim = sim();
        let yard = sim
            .spawn_structure(ObjectKind::RepairYard, OWN, Coord::new(20, 20))
            .unwrap();
        let tank = sim.spawn_unit(ObjectKind::Tank, OWN, Coord::new(2, 2)).unwrap();
        assert!(sim.order_repair(tank).unwrap());
        let count = |sim: &Simulation| sim.get_object(yard).unwrap().service.unwrap().booking_count();
        assert_eq!(count(&sim), 1);

        sim.destroy(tank).unwrap();
        sim.tick();
        assert_eq!(count(&sim), 0);
    }

    #[test]
    fn test_apply_damage_kills() {
        let mut sim = sim();
        let tank = sim.spawn_unit(ObjectKind::Tank, OWN, Coord::new(1, 1)).unwrap();
        let max = sim.rules().tank.max_health;
        assert!(!sim.apply_damage(tank, 1).unwrap());
        assert!(sim.apply_damage(tank, max).unwrap());

        let events = sim.tick();
        assert_eq!(events.destroyed, vec![tank]);
    }

    #[test]
    fn test_deterministic_hash() {
        let run = || {
            let mut sim = sim();
            sim.spawn_unit(ObjectKind::Launcher, OWN, Coord::new(3, 3)).unwrap();
            sim.spawn_unit(ObjectKind::Tank, ENEMY, Coord::new(8, 3)).unwrap();
            for _ in 0..50 {
                sim.tick();
            }
            sim.state_hash()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut sim = sim();
        let harvester = sim
            .spawn_unit(ObjectKind::Harvester, OWN, Coord::new(4, 4))
            .unwrap();
        sim.map_mut().set_spice(Coord::new(6, 6), Fixed::from_num(100));
        sim.order_harvest(harvester, Coord::new(6, 6)).unwrap();
        for _ in 0..10 {
            sim.tick();
        }

        let bytes = sim.serialize().unwrap();
        let mut restored = Simulation::deserialize(&bytes).unwrap();
        assert_eq!(restored.state_hash(), sim.state_hash());

        sim.tick();
        restored.tick();
        assert_eq!(restored.state_hash(), sim.state_hash());
    }
}
