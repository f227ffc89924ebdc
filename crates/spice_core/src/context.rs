//! Per-tick simulation context.
//!
//! Everything an update routine may touch is passed in explicitly through
//! [`SimContext`]; there is no global game state.

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::config::GameRules;
use crate::economy::HouseTable;
use crate::factions::{HouseId, TeamId};
use crate::map::MapOracle;
use crate::math::{fixed_serde, Coord, Fixed};
use crate::projectile::ProjectileSink;
use crate::registry::ObjectRegistry;

/// Notable things that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A carryall accepted a job.
    CarrierBooked {
        /// The carryall.
        carrier: EntityId,
        /// Structure or unit it now serves.
        requester: EntityId,
    },
    /// A carryall dropped its job without delivering.
    CarrierReleased {
        /// The carryall.
        carrier: EntityId,
    },
    /// A carryall set a unit down.
    CargoDelivered {
        /// The carryall.
        carrier: EntityId,
        /// The unit delivered.
        unit: EntityId,
        /// Where it was set down.
        at: Coord,
    },
    /// A service structure released its occupant.
    UnitDeployed {
        /// Refinery or repair yard.
        structure: EntityId,
        /// The unit released.
        unit: EntityId,
        /// Carryall that took the unit, if any.
        carrier: Option<EntityId>,
    },
    /// A refinery turned harvested spice into credits.
    SpiceRefined {
        /// The refinery.
        refinery: EntityId,
        /// The harvester being emptied.
        harvester: EntityId,
        /// Credits gained.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// A refinery had to stop because the owner's silos are full.
    StorageFull {
        /// House whose storage is full.
        house: HouseId,
    },
    /// A repair yard started charging for repairs.
    RepairActivated {
        /// The repair yard.
        yard: EntityId,
    },
    /// A repair yard halted for lack of credits.
    RepairPaused {
        /// The repair yard.
        yard: EntityId,
    },
    /// A unit was fully repaired.
    RepairCompleted {
        /// The repair yard.
        yard: EntityId,
        /// The repaired unit.
        unit: EntityId,
    },
}

/// Mutable view of the world handed to every update routine.
pub struct SimContext<'a> {
    /// All objects.
    pub registry: &'a mut ObjectRegistry,
    /// Map and fog queries.
    pub map: &'a mut dyn MapOracle,
    /// House economies and teams.
    pub houses: &'a mut HouseTable,
    /// Where fired projectiles go.
    pub projectiles: &'a mut dyn ProjectileSink,
    /// Game rules.
    pub rules: &'a GameRules,
    /// Seeded simulation RNG.
    pub rng: &'a mut ChaCha8Rng,
    /// Event log for this tick.
    pub events: &'a mut Vec<SimEvent>,
    /// Current tick.
    pub tick: u64,
}

impl SimContext<'_> {
    /// Team a house plays on.
    #[must_use]
    pub fn team_of(&self, house: HouseId) -> TeamId {
        self.houses.team_of(house)
    }

    /// Record an event.
    pub fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// Tiles a unit cannot be set down on: other units and structure footprints.
    #[must_use]
    pub fn occupied_tiles(&self, except: Option<EntityId>) -> Vec<Coord> {
        let mut tiles = Vec::new();
        for object in self.registry.iter() {
            if !object.is_alive() || !object.is_on_map() || Some(object.id) == except {
                continue;
            }
            if object.kind.is_structure() {
                let size = object.kind.size();
                for dy in 0..size {
                    for dx in 0..size {
                        tiles.push(Coord::new(object.location.x + dx, object.location.y + dy));
                    }
                }
            } else if object.kind.is_ground_unit() {
                tiles.push(object.location);
            }
        }
        tiles
    }

    /// Free tile to put a unit down at `target`, or the nearest free one around it.
    #[must_use]
    pub fn landing_spot(&self, target: Coord, unit: EntityId) -> Coord {
        let occupied = self.occupied_tiles(Some(unit));
        let passable = self
            .map
            .terrain_at(target)
            .is_some_and(|terrain| terrain.is_passable());
        if passable && !occupied.contains(&target) {
            target
        } else {
            self.map.find_deploy_spot(target, target, 1, &occupied)
        }
    }
}
