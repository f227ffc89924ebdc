//! Carryall dispatch and transport.
//!
//! A carryall is booked by exactly one requester (its *fellow*): either a
//! service structure handing out a finished unit, or a ground unit asking to
//! be flown somewhere. Booking a carrier and marking it busy happen in one
//! step, so a carrier handed out earlier in a tick is invisible to every
//! later request.
//!
//! A structure booking also names its *passenger*, the occupant the carrier
//! was called for. If that unit is gone by the time the carrier arrives, the
//! booking lapses instead of collecting whoever took the slot since.

use serde::{Deserialize, Serialize};

use crate::booking::BookingError;
use crate::components::{AttackMode, EntityId, ObjectKind};
use crate::context::{SimContext, SimEvent};
use crate::factions::HouseId;
use crate::math::{Coord, Fixed};
use crate::reference::ObjectRef;
use crate::registry::ObjectRegistry;
use crate::service;

/// Transport state of a carryall.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Carryall {
    booked: bool,
    fellow: ObjectRef,
    passenger: ObjectRef,
    cargo: Vec<EntityId>,
    deploy_position: Option<Coord>,
    fallback_position: Option<Coord>,
}

impl Carryall {
    /// Idle carryall.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the carryall has a job or is still carrying something.
    #[must_use]
    pub fn is_booked(&self) -> bool {
        self.booked || !self.cargo.is_empty()
    }

    /// The structure or unit being served.
    #[must_use]
    pub const fn fellow(&self) -> ObjectRef {
        self.fellow
    }

    /// Occupant a structure booked this carryall to collect.
    #[must_use]
    pub const fn passenger(&self) -> ObjectRef {
        self.passenger
    }

    /// Units assigned to this carryall.
    #[must_use]
    pub fn cargo(&self) -> &[EntityId] {
        &self.cargo
    }

    /// Where the cargo should be set down.
    #[must_use]
    pub const fn deploy_position(&self) -> Option<Coord> {
        self.deploy_position
    }

    /// Drop point used when the deploy position is not on the map.
    #[must_use]
    pub const fn fallback_position(&self) -> Option<Coord> {
        self.fallback_position
    }

    /// Reserve the carryall for `fellow`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::CarrierBusy`] if the carryall already has a job.
    pub fn try_book(&mut self, carrier: EntityId, fellow: EntityId) -> Result<(), BookingError> {
        if self.is_booked() {
            return Err(BookingError::CarrierBusy { carrier });
        }
        self.booked = true;
        self.fellow = ObjectRef::to(fellow);
        Ok(())
    }

    /// Tie the current structure booking to the unit it should collect.
    pub fn set_passenger(&mut self, unit: EntityId) {
        self.passenger = ObjectRef::to(unit);
    }

    /// Drop the job and forget the drop points.
    ///
    /// Cargo already aboard stays, so the carryall remains busy until it is
    /// delivered.
    pub fn cancel_booking(&mut self) {
        self.booked = false;
        self.fellow.clear();
        self.passenger.clear();
        self.deploy_position = None;
        self.fallback_position = None;
    }

    /// Set where cargo picked up later should be delivered.
    pub fn set_drop(&mut self, deploy: Coord, fallback: Coord) {
        self.deploy_position = Some(deploy);
        self.fallback_position = Some(fallback);
    }

    /// Add `unit` to the cargo (once) and set the drop points.
    pub fn give_cargo(&mut self, unit: EntityId, deploy: Coord, fallback: Coord) {
        if !self.cargo.contains(&unit) {
            self.cargo.push(unit);
        }
        self.set_drop(deploy, fallback);
    }

    /// Whether `unit` is the fellow or part of the cargo.
    #[must_use]
    pub fn serves(&self, unit: EntityId) -> bool {
        self.booked && (self.fellow.id() == Some(unit) || self.cargo.contains(&unit))
    }

    fn finish(&mut self) {
        self.cargo.clear();
        self.cancel_booking();
    }
}

/// Nearest idle carryall of `owner`.
///
/// Scans in registry order and keeps the first carryall at the lowest block
/// distance, so ties go to the one registered first.
#[must_use]
pub fn find_free_carrier(
    registry: &ObjectRegistry,
    owner: HouseId,
    location: Coord,
) -> Option<EntityId> {
    let mut best: Option<(EntityId, Fixed)> = None;

    for object in registry.iter_kind(ObjectKind::Carryall) {
        let eligible = object.owner == owner
            && object.is_on_map()
            && object.attack_mode != AttackMode::Stop
            && object.carryall.as_ref().is_some_and(|c| !c.is_booked());
        if !eligible {
            continue;
        }

        let distance = object.location.block_distance(location);
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((object.id, distance));
        }
    }

    best.map(|(id, _)| id)
}

/// Find the nearest idle carryall and book it for `requester`.
///
/// On success the carryall heads for `location`.
pub fn dispatch_carrier(
    registry: &mut ObjectRegistry,
    owner: HouseId,
    location: Coord,
    requester: EntityId,
) -> Option<EntityId> {
    let carrier = find_free_carrier(registry, owner, location)?;
    let object = registry.get_mut(carrier)?;
    let carryall = object.carryall.as_mut()?;

    if let Err(error) = carryall.try_book(carrier, requester) {
        tracing::warn!(%error, "Carrier booking refused");
        return None;
    }
    object.clear_path();
    object.set_destination(location);

    tracing::debug!(carrier, requester, ?location, "Carrier dispatched");
    Some(carrier)
}

/// Cancel pickups `structure` booked for `unit` that have not collected it
/// yet. Returns the carriers set free.
pub fn cancel_pickups(
    registry: &mut ObjectRegistry,
    structure: EntityId,
    unit: EntityId,
) -> Vec<EntityId> {
    let carriers: Vec<EntityId> = registry
        .iter_kind(ObjectKind::Carryall)
        .filter(|o| {
            o.carryall.as_ref().is_some_and(|c| {
                c.booked
                    && c.cargo.is_empty()
                    && c.fellow.id() == Some(structure)
                    && c.passenger.id() == Some(unit)
            })
        })
        .map(|o| o.id)
        .collect();

    for &carrier in &carriers {
        if let Some(object) = registry.get_mut(carrier) {
            object.clear_path();
            if let Some(carryall) = object.carryall.as_mut() {
                carryall.finish();
            }
        }
        tracing::debug!(carrier, structure, unit, "Pickup cancelled");
    }
    carriers
}

/// Per-tick carryall behaviour.
pub fn update(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(carryall) = ctx.registry.get(id).and_then(|o| o.carryall.clone()) else {
        return;
    };

    if !carryall.cargo.is_empty() {
        carry_cargo(ctx, id, &carryall);
    } else if carryall.is_booked() {
        serve_fellow(ctx, id, &carryall);
    }
}

fn serve_fellow(ctx: &mut SimContext<'_>, id: EntityId, carryall: &Carryall) {
    let Some(location) = ctx.registry.get(id).map(|o| o.location) else {
        return;
    };
    let Some(fellow) = carryall.fellow.resolve(ctx.registry) else {
        tracing::debug!(carrier = id, "Fellow lost, cancelling carrier booking");
        release(ctx, id);
        return;
    };
    let fellow_id = fellow.id;

    if fellow.kind.is_structure() {
        let occupant = fellow
            .service
            .and_then(|slot| slot.occupant().live_id(ctx.registry));
        if carryall.passenger.id().is_some_and(|p| occupant != Some(p)) {
            tracing::debug!(carrier = id, structure = fellow_id, "Passenger gone, cancelling pickup");
            release(ctx, id);
            return;
        }
        if fellow.is_adjacent(location) {
            if !service::deploy_occupant(ctx, fellow_id, Some(id)) {
                release(ctx, id);
            }
        } else {
            let target = fellow.closest_tile(location);
            if let Some(object) = ctx.registry.get_mut(id) {
                object.set_destination(target);
            }
        }
        return;
    }

    if !fellow.is_on_map() {
        release(ctx, id);
        return;
    }

    let target = fellow.location;
    if location == target {
        pick_up(ctx, id, fellow_id);
    } else if let Some(object) = ctx.registry.get_mut(id) {
        object.set_destination(target);
    }
}

fn pick_up(ctx: &mut SimContext<'_>, id: EntityId, unit: EntityId) {
    let Some(unit_location) = ctx.registry.get(unit).map(|o| o.location) else {
        return;
    };

    if let Some(carrier) = ctx.registry.get_mut(id) {
        carrier.clear_path();
        if let Some(carryall) = carrier.carryall.as_mut() {
            let deploy = carryall.deploy_position.unwrap_or(unit_location);
            let fallback = carryall.fallback_position.unwrap_or(unit_location);
            carryall.give_cargo(unit, deploy, fallback);
        }
    }
    if let Some(object) = ctx.registry.get_mut(unit) {
        object.container = Some(id);
        object.clear_path();
    }

    tracing::debug!(carrier = id, unit, "Unit picked up");
}

fn carry_cargo(ctx: &mut SimContext<'_>, id: EntityId, carryall: &Carryall) {
    let Some(location) = ctx.registry.get(id).map(|o| o.location) else {
        return;
    };

    let aboard: Vec<EntityId> = carryall
        .cargo
        .iter()
        .copied()
        .filter(|&unit| {
            ctx.registry
                .get_live(unit)
                .is_some_and(|o| o.container == Some(id))
        })
        .collect();
    if aboard.is_empty() {
        release(ctx, id);
        return;
    }

    let drop_at = carryall
        .deploy_position
        .filter(|&p| ctx.map.tile_exists(p))
        .or(carryall.fallback_position)
        .unwrap_or(location);

    if location != drop_at {
        if let Some(object) = ctx.registry.get_mut(id) {
            object.set_destination(drop_at);
        }
        return;
    }

    for unit in aboard {
        let spot = ctx.landing_spot(drop_at, unit);
        if let Some(object) = ctx.registry.get_mut(unit) {
            object.location = spot;
            object.container = None;
            object.clear_path();
            if let Some(ground) = object.ground.as_mut() {
                ground.book_carrier(None);
            }
        }
        tracing::debug!(carrier = id, unit, ?spot, "Cargo delivered");
        ctx.emit(SimEvent::CargoDelivered {
            carrier: id,
            unit,
            at: spot,
        });
    }

    if let Some(object) = ctx.registry.get_mut(id) {
        object.clear_path();
        if let Some(carryall) = object.carryall.as_mut() {
            carryall.finish();
        }
    }
}

fn release(ctx: &mut SimContext<'_>, id: EntityId) {
    if let Some(object) = ctx.registry.get_mut(id) {
        object.clear_path();
        if let Some(carryall) = object.carryall.as_mut() {
            carryall.finish();
        }
    }
    ctx.emit(SimEvent::CarrierReleased { carrier: id });
}
