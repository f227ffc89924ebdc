//! Pickup and repair-trip state shared by all ground units.

use serde::{Deserialize, Serialize};

use crate::carrier;
use crate::components::{EntityId, ObjectKind};
use crate::context::{SimContext, SimEvent};
use crate::harvester;
use crate::math::{Coord, Fixed};
use crate::reference::ObjectRef;
use crate::registry::ObjectRegistry;
use crate::service;

/// Carrier booking and repair-trip state of a ground unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroundUnit {
    awaiting_pickup: bool,
    booked_carrier: Option<EntityId>,
    repair_yard: ObjectRef,
}

impl GroundUnit {
    /// Unit with no carrier and no repair trip.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            awaiting_pickup: false,
            booked_carrier: None,
            repair_yard: ObjectRef::NONE,
        }
    }

    /// Record the carrier coming for this unit, or cancel with `None`.
    pub fn book_carrier(&mut self, carrier: Option<EntityId>) {
        self.booked_carrier = carrier;
        self.awaiting_pickup = carrier.is_some();
    }

    /// Whether a carrier is on its way.
    #[must_use]
    pub const fn is_awaiting_pickup(&self) -> bool {
        self.awaiting_pickup
    }

    /// The carrier on its way, if any.
    #[must_use]
    pub const fn booked_carrier(&self) -> Option<EntityId> {
        self.booked_carrier
    }

    /// Repair yard this unit is heading to.
    #[must_use]
    pub const fn repair_yard(&self) -> ObjectRef {
        self.repair_yard
    }

    pub(crate) fn set_repair_yard(&mut self, yard: Option<EntityId>) {
        self.repair_yard.point_to(yard);
    }
}

/// Forget a carrier booking that no longer holds.
///
/// The booking is stale once the carrier is gone or has stopped serving
/// this unit (directly, as cargo, or through the structure holding it).
pub fn refresh_pickup(registry: &mut ObjectRegistry, id: EntityId) {
    let Some(object) = registry.get(id) else {
        return;
    };
    let Some(carrier) = object.ground.and_then(|g| g.booked_carrier) else {
        return;
    };
    let container = object.container;

    let still_booked = registry
        .get_live(carrier)
        .and_then(|c| c.carryall.as_ref())
        .is_some_and(|c| {
            let for_this_unit = c.passenger().id().map_or(true, |p| p == id);
            c.serves(id)
                || (c.is_booked()
                    && for_this_unit
                    && container.is_some()
                    && c.fellow().id() == container)
        });

    if !still_booked {
        tracing::debug!(unit = id, carrier, "Carrier booking went stale");
        if let Some(ground) = registry.get_mut(id).and_then(|o| o.ground.as_mut()) {
            ground.book_carrier(None);
        }
    }
}

/// Ask for a carryall to fly the unit to `destination`.
///
/// Only worth it for long trips. Returns `true` if a carrier is (already)
/// coming; the caller walks otherwise.
pub fn request_carryall_drop(ctx: &mut SimContext<'_>, id: EntityId, destination: Coord) -> bool {
    let Some(object) = ctx.registry.get(id) else {
        return false;
    };
    let Some(ground) = object.ground else {
        return false;
    };
    if ground.is_awaiting_pickup() {
        return true;
    }
    if !object.is_on_map() {
        return false;
    }

    let location = object.location;
    let owner = object.owner;
    let lift = Fixed::from_num(ctx.rules.min_carryall_lift_distance);
    if location.block_distance(destination) < lift {
        return false;
    }

    let Some(carrier) = carrier::dispatch_carrier(ctx.registry, owner, location, id) else {
        return false;
    };
    if let Some(carryall) = ctx.registry.get_mut(carrier).and_then(|o| o.carryall.as_mut()) {
        carryall.set_drop(destination, location);
    }
    if let Some(object) = ctx.registry.get_mut(id) {
        object.clear_path();
        if let Some(ground) = object.ground.as_mut() {
            ground.book_carrier(Some(carrier));
        }
    }
    ctx.emit(SimEvent::CarrierBooked {
        carrier,
        requester: id,
    });
    true
}

/// Send a ground unit to the least busy repair yard of its owner.
///
/// Returns `false` if the unit cannot travel or no repair yard exists.
pub fn order_repair(ctx: &mut SimContext<'_>, id: EntityId) -> bool {
    let Some(object) = ctx.registry.get_live(id) else {
        return false;
    };
    let Some(ground) = object.ground else {
        return false;
    };
    if !object.is_on_map() {
        return false;
    }
    if ground.repair_yard.is_live(ctx.registry) {
        return true;
    }

    let (owner, location) = (object.owner, object.location);
    let Some(yard) =
        service::least_booked_provider(ctx.registry, owner, ObjectKind::RepairYard, location)
    else {
        return false;
    };

    if object.harvester.is_some() {
        harvester::cancel_refinery_trip(ctx.registry, id);
    }

    let Some(target) = ctx.registry.get_mut(yard).map(|y| {
        if let Some(slot) = y.service.as_mut() {
            slot.add_booking();
        }
        y.closest_tile(location)
    }) else {
        return false;
    };
    if let Some(ground) = ctx.registry.get_mut(id).and_then(|o| o.ground.as_mut()) {
        ground.set_repair_yard(Some(yard));
    }

    tracing::info!(unit = id, yard, "Heading for repairs");
    if !request_carryall_drop(ctx, id, target) {
        if let Some(object) = ctx.registry.get_mut(id) {
            object.set_destination(target);
        }
    }
    true
}

/// Per-tick ground unit upkeep: carrier staleness and repair trips.
pub fn update(ctx: &mut SimContext<'_>, id: EntityId) {
    refresh_pickup(ctx.registry, id);
    continue_repair_trip(ctx, id);
}

fn continue_repair_trip(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(object) = ctx.registry.get(id) else {
        return;
    };
    let Some(ground) = object.ground else {
        return;
    };
    let Some(yard_id) = ground.repair_yard.id() else {
        return;
    };
    if !object.is_on_map() || ground.is_awaiting_pickup() {
        return;
    }
    let (location, moving) = (object.location, object.is_moving());

    let Some(yard) = ctx.registry.get_live(yard_id) else {
        tracing::debug!(unit = id, yard = yard_id, "Repair yard lost");
        if let Some(ground) = ctx.registry.get_mut(id).and_then(|o| o.ground.as_mut()) {
            ground.set_repair_yard(None);
        }
        return;
    };

    if yard.is_adjacent(location) {
        if let Err(error) = service::assign_occupant(ctx, yard_id, id) {
            tracing::trace!(unit = id, %error, "Waiting for repair yard");
            if let Some(object) = ctx.registry.get_mut(id) {
                object.clear_path();
            }
        }
    } else if !moving {
        let target = yard.closest_tile(location);
        if let Some(object) = ctx.registry.get_mut(id) {
            object.set_destination(target);
        }
    }
}
