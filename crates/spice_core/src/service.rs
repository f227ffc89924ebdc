//! Shared behaviour of single-occupant service structures.
//!
//! Refineries and repair yards follow the same protocol: a unit books the
//! provider with the lowest booking count, travels there, enters when the
//! slot is free, and is released by a carryall or on foot once serviced.

use crate::booking::BookingError;
use crate::carrier;
use crate::components::{EntityId, ObjectKind};
use crate::context::{SimContext, SimEvent};
use crate::factions::HouseId;
use crate::math::{Coord, Fixed};
use crate::registry::ObjectRegistry;

/// Provider of `kind` owned by `owner` with the fewest bookings.
///
/// Ties go to the nearer provider, then to the one registered first.
#[must_use]
pub fn least_booked_provider(
    registry: &ObjectRegistry,
    owner: HouseId,
    kind: ObjectKind,
    from: Coord,
) -> Option<EntityId> {
    let mut best: Option<(EntityId, u32, Fixed)> = None;

    for object in registry.iter_kind(kind) {
        if object.owner != owner {
            continue;
        }
        let Some(slot) = object.service else {
            continue;
        };
        let count = slot.booking_count();
        let distance = object.distance_from(from);
        let better = best.map_or(true, |(_, c, d)| count < c || (count == c && distance < d));
        if better {
            best = Some((object.id, count, distance));
        }
    }

    best.map(|(id, _, _)| id)
}

/// Move `unit` into `structure`.
///
/// A slot held by an occupant that no longer exists is reclaimed first.
/// On success the unit's booking on the structure is consumed.
///
/// # Errors
///
/// Returns [`BookingError::Occupied`] if another unit is being serviced and
/// [`BookingError::NoSlot`] if `structure` is not a service provider.
pub fn assign_occupant(
    ctx: &mut SimContext<'_>,
    structure: EntityId,
    unit: EntityId,
) -> Result<(), BookingError> {
    let no_slot = BookingError::NoSlot {
        provider: structure,
    };
    let (current, kind) = ctx
        .registry
        .get_live(structure)
        .and_then(|s| s.service.map(|slot| (slot, s.kind)))
        .ok_or(no_slot)?;
    let reclaim = current.is_busy() && current.is_available(ctx.registry);

    let slot = ctx
        .registry
        .get_mut(structure)
        .and_then(|s| s.service.as_mut())
        .ok_or(no_slot)?;
    if reclaim {
        tracing::debug!(structure, "Reclaiming slot from a lost occupant");
        slot.unbook();
    }
    slot.try_book(unit)?;
    slot.remove_booking();
    slot.working = false;

    if let Some(lost) = current.occupant().id().filter(|_| reclaim) {
        drop_stale_pickups(ctx, structure, lost);
    }

    if let Some(object) = ctx.registry.get_mut(unit) {
        object.container = Some(structure);
        object.clear_path();
        if let Some(ground) = object.ground.as_mut() {
            ground.set_repair_yard(None);
        }
        if kind == ObjectKind::Refinery {
            if let Some(harvester) = object.harvester.as_mut() {
                harvester.on_entered_refinery();
            }
        }
    }

    tracing::debug!(structure, unit, tick = ctx.tick, "Unit entered service structure");
    Ok(())
}

/// Release the occupant of `structure`.
///
/// With a live `carrier` the unit is handed to it, to be flown back to the
/// unit's guard point. Otherwise the unit is put next to the structure and
/// walks back. Returns `false` without touching anything when there is no
/// live occupant.
pub fn deploy_occupant(
    ctx: &mut SimContext<'_>,
    structure: EntityId,
    carrier: Option<EntityId>,
) -> bool {
    let Some(building) = ctx.registry.get(structure) else {
        return false;
    };
    let Some(slot) = building.service else {
        return false;
    };
    let Some(unit) = slot.occupant().live_id(ctx.registry) else {
        return false;
    };
    let (location, size, owner) = (building.location, building.kind.size(), building.owner);
    let Some(guard) = ctx.registry.get(unit).map(|o| o.guard_point) else {
        return false;
    };

    if let Some(slot) = ctx.registry.get_mut(structure).and_then(|s| s.service.as_mut()) {
        slot.unbook();
    }
    if slot.repair_notified {
        if let Some(house) = ctx.houses.get_mut(owner) {
            house.notify_repair_deactivated();
        }
    }

    let carrier = carrier.filter(|&c| {
        ctx.registry
            .get_live(c)
            .is_some_and(|o| o.carryall.is_some())
    });

    match carrier {
        Some(carrier) => {
            if let Some(object) = ctx.registry.get_mut(carrier) {
                object.clear_path();
                if let Some(carryall) = object.carryall.as_mut() {
                    carryall.give_cargo(unit, guard, location);
                }
            }
            if let Some(object) = ctx.registry.get_mut(unit) {
                object.container = Some(carrier);
                object.clear_path();
                if let Some(ground) = object.ground.as_mut() {
                    ground.book_carrier(Some(carrier));
                }
            }
        }
        None => {
            let occupied = ctx.occupied_tiles(Some(unit));
            let spot = ctx.map.find_deploy_spot(location, guard, size, &occupied);
            if let Some(object) = ctx.registry.get_mut(unit) {
                object.location = spot;
                object.container = None;
                object.set_destination(guard);
                if let Some(ground) = object.ground.as_mut() {
                    ground.book_carrier(None);
                }
            }
        }
    }

    if let Some(harvester) = ctx.registry.get_mut(unit).and_then(|o| o.harvester.as_mut()) {
        harvester.on_deployed();
    }

    tracing::info!(structure, unit, ?carrier, "Unit deployed");
    ctx.emit(SimEvent::UnitDeployed {
        structure,
        unit,
        carrier,
    });
    true
}

/// Service finished: book the nearest free carryall for `unit`, else walk.
pub(crate) fn release_serviced_unit(ctx: &mut SimContext<'_>, structure: EntityId, unit: EntityId) {
    let Some((owner, location)) = ctx.registry.get(structure).map(|s| (s.owner, s.location)) else {
        return;
    };

    let Some(carrier) = carrier::dispatch_carrier(ctx.registry, owner, location, structure) else {
        tracing::debug!(structure, unit, "No carrier free, deploying on foot");
        deploy_occupant(ctx, structure, None);
        return;
    };

    if let Some(carryall) = ctx.registry.get_mut(carrier).and_then(|o| o.carryall.as_mut()) {
        carryall.set_passenger(unit);
    }
    if let Some(ground) = ctx.registry.get_mut(unit).and_then(|o| o.ground.as_mut()) {
        ground.book_carrier(Some(carrier));
    }
    ctx.emit(SimEvent::CarrierBooked {
        carrier,
        requester: structure,
    });
}

fn drop_stale_pickups(ctx: &mut SimContext<'_>, structure: EntityId, lost: EntityId) {
    for carrier in carrier::cancel_pickups(ctx.registry, structure, lost) {
        ctx.emit(SimEvent::CarrierReleased { carrier });
    }
}

/// Clear a slot whose occupant no longer exists. Returns the live occupant.
pub(crate) fn live_occupant(ctx: &mut SimContext<'_>, structure: EntityId) -> Option<EntityId> {
    let slot = ctx.registry.get(structure).and_then(|s| s.service)?;
    if !slot.is_busy() {
        return None;
    }
    let occupant = slot.occupant().live_id(ctx.registry);
    if occupant.is_none() {
        tracing::debug!(structure, "Occupant lost, freeing slot");
        if let Some(slot) = ctx.registry.get_mut(structure).and_then(|s| s.service.as_mut()) {
            slot.unbook();
        }
        if let Some(lost) = slot.occupant().id() {
            drop_stale_pickups(ctx, structure, lost);
        }
    }
    occupant
}
