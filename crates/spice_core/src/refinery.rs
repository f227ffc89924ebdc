//! Refinery: empties harvesters into the owner's credits.

use crate::booking::BookingError;
use crate::components::{EntityId, ObjectKind};
use crate::context::{SimContext, SimEvent};
use crate::harvester;
use crate::math::Fixed;
use crate::service;

fn is_refinery(ctx: &SimContext<'_>, id: EntityId) -> bool {
    ctx.registry
        .get(id)
        .is_some_and(|o| o.kind == ObjectKind::Refinery)
}

/// Take `harvester` in for unloading.
///
/// # Errors
///
/// Fails if the refinery already serves another harvester or `refinery` is
/// not a refinery.
pub fn assign_harvester(
    ctx: &mut SimContext<'_>,
    refinery: EntityId,
    harvester: EntityId,
) -> Result<(), BookingError> {
    if !is_refinery(ctx, refinery) {
        return Err(BookingError::NoSlot { provider: refinery });
    }
    service::assign_occupant(ctx, refinery, harvester)
}

/// Release the harvester inside, into `carrier` if given.
///
/// Returns `false` with no changes if no live harvester is inside.
pub fn deploy_harvester(
    ctx: &mut SimContext<'_>,
    refinery: EntityId,
    carrier: Option<EntityId>,
) -> bool {
    is_refinery(ctx, refinery) && service::deploy_occupant(ctx, refinery, carrier)
}

/// Per-tick refinery behaviour.
pub fn update(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(occupant) = service::live_occupant(ctx, id) else {
        return;
    };
    let Some(refinery) = ctx.registry.get(id) else {
        return;
    };
    let (owner, health) = (refinery.owner, refinery.health);

    let Some(unit) = ctx.registry.get(occupant) else {
        return;
    };
    let Some(spice) = unit.harvester.as_ref().map(harvester::Harvester::spice) else {
        return;
    };
    let awaiting = unit.ground.is_some_and(|g| g.is_awaiting_pickup());

    if spice <= Fixed::ZERO {
        if awaiting {
            return;
        }
        if let Some(slot) = ctx.registry.get_mut(id).and_then(|o| o.service.as_mut()) {
            slot.working = false;
        }
        service::release_serviced_unit(ctx, id, occupant);
        return;
    }

    if ctx.houses.get(owner).is_some_and(|h| h.is_storage_full()) {
        tracing::warn!(refinery = id, house = ?owner, "Spice storage full, releasing harvester");
        ctx.emit(SimEvent::StorageFull { house: owner });
        deploy_harvester(ctx, id, None);
        return;
    }

    let mut rate = harvester::extraction_rate(ctx.rules.refinery_extraction_rate, &health);
    if let Some(house) = ctx.houses.get(owner) {
        rate = rate.min(house.available_storage());
    }

    let Some(amount) = ctx
        .registry
        .get_mut(occupant)
        .and_then(|o| o.harvester.as_mut())
        .map(|h| h.extract_spice(rate))
    else {
        return;
    };
    match ctx.houses.get_mut(owner) {
        Some(house) => house.add_credits(amount, true),
        None => tracing::warn!(house = ?owner, "Refined spice for a house without economy"),
    }
    if let Some(slot) = ctx.registry.get_mut(id).and_then(|o| o.service.as_mut()) {
        slot.working = true;
    }

    ctx.emit(SimEvent::SpiceRefined {
        refinery: id,
        harvester: occupant,
        amount,
    });
}
