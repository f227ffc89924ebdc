//! Repair yard: heals the unit inside at the owner's expense.

use crate::booking::BookingError;
use crate::components::{EntityId, ObjectKind};
use crate::context::{SimContext, SimEvent};
use crate::service;

fn is_repair_yard(ctx: &SimContext<'_>, id: EntityId) -> bool {
    ctx.registry
        .get(id)
        .is_some_and(|o| o.kind == ObjectKind::RepairYard)
}

/// Take `unit` in for repairs.
///
/// # Errors
///
/// Fails if the yard already serves another unit or `yard` is not a repair
/// yard.
pub fn assign_repair_unit(
    ctx: &mut SimContext<'_>,
    yard: EntityId,
    unit: EntityId,
) -> Result<(), BookingError> {
    if !is_repair_yard(ctx, yard) {
        return Err(BookingError::NoSlot { provider: yard });
    }
    service::assign_occupant(ctx, yard, unit)
}

/// Release the unit inside, into `carrier` if given.
///
/// Returns `false` with no changes if no live unit is inside.
pub fn deploy_repair_unit(ctx: &mut SimContext<'_>, yard: EntityId, carrier: Option<EntityId>) -> bool {
    is_repair_yard(ctx, yard) && service::deploy_occupant(ctx, yard, carrier)
}

/// Per-tick repair yard behaviour.
pub fn update(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(occupant) = service::live_occupant(ctx, id) else {
        return;
    };
    let Some((owner, slot)) = ctx
        .registry
        .get(id)
        .and_then(|o| o.service.map(|slot| (o.owner, slot)))
    else {
        return;
    };
    let Some(unit) = ctx.registry.get(occupant) else {
        return;
    };
    let damaged = !unit.health.is_full();
    let awaiting = unit.ground.is_some_and(|g| g.is_awaiting_pickup());

    if !damaged {
        if awaiting {
            return;
        }
        if slot.is_working() {
            ctx.emit(SimEvent::RepairCompleted {
                yard: id,
                unit: occupant,
            });
            if let Some(slot) = ctx.registry.get_mut(id).and_then(|o| o.service.as_mut()) {
                slot.working = false;
            }
        }
        service::release_serviced_unit(ctx, id, occupant);
        return;
    }

    let cost = ctx.rules.repair_cost;
    let step = ctx.rules.repair_health_step;
    let Some(house) = ctx.houses.get_mut(owner) else {
        return;
    };

    if house.can_afford(cost) {
        house.take_credits(cost);
        let resumed = !slot.repair_notified || slot.is_repair_paused();
        if resumed {
            house.notify_repair_activated();
        }
        if let Some(unit) = ctx.registry.get_mut(occupant) {
            unit.health.heal(step);
        }
        if let Some(slot) = ctx.registry.get_mut(id).and_then(|o| o.service.as_mut()) {
            slot.repair_notified = true;
            slot.repair_paused = false;
            slot.working = true;
        }
        if resumed {
            tracing::debug!(yard = id, unit = occupant, "Repairs started");
            ctx.emit(SimEvent::RepairActivated { yard: id });
        }
    } else if !slot.is_repair_paused() {
        house.notify_repair_deactivated();
        if let Some(slot) = ctx.registry.get_mut(id).and_then(|o| o.service.as_mut()) {
            slot.repair_paused = true;
            slot.working = false;
        }
        tracing::warn!(yard = id, house = ?owner, "Not enough credits, repairs paused");
        ctx.emit(SimEvent::RepairPaused { yard: id });
    }
}
