//! End-to-end booking, transport and service scenarios.

use spice_core::prelude::*;
use spice_test_utils::fixtures::{
    fixed, open_map, spawn, spice_field, two_house_sim, ENEMY, PLAYER,
};
use spice_test_utils::init_tracing;

/// Rules with a small harvester hold so trips finish quickly.
fn quick_rules() -> GameRules {
    GameRules {
        harvester_capacity: fixed(10),
        harvest_rate: fixed(1),
        ..GameRules::default()
    }
}

/// Tick until `done` sees an event, collecting everything emitted.
fn run_until(sim: &mut Simulation, max_ticks: u32, done: impl Fn(&SimEvent) -> bool) -> Vec<SimEvent> {
    let mut log = Vec::new();
    for _ in 0..max_ticks {
        let events = sim.tick().events;
        let finished = events.iter().any(&done);
        log.extend(events);
        if finished {
            return log;
        }
    }
    panic!("scenario did not finish in {max_ticks} ticks: {log:?}");
}

fn position(log: &[SimEvent], wanted: impl Fn(&SimEvent) -> bool) -> usize {
    log.iter()
        .position(wanted)
        .unwrap_or_else(|| panic!("event missing from {log:?}"))
}

#[test]
fn test_full_harvester_refines_and_walks_back() {
    init_tracing();
    let mut map = open_map(40, 40);
    spice_field(&mut map, Coord::new(12, 4), 2, fixed(5));
    let mut sim = two_house_sim(map, quick_rules());

    let refinery = spawn(&mut sim, ObjectKind::Refinery, PLAYER, Coord::new(4, 4));
    let harvester = spawn(&mut sim, ObjectKind::Harvester, PLAYER, Coord::new(8, 4));
    // Carryalls the dispatcher must pass over: parked, and foreign
    let parked = spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(6, 8));
    sim.set_attack_mode(parked, AttackMode::Stop).unwrap();
    spawn(&mut sim, ObjectKind::Carryall, ENEMY, Coord::new(5, 6));
    sim.order_harvest(harvester, Coord::new(12, 4)).unwrap();

    let log = run_until(&mut sim, 400, |e| matches!(e, SimEvent::UnitDeployed { .. }));

    assert!(log
        .iter()
        .any(|e| matches!(e, SimEvent::SpiceRefined { refinery: r, harvester: h, .. } if *r == refinery && *h == harvester)));
    assert_eq!(
        log.last(),
        Some(&SimEvent::UnitDeployed {
            structure: refinery,
            unit: harvester,
            carrier: None,
        })
    );
    assert!(!log.iter().any(|e| matches!(e, SimEvent::CarrierBooked { .. })));
    assert!(!log.iter().any(|e| matches!(e, SimEvent::StorageFull { .. })));

    let house = sim.houses().get(PLAYER).unwrap();
    assert_eq!(house.refined_total(), fixed(10));
    assert_eq!(sim.spice_of(harvester), Some(Fixed::ZERO));

    let object = sim.get_object(harvester).unwrap();
    assert!(object.is_on_map());
    let slot = sim.get_object(refinery).unwrap().service.unwrap();
    assert!(!slot.is_busy());
    assert_eq!(slot.booking_count(), 0);
}

#[test]
fn test_emptied_harvester_is_collected_by_free_carryall() {
    init_tracing();
    let mut map = open_map(40, 40);
    spice_field(&mut map, Coord::new(9, 4), 2, fixed(5));
    let mut sim = two_house_sim(map, quick_rules());

    let refinery = spawn(&mut sim, ObjectKind::Refinery, PLAYER, Coord::new(4, 4));
    let harvester = spawn(&mut sim, ObjectKind::Harvester, PLAYER, Coord::new(8, 4));
    let carrier = spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(0, 20));
    sim.order_harvest(harvester, Coord::new(9, 4)).unwrap();

    let log = run_until(&mut sim, 400, |e| matches!(e, SimEvent::UnitDeployed { .. }));

    let last_refined = log
        .iter()
        .rposition(|e| matches!(e, SimEvent::SpiceRefined { .. }))
        .expect("spice was refined");
    let booked = position(&log, |e| {
        *e == SimEvent::CarrierBooked {
            carrier,
            requester: refinery,
        }
    });
    assert!(last_refined < booked);
    assert!(!log.iter().any(|e| matches!(e, SimEvent::StorageFull { .. })));
    assert_eq!(
        log.last(),
        Some(&SimEvent::UnitDeployed {
            structure: refinery,
            unit: harvester,
            carrier: Some(carrier),
        })
    );
    assert_eq!(sim.houses().get(PLAYER).unwrap().refined_total(), fixed(10));
    assert_eq!(sim.get_object(harvester).unwrap().container, Some(carrier));
}

#[test]
fn test_pickup_for_destroyed_occupant_leaves_next_harvester_inside() {
    init_tracing();
    let mut map = open_map(40, 40);
    spice_field(&mut map, Coord::new(9, 4), 2, fixed(5));
    let mut sim = two_house_sim(map, quick_rules());

    let refinery = spawn(&mut sim, ObjectKind::Refinery, PLAYER, Coord::new(4, 4));
    let carrier = spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(4, 38));
    let harvesters = [
        spawn(&mut sim, ObjectKind::Harvester, PLAYER, Coord::new(8, 4)),
        spawn(&mut sim, ObjectKind::Harvester, PLAYER, Coord::new(8, 5)),
    ];
    for harvester in harvesters {
        sim.order_harvest(harvester, Coord::new(9, 4)).unwrap();
    }

    run_until(&mut sim, 400, |e| {
        *e == SimEvent::CarrierBooked {
            carrier,
            requester: refinery,
        }
    });
    let slot = sim.get_object(refinery).unwrap().service.unwrap();
    let first = slot.occupant().id().expect("emptied harvester waits inside");
    let second = harvesters
        .into_iter()
        .find(|&h| h != first)
        .expect("two harvesters");

    sim.destroy(first).unwrap();
    let events = sim.tick();
    assert_eq!(events.destroyed, vec![first]);
    assert!(events
        .events
        .contains(&SimEvent::CarrierReleased { carrier }));
    assert!(!sim
        .get_object(carrier)
        .unwrap()
        .carryall
        .as_ref()
        .unwrap()
        .is_booked());

    run_until(&mut sim, 400, |e| {
        matches!(e, SimEvent::UnitDeployed { unit, .. } if *unit == second)
    });
    assert_eq!(sim.spice_of(second), Some(Fixed::ZERO));
    assert_eq!(sim.houses().get(PLAYER).unwrap().refined_total(), fixed(20));
}

#[test]
fn test_far_spice_site_uses_carryall_both_ways() {
    init_tracing();
    let mut map = open_map(40, 40);
    map.set_spice(Coord::new(30, 30), fixed(4));
    let rules = GameRules {
        harvester_capacity: fixed(4),
        ..quick_rules()
    };
    let mut sim = two_house_sim(map, rules);

    let refinery = spawn(&mut sim, ObjectKind::Refinery, PLAYER, Coord::new(2, 2));
    let carrier = spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(0, 10));
    let harvester = spawn(&mut sim, ObjectKind::Harvester, PLAYER, Coord::new(30, 28));
    sim.order_harvest(harvester, Coord::new(30, 30)).unwrap();

    let log = run_until(&mut sim, 600, |e| {
        matches!(e, SimEvent::CargoDelivered { unit, at, .. } if *unit == harvester && *at == Coord::new(30, 30))
    });

    let outbound = position(&log, |e| {
        *e == SimEvent::CarrierBooked {
            carrier,
            requester: harvester,
        }
    });
    let delivered = position(&log, |e| {
        matches!(e, SimEvent::CargoDelivered { carrier: c, unit, .. } if *c == carrier && *unit == harvester)
    });
    let refined = position(&log, |e| matches!(e, SimEvent::SpiceRefined { .. }));
    let return_booked = position(&log, |e| {
        *e == SimEvent::CarrierBooked {
            carrier,
            requester: refinery,
        }
    });
    let deployed = position(&log, |e| {
        *e == SimEvent::UnitDeployed {
            structure: refinery,
            unit: harvester,
            carrier: Some(carrier),
        }
    });

    assert!(outbound < delivered);
    assert!(delivered < refined);
    assert!(refined < return_booked);
    assert!(return_booked < deployed);
    assert_eq!(sim.houses().get(PLAYER).unwrap().refined_total(), fixed(4));

    let object = sim.get_object(harvester).unwrap();
    assert_eq!(object.location, Coord::new(30, 30));
    assert!(!object.ground.unwrap().is_awaiting_pickup());
    assert!(!sim.get_object(carrier).unwrap().carryall.as_ref().unwrap().is_booked());
}

#[test]
fn test_full_storage_sends_harvester_out_with_spice_left() {
    init_tracing();
    let mut map = open_map(40, 40);
    spice_field(&mut map, Coord::new(12, 4), 2, fixed(5));
    let mut sim = two_house_sim(map, quick_rules());
    sim.houses_mut()
        .get_mut(PLAYER)
        .unwrap()
        .set_capacity(fixed(1003));

    let refinery = spawn(&mut sim, ObjectKind::Refinery, PLAYER, Coord::new(4, 4));
    let harvester = spawn(&mut sim, ObjectKind::Harvester, PLAYER, Coord::new(8, 4));
    sim.order_harvest(harvester, Coord::new(12, 4)).unwrap();

    let log = run_until(&mut sim, 400, |e| matches!(e, SimEvent::UnitDeployed { .. }));

    let full = position(&log, |e| *e == SimEvent::StorageFull { house: PLAYER });
    let deployed = position(&log, |e| {
        *e == SimEvent::UnitDeployed {
            structure: refinery,
            unit: harvester,
            carrier: None,
        }
    });
    assert!(full < deployed);

    let house = sim.houses().get(PLAYER).unwrap();
    assert_eq!(house.refined_total(), fixed(3));
    assert!(house.is_storage_full());
    assert_eq!(sim.spice_of(harvester), Some(fixed(7)));
}

#[test]
fn test_move_order_books_first_of_equally_near_carriers() {
    init_tracing();
    let mut sim = two_house_sim(open_map(32, 32), GameRules::default());
    spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(5, 0));
    let first_near = spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(3, 0));
    spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(0, 3));
    let tank = spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(0, 0));

    sim.move_to(tank, Coord::new(20, 0)).unwrap();
    let events = sim.tick().events;

    assert_eq!(
        events.first(),
        Some(&SimEvent::CarrierBooked {
            carrier: first_near,
            requester: tank,
        })
    );
    let ground = sim.get_object(tank).unwrap().ground.unwrap();
    assert_eq!(ground.booked_carrier(), Some(first_near));
    assert_eq!(
        sim.registry()
            .iter_kind(ObjectKind::Carryall)
            .filter(|o| o.carryall.as_ref().is_some_and(Carryall::is_booked))
            .count(),
        1
    );

    let log = run_until(&mut sim, 100, |e| matches!(e, SimEvent::CargoDelivered { .. }));
    assert!(log.contains(&SimEvent::CargoDelivered {
        carrier: first_near,
        unit: tank,
        at: Coord::new(20, 0),
    }));
}

#[test]
fn test_short_move_walks_without_carrier() {
    let mut sim = two_house_sim(open_map(32, 32), GameRules::default());
    spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(1, 0));
    let tank = spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(0, 0));

    sim.move_to(tank, Coord::new(9, 0)).unwrap();
    let events = sim.tick().events;

    assert!(events.is_empty());
    assert_eq!(sim.get_object(tank).unwrap().location, Coord::new(1, 0));
}

#[test]
fn test_destroyed_carrier_frees_waiting_unit() {
    init_tracing();
    let mut sim = two_house_sim(open_map(32, 32), GameRules::default());
    let carrier = spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(6, 0));
    let tank = spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(0, 0));

    sim.move_to(tank, Coord::new(20, 0)).unwrap();
    assert!(sim.get_object(tank).unwrap().ground.unwrap().is_awaiting_pickup());

    sim.destroy(carrier).unwrap();
    let events = sim.tick();
    assert_eq!(events.destroyed, vec![carrier]);

    let ground = sim.get_object(tank).unwrap().ground.unwrap();
    assert!(!ground.is_awaiting_pickup());
    assert_eq!(ground.booked_carrier(), None);

    sim.move_to(tank, Coord::new(20, 0)).unwrap();
    sim.tick();
    assert_eq!(sim.get_object(tank).unwrap().location, Coord::new(1, 0));
}

#[test]
fn test_destroyed_carryall_takes_cargo_down() {
    let mut sim = two_house_sim(open_map(32, 32), GameRules::default());
    let carrier = spawn(&mut sim, ObjectKind::Carryall, PLAYER, Coord::new(0, 0));
    let tank = spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(0, 0));

    sim.move_to(tank, Coord::new(25, 0)).unwrap();
    sim.tick();
    assert_eq!(sim.get_object(tank).unwrap().container, Some(carrier));

    sim.destroy(carrier).unwrap();
    let events = sim.tick();
    assert_eq!(events.destroyed, vec![carrier, tank]);
    assert!(sim.registry().is_empty());
}

#[test]
fn test_repair_pauses_when_broke_and_resumes() {
    init_tracing();
    let mut sim = two_house_sim(open_map(32, 32), GameRules::default());
    let yard = spawn(&mut sim, ObjectKind::RepairYard, PLAYER, Coord::new(10, 10));
    let tank = spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(9, 10));
    sim.apply_damage(tank, 10).unwrap();
    sim.houses_mut()
        .get_mut(PLAYER)
        .unwrap()
        .take_credits(fixed(997));

    assert!(sim.order_repair(tank).unwrap());
    let log = run_until(&mut sim, 20, |e| matches!(e, SimEvent::RepairPaused { .. }));

    assert_eq!(log.first(), Some(&SimEvent::RepairActivated { yard }));
    assert_eq!(sim.get_object(tank).unwrap().health.current, 193);
    assert_eq!(sim.get_object(tank).unwrap().container, Some(yard));
    assert!(!sim.houses().get(PLAYER).unwrap().is_repair_active());

    for _ in 0..5 {
        assert!(sim.tick().events.is_empty());
    }

    sim.houses_mut()
        .get_mut(PLAYER)
        .unwrap()
        .add_credits(fixed(100), false);
    let log = run_until(&mut sim, 40, |e| matches!(e, SimEvent::UnitDeployed { .. }));

    assert_eq!(log.first(), Some(&SimEvent::RepairActivated { yard }));
    assert!(log.contains(&SimEvent::RepairCompleted { yard, unit: tank }));

    let house = sim.houses().get(PLAYER).unwrap();
    assert_eq!(house.repair_activations(), 2);
    assert!(!house.is_repair_active());
    assert_eq!(house.stored_credits(), fixed(93));

    let object = sim.get_object(tank).unwrap();
    assert!(object.health.is_full());
    assert!(object.is_on_map());
}

#[test]
fn test_second_unit_waits_for_busy_yard() {
    let mut sim = two_house_sim(open_map(32, 32), GameRules::default());
    let yard = spawn(&mut sim, ObjectKind::RepairYard, PLAYER, Coord::new(10, 10));
    let first = spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(9, 10));
    let second = spawn(&mut sim, ObjectKind::Tank, PLAYER, Coord::new(9, 11));
    sim.apply_damage(first, 5).unwrap();
    sim.apply_damage(second, 5).unwrap();

    assert!(sim.order_repair(first).unwrap());
    assert!(sim.order_repair(second).unwrap());
    assert_eq!(sim.get_object(yard).unwrap().service.unwrap().booking_count(), 2);

    sim.tick();
    assert_eq!(sim.get_object(first).unwrap().container, Some(yard));
    assert!(sim.get_object(second).unwrap().is_on_map());

    let log = run_until(&mut sim, 60, |e| {
        matches!(e, SimEvent::RepairCompleted { unit, .. } if *unit == second)
    });
    assert!(log.contains(&SimEvent::RepairCompleted { yard, unit: first }));
    assert!(sim.get_object(second).unwrap().health.is_full());
}
