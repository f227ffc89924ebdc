//! Targeting and single-shot weapons (tanks and turrets).
//!
//! Turrets remember the target they dropped. When an air threat shows up
//! while a ground unit is still around, the two are swapped so the ground
//! unit stays primary and the aircraft can still be hit by a secondary shot
//! when the turret happens to face it.

use serde::{Deserialize, Serialize};

use crate::components::{AttackMode, EntityId, ObjectKind};
use crate::config::WeaponStats;
use crate::context::SimContext;
use crate::economy::HouseTable;
use crate::factions::TeamId;
use crate::map::MapOracle;
use crate::math::{Coord, Facing, Fixed};
use crate::projectile::ProjectileRequest;
use crate::reference::ObjectRef;
use crate::registry::{GameObject, ObjectRegistry};

/// Targeting state and weapon timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Targeting {
    target: ObjectRef,
    old_target: ObjectRef,
    weapon_timer: i32,
    attack_position: Option<Coord>,
    forced: bool,
}

impl Targeting {
    /// Ready to fire, no target.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            target: ObjectRef::NONE,
            old_target: ObjectRef::NONE,
            weapon_timer: 0,
            attack_position: None,
            forced: false,
        }
    }

    /// Current target.
    #[must_use]
    pub const fn target(&self) -> ObjectRef {
        self.target
    }

    /// Previous target.
    #[must_use]
    pub const fn old_target(&self) -> ObjectRef {
        self.old_target
    }

    /// Ticks until the weapon is ready.
    #[must_use]
    pub const fn weapon_timer(&self) -> i32 {
        self.weapon_timer
    }

    /// Ordered ground-attack position.
    #[must_use]
    pub const fn attack_position(&self) -> Option<Coord> {
        self.attack_position
    }

    /// Whether the target was ordered rather than picked automatically.
    #[must_use]
    pub const fn is_forced(&self) -> bool {
        self.forced
    }

    /// Switch target; the previous one becomes the old target.
    pub fn set_target(&mut self, target: Option<EntityId>) {
        if self.target.id() == target {
            return;
        }
        self.old_target = self.target;
        self.target.point_to(target);
        self.forced = false;
    }

    /// Target ordered by the player.
    pub fn force_target(&mut self, target: EntityId) {
        self.set_target(Some(target));
        self.attack_position = None;
        self.forced = true;
    }

    /// Attack a tile instead of an object.
    pub fn set_attack_position(&mut self, position: Option<Coord>) {
        self.attack_position = position;
        if position.is_some() {
            self.target.clear();
            self.forced = true;
        }
    }

    /// Forget the current target.
    pub fn clear_target(&mut self) {
        self.target.clear();
        self.forced = false;
    }

    /// Exchange current and old target.
    pub fn swap_targets(&mut self) {
        std::mem::swap(&mut self.target, &mut self.old_target);
    }

    pub(crate) fn tick_timer(&mut self) {
        if self.weapon_timer > 0 {
            self.weapon_timer -= 1;
        }
    }

    pub(crate) fn reload(&mut self, ticks: i32) {
        self.weapon_timer = ticks.max(0);
    }
}

/// Keep a ground unit as primary target when an aircraft took its place.
///
/// Returns `true` if the targets were swapped.
pub fn apply_swap_rule(targeting: &mut Targeting, registry: &ObjectRegistry) -> bool {
    let target_airborne = targeting
        .target
        .resolve(registry)
        .is_some_and(GameObject::is_airborne);
    let old_is_ground = targeting
        .old_target
        .resolve(registry)
        .is_some_and(|o| o.kind.is_ground_unit());

    if target_airborne && old_is_ground {
        targeting.swap_targets();
        true
    } else {
        false
    }
}

/// Where a shot actually goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AimPoint {
    /// Aim tile.
    pub coord: Coord,
    /// Inaccuracy in tiles.
    pub precision: u32,
}

/// Aim at `target`. Targets hidden by fog are only known roughly: the shot
/// goes to the centre of the surrounding block and loses precision by the
/// distance between the two.
#[must_use]
pub fn aim_point(map: &dyn MapOracle, team: TeamId, target: Coord) -> AimPoint {
    if !map.is_fogged(target, team) {
        return AimPoint {
            coord: target,
            precision: 0,
        };
    }

    let coord = map.imprecise_center(target);
    let precision = coord
        .euclidean_distance(target)
        .ceil()
        .saturating_to_num::<u32>();
    AimPoint { coord, precision }
}

/// Whether `weapon` can hit `target` at all.
#[must_use]
pub fn can_engage(weapon: &WeaponStats, target: &GameObject) -> bool {
    weapon.anti_air || !target.is_airborne()
}

/// Whether `target` is within `range` tiles of `from`.
#[must_use]
pub fn in_range(from: Coord, target: &GameObject, range: u32) -> bool {
    target.distance_from(from) <= Fixed::from_num(range)
}

/// Nearest visible enemy `shooter` can engage. Ties go to registry order.
#[must_use]
pub fn find_target(
    registry: &ObjectRegistry,
    houses: &HouseTable,
    map: &dyn MapOracle,
    shooter: &GameObject,
    weapon: &WeaponStats,
) -> Option<EntityId> {
    let team = houses.team_of(shooter.owner);
    let mut best: Option<(EntityId, Fixed)> = None;

    for candidate in registry.iter() {
        let eligible = candidate.is_alive()
            && candidate.is_on_map()
            && candidate.id != shooter.id
            && houses.are_enemies(shooter.owner, candidate.owner)
            && can_engage(weapon, candidate)
            && map.is_explored(candidate.location, team);
        if !eligible {
            continue;
        }

        let distance = candidate.distance_from(shooter.location);
        if distance > Fixed::from_num(weapon.range) {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate.id, distance));
        }
    }

    best.map(|(id, _)| id)
}

/// Keep the current target if it is still valid, otherwise pick a new one.
///
/// Automatically chosen targets are re-evaluated whenever the weapon is
/// ready, so a closer threat takes over and the old target is remembered.
pub(crate) fn refresh_target(ctx: &mut SimContext<'_>, id: EntityId, weapon: &WeaponStats) {
    let Some(shooter) = ctx.registry.get(id) else {
        return;
    };
    let Some(mut targeting) = shooter.weapon else {
        return;
    };
    let location = shooter.location;
    let mobile = ctx.rules.stats(shooter.kind).speed > 0;

    match targeting.target.resolve(ctx.registry) {
        None => targeting.clear_target(),
        Some(target) if !can_engage(weapon, target) || !target.is_on_map() => targeting.clear_target(),
        Some(target) if !in_range(location, target, weapon.range) => {
            if targeting.forced && mobile {
                let chase = target.closest_tile(location);
                if let Some(object) = ctx.registry.get_mut(id) {
                    object.set_destination(chase);
                }
            } else {
                targeting.clear_target();
            }
        }
        Some(_) => {}
    }

    let may_retarget = !targeting.forced && targeting.weapon_timer == 0;
    if (!targeting.target.is_set() || may_retarget) && targeting.attack_position.is_none() {
        if let Some(shooter) = ctx.registry.get(id) {
            let found = find_target(ctx.registry, ctx.houses, &*ctx.map, shooter, weapon);
            if found.is_some() && found != targeting.target.id() {
                tracing::trace!(shooter = id, target = ?found, "Target acquired");
                targeting.set_target(found);
            }
        }
    }

    if let Some(object) = ctx.registry.get_mut(id) {
        object.weapon = Some(targeting);
    }
}

fn turn_towards(ctx: &mut SimContext<'_>, id: EntityId, point: Coord) -> bool {
    let Some(object) = ctx.registry.get_mut(id) else {
        return false;
    };
    match Facing::between(object.location, point) {
        Some(goal) if goal != object.facing => {
            object.facing = object.facing.rotate_towards(goal);
            object.facing == goal
        }
        _ => true,
    }
}

/// Fire one shot and return the weapon actually used.
fn fire_at(
    ctx: &mut SimContext<'_>,
    firer: &GameObject,
    target: &GameObject,
    weapon: &WeaponStats,
) -> WeaponStats {
    let team = ctx.team_of(firer.owner);
    let tile = target.closest_tile(firer.location);
    let aim = aim_point(&*ctx.map, team, tile);

    let shell = ctx.rules.point_blank_weapon;
    let point_blank = firer.kind == ObjectKind::RocketTurret
        && !target.is_airborne()
        && target.distance_from(firer.location) < Fixed::from_num(shell.range);
    let weapon = if point_blank {
        shell
    } else {
        *weapon
    };

    ctx.projectiles.spawn(ProjectileRequest {
        firer: firer.id,
        from: firer.location,
        to: aim.coord,
        kind: weapon.bullet,
        damage: weapon.damage,
        air_target: target.is_airborne(),
        precision: aim.precision,
    });
    weapon
}

/// Per-tick behaviour of single-shot weapons.
pub fn update(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(object) = ctx.registry.get(id) else {
        return;
    };
    let Some(weapon) = ctx.rules.stats(object.kind).weapon else {
        return;
    };
    if !object.is_on_map() || object.weapon.is_none() {
        return;
    }
    let stopped = object.attack_mode == AttackMode::Stop;

    if let Some(targeting) = ctx.registry.get_mut(id).and_then(|o| o.weapon.as_mut()) {
        targeting.tick_timer();
    }
    if stopped {
        return;
    }

    refresh_target(ctx, id, &weapon);

    let Some(mut targeting) = ctx.registry.get(id).and_then(|o| o.weapon) else {
        return;
    };
    if apply_swap_rule(&mut targeting, ctx.registry) {
        tracing::trace!(shooter = id, "Ground target kept as primary");
    }
    if let Some(object) = ctx.registry.get_mut(id) {
        object.weapon = Some(targeting);
    }

    let Some(target) = targeting.target.resolve(ctx.registry).cloned() else {
        return;
    };
    let Some(location) = ctx.registry.get(id).map(|o| o.location) else {
        return;
    };
    if !in_range(location, &target, weapon.range) {
        return;
    }
    if !turn_towards(ctx, id, target.closest_tile(location)) {
        return;
    }
    if targeting.weapon_timer > 0 {
        return;
    }

    let Some(firer) = ctx.registry.get(id).cloned() else {
        return;
    };
    let fired = fire_at(ctx, &firer, &target, &weapon);

    let secondary = targeting
        .old_target
        .resolve(ctx.registry)
        .filter(|old| {
            old.id != target.id
                && old.is_airborne()
                && old.is_on_map()
                && weapon.anti_air
                && in_range(location, old, weapon.range)
                && Facing::between(location, old.location) == Some(firer.facing)
        })
        .cloned();
    if let Some(old) = secondary {
        tracing::trace!(shooter = id, target = old.id, "Secondary shot");
        fire_at(ctx, &firer, &old, &weapon);
    }

    if let Some(targeting) = ctx.registry.get_mut(id).and_then(|o| o.weapon.as_mut()) {
        targeting.reload(fired.reload_time);
    }
}
