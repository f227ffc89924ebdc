//! Multi-tube launchers.
//!
//! Each tube reloads on its own timer. After a tube fires, the others wait
//! for a shared salvo delay, and each tube's reload is staggered by its
//! index so the launcher ripples rather than fires all at once.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::{AttackMode, EntityId};
use crate::config::{SalvoRules, WeaponStats, MAX_SALVO};
use crate::context::SimContext;
use crate::math::{apply_percent, Coord, Fixed};
use crate::projectile::ProjectileRequest;
use crate::weapon;

const UNLOCKED_PERCENT: u32 = 50;
const LOCKED_PERCENT: u32 = 75;
const HARD_GROUND_PERCENT: u32 = 115;
const FOGGED_PERCENT: u32 = 80;
const UNEXPLORED_PERCENT: u32 = 25;
const STRUCTURE_PERCENT: u32 = 35;

/// Tube timers of a launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalvoLauncher {
    timers: [i32; MAX_SALVO],
    tubes: usize,
    delay_counter: i32,
}

impl SalvoLauncher {
    /// Launcher with `tubes` loaded tubes (clamped to `1..=MAX_SALVO`).
    #[must_use]
    pub fn new(tubes: usize) -> Self {
        Self {
            timers: [0; MAX_SALVO],
            tubes: tubes.clamp(1, MAX_SALVO),
            delay_counter: 0,
        }
    }

    /// Number of tubes in use.
    #[must_use]
    pub fn tubes(&self) -> usize {
        self.tubes.min(MAX_SALVO)
    }

    // Saved launchers bypass `new`, so the tube count is clamped on use.
    fn loaded(&self) -> &[i32] {
        &self.timers[..self.tubes()]
    }

    fn loaded_mut(&mut self) -> &mut [i32] {
        let tubes = self.tubes();
        &mut self.timers[..tubes]
    }

    /// Reload timer of tube `index`.
    #[must_use]
    pub fn timer(&self, index: usize) -> Option<i32> {
        self.loaded().get(index).copied()
    }

    /// Ticks until any tube may fire again.
    #[must_use]
    pub const fn delay_counter(&self) -> i32 {
        self.delay_counter
    }

    /// First loaded tube.
    #[must_use]
    pub fn ready_tube(&self) -> Option<usize> {
        self.loaded().iter().position(|&t| t <= 0)
    }

    /// Count all timers down by one tick.
    pub fn tick(&mut self) {
        for timer in self.loaded_mut() {
            if *timer > 0 {
                *timer -= 1;
            }
        }
        if self.delay_counter > 0 {
            self.delay_counter -= 1;
        }
    }

    /// Mark `tube` fired.
    pub fn fire(&mut self, tube: usize, reload: i32, salvo_delay: i32) {
        if let Some(timer) = self.loaded_mut().get_mut(tube) {
            *timer = reload;
        }
        self.delay_counter = salvo_delay;
    }
}

/// Conditions at the aim point that scale salvo damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShotConditions {
    /// Aimed at a unit rather than at the ground.
    pub locked: bool,
    /// Aim tile is rock or dunes.
    pub hard_ground: bool,
    /// Aim tile is not visible.
    pub fogged: bool,
    /// Aim tile was never seen.
    pub unexplored: bool,
    /// Aim tile holds a structure.
    pub structure: bool,
}

/// Apply the salvo damage modifiers, rounding after each step.
///
/// Order: lock, terrain, fog, exploration, structure.
#[must_use]
pub fn modified_damage(base: Fixed, conditions: ShotConditions) -> Fixed {
    let lock = if conditions.locked {
        LOCKED_PERCENT
    } else {
        UNLOCKED_PERCENT
    };
    let mut damage = apply_percent(base, lock);
    if conditions.hard_ground {
        damage = apply_percent(damage, HARD_GROUND_PERCENT);
    }
    if conditions.fogged {
        damage = apply_percent(damage, FOGGED_PERCENT);
    }
    if conditions.unexplored {
        damage = apply_percent(damage, UNEXPLORED_PERCENT);
    }
    if conditions.structure {
        damage = apply_percent(damage, STRUCTURE_PERCENT);
    }
    damage
}

/// Damage of one tube: the weapon's damage shared over the tubes, halved
/// again against aircraft.
#[must_use]
pub fn tube_damage(base: Fixed, tubes: usize, air_target: bool, rules: &SalvoRules) -> Fixed {
    let divisor = if air_target {
        rules.air_damage_divisor
    } else {
        rules.ground_damage_divisor
    };
    let tubes = u32::try_from(tubes).unwrap_or(1).max(1);
    base / Fixed::from_num((tubes * divisor).max(1))
}

/// Reload time of `tube` after firing.
#[must_use]
pub fn tube_reload(tube: usize, reload: i32, air_target: bool, rules: &SalvoRules) -> i32 {
    let factor = if air_target {
        rules.air_stagger_factor
    } else {
        rules.ground_stagger_factor
    };
    let index = i32::try_from(tube).unwrap_or(0);
    reload + rules.salvo_delay * factor * index + rules.salvo_delay
}

struct Aim {
    tile: Coord,
    air: bool,
    structure: bool,
    locked: bool,
    in_range: bool,
}

fn resolve_aim(ctx: &SimContext<'_>, id: EntityId, weapon: &WeaponStats) -> Option<Aim> {
    let object = ctx.registry.get(id)?;
    let targeting = object.weapon?;
    let location = object.location;

    if let Some(target) = targeting.target().resolve(ctx.registry) {
        return Some(Aim {
            tile: target.closest_tile(location),
            air: target.is_airborne(),
            structure: target.kind.is_structure(),
            locked: true,
            in_range: weapon::in_range(location, target, weapon.range),
        });
    }

    let tile = targeting.attack_position().filter(|&p| ctx.map.tile_exists(p))?;
    let structure = ctx.registry.iter().any(|o| {
        o.is_alive() && o.kind.is_structure() && o.closest_tile(tile) == tile
    });
    Some(Aim {
        tile,
        air: false,
        structure,
        locked: false,
        in_range: location.block_distance(tile) <= Fixed::from_num(weapon.range),
    })
}

/// Per-tick launcher behaviour.
pub fn update(ctx: &mut SimContext<'_>, id: EntityId) {
    let Some(object) = ctx.registry.get(id) else {
        return;
    };
    let Some(weapon) = ctx.rules.stats(object.kind).weapon else {
        return;
    };
    if !object.is_on_map() || object.salvo.is_none() {
        return;
    }
    let stopped = object.attack_mode == AttackMode::Stop;

    if let Some(launcher) = ctx.registry.get_mut(id).and_then(|o| o.salvo.as_mut()) {
        launcher.tick();
    }
    if stopped {
        return;
    }

    weapon::refresh_target(ctx, id, &weapon);

    let Some(aim) = resolve_aim(ctx, id, &weapon) else {
        let one_in = ctx.rules.retry_navigate_one_in;
        if one_in > 0 && ctx.rng.gen_ratio(1, one_in) {
            if let Some(object) = ctx.registry.get_mut(id) {
                let guard = object.guard_point;
                object.set_destination(guard);
                tracing::trace!(launcher = id, ?guard, "No aim point, returning to guard point");
            }
        }
        return;
    };

    let Some(object) = ctx.registry.get(id) else {
        return;
    };
    if !aim.in_range {
        if let Some(object) = ctx.registry.get_mut(id) {
            object.set_destination(aim.tile);
        }
        return;
    }
    if object.health.is_below_percent(ctx.rules.badly_damaged_percent) {
        return;
    }
    let Some(launcher) = object.salvo else {
        return;
    };
    if launcher.delay_counter() > 0 {
        return;
    }
    let Some(tube) = launcher.ready_tube() else {
        return;
    };

    let (owner, location) = (object.owner, object.location);
    let team = ctx.team_of(owner);
    let conditions = ShotConditions {
        locked: aim.locked,
        hard_ground: ctx
            .map
            .terrain_at(aim.tile)
            .is_some_and(|t| t.is_hard_ground()),
        fogged: ctx.map.is_fogged(aim.tile, team),
        unexplored: !ctx.map.is_explored(aim.tile, team),
        structure: aim.structure,
    };
    let salvo = ctx.rules.salvo;
    let damage = modified_damage(
        tube_damage(weapon.damage, launcher.tubes(), aim.air, &salvo),
        conditions,
    );
    let point = weapon::aim_point(&*ctx.map, team, aim.tile);

    ctx.projectiles.spawn(ProjectileRequest {
        firer: id,
        from: location,
        to: point.coord,
        kind: weapon.bullet,
        damage,
        air_target: aim.air,
        precision: point.precision,
    });

    let reload = tube_reload(tube, weapon.reload_time, aim.air, &salvo);
    if let Some(launcher) = ctx.registry.get_mut(id).and_then(|o| o.salvo.as_mut()) {
        launcher.fire(tube, reload, salvo.salvo_delay);
    }
    tracing::trace!(launcher = id, tube, reload, "Tube fired");
}
