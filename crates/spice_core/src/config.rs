//! Tunable game rules.
//!
//! Every constant the core consults lives in [`GameRules`]. The built-in
//! table is [`GameRules::default`]; mods and tests override it from RON.
//!
//! # Example RON
//!
//! Fixed-point fields are stored as raw I32F32 bits, like every other
//! serialized fixed-point value in the simulation.
//!
//! ```ron
//! GameRules(
//!     seed: 7,
//!     harvest_rate: 4294967296,               // Fixed-point for 1.0
//!     refinery_extraction_rate: 2684354560,   // Fixed-point for 0.625
//!     min_carryall_lift_distance: 10,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::ObjectKind;
use crate::error::{GameError, Result};
use crate::math::{fixed_serde, Fixed};

/// Maximum number of tubes a salvo launcher can carry.
pub const MAX_SALVO: usize = 8;

/// Projectile kinds a weapon can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BulletKind {
    /// Medium cannon shell (tanks); also the rocket turret's point-blank fallback.
    ShellMedium,
    /// Gun turret shell.
    ShellTurret,
    /// Guided rocket (rocket turret).
    Rocket,
    /// Unguided salvo rocket (launcher tubes).
    SmallRocket,
}

/// Weapon statistics for one object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Projectile fired.
    pub bullet: BulletKind,
    /// Damage carried by each projectile.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Ticks between shots.
    pub reload_time: i32,
    /// Range in tiles (block distance).
    pub range: u32,
    /// Whether the weapon can engage flying units.
    pub anti_air: bool,
}

/// Per-kind object statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStats {
    /// Health points at full repair.
    pub max_health: u32,
    /// Tiles moved per tick (0 for structures).
    pub speed: u32,
    /// Primary weapon, if any.
    pub weapon: Option<WeaponStats>,
}

/// Timing and damage rules for multi-tube launchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalvoRules {
    /// Number of tubes (at most [`MAX_SALVO`]).
    pub tubes: usize,
    /// Base stagger between tubes in ticks.
    pub salvo_delay: i32,
    /// Stagger multiplier when engaging flying targets.
    pub air_stagger_factor: i32,
    /// Stagger multiplier when engaging ground targets.
    pub ground_stagger_factor: i32,
    /// Per-tube damage divisor against flying targets.
    pub air_damage_divisor: u32,
    /// Per-tube damage divisor against ground targets.
    pub ground_damage_divisor: u32,
}

/// All tunable constants of the simulation core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Seed for the simulation RNG.
    pub seed: u64,
    /// Maximum spice a harvester can carry.
    #[serde(with = "fixed_serde")]
    pub harvester_capacity: Fixed,
    /// Spice gathered per harvesting tick.
    #[serde(with = "fixed_serde")]
    pub harvest_rate: Fixed,
    /// Nominal refinery extraction rate per tick at full health.
    #[serde(with = "fixed_serde")]
    pub refinery_extraction_rate: Fixed,
    /// Health restored per repair tick.
    pub repair_health_step: u32,
    /// Credits charged per repair tick.
    #[serde(with = "fixed_serde")]
    pub repair_cost: Fixed,
    /// Minimum block distance for which a carryall is worth requesting.
    pub min_carryall_lift_distance: u32,
    /// Half side length of the square zone scanned when prospecting.
    pub prospect_radius: i32,
    /// Shell used by rocket turrets against ground targets closer than its
    /// range. Its reload applies after such a shot.
    pub point_blank_weapon: WeaponStats,
    /// Health percentage below which a unit is badly damaged.
    pub badly_damaged_percent: u32,
    /// A launcher without an aim point re-navigates with chance 1/n per tick.
    pub retry_navigate_one_in: u32,
    /// Salvo launcher rules.
    pub salvo: SalvoRules,
    /// Harvester stats.
    pub harvester: ObjectStats,
    /// Carryall stats.
    pub carryall: ObjectStats,
    /// Tank stats.
    pub tank: ObjectStats,
    /// Launcher stats.
    pub launcher: ObjectStats,
    /// Refinery stats.
    pub refinery: ObjectStats,
    /// Repair yard stats.
    pub repair_yard: ObjectStats,
    /// Gun turret stats.
    pub gun_turret: ObjectStats,
    /// Rocket turret stats.
    pub rocket_turret: ObjectStats,
}

impl Default for GameRules {
    fn default() -> Self {
        let turret_shell = WeaponStats {
            bullet: BulletKind::ShellTurret,
            damage: Fixed::from_num(30),
            reload_time: 40,
            range: 5,
            anti_air: false,
        };

        Self {
            seed: 0,
            harvester_capacity: Fixed::from_num(700),
            harvest_rate: Fixed::from_num(0.25),
            refinery_extraction_rate: Fixed::from_num(0.625),
            repair_health_step: 1,
            repair_cost: Fixed::from_num(1),
            min_carryall_lift_distance: 10,
            prospect_radius: 8,
            point_blank_weapon: WeaponStats {
                bullet: BulletKind::ShellMedium,
                damage: Fixed::from_num(25),
                reload_time: 40,
                range: 3,
                anti_air: false,
            },
            badly_damaged_percent: 50,
            retry_navigate_one_in: 32,
            salvo: SalvoRules {
                tubes: 3,
                salvo_delay: 5,
                air_stagger_factor: 1,
                ground_stagger_factor: 2,
                air_damage_divisor: 2,
                ground_damage_divisor: 1,
            },
            harvester: ObjectStats {
                max_health: 300,
                speed: 1,
                weapon: None,
            },
            carryall: ObjectStats {
                max_health: 100,
                speed: 2,
                weapon: None,
            },
            tank: ObjectStats {
                max_health: 200,
                speed: 1,
                weapon: Some(WeaponStats {
                    bullet: BulletKind::ShellMedium,
                    damage: Fixed::from_num(25),
                    reload_time: 30,
                    range: 4,
                    anti_air: false,
                }),
            },
            launcher: ObjectStats {
                max_health: 150,
                speed: 1,
                weapon: Some(WeaponStats {
                    bullet: BulletKind::SmallRocket,
                    damage: Fixed::from_num(90),
                    reload_time: 60,
                    range: 9,
                    anti_air: true,
                }),
            },
            refinery: ObjectStats {
                max_health: 450,
                speed: 0,
                weapon: None,
            },
            repair_yard: ObjectStats {
                max_health: 400,
                speed: 0,
                weapon: None,
            },
            gun_turret: ObjectStats {
                max_health: 350,
                speed: 0,
                weapon: Some(turret_shell),
            },
            rocket_turret: ObjectStats {
                max_health: 400,
                speed: 0,
                weapon: Some(WeaponStats {
                    bullet: BulletKind::Rocket,
                    damage: Fixed::from_num(50),
                    reload_time: 60,
                    range: 8,
                    anti_air: true,
                }),
            },
        }
    }
}

impl GameRules {
    /// Stats for an object kind.
    #[must_use]
    pub const fn stats(&self, kind: ObjectKind) -> &ObjectStats {
        match kind {
            ObjectKind::Harvester => &self.harvester,
            ObjectKind::Carryall => &self.carryall,
            ObjectKind::Tank => &self.tank,
            ObjectKind::Launcher => &self.launcher,
            ObjectKind::Refinery => &self.refinery,
            ObjectKind::RepairYard => &self.repair_yard,
            ObjectKind::GunTurret => &self.gun_turret,
            ObjectKind::RocketTurret => &self.rocket_turret,
        }
    }

    /// Parse rules from a RON string and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ConfigParse`] if the text is not valid RON for
    /// [`GameRules`] or the values are out of range.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let rules: Self = ron::from_str(text).map_err(|e| GameError::ConfigParse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load rules from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Io`] if the file cannot be read, or
    /// [`GameError::ConfigParse`] if it does not contain valid rules.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GameError::Io(format!("{}: {}", path.display(), e)))?;

        let rules = Self::from_ron_str(&contents).map_err(|e| match e {
            GameError::ConfigParse { message, .. } => GameError::ConfigParse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;

        tracing::info!(path = %path.display(), seed = rules.seed, "Loaded game rules");
        Ok(rules)
    }

    /// Serialize the rules to pretty RON.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if encoding fails.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Check that the rules describe a playable configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::ConfigParse`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| GameError::ConfigParse {
            path: "<rules>".to_string(),
            message,
        };

        if self.salvo.tubes == 0 || self.salvo.tubes > MAX_SALVO {
            return Err(invalid(format!(
                "salvo.tubes must be within 1..={MAX_SALVO}, got {}",
                self.salvo.tubes
            )));
        }
        if self.salvo.air_damage_divisor == 0 || self.salvo.ground_damage_divisor == 0 {
            return Err(invalid("salvo damage divisors must be positive".to_string()));
        }
        if self.harvester_capacity <= Fixed::ZERO {
            return Err(invalid("harvester_capacity must be positive".to_string()));
        }
        if self.retry_navigate_one_in == 0 {
            return Err(invalid("retry_navigate_one_in must be positive".to_string()));
        }

        for kind in ObjectKind::ALL {
            let stats = self.stats(kind);
            if stats.max_health == 0 {
                return Err(invalid(format!("{kind:?} max_health must be positive")));
            }
            if let Some(weapon) = stats.weapon {
                if weapon.reload_time <= 0 {
                    return Err(invalid(format!("{kind:?} reload_time must be positive")));
                }
            }
        }

        Ok(())
    }
}
