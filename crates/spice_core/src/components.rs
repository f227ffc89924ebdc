//! Shared component definitions.
//!
//! Components are plain data. Kind-specific behaviour lives in the module
//! that owns the capability (harvesting, carrying, service bays, weapons).

use serde::{Deserialize, Serialize};

/// Unique identifier for simulation objects.
///
/// Assigned monotonically and never reused, so an ID missing from the
/// registry always means the object is gone.
pub type EntityId = u64;

/// Every kind of object the core simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Tracked spice harvester.
    Harvester,
    /// Aerial transport that lifts ground units.
    Carryall,
    /// Direct-fire ground vehicle.
    Tank,
    /// Multi-tube rocket launcher vehicle.
    Launcher,
    /// Spice refinery (converts harvested spice into credits).
    Refinery,
    /// Repair yard for ground units.
    RepairYard,
    /// Gun emplacement (ground targets only).
    GunTurret,
    /// Rocket emplacement (ground and air targets).
    RocketTurret,
}

impl ObjectKind {
    /// All kinds in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Harvester,
        Self::Carryall,
        Self::Tank,
        Self::Launcher,
        Self::Refinery,
        Self::RepairYard,
        Self::GunTurret,
        Self::RocketTurret,
    ];

    /// Check if this kind is a stationary structure.
    #[must_use]
    pub const fn is_structure(self) -> bool {
        matches!(
            self,
            Self::Refinery | Self::RepairYard | Self::GunTurret | Self::RocketTurret
        )
    }

    /// Check if this kind flies.
    #[must_use]
    pub const fn is_airborne(self) -> bool {
        matches!(self, Self::Carryall)
    }

    /// Check if this kind is a ground unit (can be carried and repaired).
    #[must_use]
    pub const fn is_ground_unit(self) -> bool {
        matches!(self, Self::Harvester | Self::Tank | Self::Launcher)
    }

    /// Check if this kind hosts a booking slot.
    #[must_use]
    pub const fn is_service_provider(self) -> bool {
        matches!(self, Self::Refinery | Self::RepairYard)
    }

    /// Footprint side length in tiles.
    #[must_use]
    pub const fn size(self) -> i32 {
        match self {
            Self::Refinery => 3,
            Self::RepairYard => 2,
            _ => 1,
        }
    }
}

/// Standing orders governing how an object engages enemies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttackMode {
    /// Engage enemies in range without leaving position.
    #[default]
    Guard,
    /// Engage enemies in range and pursue briefly.
    AreaGuard,
    /// Seek out enemies actively.
    Hunt,
    /// Hold fire and do not accept jobs.
    Stop,
}

/// Health component for damageable objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if object is dead (health == 0).
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.current == 0
    }

    /// Check if object is at full health.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Apply damage, returning actual damage dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }

    /// Heal the object, returning actual amount healed.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let headroom = self.max.saturating_sub(self.current);
        let actual = amount.min(headroom);
        self.current += actual;
        actual
    }

    /// Get health as a percentage (0-100).
    #[must_use]
    pub fn percentage(&self) -> u32 {
        if self.max == 0 {
            0
        } else {
            (self.current * 100) / self.max
        }
    }

    /// Check if health is below `percent` of maximum.
    #[must_use]
    pub fn is_below_percent(&self, percent: u32) -> bool {
        u64::from(self.current) * 100 < u64::from(self.max) * u64::from(percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_damage_and_heal() {
        let mut health = Health::new(100);
        assert!(health.is_full());

        assert_eq!(health.apply_damage(30), 30);
        assert_eq!(health.current, 70);
        assert_eq!(health.heal(50), 30);
        assert!(health.is_full());

        assert_eq!(health.apply_damage(500), 100);
        assert!(health.is_dead());
    }

    #[test]
    fn test_health_below_percent() {
        let health = Health { current: 49, max: 100 };
        assert!(health.is_below_percent(50));
        let health = Health { current: 50, max: 100 };
        assert!(!health.is_below_percent(50));
    }

    #[test]
    fn test_kind_capabilities() {
        assert!(ObjectKind::Refinery.is_structure());
        assert!(ObjectKind::Refinery.is_service_provider());
        assert!(!ObjectKind::GunTurret.is_service_provider());
        assert!(ObjectKind::Carryall.is_airborne());
        assert!(!ObjectKind::Carryall.is_ground_unit());
        assert!(ObjectKind::Harvester.is_ground_unit());
    }
}
