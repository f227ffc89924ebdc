//! Projectile spawn requests.
//!
//! Ballistics and impact resolution happen outside the core; weapons only
//! describe what they fired.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::config::BulletKind;
use crate::math::{fixed_serde, Coord, Fixed};

/// A projectile a weapon wants spawned this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileRequest {
    /// Object that fired.
    pub firer: EntityId,
    /// Launch tile.
    pub from: Coord,
    /// Aim tile.
    pub to: Coord,
    /// Projectile kind.
    pub kind: BulletKind,
    /// Damage carried.
    #[serde(with = "fixed_serde")]
    pub damage: Fixed,
    /// Whether the shot was aimed at a flying unit.
    pub air_target: bool,
    /// Inaccuracy in tiles added because the aim point was obscured.
    pub precision: u32,
}

/// Receiver for projectile spawn requests.
pub trait ProjectileSink {
    /// Queue a projectile.
    fn spawn(&mut self, request: ProjectileRequest);
}

impl ProjectileSink for Vec<ProjectileRequest> {
    fn spawn(&mut self, request: ProjectileRequest) {
        tracing::trace!(
            firer = request.firer,
            kind = ?request.kind,
            precision = request.precision,
            "Projectile requested"
        );
        self.push(request);
    }
}
