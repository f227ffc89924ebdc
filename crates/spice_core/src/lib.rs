//! # Spice Core
//!
//! Deterministic simulation core for resource booking and task dispatch.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO outside of rules loading
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Lockstep multiplayer (identical simulation across clients)
//! - Headless test harnesses
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`reference`] - Weak object references
//! - [`booking`] - Single-occupant service slots with booking counters
//! - [`carrier`] - Carryall dispatch and transport
//! - [`ground_unit`] - Pickup bookings and repair trips
//! - [`harvester`] - Prospecting, harvesting and refinery trips
//! - [`service`], [`refinery`], [`repair_yard`] - Structure service loops
//! - [`weapon`], [`salvo`] - Turret targeting and salvo fire
//! - [`simulation`] - Core simulation loop

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod booking;
pub mod carrier;
pub mod components;
pub mod config;
pub mod context;
pub mod economy;
pub mod error;
pub mod factions;
pub mod ground_unit;
pub mod harvester;
pub mod map;
pub mod math;
pub mod movement;
pub mod projectile;
pub mod reference;
pub mod refinery;
pub mod registry;
pub mod repair_yard;
pub mod salvo;
pub mod service;
pub mod simulation;
pub mod weapon;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::booking::{BookingError, ServiceSlot};
    pub use crate::carrier::Carryall;
    pub use crate::components::*;
    pub use crate::config::{BulletKind, GameRules, ObjectStats, SalvoRules, WeaponStats};
    pub use crate::context::{SimContext, SimEvent};
    pub use crate::economy::{HouseEconomy, HouseTable};
    pub use crate::error::{GameError, Result};
    pub use crate::factions::{HouseId, TeamId};
    pub use crate::ground_unit::GroundUnit;
    pub use crate::harvester::{Harvester, HarvesterState, SelectionPolicy};
    pub use crate::map::{MapOracle, Terrain, TileMap};
    pub use crate::math::{Coord, Facing, Fixed};
    pub use crate::projectile::{ProjectileRequest, ProjectileSink};
    pub use crate::reference::ObjectRef;
    pub use crate::registry::{GameObject, ObjectRegistry};
    pub use crate::salvo::SalvoLauncher;
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::weapon::Targeting;
}
