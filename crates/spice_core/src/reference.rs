//! Weak, ID-based handles to simulation objects.
//!
//! An [`ObjectRef`] never owns its referent. The registry hands out IDs
//! monotonically and never reuses them, so a reference to a destroyed
//! object simply stops resolving; there is nothing to invalidate.

use serde::{Deserialize, Serialize};

use crate::components::EntityId;
use crate::registry::{GameObject, ObjectRegistry};

/// Weak reference to a [`GameObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectRef {
    id: Option<EntityId>,
}

impl ObjectRef {
    /// A reference pointing at nothing.
    pub const NONE: Self = Self { id: None };

    /// Create a reference to `id`.
    #[must_use]
    pub const fn to(id: EntityId) -> Self {
        Self { id: Some(id) }
    }

    /// Re-point the reference. `None` clears it.
    pub fn point_to(&mut self, id: Option<EntityId>) {
        self.id = id;
    }

    /// Clear the reference.
    pub fn clear(&mut self) {
        self.id = None;
    }

    /// The referenced ID, stale or not.
    #[must_use]
    pub const fn id(&self) -> Option<EntityId> {
        self.id
    }

    /// Whether the reference points at anything (without checking liveness).
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.id.is_some()
    }

    /// Look the referent up. Returns `None` if it is gone or dying.
    #[must_use]
    pub fn resolve<'a>(&self, registry: &'a ObjectRegistry) -> Option<&'a GameObject> {
        self.id.and_then(|id| registry.get_live(id))
    }

    /// Live ID of the referent, if it still resolves.
    #[must_use]
    pub fn live_id(&self, registry: &ObjectRegistry) -> Option<EntityId> {
        self.resolve(registry).map(|object| object.id)
    }

    /// Equivalent to `resolve(registry).is_some()`.
    #[must_use]
    pub fn is_live(&self, registry: &ObjectRegistry) -> bool {
        self.resolve(registry).is_some()
    }
}

impl From<Option<EntityId>> for ObjectRef {
    fn from(id: Option<EntityId>) -> Self {
        Self { id }
    }
}
