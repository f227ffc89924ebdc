//! Single-occupant booking slots for service structures.
//!
//! Refineries and repair yards serve one unit at a time. Acquiring the slot
//! is a checked transaction: [`ServiceSlot::try_book`] either reserves it
//! for the caller or reports who holds it, so two requesters can never both
//! believe they own the same slot.
//!
//! The booking count is separate from the occupant. It counts units that
//! have committed to travel to the provider and is used to spread units
//! over several providers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::components::EntityId;
use crate::reference::ObjectRef;
use crate::registry::ObjectRegistry;

/// Why a reservation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BookingError {
    /// The service slot already holds another unit.
    #[error("service slot is occupied by {occupant}")]
    Occupied {
        /// Unit currently being serviced.
        occupant: EntityId,
    },
    /// The object does not provide a service slot.
    #[error("object {provider} has no service slot")]
    NoSlot {
        /// The object asked.
        provider: EntityId,
    },
    /// The carrier already serves someone else.
    #[error("carrier {carrier} is already booked")]
    CarrierBusy {
        /// The carrier that was requested.
        carrier: EntityId,
    },
}

/// Booking state of a refinery or repair yard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceSlot {
    busy: bool,
    booking_count: u32,
    occupant: ObjectRef,
    /// Service animation running (extracting or repairing).
    pub(crate) working: bool,
    /// Owner has been told that repairs started.
    pub(crate) repair_notified: bool,
    /// Repairs halted for lack of credits.
    pub(crate) repair_paused: bool,
}

impl ServiceSlot {
    /// Create a free slot with no bookings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: false,
            booking_count: 0,
            occupant: ObjectRef::NONE,
            working: false,
            repair_notified: false,
            repair_paused: false,
        }
    }

    /// Reserve the slot for `occupant`.
    ///
    /// Re-booking by the current occupant succeeds without change.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Occupied`] if another unit holds the slot.
    pub fn try_book(&mut self, occupant: EntityId) -> Result<(), BookingError> {
        match self.occupant.id() {
            Some(current) if self.busy && current != occupant => {
                Err(BookingError::Occupied { occupant: current })
            }
            _ => {
                self.busy = true;
                self.occupant = ObjectRef::to(occupant);
                Ok(())
            }
        }
    }

    /// Release the slot unconditionally.
    pub fn unbook(&mut self) {
        self.busy = false;
        self.occupant.clear();
        self.working = false;
        self.repair_notified = false;
        self.repair_paused = false;
    }

    /// A unit committed to travel here.
    pub fn add_booking(&mut self) {
        self.booking_count += 1;
    }

    /// A traveling unit arrived, was redirected or cancelled.
    pub fn remove_booking(&mut self) {
        self.booking_count = self.booking_count.saturating_sub(1);
    }

    /// Whether a unit is being serviced.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the slot can be booked.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        !self.busy
    }

    /// Whether a new unit could enter: free, or held by an occupant that no
    /// longer resolves.
    #[must_use]
    pub fn is_available(&self, registry: &ObjectRegistry) -> bool {
        !self.busy || !self.occupant.is_live(registry)
    }

    /// Number of units traveling towards this provider.
    #[must_use]
    pub const fn booking_count(&self) -> u32 {
        self.booking_count
    }

    /// The unit being serviced.
    #[must_use]
    pub const fn occupant(&self) -> ObjectRef {
        self.occupant
    }

    /// Whether the service animation is running.
    #[must_use]
    pub const fn is_working(&self) -> bool {
        self.working
    }

    /// Whether repairs are halted for lack of credits.
    #[must_use]
    pub const fn is_repair_paused(&self) -> bool {
        self.repair_paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_book_sets_occupant() {
        let mut slot = ServiceSlot::new();
        slot.try_book(7).unwrap();

        assert!(slot.is_busy());
        assert_eq!(slot.occupant().id(), Some(7));
    }

    fn spawn_tanks(registry: &mut ObjectRegistry, count: usize) -> Vec<EntityId> {
        use crate::components::ObjectKind;
        use crate::factions::HouseId;
        use crate::math::Coord;
        use crate::registry::GameObject;

        (0..count)
            .map(|i| {
                let at = Coord::new(i32::try_from(i).unwrap(), 0);
                registry.insert(GameObject::new(ObjectKind::Tank, HouseId::Atreides, at, 10))
            })
            .collect()
    }

    #[test]
    fn test_booked_occupant_resolves_until_unbooked() {
        let mut registry = ObjectRegistry::new();
        let tanks = spawn_tanks(&mut registry, 2);
        let mut slot = ServiceSlot::new();
        slot.try_book(tanks[0]).unwrap();

        let resolved = slot.occupant().resolve(&registry).map(|o| o.id);
        assert_eq!(resolved, Some(tanks[0]));

        assert!(slot.try_book(tanks[1]).is_err());
        let resolved = slot.occupant().resolve(&registry).map(|o| o.id);
        assert_eq!(resolved, Some(tanks[0]));

        slot.unbook();
        assert!(slot.occupant().resolve(&registry).is_none());
    }

    proptest! {
        #[test]
        fn prop_first_booking_holds_against_later_requests(
            attempts in proptest::collection::vec(0usize..6, 1..20)
        ) {
            let mut registry = ObjectRegistry::new();
            let tanks = spawn_tanks(&mut registry, 6);
            let mut slot = ServiceSlot::new();
            let holder = tanks[attempts[0]];

            for &pick in &attempts {
                let result = slot.try_book(tanks[pick]);
                prop_assert_eq!(result.is_ok(), tanks[pick] == holder);
                let resolved = slot.occupant().resolve(&registry).map(|o| o.id);
                prop_assert_eq!(resolved, Some(holder));
            }
        }
    }

    #[test]
    fn test_second_occupant_is_refused() {
        let mut slot = ServiceSlot::new();
        slot.try_book(7).unwrap();

        assert_eq!(slot.try_book(8), Err(BookingError::Occupied { occupant: 7 }));
        assert_eq!(slot.occupant().id(), Some(7));
    }

    #[test]
    fn test_rebooking_same_occupant_is_idempotent() {
        let mut slot = ServiceSlot::new();
        slot.try_book(7).unwrap();
        slot.try_book(7).unwrap();
        assert_eq!(slot.occupant().id(), Some(7));
    }

    #[test]
    fn test_unbook_clears_everything() {
        let mut slot = ServiceSlot::new();
        slot.try_book(7).unwrap();
        slot.working = true;
        slot.unbook();

        assert!(slot.is_free());
        assert!(!slot.occupant().is_set());
        assert!(!slot.is_working());
        slot.try_book(8).unwrap();
    }

    #[test]
    fn test_stale_occupant_leaves_slot_available() {
        use crate::components::ObjectKind;
        use crate::factions::HouseId;
        use crate::math::Coord;
        use crate::registry::GameObject;

        let mut registry = ObjectRegistry::new();
        let unit = registry.insert(GameObject::new(
            ObjectKind::Tank,
            HouseId::Atreides,
            Coord::new(0, 0),
            10,
        ));
        let mut slot = ServiceSlot::new();
        slot.try_book(unit).unwrap();
        assert!(!slot.is_available(&registry));

        registry.get_mut(unit).unwrap().destroyed = true;
        assert!(slot.is_busy());
        assert!(slot.is_available(&registry));
    }

    #[test]
    fn test_booking_count_is_independent_of_occupant() {
        let mut slot = ServiceSlot::new();
        slot.add_booking();
        slot.add_booking();
        slot.try_book(1).unwrap();
        slot.unbook();

        assert_eq!(slot.booking_count(), 2);
        slot.remove_booking();
        slot.remove_booking();
        slot.remove_booking();
        assert_eq!(slot.booking_count(), 0);
    }
}
