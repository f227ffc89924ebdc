//! House economy: credits, spice storage and repair notifications.
//!
//! All amounts are fixed-point for deterministic simulation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::factions::{HouseId, TeamId};
use crate::math::{fixed_serde, Fixed};

/// Economy state of a single house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseEconomy {
    /// Team the house plays on.
    pub team: TeamId,
    /// Credits currently stored.
    #[serde(with = "fixed_serde")]
    credits: Fixed,
    /// Maximum credits the house's silos can hold.
    #[serde(with = "fixed_serde")]
    capacity: Fixed,
    /// Total credits gained from refined spice.
    #[serde(with = "fixed_serde")]
    refined_total: Fixed,
    /// Whether a repair yard is currently drawing credits.
    repair_active: bool,
    /// Number of times repairs were switched on.
    repair_activations: u32,
}

impl HouseEconomy {
    /// Create an economy with starting credits and storage capacity.
    #[must_use]
    pub fn new(team: TeamId, credits: Fixed, capacity: Fixed) -> Self {
        Self {
            team,
            credits,
            capacity,
            refined_total: Fixed::ZERO,
            repair_active: false,
            repair_activations: 0,
        }
    }

    /// Add credits.
    ///
    /// `taxed` marks income from refined spice; it counts towards the
    /// refinery statistics.
    pub fn add_credits(&mut self, amount: Fixed, taxed: bool) {
        if amount <= Fixed::ZERO {
            return;
        }
        self.credits += amount;
        if taxed {
            self.refined_total += amount;
        }
    }

    /// Take up to `amount` credits. Returns what was actually taken.
    pub fn take_credits(&mut self, amount: Fixed) -> Fixed {
        let taken = amount.min(self.credits).max(Fixed::ZERO);
        self.credits -= taken;
        taken
    }

    /// Check if the house can pay `amount` in full.
    #[must_use]
    pub fn can_afford(&self, amount: Fixed) -> bool {
        self.credits >= amount
    }

    /// Credits currently stored.
    #[must_use]
    pub const fn stored_credits(&self) -> Fixed {
        self.credits
    }

    /// Storage capacity.
    #[must_use]
    pub const fn capacity(&self) -> Fixed {
        self.capacity
    }

    /// Change storage capacity (silos built or lost).
    pub fn set_capacity(&mut self, capacity: Fixed) {
        self.capacity = capacity.max(Fixed::ZERO);
    }

    /// Storage left before the silos are full.
    #[must_use]
    pub fn available_storage(&self) -> Fixed {
        (self.capacity - self.credits).max(Fixed::ZERO)
    }

    /// Check if the silos are full.
    #[must_use]
    pub fn is_storage_full(&self) -> bool {
        self.credits >= self.capacity
    }

    /// Total income from refined spice.
    #[must_use]
    pub const fn refined_total(&self) -> Fixed {
        self.refined_total
    }

    /// Whether repairs are running.
    #[must_use]
    pub const fn is_repair_active(&self) -> bool {
        self.repair_active
    }

    /// Number of times repairs were switched on.
    #[must_use]
    pub const fn repair_activations(&self) -> u32 {
        self.repair_activations
    }

    /// A repair yard started drawing credits.
    pub fn notify_repair_activated(&mut self) {
        if !self.repair_active {
            self.repair_active = true;
            self.repair_activations += 1;
        }
    }

    /// A repair yard stopped drawing credits.
    pub fn notify_repair_deactivated(&mut self) {
        self.repair_active = false;
    }
}

/// Economies of all houses in the game.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HouseTable {
    houses: BTreeMap<HouseId, HouseEconomy>,
}

impl HouseTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a house.
    pub fn insert(&mut self, house: HouseId, economy: HouseEconomy) {
        self.houses.insert(house, economy);
    }

    /// Economy of a house.
    #[must_use]
    pub fn get(&self, house: HouseId) -> Option<&HouseEconomy> {
        self.houses.get(&house)
    }

    /// Mutable economy of a house.
    pub fn get_mut(&mut self, house: HouseId) -> Option<&mut HouseEconomy> {
        self.houses.get_mut(&house)
    }

    /// Team of a house. Houses not in the table play alone.
    #[must_use]
    pub fn team_of(&self, house: HouseId) -> TeamId {
        self.houses.get(&house).map_or_else(
            || TeamId(u8::MAX - u8::try_from(house.index()).unwrap_or(0)),
            |economy| economy.team,
        )
    }

    /// Whether two houses are enemies.
    #[must_use]
    pub fn are_enemies(&self, a: HouseId, b: HouseId) -> bool {
        self.team_of(a) != self.team_of(b)
    }

    /// Iterate houses in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&HouseId, &HouseEconomy)> {
        self.houses.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn economy(credits: i32, capacity: i32) -> HouseEconomy {
        HouseEconomy::new(TeamId(0), Fixed::from_num(credits), Fixed::from_num(capacity))
    }

    #[test]
    fn test_add_credits_counts_refined_income() {
        let mut house = economy(0, 1000);
        house.add_credits(Fixed::from_num(50), true);
        house.add_credits(Fixed::from_num(20), false);

        assert_eq!(house.stored_credits(), Fixed::from_num(70));
        assert_eq!(house.refined_total(), Fixed::from_num(50));
    }

    #[test]
    fn test_take_credits_returns_amount_taken() {
        let mut house = economy(30, 1000);
        assert_eq!(house.take_credits(Fixed::from_num(20)), Fixed::from_num(20));
        assert_eq!(house.take_credits(Fixed::from_num(20)), Fixed::from_num(10));
        assert_eq!(house.stored_credits(), Fixed::ZERO);
    }

    #[test]
    fn test_storage_full() {
        let mut house = economy(90, 100);
        assert!(!house.is_storage_full());
        assert_eq!(house.available_storage(), Fixed::from_num(10));
        house.add_credits(Fixed::from_num(10), true);
        assert!(house.is_storage_full());
    }

    #[test]
    fn test_repair_notifications_count_activations_once() {
        let mut house = economy(0, 0);
        house.notify_repair_activated();
        house.notify_repair_activated();
        assert!(house.is_repair_active());
        assert_eq!(house.repair_activations(), 1);

        house.notify_repair_deactivated();
        assert!(!house.is_repair_active());
    }

    #[test]
    fn test_team_lookup() {
        let mut table = HouseTable::new();
        table.insert(HouseId::Atreides, economy(0, 0));
        table.insert(HouseId::Fremen, economy(0, 0));

        assert!(!table.are_enemies(HouseId::Atreides, HouseId::Fremen));
        assert!(table.are_enemies(HouseId::Atreides, HouseId::Harkonnen));
    }
}
