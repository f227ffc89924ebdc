//! House identifiers and team alliances.

use serde::{Deserialize, Serialize};

/// The playable houses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HouseId {
    /// House Harkonnen.
    Harkonnen,
    /// House Atreides.
    Atreides,
    /// House Ordos.
    Ordos,
    /// The Fremen.
    Fremen,
    /// The Sardaukar.
    Sardaukar,
    /// The Mercenaries.
    Mercenary,
}

impl HouseId {
    /// Every house in a stable order.
    pub const ALL: [Self; 6] = [
        Self::Harkonnen,
        Self::Atreides,
        Self::Ordos,
        Self::Fremen,
        Self::Sardaukar,
        Self::Mercenary,
    ];

    /// Get the display name for this house.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Harkonnen => "House Harkonnen",
            Self::Atreides => "House Atreides",
            Self::Ordos => "House Ordos",
            Self::Fremen => "Fremen",
            Self::Sardaukar => "Sardaukar",
            Self::Mercenary => "Mercenaries",
        }
    }

    /// Position of the house in [`HouseId::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Team index used for fog of war and alliance checks.
///
/// Houses on the same team share map knowledge and never target each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub u8);
