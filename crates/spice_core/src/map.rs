//! Map and fog-of-war queries.
//!
//! The core only asks questions about the map through [`MapOracle`].
//! [`TileMap`] is the grid implementation used by the simulation driver
//! and by tests.

use serde::{Deserialize, Serialize};

use crate::factions::TeamId;
use crate::math::{fixed_serde, Coord, Fixed};

/// Ground type of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Terrain {
    /// Open sand.
    #[default]
    Sand,
    /// Solid rock (buildable).
    Rock,
    /// Sand dunes.
    Dunes,
    /// Sand carrying a spice field.
    Spice,
    /// Impassable mountains.
    Mountain,
}

impl Terrain {
    /// Whether ground units can stand here.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        !matches!(self, Self::Mountain)
    }

    /// Rock and dunes give indirect fire a damage bonus.
    #[must_use]
    pub const fn is_hard_ground(self) -> bool {
        matches!(self, Self::Rock | Self::Dunes)
    }
}

/// Queries the core makes against the map.
pub trait MapOracle {
    /// Whether `coord` lies on the map.
    fn tile_exists(&self, coord: Coord) -> bool;

    /// Whether the tile is not currently visible to `team`.
    ///
    /// Unexplored tiles are always fogged.
    fn is_fogged(&self, coord: Coord, team: TeamId) -> bool;

    /// Whether `team` has ever seen the tile.
    fn is_explored(&self, coord: Coord, team: TeamId) -> bool;

    /// Spice remaining on the tile (zero off-map).
    fn spice_at(&self, coord: Coord) -> Fixed;

    /// Remove up to `amount` spice from the tile and return what was taken.
    fn take_spice(&mut self, coord: Coord, amount: Fixed) -> Fixed;

    /// Terrain of the tile, `None` off-map.
    fn terrain_at(&self, coord: Coord) -> Option<Terrain>;

    /// Coarse aim point used when firing into fog.
    fn imprecise_center(&self, coord: Coord) -> Coord;

    /// Free tile next to the `size`×`size` footprint at `from`, as close to
    /// `towards` as possible. Falls back to `from` if nothing is free.
    fn find_deploy_spot(&self, from: Coord, towards: Coord, size: i32, occupied: &[Coord])
        -> Coord;
}

/// Side length of the blocks used for imprecise aiming.
const IMPRECISE_BLOCK: i32 = 4;

/// Deploy spots are searched at most this many rings out.
const MAX_DEPLOY_RING: i32 = 12;

/// One map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    /// Ground type.
    pub terrain: Terrain,
    /// Spice on the tile.
    #[serde(with = "fixed_serde")]
    pub spice: Fixed,
    /// Bit per team: tile currently visible.
    visible: u8,
    /// Bit per team: tile seen at least once.
    explored: u8,
}

/// Grid map with per-team visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    width: i32,
    height: i32,
    tiles: Vec<Tile>,
}

impl TileMap {
    /// Create a sand map, unexplored for everybody.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is not positive.
    #[must_use]
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0, "TileMap width must be positive");
        assert!(height > 0, "TileMap height must be positive");

        let count = (width as usize) * (height as usize);
        Self {
            width,
            height,
            tiles: vec![Tile::default(); count],
        }
    }

    /// Map width in tiles.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Map height in tiles.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, coord: Coord) -> Option<usize> {
        if self.tile_exists(coord) {
            Some((coord.y as usize) * (self.width as usize) + (coord.x as usize))
        } else {
            None
        }
    }

    /// Tile at `coord`.
    #[must_use]
    pub fn tile(&self, coord: Coord) -> Option<&Tile> {
        self.index(coord).map(|i| &self.tiles[i])
    }

    /// Set terrain. Returns `false` off-map.
    pub fn set_terrain(&mut self, coord: Coord, terrain: Terrain) -> bool {
        match self.index(coord) {
            Some(i) => {
                self.tiles[i].terrain = terrain;
                true
            }
            None => false,
        }
    }

    /// Put `amount` spice on a tile, turning it into a spice field.
    pub fn set_spice(&mut self, coord: Coord, amount: Fixed) -> bool {
        match self.index(coord) {
            Some(i) => {
                let tile = &mut self.tiles[i];
                tile.spice = amount.max(Fixed::ZERO);
                tile.terrain = if tile.spice > Fixed::ZERO {
                    Terrain::Spice
                } else {
                    Terrain::Sand
                };
                true
            }
            None => false,
        }
    }

    /// Make a tile visible (and explored) for `team`.
    pub fn reveal(&mut self, coord: Coord, team: TeamId) {
        if let Some(i) = self.index(coord) {
            let bit = team_bit(team);
            self.tiles[i].visible |= bit;
            self.tiles[i].explored |= bit;
        }
    }

    /// Cover an explored tile with fog for `team`.
    pub fn fog(&mut self, coord: Coord, team: TeamId) {
        if let Some(i) = self.index(coord) {
            self.tiles[i].visible &= !team_bit(team);
        }
    }

    /// Reveal the whole map for `team`.
    pub fn reveal_all(&mut self, team: TeamId) {
        let bit = team_bit(team);
        for tile in &mut self.tiles {
            tile.visible |= bit;
            tile.explored |= bit;
        }
    }
}

fn team_bit(team: TeamId) -> u8 {
    1u8 << (team.0 % 8)
}

impl MapOracle for TileMap {
    fn tile_exists(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height
    }

    fn is_fogged(&self, coord: Coord, team: TeamId) -> bool {
        self.tile(coord)
            .map_or(true, |tile| tile.visible & team_bit(team) == 0)
    }

    fn is_explored(&self, coord: Coord, team: TeamId) -> bool {
        self.tile(coord)
            .is_some_and(|tile| tile.explored & team_bit(team) != 0)
    }

    fn spice_at(&self, coord: Coord) -> Fixed {
        self.tile(coord).map_or(Fixed::ZERO, |tile| tile.spice)
    }

    fn take_spice(&mut self, coord: Coord, amount: Fixed) -> Fixed {
        let Some(i) = self.index(coord) else {
            return Fixed::ZERO;
        };
        let tile = &mut self.tiles[i];
        let taken = amount.min(tile.spice).max(Fixed::ZERO);
        tile.spice -= taken;
        if tile.spice == Fixed::ZERO && tile.terrain == Terrain::Spice {
            tile.terrain = Terrain::Sand;
        }
        taken
    }

    fn terrain_at(&self, coord: Coord) -> Option<Terrain> {
        self.tile(coord).map(|tile| tile.terrain)
    }

    fn imprecise_center(&self, coord: Coord) -> Coord {
        let snap = |v: i32, limit: i32| {
            let centre = v.div_euclid(IMPRECISE_BLOCK) * IMPRECISE_BLOCK + IMPRECISE_BLOCK / 2;
            centre.clamp(0, limit - 1)
        };
        Coord::new(snap(coord.x, self.width), snap(coord.y, self.height))
    }

    fn find_deploy_spot(
        &self,
        from: Coord,
        towards: Coord,
        size: i32,
        occupied: &[Coord],
    ) -> Coord {
        for ring in 1..=MAX_DEPLOY_RING {
            let min_x = from.x - ring;
            let min_y = from.y - ring;
            let max_x = from.x + size - 1 + ring;
            let max_y = from.y + size - 1 + ring;

            let mut best: Option<(Coord, Fixed)> = None;
            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    let on_ring = x == min_x || x == max_x || y == min_y || y == max_y;
                    if !on_ring {
                        continue;
                    }
                    let spot = Coord::new(x, y);
                    let free = self
                        .terrain_at(spot)
                        .is_some_and(Terrain::is_passable)
                        && !occupied.contains(&spot);
                    if !free {
                        continue;
                    }
                    let distance = spot.block_distance(towards);
                    if best.map_or(true, |(_, d)| distance < d) {
                        best = Some((spot, distance));
                    }
                }
            }

            if let Some((spot, _)) = best {
                return spot;
            }
        }

        from
    }
}
