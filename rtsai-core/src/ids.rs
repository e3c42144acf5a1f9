//! Identifier types shared by the engine and its host.

use serde::{Deserialize, Serialize};

pub type PlayerId = u8;
pub type UnitTypeId = u16;
pub type UpgradeId = u16;
pub type SpellId = u16;
pub type FactionId = u16;
pub type DynastyId = u16;
pub type SettlementId = u32;
pub type MapLayer = u8;

/// Connected region of land or water. `0` means "no landmass".
pub type LandmassId = u32;
pub const NO_LANDMASS: LandmassId = 0;

/// Generational handle to a unit owned by the host.
///
/// A handle whose generation no longer matches the slot resolves to `None`;
/// the AI treats such units as gone and prunes them from its own lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitRef(pub u32, pub u32);

impl UnitRef {
    pub fn index(self) -> u32 {
        self.0
    }

    pub fn generation(self) -> u32 {
        self.1
    }
}

impl std::fmt::Display for UnitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}.{}", self.0, self.1)
    }
}

/// Tile coordinate on a map layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (diagonal steps cost the same as straight ones).
    pub fn distance(self, other: Pos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn manhattan(self, other: Pos) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn offset(self, dx: i32, dy: i32) -> Pos {
        Pos::new(self.x + dx, self.y + dy)
    }

    /// The 8 surrounding tiles, in a fixed order.
    pub fn around(self) -> [Pos; 8] {
        [
            self.offset(0, -1),
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, -1),
            self.offset(1, -1),
            self.offset(-1, 1),
            self.offset(1, 1),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distances() {
        let a = Pos::new(1, 1);
        let b = Pos::new(4, 3);
        assert_eq!(a.distance(b), 3);
        assert_eq!(a.manhattan(b), 5);
        assert!(a.around().iter().all(|p| p.distance(a) == 1));
    }
}
