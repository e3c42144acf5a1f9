//! The read-only view of the game the AI decides from.
//!
//! The host implements [`WorldView`] (players, units, settlements, stances)
//! and [`TileMap`] (terrain). The AI never mutates either; it only emits
//! [`crate::command::Command`]s.

use crate::catalog::{Catalog, MoveDomain, UnitTypeDef};
use crate::ids::{
    DynastyId, FactionId, LandmassId, MapLayer, PlayerId, Pos, SettlementId, UnitRef, UnitTypeId,
    UpgradeId, NO_LANDMASS,
};
use crate::resources::{ResourceKind, Resources};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Terrain and occupancy bits of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct TileFlags(pub u16);

impl TileFlags {
    pub const LAND: TileFlags = TileFlags(1 << 0);
    pub const COAST: TileFlags = TileFlags(1 << 1);
    pub const WATER: TileFlags = TileFlags(1 << 2);
    pub const UNPASSABLE: TileFlags = TileFlags(1 << 3);
    pub const WALL: TileFlags = TileFlags(1 << 4);
    pub const BUILDING: TileFlags = TileFlags(1 << 5);
    pub const ROAD: TileFlags = TileFlags(1 << 6);
    pub const LAND_UNIT: TileFlags = TileFlags(1 << 7);
    pub const SEA_UNIT: TileFlags = TileFlags(1 << 8);
    pub const AIR_UNIT: TileFlags = TileFlags(1 << 9);
    pub const DEPOSIT: TileFlags = TileFlags(1 << 10);

    pub const NONE: TileFlags = TileFlags(0);

    pub fn contains(self, other: TileFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: TileFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn union(self, other: TileFlags) -> TileFlags {
        TileFlags(self.0 | other.0)
    }

    pub fn without(self, other: TileFlags) -> TileFlags {
        TileFlags(self.0 & !other.0)
    }
}

impl std::ops::BitOr for TileFlags {
    type Output = TileFlags;
    fn bitor(self, rhs: TileFlags) -> TileFlags {
        self.union(rhs)
    }
}

/// Tiles a mover of `domain` may not enter. Occupancy bits are stripped; only
/// terrain matters for reachability.
pub fn movement_mask(domain: MoveDomain) -> TileFlags {
    match domain {
        MoveDomain::Land => TileFlags::WATER | TileFlags::UNPASSABLE | TileFlags::WALL,
        MoveDomain::Naval => TileFlags::LAND | TileFlags::UNPASSABLE | TileFlags::WALL,
        MoveDomain::Air => TileFlags::NONE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stance {
    Neutral,
    Enemy,
    Allied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerKind {
    Computer,
    Person,
    Neutral,
    Nobody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub kind: PlayerKind,
    /// The local human's own player; unmatched completions are expected here.
    pub human_observed: bool,
    pub ai_name: Option<String>,
    pub passive: bool,
    pub civilization: Option<String>,
    pub faction: Option<FactionId>,
    pub dynasty: Option<DynastyId>,
    pub overlord: Option<PlayerId>,
    pub resources: Resources,
    pub supply: i32,
    pub demand: i32,
    pub military_score: i64,
    pub start_pos: Pos,
    pub start_layer: MapLayer,
    /// Position of the main town hall, if any.
    pub capital: Option<Pos>,
    /// Revealed players count as territorial even without a town hall.
    pub revealed: bool,
    pub upgrades: BTreeSet<UpgradeId>,
}

impl PlayerInfo {
    pub fn new(id: PlayerId, kind: PlayerKind) -> Self {
        Self {
            id,
            name: format!("Player {}", id),
            kind,
            human_observed: false,
            ai_name: None,
            passive: false,
            civilization: None,
            faction: None,
            dynasty: None,
            overlord: None,
            resources: Resources::new(),
            supply: 0,
            demand: 0,
            military_score: 0,
            start_pos: Pos::default(),
            start_layer: 0,
            capital: None,
            revealed: false,
            upgrades: BTreeSet::new(),
        }
    }
}

/// What a unit is currently doing, as far as the AI cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Still,
    StandGround,
    Move { goal: Pos, layer: MapLayer },
    Attack { target: Option<UnitRef>, goal: Pos },
    Build { unit_type: UnitTypeId, pos: Pos },
    Train { unit_type: UnitTypeId },
    UpgradeTo { unit_type: UnitTypeId },
    Research { upgrade: UpgradeId },
    Harvest { resource: ResourceKind },
    ReturnGoods,
    Board { transporter: UnitRef },
    Unload,
    Follow { target: UnitRef },
    Repair { target: UnitRef },
    Explore,
    CastSpell,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    pub id: UnitRef,
    pub player: PlayerId,
    pub unit_type: UnitTypeId,
    pub pos: Pos,
    pub layer: MapLayer,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub under_construction: bool,
    /// Inside a building or transporter.
    pub removed: bool,
    pub order: Order,
    pub cargo: Option<(ResourceKind, i32)>,
    pub boarded_on: Option<UnitRef>,
    pub passengers: Vec<UnitRef>,
    /// Resource a dual-purpose building currently produces.
    pub producing: Option<ResourceKind>,
    pub settlement: Option<SettlementId>,
}

impl UnitInfo {
    pub fn is_idle(&self) -> bool {
        matches!(self.order, Order::Still | Order::StandGround) && !self.under_construction
    }

    pub fn is_hurt(&self) -> bool {
        self.hp < self.max_hp
    }

    pub fn harvesting(&self) -> Option<ResourceKind> {
        match self.order {
            Order::Harvest { resource } => Some(resource),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub id: SettlementId,
    pub name: String,
    pub pos: Pos,
    pub layer: MapLayer,
    pub owner: Option<PlayerId>,
    pub town_hall: Option<UnitRef>,
}

/// Terrain queries. Positions outside the map have empty flags.
pub trait TileMap {
    fn layer_size(&self, layer: MapLayer) -> (i32, i32);
    fn flags(&self, pos: Pos, layer: MapLayer) -> TileFlags;
    fn landmass(&self, pos: Pos, layer: MapLayer) -> LandmassId;
    fn is_water_landmass(&self, landmass: LandmassId) -> bool;
    /// Landmasses touching `landmass`, sorted ascending.
    fn border_landmasses(&self, landmass: LandmassId) -> Vec<LandmassId>;
    fn tile_owner(&self, pos: Pos, layer: MapLayer) -> Option<PlayerId>;
    fn is_explored(&self, player: PlayerId, pos: Pos, layer: MapLayer) -> bool;

    fn in_bounds(&self, pos: Pos, layer: MapLayer) -> bool {
        let (w, h) = self.layer_size(layer);
        pos.x >= 0 && pos.y >= 0 && pos.x < w && pos.y < h
    }

    /// Whether a mover of `domain` may stand on `pos`.
    fn passable(&self, pos: Pos, layer: MapLayer, domain: MoveDomain) -> bool {
        self.in_bounds(pos, layer) && !self.flags(pos, layer).intersects(movement_mask(domain))
    }
}

/// Game state the AI may read.
pub trait WorldView: TileMap {
    fn cycle(&self) -> u64;
    fn is_campaign(&self) -> bool;
    fn player(&self, id: PlayerId) -> Option<&PlayerInfo>;
    fn player_ids(&self) -> Vec<PlayerId>;
    /// `None` for dead units and stale handles.
    fn unit(&self, unit: UnitRef) -> Option<&UnitInfo>;
    /// Living units of `player`, in a stable order.
    fn units_of(&self, player: PlayerId) -> Vec<UnitRef>;
    /// Living units on `pos`.
    fn units_at(&self, pos: Pos, layer: MapLayer) -> Vec<UnitRef>;
    fn settlements(&self) -> &[Settlement];
    /// How `from` regards `to`.
    fn stance(&self, from: PlayerId, to: PlayerId) -> Stance;
    /// Whether the two players own adjacent territory.
    fn borders(&self, a: PlayerId, b: PlayerId) -> bool;
    fn market_price(&self, resource: ResourceKind) -> i64;

    fn is_enemy(&self, from: PlayerId, to: PlayerId) -> bool {
        from != to && self.stance(from, to) == Stance::Enemy
    }

    fn is_allied(&self, from: PlayerId, to: PlayerId) -> bool {
        from == to || self.stance(from, to) == Stance::Allied
    }

    fn unit_landmass(&self, unit: &UnitInfo) -> LandmassId {
        if unit.removed {
            return unit
                .boarded_on
                .and_then(|t| self.unit(t))
                .map(|t| self.landmass(t.pos, t.layer))
                .unwrap_or(NO_LANDMASS);
        }
        self.landmass(unit.pos, unit.layer)
    }

    /// Living units within `range` tiles of `pos`, in ascending handle order.
    fn units_in_range(&self, pos: Pos, layer: MapLayer, range: i32) -> Vec<UnitRef> {
        let mut out = Vec::new();
        for dy in -range..=range {
            for dx in -range..=range {
                out.extend(self.units_at(pos.offset(dx, dy), layer));
            }
        }
        out.sort();
        out
    }

    fn can_build_at(&self, catalog: &Catalog, unit_type: &UnitTypeDef, pos: Pos, layer: MapLayer) -> bool {
        can_build_at(self, catalog, unit_type, pos, layer)
    }
}

/// Default placement rules: dry free ground, coast for docks, and a matching
/// deposit underneath extractors.
pub fn can_build_at<W: WorldView + ?Sized>(
    world: &W,
    catalog: &Catalog,
    unit_type: &UnitTypeDef,
    pos: Pos,
    layer: MapLayer,
) -> bool {
    if !world.in_bounds(pos, layer) {
        return false;
    }
    let flags = world.flags(pos, layer);
    if flags.intersects(TileFlags::UNPASSABLE | TileFlags::WALL | TileFlags::BUILDING | TileFlags::WATER) {
        return false;
    }
    if unit_type.dock && !flags.contains(TileFlags::COAST) {
        return false;
    }
    let occupants = world.units_at(pos, layer);
    match unit_type.extractor_for {
        Some(kind) => occupants.iter().any(|&u| {
            world
                .unit(u)
                .and_then(|u| catalog.unit_type(u.unit_type))
                .is_some_and(|t| t.gives_resource == Some(kind) && !t.directly_harvestable && !t.building)
        }),
        None => occupants.is_empty() && !flags.contains(TileFlags::DEPOSIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let f = TileFlags::LAND | TileFlags::COAST;
        assert!(f.contains(TileFlags::LAND));
        assert!(!f.contains(TileFlags::LAND | TileFlags::WATER));
        assert!(f.intersects(TileFlags::LAND | TileFlags::WATER));
        assert_eq!(f.without(TileFlags::COAST), TileFlags::LAND);
    }

    #[test]
    fn test_movement_masks() {
        assert!(movement_mask(MoveDomain::Land).contains(TileFlags::WATER));
        assert!(movement_mask(MoveDomain::Naval).contains(TileFlags::LAND));
        assert_eq!(movement_mask(MoveDomain::Air), TileFlags::NONE);
    }
}
