//! Read-only game content: resources, unit types, upgrades, spells, factions.
//!
//! Built once by [`crate::content`] and shared by every AI player.

use crate::ids::{DynastyId, FactionId, SpellId, UnitTypeId, UpgradeId};
use crate::resources::{ResourceKind, Resources};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MoveDomain {
    #[default]
    Land,
    Naval,
    Air,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDef {
    pub kind: ResourceKind,
    pub ident: String,
    pub name: String,
    pub base_price: i64,
    pub tradeable: bool,
    /// Luxury resources are converted into `final_resource` by dedicated buildings.
    pub luxury: bool,
    pub final_resource: Option<ResourceKind>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitTypeDef {
    pub id: UnitTypeId,
    pub ident: String,
    pub name: String,
    pub class: Option<String>,
    pub civilization: Option<String>,
    pub costs: Resources,
    pub supply: i32,
    pub demand: i32,
    pub domain: MoveDomain,
    pub building: bool,
    pub town_hall: bool,
    pub dock: bool,
    pub market: bool,
    pub pathway: bool,
    pub wall: bool,
    pub minecart: bool,
    pub harvests: Vec<ResourceKind>,
    pub stores: Vec<ResourceKind>,
    /// Built on top of a raw deposit of this resource.
    pub extractor_for: Option<ResourceKind>,
    /// Deposits and extractors hand out this resource.
    pub gives_resource: Option<ResourceKind>,
    /// Workers can harvest the deposit without an extractor.
    pub directly_harvestable: bool,
    pub produces: Vec<ResourceKind>,
    pub transport_capacity: u32,
    pub board_size: u32,
    pub trains: Vec<UnitTypeId>,
    pub builds: Vec<UnitTypeId>,
    pub upgrades_to: Vec<UnitTypeId>,
    pub researches: Vec<UpgradeId>,
    pub requires_types: Vec<UnitTypeId>,
    pub requires_upgrades: Vec<UpgradeId>,
    pub spells: Vec<SpellId>,
    pub can_repair: bool,
    pub can_attack: bool,
    pub coward: bool,
    pub max_per_player: Option<u32>,
    pub hit_points: i32,
    pub mana: i32,
    pub sight: i32,
    pub attack_range: i32,
    pub ai_priority: i32,
}

impl UnitTypeDef {
    pub fn is_harvester(&self) -> bool {
        !self.harvests.is_empty()
    }

    pub fn is_transporter(&self) -> bool {
        self.transport_capacity > 0 && self.domain == MoveDomain::Naval
    }

    pub fn is_military(&self) -> bool {
        self.can_attack && !self.building && !self.coward && !self.is_harvester()
    }

    pub fn harvests_kind(&self, kind: ResourceKind) -> bool {
        self.harvests.contains(&kind)
    }

    /// Slots taken on a transporter; zero means "counts as one".
    pub fn board_slots(&self) -> u32 {
        self.board_size.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpgradeDef {
    pub id: UpgradeId,
    pub ident: String,
    pub name: String,
    pub costs: Resources,
    pub requires_types: Vec<UnitTypeId>,
    pub requires_upgrades: Vec<UpgradeId>,
    pub ai_priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpellTarget {
    Enemy,
    HurtAlly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpellDef {
    pub id: SpellId,
    pub ident: String,
    pub target: SpellTarget,
    pub range: i32,
    pub mana_cost: i32,
    pub autocast: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactionDef {
    pub id: FactionId,
    pub ident: String,
    pub civilization: String,
    pub playable: bool,
    /// Class name to the concrete unit type this faction uses for it.
    pub class_units: BTreeMap<String, UnitTypeId>,
    pub develops_to: Vec<FactionId>,
    pub requires_upgrades: Vec<UpgradeId>,
    pub costs: Resources,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynastyDef {
    pub id: DynastyId,
    pub ident: String,
    pub factions: Vec<FactionId>,
    pub requires_upgrades: Vec<UpgradeId>,
    pub costs: Resources,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub resources: Vec<ResourceDef>,
    pub unit_types: Vec<UnitTypeDef>,
    pub upgrades: Vec<UpgradeDef>,
    pub spells: Vec<SpellDef>,
    pub factions: Vec<FactionDef>,
    pub dynasties: Vec<DynastyDef>,
    /// Explicit groups of interchangeable unit types.
    pub equivalence_groups: Vec<Vec<UnitTypeId>>,
    /// The resource markets trade against.
    pub currency: ResourceKind,
}

impl Catalog {
    pub fn unit_type(&self, id: UnitTypeId) -> Option<&UnitTypeDef> {
        self.unit_types.get(id as usize)
    }

    pub fn upgrade(&self, id: UpgradeId) -> Option<&UpgradeDef> {
        self.upgrades.get(id as usize)
    }

    pub fn spell(&self, id: SpellId) -> Option<&SpellDef> {
        self.spells.get(id as usize)
    }

    pub fn faction(&self, id: FactionId) -> Option<&FactionDef> {
        self.factions.get(id as usize)
    }

    pub fn dynasty(&self, id: DynastyId) -> Option<&DynastyDef> {
        self.dynasties.get(id as usize)
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&ResourceDef> {
        self.resources.get(kind as usize)
    }

    pub fn resource_kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.resources.iter().map(|r| r.kind)
    }

    pub fn unit_type_by_ident(&self, ident: &str) -> Option<UnitTypeId> {
        self.unit_types
            .iter()
            .find(|t| t.ident == ident)
            .map(|t| t.id)
    }

    pub fn upgrade_by_ident(&self, ident: &str) -> Option<UpgradeId> {
        self.upgrades.iter().find(|u| u.ident == ident).map(|u| u.id)
    }

    pub fn resource_by_ident(&self, ident: &str) -> Option<ResourceKind> {
        self.resources
            .iter()
            .find(|r| r.ident == ident)
            .map(|r| r.kind)
    }

    pub fn faction_by_ident(&self, ident: &str) -> Option<FactionId> {
        self.factions.iter().find(|f| f.ident == ident).map(|f| f.id)
    }

    pub fn unit_type_ident(&self, id: UnitTypeId) -> &str {
        self.unit_type(id).map_or("?", |t| t.ident.as_str())
    }
}
