//! Per-player AI state. Everything here is owned by the AI and persisted.

use crate::force::ForceList;
use crate::ids::{LandmassId, MapLayer, PlayerId, Pos, SettlementId, UnitRef, UnitTypeId, UpgradeId};
use crate::resources::{ResourceKind, ResourceMask, Resources};
use crate::world::TileFlags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pending production goal.
///
/// `made` counts commands already issued for this entry; `wanted` counts units
/// still expected. Both drop by one when a unit completes, and the entry is
/// removed once `wanted` reaches zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub unit_type: UnitTypeId,
    pub wanted: u32,
    pub made: u32,
    pub landmass: Option<LandmassId>,
    pub settlement: Option<SettlementId>,
    pub pos: Option<Pos>,
    #[serde(default)]
    pub layer: MapLayer,
    /// No attempt before this cycle.
    #[serde(default)]
    pub retry_at: u64,
    #[serde(default)]
    pub failed_placements: u32,
}

impl BuildRequest {
    pub fn new(unit_type: UnitTypeId, wanted: u32) -> Self {
        Self {
            unit_type,
            wanted,
            made: 0,
            landmass: None,
            settlement: None,
            pos: None,
            layer: 0,
            retry_at: 0,
            failed_placements: 0,
        }
    }

    pub fn pending(&self) -> u32 {
        self.wanted.saturating_sub(self.made)
    }

    /// Whether a completion reported with these tags belongs to this entry.
    /// Untagged reports match any entry.
    pub fn matches(&self, landmass: Option<LandmassId>, settlement: Option<SettlementId>) -> bool {
        let lm_ok = match (self.landmass, landmass) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        let st_ok = match (self.settlement, settlement) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        lm_ok && st_ok
    }
}

/// Where a request should be fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestTarget {
    pub landmass: Option<LandmassId>,
    pub settlement: Option<SettlementId>,
    pub pos: Option<(Pos, MapLayer)>,
}

impl RequestTarget {
    pub fn landmass(landmass: LandmassId) -> Self {
        Self {
            landmass: Some(landmass),
            ..Default::default()
        }
    }

    pub fn at(pos: Pos, layer: MapLayer) -> Self {
        Self {
            pos: Some((pos, layer)),
            ..Default::default()
        }
    }
}

/// A "keep this many of this type around" wish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitWish {
    pub unit_type: UnitTypeId,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationRequest {
    pub pos: Pos,
    pub layer: MapLayer,
    /// Terrain the explorer must be able to cross.
    pub mask: TileFlags,
}

/// Defenders being ferried toward a threatened site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTransport {
    pub site: UnitRef,
    pub units: Vec<UnitRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiPlayerState {
    pub player: PlayerId,
    /// Identifier of the chosen AI type.
    pub ai_type: String,
    #[serde(default)]
    pub script_debug: bool,
    /// Next script step to run.
    #[serde(default)]
    pub script_pos: usize,
    /// The script sleeps until this cycle.
    #[serde(default)]
    pub sleep_cycles: u64,
    #[serde(default)]
    pub forces: ForceList,
    #[serde(default)]
    pub build_queue: Vec<BuildRequest>,
    #[serde(default)]
    pub unit_type_requests: Vec<UnitWish>,
    #[serde(default)]
    pub upgrade_to_requests: Vec<UnitTypeId>,
    #[serde(default)]
    pub research_requests: Vec<UpgradeId>,
    #[serde(default)]
    pub reserve: Resources,
    #[serde(default)]
    pub used: Resources,
    #[serde(default)]
    pub needed: Resources,
    #[serde(default)]
    pub collect: BTreeMap<ResourceKind, i32>,
    #[serde(default)]
    pub needed_mask: ResourceMask,
    #[serde(default)]
    pub need_supply: bool,
    #[serde(default)]
    pub transporters: BTreeMap<LandmassId, Vec<UnitRef>>,
    #[serde(default)]
    pub site_transport_units: Vec<SiteTransport>,
    #[serde(default)]
    pub scouts: Vec<UnitRef>,
    #[serde(default)]
    pub exploration_requests: Vec<ExplorationRequest>,
    #[serde(default)]
    pub last_exploration_cycle: u64,
    #[serde(default)]
    pub last_cannot_move_cycle: u64,
    pub last_repair_unit: Option<UnitRef>,
    pub last_pathway_construction_unit: Option<UnitRef>,
}

impl AiPlayerState {
    pub fn new(player: PlayerId, ai_type: &str) -> Self {
        Self {
            player,
            ai_type: ai_type.to_string(),
            script_debug: false,
            script_pos: 0,
            sleep_cycles: 0,
            forces: ForceList::default(),
            build_queue: Vec::new(),
            unit_type_requests: Vec::new(),
            upgrade_to_requests: Vec::new(),
            research_requests: Vec::new(),
            reserve: Resources::new(),
            used: Resources::new(),
            needed: Resources::new(),
            collect: BTreeMap::new(),
            needed_mask: ResourceMask::default(),
            need_supply: false,
            transporters: BTreeMap::new(),
            site_transport_units: Vec::new(),
            scouts: Vec::new(),
            exploration_requests: Vec::new(),
            last_exploration_cycle: 0,
            last_cannot_move_cycle: 0,
            last_repair_unit: None,
            last_pathway_construction_unit: None,
        }
    }

    /// Units still expected from the queue for `unit_type`.
    pub fn queued(&self, unit_type: UnitTypeId) -> u32 {
        self.build_queue
            .iter()
            .filter(|r| r.unit_type == unit_type)
            .map(|r| r.wanted)
            .sum()
    }

    pub fn wish(&self, unit_type: UnitTypeId) -> Option<u32> {
        self.unit_type_requests
            .iter()
            .find(|w| w.unit_type == unit_type)
            .map(|w| w.count)
    }

    /// Sets the wish for `unit_type`, replacing an earlier one.
    pub fn set_wish(&mut self, unit_type: UnitTypeId, count: u32) {
        match self
            .unit_type_requests
            .iter_mut()
            .find(|w| w.unit_type == unit_type)
        {
            Some(w) => w.count = count,
            None => self.unit_type_requests.push(UnitWish { unit_type, count }),
        }
    }

    pub fn is_transporter(&self, unit: UnitRef) -> bool {
        self.transporters.values().any(|list| list.contains(&unit))
    }

    /// Drops every reference to a unit that no longer exists.
    pub fn forget_unit(&mut self, unit: UnitRef) {
        self.forces.remove(unit);
        self.scouts.retain(|&u| u != unit);
        for list in self.transporters.values_mut() {
            list.retain(|&u| u != unit);
        }
        self.transporters.retain(|_, list| !list.is_empty());
        for site in &mut self.site_transport_units {
            site.units.retain(|&u| u != unit);
        }
        self.site_transport_units
            .retain(|s| s.site != unit && !s.units.is_empty());
    }
}
