//! A small in-memory host for tests and the headless runner.
//!
//! [`SandboxWorld`] implements [`WorldView`] over a single-layer tile grid and
//! applies AI commands with deliberately simple effects: training and building
//! take a fixed time, harvesting pays a flat rate per second, units walk one
//! tile per second and fights deal flat damage. It is enough to exercise every
//! manager end to end, not to balance a game.

use crate::ai_type::AiType;
use crate::catalog::{Catalog, MoveDomain, SpellTarget};
use crate::command::{Command, HarvestTarget, PlayerInputs};
use crate::config::AiConfig;
use crate::content::load_content;
use crate::context::TickContext;
use crate::events::AiEvent;
use crate::helpers::AiHelpers;
use crate::ids::{LandmassId, MapLayer, PlayerId, Pos, SettlementId, UnitRef, UnitTypeId};
use crate::resources::{ResourceKind, Resources};
use crate::rng::SyncRng;
use crate::state::AiPlayerState;
use crate::world::{
    can_build_at, Order, PlayerInfo, PlayerKind, Settlement, Stance, TileFlags, TileMap, UnitInfo,
    WorldView,
};
use game_pathfinding::{FloodFill, Graph, VisitResult};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, BTreeSet};

pub const SAMPLE_CONTENT: &str = include_str!("../data/sample_content.txt");

/// Cycles per second the sandbox simulates with.
pub const SANDBOX_CPS: u64 = 30;
/// Training, building, upgrading and research all take this long.
pub const JOB_CYCLES: u64 = 150;
const HARVEST_RATE: i64 = 4;
const PRODUCE_RATE: i64 = 2;
const ATTACK_DAMAGE: i32 = 10;
const SPELL_AMOUNT: i32 = 20;
const REPAIR_AMOUNT: i32 = 20;
const TRADE_LOT: i64 = 100;
const SETTLEMENT_RADIUS: i32 = 10;

/// The bundled sample catalog. Empty if the bundled text fails to load, which
/// the content tests catch first.
pub fn sample_catalog() -> Catalog {
    load_content(SAMPLE_CONTENT)
        .map(|c| c.catalog)
        .unwrap_or_default()
}

fn sample_ai_type(ident: &str) -> AiType {
    load_content(SAMPLE_CONTENT)
        .ok()
        .and_then(|c| c.ai_types.into_iter().find(|t| t.ident == ident))
        .unwrap_or_default()
}

/// Inclusive tile rectangle.
#[derive(Debug, Clone, Copy)]
struct Rect {
    from: Pos,
    to: Pos,
}

impl Rect {
    fn new(a: Pos, b: Pos) -> Self {
        Rect {
            from: Pos::new(a.x.min(b.x), a.y.min(b.y)),
            to: Pos::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    fn contains(&self, p: Pos) -> bool {
        p.x >= self.from.x && p.x <= self.to.x && p.y >= self.from.y && p.y <= self.to.y
    }
}

pub struct SandboxBuilder {
    width: i32,
    height: i32,
    water: Vec<Rect>,
    walls: Vec<Pos>,
    rough: Vec<Pos>,
    players: Vec<PlayerInfo>,
    stances: Vec<(PlayerId, PlayerId, Stance)>,
    borders: Vec<(PlayerId, PlayerId)>,
    owners: Vec<(PlayerId, Rect)>,
    hidden: Vec<Rect>,
    settlements: Vec<(String, Pos)>,
    campaign: bool,
}

impl SandboxBuilder {
    /// An all-land map with no players.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            water: Vec::new(),
            walls: Vec::new(),
            rough: Vec::new(),
            players: Vec::new(),
            stances: Vec::new(),
            borders: Vec::new(),
            owners: Vec::new(),
            hidden: Vec::new(),
            settlements: Vec::new(),
            campaign: false,
        }
    }

    pub fn water(mut self, from: Pos, to: Pos) -> Self {
        self.water.push(Rect::new(from, to));
        self
    }

    pub fn wall(mut self, pos: Pos) -> Self {
        self.walls.push(pos);
        self
    }

    /// Land nothing may cross.
    pub fn unpassable(mut self, pos: Pos) -> Self {
        self.rough.push(pos);
        self
    }

    pub fn player(mut self, info: PlayerInfo) -> Self {
        self.players.retain(|p| p.id != info.id);
        self.players.push(info);
        self
    }

    /// A norse computer player with a comfortable stockpile.
    pub fn computer(self, id: PlayerId) -> Self {
        let mut info = PlayerInfo::new(id, PlayerKind::Computer);
        info.civilization = Some("norse".to_string());
        info.resources = Resources::new().with(0, 2000).with(1, 1000).with(2, 500);
        self.player(info)
    }

    /// How `from` regards `to`; the other direction is untouched.
    pub fn stance(mut self, from: PlayerId, to: PlayerId, stance: Stance) -> Self {
        self.stances.push((from, to, stance));
        self
    }

    pub fn war(self, a: PlayerId, b: PlayerId) -> Self {
        self.stance(a, b, Stance::Enemy).stance(b, a, Stance::Enemy)
    }

    pub fn border(mut self, a: PlayerId, b: PlayerId) -> Self {
        self.borders.push((a.min(b), a.max(b)));
        self
    }

    pub fn owner(mut self, player: PlayerId, from: Pos, to: Pos) -> Self {
        self.owners.push((player, Rect::new(from, to)));
        self
    }

    /// Tiles no player has explored yet.
    pub fn unexplored(mut self, from: Pos, to: Pos) -> Self {
        self.hidden.push(Rect::new(from, to));
        self
    }

    pub fn settlement(mut self, name: &str, pos: Pos) -> Self {
        self.settlements.push((name.to_string(), pos));
        self
    }

    pub fn campaign(mut self, on: bool) -> Self {
        self.campaign = on;
        self
    }

    pub fn build(self, catalog: Catalog) -> SandboxWorld {
        let (w, h) = (self.width.max(1), self.height.max(1));
        let mut terrain = vec![TileFlags::LAND; (w * h) as usize];
        let mut owners = vec![None; (w * h) as usize];
        let mut hidden = FxHashSet::default();
        for y in 0..h {
            for x in 0..w {
                let p = Pos::new(x, y);
                let i = (y * w + x) as usize;
                if self.water.iter().any(|r| r.contains(p)) {
                    terrain[i] = TileFlags::WATER;
                }
                if self.walls.contains(&p) {
                    terrain[i] = TileFlags::LAND | TileFlags::WALL;
                }
                if self.rough.contains(&p) {
                    terrain[i] = TileFlags::LAND | TileFlags::UNPASSABLE;
                }
                if let Some((player, _)) = self.owners.iter().rev().find(|(_, r)| r.contains(p)) {
                    owners[i] = Some(*player);
                }
                if self.hidden.iter().any(|r| r.contains(p)) {
                    hidden.insert(p);
                }
            }
        }
        // Land touching water is coast.
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) as usize;
                if !terrain[i].contains(TileFlags::LAND) {
                    continue;
                }
                let wet = Pos::new(x, y).around().into_iter().any(|n| {
                    n.x >= 0
                        && n.y >= 0
                        && n.x < w
                        && n.y < h
                        && terrain[(n.y * w + n.x) as usize].contains(TileFlags::WATER)
                });
                if wet {
                    terrain[i] = terrain[i] | TileFlags::COAST;
                }
            }
        }

        let mut world = SandboxWorld {
            catalog,
            width: w,
            height: h,
            terrain,
            landmass: Vec::new(),
            water_landmasses: BTreeSet::new(),
            landmass_borders: BTreeMap::new(),
            owners,
            hidden,
            revealed: BTreeMap::new(),
            cycle: 0,
            campaign: self.campaign,
            players: self.players.into_iter().map(|p| (p.id, p)).collect(),
            slots: Vec::new(),
            occupancy: FxHashMap::default(),
            settlements: self
                .settlements
                .into_iter()
                .enumerate()
                .map(|(i, (name, pos))| Settlement {
                    id: i as SettlementId + 1,
                    name,
                    pos,
                    layer: 0,
                    owner: None,
                    town_hall: None,
                })
                .collect(),
            stances: self
                .stances
                .into_iter()
                .map(|(a, b, s)| ((a, b), s))
                .collect(),
            borders: self.borders.into_iter().collect(),
            jobs: Vec::new(),
        };
        world.label_landmasses();
        world
    }
}

/// Same-kind neighbours on the grid, for landmass labelling.
struct KindGraph<'a> {
    world: &'a SandboxWorld,
}

impl Graph<Pos, bool> for KindGraph<'_> {
    fn neighbors(&self, node: Pos, wet: &bool) -> Vec<Pos> {
        node.around()
            .into_iter()
            .filter(|&p| self.world.in_bounds(p, 0) && self.world.is_wet(p) == *wet)
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    unit: Option<UnitInfo>,
}

#[derive(Debug, Clone)]
enum JobKind {
    Train {
        trainer: UnitRef,
        unit_type: UnitTypeId,
    },
    Build {
        builder: Option<UnitRef>,
        site: UnitRef,
    },
    UpgradeTo {
        unit: UnitRef,
        unit_type: UnitTypeId,
    },
    Research {
        researcher: UnitRef,
        player: PlayerId,
        upgrade: u16,
    },
}

#[derive(Debug, Clone)]
struct Job {
    ready_at: u64,
    kind: JobKind,
}

/// The sandbox host: one map layer, units in generational slots.
#[derive(Debug, Clone)]
pub struct SandboxWorld {
    catalog: Catalog,
    width: i32,
    height: i32,
    terrain: Vec<TileFlags>,
    landmass: Vec<LandmassId>,
    water_landmasses: BTreeSet<LandmassId>,
    landmass_borders: BTreeMap<LandmassId, Vec<LandmassId>>,
    owners: Vec<Option<PlayerId>>,
    hidden: FxHashSet<Pos>,
    revealed: BTreeMap<PlayerId, FxHashSet<Pos>>,
    cycle: u64,
    campaign: bool,
    players: BTreeMap<PlayerId, PlayerInfo>,
    slots: Vec<Slot>,
    occupancy: FxHashMap<Pos, Vec<UnitRef>>,
    settlements: Vec<Settlement>,
    stances: BTreeMap<(PlayerId, PlayerId), Stance>,
    borders: BTreeSet<(PlayerId, PlayerId)>,
    jobs: Vec<Job>,
}

impl SandboxWorld {
    fn index(&self, p: Pos) -> Option<usize> {
        self.in_bounds(p, 0)
            .then(|| (p.y * self.width + p.x) as usize)
    }

    fn is_wet(&self, p: Pos) -> bool {
        self.index(p)
            .is_some_and(|i| self.terrain[i].contains(TileFlags::WATER))
    }

    fn label_landmasses(&mut self) {
        let mut labels = vec![0 as LandmassId; self.terrain.len()];
        let mut next: LandmassId = 1;
        let mut water = BTreeSet::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let start = Pos::new(x, y);
                let i = (y * self.width + x) as usize;
                if labels[i] != 0 {
                    continue;
                }
                let wet = self.is_wet(start);
                let id = next;
                next += 1;
                if wet {
                    water.insert(id);
                }
                labels[i] = id;
                let mut members = Vec::new();
                FloodFill::new([start]).run(&KindGraph { world: &*self }, &wet, |_, to| {
                    members.push(to);
                    VisitResult::Continue
                });
                for p in members {
                    labels[(p.y * self.width + p.x) as usize] = id;
                }
            }
        }
        let mut borders: BTreeMap<LandmassId, BTreeSet<LandmassId>> = BTreeMap::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let a = labels[(y * self.width + x) as usize];
                for n in Pos::new(x, y).around() {
                    if let Some(j) = self.index(n) {
                        let b = labels[j];
                        if a != b {
                            borders.entry(a).or_default().insert(b);
                        }
                    }
                }
            }
        }
        self.landmass = labels;
        self.water_landmasses = water;
        self.landmass_borders = borders
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().collect()))
            .collect();
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn set_cycle(&mut self, cycle: u64) {
        self.cycle = cycle;
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerInfo> {
        self.players.get_mut(&id)
    }

    pub fn set_stance(&mut self, from: PlayerId, to: PlayerId, stance: Stance) {
        self.stances.insert((from, to), stance);
    }

    /// Mutable access for hit points, orders and the like. Use
    /// [`SandboxWorld::move_unit`] to change positions.
    pub fn unit_mut(&mut self, unit: UnitRef) -> Option<&mut UnitInfo> {
        self.slots
            .get_mut(unit.0 as usize)
            .filter(|s| s.generation == unit.1)
            .and_then(|s| s.unit.as_mut())
    }

    fn nearest_settlement(&self, pos: Pos) -> Option<SettlementId> {
        self.settlements
            .iter()
            .filter(|s| s.pos.distance(pos) <= SETTLEMENT_RADIUS)
            .min_by_key(|s| (s.pos.distance(pos), s.id))
            .map(|s| s.id)
    }

    /// Places a finished unit of `unit_type` for `player`.
    pub fn spawn(&mut self, player: PlayerId, unit_type: UnitTypeId, pos: Pos) -> UnitRef {
        let def = self.catalog.unit_type(unit_type);
        let hp = def.map_or(1, |d| d.hit_points.max(1));
        let mana = def.map_or(0, |d| d.mana);
        let hall = def.is_some_and(|d| d.town_hall);
        let info = UnitInfo {
            id: UnitRef(0, 0),
            player,
            unit_type,
            pos,
            layer: 0,
            hp,
            max_hp: hp,
            mana,
            under_construction: false,
            removed: false,
            order: Order::Still,
            cargo: None,
            boarded_on: None,
            passengers: Vec::new(),
            producing: None,
            settlement: self.nearest_settlement(pos),
        };
        let id = self.insert(info);
        if hall {
            self.claim_settlement(player, pos, id);
        }
        self.reveal_around(id);
        self.refresh_players();
        id
    }

    fn claim_settlement(&mut self, player: PlayerId, pos: Pos, hall: UnitRef) {
        if let Some(s) = self
            .settlements
            .iter_mut()
            .find(|s| s.owner.is_none() && s.pos.distance(pos) <= 3)
        {
            s.owner = Some(player);
            s.town_hall = Some(hall);
        }
    }

    fn insert(&mut self, mut info: UnitInfo) -> UnitRef {
        let slot = self.slots.iter().position(|s| s.unit.is_none());
        let id = match slot {
            Some(i) => UnitRef(i as u32, self.slots[i].generation),
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    unit: None,
                });
                UnitRef(self.slots.len() as u32 - 1, 0)
            }
        };
        info.id = id;
        self.occupancy.entry(info.pos).or_default().push(id);
        self.slots[id.0 as usize].unit = Some(info);
        id
    }

    pub fn move_unit(&mut self, unit: UnitRef, to: Pos) {
        let Some(from) = self.unit(unit).map(|u| (u.pos, u.removed)) else {
            return;
        };
        if !from.1 {
            self.vacate(unit, from.0);
            self.occupancy.entry(to).or_default().push(unit);
        }
        if let Some(u) = self.unit_mut(unit) {
            u.pos = to;
        }
        self.reveal_around(unit);
    }

    fn vacate(&mut self, unit: UnitRef, pos: Pos) {
        if let Some(list) = self.occupancy.get_mut(&pos) {
            list.retain(|&u| u != unit);
            if list.is_empty() {
                self.occupancy.remove(&pos);
            }
        }
    }

    /// Removes `unit` from the map. Passengers die with their transporter.
    pub fn kill(&mut self, unit: UnitRef) -> Vec<AiEvent> {
        let Some(info) = self
            .slots
            .get_mut(unit.0 as usize)
            .filter(|s| s.generation == unit.1)
            .and_then(|s| s.unit.take())
        else {
            return Vec::new();
        };
        self.slots[unit.0 as usize].generation += 1;
        if !info.removed {
            self.vacate(unit, info.pos);
        }
        if let Some(t) = info.boarded_on.and_then(|t| self.unit_mut(t)) {
            t.passengers.retain(|&p| p != unit);
        }
        let mut events = vec![AiEvent::UnitKilled {
            player: info.player,
            unit,
        }];
        for p in info.passengers {
            events.extend(self.kill(p));
        }
        self.refresh_players();
        events
    }

    fn reveal_around(&mut self, unit: UnitRef) {
        if self.hidden.is_empty() {
            return;
        }
        let Some(info) = self.unit(unit) else { return };
        let sight = self
            .catalog
            .unit_type(info.unit_type)
            .map_or(1, |t| t.sight.max(1));
        let (player, center) = (info.player, info.pos);
        let seen = self.revealed.entry(player).or_default();
        for dy in -sight..=sight {
            for dx in -sight..=sight {
                seen.insert(center.offset(dx, dy));
            }
        }
    }

    /// Recomputes supply, demand, capital and military score from the units.
    pub fn refresh_players(&mut self) {
        let mut totals: BTreeMap<PlayerId, (i32, i32, Option<Pos>, i64)> = BTreeMap::new();
        for slot in &self.slots {
            let Some(u) = &slot.unit else { continue };
            let Some(t) = self.catalog.unit_type(u.unit_type) else { continue };
            let entry = totals.entry(u.player).or_insert((0, 0, None, 0));
            if u.under_construction {
                continue;
            }
            entry.0 += t.supply;
            entry.1 += t.demand;
            if t.town_hall && entry.2.is_none() {
                entry.2 = Some(u.pos);
            }
            if t.is_military() {
                entry.3 += u.hp as i64;
            }
        }
        for (id, p) in self.players.iter_mut() {
            let (supply, demand, capital, score) = totals.get(id).copied().unwrap_or_default();
            p.supply = supply;
            p.demand = demand;
            p.capital = capital;
            p.military_score = score;
        }
    }

    fn owned_by(&self, unit: UnitRef, player: PlayerId) -> bool {
        self.unit(unit).is_some_and(|u| u.player == player)
    }

    fn set_order(&mut self, unit: UnitRef, order: Order) {
        if let Some(u) = self.unit_mut(unit) {
            u.order = order;
        }
    }

    fn charge(&mut self, player: PlayerId, cost: &Resources) -> bool {
        let Some(p) = self.players.get_mut(&player) else {
            return false;
        };
        if !p.resources.covers(cost) {
            return false;
        }
        p.resources.sub_all(cost);
        true
    }

    fn free_tile_near(&self, center: Pos, domain: MoveDomain) -> Option<Pos> {
        for r in 1..=3 {
            for dy in -r..=r {
                for dx in -r..=r {
                    let p = center.offset(dx, dy);
                    if p.distance(center) == r
                        && self.passable(p, 0, domain)
                        && !self.flags(p, 0).contains(TileFlags::BUILDING)
                        && self.units_at(p, 0).is_empty()
                    {
                        return Some(p);
                    }
                }
            }
        }
        None
    }

    /// Applies one player's commands. Commands for units the player does not
    /// own are ignored.
    pub fn apply(&mut self, inputs: &PlayerInputs) -> Vec<AiEvent> {
        let player = inputs.player;
        let mut events = Vec::new();
        for command in &inputs.commands {
            if let Some(actor) = command.actor() {
                if !self.owned_by(actor, player) {
                    continue;
                }
            }
            self.apply_one(player, command, &mut events);
        }
        self.refresh_players();
        events
    }

    fn apply_one(&mut self, player: PlayerId, command: &Command, events: &mut Vec<AiEvent>) {
        match *command {
            Command::Move { unit, goal, layer } => self.set_order(unit, Order::Move { goal, layer }),
            Command::Attack {
                unit, target, goal, ..
            } => self.set_order(unit, Order::Attack { target, goal }),
            Command::Follow { unit, target } => self.set_order(unit, Order::Follow { target }),
            Command::Explore { unit } => self.set_order(unit, Order::Explore),
            Command::CastSpell {
                caster,
                spell,
                target,
                ..
            } => self.cast(caster, spell, target, events),
            Command::Build {
                builder,
                unit_type,
                pos,
                layer,
            } => self.start_build(player, builder, unit_type, pos, layer, events),
            Command::Train { trainer, unit_type } => {
                let Some(def) = self.catalog.unit_type(unit_type) else {
                    return;
                };
                let (costs, demand) = (def.costs.clone(), def.demand);
                let free = self.players.get(&player).map_or(0, |p| p.supply - p.demand);
                if demand > 0 && free < demand {
                    events.push(AiEvent::NeedMoreSupply { player });
                    return;
                }
                if !self.charge(player, &costs) {
                    return;
                }
                self.set_order(trainer, Order::Train { unit_type });
                self.jobs.push(Job {
                    ready_at: self.cycle + JOB_CYCLES,
                    kind: JobKind::Train { trainer, unit_type },
                });
            }
            Command::UpgradeTo { unit, unit_type } => {
                let Some(costs) = self.catalog.unit_type(unit_type).map(|d| d.costs.clone()) else {
                    return;
                };
                if !self.charge(player, &costs) {
                    return;
                }
                self.set_order(unit, Order::UpgradeTo { unit_type });
                self.jobs.push(Job {
                    ready_at: self.cycle + JOB_CYCLES,
                    kind: JobKind::UpgradeTo { unit, unit_type },
                });
            }
            Command::Research {
                researcher,
                upgrade,
            } => {
                let Some(costs) = self.catalog.upgrade(upgrade).map(|u| u.costs.clone()) else {
                    return;
                };
                if !self.charge(player, &costs) {
                    return;
                }
                self.set_order(researcher, Order::Research { upgrade });
                self.jobs.push(Job {
                    ready_at: self.cycle + JOB_CYCLES,
                    kind: JobKind::Research {
                        researcher,
                        player,
                        upgrade,
                    },
                });
            }
            Command::Repair { unit, target } => self.set_order(unit, Order::Repair { target }),
            Command::Harvest { unit, target } => {
                let resource = match target {
                    HarvestTarget::Unit(t) => self
                        .unit(t)
                        .and_then(|i| self.catalog.unit_type(i.unit_type))
                        .and_then(|d| d.gives_resource),
                    HarvestTarget::Tile { .. } => None,
                };
                if let Some(resource) = resource {
                    self.set_order(unit, Order::Harvest { resource });
                }
            }
            Command::ReturnGoods { unit, .. } => {
                let cargo = self.unit_mut(unit).and_then(|u| {
                    u.order = Order::Still;
                    u.cargo.take()
                });
                if let (Some((kind, amount)), Some(p)) = (cargo, self.players.get_mut(&player)) {
                    p.resources.add(kind, amount as i64);
                }
            }
            Command::Buy { resource, .. } => self.trade(player, resource, true),
            Command::Sell { resource, .. } => self.trade(player, resource, false),
            Command::ProduceResource { building, resource } => {
                if self.owned_by(building, player) {
                    if let Some(u) = self.unit_mut(building) {
                        u.producing = resource;
                    }
                }
            }
            Command::Board {
                unit, transporter, ..
            } => self.board(player, unit, transporter),
            Command::Unload {
                transporter, goal, ..
            } => self.unload(transporter, goal),
            Command::SetDiplomacy { target, stance } => {
                self.stances.insert((player, target), stance);
            }
            Command::SetFaction { faction } => {
                if let Some(p) = self.players.get_mut(&player) {
                    p.faction = Some(faction);
                }
            }
            Command::FoundFaction { faction } => {
                let Some(costs) = self.catalog.faction(faction).map(|f| f.costs.clone()) else {
                    return;
                };
                if self.charge(player, &costs) {
                    if let Some(p) = self.players.get_mut(&player) {
                        p.faction = Some(faction);
                    }
                }
            }
            Command::ChooseDynasty { dynasty } => {
                let Some(costs) = self.catalog.dynasty(dynasty).map(|d| d.costs.clone()) else {
                    return;
                };
                if self.charge(player, &costs) {
                    if let Some(p) = self.players.get_mut(&player) {
                        p.dynasty = Some(dynasty);
                    }
                }
            }
        }
    }

    fn start_build(
        &mut self,
        player: PlayerId,
        builder: UnitRef,
        unit_type: UnitTypeId,
        pos: Pos,
        layer: MapLayer,
        events: &mut Vec<AiEvent>,
    ) {
        let Some(def) = self.catalog.unit_type(unit_type).cloned() else {
            return;
        };
        let landmass = self.landmass(pos, layer);
        let settlement = self.nearest_settlement(pos);
        if !can_build_at(&*self, &self.catalog, &def, pos, layer) || !self.charge(player, &def.costs) {
            events.push(AiEvent::CannotBuild {
                player,
                unit_type,
                landmass: Some(landmass),
                settlement,
            });
            return;
        }
        let site = self.spawn(player, unit_type, pos);
        if let Some(u) = self.unit_mut(site) {
            u.under_construction = true;
            u.hp = (u.max_hp / 10).max(1);
        }
        self.set_order(builder, Order::Build { unit_type, pos });
        self.jobs.push(Job {
            ready_at: self.cycle + JOB_CYCLES,
            kind: JobKind::Build {
                builder: Some(builder),
                site,
            },
        });
    }

    fn trade(&mut self, player: PlayerId, resource: ResourceKind, buy: bool) {
        let price = self.market_price(resource);
        let currency = self.catalog.currency;
        let Some(p) = self.players.get_mut(&player) else {
            return;
        };
        if buy && p.resources.get(currency) >= price {
            p.resources.add(currency, -price);
            p.resources.add(resource, TRADE_LOT);
        } else if !buy && p.resources.get(resource) >= TRADE_LOT {
            p.resources.add(resource, -TRADE_LOT);
            p.resources.add(currency, price);
        }
    }

    fn board(&mut self, player: PlayerId, unit: UnitRef, transporter: UnitRef) {
        if !self.owned_by(transporter, player) {
            return;
        }
        let Some(slots) = self
            .unit(unit)
            .and_then(|u| self.catalog.unit_type(u.unit_type))
            .map(|t| t.board_slots())
        else {
            return;
        };
        let Some(t) = self.unit(transporter) else { return };
        let capacity = self
            .catalog
            .unit_type(t.unit_type)
            .map_or(0, |d| d.transport_capacity);
        let used: u32 = t
            .passengers
            .iter()
            .filter_map(|&p| self.unit(p))
            .filter_map(|p| self.catalog.unit_type(p.unit_type))
            .map(|d| d.board_slots())
            .sum();
        if used + slots > capacity {
            return;
        }
        let Some(pos) = self.unit(unit).filter(|u| !u.removed).map(|u| u.pos) else {
            return;
        };
        self.vacate(unit, pos);
        if let Some(u) = self.unit_mut(unit) {
            u.removed = true;
            u.boarded_on = Some(transporter);
            u.order = Order::Still;
        }
        if let Some(t) = self.unit_mut(transporter) {
            t.passengers.push(unit);
        }
    }

    /// Drops every passenger on free land around `goal`.
    fn unload(&mut self, transporter: UnitRef, goal: Pos) {
        let passengers = match self.unit_mut(transporter) {
            Some(t) => std::mem::take(&mut t.passengers),
            None => return,
        };
        for p in passengers {
            let spot = if self.passable(goal, 0, MoveDomain::Land) && self.units_at(goal, 0).is_empty() {
                Some(goal)
            } else {
                self.free_tile_near(goal, MoveDomain::Land)
            };
            let Some(spot) = spot else {
                if let Some(t) = self.unit_mut(transporter) {
                    t.passengers.push(p);
                }
                continue;
            };
            if let Some(u) = self.unit_mut(p) {
                u.removed = false;
                u.boarded_on = None;
                u.pos = spot;
            }
            self.occupancy.entry(spot).or_default().push(p);
            self.reveal_around(p);
        }
    }

    fn cast(&mut self, caster: UnitRef, spell: u16, target: Option<UnitRef>, events: &mut Vec<AiEvent>) {
        let Some(def) = self.catalog.spell(spell).cloned() else {
            return;
        };
        let Some(target) = target else { return };
        match self.unit_mut(caster) {
            Some(c) if c.mana >= def.mana_cost => c.mana -= def.mana_cost,
            _ => return,
        }
        match def.target {
            SpellTarget::HurtAlly => {
                if let Some(t) = self.unit_mut(target) {
                    t.hp = (t.hp + SPELL_AMOUNT).min(t.max_hp);
                }
            }
            SpellTarget::Enemy => events.extend(self.damage(caster, target, SPELL_AMOUNT)),
        }
    }

    fn damage(&mut self, attacker: UnitRef, defender: UnitRef, amount: i32) -> Vec<AiEvent> {
        let Some(t) = self.unit_mut(defender) else {
            return Vec::new();
        };
        t.hp -= amount;
        let dead = t.hp <= 0;
        let mut events = vec![AiEvent::UnitAttacked { attacker, defender }];
        if dead {
            events.extend(self.kill(defender));
        }
        events
    }

    fn step_toward(&mut self, unit: UnitRef, goal: Pos) -> bool {
        let Some(info) = self.unit(unit) else { return false };
        let domain = self
            .catalog
            .unit_type(info.unit_type)
            .map_or(MoveDomain::Land, |t| t.domain);
        let here = info.pos;
        let step = Pos::new(
            here.x + (goal.x - here.x).signum(),
            here.y + (goal.y - here.y).signum(),
        );
        let candidates = [step, Pos::new(step.x, here.y), Pos::new(here.x, step.y)];
        let next = candidates.into_iter().find(|&p| {
            p != here
                && self.passable(p, 0, domain)
                && (domain == MoveDomain::Air || !self.flags(p, 0).contains(TileFlags::BUILDING))
        });
        match next {
            Some(p) => {
                self.move_unit(unit, p);
                true
            }
            None => false,
        }
    }

    fn enemy_near(&self, unit: &UnitInfo, range: i32) -> Option<UnitRef> {
        self.units_in_range(unit.pos, 0, range)
            .into_iter()
            .find(|&u| self.unit(u).is_some_and(|o| self.is_enemy(unit.player, o.player)))
    }

    /// Advances one cycle: finishes due jobs and, on whole seconds, moves,
    /// harvests and fights.
    pub fn advance(&mut self) -> Vec<AiEvent> {
        self.cycle += 1;
        let mut events = Vec::new();

        let (due, pending): (Vec<Job>, Vec<Job>) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|j| j.ready_at <= self.cycle);
        self.jobs = pending;
        for job in due {
            self.finish_job(job, &mut events);
        }

        if self.cycle % SANDBOX_CPS == 0 {
            self.second(&mut events);
        }
        if !events.is_empty() {
            self.refresh_players();
        }
        events
    }

    fn finish_job(&mut self, job: Job, events: &mut Vec<AiEvent>) {
        match job.kind {
            JobKind::Train { trainer, unit_type } => {
                let Some(t) = self.unit(trainer) else { return };
                let (player, center) = (t.player, t.pos);
                let domain = self
                    .catalog
                    .unit_type(unit_type)
                    .map_or(MoveDomain::Land, |d| d.domain);
                let pos = self.free_tile_near(center, domain).unwrap_or(center);
                self.set_order(trainer, Order::Still);
                let unit = self.spawn(player, unit_type, pos);
                events.push(AiEvent::TrainingComplete { trainer, unit });
            }
            JobKind::Build { builder, site } => {
                let Some(info) = self.unit_mut(site) else { return };
                info.under_construction = false;
                info.hp = info.max_hp;
                let (player, pos, unit_type) = (info.player, info.pos, info.unit_type);
                if let Some(b) = builder {
                    self.set_order(b, Order::Still);
                }
                if self.catalog.unit_type(unit_type).is_some_and(|t| t.town_hall) {
                    self.claim_settlement(player, pos, site);
                }
                events.push(AiEvent::BuildComplete {
                    builder,
                    unit: site,
                });
            }
            JobKind::UpgradeTo { unit, unit_type } => {
                let hp = self
                    .catalog
                    .unit_type(unit_type)
                    .map_or(1, |d| d.hit_points.max(1));
                let Some(u) = self.unit_mut(unit) else { return };
                u.unit_type = unit_type;
                u.max_hp = hp;
                u.hp = hp;
                u.order = Order::Still;
                events.push(AiEvent::UpgradeToComplete { unit });
            }
            JobKind::Research {
                researcher,
                player,
                upgrade,
            } => {
                self.set_order(researcher, Order::Still);
                if let Some(p) = self.players.get_mut(&player) {
                    p.upgrades.insert(upgrade);
                }
                events.push(AiEvent::ResearchComplete { player, upgrade });
            }
        }
    }

    fn second(&mut self, events: &mut Vec<AiEvent>) {
        let live: Vec<UnitRef> = self
            .slots
            .iter()
            .filter_map(|s| s.unit.as_ref())
            .filter(|u| !u.removed && !u.under_construction)
            .map(|u| u.id)
            .collect();
        for id in live {
            let Some(info) = self.unit(id).cloned() else { continue };
            match info.order {
                Order::Harvest { resource } => {
                    if let Some(p) = self.players.get_mut(&info.player) {
                        p.resources.add(resource, HARVEST_RATE);
                    }
                }
                Order::Move { goal, .. } => {
                    if info.pos == goal {
                        self.set_order(id, Order::Still);
                    } else if !self.step_toward(id, goal) {
                        self.set_order(id, Order::Still);
                        events.push(AiEvent::CannotMove { unit: id });
                    }
                }
                Order::Explore => {
                    let goal = Pos::new(self.width - 1 - info.pos.x, self.height - 1 - info.pos.y);
                    if info.pos.distance(goal) <= 1 || !self.step_toward(id, goal) {
                        self.set_order(id, Order::Still);
                    }
                }
                Order::Attack { target, goal } => {
                    let range = self
                        .catalog
                        .unit_type(info.unit_type)
                        .map_or(1, |t| t.attack_range.max(1));
                    let victim = target
                        .filter(|&t| self.unit(t).is_some_and(|v| !v.removed && v.pos.distance(info.pos) <= range))
                        .or_else(|| self.enemy_near(&info, range));
                    match victim {
                        Some(v) => events.extend(self.damage(id, v, ATTACK_DAMAGE)),
                        None => {
                            let chase = target
                                .and_then(|t| self.unit(t))
                                .filter(|v| !v.removed)
                                .map_or(goal, |v| v.pos);
                            if info.pos.distance(chase) <= range && target.and_then(|t| self.unit(t)).is_none() {
                                self.set_order(id, Order::Still);
                            } else if !self.step_toward(id, chase) {
                                self.set_order(id, Order::Still);
                            }
                        }
                    }
                }
                Order::Repair { target } => {
                    let done = match self.unit_mut(target) {
                        Some(t) => {
                            t.hp = (t.hp + REPAIR_AMOUNT).min(t.max_hp);
                            t.hp == t.max_hp
                        }
                        None => true,
                    };
                    if done {
                        self.set_order(id, Order::Still);
                    }
                }
                _ => {}
            }
            if let Some(kind) = info.producing {
                if let Some(p) = self.players.get_mut(&info.player) {
                    p.resources.add(kind, PRODUCE_RATE);
                }
            }
        }
    }

    /// Two norse computer players on opposite sides of a strait, each with a
    /// town hall, workers and nearby deposits. Player 1 also owns a small
    /// guard. Used by the runner and the replay tests.
    pub fn skirmish(catalog: Catalog) -> SandboxWorld {
        let id = |name: &str| catalog.unit_type_by_ident(name);
        let (hall, worker, forest, rock, vein, footman) = (
            id("town-hall"),
            id("worker"),
            id("forest"),
            id("rock"),
            id("copper-vein"),
            id("footman"),
        );
        let mut world = SandboxBuilder::new(40, 24)
            .computer(1)
            .computer(2)
            .water(Pos::new(18, 0), Pos::new(21, 23))
            .owner(1, Pos::new(0, 0), Pos::new(17, 23))
            .owner(2, Pos::new(22, 0), Pos::new(39, 23))
            .settlement("Ravnborg", Pos::new(5, 12))
            .settlement("Skarvik", Pos::new(34, 12))
            .settlement("Holm", Pos::new(10, 3))
            .campaign(true)
            .build(catalog);
        for (player, base) in [(1, Pos::new(5, 12)), (2, Pos::new(34, 12))] {
            let side = if player == 1 { 1 } else { -1 };
            if let Some(hall) = hall {
                world.spawn(player, hall, base);
            }
            if let Some(worker) = worker {
                for i in 0..4 {
                    world.spawn(player, worker, base.offset(side, i - 2));
                }
            }
            if let Some(forest) = forest {
                for i in 0..3 {
                    world.spawn(0, forest, base.offset(4 * side, i - 1));
                }
            }
            if let Some(rock) = rock {
                world.spawn(0, rock, base.offset(-3 * side, 4));
            }
            if let Some(vein) = vein {
                world.spawn(0, vein, base.offset(-3 * side, -4));
            }
        }
        if let Some(footman) = footman {
            world.spawn(1, footman, Pos::new(7, 14));
        }
        world
    }
}

impl TileMap for SandboxWorld {
    fn layer_size(&self, layer: MapLayer) -> (i32, i32) {
        if layer == 0 {
            (self.width, self.height)
        } else {
            (0, 0)
        }
    }

    fn flags(&self, pos: Pos, layer: MapLayer) -> TileFlags {
        let Some(i) = self.index(pos).filter(|_| layer == 0) else {
            return TileFlags::NONE;
        };
        let mut flags = self.terrain[i];
        for &u in self.occupancy.get(&pos).map(Vec::as_slice).unwrap_or(&[]) {
            let Some(t) = self.unit(u).and_then(|u| self.catalog.unit_type(u.unit_type)) else {
                continue;
            };
            flags = flags
                | if t.pathway {
                    TileFlags::ROAD
                } else if t.building {
                    TileFlags::BUILDING
                } else if t.gives_resource.is_some() {
                    TileFlags::DEPOSIT
                } else {
                    match t.domain {
                        MoveDomain::Land => TileFlags::LAND_UNIT,
                        MoveDomain::Naval => TileFlags::SEA_UNIT,
                        MoveDomain::Air => TileFlags::AIR_UNIT,
                    }
                };
        }
        flags
    }

    fn landmass(&self, pos: Pos, layer: MapLayer) -> LandmassId {
        match self.index(pos) {
            Some(i) if layer == 0 => self.landmass.get(i).copied().unwrap_or(0),
            _ => 0,
        }
    }

    fn is_water_landmass(&self, landmass: LandmassId) -> bool {
        self.water_landmasses.contains(&landmass)
    }

    fn border_landmasses(&self, landmass: LandmassId) -> Vec<LandmassId> {
        self.landmass_borders
            .get(&landmass)
            .cloned()
            .unwrap_or_default()
    }

    fn tile_owner(&self, pos: Pos, layer: MapLayer) -> Option<PlayerId> {
        self.index(pos)
            .filter(|_| layer == 0)
            .and_then(|i| self.owners[i])
    }

    fn is_explored(&self, player: PlayerId, pos: Pos, _layer: MapLayer) -> bool {
        !self.hidden.contains(&pos)
            || self
                .revealed
                .get(&player)
                .is_some_and(|seen| seen.contains(&pos))
    }
}

impl WorldView for SandboxWorld {
    fn cycle(&self) -> u64 {
        self.cycle
    }

    fn is_campaign(&self) -> bool {
        self.campaign
    }

    fn player(&self, id: PlayerId) -> Option<&PlayerInfo> {
        self.players.get(&id)
    }

    fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    fn unit(&self, unit: UnitRef) -> Option<&UnitInfo> {
        self.slots
            .get(unit.0 as usize)
            .filter(|s| s.generation == unit.1)
            .and_then(|s| s.unit.as_ref())
    }

    fn units_of(&self, player: PlayerId) -> Vec<UnitRef> {
        self.slots
            .iter()
            .filter_map(|s| s.unit.as_ref())
            .filter(|u| u.player == player)
            .map(|u| u.id)
            .collect()
    }

    fn units_at(&self, pos: Pos, layer: MapLayer) -> Vec<UnitRef> {
        if layer != 0 {
            return Vec::new();
        }
        self.occupancy.get(&pos).cloned().unwrap_or_default()
    }

    fn settlements(&self) -> &[Settlement] {
        &self.settlements
    }

    fn stance(&self, from: PlayerId, to: PlayerId) -> Stance {
        self.stances
            .get(&(from, to))
            .copied()
            .unwrap_or(Stance::Neutral)
    }

    fn borders(&self, a: PlayerId, b: PlayerId) -> bool {
        self.borders.contains(&(a.min(b), a.max(b)))
    }

    fn market_price(&self, resource: ResourceKind) -> i64 {
        self.catalog.resource(resource).map_or(100, |r| r.base_price)
    }
}

/// One AI player against a sandbox world, for driving a single manager pass.
pub struct Sandbox {
    pub catalog: Catalog,
    pub helpers: AiHelpers,
    pub ai_type: AiType,
    pub config: AiConfig,
    pub rng: SyncRng,
    pub world: SandboxWorld,
    pub state: AiPlayerState,
}

impl Sandbox {
    /// A `width` x `height` land map with computer player 1 (the AI under
    /// test) and computer player 2, on neutral terms.
    pub fn new(catalog: Catalog, width: i32, height: i32) -> Self {
        let builder = SandboxBuilder::new(width, height).computer(1).computer(2);
        Self::with_world(catalog, builder)
    }

    pub fn with_world(catalog: Catalog, builder: SandboxBuilder) -> Self {
        let world = builder.build(catalog.clone());
        let ai_type = sample_ai_type("land-attack");
        let mut state = AiPlayerState::new(1, &ai_type.ident);
        state.collect = ai_type.collect.clone();
        Self {
            helpers: AiHelpers::build(&catalog),
            catalog,
            ai_type,
            config: AiConfig::default(),
            rng: SyncRng::new(7),
            world,
            state,
        }
    }

    pub fn unit_type(&self, ident: &str) -> UnitTypeId {
        self.catalog
            .unit_type_by_ident(ident)
            .unwrap_or(UnitTypeId::MAX)
    }

    /// Runs `f` for player 1 against the current world and returns what it
    /// ordered.
    pub fn tick<F>(&mut self, f: F) -> PlayerInputs
    where
        F: FnOnce(&mut TickContext<'_>, &mut AiPlayerState),
    {
        let mut ctx = TickContext::new(
            self.state.player,
            &self.world,
            &self.catalog,
            &self.helpers,
            &self.ai_type,
            &self.config,
            &mut self.rng,
        );
        f(&mut ctx, &mut self.state);
        ctx.finish()
    }
}
