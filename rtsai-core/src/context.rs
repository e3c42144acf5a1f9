//! Explicit per-hook context passed to every manager in place of a
//! process-wide "current AI player".

use crate::ai_type::AiType;
use crate::catalog::{Catalog, UnitTypeDef};
use crate::command::{Command, PlayerInputs};
use crate::config::AiConfig;
use crate::helpers::AiHelpers;
use crate::ids::{PlayerId, UnitRef, UnitTypeId};
use crate::resources::Resources;
use crate::rng::SyncRng;
use crate::world::{PlayerInfo, UnitInfo, WorldView};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

pub struct TickContext<'a> {
    pub player: PlayerId,
    pub world: &'a dyn WorldView,
    pub catalog: &'a Catalog,
    pub helpers: &'a AiHelpers,
    pub ai_type: &'a AiType,
    pub config: &'a AiConfig,
    pub rng: &'a mut SyncRng,
    commands: Vec<Command>,
    /// Units given an order during this hook.
    claimed: FxHashSet<UnitRef>,
    /// Costs of orders issued during this hook, not yet charged by the game.
    committed: Resources,
    /// Supply demand of trainees ordered during this hook.
    committed_demand: i32,
    own_units: Vec<UnitRef>,
    /// Completed, living units per type.
    type_counts: BTreeMap<UnitTypeId, u32>,
}

impl<'a> TickContext<'a> {
    pub fn new(
        player: PlayerId,
        world: &'a dyn WorldView,
        catalog: &'a Catalog,
        helpers: &'a AiHelpers,
        ai_type: &'a AiType,
        config: &'a AiConfig,
        rng: &'a mut SyncRng,
    ) -> Self {
        let own_units = world.units_of(player);
        let mut type_counts = BTreeMap::new();
        for &u in &own_units {
            if let Some(info) = world.unit(u) {
                if !info.under_construction {
                    *type_counts.entry(info.unit_type).or_insert(0) += 1;
                }
            }
        }
        Self {
            player,
            world,
            catalog,
            helpers,
            ai_type,
            config,
            rng,
            commands: Vec::new(),
            claimed: FxHashSet::default(),
            committed: Resources::new(),
            committed_demand: 0,
            own_units,
            type_counts,
        }
    }

    pub fn cycle(&self) -> u64 {
        self.world.cycle()
    }

    /// The AI's own player. Scheduler checks guarantee it exists.
    pub fn me(&self) -> Option<&'a PlayerInfo> {
        self.world.player(self.player)
    }

    pub fn unit(&self, unit: UnitRef) -> Option<&'a UnitInfo> {
        self.world.unit(unit)
    }

    pub fn unit_type(&self, id: UnitTypeId) -> Option<&'a UnitTypeDef> {
        self.catalog.unit_type(id)
    }

    /// Type definition of a living unit.
    pub fn type_of(&self, unit: &UnitInfo) -> Option<&'a UnitTypeDef> {
        self.catalog.unit_type(unit.unit_type)
    }

    pub fn own_units(&self) -> &[UnitRef] {
        &self.own_units
    }

    /// Own living units with their info, in stable order.
    pub fn own(&self) -> impl Iterator<Item = &'a UnitInfo> + '_ {
        let world = self.world;
        self.own_units.iter().filter_map(move |&u| world.unit(u))
    }

    pub fn count(&self, unit_type: UnitTypeId) -> u32 {
        self.type_counts.get(&unit_type).copied().unwrap_or(0)
    }

    /// Count of `unit_type` plus every equivalent type.
    pub fn count_with_equivalents(&self, unit_type: UnitTypeId) -> u32 {
        self.count(unit_type)
            + self
                .helpers
                .equivalents(unit_type)
                .iter()
                .map(|&t| self.count(t))
                .sum::<u32>()
    }

    pub fn has_upgrade(&self, upgrade: u16) -> bool {
        self.me().is_some_and(|p| p.upgrades.contains(&upgrade))
    }

    /// Whether the player owns the types and upgrades `def` depends on.
    pub fn requirements_met(&self, requires_types: &[UnitTypeId], requires_upgrades: &[u16]) -> bool {
        requires_types.iter().all(|&t| self.count(t) > 0)
            && requires_upgrades.iter().all(|&u| self.has_upgrade(u))
    }

    pub fn is_claimed(&self, unit: UnitRef) -> bool {
        self.claimed.contains(&unit)
    }

    /// Queues a command and claims its acting unit.
    pub fn issue(&mut self, command: Command) {
        if let Some(actor) = command.actor() {
            self.claimed.insert(actor);
        }
        log::trace!("player {} issues {:?}", self.player, command);
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Stockpile plus `reserve`, minus what this hook already spent.
    pub fn available(&self, reserve: &Resources) -> Resources {
        let mut avail = self.me().map(|p| p.resources.clone()).unwrap_or_default();
        avail.add_all(reserve);
        avail.sub_all(&self.committed);
        avail
    }

    pub fn commit(&mut self, cost: &Resources) {
        self.committed.add_all(cost);
    }

    pub fn committed(&self) -> &Resources {
        &self.committed
    }

    pub fn commit_demand(&mut self, demand: i32) {
        self.committed_demand += demand;
    }

    /// Supply left after units ordered in this hook.
    pub fn free_supply(&self) -> i32 {
        self.me().map_or(0, |p| p.supply - p.demand) - self.committed_demand
    }

    pub fn finish(self) -> PlayerInputs {
        PlayerInputs {
            player: self.player,
            commands: self.commands,
        }
    }
}
