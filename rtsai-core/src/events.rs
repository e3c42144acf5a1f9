//! Game events the host reports to the AI, and the engine's reactions.
//!
//! Each callback resolves the owning player from the event, runs against that
//! player's state only and may answer with commands of its own. None of them
//! fails: unknown units and players are ignored.

use crate::catalog::{MoveDomain, UnitTypeDef};
use crate::command::{Command, PlayerInputs};
use crate::context::TickContext;
use crate::force;
use crate::ids::{LandmassId, PlayerId, SettlementId, UnitRef, UnitTypeId, UpgradeId};
use crate::production;
use crate::scheduler::AiEngine;
use crate::state::{AiPlayerState, SiteTransport};
use crate::transport;
use crate::world::{Order, TileMap, UnitInfo, WorldView};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AiEvent {
    /// `defender` took damage from `attacker`.
    UnitAttacked { attacker: UnitRef, defender: UnitRef },
    /// The handle is already dead when this arrives.
    UnitKilled { player: PlayerId, unit: UnitRef },
    BuildComplete {
        builder: Option<UnitRef>,
        unit: UnitRef,
    },
    CannotBuild {
        player: PlayerId,
        unit_type: UnitTypeId,
        landmass: Option<LandmassId>,
        settlement: Option<SettlementId>,
    },
    CannotReach {
        player: PlayerId,
        unit_type: UnitTypeId,
        landmass: Option<LandmassId>,
        settlement: Option<SettlementId>,
    },
    /// The pathfinder found `unit` boxed in.
    CannotMove { unit: UnitRef },
    NeedMoreSupply { player: PlayerId },
    TrainingComplete { trainer: UnitRef, unit: UnitRef },
    ResearchComplete { player: PlayerId, upgrade: UpgradeId },
    UpgradeToComplete { unit: UnitRef },
}

impl AiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AiEvent::UnitAttacked { .. } => "unit-attacked",
            AiEvent::UnitKilled { .. } => "unit-killed",
            AiEvent::BuildComplete { .. } => "build-complete",
            AiEvent::CannotBuild { .. } => "cannot-build",
            AiEvent::CannotReach { .. } => "cannot-reach",
            AiEvent::CannotMove { .. } => "cannot-move",
            AiEvent::NeedMoreSupply { .. } => "need-more-supply",
            AiEvent::TrainingComplete { .. } => "training-complete",
            AiEvent::ResearchComplete { .. } => "research-complete",
            AiEvent::UpgradeToComplete { .. } => "upgrade-to-complete",
        }
    }
}

fn owner(world: &dyn WorldView, unit: UnitRef) -> Option<PlayerId> {
    world.unit(unit).map(|u| u.player)
}

impl AiEngine {
    /// Dispatches one host event. Returns the commands it triggered, if any.
    #[instrument(skip_all, name = "ai_notify")]
    pub fn notify(&mut self, world: &dyn WorldView, event: &AiEvent) -> Option<PlayerInputs> {
        let start = Instant::now();
        log::trace!("event {:?}", event);
        let inputs = match *event {
            AiEvent::UnitAttacked { attacker, defender } => self.unit_attacked(world, attacker, defender),
            AiEvent::UnitKilled { player, unit } => {
                self.unit_killed(player, unit);
                None
            }
            AiEvent::BuildComplete { builder, unit } => self.build_complete(world, builder, unit),
            AiEvent::CannotBuild {
                player,
                unit_type,
                landmass,
                settlement,
            }
            | AiEvent::CannotReach {
                player,
                unit_type,
                landmass,
                settlement,
            } => {
                self.cannot_build(world, player, unit_type, landmass, settlement);
                None
            }
            AiEvent::CannotMove { unit } => self.cannot_move(world, unit),
            AiEvent::NeedMoreSupply { player } => {
                self.need_more_supply(player);
                None
            }
            AiEvent::TrainingComplete { trainer, unit } => self.training_complete(world, trainer, unit),
            AiEvent::ResearchComplete { player, upgrade } => {
                self.research_complete(player, upgrade);
                None
            }
            AiEvent::UpgradeToComplete { unit } => {
                self.upgrade_to_complete(world, unit);
                None
            }
        };
        self.metrics.callbacks += 1;
        self.metrics.callback_time += start.elapsed();
        inputs.filter(|i| !i.is_empty())
    }

    /// Nearby idle or loosely occupied units answer the attack, the defend
    /// forces are sent, and helpers stranded on other landmasses are queued
    /// for a ferry.
    pub fn unit_attacked(
        &mut self,
        world: &dyn WorldView,
        attacker: UnitRef,
        defender: UnitRef,
    ) -> Option<PlayerInputs> {
        let player = owner(world, defender)?;
        let (_, inputs) = self.with_player(world, player, |ctx, state| {
            retaliate(ctx, state, attacker, defender)
        })?;
        Some(inputs)
    }

    pub fn unit_killed(&mut self, player: PlayerId, unit: UnitRef) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        let index = state.forces.force_of(unit);
        state.forget_unit(unit);
        if let Some(force) = index.and_then(|i| state.forces.get_mut(i)) {
            if force.is_empty() && !force.defending {
                force.reset();
            }
        }
    }

    pub fn build_complete(
        &mut self,
        world: &dyn WorldView,
        builder: Option<UnitRef>,
        unit: UnitRef,
    ) -> Option<PlayerInputs> {
        let info = world.unit(unit)?;
        let human = world.player(info.player).is_some_and(|p| p.human_observed);
        let landmass = world.unit_landmass(info);
        let settlement = info.settlement;
        let unit_type = info.unit_type;
        let (_, inputs) = self.with_player(world, info.player, |ctx, state| {
            production::remove_from_built(
                state,
                ctx.helpers,
                ctx.catalog,
                human,
                unit_type,
                Some(landmass),
                settlement,
            );
            if ctx.unit_type(unit_type).is_some_and(|t| t.is_transporter()) {
                transport::register_transporter(ctx, state, unit);
            }
            if let Some(b) = builder {
                log::trace!("player {}: {} finished {}", ctx.player, b, unit);
            }
        })?;
        Some(inputs)
    }

    /// A build or its path failed; only the issued count drops so the next
    /// queue pass retries.
    pub fn cannot_build(
        &mut self,
        world: &dyn WorldView,
        player: PlayerId,
        unit_type: UnitTypeId,
        landmass: Option<LandmassId>,
        settlement: Option<SettlementId>,
    ) {
        let human = world.player(player).is_some_and(|p| p.human_observed);
        let Self {
            catalog,
            helpers,
            players,
            ..
        } = self;
        let Some(state) = players.get_mut(&player) else {
            return;
        };
        production::reduce_made_in_built(state, helpers, catalog, human, unit_type, landmass, settlement);
    }

    /// Moves one idle own unit next to `unit` out of the way, at most once per
    /// window.
    pub fn cannot_move(&mut self, world: &dyn WorldView, unit: UnitRef) -> Option<PlayerInputs> {
        let player = owner(world, unit)?;
        let (_, inputs) = self.with_player(world, player, |ctx, state| {
            let cycle = ctx.cycle();
            let window = ctx.config.cannot_move_window;
            if state.last_cannot_move_cycle != 0 && cycle < state.last_cannot_move_cycle + window {
                return;
            }
            if nudge_blocker(ctx, unit) {
                state.last_cannot_move_cycle = cycle;
            }
        })?;
        Some(inputs)
    }

    pub fn need_more_supply(&mut self, player: PlayerId) {
        if let Some(state) = self.players.get_mut(&player) {
            state.need_supply = true;
        }
    }

    /// Books the trainee against the queue (resolving mercenary substitutes
    /// through the faction's class map), then hands it to a force that wants
    /// it or to the transporter pool.
    pub fn training_complete(
        &mut self,
        world: &dyn WorldView,
        trainer: UnitRef,
        unit: UnitRef,
    ) -> Option<PlayerInputs> {
        let info = world.unit(unit)?;
        let human = world.player(info.player).is_some_and(|p| p.human_observed);
        let landmass = world.unit_landmass(info);
        let settlement = info.settlement;
        let trained = info.unit_type;
        let (_, inputs) = self.with_player(world, info.player, |ctx, state| {
            let booked = queued_type(ctx, state, trained);
            production::remove_from_built(
                state,
                ctx.helpers,
                ctx.catalog,
                human,
                booked,
                Some(landmass),
                settlement,
            );
            log::trace!(
                "player {}: {} trained {} ({})",
                ctx.player,
                trainer,
                unit,
                ctx.catalog.unit_type_ident(trained)
            );
            if !join_wanting_force(ctx, state, unit, trained)
                && ctx.unit_type(trained).is_some_and(|t| t.is_transporter())
            {
                transport::register_transporter(ctx, state, unit);
            }
        })?;
        Some(inputs)
    }

    pub fn research_complete(&mut self, player: PlayerId, upgrade: UpgradeId) {
        let Some(state) = self.players.get_mut(&player) else {
            return;
        };
        log::info!(
            "player {} researched {}",
            player,
            self.catalog.upgrade(upgrade).map_or("?", |u| u.ident.as_str())
        );
        state.research_requests.retain(|&u| u != upgrade);
    }

    pub fn upgrade_to_complete(&mut self, world: &dyn WorldView, unit: UnitRef) {
        let Some(info) = world.unit(unit) else {
            return;
        };
        let human = world.player(info.player).is_some_and(|p| p.human_observed);
        let landmass = world.unit_landmass(info);
        let Self {
            catalog,
            helpers,
            players,
            ..
        } = self;
        let Some(state) = players.get_mut(&info.player) else {
            return;
        };
        log::info!(
            "player {}: {} is now {}",
            info.player,
            unit,
            catalog.unit_type_ident(info.unit_type)
        );
        if state.queued(info.unit_type) > 0 {
            production::remove_from_built(
                state,
                helpers,
                catalog,
                human,
                info.unit_type,
                Some(landmass),
                info.settlement,
            );
        }
    }
}

/// The queue type a trainee of `trained` stands for. A hired substitute books
/// against the faction's own unit of the same class.
fn queued_type(ctx: &TickContext<'_>, state: &AiPlayerState, trained: UnitTypeId) -> UnitTypeId {
    let in_queue = |t: UnitTypeId| {
        state
            .build_queue
            .iter()
            .any(|r| r.made > 0 && ctx.helpers.are_equivalent(r.unit_type, t))
    };
    if in_queue(trained) {
        return trained;
    }
    let class = ctx.unit_type(trained).and_then(|t| t.class.as_deref());
    let faction = ctx
        .me()
        .and_then(|p| p.faction)
        .and_then(|f| ctx.catalog.faction(f));
    match (class, faction) {
        (Some(class), Some(faction)) => match faction.class_units.get(class) {
            Some(&own) if own != trained && in_queue(own) => {
                log::debug!(
                    "player {}: {} stands in for {}",
                    ctx.player,
                    ctx.catalog.unit_type_ident(trained),
                    ctx.catalog.unit_type_ident(own)
                );
                own
            }
            _ => trained,
        },
        _ => trained,
    }
}

/// Puts `unit` into the first mustering force whose wish for its type is not
/// met yet.
fn join_wanting_force(
    ctx: &TickContext<'_>,
    state: &mut AiPlayerState,
    unit: UnitRef,
    unit_type: UnitTypeId,
) -> bool {
    let helpers = ctx.helpers;
    let mut target = None;
    for (index, f) in state.forces.iter().enumerate() {
        if f.state.is_attacking() {
            continue;
        }
        let wanted = f
            .wishes
            .iter()
            .filter(|(t, _)| helpers.are_equivalent(*t, unit_type))
            .map(|(_, n)| *n)
            .sum::<u32>();
        if wanted == 0 {
            continue;
        }
        let have = f
            .units()
            .iter()
            .filter_map(|&u| ctx.unit(u))
            .filter(|u| helpers.are_equivalent(u.unit_type, unit_type))
            .count() as u32;
        if have < wanted {
            target = Some(index);
            break;
        }
    }
    match target {
        Some(index) => {
            state.forces.insert(index, unit);
            true
        }
        None => false,
    }
}

/// A helper engages when the attacker is already in range, or stands where the
/// helper can walk (fly, sail) up to it. Only fliers chase fliers.
fn can_engage(
    world: &dyn WorldView,
    t: &UnitTypeDef,
    helper: &UnitInfo,
    att_domain: MoveDomain,
    att: &UnitInfo,
) -> bool {
    if helper.layer == att.layer && helper.pos.distance(att.pos) <= t.attack_range {
        return true;
    }
    if att_domain == MoveDomain::Air && t.domain != MoveDomain::Air {
        return false;
    }
    world.passable(att.pos, att.layer, t.domain)
}

fn retaliate(ctx: &mut TickContext<'_>, state: &mut AiPlayerState, attacker: UnitRef, defender: UnitRef) {
    let Some(att) = ctx.unit(attacker) else {
        return;
    };
    let Some(def) = ctx.unit(defender) else {
        return;
    };
    if att.player == ctx.player {
        return;
    }
    let world = ctx.world;
    let att_domain = ctx.type_of(att).map_or(MoveDomain::Land, |t| t.domain);
    let site_landmass = world.unit_landmass(def);
    let mut stranded = Vec::new();

    for u in world.units_in_range(def.pos, def.layer, ctx.config.help_range) {
        let Some(info) = ctx.unit(u) else { continue };
        if info.player != ctx.player || info.removed || info.under_construction || ctx.is_claimed(u) {
            continue;
        }
        let Some(t) = ctx.type_of(info) else { continue };
        if !t.can_attack || t.building || t.coward {
            continue;
        }
        if state.scouts.contains(&u) || state.is_transporter(u) || force::is_committed(state, u) {
            continue;
        }
        // Workers only fight back for themselves.
        if t.is_harvester() && u != defender {
            continue;
        }
        let loose = info.is_idle() || matches!(info.order, Order::Move { .. } | Order::Follow { .. });
        if !loose && u != defender {
            continue;
        }
        if !can_engage(world, t, info, att_domain, att) {
            continue;
        }
        if t.domain == MoveDomain::Land && world.unit_landmass(info) != site_landmass {
            stranded.push(u);
            continue;
        }
        ctx.issue(Command::Attack {
            unit: u,
            target: Some(attacker),
            goal: att.pos,
            layer: att.layer,
        });
    }

    if !stranded.is_empty() {
        match state
            .site_transport_units
            .iter_mut()
            .find(|s| s.site == defender)
        {
            Some(site) => {
                for u in stranded {
                    if !site.units.contains(&u) {
                        site.units.push(u);
                    }
                }
            }
            None => state.site_transport_units.push(SiteTransport {
                site: defender,
                units: stranded,
            }),
        }
    }

    force::mobilize_defense(ctx, state, att.pos, att.layer);
}

/// Moves the first idle own unit next to `unit` onto a free tile it can stand
/// on. Returns whether anything was ordered.
fn nudge_blocker(ctx: &mut TickContext<'_>, unit: UnitRef) -> bool {
    let Some(stuck) = ctx.unit(unit) else {
        return false;
    };
    let world = ctx.world;
    let layer = stuck.layer;
    for p in stuck.pos.around() {
        for blocker in world.units_at(p, layer) {
            let Some(info) = ctx.unit(blocker) else { continue };
            if info.player != ctx.player || !info.is_idle() || ctx.is_claimed(blocker) {
                continue;
            }
            let Some(t) = ctx.type_of(info) else { continue };
            if t.building {
                continue;
            }
            let free = info.pos.around().into_iter().find(|&q| {
                q != stuck.pos && world.passable(q, layer, t.domain) && world.units_at(q, layer).is_empty()
            });
            if let Some(goal) = free {
                log::trace!("player {} moves {} out of the way", ctx.player, blocker);
                ctx.issue(Command::Move {
                    unit: blocker,
                    goal,
                    layer,
                });
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
