//! Turns queued production goals into build, train, upgrade and research
//! commands.

use crate::catalog::{Catalog, MoveDomain, UnitTypeDef};
use crate::command::Command;
use crate::context::TickContext;
use crate::helpers::AiHelpers;
use crate::ids::{LandmassId, Pos, SettlementId, UnitRef, UnitTypeId};
use crate::resources::{ResourceMask, Resources};
use crate::state::{AiPlayerState, BuildRequest, RequestTarget};
use crate::terrain;
use crate::world::{movement_mask, Order, UnitInfo};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::instrument;

/// Result of one attempt to produce a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakeOutcome {
    Issued(UnitTypeId),
    /// No idle builder, trainer or upgrader right now.
    NoProducer,
    /// A builder exists but no tile accepts the building.
    NoPlacement,
}

/// Appends a request. Nothing else happens until the next queue pass.
pub fn add_unit_type_request(
    state: &mut AiPlayerState,
    unit_type: UnitTypeId,
    count: u32,
    target: RequestTarget,
) {
    if count == 0 {
        return;
    }
    let mut req = BuildRequest::new(unit_type, count);
    req.landmass = target.landmass;
    req.settlement = target.settlement;
    if let Some((pos, layer)) = target.pos {
        req.pos = Some(pos);
        req.layer = layer;
    }
    log::trace!(
        "player {} requests {} x type {}",
        state.player,
        count,
        unit_type
    );
    state.build_queue.push(req);
}

fn owned_including_construction(ctx: &TickContext<'_>, unit_type: UnitTypeId) -> u32 {
    ctx.own().filter(|u| u.unit_type == unit_type).count() as u32
}

fn at_limit(ctx: &TickContext<'_>, def: &UnitTypeDef) -> bool {
    def.max_per_player
        .is_some_and(|max| owned_including_construction(ctx, def.id) >= max)
}

/// One queue pass, in FIFO order. Entries that cannot proceed are skipped,
/// never dropped, so cheaper entries behind them still get their turn.
#[instrument(skip_all, name = "build_queue")]
pub fn process_build_queue(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let cycle = ctx.cycle();
    let player = ctx.player;
    let settlements = ctx.world.settlements();

    state.build_queue.retain(|r| match r.settlement {
        Some(id) => settlements
            .iter()
            .find(|s| s.id == id)
            .is_some_and(|s| s.owner.map_or(true, |o| o == player)),
        None => true,
    });

    let reserve = state.reserve.clone();
    state.needed.clear();

    for i in 0..state.build_queue.len() {
        let req = state.build_queue[i].clone();
        if req.pending() == 0 || req.retry_at > cycle {
            continue;
        }
        let Some(def) = ctx.unit_type(req.unit_type) else {
            continue;
        };

        if def.demand > 0 && ctx.free_supply() < def.demand {
            state.need_supply = true;
            continue;
        }

        if at_limit(ctx, def) {
            continue;
        }

        let avail = ctx.available(&reserve);
        let short = avail.shortfall(&def.costs);
        if !short.is_empty() {
            state.needed_mask = state.needed_mask.union(short);
            for kind in short.iter() {
                state
                    .needed
                    .add(kind, def.costs.get(kind) - avail.get(kind));
            }
            continue;
        }

        match make_unit(ctx, &req, &reserve) {
            MakeOutcome::Issued(made) => {
                let r = &mut state.build_queue[i];
                r.made += 1;
                r.failed_placements = 0;
                r.retry_at = 0;
                log::trace!(
                    "player {} started {} for request {}",
                    player,
                    ctx.catalog.unit_type_ident(made),
                    ctx.catalog.unit_type_ident(req.unit_type)
                );
            }
            MakeOutcome::NoPlacement => {
                let r = &mut state.build_queue[i];
                r.failed_placements += 1;
                let wait = if r.failed_placements == 1 {
                    ctx.config.build_retry_first
                } else {
                    ctx.config.build_retry_later
                };
                r.retry_at = cycle + wait;
                log::debug!(
                    "player {}: no site for {}, retry in {} cycles",
                    player,
                    def.ident,
                    wait
                );
            }
            MakeOutcome::NoProducer => {}
        }
    }

    state.used = ctx.committed().clone();
}

/// Tries the requested type, then each equivalent type.
pub fn make_unit(ctx: &mut TickContext<'_>, req: &BuildRequest, reserve: &Resources) -> MakeOutcome {
    let mut candidates = vec![req.unit_type];
    candidates.extend_from_slice(ctx.helpers.equivalents(req.unit_type));

    let mut outcome = MakeOutcome::NoProducer;
    for (n, &t) in candidates.iter().enumerate() {
        let Some(def) = ctx.unit_type(t) else {
            continue;
        };
        if !ctx.requirements_met(&def.requires_types, &def.requires_upgrades) {
            continue;
        }
        // The requested type was cost-checked by the caller.
        if n > 0 && !ctx.available(reserve).covers(&def.costs) {
            continue;
        }
        let result = if ctx.helpers.builders(t).is_empty() {
            train_unit(ctx, req, def)
        } else {
            build_building(ctx, req, def)
        };
        match result {
            MakeOutcome::Issued(_) => return result,
            MakeOutcome::NoPlacement => outcome = MakeOutcome::NoPlacement,
            MakeOutcome::NoProducer => {}
        }
    }
    outcome
}

fn on_landmass(ctx: &TickContext<'_>, unit: &UnitInfo, landmass: Option<LandmassId>) -> bool {
    let Some(lm) = landmass else {
        return true;
    };
    let here = ctx.world.unit_landmass(unit);
    here == lm || (ctx.world.is_water_landmass(lm) && ctx.world.border_landmasses(here).contains(&lm))
}

fn train_unit(ctx: &mut TickContext<'_>, req: &BuildRequest, def: &UnitTypeDef) -> MakeOutcome {
    let trainers = ctx.helpers.trainers(def.id);
    let trainer = ctx.own().find(|u| {
        trainers.contains(&u.unit_type)
            && u.is_idle()
            && !u.removed
            && !ctx.is_claimed(u.id)
            && on_landmass(ctx, u, req.landmass)
    });
    if let Some(trainer) = trainer {
        ctx.issue(Command::Train {
            trainer: trainer.id,
            unit_type: def.id,
        });
        ctx.commit(&def.costs);
        ctx.commit_demand(def.demand);
        return MakeOutcome::Issued(def.id);
    }

    let upgraders = ctx.helpers.upgraders(def.id);
    let upgrader = ctx.own().find(|u| {
        upgraders.contains(&u.unit_type)
            && u.is_idle()
            && !ctx.is_claimed(u.id)
            && on_landmass(ctx, u, req.landmass)
    });
    if let Some(unit) = upgrader {
        ctx.issue(Command::UpgradeTo {
            unit: unit.id,
            unit_type: def.id,
        });
        ctx.commit(&def.costs);
        return MakeOutcome::Issued(def.id);
    }
    MakeOutcome::NoProducer
}

fn can_take_builder(ctx: &TickContext<'_>, u: &UnitInfo) -> bool {
    !u.under_construction
        && !u.removed
        && !ctx.is_claimed(u.id)
        && matches!(
            u.order,
            Order::Still | Order::StandGround | Order::Harvest { .. } | Order::ReturnGoods
        )
}

fn build_building(ctx: &mut TickContext<'_>, req: &BuildRequest, def: &UnitTypeDef) -> MakeOutcome {
    let builder_types = ctx.helpers.builders(def.id);
    let candidates: Vec<&UnitInfo> = ctx
        .own()
        .filter(|u| {
            builder_types.contains(&u.unit_type)
                && can_take_builder(ctx, u)
                && (def.dock || on_landmass(ctx, u, req.landmass))
        })
        .collect();
    let Some(first) = candidates.first().copied() else {
        return MakeOutcome::NoProducer;
    };

    let layer = if req.pos.is_some() { req.layer } else { first.layer };
    let near = match anchor(ctx, req, def, first) {
        Some(p) => p,
        None => return MakeOutcome::NoPlacement,
    };

    // Idle workers are preferred over ones pulled off harvesting.
    let idle: FxHashSet<UnitRef> = candidates
        .iter()
        .filter(|u| u.is_idle())
        .map(|u| u.id)
        .collect();
    let all: FxHashSet<UnitRef> = candidates.iter().map(|u| u.id).collect();
    let mask = movement_mask(MoveDomain::Land);
    let limit = ctx.config.placement_search_limit;
    let builder = [&idle, &all]
        .into_iter()
        .filter(|set| !set.is_empty())
        .find_map(|set| terrain::find_nearest_among(ctx.world, near, layer, mask, set, limit))
        .unwrap_or(first.id);

    let landmass = if def.dock { None } else { req.landmass };
    let Some(pos) = terrain::find_placement(ctx, def, near, layer, landmass) else {
        return MakeOutcome::NoPlacement;
    };

    ctx.issue(Command::Build {
        builder,
        unit_type: def.id,
        pos,
        layer,
    });
    ctx.commit(&def.costs);
    MakeOutcome::Issued(def.id)
}

/// Where to start the placement search for `def`.
fn anchor(ctx: &TickContext<'_>, req: &BuildRequest, def: &UnitTypeDef, builder: &UnitInfo) -> Option<Pos> {
    if let Some(pos) = req.pos {
        return Some(pos);
    }
    if let Some(id) = req.settlement {
        if let Some(s) = ctx.world.settlements().iter().find(|s| s.id == id) {
            return Some(s.pos);
        }
    }
    if let Some(kind) = def.extractor_for {
        return terrain::find_resource(ctx, builder, kind)
            .filter(|hit| hit.needs_extractor)
            .map(|hit| hit.pos);
    }
    Some(ctx.me().and_then(|p| p.capital).unwrap_or(builder.pos))
}

/// Unit-type wishes and force wish-lists reconciled against what exists and
/// what is already queued. Shortfalls become requests.
#[instrument(skip_all, name = "check_units")]
pub fn check_units(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let mut counter: BTreeMap<UnitTypeId, i64> = BTreeMap::new();
    for r in &state.build_queue {
        *counter.entry(r.unit_type).or_insert(0) += r.wanted as i64;
    }

    let wishes = state.unit_type_requests.clone();
    for wish in wishes {
        let have = ctx.count_with_equivalents(wish.unit_type) as i64;
        let c = counter.entry(wish.unit_type).or_insert(0);
        let requested = wish.count as i64 - have - *c;
        if requested > 0 {
            add_unit_type_request(
                state,
                wish.unit_type,
                requested as u32,
                RequestTarget::default(),
            );
            *counter.entry(wish.unit_type).or_insert(0) += requested;
        }
        *counter.entry(wish.unit_type).or_insert(0) -= wish.count as i64;
    }

    let mut attacking: BTreeMap<UnitTypeId, i64> = BTreeMap::new();
    for force in state.forces.iter() {
        if force.state.is_attacking() {
            for &u in force.units() {
                if let Some(info) = ctx.unit(u) {
                    *attacking.entry(info.unit_type).or_insert(0) += 1;
                }
            }
        }
    }

    let mut new_requests = Vec::new();
    for force in state.forces.iter_mut() {
        if force.state.is_attacking() {
            continue;
        }
        for &(t, want) in &force.wishes {
            let have = ctx.count_with_equivalents(t) as i64;
            let c = counter.get(&t).copied().unwrap_or(0);
            let att = attacking.get(&t).copied().unwrap_or(0);
            let requested = want as i64 - (have + c - att);
            if requested > 0 {
                new_requests.push((t, requested as u32));
                *counter.entry(t).or_insert(0) += requested;
                force.completed = false;
            }
            *counter.entry(t).or_insert(0) -= want as i64;
        }
    }
    for (t, n) in new_requests {
        add_unit_type_request(state, t, n, RequestTarget::default());
    }
}

fn can_produce_now(ctx: &TickContext<'_>, t: UnitTypeId) -> bool {
    ctx.helpers.producers(t).any(|p| ctx.count(p) > 0)
        && ctx
            .unit_type(t)
            .is_some_and(|d| ctx.requirements_met(&d.requires_types, &d.requires_upgrades))
}

/// Puts a supply building at the front of the queue. Returns false when none
/// is affordable; the blocking resources are then in `needed_mask`.
pub fn request_supply(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) -> bool {
    let providers = &ctx.helpers.supply_providers;
    if state
        .build_queue
        .iter()
        .any(|r| r.pending() > 0 && providers.contains(&r.unit_type))
    {
        return true;
    }

    let avail = ctx.available(&state.reserve);
    let mut first_short: Option<ResourceMask> = None;
    for &t in providers {
        if !can_produce_now(ctx, t) {
            continue;
        }
        let Some(def) = ctx.unit_type(t) else {
            continue;
        };
        let short = avail.shortfall(&def.costs);
        if short.is_empty() {
            let mut req = BuildRequest::new(t, 1);
            if let Some(capital) = ctx.me().and_then(|p| p.capital) {
                let layer = ctx.me().map_or(0, |p| p.start_layer);
                req.landmass = Some(ctx.world.landmass(capital, layer));
            }
            state.build_queue.insert(0, req);
            log::debug!("player {} requests supply: {}", ctx.player, def.ident);
            return true;
        }
        first_short.get_or_insert(short);
    }
    if let Some(short) = first_short {
        state.needed_mask = state.needed_mask.union(short);
    }
    false
}

/// Upgrade-to and research requests, each after a cost and availability check.
#[instrument(skip_all, name = "upgrade_requests")]
pub fn process_upgrade_requests(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let reserve = state.reserve.clone();

    let mut keep = Vec::new();
    for t in std::mem::take(&mut state.upgrade_to_requests) {
        let Some(def) = ctx.unit_type(t) else {
            continue;
        };
        let short = ctx.available(&reserve).shortfall(&def.costs);
        if !short.is_empty() {
            state.needed_mask = state.needed_mask.union(short);
            keep.push(t);
            continue;
        }
        let upgraders = ctx.helpers.upgraders(t);
        let unit = ctx
            .own()
            .find(|u| upgraders.contains(&u.unit_type) && u.is_idle() && !ctx.is_claimed(u.id));
        match unit {
            Some(u) => {
                ctx.issue(Command::UpgradeTo {
                    unit: u.id,
                    unit_type: t,
                });
                ctx.commit(&def.costs);
            }
            None => keep.push(t),
        }
    }
    state.upgrade_to_requests = keep;

    let mut keep = Vec::new();
    for up in std::mem::take(&mut state.research_requests) {
        if ctx.has_upgrade(up) {
            continue;
        }
        let Some(def) = ctx.catalog.upgrade(up) else {
            continue;
        };
        if !ctx.requirements_met(&def.requires_types, &def.requires_upgrades) {
            keep.push(up);
            continue;
        }
        let short = ctx.available(&reserve).shortfall(&def.costs);
        if !short.is_empty() {
            state.needed_mask = state.needed_mask.union(short);
            keep.push(up);
            continue;
        }
        let researchers = ctx.helpers.researchers(up);
        let unit = ctx
            .own()
            .find(|u| researchers.contains(&u.unit_type) && u.is_idle() && !ctx.is_claimed(u.id));
        match unit {
            Some(u) => {
                ctx.issue(Command::Research {
                    researcher: u.id,
                    upgrade: up,
                });
                ctx.commit(&def.costs);
            }
            None => keep.push(up),
        }
    }
    state.research_requests = keep;
}

fn find_entry(
    state: &AiPlayerState,
    unit_type: UnitTypeId,
    landmass: Option<LandmassId>,
    settlement: Option<SettlementId>,
) -> Option<usize> {
    state.build_queue.iter().position(|r| {
        r.unit_type == unit_type && r.made > 0 && r.matches(landmass, settlement)
    })
}

fn find_entry_or_equivalent(
    state: &AiPlayerState,
    helpers: &AiHelpers,
    unit_type: UnitTypeId,
    landmass: Option<LandmassId>,
    settlement: Option<SettlementId>,
) -> Option<usize> {
    find_entry(state, unit_type, landmass, settlement).or_else(|| {
        helpers
            .equivalents(unit_type)
            .iter()
            .find_map(|&e| find_entry(state, e, landmass, settlement))
    })
}

/// A unit of `unit_type` (or an equivalent) finished. Decrements both counters
/// of the matching entry and drops it once nothing more is wanted.
pub fn remove_from_built(
    state: &mut AiPlayerState,
    helpers: &AiHelpers,
    catalog: &Catalog,
    human_observed: bool,
    unit_type: UnitTypeId,
    landmass: Option<LandmassId>,
    settlement: Option<SettlementId>,
) -> bool {
    match find_entry_or_equivalent(state, helpers, unit_type, landmass, settlement) {
        Some(i) => {
            let r = &mut state.build_queue[i];
            r.made -= 1;
            r.wanted -= 1;
            if r.wanted == 0 {
                state.build_queue.remove(i);
            }
            true
        }
        None => {
            if !human_observed {
                log::warn!(
                    "player {}: {} completed outside the build queue",
                    state.player,
                    catalog.unit_type_ident(unit_type)
                );
            }
            false
        }
    }
}

/// A build could not proceed. Only `made` drops; the want stays for a retry.
pub fn reduce_made_in_built(
    state: &mut AiPlayerState,
    helpers: &AiHelpers,
    catalog: &Catalog,
    human_observed: bool,
    unit_type: UnitTypeId,
    landmass: Option<LandmassId>,
    settlement: Option<SettlementId>,
) -> bool {
    match find_entry_or_equivalent(state, helpers, unit_type, landmass, settlement) {
        Some(i) => {
            state.build_queue[i].made -= 1;
            true
        }
        None => {
            if !human_observed {
                log::warn!(
                    "player {}: failed {} has no build queue entry",
                    state.player,
                    catalog.unit_type_ident(unit_type)
                );
            }
            false
        }
    }
}

#[cfg(test)]
#[path = "production_tests.rs"]
mod tests;
