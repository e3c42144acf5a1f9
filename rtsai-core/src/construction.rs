//! Periodic construction and logistics checks: settlements, docks, building
//! templates, workers, upgrades, minecarts, roads and repairs.

use crate::command::Command;
use crate::context::TickContext;
use crate::force::ForceState;
use crate::helpers::ProducibleGoal;
use crate::ids::{Pos, UnitRef, UnitTypeId};
use crate::production::add_unit_type_request;
use crate::state::{AiPlayerState, RequestTarget};
use crate::terrain;
use crate::world::{Order, TileFlags, UnitInfo};
use rustc_hash::FxHashSet;
use tracing::instrument;

/// Whether some owned unit can produce `t` and its requirements hold.
fn can_make(ctx: &TickContext<'_>, t: UnitTypeId) -> bool {
    ctx.helpers.producers(t).any(|p| ctx.count(p) > 0)
        && ctx
            .unit_type(t)
            .is_some_and(|d| ctx.requirements_met(&d.requires_types, &d.requires_upgrades))
}

fn pending_of(state: &AiPlayerState, types: &[UnitTypeId]) -> bool {
    state
        .build_queue
        .iter()
        .any(|r| r.wanted > 0 && types.contains(&r.unit_type))
}

fn own_buildings<'a, 'b>(ctx: &'b TickContext<'a>) -> impl Iterator<Item = &'a UnitInfo> + 'b {
    ctx.own().filter(|u| {
        !u.under_construction && ctx.type_of(u).is_some_and(|t| t.building)
    })
}

/// Founds a town hall at the nearest free settlement. One at a time.
#[instrument(skip_all, name = "check_settlements")]
pub fn check_settlements(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    if pending_of(state, &ctx.helpers.town_halls) {
        return;
    }
    let faction = ctx.me().and_then(|p| p.faction);
    let hall = ProducibleGoal::Class("town-hall".to_string())
        .resolve(ctx.catalog, faction)
        .filter(|&t| ctx.helpers.town_halls.contains(&t))
        .or_else(|| ctx.helpers.town_halls.first().copied());
    let Some(hall) = hall.filter(|&t| can_make(ctx, t)) else {
        return;
    };
    let origin = ctx
        .me()
        .and_then(|p| p.capital)
        .or_else(|| ctx.own().next().map(|u| u.pos))
        .unwrap_or_default();
    let site = ctx
        .world
        .settlements()
        .iter()
        .filter(|s| s.owner.is_none() && s.town_hall.is_none())
        .min_by_key(|s| (s.pos.distance(origin), s.id));
    if let Some(s) = site {
        let target = RequestTarget {
            landmass: Some(ctx.world.landmass(s.pos, s.layer)),
            settlement: Some(s.id),
            pos: Some((s.pos, s.layer)),
        };
        log::debug!("player {} wants to settle {}", ctx.player, s.name);
        add_unit_type_request(state, hall, 1, target);
    }
}

/// Requests a dock when the home landmass touches water and the player has
/// none.
#[instrument(skip_all, name = "check_docks")]
pub fn check_docks(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let docks = &ctx.helpers.docks;
    if docks.iter().any(|&d| ctx.count(d) > 0) || pending_of(state, docks) {
        return;
    }
    let Some(me) = ctx.me() else { return };
    let Some(capital) = me.capital else { return };
    let home = ctx.world.landmass(capital, me.start_layer);
    let coastal = ctx
        .world
        .border_landmasses(home)
        .into_iter()
        .any(|lm| ctx.world.is_water_landmass(lm));
    // Only worth it when something wants to cross.
    let wants_boats = !state.transporters.is_empty()
        || pending_of(state, &ctx.helpers.transports)
        || state.forces.iter().any(|f| matches!(f.state, ForceState::Boarding { .. }));
    if !coastal || !wants_boats {
        return;
    }
    if let Some(&dock) = docks.iter().find(|&&d| can_make(ctx, d)) {
        add_unit_type_request(state, dock, 1, RequestTarget::default());
    }
}

/// Building templates, best priority first. At most one new request per pass.
#[instrument(skip_all, name = "building_templates")]
pub fn check_building_templates(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let faction = ctx.me().and_then(|p| p.faction);
    let radius = ctx.config.settlement_radius;
    for template in &ctx.ai_type.building_templates {
        let Some(t) = template.goal.resolve(ctx.catalog, faction) else {
            continue;
        };
        if !can_make(ctx, t) {
            continue;
        }
        if template.per_settlement {
            let mine = ctx
                .world
                .settlements()
                .iter()
                .filter(|s| s.owner == Some(ctx.player) && s.town_hall.is_some());
            for s in mine {
                let present = ctx.own().any(|u| {
                    ctx.helpers.are_equivalent(t, u.unit_type)
                        && (u.settlement == Some(s.id) || u.pos.distance(s.pos) <= radius)
                });
                let queued = state
                    .build_queue
                    .iter()
                    .any(|r| r.unit_type == t && r.settlement == Some(s.id));
                if !present && !queued {
                    let target = RequestTarget {
                        landmass: Some(ctx.world.landmass(s.pos, s.layer)),
                        settlement: Some(s.id),
                        pos: Some((s.pos, s.layer)),
                    };
                    add_unit_type_request(state, t, 1, target);
                    return;
                }
            }
        } else if ctx.count_with_equivalents(t) == 0 && state.queued(t) == 0 {
            add_unit_type_request(state, t, 1, RequestTarget::default());
            return;
        }
    }
}

/// Keeps enough workers per town hall.
#[instrument(skip_all, name = "check_workers")]
pub fn check_workers(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let halls: Vec<&UnitInfo> = ctx
        .own()
        .filter(|u| !u.under_construction && ctx.helpers.town_halls.contains(&u.unit_type))
        .collect();
    let Some(first) = halls.first() else { return };
    let Some(hall_def) = ctx.type_of(first) else { return };
    let Some(worker) = hall_def
        .trains
        .iter()
        .copied()
        .find(|&t| ctx.unit_type(t).is_some_and(|d| d.is_harvester()))
    else {
        return;
    };
    let wanted = halls.len() as u32 * ctx.config.workers_per_town_hall;
    let have = ctx
        .own()
        .filter(|u| ctx.type_of(u).is_some_and(|t| t.is_harvester()))
        .count() as u32;
    let queued = state.queued(worker);
    if have + queued < wanted {
        let landmass = ctx.world.unit_landmass(first);
        add_unit_type_request(state, worker, wanted - have - queued, RequestTarget::landmass(landmass));
    }
}

/// Queues research from the AI type's list and building tier upgrades.
#[instrument(skip_all, name = "check_upgrades")]
pub fn check_upgrades(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    for &up in &ctx.ai_type.research {
        if ctx.has_upgrade(up) || state.research_requests.contains(&up) {
            continue;
        }
        let Some(def) = ctx.catalog.upgrade(up) else { continue };
        let researchable = ctx.helpers.researchers(up).iter().any(|&r| ctx.count(r) > 0);
        if researchable && ctx.requirements_met(&def.requires_types, &def.requires_upgrades) {
            state.research_requests.push(up);
        }
    }

    let mut wanted = Vec::new();
    for info in own_buildings(ctx) {
        let Some(def) = ctx.type_of(info) else { continue };
        for &target in &def.upgrades_to {
            let Some(tdef) = ctx.unit_type(target) else { continue };
            if tdef.building
                && tdef.ai_priority > def.ai_priority
                && ctx.count(target) == 0
                && ctx.requirements_met(&tdef.requires_types, &tdef.requires_upgrades)
                && !state.upgrade_to_requests.contains(&target)
                && !wanted.contains(&target)
            {
                wanted.push(target);
            }
        }
    }
    state.upgrade_to_requests.extend(wanted);
}

/// Requests a minecart for each extractor too far from a depot to walk.
#[instrument(skip_all, name = "check_minecarts")]
pub fn check_minecarts(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let Some(&cart) = ctx.helpers.minecarts.iter().find(|&&m| can_make(ctx, m)) else {
        return;
    };
    let radius = ctx.config.settlement_radius;
    let depots: Vec<Pos> = own_buildings(ctx)
        .filter(|u| ctx.type_of(u).is_some_and(|t| !t.stores.is_empty()))
        .map(|u| u.pos)
        .collect();
    let remote = own_buildings(ctx)
        .filter(|u| ctx.type_of(u).is_some_and(|t| t.extractor_for.is_some()))
        .filter(|u| depots.iter().all(|d| d.distance(u.pos) > radius))
        .count() as u32;
    let carts = ctx.count(cart) + state.queued(cart);
    if carts < remote {
        add_unit_type_request(state, cart, 1, RequestTarget::default());
    }
}

/// Requests a road next to buildings without road access. Scans at most
/// `pathway_scan_cap` buildings per pass, resuming after the last one.
#[instrument(skip_all, name = "check_pathways")]
pub fn check_pathways(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let Some(&road) = ctx.helpers.pathways.iter().find(|&&p| can_make(ctx, p)) else {
        return;
    };
    if pending_of(state, &[road]) {
        return;
    }
    let Some(road_def) = ctx.unit_type(road) else { return };
    let buildings: Vec<&UnitInfo> = own_buildings(ctx)
        .filter(|u| ctx.type_of(u).is_some_and(|t| !t.pathway))
        .collect();
    if buildings.is_empty() {
        return;
    }
    let start = state
        .last_pathway_construction_unit
        .and_then(|last| buildings.iter().position(|u| u.id == last))
        .map_or(0, |i| i + 1);
    let world = ctx.world;
    for step in 0..ctx.config.pathway_scan_cap.min(buildings.len()) {
        let b = buildings[(start + step) % buildings.len()];
        state.last_pathway_construction_unit = Some(b.id);
        let connected = b
            .pos
            .around()
            .iter()
            .any(|&p| world.flags(p, b.layer).contains(TileFlags::ROAD));
        if connected {
            continue;
        }
        let spot = b
            .pos
            .around()
            .into_iter()
            .find(|&p| world.can_build_at(ctx.catalog, road_def, p, b.layer));
        if let Some(p) = spot {
            add_unit_type_request(state, road, 1, RequestTarget::at(p, b.layer));
            return;
        }
    }
}

/// Sends one repairer to the next damaged building after the cursor.
#[instrument(skip_all, name = "check_repair")]
pub fn check_repair(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let buildings: Vec<&UnitInfo> = own_buildings(ctx).collect();
    if buildings.is_empty() {
        state.last_repair_unit = None;
        return;
    }
    let start = state
        .last_repair_unit
        .and_then(|last| buildings.iter().position(|u| u.id == last))
        .map_or(0, |i| i + 1);
    let being_repaired: FxHashSet<UnitRef> = ctx
        .own()
        .filter_map(|u| match u.order {
            Order::Repair { target } => Some(target),
            _ => None,
        })
        .collect();

    for step in 0..buildings.len() {
        let b = buildings[(start + step) % buildings.len()];
        if !b.is_hurt() || being_repaired.contains(&b.id) {
            continue;
        }
        let repairers: FxHashSet<UnitRef> = ctx
            .own()
            .filter(|u| {
                ctx.type_of(u).is_some_and(|t| t.can_repair)
                    && !ctx.is_claimed(u.id)
                    && state.forces.force_of(u.id).is_none()
                    && matches!(u.order, Order::Still | Order::StandGround | Order::Harvest { .. })
            })
            .map(|u| u.id)
            .collect();
        let repairer = terrain::find_nearest_among(
            ctx.world,
            b.pos,
            b.layer,
            TileFlags::WATER | TileFlags::UNPASSABLE | TileFlags::WALL,
            &repairers,
            ctx.config.placement_search_limit,
        );
        state.last_repair_unit = Some(b.id);
        if let Some(unit) = repairer {
            log::trace!("player {} repairs {} with {}", ctx.player, b.id, unit);
            ctx.issue(Command::Repair { unit, target: b.id });
        }
        return;
    }
    state.last_repair_unit = None;
}

#[cfg(test)]
#[path = "construction_tests.rs"]
mod tests;
