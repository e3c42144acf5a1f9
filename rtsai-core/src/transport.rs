//! Ferrying land units across water.

use crate::command::Command;
use crate::context::TickContext;
use crate::ids::{LandmassId, MapLayer, Pos, UnitRef, UnitTypeId};
use crate::production::add_unit_type_request;
use crate::state::{AiPlayerState, RequestTarget};
use crate::terrain;
use crate::world::Order;
use tracing::instrument;

/// Free slots on a transporter.
fn free_slots(ctx: &TickContext<'_>, transporter: UnitRef) -> u32 {
    let Some(info) = ctx.unit(transporter) else {
        return 0;
    };
    let Some(def) = ctx.type_of(info) else {
        return 0;
    };
    let used: u32 = info
        .passengers
        .iter()
        .filter_map(|&p| ctx.unit(p))
        .filter_map(|p| ctx.type_of(p))
        .map(|t| t.board_slots())
        .sum();
    def.transport_capacity.saturating_sub(used)
}

/// Transport type with the lowest total cost per slot.
fn cheapest_transport(ctx: &TickContext<'_>) -> Option<UnitTypeId> {
    ctx.helpers
        .transports
        .iter()
        .filter_map(|&t| ctx.unit_type(t))
        .filter(|d| d.transport_capacity > 0)
        .min_by_key(|d| {
            let cost: i64 = d.costs.iter().map(|(_, v)| v).sum();
            (cost * 100 / d.transport_capacity as i64, d.id)
        })
        .map(|d| d.id)
}

/// Capacity already on order for `water`.
fn capacity_on_order(ctx: &TickContext<'_>, state: &AiPlayerState, water: LandmassId) -> u32 {
    state
        .build_queue
        .iter()
        .filter(|r| r.landmass == Some(water) && ctx.helpers.transports.contains(&r.unit_type))
        .filter_map(|r| ctx.unit_type(r.unit_type).map(|d| r.wanted * d.transport_capacity))
        .sum()
}

/// Asks for transporters covering `shortfall` slots, and for a dock to build
/// them in when the player has none.
fn request_capacity(ctx: &TickContext<'_>, state: &mut AiPlayerState, water: LandmassId, shortfall: u32) {
    let Some(t) = cheapest_transport(ctx) else {
        log::debug!("player {} has no transport type to cross water", ctx.player);
        return;
    };
    let Some(def) = ctx.unit_type(t) else {
        return;
    };
    let count = shortfall.div_ceil(def.transport_capacity);
    add_unit_type_request(state, t, count, RequestTarget::landmass(water));
    log::debug!(
        "player {} requests {} x {} for {} slots",
        ctx.player,
        count,
        def.ident,
        shortfall
    );

    let trainers = ctx.helpers.trainers(t);
    let has_trainer = trainers.iter().any(|&tr| ctx.count(tr) > 0);
    let dock_queued = state
        .build_queue
        .iter()
        .any(|r| trainers.contains(&r.unit_type));
    if !has_trainer && !dock_queued {
        if let Some(&dock) = trainers.iter().find(|&&tr| {
            ctx.unit_type(tr).is_some_and(|d| d.building) && !ctx.helpers.builders(tr).is_empty()
        }) {
            add_unit_type_request(state, dock, 1, RequestTarget::default());
        }
    }
}

/// Moves `units` from `home` (or wherever they stand) to the landmass of
/// `goal`. Returns true once every unit stands on that landmass.
///
/// Requests transporters when capacity on the bridging water falls short,
/// counting capacity already on order. Otherwise boards waiting units with a
/// staggered delay and unloads transporters that are full or carry the whole
/// remaining cohort.
pub fn check_unit_transport(
    ctx: &mut TickContext<'_>,
    state: &mut AiPlayerState,
    units: &[UnitRef],
    home: Option<LandmassId>,
    goal: Pos,
    layer: MapLayer,
) -> bool {
    let world = ctx.world;
    let goal_landmass = world.landmass(goal, layer);

    let mut waiting: Vec<UnitRef> = Vec::new();
    let mut boarded = 0usize;
    let mut origin = home;
    for &u in units {
        let Some(info) = ctx.unit(u) else { continue };
        if info.boarded_on.is_some() {
            boarded += 1;
            continue;
        }
        let here = world.unit_landmass(info);
        if here == goal_landmass {
            continue;
        }
        origin.get_or_insert(here);
        waiting.push(u);
    }
    if waiting.is_empty() && boarded == 0 {
        return true;
    }

    // With everyone aboard, the water is wherever their transporters float.
    let water = match origin {
        Some(from) => terrain::bridging_water(world, from, goal_landmass),
        None => units
            .iter()
            .filter_map(|&u| ctx.unit(u))
            .find_map(|i| i.boarded_on)
            .and_then(|t| ctx.unit(t))
            .map(|t| world.unit_landmass(t)),
    };
    let Some(water) = water else {
        log::debug!(
            "player {}: no water links {:?} and landmass {}",
            ctx.player,
            origin,
            goal_landmass
        );
        return false;
    };

    let needed: u32 = waiting
        .iter()
        .filter_map(|&u| ctx.unit(u))
        .filter_map(|u| ctx.type_of(u))
        .map(|t| t.board_slots())
        .sum();
    let transporters: Vec<UnitRef> = state
        .transporters
        .get(&water)
        .map(|list| list.iter().copied().filter(|&t| ctx.unit(t).is_some()).collect())
        .unwrap_or_default();
    let available: u32 = transporters.iter().map(|&t| free_slots(ctx, t)).sum();

    if needed > available {
        let on_order = capacity_on_order(ctx, state, water);
        if needed > available + on_order {
            request_capacity(ctx, state, water, needed - available - on_order);
        }
        return false;
    }

    // Board.
    let mut slots: Vec<(UnitRef, u32)> = transporters
        .iter()
        .map(|&t| (t, free_slots(ctx, t)))
        .collect();
    let mut delay = 0u32;
    for &u in &waiting {
        let Some(info) = ctx.unit(u) else { continue };
        if matches!(info.order, Order::Board { .. }) || ctx.is_claimed(u) {
            continue;
        }
        let size = ctx.type_of(info).map_or(1, |t| t.board_slots());
        let Some(slot) = slots.iter_mut().find(|(_, free)| *free >= size) else {
            break;
        };
        slot.1 -= size;
        ctx.issue(Command::Board {
            unit: u,
            transporter: slot.0,
            delay,
        });
        delay += ctx.config.board_delay;
    }

    // Unload.
    let still_waiting = waiting
        .iter()
        .filter_map(|&u| ctx.unit(u))
        .any(|u| u.boarded_on.is_none());
    for &t in &transporters {
        let Some(info) = ctx.unit(t) else { continue };
        if info.passengers.is_empty()
            || ctx.is_claimed(t)
            || matches!(info.order, Order::Unload | Order::Move { .. })
        {
            continue;
        }
        if free_slots(ctx, t) == 0 || !still_waiting {
            ctx.issue(Command::Unload {
                transporter: t,
                goal,
                layer,
            });
        }
    }
    false
}

/// Rebuilds the landmass to transporter map from the living roster.
#[instrument(skip_all, name = "transporters")]
pub fn rebuild_transporters(ctx: &TickContext<'_>, state: &mut AiPlayerState) {
    state.transporters.clear();
    for info in ctx.own() {
        if info.under_construction {
            continue;
        }
        if ctx.type_of(info).is_some_and(|t| t.is_transporter()) {
            register_transporter(ctx, state, info.id);
        }
    }
}

pub fn register_transporter(ctx: &TickContext<'_>, state: &mut AiPlayerState, unit: UnitRef) {
    let Some(info) = ctx.unit(unit) else {
        return;
    };
    if state.is_transporter(unit) {
        return;
    }
    let landmass = ctx.world.unit_landmass(info);
    state.transporters.entry(landmass).or_default().push(unit);
}

/// Keeps ferrying defenders toward threatened sites and drops the ones that
/// arrived or died.
#[instrument(skip_all, name = "site_transport")]
pub fn update_site_transport(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let sites = std::mem::take(&mut state.site_transport_units);
    let mut keep = Vec::with_capacity(sites.len());
    for mut entry in sites {
        let Some(site) = ctx.unit(entry.site) else {
            continue;
        };
        let site_landmass = ctx.world.unit_landmass(site);
        entry.units.retain(|&u| {
            ctx.unit(u).is_some_and(|i| {
                i.player == ctx.player
                    && (i.boarded_on.is_some() || ctx.world.unit_landmass(i) != site_landmass)
            })
        });
        if entry.units.is_empty() {
            continue;
        }
        let (pos, layer) = (site.pos, site.layer);
        if check_unit_transport(ctx, state, &entry.units, None, pos, layer) {
            continue;
        }
        keep.push(entry);
    }
    state.site_transport_units.extend(keep);
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
