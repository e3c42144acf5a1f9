//! Worker allocation across resources, market trades and the production
//! toggle of dual-purpose buildings.

use crate::command::{Command, HarvestTarget};
use crate::context::TickContext;
use crate::ids::UnitRef;
use crate::production::add_unit_type_request;
use crate::resources::{ResourceKind, ResourceMask};
use crate::state::{AiPlayerState, RequestTarget};
use crate::terrain;
use crate::world::Order;
use std::collections::BTreeMap;
use tracing::instrument;

/// Per-kind worker counts for one collection pass.
#[derive(Debug, Default, Clone)]
pub struct Allocation {
    pub wanted: BTreeMap<ResourceKind, i64>,
    pub assigned: BTreeMap<ResourceKind, Vec<UnitRef>>,
    pub returning: BTreeMap<ResourceKind, i64>,
    /// Idle harvesters not yet given a job.
    pub idle: Vec<UnitRef>,
}

impl Allocation {
    pub fn assigned_count(&self, kind: ResourceKind) -> i64 {
        self.assigned.get(&kind).map_or(0, |v| v.len() as i64)
    }

    fn wanted_of(&self, kind: ResourceKind) -> i64 {
        self.wanted.get(&kind).copied().unwrap_or(0)
    }

    /// Workers still missing on `kind`; negative when over-served.
    pub fn priority_needed(&self, kind: ResourceKind) -> i64 {
        self.wanted_of(kind)
            - self.assigned_count(kind)
            - self.returning.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_harvesters(&self) -> i64 {
        self.assigned.values().map(|v| v.len() as i64).sum::<i64>()
            + self.returning.values().sum::<i64>()
            + self.idle.len() as i64
    }
}

/// Splits `harvesters` workers across kinds by collect ratio. Kinds blocking
/// production count double.
pub fn wanted_workers(
    collect: &BTreeMap<ResourceKind, i32>,
    needed: ResourceMask,
    harvesters: i64,
    min_basis: u32,
) -> BTreeMap<ResourceKind, i64> {
    let weights: BTreeMap<ResourceKind, i64> = collect
        .iter()
        .filter(|(_, &w)| w > 0)
        .map(|(&k, &w)| {
            let w = w as i64;
            (k, if needed.contains(k) { w * 2 } else { w })
        })
        .collect();
    let total: i64 = weights.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }
    let basis = harvesters.max(min_basis as i64);
    weights
        .into_iter()
        .map(|(k, w)| (k, (basis * w + total / 2) / total))
        .collect()
}

fn classify(ctx: &mut TickContext<'_>, state: &AiPlayerState) -> Allocation {
    let mut alloc = Allocation::default();
    let mut return_now = Vec::new();
    for info in ctx.own() {
        let Some(def) = ctx.type_of(info) else { continue };
        if !def.is_harvester()
            || info.under_construction
            || info.removed
            || state.forces.force_of(info.id).is_some()
            || ctx.is_claimed(info.id)
        {
            continue;
        }
        match info.order {
            Order::Harvest { resource } => alloc.assigned.entry(resource).or_default().push(info.id),
            Order::ReturnGoods => {
                if let Some((kind, _)) = info.cargo {
                    *alloc.returning.entry(kind).or_insert(0) += 1;
                }
            }
            Order::Still | Order::StandGround => match info.cargo {
                Some((kind, amount)) if amount > 0 => {
                    *alloc.returning.entry(kind).or_insert(0) += 1;
                    return_now.push(info.id);
                }
                _ => alloc.idle.push(info.id),
            },
            _ => {}
        }
    }
    for unit in return_now {
        ctx.issue(Command::ReturnGoods { unit, depot: None });
    }
    alloc
}

enum Assign {
    Harvesting,
    ExtractorQueued,
    Nothing,
}

/// Sends `unit` to the nearest source of `kind`. A raw deposit gets an
/// extractor request instead.
fn assign_worker(ctx: &mut TickContext<'_>, state: &mut AiPlayerState, unit: UnitRef, kind: ResourceKind) -> Assign {
    let Some(info) = ctx.unit(unit) else {
        return Assign::Nothing;
    };
    let Some(hit) = terrain::find_resource(ctx, info, kind) else {
        return Assign::Nothing;
    };
    if !hit.needs_extractor {
        ctx.issue(Command::Harvest {
            unit,
            target: HarvestTarget::Unit(hit.target),
        });
        log::trace!("player {} sends {} to resource {}", ctx.player, unit, kind);
        return Assign::Harvesting;
    }

    let extractors = ctx.helpers.extractors(kind);
    if state
        .build_queue
        .iter()
        .any(|r| r.pending() > 0 && extractors.contains(&r.unit_type))
    {
        return Assign::ExtractorQueued;
    }
    let buildable = extractors.iter().copied().find(|&t| {
        ctx.helpers.builders(t).iter().any(|&b| ctx.count(b) > 0)
            && ctx
                .unit_type(t)
                .is_some_and(|d| ctx.requirements_met(&d.requires_types, &d.requires_upgrades))
    });
    match buildable {
        Some(t) => {
            add_unit_type_request(state, t, 1, RequestTarget::at(hit.pos, info.layer));
            Assign::ExtractorQueued
        }
        None => Assign::Nothing,
    }
}

/// The collection pass.
#[instrument(skip_all, name = "collect_resources")]
pub fn collect_resources(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let mut alloc = classify(ctx, state);
    alloc.wanted = wanted_workers(
        &state.collect,
        state.needed_mask,
        alloc.total_harvesters(),
        ctx.config.min_harvester_basis,
    );

    let mut kinds: Vec<ResourceKind> = alloc.wanted.keys().copied().collect();
    kinds.sort_by_key(|&k| (std::cmp::Reverse(alloc.priority_needed(k)), k));

    let mut failed: Vec<UnitRef> = Vec::new();
    for &kind in &kinds {
        if alloc.priority_needed(kind) <= 0 {
            continue;
        }
        let eligible: Vec<usize> = alloc
            .idle
            .iter()
            .enumerate()
            .filter(|(_, &u)| {
                ctx.unit(u)
                    .and_then(|i| ctx.type_of(i))
                    .is_some_and(|t| t.harvests_kind(kind))
            })
            .map(|(i, _)| i)
            .collect();
        if eligible.is_empty() {
            continue;
        }
        let pick = eligible[ctx.rng.below(eligible.len())];
        let unit = alloc.idle.remove(pick);
        match assign_worker(ctx, state, unit, kind) {
            Assign::Harvesting => alloc.assigned.entry(kind).or_default().push(unit),
            Assign::ExtractorQueued => {}
            Assign::Nothing => failed.push(unit),
        }
    }

    if ctx.config.cross_resource_reassignment {
        reassign_one(ctx, state, &mut alloc, &kinds);
    }

    trade(ctx, &alloc, &kinds);

    // Workers nobody could use look for new deposits.
    failed.retain(|u| !state.scouts.contains(u));
    if state.scouts.len() < ctx.config.max_scouts {
        if let Some(&unit) = failed.first() {
            ctx.issue(Command::Explore { unit });
            state.scouts.push(unit);
            log::trace!("player {} sends idle worker {} scouting", ctx.player, unit);
        }
    }
}

/// Moves at most one worker from an over-served kind to the neediest one,
/// unless that would leave the destination better served than the source.
/// The move is blocked when `(assigned[dst] + 1) * 100 / wanted[dst]` exceeds
/// `assigned[src] * 100 / wanted[src]`: the destination side is measured after
/// the move, the source side before it.
fn reassign_one(
    ctx: &mut TickContext<'_>,
    state: &mut AiPlayerState,
    alloc: &mut Allocation,
    kinds: &[ResourceKind],
) {
    let Some(&dst) = kinds.iter().find(|&&k| alloc.priority_needed(k) > 0) else {
        return;
    };
    let wanted_dst = alloc.wanted_of(dst).max(1);
    for &src in kinds.iter().rev() {
        if src == dst || alloc.priority_needed(src) >= 0 {
            continue;
        }
        let wanted_src = alloc.wanted_of(src);
        if wanted_src > 0 {
            let dst_after = (alloc.assigned_count(dst) + 1) * 100 / wanted_dst;
            let src_now = alloc.assigned_count(src) * 100 / wanted_src;
            if dst_after > src_now {
                continue;
            }
        }
        let Some(unit) = alloc.assigned.get(&src).and_then(|list| {
            list.iter().copied().find(|&u| {
                !ctx.is_claimed(u)
                    && ctx
                        .unit(u)
                        .and_then(|i| ctx.type_of(i))
                        .is_some_and(|t| t.harvests_kind(dst))
            })
        }) else {
            continue;
        };
        if let Assign::Harvesting = assign_worker(ctx, state, unit, dst) {
            if let Some(list) = alloc.assigned.get_mut(&src) {
                list.retain(|&u| u != unit);
            }
            alloc.assigned.entry(dst).or_default().push(unit);
            log::debug!(
                "player {} moves worker {} from resource {} to {}",
                ctx.player,
                unit,
                src,
                dst
            );
        }
        return;
    }
}

/// At most one buy and one sell per pass.
fn trade(ctx: &mut TickContext<'_>, alloc: &Allocation, kinds: &[ResourceKind]) {
    let Some(market) = ctx
        .own()
        .find(|u| !u.under_construction && ctx.helpers.markets.contains(&u.unit_type))
        .map(|u| u.id)
    else {
        return;
    };
    let Some(me) = ctx.me() else { return };
    let (catalog, world, config) = (ctx.catalog, ctx.world, ctx.config);
    let currency = catalog.currency;
    let stock = |k: ResourceKind| me.resources.get(k);
    let tradeable = |k: ResourceKind| k != currency && catalog.resource(k).is_some_and(|r| r.tradeable);

    let buy = kinds.iter().copied().find(|&k| {
        tradeable(k)
            && alloc.priority_needed(k) > 0
            && alloc.assigned_count(k) == 0
            && stock(currency) >= world.market_price(k) * config.buy_currency_factor
    });
    if let Some(resource) = buy {
        ctx.issue(Command::Buy { market, resource });
    }

    if stock(currency) < config.sell_currency_threshold {
        let sell = catalog.resource_kinds().find(|&k| {
            tradeable(k)
                && Some(k) != buy
                && alloc.wanted_of(k) == 0
                && alloc.assigned_count(k) == 0
                && stock(k) > config.sell_surplus
        });
        if let Some(resource) = sell {
            ctx.issue(Command::Sell { market, resource });
        }
    }
}

/// Switches dual-purpose buildings to the most wanted resource they can
/// produce: blocking kinds first, then by collect ratio.
#[instrument(skip_all, name = "production_toggle")]
pub fn toggle_production(ctx: &mut TickContext<'_>, state: &AiPlayerState) {
    let mut orders = Vec::new();
    for info in ctx.own() {
        if info.under_construction {
            continue;
        }
        let Some(def) = ctx.type_of(info) else { continue };
        if def.produces.len() < 2 {
            continue;
        }
        let best = def.produces.iter().copied().max_by_key(|&k| {
            (
                state.needed_mask.contains(k),
                state.collect.get(&k).copied().unwrap_or(0),
                std::cmp::Reverse(k),
            )
        });
        if best.is_some() && info.producing != best {
            orders.push((info.id, best));
        }
    }
    for (building, resource) in orders {
        ctx.issue(Command::ProduceResource { building, resource });
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
