//! Unilateral war and peace decisions against other players.

use crate::command::Command;
use crate::context::TickContext;
use crate::ids::PlayerId;
use crate::world::{PlayerInfo, PlayerKind, Stance};
use std::collections::BTreeSet;
use tracing::instrument;

fn advantage(ctx: &TickContext<'_>, strong: &PlayerInfo, weak: &PlayerInfo) -> bool {
    strong.military_score * 100 > weak.military_score * ctx.config.military_advantage_percent
}

/// Players with a town hall, or revealed, hold territory.
pub fn is_territorial(ctx: &TickContext<'_>) -> bool {
    ctx.me().is_some_and(|p| p.revealed)
        || ctx.helpers.town_halls.iter().any(|&t| ctx.count(t) > 0)
}

fn declare(ctx: &mut TickContext<'_>, declared: &mut BTreeSet<PlayerId>, target: PlayerId, reason: &str) {
    if !declared.insert(target) {
        return;
    }
    log::info!("player {} declares war on {} ({})", ctx.player, target, reason);
    ctx.issue(Command::SetDiplomacy {
        target,
        stance: Stance::Enemy,
    });
}

/// One diplomacy pass. Only runs in campaigns and never for passive players.
#[instrument(skip_all, name = "diplomacy")]
pub fn check_diplomacy(ctx: &mut TickContext<'_>) {
    let world = ctx.world;
    if !world.is_campaign() || ctx.ai_type.passive {
        return;
    }
    let Some(me) = ctx.me() else { return };
    if me.passive {
        return;
    }
    let others: Vec<&PlayerInfo> = world
        .player_ids()
        .into_iter()
        .filter(|&id| id != me.id)
        .filter_map(|id| world.player(id))
        .filter(|p| matches!(p.kind, PlayerKind::Computer | PlayerKind::Person))
        .collect();
    let mut declared = BTreeSet::new();

    if !is_territorial(ctx) {
        if ctx.cycle() >= ctx.config.enforced_peace_cycle {
            if let Some(owner) = world.tile_owner(me.start_pos, me.start_layer) {
                if owner != me.id && !world.is_enemy(me.id, owner) {
                    declare(ctx, &mut declared, owner, "holds our start");
                }
            }
        }
    } else if let Some(overlord) = me.overlord.and_then(|o| world.player(o)) {
        if !world.is_enemy(me.id, overlord.id) && advantage(ctx, me, overlord) {
            declare(ctx, &mut declared, overlord.id, "overlord is weaker");
        }
    } else {
        let at_war = others.iter().any(|o| world.is_enemy(me.id, o.id));
        if !at_war {
            let mut candidates: Vec<&PlayerInfo> = others
                .iter()
                .copied()
                .filter(|o| {
                    world.borders(me.id, o.id)
                        && o.capital
                            .is_some_and(|c| world.is_explored(me.id, c, o.start_layer))
                })
                .collect();
            ctx.rng.shuffle(&mut candidates);
            let target = candidates
                .into_iter()
                .take(ctx.config.war_candidate_cap)
                .find(|o| !world.is_allied(me.id, o.id) && advantage(ctx, me, o));
            if let Some(o) = target {
                declare(ctx, &mut declared, o.id, "border expansion");
            }
        }
    }

    // Intruders in our territory.
    for o in &others {
        if world.is_enemy(me.id, o.id) || world.is_allied(me.id, o.id) || declared.contains(&o.id) {
            continue;
        }
        let intruding = world.units_of(o.id).into_iter().any(|u| {
            world
                .unit(u)
                .is_some_and(|i| !i.removed && world.tile_owner(i.pos, i.layer) == Some(me.id))
        });
        if intruding && advantage(ctx, me, o) {
            declare(ctx, &mut declared, o.id, "units in our territory");
        }
    }

    // Back down from wars we are losing against players not fighting back.
    for o in &others {
        if declared.contains(&o.id) {
            continue;
        }
        if world.is_enemy(me.id, o.id) && !world.is_enemy(o.id, me.id) && advantage(ctx, o, me) {
            log::info!("player {} sues {} for peace", ctx.player, o.id);
            ctx.issue(Command::SetDiplomacy {
                target: o.id,
                stance: Stance::Neutral,
            });
        }
    }
}

#[cfg(test)]
#[path = "diplomacy_tests.rs"]
mod tests;
