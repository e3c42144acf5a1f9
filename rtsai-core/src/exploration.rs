//! Scouting.

use crate::command::Command;
use crate::context::TickContext;
use crate::ids::UnitRef;
use crate::state::AiPlayerState;
use crate::world::{movement_mask, Order, TileFlags, UnitInfo};
use tracing::instrument;

fn can_scout(ctx: &TickContext<'_>, state: &AiPlayerState, unit: &UnitInfo) -> bool {
    unit.is_idle()
        && !unit.removed
        && !ctx.is_claimed(unit.id)
        && !state.scouts.contains(&unit.id)
        && state.forces.force_of(unit.id).is_none()
        && !state.is_transporter(unit.id)
        && ctx
            .type_of(unit)
            .is_some_and(|t| !t.building && t.gives_resource.is_none() && t.sight > 0)
}

/// Forgets scouts that died or stopped exploring.
#[instrument(skip_all, name = "prune_scouts")]
pub fn prune_scouts(ctx: &TickContext<'_>, state: &mut AiPlayerState) {
    state.scouts.retain(|&u| {
        ctx.unit(u)
            .is_some_and(|i| matches!(i.order, Order::Explore | Order::Move { .. }))
    });
}

/// Sends one unit exploring, at most once per explore interval. Pending
/// exploration requests are served before open-ended scouting.
#[instrument(skip_all, name = "dispatch_scouts")]
pub fn dispatch_scouts(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let cycle = ctx.cycle();
    let interval = ctx.config.seconds(ctx.config.explore_interval);
    if state.last_exploration_cycle != 0 && cycle < state.last_exploration_cycle + interval {
        return;
    }

    if let Some(request) = state.exploration_requests.first().cloned() {
        let explorer = ctx
            .own()
            .filter(|u| can_scout(ctx, state, u))
            .filter(|u| {
                ctx.type_of(u).is_some_and(|t| {
                    let mask = movement_mask(t.domain);
                    mask == request.mask || mask == TileFlags::NONE
                })
            })
            .min_by_key(|u| (u.pos.distance(request.pos), u.id))
            .map(|u| u.id);
        if let Some(unit) = explorer {
            state.exploration_requests.remove(0);
            state.last_exploration_cycle = cycle;
            log::trace!("player {} explores {:?} with {}", ctx.player, request.pos, unit);
            ctx.issue(Command::Move {
                unit,
                goal: request.pos,
                layer: request.layer,
            });
            if !state.scouts.contains(&unit) {
                state.scouts.push(unit);
            }
            return;
        }
    }

    if state.scouts.len() >= ctx.config.max_scouts {
        return;
    }
    // Prefer the widest sight; workers only when nothing else is idle.
    let scout: Option<UnitRef> = ctx
        .own()
        .filter(|u| can_scout(ctx, state, u))
        .max_by_key(|u| {
            let t = ctx.type_of(u);
            (
                t.is_some_and(|t| !t.is_harvester()),
                t.map_or(0, |t| t.sight),
                std::cmp::Reverse(u.id),
            )
        })
        .map(|u| u.id);
    if let Some(unit) = scout {
        state.last_exploration_cycle = cycle;
        state.scouts.push(unit);
        ctx.issue(Command::Explore { unit });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ExplorationRequest;
    use crate::ids::Pos;
    use crate::testing::{sample_catalog, Sandbox};

    #[test]
    fn test_request_served_before_scouting() {
        let catalog = sample_catalog();
        let footman = catalog.unit_type_by_ident("footman").unwrap();
        let mut sb = Sandbox::new(catalog, 16, 16);
        let unit = sb.world.spawn(1, footman, Pos::new(2, 2));
        sb.world.set_cycle(300);
        sb.state.exploration_requests.push(ExplorationRequest {
            pos: Pos::new(12, 12),
            layer: 0,
            mask: TileFlags::WATER | TileFlags::UNPASSABLE | TileFlags::WALL,
        });
        let inputs = sb.tick(|ctx, state| dispatch_scouts(ctx, state));
        assert_eq!(
            inputs.commands,
            vec![Command::Move {
                unit,
                goal: Pos::new(12, 12),
                layer: 0
            }]
        );
        assert!(sb.state.exploration_requests.is_empty());
        assert_eq!(sb.state.last_exploration_cycle, 300);
    }

    #[test]
    fn test_dispatch_is_throttled() {
        let catalog = sample_catalog();
        let footman = catalog.unit_type_by_ident("footman").unwrap();
        let mut sb = Sandbox::new(catalog, 16, 16);
        sb.world.spawn(1, footman, Pos::new(2, 2));
        sb.world.spawn(1, footman, Pos::new(3, 2));
        sb.world.set_cycle(300);
        let first = sb.tick(|ctx, state| dispatch_scouts(ctx, state));
        assert_eq!(first.commands.len(), 1);
        sb.world.set_cycle(330);
        let second = sb.tick(|ctx, state| dispatch_scouts(ctx, state));
        assert!(second.is_empty());
        sb.world.set_cycle(450);
        let third = sb.tick(|ctx, state| dispatch_scouts(ctx, state));
        assert_eq!(third.commands.len(), 1);
        assert_eq!(sb.state.scouts.len(), 2);
    }
}
