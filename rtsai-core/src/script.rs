//! Interpreter for the declarative AI script.

use crate::ai_type::ScriptStep;
use crate::context::TickContext;
use crate::force;
use crate::helpers::ProducibleGoal;
use crate::ids::UnitTypeId;
use crate::state::AiPlayerState;
use tracing::instrument;

/// Outcome of one step.
enum Flow {
    Next,
    Jump(usize),
    /// Stop for this second and retry the same step later.
    Block,
    /// Advance, then stop for this second.
    Yield,
}

fn resolve(ctx: &TickContext<'_>, goal: &ProducibleGoal) -> Option<UnitTypeId> {
    let faction = ctx.me().and_then(|p| p.faction);
    goal.resolve(ctx.catalog, faction)
}

fn step(ctx: &mut TickContext<'_>, state: &mut AiPlayerState, step: &ScriptStep) -> Flow {
    match step {
        ScriptStep::Need(goal) => {
            if let Some(t) = resolve(ctx, goal) {
                let count = state.wish(t).unwrap_or(0).max(1);
                state.set_wish(t, count);
            }
            Flow::Next
        }
        ScriptStep::Set(goal, count) => {
            if let Some(t) = resolve(ctx, goal) {
                state.set_wish(t, *count);
            }
            Flow::Next
        }
        ScriptStep::Wait(goal) => {
            let Some(t) = resolve(ctx, goal) else {
                return Flow::Next;
            };
            let wanted = state.wish(t).unwrap_or(1);
            if ctx.count_with_equivalents(t) >= wanted {
                Flow::Next
            } else {
                Flow::Block
            }
        }
        ScriptStep::Research(up) => {
            if !ctx.has_upgrade(*up) && !state.research_requests.contains(up) {
                state.research_requests.push(*up);
            }
            Flow::Next
        }
        ScriptStep::UpgradeTo(t) => {
            if !state.upgrade_to_requests.contains(t) {
                state.upgrade_to_requests.push(*t);
            }
            Flow::Next
        }
        ScriptStep::Force { force, role, units } => {
            let faction = ctx.me().and_then(|p| p.faction);
            let wishes: Vec<(UnitTypeId, u32)> = units
                .iter()
                .filter_map(|(g, n)| g.resolve(ctx.catalog, faction).map(|t| (t, *n)))
                .collect();
            let f = state.forces.ensure(*force);
            f.role = *role;
            if f.wishes != wishes {
                f.wishes = wishes;
                f.completed = false;
            }
            Flow::Next
        }
        ScriptStep::WaitForce(index) => {
            if state.forces.get(*index).is_some_and(|f| f.completed) {
                Flow::Next
            } else {
                Flow::Block
            }
        }
        ScriptStep::AttackWithForce(index) => {
            let idle = state
                .forces
                .get(*index)
                .is_some_and(|f| !f.is_empty() && !f.state.is_attacking());
            if idle {
                force::plan_attack(ctx, state, *index);
            }
            Flow::Next
        }
        ScriptStep::Sleep(seconds) => {
            state.sleep_cycles = ctx.cycle() + ctx.config.seconds(*seconds as u64);
            Flow::Yield
        }
        ScriptStep::SetCollect(collect) => {
            state.collect = collect.clone();
            Flow::Next
        }
        ScriptStep::SetReserve(reserve) => {
            state.reserve = reserve.clone();
            Flow::Next
        }
        ScriptStep::Goto(target) => Flow::Jump(*target),
    }
}

/// Runs script steps until one blocks, the script sleeps or the per-second
/// step budget is spent.
#[instrument(skip_all, name = "script")]
pub fn run_script(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    if ctx.cycle() < state.sleep_cycles {
        return;
    }
    let ai_type = ctx.ai_type;
    let script = &ai_type.script;
    for _ in 0..ctx.config.script_steps_per_second {
        let Some(current) = script.get(state.script_pos) else {
            return;
        };
        if state.script_debug {
            log::info!(
                "player {} script step {}: {}",
                ctx.player,
                state.script_pos,
                current.name()
            );
        }
        match step(ctx, state, current) {
            Flow::Next => state.script_pos += 1,
            Flow::Jump(target) => state.script_pos = target,
            Flow::Block => return,
            Flow::Yield => {
                state.script_pos += 1;
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
