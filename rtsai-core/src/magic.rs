//! Auto-cast opportunities for spell casters.

use crate::catalog::SpellTarget;
use crate::command::Command;
use crate::context::TickContext;
use crate::ids::UnitRef;
use crate::state::AiPlayerState;
use crate::world::{Order, UnitInfo};
use tracing::instrument;

/// Best target for `spell` around `caster`: the nearest enemy, or the most
/// hurt friendly unit.
fn spell_target<'a>(
    ctx: &TickContext<'a>,
    caster: &UnitInfo,
    target: SpellTarget,
    range: i32,
) -> Option<&'a UnitInfo> {
    let world = ctx.world;
    let nearby = world
        .units_in_range(caster.pos, caster.layer, range)
        .into_iter()
        .filter_map(|u| world.unit(u))
        .filter(|u| !u.removed && !u.under_construction);
    match target {
        SpellTarget::Enemy => nearby
            .filter(|u| world.is_enemy(ctx.player, u.player))
            .min_by_key(|u| (u.pos.distance(caster.pos), u.id)),
        SpellTarget::HurtAlly => nearby
            .filter(|u| world.is_allied(ctx.player, u.player) && u.is_hurt())
            .filter(|u| ctx.type_of(u).is_some_and(|t| !t.building))
            .max_by_key(|u| (u.max_hp - u.hp, std::cmp::Reverse(u.id))),
    }
}

#[instrument(skip_all, name = "check_magic")]
pub fn check_magic(ctx: &mut TickContext<'_>, state: &AiPlayerState) {
    let casters: Vec<&UnitInfo> = ctx
        .own()
        .filter(|u| !u.removed && !u.under_construction && u.mana > 0)
        .filter(|u| ctx.type_of(u).is_some_and(|t| !t.spells.is_empty()))
        .filter(|u| !matches!(u.order, Order::CastSpell | Order::Board { .. }))
        .collect();

    let mut casts: Vec<(UnitRef, Command)> = Vec::new();
    for caster in casters {
        if ctx.is_claimed(caster.id) {
            continue;
        }
        let Some(def) = ctx.type_of(caster) else { continue };
        // A scout keeps scouting.
        if state.scouts.contains(&caster.id) {
            continue;
        }
        for &spell_id in &def.spells {
            let Some(spell) = ctx.catalog.spell(spell_id) else { continue };
            if !spell.autocast || caster.mana < spell.mana_cost {
                continue;
            }
            if let Some(target) = spell_target(ctx, caster, spell.target, spell.range) {
                casts.push((
                    caster.id,
                    Command::CastSpell {
                        caster: caster.id,
                        spell: spell_id,
                        target: Some(target.id),
                        goal: target.pos,
                        layer: target.layer,
                    },
                ));
                break;
            }
        }
    }
    for (caster, cmd) in casts {
        log::trace!("player {} auto-casts with {}", ctx.player, caster);
        ctx.issue(cmd);
    }
}
