//! Faction assignment, faction founding and dynasty choice.

use crate::command::Command;
use crate::context::TickContext;
use crate::ids::FactionId;
use crate::state::AiPlayerState;
use tracing::instrument;

/// Picks a random playable faction of the player's civilization when the
/// player has none yet.
pub fn assign_random_faction(ctx: &mut TickContext<'_>) {
    let Some(me) = ctx.me() else { return };
    if me.faction.is_some() {
        return;
    }
    let civ = me.civilization.as_deref();
    let candidates: Vec<FactionId> = ctx
        .catalog
        .factions
        .iter()
        .filter(|f| f.playable && civ.map_or(true, |c| f.civilization == c))
        .map(|f| f.id)
        .collect();
    if let Some(&faction) = ctx.rng.pick(&candidates) {
        log::info!("player {} takes faction {}", ctx.player, faction);
        ctx.issue(Command::SetFaction { faction });
    }
}

/// Founds the first faction the current one develops into, then picks a
/// dynasty, when requirements and costs allow.
#[instrument(skip_all, name = "faction_founding")]
pub fn check_faction_founding(ctx: &mut TickContext<'_>, state: &AiPlayerState) {
    let Some(me) = ctx.me() else { return };
    let Some(current) = me.faction.and_then(|f| ctx.catalog.faction(f)) else {
        return;
    };

    for &next in &current.develops_to {
        let Some(def) = ctx.catalog.faction(next) else { continue };
        if ctx.requirements_met(&[], &def.requires_upgrades) && ctx.available(&state.reserve).covers(&def.costs) {
            log::info!("player {} founds {}", ctx.player, def.ident);
            ctx.commit(&def.costs);
            ctx.issue(Command::FoundFaction { faction: next });
            return;
        }
    }

    if me.dynasty.is_some() {
        return;
    }
    let dynasty = ctx.catalog.dynasties.iter().find(|d| {
        d.factions.contains(&current.id)
            && ctx.requirements_met(&[], &d.requires_upgrades)
            && ctx.available(&state.reserve).covers(&d.costs)
    });
    if let Some(d) = dynasty {
        log::info!("player {} chooses dynasty {}", ctx.player, d.ident);
        ctx.commit(&d.costs);
        ctx.issue(Command::ChooseDynasty { dynasty: d.id });
    }
}
