//! Military forces: membership, the attack state machine and the periodic
//! passes that fill, launch and recall them.

use crate::ai_type::ForceRole;
use crate::catalog::MoveDomain;
use crate::command::Command;
use crate::context::TickContext;
use crate::error::ForceTransitionError;
use crate::ids::{LandmassId, MapLayer, Pos, UnitRef, UnitTypeId};
use crate::state::{AiPlayerState, ExplorationRequest};
use crate::terrain;
use crate::transport;
use crate::world::movement_mask;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

/// Where a force is in its attack cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForceState {
    #[default]
    Mustering,
    /// Waiting for transporters to ferry the force to `landing`.
    Boarding {
        goal: Pos,
        layer: MapLayer,
        landing: Pos,
        home_landmass: LandmassId,
    },
    Moving {
        goal: Pos,
        layer: MapLayer,
    },
    Attacking {
        goal: Pos,
        layer: MapLayer,
    },
    /// The attack ran out of targets.
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceEvent {
    Launch {
        goal: Pos,
        layer: MapLayer,
    },
    NeedTransport {
        goal: Pos,
        layer: MapLayer,
        landing: Pos,
        home_landmass: LandmassId,
    },
    /// Every unit reached the far shore.
    Landed,
    Arrived,
    TargetLost,
    Reset,
}

impl ForceEvent {
    fn name(&self) -> &'static str {
        match self {
            ForceEvent::Launch { .. } => "launch",
            ForceEvent::NeedTransport { .. } => "need-transport",
            ForceEvent::Landed => "landed",
            ForceEvent::Arrived => "arrived",
            ForceEvent::TargetLost => "target-lost",
            ForceEvent::Reset => "reset",
        }
    }
}

impl ForceState {
    pub fn name(&self) -> &'static str {
        match self {
            ForceState::Mustering => "mustering",
            ForceState::Boarding { .. } => "boarding",
            ForceState::Moving { .. } => "moving",
            ForceState::Attacking { .. } => "attacking",
            ForceState::Waiting => "waiting",
        }
    }

    /// Boarding, moving or fighting.
    pub fn is_attacking(&self) -> bool {
        matches!(
            self,
            ForceState::Boarding { .. } | ForceState::Moving { .. } | ForceState::Attacking { .. }
        )
    }

    pub fn goal(&self) -> Option<(Pos, MapLayer)> {
        match *self {
            ForceState::Boarding { goal, layer, .. }
            | ForceState::Moving { goal, layer }
            | ForceState::Attacking { goal, layer } => Some((goal, layer)),
            ForceState::Mustering | ForceState::Waiting => None,
        }
    }

    pub fn transition(self, event: ForceEvent) -> Result<ForceState, ForceTransitionError> {
        use ForceEvent as E;
        use ForceState as S;
        let next = match (self, event) {
            (_, E::Reset) => S::Mustering,
            (S::Mustering | S::Waiting | S::Attacking { .. }, E::Launch { goal, layer }) => {
                S::Moving { goal, layer }
            }
            (
                S::Mustering | S::Waiting,
                E::NeedTransport {
                    goal,
                    layer,
                    landing,
                    home_landmass,
                },
            ) => S::Boarding {
                goal,
                layer,
                landing,
                home_landmass,
            },
            (S::Boarding { goal, layer, .. }, E::Landed) => S::Moving { goal, layer },
            (S::Moving { goal, layer }, E::Arrived) => S::Attacking { goal, layer },
            (S::Boarding { .. } | S::Moving { .. } | S::Attacking { .. }, E::TargetLost) => {
                S::Waiting
            }
            (state, event) => {
                return Err(ForceTransitionError {
                    state: state.name(),
                    event: event.name(),
                })
            }
        };
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Force {
    pub role: ForceRole,
    /// Every wish is met by members.
    #[serde(default)]
    pub completed: bool,
    /// Answering an attack on the player.
    #[serde(default)]
    pub defending: bool,
    /// Unit types and counts this force wants.
    #[serde(default)]
    pub wishes: Vec<(UnitTypeId, u32)>,
    #[serde(default)]
    pub state: ForceState,
    /// Force template this force was created from.
    #[serde(default)]
    pub template: Option<usize>,
    #[serde(default)]
    units: Vec<UnitRef>,
}

impl Force {
    pub fn new(role: ForceRole) -> Self {
        Self {
            role,
            completed: false,
            defending: false,
            wishes: Vec::new(),
            state: ForceState::Mustering,
            template: None,
            units: Vec::new(),
        }
    }

    pub fn units(&self) -> &[UnitRef] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Applies `event`; an illegal event is logged and ignored.
    pub fn apply(&mut self, event: ForceEvent) -> bool {
        match self.state.transition(event) {
            Ok(next) => {
                self.state = next;
                true
            }
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    /// Back to mustering with no attack in progress.
    pub fn reset(&mut self) {
        self.state = ForceState::Mustering;
        self.defending = false;
    }
}

/// All forces of one player plus the unit to force index, which is what keeps
/// a unit in at most one force.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Force>", into = "Vec<Force>")]
pub struct ForceList {
    forces: Vec<Force>,
    group_of: BTreeMap<UnitRef, usize>,
}

impl From<Vec<Force>> for ForceList {
    fn from(mut forces: Vec<Force>) -> Self {
        let mut group_of = BTreeMap::new();
        for (i, force) in forces.iter_mut().enumerate() {
            // A unit listed twice stays with the first force.
            force.units.retain(|u| match group_of.entry(*u) {
                std::collections::btree_map::Entry::Vacant(e) => {
                    e.insert(i);
                    true
                }
                std::collections::btree_map::Entry::Occupied(_) => false,
            });
        }
        Self { forces, group_of }
    }
}

impl From<ForceList> for Vec<Force> {
    fn from(list: ForceList) -> Self {
        list.forces
    }
}

impl ForceList {
    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Force> {
        self.forces.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Force> {
        self.forces.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Force> {
        self.forces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Force> {
        self.forces.iter_mut()
    }

    pub fn push(&mut self, force: Force) -> usize {
        let index = self.forces.len();
        let units = force.units.clone();
        self.forces.push(Force {
            units: Vec::new(),
            ..force
        });
        for u in units {
            self.insert(index, u);
        }
        index
    }

    /// Makes sure force `index` exists, creating empty attack forces as needed.
    pub fn ensure(&mut self, index: usize) -> &mut Force {
        while self.forces.len() <= index {
            self.forces.push(Force::new(ForceRole::Attack));
        }
        &mut self.forces[index]
    }

    /// Adds `unit` to force `index`, taking it out of any other force.
    pub fn insert(&mut self, index: usize, unit: UnitRef) {
        if index >= self.forces.len() {
            return;
        }
        if self.group_of.get(&unit) == Some(&index) {
            return;
        }
        self.remove(unit);
        self.forces[index].units.push(unit);
        self.group_of.insert(unit, index);
    }

    /// Takes `unit` out of its force. Returns the force it was in.
    pub fn remove(&mut self, unit: UnitRef) -> Option<usize> {
        let index = self.group_of.remove(&unit)?;
        if let Some(force) = self.forces.get_mut(index) {
            force.units.retain(|&u| u != unit);
        }
        Some(index)
    }

    /// One-based force number of `unit`, zero when unassigned.
    pub fn group_id(&self, unit: UnitRef) -> usize {
        self.group_of.get(&unit).map_or(0, |i| i + 1)
    }

    pub fn force_of(&self, unit: UnitRef) -> Option<usize> {
        self.group_of.get(&unit).copied()
    }

    pub fn get_units(&self, index: usize) -> Vec<UnitRef> {
        self.forces
            .get(index)
            .map(|f| f.units.clone())
            .unwrap_or_default()
    }

    /// Empties force `index` and resets its state.
    pub fn disband(&mut self, index: usize) {
        let Some(force) = self.forces.get_mut(index) else {
            return;
        };
        for u in std::mem::take(&mut force.units) {
            self.group_of.remove(&u);
        }
        force.reset();
        force.completed = false;
    }
}

fn issue_attack(ctx: &mut TickContext<'_>, units: &[UnitRef], goal: Pos, layer: MapLayer) {
    for &unit in units {
        if ctx.unit(unit).is_some_and(|u| !u.removed) && !ctx.is_claimed(unit) {
            ctx.issue(Command::Attack {
                unit,
                target: None,
                goal,
                layer,
            });
        }
    }
}

fn issue_home(ctx: &mut TickContext<'_>, units: &[UnitRef]) {
    let Some(home) = ctx.me().and_then(|p| p.capital.map(|c| (c, p.start_layer))) else {
        return;
    };
    for &unit in units {
        if ctx.unit(unit).is_some_and(|u| !u.removed) && !ctx.is_claimed(unit) {
            ctx.issue(Command::Move {
                unit,
                goal: home.0,
                layer: home.1,
            });
        }
    }
}

/// Drops members that died or changed owner. A force left empty while not
/// defending goes back to mustering.
fn prune_dead(ctx: &TickContext<'_>, state: &mut AiPlayerState) {
    let dead: Vec<UnitRef> = state
        .forces
        .group_of
        .keys()
        .copied()
        .filter(|&u| ctx.unit(u).map_or(true, |info| info.player != ctx.player))
        .collect();
    for u in dead {
        state.forces.remove(u);
    }
    for force in state.forces.iter_mut() {
        if force.is_empty() && !force.defending && force.state != ForceState::Mustering {
            force.reset();
        }
    }
}

/// Per-second force upkeep: drives each force through its state machine.
#[instrument(skip_all, name = "forces_second")]
pub fn update_second(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    prune_dead(ctx, state);

    for index in 0..state.forces.len() {
        let Some(force) = state.forces.get(index) else {
            continue;
        };
        let units = force.units.clone();
        let current = force.state;
        if units.is_empty() {
            continue;
        }
        match current {
            ForceState::Boarding {
                landing,
                layer,
                home_landmass,
                goal,
            } => {
                if transport::check_unit_transport(ctx, state, &units, Some(home_landmass), landing, layer) {
                    if let Some(force) = state.forces.get_mut(index) {
                        force.apply(ForceEvent::Landed);
                    }
                    log::info!(
                        "player {} force {} landed, moving on {:?}",
                        ctx.player,
                        index + 1,
                        goal
                    );
                    issue_attack(ctx, &units, goal, layer);
                }
            }
            ForceState::Moving { goal, layer } => {
                let arrive = ctx.config.arrive_range;
                let arrived = units
                    .iter()
                    .filter_map(|&u| ctx.unit(u))
                    .any(|u| u.layer == layer && u.pos.distance(goal) <= arrive);
                if arrived {
                    if let Some(force) = state.forces.get_mut(index) {
                        force.apply(ForceEvent::Arrived);
                    }
                } else {
                    let idle: Vec<UnitRef> = units
                        .iter()
                        .copied()
                        .filter(|&u| ctx.unit(u).is_some_and(|i| i.is_idle()))
                        .collect();
                    issue_attack(ctx, &idle, goal, layer);
                }
            }
            ForceState::Attacking { layer, .. } => {
                attack_step(ctx, state, index, &units, layer);
            }
            ForceState::Mustering | ForceState::Waiting => {}
        }
    }
}

/// Idle attackers look for the next target around them. When none of them
/// finds one, the attack is over.
fn attack_step(
    ctx: &mut TickContext<'_>,
    state: &mut AiPlayerState,
    index: usize,
    units: &[UnitRef],
    layer: MapLayer,
) {
    let mut busy = false;
    let mut next: Option<(Pos, UnitRef)> = None;
    for &u in units {
        let Some(info) = ctx.unit(u) else { continue };
        if !info.is_idle() {
            busy = true;
            continue;
        }
        if next.is_none() {
            next = terrain::find_enemy(ctx, info).map(|hit| (hit.pos, hit.unit));
        }
    }
    if let Some((pos, target)) = next {
        for &unit in units {
            if ctx.unit(unit).is_some_and(|i| i.is_idle()) {
                ctx.issue(Command::Attack {
                    unit,
                    target: Some(target),
                    goal: pos,
                    layer,
                });
            }
        }
        return;
    }
    if busy {
        return;
    }
    let Some(force) = state.forces.get_mut(index) else {
        return;
    };
    force.apply(ForceEvent::TargetLost);
    if force.defending || force.role == ForceRole::Defend {
        force.reset();
        log::info!("player {} force {} stands down", ctx.player, index + 1);
        issue_home(ctx, units);
    } else {
        log::info!("player {} force {} has no targets left", ctx.player, index + 1);
    }
}

fn is_free_military(ctx: &TickContext<'_>, state: &AiPlayerState, unit: UnitRef) -> bool {
    let Some(info) = ctx.unit(unit) else {
        return false;
    };
    !info.under_construction
        && !info.removed
        && state.forces.force_of(unit).is_none()
        && !state.is_transporter(unit)
        && !state.scouts.contains(&unit)
        && ctx.type_of(info).is_some_and(|t| t.is_military())
}

/// Half-minute pass: free military units join forces whose wishes are not met
/// yet, then every force's `completed` flag is recomputed.
#[instrument(skip_all, name = "forces_half_minute")]
pub fn update_half_minute(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    prune_dead(ctx, state);
    let mut free: Vec<UnitRef> = ctx
        .own_units()
        .iter()
        .copied()
        .filter(|&u| is_free_military(ctx, state, u))
        .collect();

    for index in 0..state.forces.len() {
        let Some(force) = state.forces.get(index) else {
            continue;
        };
        if force.state.is_attacking() {
            continue;
        }
        let wishes = force.wishes.clone();
        let mut complete = true;
        for (t, want) in wishes {
            let mut have = state
                .forces
                .get_units(index)
                .iter()
                .filter_map(|&u| ctx.unit(u))
                .filter(|u| ctx.helpers.are_equivalent(t, u.unit_type))
                .count() as u32;
            while have < want {
                let Some(pos) = free.iter().position(|&u| {
                    ctx.unit(u)
                        .is_some_and(|i| ctx.helpers.are_equivalent(t, i.unit_type))
                }) else {
                    break;
                };
                let unit = free.remove(pos);
                state.forces.insert(index, unit);
                have += 1;
            }
            if have < want {
                complete = false;
            }
        }
        if let Some(force) = state.forces.get_mut(index) {
            if complete && !force.completed {
                log::debug!("player {} force {} is complete", ctx.player, index + 1);
            }
            force.completed = complete;
        }
    }
}

/// Per-minute pass: instantiate force templates, then send completed attack
/// forces out.
#[instrument(skip_all, name = "forces_minute")]
pub fn update_minute(ctx: &mut TickContext<'_>, state: &mut AiPlayerState) {
    let faction = ctx.me().and_then(|p| p.faction);

    // A template none of whose units resolve any more (the faction changed)
    // lets its force go.
    for index in 0..state.forces.len() {
        let stale = state
            .forces
            .get(index)
            .filter(|f| !f.defending && matches!(f.state, ForceState::Mustering | ForceState::Waiting))
            .and_then(|f| f.template)
            .is_some_and(|ti| {
                ctx.ai_type.force_templates.get(ti).map_or(true, |t| {
                    t.units
                        .iter()
                        .all(|(goal, _)| goal.resolve(ctx.catalog, faction).is_none())
                })
            });
        if stale {
            log::debug!("player {} disbands force {}", ctx.player, index + 1);
            state.forces.disband(index);
            if let Some(f) = state.forces.get_mut(index) {
                f.template = None;
                f.wishes.clear();
            }
        }
    }
    let mut templates: Vec<(usize, i32)> = ctx
        .ai_type
        .force_templates
        .iter()
        .enumerate()
        .map(|(i, t)| (i, t.priority))
        .collect();
    templates.sort_by_key(|&(i, p)| (std::cmp::Reverse(p), i));

    for (ti, _) in templates {
        if state.forces.len() >= ctx.config.max_forces {
            break;
        }
        if state.forces.iter().any(|f| f.template == Some(ti)) {
            continue;
        }
        let template = &ctx.ai_type.force_templates[ti];
        let wishes: Vec<(UnitTypeId, u32)> = template
            .units
            .iter()
            .filter_map(|(goal, n)| goal.resolve(ctx.catalog, faction).map(|t| (t, *n)))
            .collect();
        if wishes.is_empty() {
            continue;
        }
        let mut force = Force::new(template.role);
        force.wishes = wishes;
        force.template = Some(ti);
        let index = state.forces.push(force);
        log::debug!(
            "player {} created force {} from template {}",
            ctx.player,
            index + 1,
            ti
        );
    }

    for index in 0..state.forces.len() {
        let ready = state.forces.get(index).is_some_and(|f| {
            f.role == ForceRole::Attack
                && f.completed
                && !f.defending
                && !f.is_empty()
                && matches!(f.state, ForceState::Mustering | ForceState::Waiting)
        });
        if ready {
            plan_attack(ctx, state, index);
        }
    }
}

/// Picks a target for force `index` and starts the attack.
///
/// Tries, in order: an enemy reachable over land, an enemy across water a
/// transporter can reach (the force then boards), the nearest wall. Without
/// any target an exploration request is queued and `false` returned.
pub fn plan_attack(ctx: &mut TickContext<'_>, state: &mut AiPlayerState, index: usize) -> bool {
    let units = state.forces.get_units(index);
    let Some(leader) = units
        .iter()
        .filter_map(|&u| ctx.unit(u))
        .find(|u| !u.removed)
    else {
        return false;
    };
    let layer = leader.layer;

    if let Some(hit) = terrain::find_enemy(ctx, leader) {
        return launch(ctx, state, index, &units, hit.pos, layer);
    }

    // Across water: the reach of a known transporter, or of one that would
    // sail from the nearest shore.
    let limit = ctx.config.enemy_search_limit;
    let reach = state
        .transporters
        .values()
        .flatten()
        .find_map(|&t| ctx.unit(t))
        .map(|t| terrain::transporter_reach(ctx.world, t, limit))
        .or_else(|| {
            terrain::find_shore(ctx.world, leader, ctx.config.placement_search_limit)
                .map(|shore| terrain::water_reach(ctx.world, shore, layer, limit))
        });
    if let Some(reach) = reach {
        if let Some(hit) = terrain::find_enemy_with_transporter(ctx, leader, &reach) {
            if !hit.needs_transport {
                return launch(ctx, state, index, &units, hit.pos, layer);
            }
            if let Some(landing) = terrain::find_landing(ctx.world, hit.pos, layer, &reach, limit) {
                let home_landmass = ctx.world.unit_landmass(leader);
                if let Some(force) = state.forces.get_mut(index) {
                    if force.apply(ForceEvent::NeedTransport {
                        goal: hit.pos,
                        layer,
                        landing,
                        home_landmass,
                    }) {
                        log::info!(
                            "player {} force {} boards for {:?} via {:?}",
                            ctx.player,
                            index + 1,
                            hit.pos,
                            landing
                        );
                        transport::check_unit_transport(
                            ctx,
                            state,
                            &units,
                            Some(home_landmass),
                            landing,
                            layer,
                        );
                        return true;
                    }
                }
                return false;
            }
        }
    }

    if let Some(wall) = terrain::find_nearest_wall(ctx, leader) {
        return launch(ctx, state, index, &units, wall, layer);
    }

    if let Some(pos) = terrain::find_unexplored(ctx, leader) {
        if !state.exploration_requests.iter().any(|r| r.pos == pos) {
            state.exploration_requests.push(ExplorationRequest {
                pos,
                layer,
                mask: movement_mask(MoveDomain::Land),
            });
        }
    }
    false
}

fn launch(
    ctx: &mut TickContext<'_>,
    state: &mut AiPlayerState,
    index: usize,
    units: &[UnitRef],
    goal: Pos,
    layer: MapLayer,
) -> bool {
    let Some(force) = state.forces.get_mut(index) else {
        return false;
    };
    if !force.apply(ForceEvent::Launch { goal, layer }) {
        return false;
    }
    log::info!(
        "player {} force {} attacks {:?}",
        ctx.player,
        index + 1,
        goal
    );
    issue_attack(ctx, units, goal, layer);
    true
}

/// Sends the defend forces (and the attacked unit's own force) toward `goal`.
pub fn mobilize_defense(ctx: &mut TickContext<'_>, state: &mut AiPlayerState, goal: Pos, layer: MapLayer) {
    for index in 0..state.forces.len() {
        let Some(force) = state.forces.get_mut(index) else {
            continue;
        };
        if force.role != ForceRole::Defend || force.defending || force.is_empty() {
            continue;
        }
        force.reset();
        force.defending = true;
        if force.apply(ForceEvent::Launch { goal, layer }) {
            let units = force.units.clone();
            log::info!("player {} force {} defends {:?}", ctx.player, index + 1, goal);
            issue_attack(ctx, &units, goal, layer);
        }
    }
}

/// Whether `unit` is a member that is busy with something the AI ordered.
pub fn is_committed(state: &AiPlayerState, unit: UnitRef) -> bool {
    state
        .forces
        .force_of(unit)
        .and_then(|i| state.forces.get(i))
        .is_some_and(|f| f.state.is_attacking())
}

#[cfg(test)]
#[path = "force_tests.rs"]
mod tests;
