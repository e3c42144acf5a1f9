//! Flood-fill reachability queries over the tile map.
//!
//! Every query is a [`FloodFill`] with a per-tile visitor. Frontier order is
//! insertion order, so "nearest" means nearest by step count, not by path
//! cost.

use crate::catalog::{MoveDomain, UnitTypeDef};
use crate::context::TickContext;
use crate::ids::{LandmassId, MapLayer, Pos, UnitRef};
use crate::resources::ResourceKind;
use crate::world::{movement_mask, TileFlags, UnitInfo, WorldView};
use game_pathfinding::{AStar, FloodFill, Graph, VisitResult};
use rustc_hash::FxHashSet;

/// The tile grid of one layer as an 8-connected graph.
pub struct TileGraph<'w> {
    pub world: &'w dyn WorldView,
    pub layer: MapLayer,
}

impl Graph<Pos, ()> for TileGraph<'_> {
    fn neighbors(&self, node: Pos, _context: &()) -> Vec<Pos> {
        node.around()
            .into_iter()
            .filter(|&p| self.world.in_bounds(p, self.layer))
            .collect()
    }
}

/// Landmasses linked by shared borders.
pub struct LandmassGraph<'w> {
    pub world: &'w dyn WorldView,
}

impl Graph<LandmassId, ()> for LandmassGraph<'_> {
    fn neighbors(&self, node: LandmassId, _context: &()) -> Vec<LandmassId> {
        self.world.border_landmasses(node)
    }
}

fn blocked(world: &dyn WorldView, pos: Pos, layer: MapLayer, mask: TileFlags) -> bool {
    world.flags(pos, layer).intersects(mask)
}

/// Flood fill from `start` over tiles `mask` does not forbid. The visitor sees
/// only passable tiles; impassable ones are dead ends.
pub fn flood_passable<F>(
    world: &dyn WorldView,
    start: Pos,
    layer: MapLayer,
    mask: TileFlags,
    limit: usize,
    mut visit: F,
) -> Option<Pos>
where
    F: FnMut(Pos) -> VisitResult,
{
    let graph = TileGraph { world, layer };
    FloodFill::new([start])
        .with_limit(limit)
        .run(&graph, &(), |_, to| {
            if blocked(world, to, layer, mask) {
                return VisitResult::DeadEnd;
            }
            visit(to)
        })
}

fn unit_mask(def: &UnitTypeDef) -> TileFlags {
    movement_mask(def.domain)
}

/// Nearest wall tile the unit can walk up to. Used to pick a siege target when
/// no open path reaches the enemy.
pub fn find_nearest_wall(ctx: &TickContext<'_>, unit: &UnitInfo) -> Option<Pos> {
    let def = ctx.type_of(unit)?;
    let world = ctx.world;
    let mask = unit_mask(def).without(TileFlags::WALL);
    flood_passable(
        world,
        unit.pos,
        unit.layer,
        mask,
        ctx.config.enemy_search_limit,
        |p| {
            if world.flags(p, unit.layer).contains(TileFlags::WALL) {
                VisitResult::Finished
            } else {
                VisitResult::Continue
            }
        },
    )
}

/// Tiles a transporter can reach: its water plus the coast tiles touching it.
#[derive(Debug, Default, Clone)]
pub struct ReachSet {
    pub water: FxHashSet<Pos>,
    pub coast: FxHashSet<Pos>,
}

impl ReachSet {
    pub fn contains_coast(&self, pos: Pos) -> bool {
        self.coast.contains(&pos)
    }
}

pub fn transporter_reach(world: &dyn WorldView, transporter: &UnitInfo, limit: usize) -> ReachSet {
    water_reach(world, transporter.pos, transporter.layer, limit)
}

/// Reach of a transporter that would start on the water tile `start`.
pub fn water_reach(world: &dyn WorldView, start: Pos, layer: MapLayer, limit: usize) -> ReachSet {
    let mut reach = ReachSet::default();
    let graph = TileGraph { world, layer };
    reach.water.insert(start);
    FloodFill::new([start])
        .with_limit(limit)
        .run(&graph, &(), |_, to| {
            let flags = world.flags(to, layer);
            if flags.contains(TileFlags::WATER) && !flags.intersects(TileFlags::UNPASSABLE) {
                reach.water.insert(to);
                VisitResult::Continue
            } else {
                if flags.contains(TileFlags::LAND)
                    && !flags.intersects(TileFlags::UNPASSABLE | TileFlags::WALL | TileFlags::BUILDING)
                {
                    reach.coast.insert(to);
                }
                VisitResult::DeadEnd
            }
        });
    reach
}

/// First water tile next to land the unit can walk to.
pub fn find_shore(world: &dyn WorldView, unit: &UnitInfo, limit: usize) -> Option<Pos> {
    let layer = unit.layer;
    let wet = |p: Pos| {
        p.around()
            .into_iter()
            .find(|&n| world.in_bounds(n, layer) && world.flags(n, layer).contains(TileFlags::WATER))
    };
    if let Some(w) = wet(unit.pos) {
        return Some(w);
    }
    let coast = flood_passable(
        world,
        unit.pos,
        layer,
        movement_mask(MoveDomain::Land),
        limit,
        |p| {
            if wet(p).is_some() {
                VisitResult::Finished
            } else {
                VisitResult::Continue
            }
        },
    )?;
    wet(coast)
}

/// A land tile near `goal` where a transporter from `reach` can drop troops.
/// Floods over land from `goal` and stops at the first tile in both sets.
pub fn find_landing(
    world: &dyn WorldView,
    goal: Pos,
    layer: MapLayer,
    reach: &ReachSet,
    limit: usize,
) -> Option<Pos> {
    if reach.contains_coast(goal) {
        return Some(goal);
    }
    flood_passable(
        world,
        goal,
        layer,
        movement_mask(MoveDomain::Land),
        limit,
        |p| {
            if reach.contains_coast(p) {
                VisitResult::Finished
            } else {
                VisitResult::Continue
            }
        },
    )
}

pub struct EnemyHit {
    pub unit: UnitRef,
    pub pos: Pos,
    /// The route crosses water a transporter can reach.
    pub needs_transport: bool,
}

fn enemy_at(ctx: &TickContext<'_>, pos: Pos, layer: MapLayer) -> Option<UnitRef> {
    ctx.world.units_at(pos, layer).into_iter().find(|&u| {
        ctx.world
            .unit(u)
            .is_some_and(|info| !info.removed && ctx.world.is_enemy(ctx.player, info.player))
    })
}

/// Nearest enemy unit reachable on foot (or by the unit's own domain).
pub fn find_enemy(ctx: &TickContext<'_>, unit: &UnitInfo) -> Option<EnemyHit> {
    let def = ctx.type_of(unit)?;
    let mut hit = None;
    let mask = unit_mask(def);
    let layer = unit.layer;
    let world = ctx.world;
    let graph = TileGraph { world, layer };
    FloodFill::new([unit.pos])
        .with_limit(ctx.config.enemy_search_limit)
        .run(&graph, &(), |_, to| {
            if let Some(enemy) = enemy_at(ctx, to, layer) {
                hit = Some(EnemyHit {
                    unit: enemy,
                    pos: to,
                    needs_transport: false,
                });
                return VisitResult::Finished;
            }
            if blocked(world, to, layer, mask) {
                VisitResult::DeadEnd
            } else {
                VisitResult::Continue
            }
        });
    hit
}

/// Like [`find_enemy`], but water tiles in `reach` count as crossable. A hit
/// found after stepping on water needs transport.
pub fn find_enemy_with_transporter(
    ctx: &TickContext<'_>,
    unit: &UnitInfo,
    reach: &ReachSet,
) -> Option<EnemyHit> {
    let mut hit = None;
    let layer = unit.layer;
    let world = ctx.world;
    let land_mask = movement_mask(MoveDomain::Land);
    let graph = TileGraph { world, layer };
    let mut wet: FxHashSet<Pos> = FxHashSet::default();
    FloodFill::new([unit.pos])
        .with_limit(ctx.config.enemy_search_limit)
        .run(&graph, &(), |from, to| {
            let crossed = wet.contains(&from) || reach.water.contains(&to);
            if let Some(enemy) = enemy_at(ctx, to, layer) {
                hit = Some(EnemyHit {
                    unit: enemy,
                    pos: to,
                    needs_transport: crossed,
                });
                return VisitResult::Finished;
            }
            if reach.water.contains(&to) {
                wet.insert(to);
                return VisitResult::Continue;
            }
            if blocked(world, to, layer, land_mask) {
                return VisitResult::DeadEnd;
            }
            if crossed {
                wet.insert(to);
            }
            VisitResult::Continue
        });
    hit
}

pub struct ResourceHit {
    /// Deposit or extractor to harvest, or the raw deposit to build on.
    pub target: UnitRef,
    pub pos: Pos,
    pub needs_extractor: bool,
}

/// Nearest explored source of `kind`: a directly harvestable deposit or an own
/// extractor. A raw deposit is returned only when nothing harvestable is
/// reachable.
pub fn find_resource(ctx: &TickContext<'_>, unit: &UnitInfo, kind: ResourceKind) -> Option<ResourceHit> {
    let def = ctx.type_of(unit)?;
    let mask = unit_mask(def);
    let layer = unit.layer;
    let world = ctx.world;
    let mut raw: Option<ResourceHit> = None;
    let mut found: Option<ResourceHit> = None;
    let graph = TileGraph { world, layer };
    FloodFill::new([unit.pos])
        .with_limit(ctx.config.resource_search_limit)
        .run(&graph, &(), |_, to| {
            if !world.is_explored(ctx.player, to, layer) {
                return VisitResult::DeadEnd;
            }
            let flags = world.flags(to, layer);
            if flags.contains(TileFlags::DEPOSIT) || flags.contains(TileFlags::BUILDING) {
                for u in world.units_at(to, layer) {
                    let Some(info) = world.unit(u) else { continue };
                    let Some(t) = ctx.type_of(info) else { continue };
                    if t.gives_resource != Some(kind) || info.under_construction {
                        continue;
                    }
                    let own_extractor = t.building && info.player == ctx.player;
                    if t.directly_harvestable || own_extractor {
                        found = Some(ResourceHit {
                            target: u,
                            pos: to,
                            needs_extractor: false,
                        });
                        return VisitResult::Finished;
                    }
                    let occupied = world.units_at(to, layer).iter().any(|&o| {
                        world
                            .unit(o)
                            .and_then(|oi| ctx.type_of(oi))
                            .is_some_and(|ot| ot.building)
                    });
                    if !t.building && raw.is_none() && !occupied {
                        raw = Some(ResourceHit {
                            target: u,
                            pos: to,
                            needs_extractor: true,
                        });
                    }
                }
                return VisitResult::DeadEnd;
            }
            if blocked(world, to, layer, mask) {
                VisitResult::DeadEnd
            } else {
                VisitResult::Continue
            }
        });
    found.or(raw)
}

/// Nearest tile around `near` where `unit_type` may be placed, on `landmass`
/// when given.
pub fn find_placement(
    ctx: &TickContext<'_>,
    unit_type: &UnitTypeDef,
    near: Pos,
    layer: MapLayer,
    landmass: Option<LandmassId>,
) -> Option<Pos> {
    let world = ctx.world;
    let ok = |p: Pos| {
        landmass.map_or(true, |lm| world.landmass(p, layer) == lm)
            && world.can_build_at(ctx.catalog, unit_type, p, layer)
    };
    if ok(near) {
        return Some(near);
    }
    // Walk over land; buildings and units are obstacles only for placement.
    let mask = TileFlags::WATER | TileFlags::UNPASSABLE | TileFlags::WALL;
    flood_passable(
        world,
        near,
        layer,
        mask,
        ctx.config.placement_search_limit,
        |p| {
            if ok(p) {
                VisitResult::Finished
            } else {
                VisitResult::Continue
            }
        },
    )
}

/// Nearest tile `unit` has not explored yet.
pub fn find_unexplored(ctx: &TickContext<'_>, unit: &UnitInfo) -> Option<Pos> {
    let def = ctx.type_of(unit)?;
    let mask = unit_mask(def);
    let world = ctx.world;
    let layer = unit.layer;
    let graph = TileGraph { world, layer };
    FloodFill::new([unit.pos])
        .with_limit(ctx.config.enemy_search_limit)
        .run(&graph, &(), |_, to| {
            if !world.is_explored(ctx.player, to, layer) {
                return VisitResult::Finished;
            }
            if blocked(world, to, layer, mask) {
                VisitResult::DeadEnd
            } else {
                VisitResult::Continue
            }
        })
}

/// Nearest of `candidates` to `start`, walking over tiles `mask` allows.
pub fn find_nearest_among(
    world: &dyn WorldView,
    start: Pos,
    layer: MapLayer,
    mask: TileFlags,
    candidates: &FxHashSet<UnitRef>,
    limit: usize,
) -> Option<UnitRef> {
    if let Some(u) = world
        .units_at(start, layer)
        .into_iter()
        .find(|u| candidates.contains(u))
    {
        return Some(u);
    }
    let mut hit = None;
    let graph = TileGraph { world, layer };
    FloodFill::new([start])
        .with_limit(limit)
        .run(&graph, &(), |_, to| {
            if let Some(u) = world
                .units_at(to, layer)
                .into_iter()
                .find(|u| candidates.contains(u))
            {
                hit = Some(u);
                return VisitResult::Finished;
            }
            if blocked(world, to, layer, mask) {
                VisitResult::DeadEnd
            } else {
                VisitResult::Continue
            }
        });
    hit
}

/// The water landmass linking `from` and `to`: a shared border first, else the
/// first water hop on the cheapest landmass route.
pub fn bridging_water(world: &dyn WorldView, from: LandmassId, to: LandmassId) -> Option<LandmassId> {
    let a = world.border_landmasses(from);
    let b = world.border_landmasses(to);
    if let Some(&shared) = a
        .iter()
        .find(|lm| world.is_water_landmass(**lm) && b.contains(lm))
    {
        return Some(shared);
    }
    let path = AStar::find_path(&LandmassGraph { world }, from, to, &())?;
    path.nodes
        .into_iter()
        .find(|&lm| world.is_water_landmass(lm))
}

#[cfg(test)]
#[path = "terrain_tests.rs"]
mod tests;
