//! Graph searches shared by the AI: best-first paths over weighted graphs and
//! breadth-first flood fills over tile grids.

use std::hash::Hash;

mod astar;
mod flood;

pub use astar::{AStar, Path};
pub use flood::{FloodFill, VisitResult};

/// A trait for graphs that can be searched.
///
/// `Node`: The type of node identifiers (e.g. a tile position or landmass id).
/// `Ctx`: A context object passed to cost calculations (e.g. the map and a
/// movement mask).
pub trait Graph<Node, Ctx> {
    /// Return the neighbors of a node, in a stable order.
    fn neighbors(&self, node: Node, context: &Ctx) -> Vec<Node>;

    /// Calculate the cost to move from `from` to `to`.
    fn cost(&self, _from: Node, _to: Node, _context: &Ctx) -> u32 {
        1
    }

    /// Estimated cost from `from` to `target`. Must never overestimate.
    fn heuristic(&self, _from: Node, _target: Node, _context: &Ctx) -> u32 {
        0
    }
}

/// Marker bound for node identifiers.
pub trait NodeId: Copy + Eq + Hash + std::fmt::Debug {}
impl<T: Copy + Eq + Hash + std::fmt::Debug> NodeId for T {}
