use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::{Graph, NodeId};

/// A found route: the nodes from start to goal (inclusive) and the total cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path<Node> {
    pub nodes: Vec<Node>,
    pub cost: u32,
}

impl<Node> Path<Node> {
    /// Number of edges walked.
    pub fn hops(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// A generic A* pathfinder.
pub struct AStar;

impl AStar {
    /// Find the cheapest path from `start` to `goal`.
    pub fn find_path<Node, Ctx, G>(
        graph: &G,
        start: Node,
        goal: Node,
        context: &Ctx,
    ) -> Option<Path<Node>>
    where
        Node: NodeId,
        G: Graph<Node, Ctx>,
    {
        let mut open = BinaryHeap::new();
        // node -> (best known cost, predecessor, closed)
        let mut best: HashMap<Node, (u32, Option<Node>, bool)> = HashMap::new();

        best.insert(start, (0, None, false));
        open.push(Frontier {
            node: start,
            cost: 0,
            priority: graph.heuristic(start, goal, context),
        });

        while let Some(Frontier { node, cost, .. }) = open.pop() {
            let Some(entry) = best.get_mut(&node) else {
                continue;
            };
            if entry.2 || cost > entry.0 {
                continue;
            }
            entry.2 = true;

            if node == goal {
                return Some(Path {
                    nodes: unwind(&best, goal),
                    cost,
                });
            }

            for next in graph.neighbors(node, context) {
                let step = cost.saturating_add(graph.cost(node, next, context));
                let improved = match best.get(&next) {
                    Some(&(_, _, true)) => false,
                    Some(&(known, _, false)) => step < known,
                    None => true,
                };
                if improved {
                    best.insert(next, (step, Some(node), false));
                    open.push(Frontier {
                        node: next,
                        cost: step,
                        priority: step.saturating_add(graph.heuristic(next, goal, context)),
                    });
                }
            }
        }

        None
    }
}

fn unwind<Node: NodeId>(best: &HashMap<Node, (u32, Option<Node>, bool)>, goal: Node) -> Vec<Node> {
    let mut nodes = vec![goal];
    let mut cursor = goal;
    while let Some(&(_, Some(prev), _)) = best.get(&cursor) {
        nodes.push(prev);
        cursor = prev;
    }
    nodes.reverse();
    nodes
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct Frontier<Node> {
    node: Node,
    cost: u32,
    priority: u32,
}

// Min-heap on priority, then on cost.
impl<Node: Eq> Ord for Frontier<Node> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.cost.cmp(&self.cost))
    }
}

impl<Node: Eq> PartialOrd for Frontier<Node> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
