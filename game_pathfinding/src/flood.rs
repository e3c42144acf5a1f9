use std::collections::{HashSet, VecDeque};

use crate::{Graph, NodeId};

/// What the visitor decided about a newly reached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Passable: expand its neighbors later.
    Continue,
    /// Reached but not expanded.
    DeadEnd,
    /// Stop the search; this node is the answer.
    Finished,
}

/// Breadth-first flood fill.
///
/// Start nodes are queued without being visited. Every other node is offered to
/// the visitor at most once, in the order the frontier reaches it, so the first
/// `Finished` node is the nearest by step count.
pub struct FloodFill<Node> {
    frontier: VecDeque<Node>,
    seen: HashSet<Node>,
    limit: Option<usize>,
    visited: usize,
}

impl<Node: NodeId> FloodFill<Node> {
    pub fn new(starts: impl IntoIterator<Item = Node>) -> Self {
        let mut fill = FloodFill {
            frontier: VecDeque::new(),
            seen: HashSet::new(),
            limit: None,
            visited: 0,
        };
        for start in starts {
            if fill.seen.insert(start) {
                fill.frontier.push_back(start);
            }
        }
        fill
    }

    /// Gives up after `limit` visitor calls.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Number of nodes offered to the visitor so far.
    pub fn visited(&self) -> usize {
        self.visited
    }

    /// Whether `node` has been queued or offered.
    pub fn reached(&self, node: Node) -> bool {
        self.seen.contains(&node)
    }

    /// Runs until the visitor returns `Finished` or the frontier is exhausted.
    /// The visitor gets `(from, to)`.
    pub fn run<Ctx, G, V>(&mut self, graph: &G, context: &Ctx, mut visit: V) -> Option<Node>
    where
        G: Graph<Node, Ctx>,
        V: FnMut(Node, Node) -> VisitResult,
    {
        while let Some(from) = self.frontier.pop_front() {
            for to in graph.neighbors(from, context) {
                if !self.seen.insert(to) {
                    continue;
                }
                if self.limit.is_some_and(|l| self.visited >= l) {
                    return None;
                }
                self.visited += 1;
                match visit(from, to) {
                    VisitResult::Continue => self.frontier.push_back(to),
                    VisitResult::DeadEnd => {}
                    VisitResult::Finished => return Some(to),
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A 1-D strip 0..10.
    struct Strip;

    impl Graph<i32, ()> for Strip {
        fn neighbors(&self, node: i32, _context: &()) -> Vec<i32> {
            [node - 1, node + 1]
                .into_iter()
                .filter(|n| (0..10).contains(n))
                .collect()
        }
    }

    #[test]
    fn test_start_nodes_are_not_visited() {
        let mut offered = Vec::new();
        FloodFill::new([5]).run(&Strip, &(), |_, to| {
            offered.push(to);
            VisitResult::Continue
        });
        assert!(!offered.contains(&5));
        assert_eq!(offered.len(), 9);
        // Nearest first.
        assert_eq!(&offered[..2], &[4, 6]);
    }

    #[test]
    fn test_dead_end_blocks_expansion() {
        let hit = FloodFill::new([0]).run(&Strip, &(), |_, to| {
            if to == 3 {
                VisitResult::DeadEnd
            } else if to == 8 {
                VisitResult::Finished
            } else {
                VisitResult::Continue
            }
        });
        assert_eq!(hit, None);
    }

    #[test]
    fn test_finished_returns_node() {
        let hit = FloodFill::new([0, 9]).run(&Strip, &(), |_, to| {
            if to == 7 {
                VisitResult::Finished
            } else {
                VisitResult::Continue
            }
        });
        assert_eq!(hit, Some(7));
    }

    #[test]
    fn test_limit_stops_search() {
        let mut fill = FloodFill::new([0]).with_limit(3);
        let hit = fill.run(&Strip, &(), |_, to| {
            if to == 9 {
                VisitResult::Finished
            } else {
                VisitResult::Continue
            }
        });
        assert_eq!(hit, None);
        assert_eq!(fill.visited(), 3);
    }
}
