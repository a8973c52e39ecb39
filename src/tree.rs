//! Bounding-box tree over primitive indices.
//!
//! The tree recursively cuts its box in two along one axis, choosing the
//! cut that minimises the number of objects on the more crowded side.
//! Objects whose boxes straddle a cut are stored on both sides, so every
//! leaf whose box contains a point holds every object whose box contains
//! that point. Leaves keep their entries in ascending index order, which
//! makes the first exact hit in a leaf the highest-precedence one.

use std::fmt;

use itertools::Itertools;
use nalgebra::Point3;
use serde::Serialize;

use crate::config::{MAX_LEAF_OBJECTS, PARTITION_NUDGE};
use crate::containment::BoundingBox;


/// A primitive index together with the primitive's bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub index: usize,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(Vec<Entry>),
    Split {
        axis: usize,
        cut: f64,
        lower: Box<BoxTree>,
        upper: Box<BoxTree>,
    },
}

/// Hierarchical index answering "which objects' boxes contain this point".
#[derive(Debug, Clone, PartialEq)]
pub struct BoxTree {
    bounds: BoundingBox,
    node: Node,
}

/// Shape summary of a [`BoxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub depth: usize,            // number of levels, a lone leaf has depth 1
    pub nodes: usize,            // leaves and splits
    pub leaves: usize,
    pub entries: usize,          // stored entries, objects on both sides of a cut count twice
    pub max_leaf_entries: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "depth {}, {} nodes ({} leaves), {} entries, at most {} per leaf",
            self.depth, self.nodes, self.leaves, self.entries, self.max_leaf_entries
        )
    }
}

struct Partition {
    axis: usize,
    cut: f64,
    worst: usize, // objects on the more crowded side
    best: usize,  // objects on the less crowded side
}

fn nudge(v: f64) -> f64 {
    PARTITION_NUDGE * v.abs().max(1.0)
}

/// Finds the cut through `bounds` minimising the larger side's object count.
fn best_partition(bounds: &BoundingBox, entries: &[Entry]) -> Option<Partition> {
    let mut best: Option<Partition> = None;
    for axis in 0..3 {
        let lows = entries
            .iter()
            .map(|e| e.bounds.low[axis])
            .sorted_by(f64::total_cmp)
            .collect_vec();
        let highs = entries
            .iter()
            .map(|e| e.bounds.high[axis])
            .sorted_by(f64::total_cmp)
            .collect_vec();

        let candidates = entries.iter().flat_map(|e| {
            let (low, high) = (e.bounds.low[axis], e.bounds.high[axis]);
            [high + nudge(high), low - nudge(low)]
        });
        for cut in candidates {
            if !cut.is_finite() || cut <= bounds.low[axis] || cut >= bounds.high[axis] {
                continue;
            }
            let n_lower = lows.partition_point(|&l| l <= cut);
            let n_upper = highs.len() - highs.partition_point(|&h| h < cut);
            let worst = n_lower.max(n_upper);
            if best.as_ref().map_or(true, |b| worst < b.worst) {
                best = Some(Partition {
                    axis,
                    cut,
                    worst,
                    best: n_lower.min(n_upper),
                });
            }
        }
    }
    best
}

impl BoxTree {
    /// Builds a tree over `boxes` (indexed by position) within `domain`.
    ///
    /// Empty boxes and boxes not meeting the domain are left out.
    pub fn build(boxes: &[BoundingBox], domain: BoundingBox) -> Self {
        let entries = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.intersects(&domain))
            .map(|(index, bounds)| Entry {
                index,
                bounds: *bounds,
            })
            .collect();
        Self::grow(domain, entries)
    }

    fn grow(bounds: BoundingBox, entries: Vec<Entry>) -> Self {
        let n = entries.len();
        if n <= MAX_LEAF_OBJECTS {
            return Self::leaf(bounds, entries);
        }
        let partition = match best_partition(&bounds, &entries) {
            Some(p) if p.worst < n && p.best + 1 < n => p,
            _ => return Self::leaf(bounds, entries),
        };

        let Partition { axis, cut, .. } = partition;
        let (lower_box, upper_box) = bounds.split(axis, cut);
        let lower = entries
            .iter()
            .filter(|e| e.bounds.low[axis] <= cut)
            .copied()
            .collect();
        let upper = entries
            .into_iter()
            .filter(|e| e.bounds.high[axis] >= cut)
            .collect();

        Self {
            bounds,
            node: Node::Split {
                axis,
                cut,
                lower: Box::new(Self::grow(lower_box, lower)),
                upper: Box::new(Self::grow(upper_box, upper)),
            },
        }
    }

    fn leaf(bounds: BoundingBox, entries: Vec<Entry>) -> Self {
        Self {
            bounds,
            node: Node::Leaf(entries),
        }
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Entries of the first leaf whose box contains `p`.
    fn leaf_at(&self, p: &Point3<f64>) -> Option<&[Entry]> {
        if !self.bounds.contains_point(p) {
            return None;
        }
        match &self.node {
            Node::Leaf(entries) => Some(entries),
            Node::Split { lower, upper, .. } => lower.leaf_at(p).or_else(|| upper.leaf_at(p)),
        }
    }

    /// Lowest index whose box contains `p` and which passes the exact test `hit`.
    pub fn find(&self, p: &Point3<f64>, hit: impl Fn(usize) -> bool) -> Option<usize> {
        self.leaf_at(p)?
            .iter()
            .find(|e| e.bounds.contains_point(p) && hit(e.index))
            .map(|e| e.index)
    }

    /// Every index whose box contains `p` and which passes `hit`, ascending.
    pub fn find_all(&self, p: &Point3<f64>, hit: impl Fn(usize) -> bool) -> Vec<usize> {
        self.leaf_at(p)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.bounds.contains_point(p) && hit(e.index))
                    .map(|e| e.index)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A copy pruned to the part of the tree meeting `window`.
    ///
    /// Answers are unchanged for points inside `window`. Splits left with a
    /// single live side collapse into that side.
    pub fn restrict(&self, window: &BoundingBox) -> BoxTree {
        let bounds = self.bounds.intersection(window);
        match &self.node {
            Node::Leaf(entries) => Self::leaf(
                bounds,
                entries
                    .iter()
                    .filter(|e| e.bounds.intersects(window))
                    .copied()
                    .collect(),
            ),
            Node::Split {
                axis,
                cut,
                lower,
                upper,
            } => match (lower.bounds.intersects(window), upper.bounds.intersects(window)) {
                (true, true) => Self {
                    bounds,
                    node: Node::Split {
                        axis: *axis,
                        cut: *cut,
                        lower: Box::new(lower.restrict(window)),
                        upper: Box::new(upper.restrict(window)),
                    },
                },
                (true, false) => lower.restrict(window),
                (false, true) => upper.restrict(window),
                (false, false) => Self::leaf(bounds, Vec::new()),
            },
        }
    }

    pub fn stats(&self) -> TreeStats {
        match &self.node {
            Node::Leaf(entries) => TreeStats {
                depth: 1,
                nodes: 1,
                leaves: 1,
                entries: entries.len(),
                max_leaf_entries: entries.len(),
            },
            Node::Split { lower, upper, .. } => {
                let (a, b) = (lower.stats(), upper.stats());
                TreeStats {
                    depth: 1 + a.depth.max(b.depth),
                    nodes: 1 + a.nodes + b.nodes,
                    leaves: a.leaves + b.leaves,
                    entries: a.entries + b.entries,
                    max_leaf_entries: a.max_leaf_entries.max(b.max_leaf_entries),
                }
            }
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        let pad = "  ".repeat(level);
        match &self.node {
            Node::Leaf(entries) => {
                writeln!(f, "{}leaf {}", pad, self.bounds)?;
                for e in entries {
                    writeln!(f, "{}  #{} {}", pad, e.index, e.bounds)?;
                }
                Ok(())
            }
            Node::Split {
                axis,
                cut,
                lower,
                upper,
            } => {
                let name = ["x", "y", "z"][*axis];
                writeln!(f, "{}split {} at {} {}", pad, name, cut, self.bounds)?;
                lower.write_indented(f, level + 1)?;
                upper.write_indented(f, level + 1)
            }
        }
    }
}

impl fmt::Display for BoxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
