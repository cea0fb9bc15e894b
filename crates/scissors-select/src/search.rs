//! Single-source shortest paths over the implicit 8-connected pixel graph.
//!
//! [`shortest_paths`] runs Dijkstra's algorithm from a seed pixel, using
//! [`MinQueue`] for the frontier and a [`LinkCost`] for edge weights. The
//! search may be confined to a square [`SearchWindow`] around the seed so
//! that interactive use stays responsive on large images.
//!
//! The result, [`ShortestPaths`], keeps the settled cost of every reached
//! pixel and the pixel it was reached from. It is built once per seed and
//! then answers any number of [`ShortestPaths::trace_path`] queries.
//!
//! Searches poll a [`CancelToken`] before every node expansion and report
//! progress (percent of the window settled) through a callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::cost::LinkCost;
use crate::queue::MinQueue;
use crate::types::{Dimensions, Point, PolyLine, SelectionError};

/// Offsets of the eight neighbours, in expansion order.
const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Square region around the seed that a search may explore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    /// Maximum Chebyshev distance from the seed.
    pub radius: u32,
}

impl SearchWindow {
    /// A window of the given radius.
    #[must_use]
    pub const fn new(radius: u32) -> Self {
        Self { radius }
    }
}

/// Inclusive pixel rectangle explored by one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bounds {
    min_x: i32,
    min_y: i32,
    max_x: i32,
    max_y: i32,
}

impl Bounds {
    fn new(seed: Point, window: Option<SearchWindow>, dimensions: Dimensions) -> Self {
        let last_x = i32::try_from(dimensions.width).unwrap_or(i32::MAX) - 1;
        let last_y = i32::try_from(dimensions.height).unwrap_or(i32::MAX) - 1;
        match window {
            None => Self {
                min_x: 0,
                min_y: 0,
                max_x: last_x,
                max_y: last_y,
            },
            Some(SearchWindow { radius }) => {
                let r = i32::try_from(radius).unwrap_or(i32::MAX);
                Self {
                    min_x: seed.x.saturating_sub(r).max(0),
                    min_y: seed.y.saturating_sub(r).max(0),
                    max_x: seed.x.saturating_add(r).min(last_x),
                    max_y: seed.y.saturating_add(r).min(last_y),
                }
            }
        }
    }

    const fn contains(self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    fn clamp(self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(self.min_y, self.max_y),
        )
    }

    fn area(self) -> usize {
        let w = usize::try_from(self.max_x - self.min_x + 1).unwrap_or(0);
        let h = usize::try_from(self.max_y - self.min_y + 1).unwrap_or(0);
        w * h
    }
}

/// Shared flag used to ask a running search to stop.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Predecessor and settled-cost maps rooted at one seed.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    seed: Point,
    bounds: Bounds,
    settled: HashMap<Point, u64>,
    predecessors: HashMap<Point, Point>,
}

impl ShortestPaths {
    /// The pixel every path starts from.
    #[must_use]
    pub const fn seed(&self) -> Point {
        self.seed
    }

    /// Minimum cumulative cost from the seed to `p`, if settled.
    #[must_use]
    pub fn cost_to(&self, p: Point) -> Option<u64> {
        self.settled.get(&p).copied()
    }

    /// Whether the search finalised `p`.
    #[must_use]
    pub fn is_settled(&self, p: Point) -> bool {
        self.settled.contains_key(&p)
    }

    /// Number of settled pixels.
    #[must_use]
    pub fn settled_len(&self) -> usize {
        self.settled.len()
    }

    /// The settled pixel closest to `p` (`p` itself when settled).
    #[must_use]
    pub fn nearest_settled(&self, p: Point) -> Option<Point> {
        let clamped = self.bounds.clamp(p);
        if self.is_settled(clamped) {
            return Some(clamped);
        }
        self.settled
            .keys()
            .copied()
            .min_by_key(|&q| (q.distance_squared(p), q))
    }

    /// The cheapest path from the seed to `target`, seed first.
    ///
    /// Tracing the seed itself yields a single-point path.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Unreachable`] if `target` was never
    /// settled.
    pub fn trace_path(&self, target: Point) -> Result<PolyLine, SelectionError> {
        if !self.is_settled(target) {
            return Err(SelectionError::Unreachable(target));
        }
        let mut points = vec![target];
        let mut current = target;
        while current != self.seed {
            current = *self
                .predecessors
                .get(&current)
                .ok_or(SelectionError::Unreachable(target))?;
            points.push(current);
        }
        points.reverse();
        PolyLine::from_points(points).ok_or(SelectionError::Unreachable(target))
    }
}

/// Run Dijkstra's algorithm from `seed`.
///
/// `progress` receives the settled percentage of the window each time it
/// grows by at least one point. The search stops early with
/// [`SelectionError::Cancelled`] as soon as `cancel` is set; partial
/// results are dropped.
///
/// # Errors
///
/// Returns [`SelectionError::OutOfBounds`] if `seed` is outside the graph
/// and [`SelectionError::Cancelled`] if cancelled.
pub fn shortest_paths<C: LinkCost + ?Sized>(
    cost: &C,
    seed: Point,
    window: Option<SearchWindow>,
    cancel: &CancelToken,
    mut progress: impl FnMut(u8),
) -> Result<ShortestPaths, SelectionError> {
    let dimensions = cost.dimensions();
    if !dimensions.contains(seed) {
        return Err(SelectionError::OutOfBounds {
            point: seed,
            dimensions,
        });
    }

    let bounds = Bounds::new(seed, window, dimensions);
    let total = bounds.area().max(1);
    let mut frontier = MinQueue::new();
    let mut settled = HashMap::with_capacity(total);
    let mut predecessors = HashMap::with_capacity(total);
    let mut reported = 0_u8;

    frontier.add_or_update(seed, 0);
    while let Ok((p, cost_p)) = frontier.remove_min_with_priority() {
        if cancel.is_cancelled() {
            log::debug!("search from {seed} cancelled after {} nodes", settled.len());
            return Err(SelectionError::Cancelled);
        }
        settled.insert(p, cost_p);

        for (dx, dy) in NEIGHBOUR_OFFSETS {
            let n = Point::new(p.x + dx, p.y + dy);
            if !bounds.contains(n) || settled.contains_key(&n) {
                continue;
            }
            let candidate = cost_p + u64::from(cost.link_cost(p, n));
            if frontier
                .priority(&n)
                .is_none_or(|tentative| candidate < tentative)
            {
                frontier.add_or_update(n, candidate);
                predecessors.insert(n, p);
            }
        }

        let percent = u8::try_from(settled.len() * 100 / total).unwrap_or(100);
        if percent > reported {
            reported = percent;
            progress(percent);
        }
    }

    log::debug!("search from {seed} settled {} nodes", settled.len());
    Ok(ShortestPaths {
        seed,
        bounds,
        settled,
        predecessors,
    })
}
