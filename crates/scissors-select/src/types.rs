//! Shared types for the selection-path engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::queue::EmptyQueue;

/// Re-export `RgbaImage` so downstream crates can hand rasters to the
/// model without depending on `image` directly.
pub use image::RgbaImage;

/// An integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    /// Column (pixels from left edge).
    pub x: i32,
    /// Row (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }

    /// Chebyshev (king-move) distance to another point.
    ///
    /// This is the hop count between two pixels on the 8-connected grid.
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy { dx } else { dy }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An ordered, non-empty sequence of points forming one piece of a
/// selection boundary.
///
/// `start` and `end` are the first and last points; for a single-point
/// polyline they coincide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct PolyLine(Vec<Point>);

impl PolyLine {
    /// Build a polyline from a sequence of points.
    ///
    /// Returns `None` if `points` is empty.
    #[must_use]
    pub fn from_points(points: Vec<Point>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self(points))
        }
    }

    /// A straight segment from `start` to `end`.
    ///
    /// Only the endpoints are stored; the renderer draws the line between
    /// them.
    #[must_use]
    pub fn straight(start: Point, end: Point) -> Self {
        Self(vec![start, end])
    }

    /// A degenerate polyline holding a single point.
    #[must_use]
    pub fn single(point: Point) -> Self {
        Self(vec![point])
    }

    /// First point.
    #[must_use]
    pub fn start(&self) -> Point {
        self.0[0]
    }

    /// Last point.
    #[must_use]
    pub fn end(&self) -> Point {
        self.0[self.0.len() - 1]
    }

    /// Number of points (always at least one).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with collections.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All points in order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// The same points in reverse order.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Append `point` after the current end.
    pub fn push(&mut self, point: Point) {
        self.0.push(point);
    }
}

impl TryFrom<Vec<Point>> for PolyLine {
    type Error = &'static str;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::from_points(points).ok_or("a polyline needs at least one point")
    }
}

impl From<PolyLine> for Vec<Point> {
    fn from(polyline: PolyLine) -> Self {
        polyline.0
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a raster.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Whether `p` addresses a pixel inside these bounds.
    #[must_use]
    pub fn contains(self, p: Point) -> bool {
        u32::try_from(p.x).is_ok_and(|x| x < self.width)
            && u32::try_from(p.y).is_ok_and(|y| y < self.height)
    }
}

/// The phase of a selection. Exactly one holds at a time and it decides
/// which operations are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionState {
    /// No anchor has been placed.
    #[default]
    NoSelection,
    /// At least one anchor is placed and the polygon is open.
    Selecting,
    /// A background path search for the next segment is in flight.
    Processing,
    /// The polygon is closed.
    Selected,
}

impl SelectionState {
    /// Whether the selection is closed.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Selected)
    }

    /// Whether the model is waiting on a background search.
    #[must_use]
    pub const fn is_processing(self) -> bool {
        matches!(self, Self::Processing)
    }
}

impl fmt::Display for SelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoSelection => "NO_SELECTION",
            Self::Selecting => "SELECTING",
            Self::Processing => "PROCESSING",
            Self::Selected => "SELECTED",
        };
        f.write_str(name)
    }
}

/// Errors reported by the selection engine.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    /// A priority queue was queried while empty.
    #[error(transparent)]
    EmptyQueue(#[from] EmptyQueue),

    /// The operation is not allowed in the current state.
    #[error("cannot {operation} in state {state}")]
    IllegalTransition {
        /// Name of the rejected operation.
        operation: &'static str,
        /// State the model was in.
        state: SelectionState,
    },

    /// A vertex or segment index is outside the current path.
    #[error("index {index} is out of bounds for a path of {len} segments")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Number of segments in the path.
        len: usize,
    },

    /// A point lies outside the source image.
    #[error("point {point} is outside the {}x{} image", .dimensions.width, .dimensions.height)]
    OutOfBounds {
        /// Offending point.
        point: Point,
        /// Bounds of the source image.
        dimensions: Dimensions,
    },

    /// The target was never settled by the (bounded) search.
    #[error("no path reaches {0}")]
    Unreachable(Point),

    /// A background search was cancelled before it finished.
    #[error("path search was cancelled")]
    Cancelled,

    /// There was nothing to work on: empty image bytes or an empty outline.
    #[error("input is empty")]
    EmptyInput,

    /// The image could not be decoded or encoded.
    #[error("image codec error: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Writing the output failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
