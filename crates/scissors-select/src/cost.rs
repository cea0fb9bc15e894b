//! Link costs for the implicit pixel graph.
//!
//! Every pixel is a node linked to its (up to) eight neighbours. The cost of
//! a link is derived from the intensity gradient measured *across* the link:
//! for a step from `p` to `n` we compare the pixels on either side of the
//! step. A link that runs along a strong edge therefore sees a large cross
//! gradient and is cheap, so shortest paths hug edges.
//!
//! All variants share the inverse mapping
//! `cost = MAX_LINK_COST - clamp(gradient, 0, MAX_LINK_COST)`, which keeps
//! costs non-negative (required by Dijkstra) and symmetric in `(from, to)`.
//!
//! # Strategy pattern
//!
//! [`CostKind`] names the variant and [`CostModel`] is the precomputed form
//! bound to one image. The search is generic over [`LinkCost`] so tests can
//! plug in synthetic graphs.

use std::fmt;
use std::str::FromStr;

use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point};

/// Cost of a link across a perfectly flat region.
pub const MAX_LINK_COST: u32 = 255;

/// Selects how pixel colours are turned into link costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CostKind {
    /// Gradient of the channel mean.
    #[default]
    CrossGradMono,
    /// Largest of the per-channel (R, G, B) gradients.
    ColorWeigher,
    /// Gradient of luma (weighted towards green, as `imageops::grayscale`).
    LuminanceWeigher,
}

impl CostKind {
    /// All variants, in menu order.
    pub const ALL: [Self; 3] = [Self::CrossGradMono, Self::ColorWeigher, Self::LuminanceWeigher];

    /// The variant's stable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CrossGradMono => "CrossGradMono",
            Self::ColorWeigher => "ColorWeigher",
            Self::LuminanceWeigher => "LuminanceWeigher",
        }
    }
}

impl fmt::Display for CostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned by [`CostKind::from_str`] for an unknown name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cost variant {0:?}")]
pub struct UnknownCostKind(pub String);

impl FromStr for CostKind {
    type Err = UnknownCostKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownCostKind(s.to_owned()))
    }
}

/// Non-negative cost of stepping between two adjacent pixels.
pub trait LinkCost {
    /// Extent of the pixel graph.
    fn dimensions(&self) -> Dimensions;

    /// Cost of the link from `from` to its neighbour `to`.
    ///
    /// Both points are inside [`dimensions`](Self::dimensions) and differ
    /// by at most one in each coordinate.
    fn link_cost(&self, from: Point, to: Point) -> u32;
}

/// Link costs for one image under one [`CostKind`].
///
/// The sample planes (mean, R/G/B or luma) are extracted once; individual
/// link costs are computed on demand.
#[derive(Debug, Clone)]
pub struct CostModel {
    kind: CostKind,
    planes: Vec<GrayImage>,
    dimensions: Dimensions,
}

impl CostModel {
    /// Prepare link costs of `kind` over `image`.
    #[must_use]
    pub fn new(kind: CostKind, image: &RgbaImage) -> Self {
        let planes = match kind {
            CostKind::CrossGradMono => vec![GrayImage::from_fn(image.width(), image.height(), |x, y| {
                let [r, g, b, _] = image.get_pixel(x, y).0;
                let sum = u16::from(r) + u16::from(g) + u16::from(b);
                image::Luma([u8::try_from(sum / 3).unwrap_or(u8::MAX)])
            })],
            CostKind::ColorWeigher => (0..3)
                .map(|channel| {
                    GrayImage::from_fn(image.width(), image.height(), |x, y| {
                        image::Luma([image.get_pixel(x, y).0[channel]])
                    })
                })
                .collect(),
            CostKind::LuminanceWeigher => vec![image::imageops::grayscale(image)],
        };
        Self {
            kind,
            planes,
            dimensions: Dimensions::of(image),
        }
    }

    /// The variant these costs were built with.
    #[must_use]
    pub const fn kind(&self) -> CostKind {
        self.kind
    }

    /// Sample `plane` at `p`, replicating border pixels outside the image.
    fn sample(&self, plane: &GrayImage, p: Point) -> i32 {
        let max_x = i32::try_from(self.dimensions.width).unwrap_or(i32::MAX) - 1;
        let max_y = i32::try_from(self.dimensions.height).unwrap_or(i32::MAX) - 1;
        let x = u32::try_from(p.x.clamp(0, max_x)).unwrap_or(0);
        let y = u32::try_from(p.y.clamp(0, max_y)).unwrap_or(0);
        i32::from(plane.get_pixel(x, y).0[0])
    }

    /// Intensity difference between the two sides of the link in one plane.
    fn cross_gradient(&self, plane: &GrayImage, from: Point, to: Point) -> u32 {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let diff = if dx != 0 && dy != 0 {
            // Diagonal: the two pixels flanking the step.
            let a = self.sample(plane, Point::new(from.x + dx, from.y));
            let b = self.sample(plane, Point::new(from.x, from.y + dy));
            a - b
        } else {
            // Axis-aligned: average of the rows (or columns) on each side.
            let (sx, sy) = (dy, dx);
            let side_a = self.sample(plane, Point::new(from.x + sx, from.y + sy))
                + self.sample(plane, Point::new(to.x + sx, to.y + sy));
            let side_b = self.sample(plane, Point::new(from.x - sx, from.y - sy))
                + self.sample(plane, Point::new(to.x - sx, to.y - sy));
            (side_a - side_b) / 2
        };
        diff.unsigned_abs()
    }
}

impl LinkCost for CostModel {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn link_cost(&self, from: Point, to: Point) -> u32 {
        debug_assert!(from.chebyshev(to) == 1, "{from} and {to} are not neighbours");
        let gradient = self
            .planes
            .iter()
            .map(|plane| self.cross_gradient(plane, from, to))
            .max()
            .unwrap_or(0);
        MAX_LINK_COST - gradient.min(MAX_LINK_COST)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NEIGHBOURS: [(i32, i32); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    /// Left half black, right half white: a vertical edge between x = 4 and x = 5.
    fn vertical_edge() -> RgbaImage {
        RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in CostKind::ALL {
            assert_eq!(kind.name().parse::<CostKind>().unwrap(), kind);
        }
        assert_eq!(
            "luminanceweigher".parse::<CostKind>().unwrap(),
            CostKind::LuminanceWeigher
        );
        assert!("sobel".parse::<CostKind>().is_err());
    }

    #[test]
    fn flat_image_costs_maximum_everywhere() {
        let img = RgbaImage::from_pixel(5, 5, image::Rgba([90, 120, 30, 255]));
        for kind in CostKind::ALL {
            let model = CostModel::new(kind, &img);
            let p = Point::new(2, 2);
            for (dx, dy) in NEIGHBOURS {
                let n = Point::new(p.x + dx, p.y + dy);
                assert_eq!(model.link_cost(p, n), MAX_LINK_COST, "{kind} {n}");
            }
        }
    }

    #[test]
    fn links_along_an_edge_are_cheaper_than_links_across_it() {
        let model = CostModel::new(CostKind::CrossGradMono, &vertical_edge());
        // Running down the edge boundary.
        let along = model.link_cost(Point::new(4, 3), Point::new(4, 4));
        // Stepping across the edge.
        let across = model.link_cost(Point::new(4, 3), Point::new(5, 3));
        // Far from the edge.
        let flat = model.link_cost(Point::new(1, 3), Point::new(1, 4));
        assert!(along < flat, "along={along} flat={flat}");
        assert!(along < across, "along={along} across={across}");
        assert_eq!(flat, MAX_LINK_COST);
    }

    #[test]
    fn costs_are_symmetric_and_bounded() {
        let img = RgbaImage::from_fn(6, 6, |x, y| {
            let v = u8::try_from((x * 37 + y * 91) % 256).unwrap();
            image::Rgba([v, v.wrapping_mul(3), 255 - v, 255])
        });
        for kind in CostKind::ALL {
            let model = CostModel::new(kind, &img);
            for y in 0..6 {
                for x in 0..6 {
                    let p = Point::new(x, y);
                    for (dx, dy) in NEIGHBOURS {
                        let n = Point::new(x + dx, y + dy);
                        if !model.dimensions().contains(n) {
                            continue;
                        }
                        let forward = model.link_cost(p, n);
                        assert!(forward <= MAX_LINK_COST);
                        assert_eq!(forward, model.link_cost(n, p), "{kind} {p}->{n}");
                    }
                }
            }
        }
    }

    #[test]
    fn color_variant_sees_edges_invisible_to_mono() {
        // Red and green halves with nearly the same channel mean.
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgba([200, 0, 0, 255])
            } else {
                image::Rgba([0, 200, 0, 255])
            }
        });
        let a = Point::new(4, 3);
        let b = Point::new(4, 4);
        let mono = CostModel::new(CostKind::CrossGradMono, &img).link_cost(a, b);
        let color = CostModel::new(CostKind::ColorWeigher, &img).link_cost(a, b);
        assert_eq!(mono, MAX_LINK_COST);
        assert!(color < mono, "color={color} mono={mono}");
    }

    #[test]
    fn luminance_weights_channels_unequally() {
        // Equal channel mean on both sides, different luma.
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgba([0, 150, 0, 255])
            } else {
                image::Rgba([0, 0, 150, 255])
            }
        });
        let a = Point::new(4, 3);
        let b = Point::new(4, 4);
        let mono = CostModel::new(CostKind::CrossGradMono, &img).link_cost(a, b);
        let luma = CostModel::new(CostKind::LuminanceWeigher, &img).link_cost(a, b);
        assert_eq!(mono, MAX_LINK_COST);
        assert!(luma < mono, "luma={luma} mono={mono}");
    }

    #[test]
    fn kind_serde_round_trip() {
        let json = serde_json::to_string(&CostKind::ColorWeigher).unwrap();
        assert_eq!(json, "\"ColorWeigher\"");
        let back: CostKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CostKind::ColorWeigher);
    }
}
