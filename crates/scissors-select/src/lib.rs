//! scissors-select: Selection-path engine for outlining image regions.
//!
//! A selection is a closed path of segments between user-placed anchors.
//! Segments are either straight lines or edge-following "intelligent
//! scissors" paths found by a shortest-path search over the pixel graph:
//!
//! - [`queue`]: min-priority queue with decrease/increase-key.
//! - [`cost`]: gradient-derived link costs (three variants).
//! - [`search`]: bounded, cancellable Dijkstra and path tracing.
//! - [`worker`]: runs searches on a background thread.
//! - [`selection`]: the [`SelectionModel`] state machine.
//! - [`events`]: `state`/`progress`/`selection` notifications.
//! - [`mask`]: cropping the finished polygon out of the image.
//!
//! The crate does no file I/O. Images come in as decoded rasters (see
//! [`decode::decode_image`]) and the cropped selection goes out through
//! any [`std::io::Write`].

pub mod config;
pub mod cost;
pub mod decode;
pub mod events;
pub mod mask;
pub mod queue;
pub mod search;
pub mod selection;
pub mod types;
pub mod worker;

pub use config::SelectorConfig;
pub use cost::{CostKind, CostModel, LinkCost};
pub use decode::decode_image;
pub use events::{ListenerId, SelectionEvent, Topic};
pub use queue::{EmptyQueue, MinQueue};
pub use search::{CancelToken, SearchWindow, ShortestPaths, shortest_paths};
pub use selection::{SelectionModel, StrategyKind};
pub use types::{Dimensions, Point, PolyLine, RgbaImage, SelectionError, SelectionState};
