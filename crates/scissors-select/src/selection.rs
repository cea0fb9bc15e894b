//! The selection state machine.
//!
//! [`SelectionModel`] owns the committed segments of a selection path and
//! the [`SelectionState`] that decides which operations are legal. Anchors
//! are connected by one of two strategies:
//!
//! - **Point-to-point**: every segment is a straight line.
//! - **Scissors**: segments follow image edges. Each new anchor seeds a
//!   background [`SearchTask`]; while it runs the model is `PROCESSING`.
//!   Once the map arrives, [`live_wire`](SelectionModel::live_wire) traces
//!   previews from it without blocking.
//!
//! The model runs on one foreground thread. Background results are picked
//! up by [`poll`](SelectionModel::poll) (non-blocking) or
//! [`wait_idle`](SelectionModel::wait_idle) (blocking). Every state change,
//! progress step and segment change is published on the model's
//! [`EventBus`].

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::config::SelectorConfig;
use crate::cost::{CostKind, CostModel};
use crate::events::{EventBus, ListenerId, SelectionEvent, Topic};
use crate::mask;
use crate::search::ShortestPaths;
use crate::types::{Dimensions, Point, PolyLine, SelectionError, SelectionState};
use crate::worker::{SearchMessage, SearchRequest, SearchTask};

/// How consecutive anchors are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Straight lines between anchors.
    #[default]
    PointToPoint,
    /// Edge-following paths under the given cost variant.
    Scissors(CostKind),
}

impl StrategyKind {
    /// All strategies, in menu order.
    pub const ALL: [Self; 4] = [
        Self::PointToPoint,
        Self::Scissors(CostKind::CrossGradMono),
        Self::Scissors(CostKind::ColorWeigher),
        Self::Scissors(CostKind::LuminanceWeigher),
    ];

    /// Whether anchors are joined by background path searches.
    #[must_use]
    pub const fn is_scissors(self) -> bool {
        matches!(self, Self::Scissors(_))
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PointToPoint => f.write_str("point-to-point"),
            Self::Scissors(kind) => fmt::Display::fmt(kind, f),
        }
    }
}

/// Returned by [`StrategyKind::from_str`] for an unknown name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown strategy {0:?}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    /// Accepts `point-to-point` or any [`CostKind`] name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("point-to-point") {
            return Ok(Self::PointToPoint);
        }
        s.parse::<CostKind>()
            .map(Self::Scissors)
            .map_err(|_| UnknownStrategy(s.to_owned()))
    }
}

/// Path from the map's seed to `target`.
///
/// Traces to the settled pixel nearest `target` and finishes with a
/// straight step when `target` itself lies outside the searched window.
fn route(paths: &ShortestPaths, target: Point) -> PolyLine {
    let traced = paths
        .nearest_settled(target)
        .and_then(|reached| paths.trace_path(reached).ok());
    match traced {
        Some(mut line) => {
            if line.end() != target {
                log::trace!("{target} not settled; finishing at {} with a straight step", line.end());
                line.push(target);
            }
            line
        }
        None => {
            log::warn!("no traced path from {} to {target}; using a straight line", paths.seed());
            PolyLine::straight(paths.seed(), target)
        }
    }
}

/// The two segments around a dragged vertex as they were before the drag.
#[derive(Debug, Clone)]
struct VertexMove {
    index: usize,
    incoming: PolyLine,
    outgoing: PolyLine,
    start: Option<Point>,
}

impl VertexMove {
    /// Put the segments and start back.
    fn restore(self, segments: &mut [PolyLine], start: &mut Option<Point>) {
        let before = (self.index + segments.len() - 1) % segments.len();
        segments[before] = self.incoming;
        segments[self.index] = self.outgoing;
        *start = self.start;
    }
}

/// Change waiting on the running search.
#[derive(Debug, Default)]
enum Pending {
    #[default]
    Nothing,
    /// The last segment was committed together with the search.
    Segment,
    /// A vertex was moved; its neighbours stay straight until traced.
    Move(VertexMove),
}

#[derive(Debug)]
struct ScissorsState {
    cost: Arc<CostModel>,
    /// Most recently completed map.
    paths: Option<Arc<ShortestPaths>>,
    task: Option<SearchTask>,
    pending: Pending,
}

impl ScissorsState {
    fn new(kind: CostKind, image: &RgbaImage) -> Self {
        Self {
            cost: Arc::new(CostModel::new(kind, image)),
            paths: None,
            task: None,
            pending: Pending::Nothing,
        }
    }

    /// The latest map, if it is rooted at `anchor`.
    fn paths_from(&self, anchor: Point) -> Option<&ShortestPaths> {
        self.paths.as_deref().filter(|paths| paths.seed() == anchor)
    }

    /// Cancel and join the running task. Returns what was waiting on it.
    fn stop_search(&mut self) -> Pending {
        if let Some(task) = self.task.take() {
            task.cancel();
        }
        std::mem::take(&mut self.pending)
    }
}

#[derive(Debug)]
enum Strategy {
    PointToPoint,
    Scissors(ScissorsState),
}

impl Strategy {
    fn new(kind: StrategyKind, image: &RgbaImage) -> Self {
        match kind {
            StrategyKind::PointToPoint => Self::PointToPoint,
            StrategyKind::Scissors(cost) => Self::Scissors(ScissorsState::new(cost, image)),
        }
    }

    fn kind(&self) -> StrategyKind {
        match self {
            Self::PointToPoint => StrategyKind::PointToPoint,
            Self::Scissors(scissors) => StrategyKind::Scissors(scissors.cost.kind()),
        }
    }

    /// Segment joining `from` to `to` under this strategy.
    fn connect(&self, from: Point, to: Point) -> PolyLine {
        match self {
            Self::PointToPoint => PolyLine::straight(from, to),
            Self::Scissors(scissors) => scissors.paths_from(from).map_or_else(
                || {
                    log::trace!("no map rooted at {from}; straight line to {to}");
                    PolyLine::straight(from, to)
                },
                |paths| route(paths, to),
            ),
        }
    }
}

/// Selection path and state for one source image.
#[derive(Debug)]
pub struct SelectionModel {
    image: RgbaImage,
    config: SelectorConfig,
    state: SelectionState,
    start: Option<Point>,
    segments: Vec<PolyLine>,
    strategy: Strategy,
    events: EventBus,
    generation: u64,
}

impl SelectionModel {
    /// An empty selection over `image`.
    #[must_use]
    pub fn new(image: RgbaImage, config: SelectorConfig) -> Self {
        let strategy = Strategy::new(config.strategy, &image);
        Self {
            image,
            config,
            state: SelectionState::NoSelection,
            start: None,
            segments: Vec::new(),
            strategy,
            events: EventBus::new(),
            generation: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SelectionState {
        self.state
    }

    /// Committed segments, in path order.
    #[must_use]
    pub fn segments(&self) -> &[PolyLine] {
        &self.segments
    }

    /// First anchor.
    #[must_use]
    pub const fn start(&self) -> Option<Point> {
        self.start
    }

    /// End of the committed path (the start anchor if nothing is committed).
    #[must_use]
    pub fn last_point(&self) -> Option<Point> {
        self.segments.last().map(PolyLine::end).or(self.start)
    }

    /// Extent of the source image.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::of(&self.image)
    }

    /// The source image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Active strategy.
    #[must_use]
    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Settings in effect.
    #[must_use]
    pub const fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Every point of the path in order, with shared segment ends listed
    /// once. A finished path ends where it starts.
    #[must_use]
    pub fn outline(&self) -> Vec<Point> {
        let mut points: Vec<Point> = self.start.into_iter().collect();
        for segment in &self.segments {
            points.extend(segment.points().iter().skip(1));
        }
        points
    }

    /// Index of the vertex (segment start) nearest `p` within
    /// `max_distance_squared`, for picking a vertex to drag.
    #[must_use]
    pub fn closest_point(&self, p: Point, max_distance_squared: i64) -> Option<usize> {
        self.segments
            .iter()
            .enumerate()
            .map(|(index, segment)| (segment.start().distance_squared(p), index))
            .filter(|&(distance, _)| distance <= max_distance_squared)
            .min()
            .map(|(_, index)| index)
    }

    /// Call `listener` for every event on `topic`.
    pub fn subscribe(
        &mut self,
        topic: Topic,
        listener: impl FnMut(&SelectionEvent) + Send + 'static,
    ) -> ListenerId {
        self.events.subscribe(topic, listener)
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Place an anchor: the first one starts a selection, later ones extend
    /// it.
    ///
    /// # Errors
    ///
    /// [`SelectionError::OutOfBounds`] for a point outside the image,
    /// [`SelectionError::IllegalTransition`] unless `NO_SELECTION` or
    /// `SELECTING`, and [`SelectionError::Io`] if a search thread cannot
    /// be started.
    pub fn add_point(&mut self, p: Point) -> Result<(), SelectionError> {
        match self.state {
            SelectionState::NoSelection => {
                self.check_bounds(p)?;
                log::debug!("selection started at {p}");
                self.start = Some(p);
                self.set_state(SelectionState::Selecting);
                self.publish_selection();
                self.launch_search(p, Pending::Nothing)
            }
            SelectionState::Selecting => self.append_to_selection(p),
            state => Err(SelectionError::IllegalTransition {
                operation: "add a point",
                state,
            }),
        }
    }

    /// Commit the segment from the last anchor to `p` and make `p` the new
    /// anchor. In scissors mode this starts a search from `p`.
    ///
    /// # Errors
    ///
    /// As [`add_point`](Self::add_point); only legal in `SELECTING`.
    pub fn append_to_selection(&mut self, p: Point) -> Result<(), SelectionError> {
        let last = self
            .last_point()
            .filter(|_| self.state == SelectionState::Selecting)
            .ok_or_else(|| self.illegal("append to the selection"))?;
        self.check_bounds(p)?;

        let segment = self.strategy.connect(last, p);
        log::trace!("committing {} point segment {last} -> {p}", segment.len());
        self.segments.push(segment);
        self.publish_selection();

        if let Err(err) = self.launch_search(p, Pending::Segment) {
            self.segments.pop();
            self.publish_selection();
            return Err(err);
        }
        Ok(())
    }

    /// Preview segment from the last anchor to `cursor`. Never blocks and
    /// never changes the model.
    ///
    /// In scissors mode the preview is traced from the latest completed map
    /// when it is rooted at the last anchor, and is a straight line
    /// otherwise.
    ///
    /// # Errors
    ///
    /// [`SelectionError::IllegalTransition`] in `NO_SELECTION`.
    pub fn live_wire(&self, cursor: Point) -> Result<PolyLine, SelectionError> {
        let last = self
            .last_point()
            .filter(|_| self.state != SelectionState::NoSelection)
            .ok_or_else(|| self.illegal("trace a live wire"))?;
        Ok(self.strategy.connect(last, cursor))
    }

    /// Close the polygon by connecting the last anchor back to the start.
    ///
    /// With nothing committed there is nothing to close and the model is
    /// reset instead.
    ///
    /// # Errors
    ///
    /// [`SelectionError::IllegalTransition`] unless `SELECTING`.
    pub fn finish_selection(&mut self) -> Result<(), SelectionError> {
        let (Some(start), Some(last)) = (self.start, self.last_point()) else {
            return Err(self.illegal("finish the selection"));
        };
        if self.state != SelectionState::Selecting {
            return Err(self.illegal("finish the selection"));
        }
        if self.segments.is_empty() {
            log::debug!("finishing a selection with a single anchor resets it");
            self.reset();
            return Ok(());
        }

        let closing = self.strategy.connect(last, start);
        self.segments.push(closing);
        self.publish_selection();
        self.set_state(SelectionState::Selected);
        Ok(())
    }

    /// Stop the running search and roll back what was waiting on it: the
    /// segment committed with it goes away, a moved vertex goes back.
    ///
    /// The map from before the search stays available to
    /// [`live_wire`](Self::live_wire).
    ///
    /// # Errors
    ///
    /// [`SelectionError::IllegalTransition`] unless `PROCESSING`.
    pub fn cancel_processing(&mut self) -> Result<(), SelectionError> {
        if self.state != SelectionState::Processing {
            return Err(self.illegal("cancel processing"));
        }
        self.abandon_search();
        Ok(())
    }

    /// Step back one segment.
    ///
    /// In `PROCESSING` the search is cancelled first, together with the
    /// segment or vertex move waiting on it. In `SELECTED` the closing
    /// segment is removed, reopening the polygon. Undoing the start anchor
    /// resets the model.
    ///
    /// # Errors
    ///
    /// [`SelectionError::IllegalTransition`] in `NO_SELECTION`, and
    /// [`SelectionError::Io`] if a replacement search cannot be started.
    pub fn undo(&mut self) -> Result<(), SelectionError> {
        match self.state {
            SelectionState::NoSelection => Err(self.illegal("undo")),
            SelectionState::Processing => match self.stop_search() {
                Pending::Nothing => self.pop_segment(),
                pending => {
                    let state = self.roll_back(pending);
                    self.set_state(state);
                    Ok(())
                }
            },
            SelectionState::Selecting | SelectionState::Selected => self.pop_segment(),
        }
    }

    /// Discard the whole selection. A no-op in `NO_SELECTION`.
    pub fn reset(&mut self) {
        self.stop_search();
        if let Strategy::Scissors(scissors) = &mut self.strategy {
            scissors.paths = None;
        }
        let had_selection = self.start.take().is_some() || !self.segments.is_empty();
        self.segments.clear();
        if had_selection {
            log::debug!("selection reset");
            self.publish_selection();
        }
        self.set_state(SelectionState::NoSelection);
    }

    /// Move vertex `index` (the start of segment `index`) to `position`,
    /// rebuilding the two segments that meet there.
    ///
    /// In scissors mode the two segments are straight at first and a
    /// background search rooted at `position` starts (`PROCESSING`). When it
    /// finishes they are traced and the model is `SELECTED` again;
    /// cancelling or undoing before then restores the path as it was.
    ///
    /// # Errors
    ///
    /// [`SelectionError::IllegalTransition`] unless `SELECTED`,
    /// [`SelectionError::InvalidIndex`] for an index past the last segment,
    /// [`SelectionError::OutOfBounds`] for a position outside the image and
    /// [`SelectionError::Io`] if the search thread cannot be started.
    pub fn move_point(&mut self, index: usize, position: Point) -> Result<(), SelectionError> {
        if self.state != SelectionState::Selected {
            return Err(self.illegal("move a point"));
        }
        let len = self.segments.len();
        if index >= len {
            return Err(SelectionError::InvalidIndex { index, len });
        }
        self.check_bounds(position)?;

        let before = (index + len - 1) % len;
        let from = self.segments[before].start();
        let to = self.segments[index].end();
        let previous = VertexMove {
            index,
            incoming: std::mem::replace(
                &mut self.segments[before],
                PolyLine::straight(from, position),
            ),
            outgoing: std::mem::replace(
                &mut self.segments[index],
                PolyLine::straight(position, to),
            ),
            start: self.start,
        };
        if index == 0 {
            self.start = Some(position);
        }
        log::debug!("moved vertex {index} to {position}");
        self.publish_selection();

        if self.strategy.kind().is_scissors()
            && let Err(err) = self.launch_search(position, Pending::Move(previous.clone()))
        {
            previous.restore(&mut self.segments, &mut self.start);
            self.publish_selection();
            return Err(err);
        }
        Ok(())
    }

    /// Write the selected region of the image to `sink` as a PNG cropped to
    /// the polygon's bounding box, transparent outside the polygon.
    ///
    /// # Errors
    ///
    /// [`SelectionError::IllegalTransition`] unless `SELECTED`,
    /// [`SelectionError::EmptyInput`] if there is no outline to crop and
    /// [`SelectionError::ImageDecode`] if encoding or writing fails.
    pub fn save_selection<W: Write>(&self, sink: W) -> Result<(), SelectionError> {
        if !self.state.is_finished() {
            return Err(self.illegal("save the selection"));
        }
        let cropped =
            mask::crop_to_outline(&self.image, &self.outline()).ok_or(SelectionError::EmptyInput)?;
        log::debug!("saving {}x{} selection", cropped.width(), cropped.height());
        mask::write_png(&cropped, sink)
    }

    /// Switch strategy, keeping the committed path.
    ///
    /// A running search is cancelled with its pending segment. Switching to
    /// scissors while `SELECTING` starts a search from the last anchor.
    ///
    /// # Errors
    ///
    /// [`SelectionError::Io`] if a search thread cannot be started.
    pub fn set_strategy(&mut self, kind: StrategyKind) -> Result<(), SelectionError> {
        if kind == self.strategy.kind() {
            return Ok(());
        }
        if self.state == SelectionState::Processing {
            self.abandon_search();
        }
        log::debug!("strategy {} -> {kind}", self.strategy.kind());
        self.strategy = Strategy::new(kind, &self.image);
        self.config.strategy = kind;
        if self.state == SelectionState::Selecting {
            self.resume_search()?;
        }
        Ok(())
    }

    /// Replace the source image. The selection is reset.
    pub fn set_image(&mut self, image: RgbaImage) {
        self.reset();
        self.strategy = Strategy::new(self.strategy.kind(), &image);
        self.image = image;
    }

    /// Handle whatever the background search has sent, without blocking.
    ///
    /// # Errors
    ///
    /// Returns the error of a search that failed. What was waiting on it
    /// is rolled back as by [`cancel_processing`](Self::cancel_processing).
    pub fn poll(&mut self) -> Result<(), SelectionError> {
        while let Some(message) = self.next_message(false) {
            self.handle_message(message)?;
        }
        Ok(())
    }

    /// Block until no search is running.
    ///
    /// # Errors
    ///
    /// As [`poll`](Self::poll).
    pub fn wait_idle(&mut self) -> Result<(), SelectionError> {
        while self.state.is_processing() {
            match self.next_message(true) {
                Some(message) => self.handle_message(message)?,
                None => {
                    log::warn!("search ended without a result");
                    self.abandon_search();
                }
            }
        }
        Ok(())
    }

    fn illegal(&self, operation: &'static str) -> SelectionError {
        SelectionError::IllegalTransition {
            operation,
            state: self.state,
        }
    }

    fn check_bounds(&self, point: Point) -> Result<(), SelectionError> {
        let dimensions = self.dimensions();
        if dimensions.contains(point) {
            Ok(())
        } else {
            Err(SelectionError::OutOfBounds { point, dimensions })
        }
    }

    fn set_state(&mut self, state: SelectionState) {
        if self.state != state {
            log::debug!("{} -> {state}", self.state);
            self.state = state;
            self.events.publish(&SelectionEvent::State(state));
        }
    }

    fn publish_selection(&mut self) {
        let segments = &self.segments;
        self.events
            .publish_with(Topic::Selection, || SelectionEvent::Selection(segments.clone()));
    }

    /// Cancel any running search. Returns what was waiting on it.
    fn stop_search(&mut self) -> Pending {
        match &mut self.strategy {
            Strategy::Scissors(scissors) => scissors.stop_search(),
            Strategy::PointToPoint => Pending::Nothing,
        }
    }

    /// Undo what was waiting on a search that will not finish. Returns the
    /// state to go back to.
    fn roll_back(&mut self, pending: Pending) -> SelectionState {
        match pending {
            Pending::Nothing => SelectionState::Selecting,
            Pending::Segment => {
                self.segments.pop();
                self.publish_selection();
                SelectionState::Selecting
            }
            Pending::Move(previous) => {
                previous.restore(&mut self.segments, &mut self.start);
                self.publish_selection();
                SelectionState::Selected
            }
        }
    }

    /// Cancel the running search and roll back what was waiting on it.
    fn abandon_search(&mut self) {
        let pending = self.stop_search();
        let state = self.roll_back(pending);
        log::debug!("search abandoned");
        self.set_state(state);
    }

    /// Trace both segments around a moved vertex from `paths`.
    fn retrace_move(&mut self, index: usize, paths: &ShortestPaths) {
        let len = self.segments.len();
        let before = (index + len - 1) % len;
        let from = self.segments[before].start();
        let to = self.segments[index].end();
        self.segments[before] = route(paths, from).reversed();
        self.segments[index] = route(paths, to);
        self.publish_selection();
    }

    /// Remove the last segment, or reset when only the start is left.
    fn pop_segment(&mut self) -> Result<(), SelectionError> {
        if self.segments.pop().is_none() {
            self.reset();
            return Ok(());
        }
        self.publish_selection();
        self.set_state(SelectionState::Selecting);
        self.resume_search()
    }

    /// In scissors mode, search from the last anchor unless the latest map
    /// is already rooted there.
    fn resume_search(&mut self) -> Result<(), SelectionError> {
        let Some(anchor) = self.last_point() else {
            return Ok(());
        };
        let stale = match &self.strategy {
            Strategy::Scissors(scissors) => scissors.paths_from(anchor).is_none(),
            Strategy::PointToPoint => false,
        };
        if stale {
            self.launch_search(anchor, Pending::Nothing)
        } else {
            Ok(())
        }
    }

    /// Start a background search from `seed`, superseding any running one.
    fn launch_search(&mut self, seed: Point, pending: Pending) -> Result<(), SelectionError> {
        let Strategy::Scissors(scissors) = &mut self.strategy else {
            return Ok(());
        };
        scissors.stop_search();
        self.generation += 1;
        let task = SearchTask::spawn(SearchRequest {
            cost: Arc::clone(&scissors.cost),
            seed,
            window: self.config.search_window(),
            progress_step: self.config.progress_granularity,
            generation: self.generation,
        })?;
        scissors.task = Some(task);
        scissors.pending = pending;
        self.set_state(SelectionState::Processing);
        Ok(())
    }

    fn next_message(&self, block: bool) -> Option<SearchMessage> {
        let Strategy::Scissors(ScissorsState {
            task: Some(task), ..
        }) = &self.strategy
        else {
            return None;
        };
        if block {
            task.wait_message()
        } else {
            task.try_message()
        }
    }

    fn handle_message(&mut self, message: SearchMessage) -> Result<(), SelectionError> {
        let Strategy::Scissors(scissors) = &mut self.strategy else {
            return Ok(());
        };
        let current = scissors.task.as_ref().map(SearchTask::generation);
        match message {
            SearchMessage::Progress {
                generation,
                percent,
            } => {
                if current == Some(generation) {
                    self.events.publish(&SelectionEvent::Progress(percent));
                }
                Ok(())
            }
            SearchMessage::Finished { generation, result } => {
                if current != Some(generation) {
                    log::trace!("ignoring result of superseded search {generation}");
                    return Ok(());
                }
                scissors.task = None;
                let pending = std::mem::take(&mut scissors.pending);
                match result {
                    Ok(paths) => {
                        log::debug!(
                            "search {generation} from {} settled {} pixels",
                            paths.seed(),
                            paths.settled_len()
                        );
                        let paths = Arc::new(paths);
                        scissors.paths = Some(Arc::clone(&paths));
                        let state = if let Pending::Move(previous) = pending {
                            self.retrace_move(previous.index, &paths);
                            SelectionState::Selected
                        } else {
                            SelectionState::Selecting
                        };
                        self.set_state(state);
                        Ok(())
                    }
                    Err(err) => {
                        log::warn!("search {generation} failed: {err}");
                        let state = self.roll_back(pending);
                        self.set_state(state);
                        Err(err)
                    }
                }
            }
        }
    }
}
