//! End-to-end selection sessions driven through the public API.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use image::Rgba;
use scissors_select::{
    CancelToken, CostKind, CostModel, Point, PolyLine, RgbaImage, SelectionEvent, SelectionModel,
    SelectionState, SelectorConfig, StrategyKind, Topic, shortest_paths,
};

fn flat(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([90, 90, 90, 255]))
}

fn scissors(image: RgbaImage, search_radius: Option<u32>) -> SelectionModel {
    SelectionModel::new(
        image,
        SelectorConfig {
            strategy: StrategyKind::Scissors(CostKind::CrossGradMono),
            search_radius,
            ..SelectorConfig::default()
        },
    )
}

fn assert_closed(segments: &[PolyLine]) {
    for (i, segment) in segments.iter().enumerate() {
        let next = &segments[(i + 1) % segments.len()];
        assert_eq!(segment.end(), next.start(), "gap after segment {i}");
    }
}

#[test]
fn straight_triangle_closes_back_to_the_start() {
    let mut model = SelectionModel::new(flat(20, 20), SelectorConfig::default());
    for p in [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10)] {
        model.add_point(p).unwrap();
    }
    model.finish_selection().unwrap();

    assert_eq!(model.state(), SelectionState::Selected);
    assert_eq!(model.segments().len(), 3);
    assert_eq!(
        model.segments()[2],
        PolyLine::straight(Point::new(10, 10), Point::new(0, 0))
    );
    assert_closed(model.segments());
}

#[test]
fn flat_image_costs_follow_chebyshev_distance() {
    let img = flat(5, 5);
    let cost = CostModel::new(CostKind::CrossGradMono, &img);
    for seed in [
        Point::new(0, 0),
        Point::new(2, 2),
        Point::new(4, 1),
        Point::new(1, 4),
    ] {
        let paths = shortest_paths(&cost, seed, None, &CancelToken::new(), |_| {}).unwrap();
        for y in 0..5 {
            for x in 0..5 {
                let p = Point::new(x, y);
                let hops = seed.chebyshev(p);
                assert_eq!(
                    paths.cost_to(p),
                    Some(u64::from(hops) * 255),
                    "{seed} -> {p}"
                );
                assert_eq!(
                    paths.trace_path(p).unwrap().len(),
                    usize::try_from(hops).unwrap() + 1,
                    "{seed} -> {p}"
                );
            }
        }

        // Ties resolve the same way every time.
        let again = shortest_paths(&cost, seed, None, &CancelToken::new(), |_| {}).unwrap();
        let target = Point::new(4 - seed.x, 4 - seed.y);
        assert_eq!(
            paths.trace_path(target).unwrap(),
            again.trace_path(target).unwrap()
        );
    }
}

#[test]
fn undo_reopens_a_finished_selection() {
    let mut model = SelectionModel::new(flat(20, 20), SelectorConfig::default());
    for p in [Point::new(0, 0), Point::new(10, 0), Point::new(10, 10)] {
        model.add_point(p).unwrap();
    }
    model.finish_selection().unwrap();

    model.undo().unwrap();
    assert_eq!(model.state(), SelectionState::Selecting);
    assert_eq!(model.segments().len(), 2);
    assert_ne!(model.last_point(), model.start());
}

#[test]
fn cancelling_keeps_the_previous_map() {
    // Large enough that the second search is still pending when cancelled.
    let mut model = scissors(flat(300, 300), None);
    model.add_point(Point::new(10, 10)).unwrap();
    model.wait_idle().unwrap();
    let before = model.live_wire(Point::new(20, 14)).unwrap();

    model.add_point(Point::new(200, 200)).unwrap();
    assert_eq!(model.state(), SelectionState::Processing);
    assert_eq!(model.segments().len(), 1);

    model.cancel_processing().unwrap();
    assert_eq!(model.state(), SelectionState::Selecting);
    assert!(model.segments().is_empty());
    assert_eq!(model.last_point(), Some(Point::new(10, 10)));

    let after = model.live_wire(Point::new(20, 14)).unwrap();
    assert_eq!(after, before);
    assert_eq!(after.len(), 11);
}

#[test]
fn live_wire_is_idempotent() {
    let img = RgbaImage::from_fn(16, 16, |x, y| {
        let v = u8::try_from((x * 13 + y * 7) % 256).unwrap();
        Rgba([v, 255 - v, v / 2, 255])
    });
    let mut model = scissors(img, Some(8));
    model.add_point(Point::new(8, 8)).unwrap();
    model.wait_idle().unwrap();

    for cursor in [Point::new(2, 3), Point::new(15, 15), Point::new(8, 8)] {
        let first = model.live_wire(cursor).unwrap();
        assert_eq!(first, model.live_wire(cursor).unwrap());
        assert_eq!(first.start(), Point::new(8, 8));
        assert_eq!(first.end(), cursor);
    }
}

#[test]
fn cursor_outside_the_window_gets_a_straight_tail() {
    let mut model = scissors(flat(40, 40), Some(4));
    model.add_point(Point::new(5, 5)).unwrap();
    model.wait_idle().unwrap();

    let wire = model.live_wire(Point::new(30, 5)).unwrap();
    let points = wire.points();
    assert_eq!(wire.end(), Point::new(30, 5));
    // The traced part stays inside the window.
    assert_eq!(points[points.len() - 2], Point::new(9, 5));
}

#[test]
fn every_reachable_finish_is_closed() {
    let img = RgbaImage::from_fn(24, 24, |x, y| {
        if (6..18).contains(&x) && (6..18).contains(&y) {
            Rgba([230, 230, 230, 255])
        } else {
            Rgba([20, 20, 20, 255])
        }
    });
    for strategy in StrategyKind::ALL {
        let mut model = SelectionModel::new(
            img.clone(),
            SelectorConfig {
                strategy,
                search_radius: Some(10),
                ..SelectorConfig::default()
            },
        );
        for p in [
            Point::new(6, 6),
            Point::new(17, 6),
            Point::new(17, 17),
            Point::new(6, 17),
        ] {
            model.add_point(p).unwrap();
            model.wait_idle().unwrap();
        }
        model.finish_selection().unwrap();
        assert_closed(model.segments());

        model.move_point(2, Point::new(20, 20)).unwrap();
        assert_closed(model.segments());
        model.wait_idle().unwrap();
        assert_eq!(model.state(), SelectionState::Selected, "{strategy}");
        assert_closed(model.segments());
        model.undo().unwrap();
        model.wait_idle().unwrap();
        model.finish_selection().unwrap();
        assert_eq!(model.state(), SelectionState::Selected, "{strategy}");
        assert_closed(model.segments());

        let mut png = Vec::new();
        model.save_selection(&mut png).unwrap();
        assert!(!png.is_empty());
    }
}

#[test]
fn progress_is_reported_while_processing() {
    let mut model = scissors(flat(64, 64), None);
    let progress = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress);
    model.subscribe(Topic::Progress, move |event| {
        if let SelectionEvent::Progress(percent) = event {
            sink.lock().unwrap().push(*percent);
        }
    });

    model.add_point(Point::new(32, 32)).unwrap();
    model.wait_idle().unwrap();

    let progress = progress.lock().unwrap();
    assert!(!progress.is_empty());
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(progress.last(), Some(&100));
}
