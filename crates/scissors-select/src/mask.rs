//! Polygon mask: cut the selected region out of the source raster.
//!
//! The closed outline is filled into a binary mask covering the outline's
//! bounding box. Pixels inside (or on) the outline keep their colour; all
//! others become fully transparent. The result is written as an RGBA PNG.

use std::io::Write;

use image::{GrayImage, ImageEncoder, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};

use crate::types::{Point, SelectionError};

/// Inclusive bounding box of a non-empty outline.
fn bounding_box(outline: &[Point]) -> Option<(Point, Point)> {
    let first = *outline.first()?;
    Some(outline.iter().fold((first, first), |(lo, hi), p| {
        (
            Point::new(lo.x.min(p.x), lo.y.min(p.y)),
            Point::new(hi.x.max(p.x), hi.y.max(p.y)),
        )
    }))
}

/// Drop consecutive repeats and a trailing repeat of the first vertex.
fn distinct_ring(outline: &[Point]) -> Vec<imageproc::point::Point<i32>> {
    let mut ring: Vec<imageproc::point::Point<i32>> = Vec::with_capacity(outline.len());
    for p in outline {
        let q = imageproc::point::Point::new(p.x, p.y);
        if ring.last() != Some(&q) {
            ring.push(q);
        }
    }
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Rasterise a closed outline into a mask whose origin is `origin`.
///
/// Mask pixels are 255 inside or on the outline and 0 elsewhere.
#[must_use = "returns the rendered mask"]
pub fn polygon_mask(outline: &[Point], origin: Point, width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let local: Vec<Point> = outline
        .iter()
        .map(|p| Point::new(p.x - origin.x, p.y - origin.y))
        .collect();
    let ring = distinct_ring(&local);

    #[allow(clippy::cast_precision_loss)]
    let as_f32 = |p: imageproc::point::Point<i32>| (p.x as f32, p.y as f32);

    match ring.as_slice() {
        [] => {}
        [only] => {
            if let (Ok(x), Ok(y)) = (u32::try_from(only.x), u32::try_from(only.y))
                && x < width
                && y < height
            {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        [a, b] => draw_line_segment_mut(&mut mask, as_f32(*a), as_f32(*b), Luma([255])),
        _ => {
            draw_polygon_mut(&mut mask, &ring, Luma([255]));
            // Make sure the outline itself is part of the mask.
            for (i, a) in ring.iter().enumerate() {
                let b = ring[(i + 1) % ring.len()];
                draw_line_segment_mut(&mut mask, as_f32(*a), as_f32(b), Luma([255]));
            }
        }
    }
    mask
}

/// Crop `image` to the outline's bounding box, clearing pixels outside it.
///
/// Returns `None` for an empty outline.
#[must_use = "returns the cropped selection"]
pub fn crop_to_outline(image: &RgbaImage, outline: &[Point]) -> Option<RgbaImage> {
    let (lo, hi) = bounding_box(outline)?;
    let max_x = i32::try_from(image.width()).unwrap_or(i32::MAX) - 1;
    let max_y = i32::try_from(image.height()).unwrap_or(i32::MAX) - 1;
    let lo = Point::new(lo.x.clamp(0, max_x), lo.y.clamp(0, max_y));
    let hi = Point::new(hi.x.clamp(0, max_x), hi.y.clamp(0, max_y));

    let x0 = u32::try_from(lo.x).ok()?;
    let y0 = u32::try_from(lo.y).ok()?;
    let width = u32::try_from(hi.x - lo.x + 1).ok()?;
    let height = u32::try_from(hi.y - lo.y + 1).ok()?;

    let mask = polygon_mask(outline, lo, width, height);
    Some(RgbaImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y).0[0] > 0 {
            *image.get_pixel(x0 + x, y0 + y)
        } else {
            Rgba([0, 0, 0, 0])
        }
    }))
}

/// Encode `image` as PNG into `sink`.
///
/// # Errors
///
/// Returns [`SelectionError::ImageDecode`] if encoding or writing fails.
pub fn write_png<W: Write>(image: &RgbaImage, sink: W) -> Result<(), SelectionError> {
    image::codecs::png::PngEncoder::new(sink).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(2, 2),
            Point::new(7, 2),
            Point::new(7, 7),
            Point::new(2, 7),
            Point::new(2, 2),
        ]
    }

    #[test]
    fn bounding_box_of_outline() {
        assert_eq!(bounding_box(&[]), None);
        assert_eq!(
            bounding_box(&square()),
            Some((Point::new(2, 2), Point::new(7, 7)))
        );
    }

    #[test]
    fn ring_drops_duplicates_and_closing_vertex() {
        let ring = distinct_ring(&[
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(3, 0),
            Point::new(3, 3),
            Point::new(0, 0),
        ]);
        assert_eq!(ring.len(), 3);
        assert_ne!(ring.first(), ring.last());
    }

    #[test]
    fn crop_keeps_inside_and_clears_outside() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([200, 100, 50, 255]));
        let triangle = vec![Point::new(0, 0), Point::new(9, 0), Point::new(0, 9)];
        let cropped = crop_to_outline(&img, &triangle).unwrap();
        assert_eq!(cropped.dimensions(), (10, 10));
        // Inside the triangle and on its corner.
        assert_eq!(*cropped.get_pixel(1, 1), Rgba([200, 100, 50, 255]));
        assert_eq!(*cropped.get_pixel(0, 0), Rgba([200, 100, 50, 255]));
        // Opposite corner is outside.
        assert_eq!(cropped.get_pixel(9, 9).0[3], 0);
    }

    #[test]
    fn crop_is_relative_to_bounding_box() {
        let img = RgbaImage::from_fn(10, 10, |x, y| {
            Rgba([u8::try_from(x).unwrap(), u8::try_from(y).unwrap(), 0, 255])
        });
        let cropped = crop_to_outline(&img, &square()).unwrap();
        assert_eq!(cropped.dimensions(), (6, 6));
        assert_eq!(*cropped.get_pixel(0, 0), Rgba([2, 2, 0, 255]));
        assert_eq!(*cropped.get_pixel(3, 3), Rgba([5, 5, 0, 255]));
    }

    #[test]
    fn empty_outline_has_no_crop() {
        let img = RgbaImage::new(4, 4);
        assert!(crop_to_outline(&img, &[]).is_none());
    }

    #[test]
    fn png_output_decodes() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let mut buf = Vec::new();
        write_png(&img, &mut buf).unwrap();
        let decoded = image::load_from_memory(&buf).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw(), img.as_raw());
    }
}
