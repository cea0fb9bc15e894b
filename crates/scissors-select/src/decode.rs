//! Image decoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces the RGBA
//! raster a [`SelectionModel`](crate::SelectionModel) selects from.

use image::RgbaImage;

use crate::types::SelectionError;

/// Decode raw image bytes into an RGBA raster.
///
/// # Errors
///
/// Returns [`SelectionError::EmptyInput`] if `bytes` is empty.
/// Returns [`SelectionError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, SelectionError> {
    if bytes.is_empty() {
        return Err(SelectionError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}
