//! Watermark rendering and compositing.
//!
//! Text is rasterised with `ab_glyph` onto a transparent canvas; image
//! marks are decoded and scaled relative to the target width. Either layer
//! is then anchored on the 3x3 position grid and alpha-blended over the
//! target.

use std::path::Path;
use std::sync::Arc;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};

use crate::error::ImageError;

use super::options::Position;

/// Font used to draw text watermarks, shared by every request.
#[derive(Clone)]
pub struct WatermarkFont(Arc<FontVec>);

impl std::fmt::Debug for WatermarkFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkFont")
            .field("glyphs", &self.0.glyph_count())
            .finish()
    }
}

impl WatermarkFont {
    /// Parse a TrueType/OpenType font from memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ImageError> {
        FontVec::try_from_vec(data)
            .map(|font| WatermarkFont(Arc::new(font)))
            .map_err(|e| ImageError::Watermark(format!("invalid font: {}", e)))
    }

    /// Load a font file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ImageError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            ImageError::Watermark(format!("cannot read font {}: {}", path.display(), e))
        })?;
        Self::from_bytes(data)
    }
}

/// Rasterise `text` in `color` at `size` pixels.
pub fn render_text(
    font: &WatermarkFont,
    text: &str,
    size: f32,
    color: Rgba<u8>,
) -> Result<RgbaImage, ImageError> {
    if text.is_empty() {
        return Err(ImageError::Watermark("cannot render empty text".to_string()));
    }

    let font = font.0.as_ref();
    let scale = PxScale::from(size);
    let scaled = font.as_scaled(scale);

    // First pass: measure
    let mut width = 0.0f32;
    let mut prev = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            width += scaled.kern(prev, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }
    let height = scaled.height().ceil();

    let canvas_w = (width.ceil() as u32).max(1);
    let canvas_h = (height as u32).max(1);
    let mut canvas = RgbaImage::new(canvas_w, canvas_h);

    // Second pass: draw
    let mut cursor = 0.0f32;
    let mut prev = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(prev) = prev {
            cursor += scaled.kern(prev, id);
        }

        let glyph = id.with_scale_and_position(scale, ab_glyph::point(cursor, scaled.ascent()));
        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;
                if x < 0 || y < 0 || x >= canvas_w as i32 || y >= canvas_h as i32 {
                    return;
                }

                let alpha = (coverage.clamp(0.0, 1.0) * color[3] as f32) as u8;
                let pixel = canvas.get_pixel_mut(x as u32, y as u32);
                // Overlapping glyph edges keep the stronger coverage
                if alpha > pixel[3] {
                    *pixel = Rgba([color[0], color[1], color[2], alpha]);
                }
            });
        }

        cursor += scaled.h_advance(id);
        prev = Some(id);
    }

    Ok(canvas)
}

/// Decode a watermark image and scale it to `ratio` of `target_width`.
pub fn prepare_mark(data: &[u8], target_width: u32, ratio: f32) -> Result<RgbaImage, ImageError> {
    let mark = image::load_from_memory(data)
        .map_err(|e| ImageError::Watermark(format!("cannot decode watermark: {}", e)))?;

    let width = ((target_width as f32 * ratio).round() as u32).max(1);
    let height = ((mark.height() as f64 * width as f64 / mark.width().max(1) as f64).round()
        as u32)
        .max(1);

    Ok(mark.resize_exact(width, height, FilterType::Lanczos3).to_rgba8())
}

/// Alpha-blend `layer` over `target` at `position`.
///
/// Layers larger than the target are clipped at the target's edges.
pub fn composite(target: &mut DynamicImage, layer: &RgbaImage, position: Position) {
    let free_x = target.width().saturating_sub(layer.width());
    let free_y = target.height().saturating_sub(layer.height());
    let (x, y) = position.offset(free_x, free_y);

    let mut canvas = target.to_rgba8();
    imageops::overlay(&mut canvas, layer, x as i64, y as i64);

    *target = if target.color().has_alpha() {
        DynamicImage::ImageRgba8(canvas)
    } else {
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8())
    };
}
