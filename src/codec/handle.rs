//! Decoded image handle.
//!
//! [`Image`] owns a decoded [`DynamicImage`] plus what the encoder needs
//! from the source: its format, its EXIF orientation and its raw EXIF
//! segment. Transforms mutate the handle in place; [`Image::save`]
//! encodes it once at the end.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use tracing::debug;

use crate::error::ImageError;

use super::jpeg;
use super::options::{
    Background, Degree, OutputFormat, Position, Rect, ResizeMode, ResizeParams, RotateParams,
    SaveParams, WatermarkParams,
};
use super::watermark::{self, WatermarkFont};

/// A decoded image and its source metadata.
pub struct Image {
    img: DynamicImage,
    format: Option<OutputFormat>,
    orientation: Orientation,
    exif: Option<Vec<u8>>,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.img.width())
            .field("height", &self.img.height())
            .field("format", &self.format)
            .field("orientation", &self.orientation)
            .field("exif", &self.exif.as_ref().map(Vec::len))
            .finish()
    }
}

impl Image {
    /// Decode `data`, guessing its format from the content.
    pub fn decode(data: &[u8]) -> Result<Self, ImageError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ImageError::Decode(e.to_string()))?;

        let source_format = reader.format();
        let mut decoder = reader
            .into_decoder()
            .map_err(|e| ImageError::Decode(e.to_string()))?;
        let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
        let img = DynamicImage::from_decoder(decoder)
            .map_err(|e| ImageError::Decode(e.to_string()))?;

        let exif = match source_format {
            Some(ImageFormat::Jpeg) => jpeg::exif_segment(data).map(<[u8]>::to_vec),
            _ => None,
        };

        Ok(Self {
            img,
            format: source_format.and_then(OutputFormat::from_image_format),
            orientation,
            exif,
        })
    }

    /// Wrap an already decoded image.
    pub fn from_dynamic(img: DynamicImage, format: Option<OutputFormat>) -> Self {
        Self {
            img,
            format,
            orientation: Orientation::NoTransforms,
            exif: None,
        }
    }

    /// Source format, when it is one we can encode.
    pub fn format(&self) -> Option<OutputFormat> {
        self.format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.img.width(), self.img.height())
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.img
    }

    // =========================================================================
    // Transforms
    // =========================================================================

    /// Resize into the requested box according to `params.mode`.
    ///
    /// A missing (or zero) dimension is derived from the source aspect
    /// ratio; with neither, the image is left alone. A derived side larger
    /// than `max_width`/`max_height` fails before any pixel is allocated.
    pub fn resize(&mut self, params: &ResizeParams) -> Result<(), ImageError> {
        let (src_w, src_h) = self.dimensions();
        let Some((width, height)) = target_box(src_w, src_h, params.width, params.height) else {
            return Ok(());
        };
        if width > params.max_width || height > params.max_height {
            return Err(ImageError::TooLarge { width, height });
        }
        let filter = params.filter.filter_type();

        let mode = match params.mode {
            ResizeMode::Adapt => {
                let src_ratio = src_w as f64 / src_h as f64;
                let dst_ratio = width as f64 / height as f64;
                let retained = src_ratio.min(dst_ratio) / src_ratio.max(dst_ratio) * 100.0;
                if retained >= params.retain.0 as f64 {
                    ResizeMode::Crop
                } else {
                    ResizeMode::Fill
                }
            }
            mode => mode,
        };

        debug!(
            src_width = src_w,
            src_height = src_h,
            width = width,
            height = height,
            mode = ?mode,
            "Resizing image"
        );

        self.img = match mode {
            ResizeMode::Scale => self.img.resize_exact(width, height, filter),
            ResizeMode::Clip => {
                if src_w <= width && src_h <= height {
                    return Ok(());
                }
                self.img.resize(width, height, filter)
            }
            // Crop the source to the box's aspect ratio, then scale: the
            // intermediate never exceeds the source or the box
            ResizeMode::Crop => {
                let scale = f64::max(width as f64 / src_w as f64, height as f64 / src_h as f64);
                let crop_w = ((width as f64 / scale).round() as u32).clamp(1, src_w);
                let crop_h = ((height as f64 / scale).round() as u32).clamp(1, src_h);
                let (x, y) = params.position.offset(src_w - crop_w, src_h - crop_h);
                self.img
                    .crop_imm(x, y, crop_w, crop_h)
                    .resize_exact(width, height, filter)
            }
            // Adapt has been resolved to Crop or Fill above
            ResizeMode::Fill | ResizeMode::Adapt => {
                let fitted = self.img.resize(width, height, filter);
                pad(&fitted, width, height, params.position, params.background)
            }
        };
        Ok(())
    }

    /// Rotate counter-clockwise, or apply the EXIF orientation for `auto`.
    pub fn rotate(&mut self, params: &RotateParams) {
        let degrees = match params.degree {
            Degree::Auto => {
                let orientation = std::mem::replace(&mut self.orientation, Orientation::NoTransforms);
                self.img.apply_orientation(orientation);
                return;
            }
            Degree::Angle(deg) => deg,
        };

        self.img = match degrees {
            0 => return,
            180 => self.img.rotate180(),
            // image's quarter turns are clockwise
            90 if params.expand => self.img.rotate270(),
            270 if params.expand => self.img.rotate90(),
            _ => DynamicImage::ImageRgba8(rotate_ccw(
                &self.img.to_rgba8(),
                degrees as f32,
                params.expand,
            )),
        };
    }

    /// Crop to `rect`, clipped to the image bounds.
    pub fn region(&mut self, rect: &Rect) -> Result<(), ImageError> {
        let (width, height) = self.dimensions();
        if rect.x >= width || rect.y >= height {
            return Err(ImageError::invalid(
                "rectangle",
                format!(
                    "region {},{} lies outside a {}x{} image",
                    rect.x, rect.y, width, height
                ),
            ));
        }

        let w = rect.width.min(width - rect.x);
        let h = rect.height.min(height - rect.y);
        self.img = self.img.crop_imm(rect.x, rect.y, w, h);
        Ok(())
    }

    /// Draw the watermark image (already fetched as `mark`) and then the
    /// watermark text.
    pub fn watermark(
        &mut self,
        params: &WatermarkParams,
        mark: Option<&[u8]>,
        font: Option<&WatermarkFont>,
    ) -> Result<(), ImageError> {
        if let Some(data) = mark {
            let layer = watermark::prepare_mark(data, self.img.width(), params.image_ratio)?;
            watermark::composite(&mut self.img, &layer, params.position);
        }

        if let Some(text) = params.text.as_deref() {
            let font = font.ok_or_else(|| {
                ImageError::Watermark("no font configured for text watermarks".to_string())
            })?;
            let layer = watermark::render_text(font, text, params.text_size, params.text_color)?;
            watermark::composite(&mut self.img, &layer, params.position);
        }

        Ok(())
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encode with `params`, returning the bytes and the format written.
    pub fn save(&self, params: &SaveParams) -> Result<(Vec<u8>, OutputFormat), ImageError> {
        let format = params
            .format
            .or(self.format)
            .unwrap_or(OutputFormat::Jpeg);
        let mut out = Cursor::new(Vec::new());
        let encode_err = |e: image::ImageError| ImageError::Encode(e.to_string());

        match format {
            OutputFormat::Jpeg => {
                let rgb = flatten(&self.img, params.background);
                JpegEncoder::new_with_quality(&mut out, params.quality.0)
                    .encode_image(&rgb)
                    .map_err(encode_err)?;
            }
            OutputFormat::Png => {
                let compression = if params.optimize {
                    CompressionType::Best
                } else {
                    CompressionType::Default
                };
                let encoder = PngEncoder::new_with_quality(&mut out, compression, PngFilter::Adaptive);
                self.img.write_with_encoder(encoder).map_err(encode_err)?;
            }
            OutputFormat::Webp => {
                let img = if self.img.color().has_alpha() {
                    DynamicImage::ImageRgba8(self.img.to_rgba8())
                } else {
                    DynamicImage::ImageRgb8(self.img.to_rgb8())
                };
                img.write_with_encoder(WebPEncoder::new_lossless(&mut out))
                    .map_err(encode_err)?;
            }
            OutputFormat::Gif | OutputFormat::Tiff => {
                DynamicImage::ImageRgba8(self.img.to_rgba8())
                    .write_to(&mut out, format.image_format())
                    .map_err(encode_err)?;
            }
        }

        let mut data = out.into_inner();
        if format == OutputFormat::Jpeg && params.preserve_exif {
            if let Some(segment) = &self.exif {
                data = jpeg::insert_segment(data, segment);
            }
        }

        Ok((data, format))
    }
}

/// Resolve the target box, deriving a missing side from the aspect ratio.
fn target_box(src_w: u32, src_h: u32, width: Option<u32>, height: Option<u32>) -> Option<(u32, u32)> {
    let width = width.filter(|w| *w > 0);
    let height = height.filter(|h| *h > 0);
    let derive = |given: u32, num: u32, den: u32| {
        ((given as f64 * num as f64 / den.max(1) as f64).round() as u32).max(1)
    };

    match (width, height) {
        (Some(w), Some(h)) => Some((w, h)),
        (Some(w), None) => Some((w, derive(w, src_h, src_w))),
        (None, Some(h)) => Some((derive(h, src_w, src_h), h)),
        (None, None) => None,
    }
}

/// Centre (or anchor) `img` on a `width`x`height` canvas of `background`.
fn pad(img: &DynamicImage, width: u32, height: u32, position: Position, background: Background) -> DynamicImage {
    let mut canvas = RgbaImage::from_pixel(width, height, background.0);
    let (x, y) = position.offset(
        width.saturating_sub(img.width()),
        height.saturating_sub(img.height()),
    );
    image::imageops::overlay(&mut canvas, &img.to_rgba8(), x as i64, y as i64);
    DynamicImage::ImageRgba8(canvas)
}

/// Drop the alpha channel by blending onto `background`.
fn flatten(img: &DynamicImage, background: Background) -> image::RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let Rgba([br, bg, bb, _]) = background.0;
    let mut canvas = RgbaImage::from_pixel(img.width(), img.height(), Rgba([br, bg, bb, 255]));
    image::imageops::overlay(&mut canvas, &img.to_rgba8(), 0, 0);
    DynamicImage::ImageRgba8(canvas).to_rgb8()
}

/// Rotate by `degrees` counter-clockwise about the centre with bilinear
/// sampling. Uncovered pixels are transparent.
fn rotate_ccw(src: &RgbaImage, degrees: f32, expand: bool) -> RgbaImage {
    let radians = degrees.to_radians();
    let (sin, cos) = radians.sin_cos();

    let src_w = src.width() as f32;
    let src_h = src.height() as f32;

    let (dst_w, dst_h) = if expand {
        (
            ((src_w * cos.abs() + src_h * sin.abs()).round() as u32).max(1),
            ((src_w * sin.abs() + src_h * cos.abs()).round() as u32).max(1),
        )
    } else {
        (src.width(), src.height())
    };

    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = dst_w as f32 / 2.0;
    let dst_cy = dst_h as f32 / 2.0;
    let max_x = src.width().saturating_sub(1);
    let max_y = src.height().saturating_sub(1);

    let mut out = RgbaImage::new(dst_w, dst_h);
    for (dx, dy, pixel) in out.enumerate_pixels_mut() {
        // Sample at pixel centres; map destination back into the source
        let rx = dx as f32 + 0.5 - dst_cx;
        let ry = dy as f32 + 0.5 - dst_cy;
        let sx = rx * cos - ry * sin + src_cx - 0.5;
        let sy = rx * sin + ry * cos + src_cy - 0.5;

        if sx < -0.5 || sy < -0.5 || sx > src_w - 0.5 || sy > src_h - 0.5 {
            continue;
        }

        let sx = sx.max(0.0);
        let sy = sy.max(0.0);
        let x0 = (sx.floor() as u32).min(max_x);
        let y0 = (sy.floor() as u32).min(max_y);
        let x1 = (x0 + 1).min(max_x);
        let y1 = (y0 + 1).min(max_y);
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let p00 = src.get_pixel(x0, y0);
        let p10 = src.get_pixel(x1, y0);
        let p01 = src.get_pixel(x0, y1);
        let p11 = src.get_pixel(x1, y1);

        let channel = |c: usize| -> u8 {
            let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
                + p10[c] as f32 * fx * (1.0 - fy)
                + p01[c] as f32 * (1.0 - fx) * fy
                + p11[c] as f32 * fx * fy;
            v.round().clamp(0.0, 255.0) as u8
        };

        *pixel = Rgba([channel(0), channel(1), channel(2), channel(3)]);
    }

    out
}
