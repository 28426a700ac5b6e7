//! Typed operation arguments and their string parsers.
//!
//! Every option travels as a string until validation, where it is parsed
//! into one of these types. Parse failures are
//! [`ImageError::InvalidOption`] naming the option.

use std::str::FromStr;

use image::imageops::FilterType;
use image::{ImageFormat, Rgba};

use crate::error::ImageError;

/// Default JPEG/WebP quality.
pub const DEFAULT_QUALITY: u8 = 90;

/// Default minimum percentage of the image `adapt` keeps before it fills.
pub const DEFAULT_RETAIN: u8 = 75;

/// Default text watermark size in pixels.
pub const DEFAULT_WATERMARK_TEXT_SIZE: f32 = 24.0;

/// Default width of an image watermark relative to the target width.
pub const DEFAULT_WATERMARK_IMAGE_RATIO: f32 = 0.25;

// =============================================================================
// Resize
// =============================================================================

/// How resize reconciles the requested box with the source aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Crop when enough of the image is retained, otherwise fill
    Adapt,
    /// Fit inside the box, never enlarging
    Clip,
    /// Cover the box, then crop the overflow at `position`
    #[default]
    Crop,
    /// Fit inside the box, then pad with `background`
    Fill,
    /// Stretch to the box, ignoring aspect ratio
    Scale,
}

impl FromStr for ResizeMode {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adapt" => Ok(ResizeMode::Adapt),
            "clip" => Ok(ResizeMode::Clip),
            "crop" => Ok(ResizeMode::Crop),
            "fill" => Ok(ResizeMode::Fill),
            "scale" => Ok(ResizeMode::Scale),
            other => Err(ImageError::invalid("mode", format!("unknown mode: {}", other))),
        }
    }
}

/// Resampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    Bicubic,
    #[default]
    Antialias,
}

impl ResizeFilter {
    pub fn filter_type(&self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::Bicubic => FilterType::CatmullRom,
            ResizeFilter::Antialias => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(ResizeFilter::Nearest),
            "bilinear" => Ok(ResizeFilter::Bilinear),
            "bicubic" => Ok(ResizeFilter::Bicubic),
            "antialias" => Ok(ResizeFilter::Antialias),
            other => Err(ImageError::invalid(
                "filter",
                format!("unknown filter: {}", other),
            )),
        }
    }
}

/// Anchor on a 3x3 grid, used for cropping, padding and watermarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Position {
    /// Offset of an inner box inside an outer one, given the free space
    /// along each axis.
    pub fn offset(&self, free_x: u32, free_y: u32) -> (u32, u32) {
        let (fx, fy) = match self {
            Position::TopLeft => (0, 0),
            Position::Top => (1, 0),
            Position::TopRight => (2, 0),
            Position::Left => (0, 1),
            Position::Center => (1, 1),
            Position::Right => (2, 1),
            Position::BottomLeft => (0, 2),
            Position::Bottom => (1, 2),
            Position::BottomRight => (2, 2),
        };
        (free_x * fx / 2, free_y * fy / 2)
    }

    fn parse_named(option: &'static str, s: &str) -> Result<Self, ImageError> {
        match s {
            "top-left" => Ok(Position::TopLeft),
            "top" => Ok(Position::Top),
            "top-right" => Ok(Position::TopRight),
            "left" => Ok(Position::Left),
            "center" => Ok(Position::Center),
            "right" => Ok(Position::Right),
            "bottom-left" => Ok(Position::BottomLeft),
            "bottom" => Ok(Position::Bottom),
            "bottom-right" => Ok(Position::BottomRight),
            other => Err(ImageError::invalid(
                option,
                format!("unknown position: {}", other),
            )),
        }
    }
}

impl FromStr for Position {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::parse_named("position", s)
    }
}

/// Hex colour in `RGB`, `ARGB`, `RRGGBB` or `AARRGGBB` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub Rgba<u8>);

impl Default for Background {
    fn default() -> Self {
        Background(Rgba([255, 255, 255, 255]))
    }
}

impl Background {
    fn parse_hex(option: &'static str, s: &str) -> Result<Self, ImageError> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        let invalid = || ImageError::invalid(option, format!("invalid color: {}", s));

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let digits: Vec<u8> = match hex.len() {
            3 | 4 => hex
                .chars()
                .map(|c| c.to_digit(16).map(|d| (d * 17) as u8))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?,
            6 | 8 => (0..hex.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
                .collect::<Option<Vec<_>>>()
                .ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };

        // Alpha leads when present (ARGB)
        let rgba = match digits.as_slice() {
            [r, g, b] => [*r, *g, *b, 255],
            [a, r, g, b] => [*r, *g, *b, *a],
            _ => return Err(invalid()),
        };
        Ok(Background(Rgba(rgba)))
    }
}

impl FromStr for Background {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Background::parse_hex("background", s)
    }
}

/// Percentage of the image `adapt` must retain to crop (1-99).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retain(pub u8);

impl Default for Retain {
    fn default() -> Self {
        Retain(DEFAULT_RETAIN)
    }
}

impl FromStr for Retain {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u8>() {
            Ok(value) if (1..=99).contains(&value) => Ok(Retain(value)),
            _ => Err(ImageError::invalid("retain", "retain must be 1-99")),
        }
    }
}

// =============================================================================
// Geometry arguments
// =============================================================================

/// Parse a `w`/`h` argument: a non-negative integer.
pub fn parse_dimension(s: &str) -> Option<u32> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Rotation angle in degrees counter-clockwise, or EXIF-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degree {
    /// Apply the source's EXIF orientation
    Auto,
    Angle(u16),
}

impl FromStr for Degree {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            return Ok(Degree::Auto);
        }
        match s.parse::<u16>() {
            Ok(deg) if deg < 360 => Ok(Degree::Angle(deg)),
            _ => Err(ImageError::invalid("degree", "degree must be 0-359 or auto")),
        }
    }
}

/// Rectangle `x,y,w,h` in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FromStr for Rect {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ImageError::invalid("rectangle", "rectangle must be x,y,w,h");
        let parts: Vec<u32> = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;

        match parts.as_slice() {
            [x, y, width, height] if *width > 0 && *height > 0 => Ok(Rect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            _ => Err(invalid()),
        }
    }
}

// =============================================================================
// Save
// =============================================================================

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
    Tiff,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
            OutputFormat::Gif => "gif",
            OutputFormat::Tiff => "tiff",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Webp => ImageFormat::WebP,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::Tiff => ImageFormat::Tiff,
        }
    }

    /// Map a decoded source format, if it is one we can write.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::WebP => Some(OutputFormat::Webp),
            ImageFormat::Gif => Some(OutputFormat::Gif),
            ImageFormat::Tiff => Some(OutputFormat::Tiff),
            _ => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::Webp),
            "gif" => Ok(OutputFormat::Gif),
            "tiff" => Ok(OutputFormat::Tiff),
            other => Err(ImageError::invalid(
                "format",
                format!("unsupported format: {}", other),
            )),
        }
    }
}

/// Encoder quality (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Default for Quality {
    fn default() -> Self {
        Quality(DEFAULT_QUALITY)
    }
}

impl FromStr for Quality {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u8>() {
            Ok(value) if (1..=100).contains(&value) => Ok(Quality(value)),
            _ => Err(ImageError::invalid("quality", "quality must be 1-100")),
        }
    }
}

/// Parse a boolean option given as `0`/`1` (or `false`/`true`).
pub fn parse_flag(option: &'static str, s: &str) -> Result<bool, ImageError> {
    match s {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ImageError::invalid(option, format!("{} must be 0 or 1", option))),
    }
}

// =============================================================================
// Watermark
// =============================================================================

/// Parse a watermark anchor (`watermark_pos`).
pub fn parse_watermark_position(s: &str) -> Result<Position, ImageError> {
    Position::parse_named("watermark_pos", s)
}

/// Parse a text watermark colour (`watermark_txt_color`).
pub fn parse_watermark_color(s: &str) -> Result<Rgba<u8>, ImageError> {
    Background::parse_hex("watermark_txt_color", s).map(|color| color.0)
}

/// Parse a text watermark pixel size (`watermark_txt_size`, 1-1000).
pub fn parse_watermark_text_size(s: &str) -> Result<f32, ImageError> {
    match s.parse::<u32>() {
        Ok(size) if (1..=1000).contains(&size) => Ok(size as f32),
        _ => Err(ImageError::invalid(
            "watermark_txt_size",
            "watermark_txt_size must be 1-1000",
        )),
    }
}

/// Parse an image watermark width ratio (`watermark_img_ratio`, in (0, 1]).
pub fn parse_watermark_ratio(s: &str) -> Result<f32, ImageError> {
    match s.parse::<f32>() {
        Ok(ratio) if ratio > 0.0 && ratio <= 1.0 => Ok(ratio),
        _ => Err(ImageError::invalid(
            "watermark_img_ratio",
            "watermark_img_ratio must be in (0, 1]",
        )),
    }
}

// =============================================================================
// Parameter sets
// =============================================================================

/// Fully parsed resize arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mode: ResizeMode,
    pub filter: ResizeFilter,
    pub position: Position,
    pub background: Background,
    pub retain: Retain,
    /// Upper bound for the (possibly derived) target width
    pub max_width: u32,
    /// Upper bound for the (possibly derived) target height
    pub max_height: u32,
}

/// Fully parsed rotate arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RotateParams {
    pub degree: Degree,
    pub expand: bool,
}

/// Fully parsed watermark arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkParams {
    pub text: Option<String>,
    pub image_url: Option<String>,
    pub position: Position,
    pub text_size: f32,
    pub text_color: Rgba<u8>,
    pub image_ratio: f32,
}

/// Fully parsed save arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveParams {
    /// Explicit output format; `None` keeps the source format
    pub format: Option<OutputFormat>,
    pub optimize: bool,
    pub quality: Quality,
    /// Accepted for compatibility; the encoders write baseline output
    pub progressive: bool,
    pub background: Background,
    pub preserve_exif: bool,
}

impl Default for SaveParams {
    fn default() -> Self {
        Self {
            format: None,
            optimize: false,
            quality: Quality::default(),
            progressive: false,
            background: Background::default(),
            preserve_exif: false,
        }
    }
}
