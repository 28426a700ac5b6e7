//! Pixel-level image codec.
//!
//! Everything that touches pixels lives here, on top of the `image` crate:
//!
//! - [`options`]: typed operation arguments and their string parsers
//! - [`handle`]: the decoded [`Image`] and its transforms and encoder
//! - [`watermark`]: text rendering and layer compositing
//! - [`jpeg`]: EXIF segment carry-over for JPEG output

pub mod handle;
pub mod jpeg;
pub mod options;
pub mod watermark;

pub use handle::Image;
pub use options::{
    parse_dimension, parse_flag, parse_watermark_color, parse_watermark_position,
    parse_watermark_ratio, parse_watermark_text_size, Background, Degree, OutputFormat, Position,
    Quality, Rect, ResizeFilter, ResizeMode, ResizeParams, Retain, RotateParams, SaveParams,
    WatermarkParams, DEFAULT_QUALITY, DEFAULT_RETAIN, DEFAULT_WATERMARK_IMAGE_RATIO,
    DEFAULT_WATERMARK_TEXT_SIZE,
};
pub use watermark::WatermarkFont;
