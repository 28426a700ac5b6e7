//! Option resolution.
//!
//! Merges request arguments over configured defaults, one struct per
//! operation family. A non-empty request value wins; otherwise the
//! matching default is used; otherwise the field stays `None`. Nothing is
//! validated here.

use crate::settings::OptionDefaults;

use super::params::ImageQuery;

/// Resolved resize options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResizeOptions {
    pub mode: Option<String>,
    pub filter: Option<String>,
    pub position: Option<String>,
    pub background: Option<String>,
    pub retain: Option<String>,
}

/// Resolved rotate options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotateOptions {
    pub expand: Option<String>,
}

/// Resolved watermark options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatermarkOptions {
    pub watermark_txt: Option<String>,
    pub watermark_img: Option<String>,
    pub watermark_pos: Option<String>,
    pub watermark_txt_size: Option<String>,
    pub watermark_txt_color: Option<String>,
    pub watermark_img_ratio: Option<String>,
}

/// Resolved save (output) options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    pub format: Option<String>,
    pub optimize: Option<String>,
    pub quality: Option<String>,
    pub progressive: Option<String>,
    pub background: Option<String>,
    pub preserve_exif: Option<String>,
}

fn pick(requested: &Option<String>, default: &Option<String>) -> Option<String> {
    match requested {
        Some(value) if !value.is_empty() => Some(value.clone()),
        _ => default.clone(),
    }
}

pub fn resolve_resize(query: &ImageQuery, defaults: &OptionDefaults) -> ResizeOptions {
    ResizeOptions {
        mode: pick(&query.mode, &defaults.mode),
        filter: pick(&query.filter, &defaults.filter),
        position: pick(&query.pos, &defaults.position),
        background: pick(&query.bg, &defaults.background),
        retain: pick(&query.retain, &defaults.retain),
    }
}

pub fn resolve_rotate(query: &ImageQuery, defaults: &OptionDefaults) -> RotateOptions {
    RotateOptions {
        expand: pick(&query.expand, &defaults.expand),
    }
}

/// Watermark sources have no configured fallback; only styling does.
pub fn resolve_watermark(query: &ImageQuery, defaults: &OptionDefaults) -> WatermarkOptions {
    WatermarkOptions {
        watermark_txt: query.watermark_txt.clone(),
        watermark_img: query.watermark_img.clone(),
        watermark_pos: pick(&query.watermark_pos, &defaults.watermark_pos),
        watermark_txt_size: pick(&query.watermark_txt_size, &defaults.watermark_txt_size),
        watermark_txt_color: pick(&query.watermark_txt_color, &defaults.watermark_txt_color),
        watermark_img_ratio: pick(&query.watermark_img_ratio, &defaults.watermark_img_ratio),
    }
}

pub fn resolve_save(query: &ImageQuery, defaults: &OptionDefaults) -> SaveOptions {
    SaveOptions {
        format: pick(&query.fmt, &defaults.format),
        optimize: pick(&query.opt, &defaults.optimize),
        quality: pick(&query.q, &defaults.quality),
        progressive: pick(&query.prog, &defaults.progressive),
        background: pick(&query.bg, &defaults.background),
        preserve_exif: pick(&query.exif, &defaults.preserve_exif),
    }
}
