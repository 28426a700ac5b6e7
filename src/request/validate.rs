//! Request validation.
//!
//! Every check runs before the source image is fetched, in a fixed order
//! that short-circuits on the first failure:
//!
//! ```text
//! operations -> url -> signature -> client -> host -> arguments -> options
//! ```
//!
//! A request that passes is turned into a [`ValidatedRequest`], which
//! carries the fully parsed [`TransformPlan`]. Nothing downstream parses a
//! query string again.

use std::str::FromStr;

use image::Rgba;

use crate::codec::{
    parse_dimension, parse_flag, parse_watermark_color, parse_watermark_position,
    parse_watermark_ratio, parse_watermark_text_size, Degree, Position, Rect, ResizeParams,
    RotateParams, SaveParams, WatermarkParams, DEFAULT_WATERMARK_IMAGE_RATIO,
    DEFAULT_WATERMARK_TEXT_SIZE,
};
use crate::error::{ImageError, ProxyError};
use crate::fetch::resolve_url;
use crate::server::signature::QuerySigner;
use crate::settings::Settings;

use super::operation::{operation_set, parse_operations, Operation, DEFAULT_OPERATION};
use super::options::{resolve_resize, resolve_rotate, resolve_save, resolve_watermark};
use super::params::ImageQuery;

// =============================================================================
// Types
// =============================================================================

/// Parsed arguments for every operation in the chain.
///
/// A field is `Some` exactly when its operation appears in `operations`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPlan {
    /// Operations in execution order, duplicates included
    pub operations: Vec<Operation>,
    pub resize: Option<ResizeParams>,
    pub rotate: Option<RotateParams>,
    pub region: Option<Rect>,
    pub watermark: Option<WatermarkParams>,
    pub save: SaveParams,
}

impl TransformPlan {
    /// Whether the chain forwards the source bytes untouched.
    pub fn is_passthrough(&self) -> bool {
        self.operations.contains(&Operation::Noop)
    }

    fn new(operations: Vec<Operation>) -> Self {
        Self {
            operations,
            resize: None,
            rotate: None,
            region: None,
            watermark: None,
            save: SaveParams::default(),
        }
    }
}

/// A request that passed every check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    /// Source URL as given (possibly root-relative)
    pub url: String,

    pub plan: TransformPlan,

    /// An output format was requested or configured, so the response
    /// Content-Type follows the encoded format
    pub format_requested: bool,
}

// =============================================================================
// Validation
// =============================================================================

/// Validate an image request against `settings`.
///
/// `raw_query` is the query string exactly as received; it is only used
/// for signature verification.
pub fn validate(
    query: &ImageQuery,
    raw_query: &str,
    settings: &Settings,
) -> Result<ValidatedRequest, ProxyError> {
    let operations = check_operations(query, settings)?;
    let url = check_url(query, settings)?;
    check_signature(raw_query, settings)?;
    check_client(query, settings)?;
    check_host(&url, settings)?;

    let mut plan = TransformPlan::new(operations);
    let ops = operation_set(&plan.operations);

    // Argument shape and bounds
    let dimensions = if ops.contains(&Operation::Resize) {
        Some(check_dimensions(query, settings)?)
    } else {
        None
    };
    let degree = if ops.contains(&Operation::Rotate) {
        Some(check_degree(query)?)
    } else {
        None
    };
    if ops.contains(&Operation::Region) {
        plan.region = Some(check_rectangle(query)?);
    }
    if ops.contains(&Operation::Watermark) {
        check_watermark(query)?;
    }

    // Option sanity, over request values merged with defaults
    let defaults = &settings.defaults;
    let save = resolve_save(query, defaults);
    let format_requested = save.format.is_some();
    plan.save = SaveParams {
        format: save
            .format
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(option_error)?,
        optimize: parse_flag_or(&save.optimize, "optimize")?,
        quality: parse_or_default(&save.quality).map_err(option_error)?,
        progressive: parse_flag_or(&save.progressive, "progressive")?,
        background: parse_or_default(&save.background).map_err(option_error)?,
        preserve_exif: parse_flag_or(&save.preserve_exif, "preserve_exif")?,
    };

    if let Some((width, height)) = dimensions {
        let resize = resolve_resize(query, defaults);
        plan.resize = Some(ResizeParams {
            width,
            height,
            mode: parse_or_default(&resize.mode).map_err(option_error)?,
            filter: parse_or_default(&resize.filter).map_err(option_error)?,
            position: parse_or_default(&resize.position).map_err(option_error)?,
            background: parse_or_default(&resize.background).map_err(option_error)?,
            retain: parse_or_default(&resize.retain).map_err(option_error)?,
            max_width: settings.max_resize_width,
            max_height: settings.max_resize_height,
        });
    }

    if let Some(degree) = degree {
        let rotate = resolve_rotate(query, defaults);
        plan.rotate = Some(RotateParams {
            degree,
            expand: parse_flag_or(&rotate.expand, "expand")?,
        });
    }

    if ops.contains(&Operation::Watermark) {
        let watermark = resolve_watermark(query, defaults);
        plan.watermark = Some(WatermarkParams {
            text: non_empty(&watermark.watermark_txt),
            image_url: non_empty(&watermark.watermark_img),
            position: match watermark.watermark_pos.as_deref() {
                Some(value) => parse_watermark_position(value).map_err(option_error)?,
                None => Position::BottomRight,
            },
            text_size: match watermark.watermark_txt_size.as_deref() {
                Some(value) => parse_watermark_text_size(value).map_err(option_error)?,
                None => DEFAULT_WATERMARK_TEXT_SIZE,
            },
            text_color: match watermark.watermark_txt_color.as_deref() {
                Some(value) => parse_watermark_color(value).map_err(option_error)?,
                None => Rgba([255, 255, 255, 255]),
            },
            image_ratio: match watermark.watermark_img_ratio.as_deref() {
                Some(value) => parse_watermark_ratio(value).map_err(option_error)?,
                None => DEFAULT_WATERMARK_IMAGE_RATIO,
            },
        });
    }

    Ok(ValidatedRequest {
        url,
        plan,
        format_requested,
    })
}

fn check_operations(query: &ImageQuery, settings: &Settings) -> Result<Vec<Operation>, ProxyError> {
    let list = match query.op.as_deref() {
        Some(op) if !op.is_empty() => op,
        _ => settings.operation.as_deref().unwrap_or(DEFAULT_OPERATION),
    };

    let operations = parse_operations(list)
        .map_err(|_| ProxyError::Operation("Unsupported operation".to_string()))?;

    let set = operation_set(&operations);
    if !set.is_subset(&settings.allowed_operations) {
        return Err(ProxyError::Operation("Unsupported operation".to_string()));
    }
    if set.len() > settings.max_operations {
        return Err(ProxyError::Operation("Too many operations".to_string()));
    }

    Ok(operations)
}

fn check_url(query: &ImageQuery, settings: &Settings) -> Result<String, ProxyError> {
    let url = match query.url.as_deref() {
        Some(url) if !url.is_empty() => url,
        _ => return Err(ProxyError::Url("Missing url".to_string())),
    };

    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(url.to_string());
    }
    if settings.implicit_base_url.is_some() && url.starts_with('/') {
        return Ok(url.to_string());
    }
    Err(ProxyError::Url("Unsupported protocol".to_string()))
}

fn check_signature(raw_query: &str, settings: &Settings) -> Result<(), ProxyError> {
    match settings.client_key.as_deref() {
        Some(key) if !QuerySigner::new(key).verify_query(raw_query) => {
            Err(ProxyError::Signature("Invalid signature".to_string()))
        }
        _ => Ok(()),
    }
}

fn check_client(query: &ImageQuery, settings: &Settings) -> Result<(), ProxyError> {
    match settings.client_name.as_deref() {
        Some(name) if query.client.as_deref() != Some(name) => {
            Err(ProxyError::Client("Invalid client".to_string()))
        }
        _ => Ok(()),
    }
}

fn check_host(url: &str, settings: &Settings) -> Result<(), ProxyError> {
    if settings.allowed_hosts.is_empty() {
        return Ok(());
    }

    let host = resolve_url(url, settings.implicit_base_url.as_deref())
        .and_then(|resolved| resolved.host_str().map(str::to_string));

    match host {
        Some(host) if settings.allowed_hosts.contains(&host) => Ok(()),
        _ => Err(ProxyError::Host("Invalid host".to_string())),
    }
}

fn check_dimensions(
    query: &ImageQuery,
    settings: &Settings,
) -> Result<(Option<u32>, Option<u32>), ProxyError> {
    let w = non_empty(&query.w);
    let h = non_empty(&query.h);
    if w.is_none() && h.is_none() {
        return Err(ProxyError::Dimensions("Missing dimensions".to_string()));
    }

    let width = match w {
        Some(w) => Some(
            parse_dimension(&w).ok_or_else(|| ProxyError::Dimensions("Invalid width".to_string()))?,
        ),
        None => None,
    };
    let height = match h {
        Some(h) => Some(
            parse_dimension(&h)
                .ok_or_else(|| ProxyError::Dimensions("Invalid height".to_string()))?,
        ),
        None => None,
    };

    if width.is_some_and(|w| w > settings.max_resize_width) {
        return Err(ProxyError::Dimensions(
            "Exceeds maximum allowed width".to_string(),
        ));
    }
    if height.is_some_and(|h| h > settings.max_resize_height) {
        return Err(ProxyError::Dimensions(
            "Exceeds maximum allowed height".to_string(),
        ));
    }

    Ok((width, height))
}

fn check_degree(query: &ImageQuery) -> Result<Degree, ProxyError> {
    non_empty(&query.deg)
        .and_then(|deg| deg.parse().ok())
        .ok_or_else(|| ProxyError::Dimensions("Invalid degree".to_string()))
}

fn check_rectangle(query: &ImageQuery) -> Result<Rect, ProxyError> {
    non_empty(&query.rect)
        .and_then(|rect| rect.parse().ok())
        .ok_or_else(|| ProxyError::Dimensions("Invalid rectangle".to_string()))
}

/// An empty `watermark_txt` is rejected even when `watermark_img` is set;
/// an empty `watermark_img` counts as absent.
fn check_watermark(query: &ImageQuery) -> Result<(), ProxyError> {
    let image = non_empty(&query.watermark_img);
    if let Some(url) = &image {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ProxyError::Dimensions("Unsupported protocol".to_string()));
        }
    }

    match query.watermark_txt.as_deref() {
        Some("") => Err(ProxyError::Dimensions(
            "Watermark text cannot be empty".to_string(),
        )),
        None if image.is_none() => Err(ProxyError::Dimensions(
            "Watermark requires either watermark_img or watermark_txt".to_string(),
        )),
        _ => Ok(()),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn parse_or_default<T>(value: &Option<String>) -> Result<T, ImageError>
where
    T: FromStr<Err = ImageError> + Default,
{
    match value.as_deref() {
        Some(value) => value.parse(),
        None => Ok(T::default()),
    }
}

fn parse_flag_or(value: &Option<String>, option: &'static str) -> Result<bool, ProxyError> {
    match value.as_deref() {
        Some(value) => parse_flag(option, value).map_err(option_error),
        None => Ok(false),
    }
}

fn option_error(err: ImageError) -> ProxyError {
    let message = err.to_string();
    match err {
        ImageError::InvalidOption { option, .. } => ProxyError::Option { option, message },
        _ => ProxyError::Option {
            option: "option",
            message,
        },
    }
}
