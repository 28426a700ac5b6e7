//! Image request parsing, option resolution and validation.
//!
//! ```text
//! raw query ──► ImageQuery ──► validate() ──► ValidatedRequest
//!                                  │
//!                                  └── options::resolve_* (request over defaults)
//! ```

pub mod operation;
pub mod options;
pub mod params;
pub mod validate;

pub use operation::{operation_set, parse_operations, Operation, UnknownOperation, DEFAULT_OPERATION};
pub use options::{
    resolve_resize, resolve_rotate, resolve_save, resolve_watermark, ResizeOptions, RotateOptions,
    SaveOptions, WatermarkOptions,
};
pub use params::ImageQuery;
pub use validate::{validate, TransformPlan, ValidatedRequest};
