//! Operation pipeline.
//!
//! ```text
//! FetchResult ──► noop? ──yes──► bytes as fetched, no format
//!                   │
//!                   no
//!                   ▼
//!             Image::decode ──► op[0] ──► op[1] ──► ... ──► save ──► bytes + format
//! ```
//!
//! The source is decoded once, every operation mutates the same handle in
//! request order, and the result is encoded once.

use bytes::Bytes;
use tracing::debug;

use crate::codec::{Image, OutputFormat, WatermarkFont};
use crate::error::ImageError;
use crate::request::{Operation, TransformPlan};

/// Encoded pipeline result.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub data: Bytes,
    /// Format written by the encoder; `None` when the source was passed
    /// through untouched
    pub format: Option<OutputFormat>,
}

/// Runs a [`TransformPlan`] against fetched source bytes.
pub struct OperationPipeline<'a> {
    plan: &'a TransformPlan,
    watermark_image: Option<&'a [u8]>,
    font: Option<&'a WatermarkFont>,
}

impl<'a> OperationPipeline<'a> {
    pub fn new(plan: &'a TransformPlan) -> Self {
        Self {
            plan,
            watermark_image: None,
            font: None,
        }
    }

    /// Bytes of the already fetched `watermark_img`.
    pub fn with_watermark_image(mut self, data: Option<&'a [u8]>) -> Self {
        self.watermark_image = data;
        self
    }

    /// Font for text watermarks.
    pub fn with_font(mut self, font: Option<&'a WatermarkFont>) -> Self {
        self.font = font;
        self
    }

    /// Execute the plan. CPU-bound; call from a blocking context.
    pub fn run(&self, source: Bytes) -> Result<PipelineOutput, ImageError> {
        if self.plan.is_passthrough() {
            return Ok(PipelineOutput {
                data: source,
                format: None,
            });
        }

        let mut image = Image::decode(&source)?;

        for operation in &self.plan.operations {
            debug!(operation = %operation, "Applying operation");
            match operation {
                Operation::Resize => {
                    if let Some(params) = &self.plan.resize {
                        image.resize(params)?;
                    }
                }
                Operation::Rotate => {
                    if let Some(params) = &self.plan.rotate {
                        image.rotate(params);
                    }
                }
                Operation::Region => {
                    if let Some(rect) = &self.plan.region {
                        image.region(rect)?;
                    }
                }
                Operation::Watermark => {
                    if let Some(params) = &self.plan.watermark {
                        image.watermark(params, self.watermark_image, self.font)?;
                    }
                }
                // Handled by the passthrough check above
                Operation::Noop => {}
            }
        }

        let (data, format) = image.save(&self.plan.save)?;
        Ok(PipelineOutput {
            data: Bytes::from(data),
            format: Some(format),
        })
    }
}
