//! Renderer-facing side of the stream.
//!
//! A renderer running on the worker thread opens a [`BucketProducer`] from the
//! [`DisplayParameters`] it was handed, submits each finished tile, and finishes the stream
//! exactly once. The producer borrows the [`SharedRenderContext`]; it never owns it.

use std::collections::BTreeMap;

use crate::bucket::{Bucket, SUPPORTED_SAMPLES_PER_PIXEL};
use crate::context::SharedRenderContext;
use crate::error::StreamError;

/// Name under which the host registers the shared context for the renderer.
pub const RENDER_CONTEXT_PARAM: &str = "renderContext";

/// Geometry and channel layout of the image a renderer will stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDesc {
    /// Display name, used for logging only.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: usize,
    /// Channel descriptor such as `"rgba"`; one character per sample.
    pub channels: String,
}

impl ImageDesc {
    /// Describes an interleaved RGBA image.
    pub fn rgba(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            samples_per_pixel: SUPPORTED_SAMPLES_PER_PIXEL,
            channels: "rgba".into(),
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.samples_per_pixel != SUPPORTED_SAMPLES_PER_PIXEL {
            return Err(StreamError::UnsupportedFormat {
                expected: SUPPORTED_SAMPLES_PER_PIXEL,
                actual: self.samples_per_pixel,
            });
        }
        if self.channels.chars().count() != self.samples_per_pixel {
            return Err(StreamError::InvalidImage(format!(
                "channel descriptor '{}' does not describe {} samples",
                self.channels, self.samples_per_pixel
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::InvalidImage(format!(
                "image '{}' must be at least 1x1 (got {}x{})",
                self.name, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Render-scoped parameters handed to the renderer when the worker starts.
#[derive(Debug, Clone)]
pub struct DisplayParameters<'ctx> {
    image: ImageDesc,
    contexts: BTreeMap<String, &'ctx SharedRenderContext>,
}

impl<'ctx> DisplayParameters<'ctx> {
    /// Parameters with no context registered.
    pub fn new(image: ImageDesc) -> Self {
        Self {
            image,
            contexts: BTreeMap::new(),
        }
    }

    /// Parameters carrying `context` under [`RENDER_CONTEXT_PARAM`].
    pub fn for_context(image: ImageDesc, context: &'ctx SharedRenderContext) -> Self {
        let mut params = Self::new(image);
        params.insert(RENDER_CONTEXT_PARAM, context);
        params
    }

    pub fn insert(&mut self, name: impl Into<String>, context: &'ctx SharedRenderContext) {
        self.contexts.insert(name.into(), context);
    }

    /// The image the host asked the renderer to produce.
    pub fn image(&self) -> &ImageDesc {
        &self.image
    }

    pub fn context(&self, name: &str) -> Option<&'ctx SharedRenderContext> {
        self.contexts.get(name).copied()
    }
}

/// Continue/stop answer returned to the renderer after every submitted tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        matches!(self, Flow::Stop)
    }
}

/// Per-render producer handle used on the worker thread.
///
/// Dropping a producer that was never finished closes the stream, so a renderer that bails
/// out early cannot leave the consumer waiting.
#[derive(Debug)]
pub struct BucketProducer<'ctx> {
    context: &'ctx SharedRenderContext,
    width: u32,
    height: u32,
    samples_per_pixel: usize,
    submitted: usize,
    after_abort: usize,
    finished: bool,
}

impl<'ctx> BucketProducer<'ctx> {
    /// Validates the image layout and binds to the context found in `params`.
    pub fn start(image: &ImageDesc, params: &DisplayParameters<'ctx>) -> Result<Self, StreamError> {
        image.validate()?;
        let context = params
            .context(RENDER_CONTEXT_PARAM)
            .ok_or(StreamError::MissingContext(RENDER_CONTEXT_PARAM))?;
        tracing::debug!(
            image = %image.name,
            width = image.width,
            height = image.height,
            channels = %image.channels,
            "bucket producer started"
        );
        Ok(Self {
            context,
            width: image.width,
            height: image.height,
            samples_per_pixel: image.samples_per_pixel,
            submitted: 0,
            after_abort: 0,
            finished: false,
        })
    }

    /// Copies one finished tile into a new bucket and queues it for display.
    ///
    /// `data` only needs to live for this call. Returns [`Flow::Stop`] once the consumer
    /// has requested an abort; the tile is queued either way.
    pub fn submit(&mut self, x: u32, y: u32, width: u32, height: u32, data: &[f32]) -> Flow {
        if x >= self.width || y >= self.height {
            tracing::warn!(
                x,
                y,
                image_width = self.width,
                image_height = self.height,
                "bucket origin lies outside the image; dropping it"
            );
            return self.flow();
        }

        match Bucket::copy_from(x, y, width, height, self.samples_per_pixel, data) {
            Ok(bucket) => {
                if self.context.push(bucket) {
                    self.submitted += 1;
                    if self.context.should_abort() {
                        self.after_abort += 1;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(x, y, width, height, error = %err, "dropping malformed bucket");
            }
        }
        self.flow()
    }

    /// Buckets queued by this producer so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Declares that no further buckets will be submitted.
    pub fn finish(mut self) {
        self.close_stream();
    }

    fn flow(&self) -> Flow {
        if self.context.should_abort() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn close_stream(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        tracing::debug!(
            submitted = self.submitted,
            after_abort = self.after_abort,
            "bucket producer finished"
        );
        self.context.close();
    }
}

impl Drop for BucketProducer<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                submitted = self.submitted,
                "bucket producer dropped without finish; closing the stream"
            );
            self.close_stream();
        }
    }
}

/// A renderer that streams tiles through a [`BucketProducer`] while it runs.
///
/// `render` is invoked once on the worker thread. Implementations open the producer via
/// [`BucketProducer::start`], honour [`Flow::Stop`] at their own pace, and call
/// [`BucketProducer::finish`] when done.
pub trait TileRenderer: Send {
    fn render(&mut self, params: &DisplayParameters<'_>) -> anyhow::Result<()>;
}

impl<F> TileRenderer for F
where
    F: FnMut(&DisplayParameters<'_>) -> anyhow::Result<()> + Send,
{
    fn render(&mut self, params: &DisplayParameters<'_>) -> anyhow::Result<()> {
        self(params)
    }
}
