use std::any::Any;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use crate::consumer::BucketConsumer;
use crate::context::SharedRenderContext;
use crate::error::StreamError;
use crate::producer::{DisplayParameters, ImageDesc, TileRenderer};
use crate::progress::{estimate_total_buckets, ProgressMonitor};
use crate::sink::DisplaySink;

/// Tile edge assumed when estimating how many buckets a render will produce.
pub const DEFAULT_TILE_ESTIMATE: u32 = 32;

/// Knobs for a [`RenderSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Typical bucket edge in pixels, used only for the progress estimate.
    pub tile_estimate: u32,
    /// Name given to the renderer worker thread.
    pub worker_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tile_estimate: DEFAULT_TILE_ESTIMATE,
            worker_name: "bucketstream-render".into(),
        }
    }
}

/// How a render that set up successfully came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The renderer ran to completion.
    Completed,
    /// The progress monitor asked for an abort; whatever arrived was still displayed.
    Aborted,
}

/// Summary of one render, returned once every bucket has been displayed and freed.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub outcome: RenderOutcome,
    pub submitted: u64,
    pub displayed: usize,
    pub retired: usize,
    pub freed: usize,
    pub progress_reports: usize,
    pub estimated_total: usize,
    pub elapsed: Duration,
}

/// Runs a renderer on a worker thread and streams its buckets into a sink on the calling
/// thread.
///
/// The shared context lives on this thread's stack and is lent to a scoped worker, so it
/// cannot be torn down before the worker has been joined.
#[derive(Debug, Clone, Default)]
pub struct RenderSession {
    options: SessionOptions,
}

impl RenderSession {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Renders `image` synchronously.
    ///
    /// Fails before any thread exists if the image layout is unsupported, and fails with
    /// [`StreamError::WorkerSpawn`] if the worker cannot be created, including when the
    /// configured worker name is not a valid thread name. An abort requested by
    /// `progress` is not an error. A renderer error is logged and does not fail the
    /// render; a worker panic is reported after every delivered bucket has been drained.
    pub fn render<R>(
        &self,
        image: &ImageDesc,
        mut renderer: R,
        sink: &mut dyn DisplaySink,
        progress: &mut dyn ProgressMonitor,
    ) -> Result<RenderReport, StreamError>
    where
        R: TileRenderer,
    {
        image.validate()?;
        if self.options.worker_name.contains('\0') {
            return Err(StreamError::WorkerSpawn(io::Error::new(
                io::ErrorKind::InvalidInput,
                "worker thread name may not contain NUL bytes",
            )));
        }
        let started = Instant::now();
        let estimated_total =
            estimate_total_buckets(image.width, image.height, self.options.tile_estimate);
        tracing::info!(
            image = %image.name,
            width = image.width,
            height = image.height,
            estimated_total,
            "render started"
        );

        let context = SharedRenderContext::new();
        let shared = &context;

        let report = thread::scope(|scope| -> Result<RenderReport, StreamError> {
            let params = DisplayParameters::for_context(image.clone(), shared);
            let worker = thread::Builder::new()
                .name(self.options.worker_name.clone())
                .spawn_scoped(scope, move || run_worker(&mut renderer, &params, shared))
                .map_err(StreamError::WorkerSpawn)?;

            let mut consumer = BucketConsumer::new(shared, estimated_total);
            consumer.run(sink, progress);

            let joined = worker.join();
            let stats = consumer.stats();
            let aborted = consumer.abort_requested();
            let freed = consumer.release();

            if let Err(payload) = joined {
                let message = panic_message(payload.as_ref());
                tracing::error!(%message, displayed = stats.displayed, "render worker panicked");
                return Err(StreamError::WorkerPanicked(message));
            }

            Ok(RenderReport {
                outcome: if aborted {
                    RenderOutcome::Aborted
                } else {
                    RenderOutcome::Completed
                },
                submitted: shared.submitted(),
                displayed: stats.displayed,
                retired: stats.retired,
                freed,
                progress_reports: stats.progress_reports,
                estimated_total,
                elapsed: started.elapsed(),
            })
        })?;

        tracing::info!(
            outcome = ?report.outcome,
            displayed = report.displayed,
            freed = report.freed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "render finished"
        );
        Ok(report)
    }
}

/// Body of the worker thread. The stream is closed on the way out no matter how the
/// renderer returns, including by unwinding.
fn run_worker<R>(renderer: &mut R, params: &DisplayParameters<'_>, context: &SharedRenderContext)
where
    R: TileRenderer,
{
    let _close = CloseOnExit(context);
    if let Err(err) = renderer.render(params) {
        tracing::warn!(error = ?err, "renderer returned an error");
    }
}

struct CloseOnExit<'a>(&'a SharedRenderContext);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_handles_common_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }

    #[test]
    fn default_options_use_typical_tile() {
        let options = SessionOptions::default();
        assert_eq!(options.tile_estimate, DEFAULT_TILE_ESTIMATE);
        assert!(!options.worker_name.is_empty());
    }
}
