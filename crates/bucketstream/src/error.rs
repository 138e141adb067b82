/// Errors surfaced by the bucket streaming core.
///
/// Only setup failures and a panicking worker are reported here. A cooperative abort is
/// not an error: it shows up as [`crate::RenderOutcome::Aborted`] on an otherwise
/// successful report.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("unsupported pixel format: {actual} samples per pixel (expected {expected})")]
    UnsupportedFormat { expected: usize, actual: usize },
    #[error("invalid image description: {0}")]
    InvalidImage(String),
    #[error("invalid bucket: {0}")]
    InvalidBucket(String),
    #[error("display parameter '{0}' was not provided to the renderer")]
    MissingContext(&'static str),
    #[error("failed to spawn render worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("render worker thread panicked: {0}")]
    WorkerPanicked(String),
}
