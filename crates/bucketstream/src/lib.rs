//! Streams rendered buckets from a renderer worker thread to the thread that displays them.
//!
//! The flow for one render is:
//!
//! ```text
//!   RenderSession::render (calling thread)
//!          │ validates ImageDesc, builds SharedRenderContext
//!          ├─▶ worker thread: TileRenderer::render ─▶ BucketProducer::submit ─▶ pending queue
//!          │                                          BucketProducer::finish ─▶ close + wake
//!          ▼
//!   BucketConsumer::run ─▶ local queue ─▶ DisplaySink::present ─▶ retired queue
//!          │                    └─▶ ProgressMonitor ─▶ (abort) ─▶ Flow::Stop for the renderer
//!          ▼
//!   join worker ─▶ BucketConsumer::release frees retired buckets
//! ```
//!
//! Exactly one thread produces and exactly one consumes. The pending queue is the only
//! structure both touch, and it is only ever accessed under its mutex. Cancellation is
//! cooperative: the renderer sees [`Flow::Stop`] and may keep delivering a few buckets,
//! all of which are still displayed and freed.

mod bucket;
mod consumer;
mod context;
mod error;
mod producer;
mod progress;
mod session;
mod sink;

pub use bucket::{Bucket, SUPPORTED_SAMPLES_PER_PIXEL};
pub use consumer::{BucketConsumer, ConsumerState, ConsumerStats};
pub use context::{SharedRenderContext, WakeSignal};
pub use error::StreamError;
pub use producer::{
    BucketProducer, DisplayParameters, Flow, ImageDesc, TileRenderer, RENDER_CONTEXT_PARAM,
};
pub use progress::{
    estimate_total_buckets, AbortAfter, LogProgress, NoProgress, Progress, ProgressMonitor,
    RenderProgress,
};
pub use session::{
    RenderOutcome, RenderReport, RenderSession, SessionOptions, DEFAULT_TILE_ESTIMATE,
};
pub use sink::{DirtyRect, DisplaySink, Framebuffer};
