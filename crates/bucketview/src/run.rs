use std::time::Duration;

use anyhow::{Context, Result};
use bucketstream::{
    AbortAfter, Bucket, DisplaySink, Framebuffer, ImageDesc, LogProgress, Progress,
    ProgressMonitor, RenderOutcome, RenderSession, SessionOptions,
};
use tileconfig::RenderConfig;
use tiler::TilePlan;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::export;
use crate::scene::SphereRenderer;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(args: &RunArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let plan = TilePlan::new(
        config.image.width,
        config.image.height,
        config.tiles.size,
        config.tiles.order,
        config.tiles.seed,
    )
    .context("failed to plan render buckets")?;

    let image = ImageDesc {
        name: config.image.name.clone(),
        width: config.image.width,
        height: config.image.height,
        samples_per_pixel: config.image.channels.chars().count(),
        channels: config.image.channels.clone(),
    };
    tracing::debug!(
        buckets = plan.len(),
        tile_size = config.tiles.size,
        order = ?config.tiles.order,
        seed = config.tiles.seed,
        tile_delay = ?config.render.tile_delay,
        "planned render"
    );

    let session = RenderSession::new(SessionOptions {
        tile_estimate: config.tiles.size,
        worker_name: "bucketview-render".into(),
    });
    let mut framebuffer = Framebuffer::new(image.width, image.height);
    let mut progress = CliProgress::new(config.render.abort_after);
    let renderer = SphereRenderer::new(plan, config.render.tile_delay);

    let mut view = RefreshingView::new(&mut framebuffer);
    let report = session
        .render(&image, renderer, &mut view, &mut progress)
        .with_context(|| format!("failed to render '{}'", image.name))?;
    tracing::debug!(refreshed = view.refreshed(), "view refreshes issued");

    let outcome = match report.outcome {
        RenderOutcome::Completed => "completed",
        RenderOutcome::Aborted => "aborted",
    };
    println!(
        "{outcome}: {} buckets displayed, {} freed, {} ms",
        report.displayed,
        report.freed,
        report.elapsed.as_millis()
    );

    if let Some(path) = args.output.as_ref() {
        export::write_png(&framebuffer, path)?;
        tracing::info!(path = %path.display(), "wrote framebuffer");
    }
    Ok(())
}

pub fn print_config(args: &RunArgs) -> Result<()> {
    let config = resolve_config(args)?;
    let serialized =
        toml::to_string_pretty(&config).context("failed to serialize render configuration")?;
    print!("{serialized}");
    Ok(())
}

/// Loads the config file if one was given, then layers command-line overrides on top.
fn resolve_config(args: &RunArgs) -> Result<RenderConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => RenderConfig::default(),
    };

    if let Some((width, height)) = args.size {
        config.image.width = width;
        config.image.height = height;
    }
    if let Some(size) = args.tile_size {
        config.tiles.size = size;
    }
    if let Some(order) = args.order {
        config.tiles.order = order;
    }
    if let Some(seed) = args.seed {
        config.tiles.seed = seed;
    }
    if let Some(ms) = args.tile_delay_ms {
        config.render.tile_delay = Duration::from_millis(ms);
    }
    if args.abort_after.is_some() {
        config.render.abort_after = args.abort_after;
    }

    config.validate().context("invalid render configuration")?;
    Ok(config)
}

/// Presents into the framebuffer and refreshes each region it dirtied straight away.
struct RefreshingView<'a> {
    framebuffer: &'a mut Framebuffer,
    refreshed: usize,
}

impl<'a> RefreshingView<'a> {
    fn new(framebuffer: &'a mut Framebuffer) -> Self {
        Self {
            framebuffer,
            refreshed: 0,
        }
    }

    fn refreshed(&self) -> usize {
        self.refreshed
    }
}

impl DisplaySink for RefreshingView<'_> {
    fn present(&mut self, bucket: &Bucket) {
        self.framebuffer.present(bucket);
        for rect in self.framebuffer.take_dirty() {
            tracing::trace!(
                left = rect.left,
                top = rect.top,
                right = rect.right,
                bottom = rect.bottom,
                "refreshed view region"
            );
            self.refreshed += 1;
        }
    }
}

/// Logs progress and optionally requests an abort after a fixed number of reports.
struct CliProgress {
    log: LogProgress,
    abort: Option<AbortAfter>,
}

impl CliProgress {
    fn new(abort_after: Option<usize>) -> Self {
        Self {
            log: LogProgress::default(),
            abort: abort_after.map(AbortAfter::new),
        }
    }
}

impl ProgressMonitor for CliProgress {
    fn progress(&mut self, done: usize, estimated_total: usize) -> Progress {
        self.log.progress(done, estimated_total);
        match self.abort.as_mut() {
            Some(abort) => abort.progress(done, estimated_total),
            None => Progress::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tileconfig::BucketOrder;

    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            size: None,
            tile_size: None,
            order: None,
            seed: None,
            tile_delay_ms: None,
            abort_after: None,
            output: None,
        }
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "version = 1\n[image]\nwidth = 100\nheight = 50\n[tiles]\nsize = 10\norder = \"columns\""
        )
        .unwrap();

        let mut args = args();
        args.config = Some(file.path().to_path_buf());
        args.tile_size = Some(20);
        args.tile_delay_ms = Some(3);

        let config = resolve_config(&args).unwrap();
        assert_eq!((config.image.width, config.image.height), (100, 50));
        assert_eq!(config.tiles.size, 20);
        assert_eq!(config.tiles.order, BucketOrder::Columns);
        assert_eq!(config.render.tile_delay, Duration::from_millis(3));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut args = args();
        args.tile_size = Some(0);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn refreshing_view_drains_dirty_regions() {
        let mut framebuffer = Framebuffer::new(4, 4);
        let mut view = RefreshingView::new(&mut framebuffer);
        view.present(&Bucket::new(0, 0, 2, 2, 4, vec![1.0; 16]).unwrap());
        view.present(&Bucket::new(2, 2, 2, 2, 4, vec![0.5; 16]).unwrap());
        assert_eq!(view.refreshed(), 2);

        assert!(framebuffer.take_dirty().is_empty());
        assert_eq!(framebuffer.presented(), 2);
        assert_eq!(framebuffer.pixel(3, 3), Some([0.5; 4]));
    }

    #[test]
    fn cli_progress_aborts_after_limit() {
        let mut progress = CliProgress::new(Some(2));
        assert_eq!(progress.progress(1, 10), Progress::Continue);
        assert_eq!(progress.progress(2, 10), Progress::Abort);

        let mut unlimited = CliProgress::new(None);
        assert_eq!(unlimited.progress(100, 10), Progress::Continue);
    }
}
