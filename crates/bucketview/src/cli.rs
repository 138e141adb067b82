use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tileconfig::BucketOrder;

#[derive(Parser, Debug)]
#[command(
    name = "bucketview",
    author,
    version,
    about = "Streams a procedurally rendered image into a framebuffer bucket by bucket"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Render configuration file (TOML).
    #[arg(long, env = "BUCKETVIEW_CONFIG", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Override the image resolution (e.g. `640x480`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size, global = true)]
    pub size: Option<(u32, u32)>,

    /// Bucket edge length in pixels.
    #[arg(long, value_name = "PIXELS", global = true)]
    pub tile_size: Option<u32>,

    /// Bucket order: `rows`, `columns`, or `shuffle`.
    #[arg(long, value_name = "ORDER", value_parser = parse_order, global = true)]
    pub order: Option<BucketOrder>,

    /// Seed for the shuffled bucket order.
    #[arg(long, value_name = "SEED", global = true)]
    pub seed: Option<u64>,

    /// Artificial delay after each rendered bucket.
    #[arg(long, value_name = "MILLISECONDS", global = true)]
    pub tile_delay_ms: Option<u64>,

    /// Ask the renderer to stop after this many progress reports.
    #[arg(long, value_name = "REPORTS", global = true)]
    pub abort_after: Option<usize>,

    /// Write the finished framebuffer to a PNG file.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the effective render configuration as TOML and exit.
    Config,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("image dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_order(value: &str) -> Result<BucketOrder, String> {
    if value.trim().is_empty() {
        return Err("bucket order must not be empty".into());
    }
    BucketOrder::parse(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("640x480"), Ok((640, 480)));
        assert_eq!(parse_size(" 32 X 16 "), Ok((32, 16)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("ax10").is_err());
    }

    #[test]
    fn parses_orders() {
        assert_eq!(parse_order("columns"), Ok(BucketOrder::Columns));
        assert!(parse_order("").is_err());
        assert!(parse_order("spiral").is_err());
    }

    #[test]
    fn flags_parse_into_run_args() {
        let cli = Cli::try_parse_from([
            "bucketview",
            "--size",
            "128x64",
            "--order",
            "shuffle",
            "--abort-after",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.run.size, Some((128, 64)));
        assert_eq!(cli.run.order, Some(BucketOrder::Shuffle));
        assert_eq!(cli.run.abort_after, Some(2));
        assert!(cli.command.is_none());
    }
}
