use std::thread;
use std::time::Duration;

use anyhow::{ensure, Result};
use bucketstream::{BucketProducer, DisplayParameters, TileRenderer};
use tiler::{TilePlan, TileRect};

const SPHERE_COLOR: [f32; 3] = [0.9, 0.45, 0.2];
const AMBIENT: f32 = 0.1;

/// Procedural renderer that shades a single lit sphere, one planned tile at a time.
pub struct SphereRenderer {
    plan: TilePlan,
    tile_delay: Duration,
}

impl SphereRenderer {
    pub fn new(plan: TilePlan, tile_delay: Duration) -> Self {
        Self { plan, tile_delay }
    }
}

impl TileRenderer for SphereRenderer {
    fn render(&mut self, params: &DisplayParameters<'_>) -> Result<()> {
        let image = params.image();
        ensure!(
            (self.plan.width(), self.plan.height()) == (image.width, image.height),
            "tile plan covers {}x{} but the display expects {}x{}",
            self.plan.width(),
            self.plan.height(),
            image.width,
            image.height
        );

        let mut producer = BucketProducer::start(image, params)?;
        // Reused for every tile; the producer copies what it needs.
        let mut scratch = Vec::new();
        for (index, tile) in self.plan.tiles().iter().enumerate() {
            shade_tile(tile, image.width, image.height, &mut scratch);
            let flow = producer.submit(tile.x, tile.y, tile.width, tile.height, &scratch);
            if !self.tile_delay.is_zero() {
                thread::sleep(self.tile_delay);
            }
            if flow.is_stop() {
                tracing::info!(
                    rendered = index + 1,
                    planned = self.plan.len(),
                    "renderer stopping early at consumer's request"
                );
                break;
            }
        }
        producer.finish();
        Ok(())
    }
}

fn shade_tile(tile: &TileRect, width: u32, height: u32, out: &mut Vec<f32>) {
    out.clear();
    for py in tile.y..tile.y + tile.height {
        for px in tile.x..tile.x + tile.width {
            out.extend_from_slice(&shade_pixel(px, py, width, height));
        }
    }
}

/// Colour of pixel `(px, py)` in a `width` x `height` image of a sphere lit from the
/// upper left over a dark vertical gradient.
pub fn shade_pixel(px: u32, py: u32, width: u32, height: u32) -> [f32; 4] {
    let cx = width as f32 * 0.5;
    let cy = height as f32 * 0.5;
    let radius = width.min(height) as f32 * 0.4;
    let nx = (px as f32 + 0.5 - cx) / radius;
    let ny = (cy - (py as f32 + 0.5)) / radius;
    let d2 = nx * nx + ny * ny;

    if d2 > 1.0 {
        let v = 1.0 - py as f32 / height as f32;
        return [0.05, 0.05, 0.08 + 0.12 * v, 1.0];
    }

    let nz = (1.0 - d2).sqrt();
    let light = normalize([-0.4, 0.5, 0.77]);
    let diffuse = (nx * light[0] + ny * light[1] + nz * light[2]).max(0.0);
    let intensity = AMBIENT + (1.0 - AMBIENT) * diffuse;
    [
        SPHERE_COLOR[0] * intensity,
        SPHERE_COLOR[1] * intensity,
        SPHERE_COLOR[2] * intensity,
        1.0,
    ]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    [v[0] / len, v[1] / len, v[2] / len]
}
