use crate::bucket::Bucket;

/// Presentation surface the consumer hands each bucket to, in submission order.
///
/// `present` returns once the pixels have been handed off; how the surface refreshes or
/// synchronises internally is up to the implementation.
pub trait DisplaySink {
    fn present(&mut self, bucket: &Bucket);
}

impl<S> DisplaySink for &mut S
where
    S: DisplaySink + ?Sized,
{
    fn present(&mut self, bucket: &Bucket) {
        (**self).present(bucket)
    }
}

/// Region of a [`Framebuffer`] touched by a presented bucket, already clipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// In-memory RGBA float surface.
///
/// Buckets are written one scanline at a time and clipped to the surface bounds. Each
/// presented bucket leaves a dirty rectangle behind for whoever refreshes the view; the
/// owner drains them with [`Framebuffer::take_dirty`], otherwise they accumulate.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
    dirty: Vec<DirtyRect>,
    presented: usize,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0; 4]; width as usize * height as usize],
            dirty: Vec::new(),
            presented: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of buckets presented so far.
    pub fn presented(&self) -> usize {
        self.presented
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Returns and clears the accumulated dirty rectangles.
    pub fn take_dirty(&mut self) -> Vec<DirtyRect> {
        std::mem::take(&mut self.dirty)
    }

    /// Quantises to 8-bit RGBA, row-major, clamping to `[0, 1]`.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|pixel| pixel.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()
    }
}

impl DisplaySink for Framebuffer {
    fn present(&mut self, bucket: &Bucket) {
        self.presented += 1;
        if bucket.x() >= self.width || bucket.y() >= self.height {
            return;
        }
        let right = bucket.x().saturating_add(bucket.width()).min(self.width);
        let bottom = bucket.y().saturating_add(bucket.height()).min(self.height);
        let visible = (right - bucket.x()) as usize;
        let spp = bucket.samples_per_pixel();

        for (row_index, row) in bucket.rows().enumerate() {
            let y = bucket.y() as usize + row_index;
            if y >= bottom as usize {
                break;
            }
            let start = y * self.width as usize + bucket.x() as usize;
            let target = &mut self.pixels[start..start + visible];
            for (dst, src) in target.iter_mut().zip(row.chunks_exact(spp)) {
                let mut pixel = [0.0, 0.0, 0.0, 1.0];
                for (channel, value) in pixel.iter_mut().zip(src) {
                    *channel = *value;
                }
                *dst = pixel;
            }
        }

        self.dirty.push(DirtyRect {
            left: bucket.x(),
            top: bucket.y(),
            right,
            bottom,
        });
    }
}
