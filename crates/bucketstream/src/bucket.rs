use crate::error::StreamError;

/// Channel count accepted by the streaming core (interleaved RGBA).
pub const SUPPORTED_SAMPLES_PER_PIXEL: usize = 4;

/// One rectangular tile of rendered samples plus its placement in the target image.
///
/// Samples are stored row-major with interleaved channels:
///
/// ```text
///  /-- px 0 --\ /-- px 1 --\     /-- px N --\
///  [ r g b a ]  [ r g b a ]  ... [ r g b a ]
/// ```
///
/// A bucket never changes after construction. It moves by value from the producer into the
/// pending queue, then into the consumer's local queue, then into the retired queue, and is
/// dropped exactly once when the retired queue is released. It cannot be duplicated:
///
/// ```compile_fail
/// fn duplicate(bucket: &bucketstream::Bucket) -> bucketstream::Bucket {
///     bucket.clone()
/// }
/// ```
#[derive(Debug, PartialEq)]
pub struct Bucket {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    samples_per_pixel: usize,
    sequence: u64,
    samples: Box<[f32]>,
}

impl Bucket {
    /// Builds a bucket that takes ownership of `samples`.
    pub fn new(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        samples_per_pixel: usize,
        samples: Vec<f32>,
    ) -> Result<Self, StreamError> {
        let expected = expected_len(width, height, samples_per_pixel)?;
        if samples.len() != expected {
            return Err(StreamError::InvalidBucket(format!(
                "{width}x{height} bucket with {samples_per_pixel} channels needs {expected} samples, got {}",
                samples.len()
            )));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
            samples_per_pixel,
            sequence: 0,
            samples: samples.into_boxed_slice(),
        })
    }

    /// Deep-copies a renderer-owned slice that is only valid for the duration of a callback.
    ///
    /// Extra trailing samples are ignored; a short slice is rejected.
    pub fn copy_from(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        samples_per_pixel: usize,
        data: &[f32],
    ) -> Result<Self, StreamError> {
        let expected = expected_len(width, height, samples_per_pixel)?;
        let Some(slice) = data.get(..expected) else {
            return Err(StreamError::InvalidBucket(format!(
                "{width}x{height} bucket needs {expected} samples, renderer supplied {}",
                data.len()
            )));
        };
        Self::new(x, y, width, height, samples_per_pixel, slice.to_vec())
    }

    pub(crate) fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_pixel
    }

    /// Zero-based submission index assigned by the producer.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Interleaved channels of the pixel at bucket-local `(px, py)`.
    pub fn pixel(&self, px: u32, py: u32) -> Option<&[f32]> {
        if px >= self.width || py >= self.height {
            return None;
        }
        let start = (py as usize * self.width as usize + px as usize) * self.samples_per_pixel;
        self.samples.get(start..start + self.samples_per_pixel)
    }

    /// Iterates scanlines top to bottom, each `width * samples_per_pixel` long.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.samples
            .chunks_exact(self.width as usize * self.samples_per_pixel)
    }
}

fn expected_len(width: u32, height: u32, samples_per_pixel: usize) -> Result<usize, StreamError> {
    if width == 0 || height == 0 {
        return Err(StreamError::InvalidBucket(format!(
            "bucket dimensions must be non-zero (got {width}x{height})"
        )));
    }
    if samples_per_pixel == 0 {
        return Err(StreamError::InvalidBucket(
            "bucket must carry at least one channel".into(),
        ));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(samples_per_pixel))
        .ok_or_else(|| StreamError::InvalidBucket("bucket sample count overflows".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffer() {
        let err = Bucket::new(0, 0, 2, 2, 4, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, StreamError::InvalidBucket(_)));
    }

    #[test]
    fn rejects_zero_sized_bucket() {
        assert!(Bucket::new(0, 0, 0, 2, 4, Vec::new()).is_err());
        assert!(Bucket::copy_from(0, 0, 3, 0, 4, &[]).is_err());
    }

    #[test]
    fn copy_from_ignores_trailing_samples() {
        let data: Vec<f32> = (0..20).map(|v| v as f32).collect();
        let bucket = Bucket::copy_from(4, 8, 2, 2, 4, &data).unwrap();
        assert_eq!(bucket.samples().len(), 16);
        assert_eq!(bucket.samples()[15], 15.0);
        assert_eq!((bucket.x(), bucket.y()), (4, 8));
    }

    #[test]
    fn copy_from_rejects_short_slice() {
        assert!(Bucket::copy_from(0, 0, 2, 2, 4, &[0.0; 8]).is_err());
    }

    #[test]
    fn pixel_uses_interleaved_row_major_layout() {
        let data: Vec<f32> = (0..24).map(|v| v as f32).collect();
        let bucket = Bucket::new(0, 0, 3, 2, 4, data).unwrap();
        assert_eq!(bucket.pixel(0, 0), Some(&[0.0, 1.0, 2.0, 3.0][..]));
        assert_eq!(bucket.pixel(1, 0), Some(&[4.0, 5.0, 6.0, 7.0][..]));
        assert_eq!(bucket.pixel(0, 1), Some(&[12.0, 13.0, 14.0, 15.0][..]));
        assert_eq!(bucket.pixel(3, 0), None);

        let rows: Vec<_> = bucket.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], 12.0);
    }
}
