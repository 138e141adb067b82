use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bucketstream::Framebuffer;
use image::RgbaImage;

/// Writes the framebuffer to `path` as an 8-bit RGBA PNG.
pub fn write_png(framebuffer: &Framebuffer, path: &Path) -> Result<()> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => {}
        None => return Err(anyhow!("output path has no extension; expected .png")),
        Some(other) => {
            return Err(anyhow!(
                "unsupported output format '.{other}'; expected .png"
            ))
        }
    }

    let image = RgbaImage::from_raw(
        framebuffer.width(),
        framebuffer.height(),
        framebuffer.to_rgba8(),
    )
    .ok_or_else(|| anyhow!("framebuffer size does not match its pixel data"))?;
    image
        .save(path)
        .with_context(|| format!("failed to write image to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_png_paths() {
        let fb = Framebuffer::new(2, 2);
        assert!(write_png(&fb, Path::new("out.jpg")).is_err());
        assert!(write_png(&fb, Path::new("out")).is_err());
    }

    #[test]
    fn writes_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        write_png(&Framebuffer::new(3, 2), &path).unwrap();
        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
    }
}
