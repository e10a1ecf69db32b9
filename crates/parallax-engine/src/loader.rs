//! Asset loading collaborator.
//!
//! The manager only needs decoded bitmaps keyed by url. [`FileLoader`] reads
//! them from disk; hosts with other transports implement [`AssetLoader`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use image::RgbaImage;

use crate::error::{ParallaxError, Result};
use crate::scene::LayerDescriptor;

/// One decoded image.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub url: String,
    pub bitmap: Rc<RgbaImage>,
}

impl LoadedImage {
    pub fn new(url: impl Into<String>, bitmap: RgbaImage) -> Self {
        Self {
            url: url.into(),
            bitmap: Rc::new(bitmap),
        }
    }
}

/// What progress counts.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum ProgressMode {
    #[default]
    Bytes,
    Items,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LoadProgress {
    pub loaded: u64,
    pub total: u64,
    pub mode: ProgressMode,
}

impl LoadProgress {
    /// Completion in `0..=100`. An unknown total reports 0 until done.
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        (self.loaded as f32 / self.total as f32 * 100.0).clamp(0.0, 100.0)
    }
}

/// Yields one decoded bitmap per unique layer url.
///
/// Fetch/decode failures surface as [`ParallaxError::Transfer`]; retrying is
/// the loader's business.
#[allow(async_fn_in_trait)]
pub trait AssetLoader {
    async fn load_images(
        &self,
        layers: &[LayerDescriptor],
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<Vec<LoadedImage>>;
}

/// Loads layer urls as paths relative to `root`.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    pub root: PathBuf,
    pub mode: ProgressMode,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: ProgressMode::Bytes,
        }
    }

    pub fn with_mode(mut self, mode: ProgressMode) -> Self {
        self.mode = mode;
        self
    }

    fn transfer(url: &str, message: impl ToString) -> ParallaxError {
        ParallaxError::Transfer {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Declared size, falling back to the file length.
    fn byte_size(&self, layer: &LayerDescriptor) -> u64 {
        layer
            .size_in_bytes
            .or_else(|| std::fs::metadata(self.root.join(&layer.url)).ok().map(|m| m.len()))
            .unwrap_or(0)
    }
}

impl AssetLoader for FileLoader {
    async fn load_images(
        &self,
        layers: &[LayerDescriptor],
        progress: &mut dyn FnMut(LoadProgress),
    ) -> Result<Vec<LoadedImage>> {
        let mut seen = HashSet::new();
        let unique: Vec<&LayerDescriptor> = layers.iter().filter(|l| seen.insert(l.url.clone())).collect();

        let sizes: Vec<u64> = match self.mode {
            ProgressMode::Bytes => unique.iter().map(|l| self.byte_size(l)).collect(),
            ProgressMode::Items => vec![1; unique.len()],
        };
        let mut report = LoadProgress {
            loaded: 0,
            total: sizes.iter().sum(),
            mode: self.mode,
        };
        progress(report);

        let mut out = Vec::with_capacity(unique.len());
        for (layer, size) in unique.into_iter().zip(sizes) {
            let path = self.root.join(&layer.url);
            let bytes = std::fs::read(&path).map_err(|e| Self::transfer(&layer.url, e))?;
            let bitmap = image::load_from_memory(&bytes)
                .map_err(|e| Self::transfer(&layer.url, e))?
                .to_rgba8();
            log::debug!("loaded '{}' ({}x{})", layer.url, bitmap.width(), bitmap.height());

            report.loaded += size;
            progress(report);
            out.push(LoadedImage::new(layer.url.clone(), bitmap));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("parallax-loader-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(dir: &std::path::Path, name: &str, w: u32, h: u32) {
        RgbaImage::from_pixel(w, h, image::Rgba([1, 2, 3, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn percent_handles_unknown_totals() {
        let p = LoadProgress { loaded: 5, total: 0, mode: ProgressMode::Bytes };
        assert_eq!(p.percent(), 0.0);
        let p = LoadProgress { loaded: 1, total: 4, mode: ProgressMode::Items };
        assert_eq!(p.percent(), 25.0);
    }

    #[test]
    fn loads_each_url_once_and_reports_progress() {
        let dir = temp_dir("ok");
        write_png(&dir, "a.png", 4, 2);
        write_png(&dir, "b.png", 3, 3);

        let layers = vec![LayerDescriptor::new("a.png"), LayerDescriptor::new("b.png"), LayerDescriptor::new("a.png")];
        let loader = FileLoader::new(&dir).with_mode(ProgressMode::Items);
        let mut reports = Vec::new();
        let images = pollster::block_on(loader.load_images(&layers, &mut |p| reports.push(p))).unwrap();

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].bitmap.dimensions(), (4, 2));
        let percents: Vec<f32> = reports.iter().map(LoadProgress::percent).collect();
        assert_eq!(percents, [0.0, 50.0, 100.0]);
    }

    #[test]
    fn byte_progress_uses_declared_sizes() {
        let dir = temp_dir("bytes");
        write_png(&dir, "a.png", 2, 2);
        let mut layer = LayerDescriptor::new("a.png");
        layer.size_in_bytes = Some(1000);

        let mut last = None;
        pollster::block_on(FileLoader::new(&dir).load_images(&[layer], &mut |p| last = Some(p))).unwrap();
        assert_eq!(last.map(|p| (p.loaded, p.total)), Some((1000, 1000)));
    }

    #[test]
    fn missing_file_is_a_transfer_error() {
        let dir = temp_dir("missing");
        let err = pollster::block_on(FileLoader::new(&dir).load_images(&[LayerDescriptor::new("nope.png")], &mut |_| {}))
            .unwrap_err();
        assert!(matches!(err, ParallaxError::Transfer { ref url, .. } if url == "nope.png"));
    }
}
