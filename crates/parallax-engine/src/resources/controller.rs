use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::error::{ParallaxError, Result};
use crate::loader::LoadedImage;
use crate::packing::{ImageSource, PackResult, Packer, PackerStrategy};
use crate::render::{RenderBackend, TextureId, TextureOptions};

use super::{group_hash, CacheTable};

/// Off-screen canvas settings for atlas merges.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CanvasOptions {
    /// Keep the alpha channel. When false the atlas is opaque.
    pub alpha: bool,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self { alpha: true }
    }
}

/// Merged atlas bitmap with its packing data and cache key.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub image: Rc<RgbaImage>,
    pub data: PackResult,
    pub hash: String,
}

#[derive(Debug, Clone)]
struct ImageEntry {
    bitmap: Rc<RgbaImage>,
    users: u32,
}

#[derive(Debug, Copy, Clone)]
struct TextureEntry {
    id: TextureId,
    users: u32,
}

/// CPU-side resource cache: decoded bitmaps, merged atlases and atlas textures.
pub struct ResourceController {
    packer: Box<dyn Packer>,
    images: HashMap<String, ImageEntry>,
    merges: CacheTable<MergeResult>,
    textures: CacheTable<TextureEntry>,
    packs: u64,
}

impl ResourceController {
    pub fn new(strategy: PackerStrategy, max_texture_size: u32, max_bin_size: u32) -> Self {
        let packer = strategy.build(max_texture_size, max_bin_size);
        log::debug!("resources: {} packer, max texture {max_texture_size}", packer.name());
        Self::with_packer(packer)
    }

    pub fn with_packer(packer: Box<dyn Packer>) -> Self {
        Self {
            packer,
            images: HashMap::new(),
            merges: CacheTable::new(),
            textures: CacheTable::new(),
            packs: 0,
        }
    }

    // ── bitmaps ───────────────────────────────────────────────────────────

    /// Caches a bitmap under `key`.
    ///
    /// An existing key keeps its first bitmap and gains one user, so scenes
    /// sharing a url each hold it until they release it.
    pub fn add(&mut self, key: &str, bitmap: Rc<RgbaImage>) {
        if let Some(entry) = self.images.get_mut(key) {
            log::warn!("{key}: already in the resources");
            entry.users += 1;
            return;
        }
        self.images.insert(key.to_string(), ImageEntry { bitmap, users: 1 });
    }

    pub fn image(&self, key: &str) -> Option<&Rc<RgbaImage>> {
        self.images.get(key).map(|e| &e.bitmap)
    }

    /// Drops one user of a cached bitmap. Returns `true` once the bitmap is
    /// actually released.
    pub fn delete_image(&mut self, key: &str) -> bool {
        let Some(entry) = self.images.get_mut(key) else {
            return false;
        };
        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            return false;
        }
        self.images.remove(key).is_some()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    // ── merges ────────────────────────────────────────────────────────────

    /// Packs `images` into one atlas bitmap.
    ///
    /// Images are deduplicated by url. The result is cached under an
    /// order-independent hash of the url set; a hit returns without packing.
    pub fn merge(&mut self, images: &[LoadedImage], canvas: &CanvasOptions) -> Result<MergeResult> {
        let mut seen = HashSet::new();
        let sources: Vec<ImageSource> = images
            .iter()
            .filter(|i| seen.insert(i.url.clone()))
            .map(|i| ImageSource::new(i.url.clone(), Rc::clone(&i.bitmap)))
            .collect();

        let hash = group_hash(sources.iter().map(|s| s.id.as_str()));
        if let Some(hit) = self.merges.get(&hash) {
            log::debug!("merge {hash}: cache hit");
            return Ok(hit.clone());
        }

        let data = self.packer.pack(&sources)?;
        self.packs += 1;

        let image = Rc::new(draw_atlas(&data, &sources, canvas)?);
        log::debug!(
            "merge {hash}: {} images into {}x{}",
            sources.len(),
            data.size.w,
            data.size.h
        );

        let result = MergeResult { image, data, hash };
        self.merges.insert(&result.hash, result.clone());
        Ok(result)
    }

    pub fn merged(&self, hash: &str) -> Option<&MergeResult> {
        self.merges.get(hash)
    }

    /// Packing runs performed (cache hits excluded).
    #[inline]
    pub fn packs(&self) -> u64 {
        self.packs
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Uploads `bitmap` as the texture for `hash`.
    ///
    /// An existing texture for `hash` is returned with a warning and gains one user.
    pub fn create_texture<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        hash: &str,
        bitmap: &RgbaImage,
        options: &TextureOptions,
    ) -> Result<TextureId> {
        if let Some(entry) = self.textures.get_mut(hash) {
            log::warn!("texture {hash}: already exists, reusing");
            entry.users += 1;
            return Ok(entry.id);
        }

        let id = backend.create_texture(bitmap, options)?;
        self.textures.insert(hash, TextureEntry { id, users: 1 });
        Ok(id)
    }

    pub fn texture(&self, hash: &str) -> Option<TextureId> {
        self.textures.get(hash).map(|e| e.id)
    }

    /// Drops one user of the texture for `hash`.
    ///
    /// When the last user is gone the entry and its cached merge are removed and
    /// the handle is returned; destroying the GPU object is up to the caller.
    pub fn delete_texture(&mut self, hash: &str) -> Option<TextureId> {
        let entry = self.textures.get_mut(hash)?;
        entry.users = entry.users.saturating_sub(1);
        if entry.users > 0 {
            return None;
        }
        let entry = self.textures.remove(hash)?;
        self.merges.remove(hash);
        Some(entry.id)
    }
}

/// Draws every source at its packed rect, resizing when the atlas was downscaled.
fn draw_atlas(pack: &PackResult, sources: &[ImageSource], canvas: &CanvasOptions) -> Result<RgbaImage> {
    let background = if canvas.alpha {
        Rgba([0, 0, 0, 0])
    } else {
        Rgba([0, 0, 0, 255])
    };
    let mut atlas = RgbaImage::from_pixel(pack.size.w, pack.size.h, background);

    for entry in &pack.atlas {
        let Some(source) = sources.iter().find(|s| s.id == entry.id) else {
            return Err(ParallaxError::config(format!("no bitmap for atlas entry '{}'", entry.id)));
        };
        let r = entry.rect;
        if r.w == 0 || r.h == 0 {
            continue;
        }

        let resized;
        let top: &RgbaImage = if source.bitmap.dimensions() == (r.w, r.h) {
            &source.bitmap
        } else {
            resized = imageops::resize(&*source.bitmap, r.w, r.h, FilterType::Triangle);
            &resized
        };
        imageops::replace(&mut atlas, top, i64::from(r.x), i64::from(r.y));
    }

    if !canvas.alpha {
        for px in atlas.pixels_mut() {
            px[3] = 255;
        }
    }
    Ok(atlas)
}
