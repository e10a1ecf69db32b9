use crate::coords::Vec2;
use crate::error::{ParallaxError, Result};
use crate::packing::AtlasEntry;

/// How a layer is scaled against the scene.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Fit {
    /// Width becomes `scene width * factor`.
    Width(f32),
    /// Height becomes `scene height * factor`.
    Height(f32),
}

impl Fit {
    #[inline]
    pub fn factor(self) -> f32 {
        match self {
            Fit::Width(f) | Fit::Height(f) => f,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct LayerSettings {
    /// Movement factor; 1 moves the layer as far as it overflows the scene.
    pub parallax: Vec2,
    pub fit: Option<Fit>,
    /// Offset in fractions of the layer size.
    pub translate: Option<Vec2>,
}

/// One layer of a built scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallaxLayer {
    /// `<url>_<index>`, unique inside the scene.
    pub id: String,
    pub settings: LayerSettings,
    pub atlas: AtlasEntry,
    /// Source width / height.
    pub ratio: f32,
}

impl ParallaxLayer {
    /// Layer size for a scene of `width` x `height`, or `None` without `fit`.
    pub fn fitted_size(&self, width: f32, height: f32) -> Result<Option<(f32, f32)>> {
        let Some(fit) = self.settings.fit else {
            return Ok(None);
        };

        let (w, h) = match fit {
            Fit::Height(f) => {
                let h = (height * f).floor();
                ((h * self.ratio).floor(), h)
            }
            Fit::Width(f) => {
                let w = (width * f).floor();
                (w, (w / self.ratio).floor())
            }
        };

        if !(w >= 1.0 && h >= 1.0) {
            return Err(ParallaxError::config(format!(
                "scaling failed for layer '{}': {w}x{h} at scene {width}x{height}",
                self.id
            )));
        }
        Ok(Some((w, h)))
    }
}
