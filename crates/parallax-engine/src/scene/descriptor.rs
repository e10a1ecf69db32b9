use serde::{Deserialize, Serialize};

use crate::coords::Vec2;
use crate::error::{ParallaxError, Result};

use super::{Fit, LayerSettings};

/// Scene creation input. `id` is the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    pub id: String,
    pub layers: Vec<LayerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<u64>,
    #[serde(default)]
    pub parallax: AxisPair,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translate: Option<AxisPair>,
}

/// `{ x?, y? }`; a missing axis is zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
}

impl AxisPair {
    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x.unwrap_or(0.0), self.y.unwrap_or(0.0))
    }
}

/// `{ w }` or `{ h }`; exactly one must be present.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h: Option<f32>,
}

impl TryFrom<FitDescriptor> for Fit {
    type Error = ParallaxError;

    fn try_from(fit: FitDescriptor) -> Result<Self> {
        let fit = match (fit.w, fit.h) {
            (Some(w), None) => Fit::Width(w),
            (None, Some(h)) => Fit::Height(h),
            (None, None) => return Err(ParallaxError::config("fit needs a 'w' or an 'h' value")),
            (Some(_), Some(_)) => {
                return Err(ParallaxError::config("fit takes exactly one of 'w' and 'h'"));
            }
        };
        let factor = fit.factor();
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ParallaxError::config(format!("fit factor {factor} must be positive")));
        }
        Ok(fit)
    }
}

impl LayerDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size_in_bytes: None,
            parallax: AxisPair::default(),
            fit: None,
            translate: None,
        }
    }

    /// Validated settings for this layer.
    pub fn settings(&self) -> Result<LayerSettings> {
        let parallax = self.parallax.to_vec2();
        let translate = self.translate.map(AxisPair::to_vec2);
        if !parallax.is_finite() || translate.is_some_and(|t| !t.is_finite()) {
            return Err(ParallaxError::config(format!("layer '{}' has a non-finite value", self.url)));
        }
        Ok(LayerSettings {
            parallax,
            fit: self.fit.map(Fit::try_from).transpose()?,
            translate,
        })
    }
}

impl SceneDescriptor {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ParallaxError::config(format!("invalid scene descriptor: {e}")))
    }

    /// Parses a JSON array of scene descriptors.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>> {
        serde_json::from_str(json).map_err(|e| ParallaxError::config(format!("invalid scene list: {e}")))
    }

    /// Validates every layer, in order.
    pub fn layer_settings(&self) -> Result<Vec<LayerSettings>> {
        if self.id.is_empty() {
            return Err(ParallaxError::config("scene id must not be empty"));
        }
        if self.layers.is_empty() {
            return Err(ParallaxError::config(format!("scene '{}' has no layers", self.id)));
        }
        self.layers.iter().map(LayerDescriptor::settings).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_layers() {
        let scene = SceneDescriptor::from_json(
            r#"{
                "id": "forest",
                "layers": [
                    { "url": "sky.png", "sizeInBytes": 2048, "parallax": { "x": 0.1 } },
                    { "url": "trees.png", "parallax": { "x": 0.5, "y": 1 }, "fit": { "h": 1.5 }, "translate": { "x": -0.25 } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scene.layers[0].size_in_bytes, Some(2048));
        let settings = scene.layer_settings().unwrap();
        assert_eq!(settings[0].parallax, Vec2::new(0.1, 0.0));
        assert_eq!(settings[0].fit, None);
        assert_eq!(settings[1].fit, Some(Fit::Height(1.5)));
        assert_eq!(settings[1].translate, Some(Vec2::new(-0.25, 0.0)));
    }

    #[test]
    fn fit_needs_exactly_one_dimension() {
        let both = FitDescriptor { w: Some(1.0), h: Some(1.0) };
        let none = FitDescriptor::default();
        assert!(matches!(Fit::try_from(both), Err(ParallaxError::Configuration(_))));
        assert!(matches!(Fit::try_from(none), Err(ParallaxError::Configuration(_))));
        assert_eq!(Fit::try_from(FitDescriptor { w: Some(0.5), h: None }).unwrap(), Fit::Width(0.5));
    }

    #[test]
    fn rejects_empty_and_malformed_scenes() {
        let empty = SceneDescriptor { id: "x".into(), layers: vec![] };
        assert!(empty.layer_settings().is_err());
        assert!(SceneDescriptor::from_json("{\"id\": 3}").is_err());
    }
}
