//! Scenes: descriptors, layers and the built [`ParallaxScene`].

mod descriptor;
mod layer;
mod parallax_scene;

pub use descriptor::{AxisPair, FitDescriptor, LayerDescriptor, SceneDescriptor};
pub use layer::{Fit, LayerSettings, ParallaxLayer};
pub use parallax_scene::{ParallaxScene, INITIAL_RECT};
