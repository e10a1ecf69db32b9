//! Parallax engine.
//!
//! Renders several independent parallax scenes into one surface. Each scene
//! is a stack of image layers packed into one atlas texture and drawn as one
//! merged, interleaved geometry; layers shift with the pointer according to
//! their parallax factors.
//!
//! [`manager::ParallaxManager`] is the entry point. The window runtime
//! ([`window`], [`core`], [`device`]) hosts it in a winit + wgpu application.

pub mod buffers;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod loader;
pub mod manager;
pub mod packing;
pub mod render;
pub mod resources;
pub mod scene;

pub mod core;
pub mod device;
pub mod logging;
pub mod time;
pub mod window;

pub use error::{ParallaxError, Result};
pub use loader::{AssetLoader, FileLoader, LoadProgress, ProgressMode};
pub use manager::{ManagerConfig, ParallaxManager, SceneHandle};
pub use scene::{ParallaxScene, SceneDescriptor};
