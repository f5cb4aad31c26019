//! Evaluation engine for Lottie animations.
//!
//! An [`AnimationScene`] turns a parsed [`LottieJson`](lottie_data::model::LottieJson)
//! into a graph of animator nodes. Evaluating a frame walks the graph twice
//! (contents, then outputs) and only recomputes what changed since the
//! previous frame. The result is a [`RenderTree`] for an external renderer.

pub mod animatable;
pub mod assets;
pub mod builder;
pub mod config;
pub mod error;
pub mod keyframes;
pub mod keypath;
pub mod node;
pub mod output;
pub mod property;
pub mod renderer;
pub mod scene;
pub mod value;

pub use assets::{AssetRegistry, ImageProvider, ImageSource};
pub use config::SceneConfig;
pub use error::{BuildError, KeypathError};
pub use keypath::Keypath;
pub use property::AnyProvider;
pub use renderer::*;
pub use scene::{AnimationScene, LottiePlayer, PropertyMatch};
pub use value::{PropertyValue, ValueKind};
