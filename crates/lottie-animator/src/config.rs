//! Scene construction and playback options.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Leave layers flagged `hd` out of the rendered output. They are still
    /// evaluated so they can act as transform parents.
    #[serde(default = "default_true")]
    pub skip_hidden_layers: bool,

    /// Wrap playback at the out point instead of holding the last frame.
    #[serde(default = "default_true")]
    pub loop_playback: bool,

    /// Overrides the frame rate declared by the animation.
    #[serde(default)]
    pub frame_rate: Option<f32>,
}

fn default_true() -> bool {
    true
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            skip_hidden_layers: true,
            loop_playback: true,
            frame_rate: None,
        }
    }
}

impl SceneConfig {
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
