use crate::value::ValueKind;
use thiserror::Error;

/// Failures while turning a model into a node graph.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("keyframes of `{property}` are out of order at index {index} ({previous} > {next})")]
    UnorderedKeyframes {
        property: String,
        index: usize,
        previous: f32,
        next: f32,
    },
    #[error("keyframe {index} of `{property}` has no value")]
    MissingKeyframeValue { property: String, index: usize },
    #[error("layer `{layer}` is parented to unknown layer index {parent}")]
    UnknownParent { layer: String, parent: u32 },
    #[error("layer `{layer}` has a parent chain that loops back to itself")]
    ParentCycle { layer: String },
    #[error("layer `{layer}` references missing asset `{asset}`")]
    MissingAsset { layer: String, asset: String },
    #[error("precomposition `{0}` contains itself")]
    RecursivePrecomposition(String),
    #[error("invalid animation json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of keypath-driven overrides.
#[derive(Debug, Error)]
pub enum KeypathError {
    #[error("`{keypath}` resolves to {expected:?} properties but the provider yields {provided:?}")]
    KindMismatch {
        keypath: String,
        expected: ValueKind,
        provided: ValueKind,
    },
}
