//! Serde model of the Lottie interchange format.
//!
//! The types mirror the JSON field names; the animator crate turns them into
//! an evaluable node graph.

pub mod model;
