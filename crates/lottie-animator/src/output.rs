use glam::Mat4;

/// Resolved transform and opacity of one node.
///
/// `world_transform` is the parent's world transform (times any layer
/// parent chain) composed with `local_transform`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub local_transform: Mat4,
    pub world_transform: Mat4,
    pub opacity: f32,
    composed_frame: Option<f32>,
}

impl Default for NodeOutput {
    fn default() -> Self {
        Self {
            local_transform: Mat4::IDENTITY,
            world_transform: Mat4::IDENTITY,
            opacity: 1.0,
            composed_frame: None,
        }
    }
}

impl NodeOutput {
    pub fn set_local(&mut self, transform: Mat4, opacity: f32) {
        self.local_transform = transform;
        self.opacity = opacity;
    }

    /// Composes the world transform for `frame`. Returns `false` when the
    /// output was already composed for this frame against the same parent.
    pub fn compose(&mut self, parent_world: Mat4, frame: f32) -> bool {
        let world = parent_world * self.local_transform;
        if self.composed_frame == Some(frame) && world == self.world_transform {
            return false;
        }
        self.world_transform = world;
        self.composed_frame = Some(frame);
        true
    }

    pub fn composed_frame(&self) -> Option<f32> {
        self.composed_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_compose_is_memoized_by_frame() {
        let mut output = NodeOutput::default();
        output.set_local(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)), 0.5);

        let parent = Mat4::from_translation(Vec3::new(0.0, 10.0, 0.0));
        assert!(output.compose(parent, 1.0));
        assert_eq!(
            output.world_transform.transform_point3(Vec3::ZERO),
            Vec3::new(5.0, 10.0, 0.0)
        );
        assert!(!output.compose(parent, 1.0));
        assert!(output.compose(Mat4::IDENTITY, 1.0));
        assert_eq!(output.composed_frame(), Some(1.0));
    }
}
