//! Animator nodes and the two-phase evaluation protocol.
//!
//! Nodes live in a [`NodeGraph`] arena and refer to each other by [`NodeId`].
//! A parent owns its children through the child list; the `parent` link is a
//! plain index used for upward queries.
//!
//! Each frame request runs two depth-first passes:
//!
//! 1. [`NodeGraph::update_contents`] updates children first, then the node's
//!    own properties, then the role's local hook. Nodes whose values changed
//!    are flagged with local updates and get a fresh local transform.
//! 2. [`NodeGraph::update_outputs`] composes world transforms top-down along
//!    changed paths, pushes upstream updates to children of recomposed nodes
//!    and rebuilds render output post-order. Subtrees without flags are not
//!    visited.

mod content;
mod group;
mod modifier;
mod paint;
mod shape;
pub(crate) mod transform;

pub(crate) use content::parse_hex_color;
pub use content::{ImageNode, SolidNode};
pub use group::{pair_mattes, ChildLayout, GroupKind, GroupNode, LayerInfo, MatteSlot};
pub use modifier::{RepeaterComposite, RepeaterNode, TrimNode, MAX_REPEATER_COPIES};
pub use paint::{FillNode, StrokeNode};
pub use shape::{ShapeKind, ShapeNode};

use crate::output::NodeOutput;
use crate::property::PropertyMap;
use crate::renderer::RenderContainer;
use glam::Mat4;
use std::sync::Arc;
use tracing::trace;

/// Index of a node inside its [`NodeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Role-specific behavior plugged into the shared update protocol.
pub trait NodeBehavior {
    /// Local matrix derived from the node's properties.
    fn local_transform(&self, _properties: &PropertyMap) -> Mat4 {
        Mat4::IDENTITY
    }

    fn local_opacity(&self, _properties: &PropertyMap) -> f32 {
        1.0
    }

    /// Frame handed to the children when this node is evaluated at `frame`.
    fn child_frame(&self, frame: f32, _properties: &PropertyMap) -> f32 {
        frame
    }

    /// Inactive nodes do not update their children.
    fn is_active(&self, _frame: f32) -> bool {
        true
    }

    /// Runs after the node's properties were updated. Returns `true` when the
    /// hook changed state that affects the node's output.
    fn perform_additional_local_updates(&mut self, _frame: f32, _properties: &PropertyMap) -> bool {
        false
    }

    /// Regenerates role-specific render data from the current property values.
    fn perform_additional_output_updates(&mut self, _properties: &PropertyMap) {}
}

#[derive(Debug)]
pub enum NodeRole {
    Group(GroupNode),
    Shape(ShapeNode),
    Fill(FillNode),
    Stroke(StrokeNode),
    Trim(TrimNode),
    Repeater(RepeaterNode),
    Solid(SolidNode),
    Image(ImageNode),
}

impl NodeRole {
    pub fn label(&self) -> &'static str {
        match self {
            NodeRole::Group(g) => match g.kind {
                GroupKind::Composition => "composition",
                GroupKind::Layer(_) => "layer",
                GroupKind::Shapes => "group",
            },
            NodeRole::Shape(_) => "shape",
            NodeRole::Fill(_) => "fill",
            NodeRole::Stroke(_) => "stroke",
            NodeRole::Trim(_) => "trim",
            NodeRole::Repeater(_) => "repeater",
            NodeRole::Solid(_) => "solid",
            NodeRole::Image(_) => "image",
        }
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            NodeRole::Group(g) => Some(g),
            _ => None,
        }
    }

    fn behavior(&self) -> &dyn NodeBehavior {
        match self {
            NodeRole::Group(n) => n,
            NodeRole::Shape(n) => n,
            NodeRole::Fill(n) => n,
            NodeRole::Stroke(n) => n,
            NodeRole::Trim(n) => n,
            NodeRole::Repeater(n) => n,
            NodeRole::Solid(n) => n,
            NodeRole::Image(n) => n,
        }
    }

    fn behavior_mut(&mut self) -> &mut dyn NodeBehavior {
        match self {
            NodeRole::Group(n) => n,
            NodeRole::Shape(n) => n,
            NodeRole::Fill(n) => n,
            NodeRole::Stroke(n) => n,
            NodeRole::Trim(n) => n,
            NodeRole::Repeater(n) => n,
            NodeRole::Solid(n) => n,
            NodeRole::Image(n) => n,
        }
    }
}

#[derive(Debug)]
pub struct AnimatorNode {
    keypath_name: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: PropertyMap,
    output: NodeOutput,
    role: NodeRole,
    has_local_updates: bool,
    has_upstream_updates: bool,
    has_subtree_updates: bool,
    last_update_frame: Option<f32>,
    // Pass in which the local transform was last recomputed.
    local_pass: u64,
    rebuild_count: u64,
}

impl AnimatorNode {
    /// A node without a keypath name is transparent in property addresses.
    pub fn new(keypath_name: Option<String>, properties: PropertyMap, role: NodeRole) -> Self {
        Self {
            keypath_name,
            parent: None,
            children: Vec::new(),
            properties,
            output: NodeOutput::default(),
            role,
            has_local_updates: false,
            has_upstream_updates: false,
            has_subtree_updates: false,
            last_update_frame: None,
            local_pass: 0,
            rebuild_count: 0,
        }
    }

    pub fn keypath_name(&self) -> Option<&str> {
        self.keypath_name.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyMap {
        &mut self.properties
    }

    pub fn output(&self) -> &NodeOutput {
        &self.output
    }

    pub fn role(&self) -> &NodeRole {
        &self.role
    }

    pub(crate) fn role_mut(&mut self) -> &mut NodeRole {
        &mut self.role
    }

    pub fn has_local_updates(&self) -> bool {
        self.has_local_updates
    }

    pub fn has_upstream_updates(&self) -> bool {
        self.has_upstream_updates
    }

    pub fn last_update_frame(&self) -> Option<f32> {
        self.last_update_frame
    }

    fn mark_upstream(&mut self) {
        self.has_upstream_updates = true;
    }

    /// How many times this node's render output was regenerated.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }
}

#[derive(Debug, Default)]
pub struct NodeGraph {
    nodes: Vec<AnimatorNode>,
    pass: u64,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: AnimatorNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Appends `child` to `parent`'s children (declaration order).
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn get(&self, id: NodeId) -> Option<&AnimatorNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut AnimatorNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &AnimatorNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Keypath segments naming `id`, from the outermost named ancestor down.
    pub fn address(&self, id: NodeId) -> Vec<&str> {
        let mut segments = Vec::new();
        let mut cursor = self.nodes.get(id.0);
        while let Some(node) = cursor {
            if let Some(name) = node.keypath_name() {
                segments.push(name);
            }
            cursor = node.parent.and_then(|p| self.nodes.get(p.0));
        }
        segments.reverse();
        segments
    }

    /// Frame at which `id`'s own properties are evaluated when the root is
    /// evaluated at `frame`, following every ancestor's time mapping.
    pub fn local_frame(&self, id: NodeId, frame: f32) -> f32 {
        let mut ancestors = Vec::new();
        let mut cursor = self.nodes.get(id.0).and_then(|n| n.parent);
        while let Some(parent) = cursor {
            ancestors.push(parent);
            cursor = self.nodes.get(parent.0).and_then(|n| n.parent);
        }
        ancestors.iter().rev().fold(frame, |frame, ancestor| {
            let node = &self.nodes[ancestor.0];
            node.role.behavior().child_frame(frame, &node.properties)
        })
    }

    /// Current render output of a group node.
    pub fn container(&self, id: NodeId) -> Arc<RenderContainer> {
        self.nodes
            .get(id.0)
            .and_then(|n| n.role.as_group())
            .map(|g| g.container().clone())
            .unwrap_or_default()
    }

    /// Runs both passes for `frame`. Returns whether anything changed.
    pub fn evaluate(&mut self, root: NodeId, frame: f32, force: bool) -> bool {
        self.pass += 1;
        let changed = self.update_contents(root, frame, force);
        if changed || force {
            self.update_outputs(root, Mat4::IDENTITY, force);
        }
        changed
    }

    /// First pass. Returns whether the node or any descendant changed.
    pub fn update_contents(&mut self, id: NodeId, frame: f32, force: bool) -> bool {
        let (child_frame, active) = {
            let node = &self.nodes[id.0];
            let behavior = node.role.behavior();
            (
                behavior.child_frame(frame, &node.properties),
                behavior.is_active(frame),
            )
        };

        let mut subtree_changed = false;
        if active {
            for i in 0..self.nodes[id.0].children.len() {
                let child = self.nodes[id.0].children[i];
                subtree_changed |= self.update_contents(child, child_frame, force);
            }
        }

        let pass = self.pass;
        let node = &mut self.nodes[id.0];
        let first = node.last_update_frame.is_none();
        let changed = (force || node.properties.needs_update(frame)) && node.properties.update(frame);
        let hook = node
            .role
            .behavior_mut()
            .perform_additional_local_updates(frame, &node.properties);

        if force || first || changed || hook {
            node.has_local_updates = true;
            node.local_pass = pass;
            let behavior = node.role.behavior();
            let transform = behavior.local_transform(&node.properties);
            let opacity = behavior.local_opacity(&node.properties);
            node.output.set_local(transform, opacity);
        }
        node.last_update_frame = Some(frame);
        node.has_subtree_updates |= subtree_changed;
        subtree_changed || node.has_local_updates
    }

    /// Second pass. Returns whether the node's render output was rebuilt.
    pub fn update_outputs(&mut self, id: NodeId, parent_world: Mat4, force: bool) -> bool {
        let transform_dirty = {
            let node = &self.nodes[id.0];
            force || node.has_local_updates || node.has_upstream_updates || self.chain_changed(id)
        };

        if transform_dirty {
            let base = parent_world * self.chain_transform(id);
            let node = &mut self.nodes[id.0];
            let frame = node.last_update_frame.unwrap_or_default();
            // Children only depend on the world matrix, not on opacity.
            if node.output.compose(base, frame) {
                for i in 0..self.nodes[id.0].children.len() {
                    let child = self.nodes[id.0].children[i];
                    self.nodes[child.0].mark_upstream();
                }
            } else {
                trace!(node = id.0, frame, "world transform unchanged");
            }
        }

        self.propagate_trim(id);

        let world = self.nodes[id.0].output.world_transform;
        let mut child_rebuilt = false;
        for i in 0..self.nodes[id.0].children.len() {
            let child = self.nodes[id.0].children[i];
            if self.needs_output_pass(child, force) {
                child_rebuilt |= self.update_outputs(child, world, force);
            }
        }

        let rebuilt = transform_dirty || child_rebuilt;
        if rebuilt {
            self.rebuild_outputs(id);
        }

        let node = &mut self.nodes[id.0];
        node.has_local_updates = false;
        node.has_upstream_updates = false;
        node.has_subtree_updates = false;
        rebuilt
    }

    fn needs_output_pass(&self, id: NodeId, force: bool) -> bool {
        let node = &self.nodes[id.0];
        force
            || node.has_local_updates
            || node.has_upstream_updates
            || node.has_subtree_updates
            || self.chain_changed(id)
    }

    fn transform_chain(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].role {
            NodeRole::Group(GroupNode {
                kind: GroupKind::Layer(info),
                ..
            }) => &info.transform_chain,
            _ => &[],
        }
    }

    /// A transform parent recomputed its local matrix during this pass.
    fn chain_changed(&self, id: NodeId) -> bool {
        self.transform_chain(id)
            .iter()
            .any(|p| self.nodes[p.0].local_pass == self.pass)
    }

    fn chain_transform(&self, id: NodeId) -> Mat4 {
        self.transform_chain(id)
            .iter()
            .fold(Mat4::IDENTITY, |acc, p| acc * self.nodes[p.0].output.local_transform)
    }

    fn rebuild_outputs(&mut self, id: NodeId) {
        {
            let node = &mut self.nodes[id.0];
            node.role
                .behavior_mut()
                .perform_additional_output_updates(&node.properties);
        }

        if matches!(self.nodes[id.0].role, NodeRole::Group(_)) {
            let container = self.assemble_container(id);
            if let NodeRole::Group(group) = &mut self.nodes[id.0].role {
                group.set_container(container);
            }
        }

        let node = &mut self.nodes[id.0];
        node.rebuild_count += 1;
        trace!(
            node = id.0,
            name = node.keypath_name.as_deref().unwrap_or(""),
            role = node.role.label(),
            "rebuilt node output"
        );
    }
}
