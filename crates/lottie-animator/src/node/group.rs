//! Group nodes: compositions, layers and shape groups.

use super::transform;
use super::{NodeBehavior, NodeGraph, NodeId, NodeRole};
use crate::property::PropertyMap;
use crate::renderer::{
    ContainerContent, Matte, MatteType, RenderContainer, ShapeEntry, ShapeItem, Trim,
};
use glam::Mat4;
use kurbo::BezPath;
use std::sync::Arc;

#[derive(Debug)]
pub enum GroupKind {
    Composition,
    Layer(LayerInfo),
    /// A shape group (`gr`) inside a shape layer.
    Shapes,
}

/// Timing and compositing metadata of one layer.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    pub in_point: f32,
    pub out_point: f32,
    pub start_time: f32,
    pub stretch: f32,
    pub is_3d: bool,
    /// `hd` layers stay in the tree but never render.
    pub hidden: bool,
    /// Set for precomposition layers; children run on their own timeline.
    pub precomposition: bool,
    /// Frame rate converting `Time Remap` seconds to frames.
    pub time_remap_rate: Option<f32>,
    /// Transform parents, outermost first.
    pub transform_chain: Vec<NodeId>,
    visible: bool,
}

impl LayerInfo {
    pub fn new(in_point: f32, out_point: f32) -> Self {
        Self {
            in_point,
            out_point,
            start_time: 0.0,
            stretch: 1.0,
            is_3d: false,
            hidden: false,
            precomposition: false,
            time_remap_rate: None,
            transform_chain: Vec::new(),
            visible: false,
        }
    }

    pub fn is_visible_at(&self, frame: f32) -> bool {
        self.in_point <= frame && frame < self.out_point
    }
}

/// How a group turns its children into render content.
#[derive(Debug)]
pub enum ChildLayout {
    /// Child layers paired with their mattes, back to front.
    Layers(Vec<MatteSlot>),
    /// Shape items in declaration order.
    Shapes,
    /// A single content child (solid or image).
    Content,
    Empty,
}

/// One rendered layer and the chain of layers matting it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatteSlot {
    pub layer: NodeId,
    pub mode: MatteType,
    pub matte: Option<Box<MatteSlot>>,
}

/// Pairs layers (declaration order) with their track mattes.
///
/// Layers are walked top to bottom, i.e. in reverse declaration order. A
/// matte consumer takes the next layer as its matte source; that source is
/// not rendered on its own. A source that is itself a consumer takes the
/// following layer in turn, so mattes nest. A consumer at the bottom of the
/// stack has no matte.
pub fn pair_mattes(layers: &[(NodeId, MatteType)]) -> Vec<MatteSlot> {
    let mut slots = Vec::new();
    let mut chain: Vec<(NodeId, MatteType)> = Vec::new();

    for &(layer, mode) in layers.iter().rev() {
        if chain.is_empty() && !mode.is_consumer() {
            slots.push(MatteSlot {
                layer,
                mode,
                matte: None,
            });
            continue;
        }
        chain.push((layer, mode));
        if !mode.is_consumer() {
            slots.extend(fold_chain(std::mem::take(&mut chain)));
        }
    }
    slots.extend(fold_chain(chain));
    slots
}

fn fold_chain(chain: Vec<(NodeId, MatteType)>) -> Option<MatteSlot> {
    chain.into_iter().rev().fold(None, |matte, (layer, mode)| {
        Some(MatteSlot {
            layer,
            mode,
            matte: matte.map(Box::new),
        })
    })
}

#[derive(Debug)]
pub struct GroupNode {
    pub(crate) kind: GroupKind,
    pub(crate) layout: ChildLayout,
    container: Arc<RenderContainer>,
    inherited_trim: Option<Trim>,
}

impl GroupNode {
    pub fn new(kind: GroupKind, layout: ChildLayout) -> Self {
        Self {
            kind,
            layout,
            container: Arc::default(),
            inherited_trim: None,
        }
    }

    pub fn kind(&self) -> &GroupKind {
        &self.kind
    }

    pub fn layout(&self) -> &ChildLayout {
        &self.layout
    }

    pub fn layer_info(&self) -> Option<&LayerInfo> {
        match &self.kind {
            GroupKind::Layer(info) => Some(info),
            _ => None,
        }
    }

    pub fn container(&self) -> &Arc<RenderContainer> {
        &self.container
    }

    pub(crate) fn set_container(&mut self, container: Arc<RenderContainer>) {
        self.container = container;
    }

    fn visible(&self) -> bool {
        match &self.kind {
            GroupKind::Layer(info) => info.visible && !info.hidden,
            _ => true,
        }
    }
}

impl NodeBehavior for GroupNode {
    fn local_transform(&self, properties: &PropertyMap) -> Mat4 {
        match &self.kind {
            GroupKind::Composition => Mat4::IDENTITY,
            GroupKind::Layer(info) => transform::layer_matrix(properties, info.is_3d),
            GroupKind::Shapes => transform::mat3_to_mat4_2d(transform::shape_matrix(properties)),
        }
    }

    fn local_opacity(&self, properties: &PropertyMap) -> f32 {
        match self.kind {
            GroupKind::Composition => 1.0,
            _ => properties.scalar("Opacity", 1.0),
        }
    }

    fn child_frame(&self, frame: f32, properties: &PropertyMap) -> f32 {
        let GroupKind::Layer(info) = &self.kind else {
            return frame;
        };
        if !info.precomposition {
            return frame;
        }
        if let Some(rate) = info.time_remap_rate {
            if let Some(seconds) = properties.scalar_at("Time Remap", frame) {
                return seconds * rate;
            }
        }
        (frame - info.start_time) / info.stretch
    }

    fn is_active(&self, frame: f32) -> bool {
        match &self.kind {
            GroupKind::Layer(info) => info.is_visible_at(frame),
            _ => true,
        }
    }

    fn perform_additional_local_updates(&mut self, frame: f32, _properties: &PropertyMap) -> bool {
        match &mut self.kind {
            GroupKind::Layer(info) => {
                let visible = info.is_visible_at(frame);
                let changed = visible != info.visible;
                info.visible = visible;
                changed
            }
            _ => false,
        }
    }
}

impl NodeGraph {
    /// Hands this shape group's effective trim down to nested shape groups.
    pub(super) fn propagate_trim(&mut self, id: NodeId) {
        let inherited = match self.get(id).map(|n| n.role()) {
            Some(NodeRole::Group(g)) if matches!(g.layout, ChildLayout::Shapes) => g.inherited_trim,
            _ => return,
        };
        let effective = self.own_trim(id).or(inherited);

        let children = self.get(id).map(|n| n.children().to_vec()).unwrap_or_default();
        for child in children {
            let Some(node) = self.get_mut(child) else {
                continue;
            };
            if let NodeRole::Group(group) = node.role_mut() {
                if group.inherited_trim != effective {
                    group.inherited_trim = effective;
                    node.mark_upstream();
                }
            }
        }
    }

    /// Last trim declared directly inside `id`.
    fn own_trim(&self, id: NodeId) -> Option<Trim> {
        let node = self.get(id)?;
        node.children().iter().rev().find_map(|&child| {
            let child = self.get(child)?;
            match child.role() {
                NodeRole::Trim(trim) => Some(trim.resolve(child.properties())),
                _ => None,
            }
        })
    }

    pub(super) fn assemble_container(&self, id: NodeId) -> Arc<RenderContainer> {
        let Some(node) = self.get(id) else {
            return Arc::default();
        };
        let Some(group) = node.role().as_group() else {
            return Arc::default();
        };

        let content = match &group.layout {
            ChildLayout::Layers(slots) => {
                ContainerContent::Layers(slots.iter().map(|s| self.slot_container(s)).collect())
            }
            ChildLayout::Shapes => {
                let trim = self.own_trim(id).or(group.inherited_trim);
                ContainerContent::Shapes(self.assemble_shapes(node.children(), trim))
            }
            ChildLayout::Content => node
                .children()
                .first()
                .and_then(|&c| self.get(c))
                .map(|c| match c.role() {
                    NodeRole::Solid(solid) => ContainerContent::Shapes(solid.entries().to_vec()),
                    NodeRole::Image(image) => ContainerContent::Image(image.content().clone()),
                    _ => ContainerContent::Empty,
                })
                .unwrap_or(ContainerContent::Empty),
            ChildLayout::Empty => ContainerContent::Empty,
        };

        Arc::new(RenderContainer {
            name: node.keypath_name().map(str::to_string),
            transform: node.output().local_transform,
            world_transform: node.output().world_transform,
            opacity: node.output().opacity,
            visible: group.visible(),
            content,
            matte: None,
        })
    }

    fn slot_container(&self, slot: &MatteSlot) -> Arc<RenderContainer> {
        let base = self.container(slot.layer);
        match &slot.matte {
            None => base,
            Some(source) => Arc::new(RenderContainer {
                matte: Some(Box::new(Matte {
                    mode: slot.mode,
                    source: self.slot_container(source),
                })),
                ..(*base).clone()
            }),
        }
    }

    /// Walks shape items in declaration order and returns entries back to
    /// front.
    fn assemble_shapes(&self, children: &[NodeId], trim: Option<Trim>) -> Vec<ShapeEntry> {
        let mut geometries: Vec<BezPath> = Vec::new();
        let mut entries: Vec<ShapeEntry> = Vec::new();

        for child in children.iter().filter_map(|&c| self.get(c)) {
            match child.role() {
                NodeRole::Shape(shape) => geometries.push(shape.geometry().clone()),
                NodeRole::Fill(fill) => {
                    entries.extend(geometries.iter().map(|geometry| {
                        ShapeEntry::draw(ShapeItem {
                            geometry: geometry.clone(),
                            fill: Some(fill.fill().clone()),
                            stroke: None,
                            trim,
                        })
                    }));
                }
                NodeRole::Stroke(stroke) => {
                    entries.extend(geometries.iter().map(|geometry| {
                        ShapeEntry::draw(ShapeItem {
                            geometry: geometry.clone(),
                            fill: None,
                            stroke: Some(stroke.stroke().clone()),
                            trim,
                        })
                    }));
                }
                NodeRole::Group(group) => entries.push(ShapeEntry::group(group.container().clone())),
                NodeRole::Repeater(repeater) => repeater.apply(&mut geometries, &mut entries),
                NodeRole::Trim(_) | NodeRole::Solid(_) | NodeRole::Image(_) => {}
            }
        }

        entries.reverse();
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<NodeId> {
        (0..n).map(NodeId).collect()
    }

    const A: NodeId = NodeId(0);
    const B: NodeId = NodeId(1);
    const C: NodeId = NodeId(2);
    const D: NodeId = NodeId(3);

    #[test]
    fn test_single_matte_pairing() {
        // [A, B(add), C] -> C on top, B matted by A.
        let (a, b, c) = (A, B, C);
        let slots = pair_mattes(&[
            (a, MatteType::None),
            (b, MatteType::Add),
            (c, MatteType::None),
        ]);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].layer, c);
        assert!(slots[0].matte.is_none());
        assert_eq!(slots[1].layer, b);
        assert_eq!(slots[1].matte.as_ref().map(|m| m.layer), Some(a));
    }

    #[test]
    fn test_consumer_at_bottom_has_no_matte() {
        let (a, b) = (A, B);
        let slots = pair_mattes(&[(a, MatteType::Invert), (b, MatteType::None)]);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].layer, a);
        assert!(slots[1].matte.is_none());
    }

    #[test]
    fn test_chained_mattes_nest() {
        // D(add) is matted by C(luma), which is itself matted by B.
        let (a, b, c, d) = (A, B, C, D);
        let slots = pair_mattes(&[
            (a, MatteType::None),
            (b, MatteType::None),
            (c, MatteType::Luma),
            (d, MatteType::Add),
        ]);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].layer, d);
        let first = slots[0].matte.as_deref().unwrap();
        assert_eq!(first.layer, c);
        assert_eq!(first.mode, MatteType::Luma);
        assert_eq!(first.matte.as_ref().map(|m| m.layer), Some(b));
        assert_eq!(slots[1].layer, a);
    }

    #[test]
    fn test_every_source_used_once() {
        let layers: Vec<(NodeId, MatteType)> = ids(6)
            .into_iter()
            .zip([
                MatteType::None,
                MatteType::Add,
                MatteType::None,
                MatteType::Invert,
                MatteType::None,
                MatteType::None,
            ])
            .collect();
        let slots = pair_mattes(&layers);

        fn collect(slot: &MatteSlot, out: &mut Vec<NodeId>) {
            out.push(slot.layer);
            if let Some(m) = &slot.matte {
                collect(m, out);
            }
        }
        let mut seen = Vec::new();
        for slot in &slots {
            collect(slot, &mut seen);
        }
        seen.sort();
        assert_eq!(seen, ids(6));
        assert_eq!(slots.len(), 4);
    }
}
