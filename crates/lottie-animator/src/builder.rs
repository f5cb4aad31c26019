//! Builds a [`NodeGraph`] from a parsed animation.

use crate::assets::AssetRegistry;
use crate::config::SceneConfig;
use crate::error::BuildError;
use crate::keyframes::build_provider;
use crate::node::transform::{insert_transform, transform_properties};
use crate::node::{
    pair_mattes, parse_hex_color, AnimatorNode, ChildLayout, FillNode, GroupKind, GroupNode,
    ImageNode, LayerInfo, NodeGraph, NodeId, NodeRole, RepeaterComposite, RepeaterNode, ShapeKind,
    ShapeNode, SolidNode, StrokeNode, TrimNode,
};
use crate::property::{NodeProperty, PropertyMap};
use crate::renderer::{ImageContent, MatteType};
use glam::{Vec2, Vec4};
use lottie_data::model::{self as data, Shape};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, OnceLock};
use tracing::{debug, warn};

fn warn_unsupported_once(what: &'static str, code: String, name: Option<&str>) {
    static UNSUPPORTED: OnceLock<Mutex<HashSet<(&'static str, String)>>> = OnceLock::new();
    let store = UNSUPPORTED.get_or_init(|| Mutex::new(HashSet::new()));
    if let Ok(mut seen) = store.lock() {
        if seen.insert((what, code.clone())) {
            warn!(
                kind = what,
                code = %code,
                name = name.unwrap_or("unnamed"),
                "unsupported {what} is built without content"
            );
        }
    }
}

pub struct SceneGraphBuilder<'a> {
    model: &'a data::LottieJson,
    assets: &'a AssetRegistry,
    config: &'a SceneConfig,
    graph: NodeGraph,
    // Precomposition assets currently being expanded.
    precomp_stack: Vec<&'a str>,
}

impl<'a> SceneGraphBuilder<'a> {
    pub fn new(
        model: &'a data::LottieJson,
        assets: &'a AssetRegistry,
        config: &'a SceneConfig,
    ) -> Self {
        Self {
            model,
            assets,
            config,
            graph: NodeGraph::new(),
            precomp_stack: Vec::new(),
        }
    }

    /// Returns the graph and its composition root.
    pub fn build(mut self) -> Result<(NodeGraph, NodeId), BuildError> {
        let root = self.graph.add(AnimatorNode::new(
            None,
            PropertyMap::new(),
            NodeRole::Group(GroupNode::new(GroupKind::Composition, ChildLayout::Empty)),
        ));
        let model = self.model;
        self.build_layers(root, &model.layers, model.fr)?;

        debug!(
            name = self.model.nm.as_deref().unwrap_or(""),
            nodes = self.graph.len(),
            layers = self.model.layers.len(),
            "built animator graph"
        );
        Ok((self.graph, root))
    }

    fn build_layers(
        &mut self,
        container: NodeId,
        layers: &'a [data::Layer],
        frame_rate: f32,
    ) -> Result<(), BuildError> {
        let mut ids = Vec::with_capacity(layers.len());
        for (position, layer) in layers.iter().enumerate() {
            let id = self.build_layer(layer, position, frame_rate)?;
            self.graph.attach(container, id);
            ids.push(id);
        }

        self.link_parents(layers, &ids)?;

        let stack: Vec<(NodeId, MatteType)> = layers
            .iter()
            .zip(&ids)
            .filter(|(layer, _)| !(self.config.skip_hidden_layers && layer.hd == Some(true)))
            .map(|(layer, &id)| (id, MatteType::from_track_matte(layer.tt)))
            .collect();
        set_layout(&mut self.graph, container, ChildLayout::Layers(pair_mattes(&stack)));
        Ok(())
    }

    /// Resolves `parent` indices into transform chains.
    fn link_parents(&mut self, layers: &[data::Layer], ids: &[NodeId]) -> Result<(), BuildError> {
        let by_index: HashMap<u32, usize> = layers
            .iter()
            .enumerate()
            .filter_map(|(position, layer)| layer.ind.map(|ind| (ind, position)))
            .collect();

        for (position, layer) in layers.iter().enumerate() {
            let mut chain = Vec::new();
            let mut seen = HashSet::from([position]);
            let mut next = layer.parent;
            while let Some(parent) = next {
                let Some(&parent_position) = by_index.get(&parent) else {
                    return Err(BuildError::UnknownParent {
                        layer: layer_name(layer, position),
                        parent,
                    });
                };
                if !seen.insert(parent_position) {
                    return Err(BuildError::ParentCycle {
                        layer: layer_name(layer, position),
                    });
                }
                chain.push(ids[parent_position]);
                next = layers[parent_position].parent;
            }
            if chain.is_empty() {
                continue;
            }
            chain.reverse();

            if let Some(NodeRole::Group(GroupNode {
                kind: GroupKind::Layer(info),
                ..
            })) = self.graph.get_mut(ids[position]).map(|n| n.role_mut())
            {
                info.transform_chain = chain;
            }
        }
        Ok(())
    }

    fn build_layer(
        &mut self,
        layer: &'a data::Layer,
        position: usize,
        frame_rate: f32,
    ) -> Result<NodeId, BuildError> {
        let name = layer_name(layer, position);
        let is_3d = layer.ddd == Some(1);
        let mut properties = transform_properties(&name, &layer.ks, is_3d)?;

        let mut info = LayerInfo::new(layer.ip, layer.op);
        info.start_time = layer.st;
        info.stretch = if layer.sr > 0.0 { layer.sr } else { 1.0 };
        info.is_3d = is_3d;
        info.hidden = layer.hd == Some(true);

        let layout = match layer.ty {
            0 => {
                info.precomposition = true;
                if let Some(tm) = &layer.tm {
                    let label = format!("{name}.Time Remap");
                    properties.insert(
                        "Time Remap",
                        NodeProperty::new(build_provider(&label, tm, 0.0, |v| *v)?),
                    );
                    info.time_remap_rate = Some(frame_rate);
                }
                ChildLayout::Empty
            }
            1 | 2 => ChildLayout::Content,
            3 => ChildLayout::Empty,
            4 => ChildLayout::Shapes,
            other => {
                warn_unsupported_once("layer type", other.to_string(), layer.nm.as_deref());
                ChildLayout::Empty
            }
        };

        let id = self.graph.add(AnimatorNode::new(
            Some(name.clone()),
            properties,
            NodeRole::Group(GroupNode::new(GroupKind::Layer(info), layout)),
        ));

        match layer.ty {
            0 => self.build_precomposition(id, layer, &name)?,
            1 => {
                let color = layer
                    .color
                    .as_deref()
                    .and_then(parse_hex_color)
                    .unwrap_or(Vec4::W);
                let mut props = PropertyMap::new();
                props.insert("Color", NodeProperty::constant(color));
                let solid = SolidNode::new(
                    layer.sw.unwrap_or(0) as f32,
                    layer.sh.unwrap_or(0) as f32,
                );
                let child = self
                    .graph
                    .add(AnimatorNode::new(None, props, NodeRole::Solid(solid)));
                self.graph.attach(id, child);
            }
            2 => {
                let asset = self.asset(layer, &name)?;
                let content = ImageContent {
                    asset_id: asset.id.clone(),
                    width: asset.w.unwrap_or(0),
                    height: asset.h.unwrap_or(0),
                    data: self.assets.resolve(asset),
                };
                let child = self.graph.add(AnimatorNode::new(
                    None,
                    PropertyMap::new(),
                    NodeRole::Image(ImageNode::new(content)),
                ));
                self.graph.attach(id, child);
            }
            4 => {
                if let Some(shapes) = &layer.shapes {
                    self.build_shapes(id, shapes)?;
                }
            }
            _ => {}
        }
        Ok(id)
    }

    fn asset(&self, layer: &data::Layer, name: &str) -> Result<&'a data::Asset, BuildError> {
        let id = layer.ref_id.as_deref().unwrap_or("");
        self.model
            .asset(id)
            .ok_or_else(|| BuildError::MissingAsset {
                layer: name.to_string(),
                asset: id.to_string(),
            })
    }

    fn build_precomposition(
        &mut self,
        id: NodeId,
        layer: &data::Layer,
        name: &str,
    ) -> Result<(), BuildError> {
        let asset = self.asset(layer, name)?;
        let Some(layers) = asset.layers.as_deref() else {
            return Err(BuildError::MissingAsset {
                layer: name.to_string(),
                asset: asset.id.clone(),
            });
        };
        if self.precomp_stack.contains(&asset.id.as_str()) {
            return Err(BuildError::RecursivePrecomposition(asset.id.clone()));
        }

        self.precomp_stack.push(&asset.id);
        let frame_rate = asset.fr.unwrap_or(self.model.fr);
        let built = self.build_layers(id, layers, frame_rate);
        self.precomp_stack.pop();
        built
    }

    fn build_shapes(&mut self, parent: NodeId, items: &[Shape]) -> Result<(), BuildError> {
        for (position, item) in items.iter().enumerate() {
            let Some((name, properties, role)) = shape_node(item, position)? else {
                continue;
            };
            let id = self
                .graph
                .add(AnimatorNode::new(Some(name), properties, role));
            self.graph.attach(parent, id);
            if let Shape::Group(group) = item {
                self.build_shapes(id, &group.it)?;
            }
        }
        Ok(())
    }
}

fn set_layout(graph: &mut NodeGraph, id: NodeId, layout: ChildLayout) {
    if let Some(NodeRole::Group(group)) = graph.get_mut(id).map(|n| n.role_mut()) {
        group.layout = layout;
    }
}

fn layer_name(layer: &data::Layer, position: usize) -> String {
    match (&layer.nm, layer.ind) {
        (Some(nm), _) => nm.clone(),
        (None, Some(ind)) => format!("Layer {ind}"),
        (None, None) => format!("Layer {}", position + 1),
    }
}

fn item_name(nm: &Option<String>, fallback: &str, position: usize) -> String {
    nm.clone()
        .unwrap_or_else(|| format!("{fallback} {}", position + 1))
}

/// Name, properties and role of one shape item. Transform items and hidden
/// groups produce no node.
fn shape_node(
    item: &Shape,
    position: usize,
) -> Result<Option<(String, PropertyMap, NodeRole)>, BuildError> {
    let vec2 = |v: &data::Vec2| Vec2::from(*v);
    let color = |c: &data::Rgba| Vec4::from(c.0);
    let percent = |v: &f32| *v / 100.0;

    let node = match item {
        Shape::Group(group) => {
            if group.hd == Some(true) {
                return Ok(None);
            }
            let name = item_name(&group.nm, "Group", position);
            let fallback = data::Transform::default();
            let ks = group
                .it
                .iter()
                .rev()
                .find_map(|s| match s {
                    Shape::Transform(t) => Some(&t.t),
                    _ => None,
                })
                .unwrap_or(&fallback);
            let properties = transform_properties(&name, ks, false)?;
            let role = NodeRole::Group(GroupNode::new(GroupKind::Shapes, ChildLayout::Shapes));
            (name, properties, role)
        }
        Shape::Rect(rect) => {
            let name = item_name(&rect.nm, "Rectangle", position);
            let label = |p: &str| format!("{name}.{p}");
            let mut properties = PropertyMap::new();
            properties.insert(
                "Size",
                NodeProperty::new(build_provider(&label("Size"), &rect.s, Vec2::ZERO, vec2)?),
            );
            properties.insert(
                "Position",
                NodeProperty::new(build_provider(&label("Position"), &rect.p, Vec2::ZERO, vec2)?),
            );
            properties.insert(
                "Roundness",
                NodeProperty::new(build_provider(&label("Roundness"), &rect.r, 0.0, |v| *v)?),
            );
            (name, properties, NodeRole::Shape(ShapeNode::new(ShapeKind::Rectangle)))
        }
        Shape::Ellipse(ellipse) => {
            let name = item_name(&ellipse.nm, "Ellipse", position);
            let label = |p: &str| format!("{name}.{p}");
            let mut properties = PropertyMap::new();
            properties.insert(
                "Size",
                NodeProperty::new(build_provider(&label("Size"), &ellipse.s, Vec2::ZERO, vec2)?),
            );
            properties.insert(
                "Position",
                NodeProperty::new(build_provider(
                    &label("Position"),
                    &ellipse.p,
                    Vec2::ZERO,
                    vec2,
                )?),
            );
            (name, properties, NodeRole::Shape(ShapeNode::new(ShapeKind::Ellipse)))
        }
        Shape::Path(path) => {
            let name = item_name(&path.nm, "Path", position);
            let mut properties = PropertyMap::new();
            properties.insert(
                "Path",
                NodeProperty::new(build_provider(
                    &format!("{name}.Path"),
                    &path.ks,
                    data::BezierPath::default(),
                    data::BezierPath::clone,
                )?),
            );
            (name, properties, NodeRole::Shape(ShapeNode::new(ShapeKind::Path)))
        }
        Shape::Fill(fill) => {
            let name = item_name(&fill.nm, "Fill", position);
            let label = |p: &str| format!("{name}.{p}");
            let mut properties = PropertyMap::new();
            properties.insert(
                "Color",
                NodeProperty::new(build_provider(&label("Color"), &fill.c, Vec4::ONE, color)?),
            );
            properties.insert(
                "Opacity",
                NodeProperty::new(build_provider(&label("Opacity"), &fill.o, 1.0, percent)?),
            );
            (name, properties, NodeRole::Fill(FillNode::new(fill.r)))
        }
        Shape::Stroke(stroke) => {
            let name = item_name(&stroke.nm, "Stroke", position);
            let label = |p: &str| format!("{name}.{p}");
            let mut properties = PropertyMap::new();
            properties.insert(
                "Color",
                NodeProperty::new(build_provider(&label("Color"), &stroke.c, Vec4::ONE, color)?),
            );
            properties.insert(
                "Opacity",
                NodeProperty::new(build_provider(&label("Opacity"), &stroke.o, 1.0, percent)?),
            );
            properties.insert(
                "Stroke Width",
                NodeProperty::new(build_provider(&label("Stroke Width"), &stroke.w, 1.0, |v| {
                    *v
                })?),
            );
            let role = NodeRole::Stroke(StrokeNode::new(stroke.lc, stroke.lj, stroke.ml));
            (name, properties, role)
        }
        Shape::Trim(trim) => {
            let name = item_name(&trim.nm, "Trim Paths", position);
            let label = |p: &str| format!("{name}.{p}");
            let mut properties = PropertyMap::new();
            properties.insert(
                "Start",
                NodeProperty::new(build_provider(&label("Start"), &trim.s, 0.0, percent)?),
            );
            properties.insert(
                "End",
                NodeProperty::new(build_provider(&label("End"), &trim.e, 1.0, percent)?),
            );
            properties.insert(
                "Offset",
                NodeProperty::new(build_provider(&label("Offset"), &trim.o, 0.0, |v| {
                    *v / 360.0
                })?),
            );
            (name, properties, NodeRole::Trim(TrimNode::new()))
        }
        Shape::Repeater(repeater) => {
            let name = item_name(&repeater.nm, "Repeater", position);
            let label = |p: &str| format!("{name}.{p}");
            let mut properties = PropertyMap::new();
            properties.insert(
                "Copies",
                NodeProperty::new(build_provider(&label("Copies"), &repeater.c, 1.0, |v| *v)?),
            );
            properties.insert(
                "Offset",
                NodeProperty::new(build_provider(&label("Offset"), &repeater.o, 0.0, |v| *v)?),
            );
            insert_transform(&mut properties, &name, &repeater.tr.t, false)?;
            properties.insert(
                "Start Opacity",
                NodeProperty::new(build_provider(
                    &label("Start Opacity"),
                    &repeater.tr.so,
                    1.0,
                    percent,
                )?),
            );
            properties.insert(
                "End Opacity",
                NodeProperty::new(build_provider(
                    &label("End Opacity"),
                    &repeater.tr.eo,
                    1.0,
                    percent,
                )?),
            );
            let role = NodeRole::Repeater(RepeaterNode::new(RepeaterComposite::from_mode(
                repeater.m,
            )));
            (name, properties, role)
        }
        Shape::Transform(_) => return Ok(None),
        Shape::Unknown => {
            warn_unsupported_once("shape", "unknown".to_string(), None);
            return Ok(None);
        }
    };
    Ok(Some(node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model(value: serde_json::Value) -> data::LottieJson {
        serde_json::from_value(value).unwrap()
    }

    fn build(value: serde_json::Value) -> Result<(NodeGraph, NodeId), BuildError> {
        let model = model(value);
        SceneGraphBuilder::new(&model, &AssetRegistry::new(), &SceneConfig::default()).build()
    }

    #[test]
    fn test_unnamed_items_get_fallback_names() {
        let (graph, root) = build(json!({
            "ip": 0, "op": 10, "fr": 30, "w": 100, "h": 100,
            "layers": [{
                "ty": 4, "ind": 3, "ip": 0, "op": 10,
                "shapes": [{
                    "ty": "gr",
                    "it": [
                        { "ty": "rc", "s": { "k": [10, 10] }, "p": { "k": [0, 0] } },
                        { "ty": "fl", "c": { "k": [1, 0, 0] }, "o": { "k": 100 } },
                        { "ty": "tr" }
                    ]
                }]
            }]
        }))
        .unwrap();

        let layer = graph.get(root).unwrap().children()[0];
        assert_eq!(graph.get(layer).unwrap().keypath_name(), Some("Layer 3"));
        let group = graph.get(layer).unwrap().children()[0];
        let items = graph.get(group).unwrap().children();
        assert_eq!(items.len(), 2);
        assert_eq!(graph.address(items[1]), vec!["Layer 3", "Group 1", "Fill 2"]);
    }

    #[test]
    fn test_hidden_layers_are_built_but_not_laid_out() {
        let (graph, root) = build(json!({
            "ip": 0, "op": 10, "fr": 30, "w": 100, "h": 100,
            "layers": [
                { "ty": 3, "ind": 1, "nm": "Hidden", "hd": true, "ip": 0, "op": 10 },
                { "ty": 3, "ind": 2, "nm": "Child", "parent": 1, "ip": 0, "op": 10 }
            ]
        }))
        .unwrap();

        let root_node = graph.get(root).unwrap();
        assert_eq!(root_node.children().len(), 2);
        let Some(ChildLayout::Layers(slots)) = root_node.role().as_group().map(|g| g.layout())
        else {
            panic!("composition should lay out layers");
        };
        assert_eq!(slots.len(), 1);

        let child = graph.get(root_node.children()[1]).unwrap();
        let info = child.role().as_group().and_then(|g| g.layer_info()).unwrap();
        assert_eq!(info.transform_chain, vec![root_node.children()[0]]);
    }

    #[test]
    fn test_parent_errors() {
        let unknown = build(json!({
            "ip": 0, "op": 10, "fr": 30, "w": 100, "h": 100,
            "layers": [{ "ty": 3, "ind": 1, "nm": "A", "parent": 9, "ip": 0, "op": 10 }]
        }));
        assert!(matches!(unknown, Err(BuildError::UnknownParent { parent: 9, .. })));

        let cycle = build(json!({
            "ip": 0, "op": 10, "fr": 30, "w": 100, "h": 100,
            "layers": [
                { "ty": 3, "ind": 1, "nm": "A", "parent": 2, "ip": 0, "op": 10 },
                { "ty": 3, "ind": 2, "nm": "B", "parent": 1, "ip": 0, "op": 10 }
            ]
        }));
        assert!(matches!(cycle, Err(BuildError::ParentCycle { .. })));
    }

    #[test]
    fn test_precomposition_errors() {
        let missing = build(json!({
            "ip": 0, "op": 10, "fr": 30, "w": 100, "h": 100,
            "layers": [{ "ty": 0, "nm": "Pre", "refId": "nope", "ip": 0, "op": 10 }]
        }));
        assert!(matches!(missing, Err(BuildError::MissingAsset { .. })));

        let recursive = build(json!({
            "ip": 0, "op": 10, "fr": 30, "w": 100, "h": 100,
            "assets": [{
                "id": "loop",
                "layers": [{ "ty": 0, "nm": "Inner", "refId": "loop", "ip": 0, "op": 10 }]
            }],
            "layers": [{ "ty": 0, "nm": "Outer", "refId": "loop", "ip": 0, "op": 10 }]
        }));
        assert!(matches!(
            recursive,
            Err(BuildError::RecursivePrecomposition(id)) if id == "loop"
        ));
    }
}
