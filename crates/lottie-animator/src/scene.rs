//! Scene façade: builds the node graph, evaluates frames and exposes
//! keypath queries and overrides.

use crate::assets::AssetRegistry;
use crate::builder::SceneGraphBuilder;
use crate::config::SceneConfig;
use crate::error::{BuildError, KeypathError};
use crate::keypath::Keypath;
use crate::node::{AnimatorNode, NodeGraph, NodeId};
use crate::property::AnyProvider;
use crate::renderer::RenderTree;
use crate::value::PropertyValue;
use lottie_data::model::LottieJson;
use tracing::trace;

/// A property matched by a keypath: owning node, name inside its map and
/// full dotted address.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMatch {
    pub node: NodeId,
    pub name: String,
    pub keypath: String,
}

#[derive(Debug)]
pub struct AnimationScene {
    graph: NodeGraph,
    root: NodeId,
    width: f32,
    height: f32,
    in_point: f32,
    out_point: f32,
    frame_rate: f32,
    current_frame: f32,
    config: SceneConfig,
}

impl AnimationScene {
    /// Builds the graph and evaluates it at the in point.
    pub fn from_model(
        model: &LottieJson,
        assets: &AssetRegistry,
        config: &SceneConfig,
    ) -> Result<Self, BuildError> {
        let (graph, root) = SceneGraphBuilder::new(model, assets, config).build()?;
        let mut scene = Self {
            graph,
            root,
            width: model.w as f32,
            height: model.h as f32,
            in_point: model.ip,
            out_point: model.op,
            frame_rate: config.frame_rate.unwrap_or(model.fr),
            current_frame: model.ip,
            config: config.clone(),
        };
        scene.graph.evaluate(root, model.ip, true);
        Ok(scene)
    }

    pub fn from_json_str(
        json: &str,
        assets: &AssetRegistry,
        config: &SceneConfig,
    ) -> Result<Self, BuildError> {
        let model = LottieJson::from_str(json)?;
        Self::from_model(&model, assets, config)
    }

    /// Evaluates the scene at `frame`. Returns `false` when nothing changed
    /// since the previous evaluation.
    pub fn update(&mut self, frame: f32) -> bool {
        self.current_frame = frame;
        self.graph.evaluate(self.root, frame, false)
    }

    /// Re-evaluates every node regardless of dirty state.
    pub fn force_update(&mut self, frame: f32) {
        self.current_frame = frame;
        self.graph.evaluate(self.root, frame, true);
    }

    pub fn render_tree(&self) -> RenderTree {
        RenderTree {
            width: self.width,
            height: self.height,
            frame: self.current_frame,
            root: self.graph.container(self.root),
        }
    }

    /// Every addressable property, in graph order.
    pub fn keypaths(&self) -> Vec<String> {
        self.collect_matches(|_| true)
            .into_iter()
            .map(|m| m.keypath)
            .collect()
    }

    pub fn resolve(&self, keypath: &str) -> Vec<PropertyMatch> {
        let pattern = Keypath::parse(keypath);
        self.collect_matches(|address| pattern.matches(address))
    }

    /// Cached values of the matched properties at the last evaluated frame.
    pub fn property_values(&self, keypath: &str) -> Vec<(String, PropertyValue)> {
        self.resolve(keypath)
            .into_iter()
            .filter_map(|m| {
                let property = self.graph.get(m.node)?.properties().get(&m.name)?;
                Some((m.keypath, property.value()))
            })
            .collect()
    }

    /// Values of the matched properties at composition frame `frame`,
    /// leaving the scene as is. Properties inside precompositions see the
    /// same remapped time [`update`](Self::update) would give them.
    pub fn value_at(&self, keypath: &str, frame: f32) -> Vec<(String, PropertyValue)> {
        self.resolve(keypath)
            .into_iter()
            .filter_map(|m| {
                let property = self.graph.get(m.node)?.properties().get(&m.name)?;
                let local = self.graph.local_frame(m.node, frame);
                Some((m.keypath, property.value_at(local)))
            })
            .collect()
    }

    /// Installs `provider` on every matched property of the same value kind.
    /// Returns how many properties took it; the change is applied by the next
    /// [`update`](Self::update).
    pub fn set_value_provider(
        &mut self,
        keypath: &str,
        provider: AnyProvider,
    ) -> Result<usize, KeypathError> {
        let matches = self.resolve(keypath);
        let mut installed = 0;
        let mut rejected = None;

        for m in &matches {
            let Some(property) = self
                .graph
                .get_mut(m.node)
                .and_then(|n| n.properties_mut().get_mut(&m.name))
            else {
                continue;
            };
            let expected = property.kind();
            match property.set_provider(provider.clone()) {
                Ok(()) => {
                    installed += 1;
                    trace!(keypath = %m.keypath, kind = ?expected, "installed value provider");
                }
                Err(_) => {
                    rejected.get_or_insert(expected);
                }
            }
        }

        match rejected {
            Some(expected) if installed == 0 => Err(KeypathError::KindMismatch {
                keypath: keypath.to_string(),
                expected,
                provided: provider.kind(),
            }),
            _ => Ok(installed),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&AnimatorNode> {
        self.graph.get(id)
    }

    /// Nodes whose own address matches `keypath`.
    pub fn find_nodes(&self, keypath: &str) -> Vec<NodeId> {
        let pattern = Keypath::parse(keypath);
        self.graph
            .iter()
            .filter(|(_, node)| node.keypath_name().is_some())
            .map(|(id, _)| id)
            .filter(|&id| pattern.matches(&self.graph.address(id)))
            .collect()
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn in_point(&self) -> f32 {
        self.in_point
    }

    pub fn out_point(&self) -> f32 {
        self.out_point
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    pub fn current_frame(&self) -> f32 {
        self.current_frame
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    fn collect_matches(&self, mut accept: impl FnMut(&[&str]) -> bool) -> Vec<PropertyMatch> {
        let mut found = Vec::new();
        for (id, node) in self.graph.iter() {
            let mut address = self.graph.address(id);
            if let Some(scope) = node.properties().scope() {
                address.push(scope);
            }
            for (name, _) in node.properties().iter() {
                address.push(name);
                if accept(&address) {
                    found.push(PropertyMatch {
                        node: id,
                        name: name.to_string(),
                        keypath: address.join("."),
                    });
                }
                address.pop();
            }
        }
        found
    }
}

/// Drives a scene from wall-clock time.
#[derive(Debug)]
pub struct LottiePlayer {
    scene: AnimationScene,
    current_frame: f32,
}

impl LottiePlayer {
    pub fn new(scene: AnimationScene) -> Self {
        let current_frame = scene.in_point();
        Self {
            scene,
            current_frame,
        }
    }

    /// Advances by `dt` seconds and evaluates the new frame.
    pub fn advance(&mut self, dt: f32) {
        let ip = self.scene.in_point();
        let op = self.scene.out_point();
        self.current_frame += dt * self.scene.frame_rate();

        if self.current_frame >= op {
            let duration = op - ip;
            self.current_frame = if self.scene.config().loop_playback && duration > 0.0 {
                ip + (self.current_frame - op) % duration
            } else {
                (op - 1.0).max(ip)
            };
        }
        self.scene.update(self.current_frame);
    }

    pub fn seek(&mut self, frame: f32) {
        self.current_frame = frame;
        self.scene.update(frame);
    }

    pub fn render_tree(&self) -> RenderTree {
        self.scene.render_tree()
    }

    pub fn current_frame(&self) -> f32 {
        self.current_frame
    }

    pub fn scene(&self) -> &AnimationScene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut AnimationScene {
        &mut self.scene
    }
}
