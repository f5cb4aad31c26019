//! Animatable node properties and the per-construct property map.

use crate::animatable::{ClosureProvider, ConstantProvider, Interpolatable, SharedProvider};
use crate::value::{PropertyValue, ValueKind};
use glam::{Vec2, Vec3, Vec4};
use lottie_data::model::BezierPath;
use std::fmt;
use std::sync::Arc;

/// One animatable attribute: a provider plus the value it produced for the
/// last evaluated frame.
pub struct NodeProperty<T> {
    provider: SharedProvider<T>,
    value: T,
    needs_update: bool,
    last_frame: Option<f32>,
}

impl<T> NodeProperty<T>
where
    T: Interpolatable + Send + Sync + 'static,
{
    pub fn new(provider: SharedProvider<T>) -> Self {
        let value = provider.value(0.0);
        Self {
            provider,
            value,
            needs_update: true,
            last_frame: None,
        }
    }

    pub fn constant(value: T) -> Self {
        Self::new(Arc::new(ConstantProvider(value)))
    }

    /// Value cached by the last [`update`](Self::update).
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn provider(&self) -> &SharedProvider<T> {
        &self.provider
    }

    pub fn last_frame(&self) -> Option<f32> {
        self.last_frame
    }

    /// Whether [`update`](Self::update) at `frame` would evaluate the provider.
    pub fn needs_update(&self, frame: f32) -> bool {
        match self.last_frame {
            None => true,
            Some(last) => self.needs_update || (last != frame && self.provider.is_animated()),
        }
    }

    /// Evaluates the provider at `frame` and caches the result. Returns `true`
    /// when the cached value changed; the first evaluation always counts as a
    /// change.
    pub fn update(&mut self, frame: f32) -> bool {
        if !self.needs_update(frame) {
            self.last_frame = Some(frame);
            return false;
        }

        let next = self.provider.value(frame);
        let changed = self.last_frame.is_none() || next != self.value;
        self.value = next;
        self.needs_update = false;
        self.last_frame = Some(frame);
        changed
    }

    /// Replaces the provider. The next update re-evaluates regardless of frame.
    pub fn set_provider(&mut self, provider: SharedProvider<T>) {
        self.provider = provider;
        self.needs_update = true;
    }

    /// Evaluates at an arbitrary frame without touching the cache.
    pub fn value_at(&self, frame: f32) -> T {
        self.provider.value(frame)
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeProperty")
            .field("value", &self.value)
            .field("needs_update", &self.needs_update)
            .field("last_frame", &self.last_frame)
            .finish()
    }
}

/// Type-erased provider handed in through keypath overrides.
#[derive(Clone)]
pub enum AnyProvider {
    Scalar(SharedProvider<f32>),
    Vector2(SharedProvider<Vec2>),
    Vector3(SharedProvider<Vec3>),
    Color(SharedProvider<Vec4>),
    Path(SharedProvider<BezierPath>),
}

impl AnyProvider {
    pub fn kind(&self) -> ValueKind {
        match self {
            AnyProvider::Scalar(_) => ValueKind::Scalar,
            AnyProvider::Vector2(_) => ValueKind::Vector2,
            AnyProvider::Vector3(_) => ValueKind::Vector3,
            AnyProvider::Color(_) => ValueKind::Color,
            AnyProvider::Path(_) => ValueKind::Path,
        }
    }

    pub fn constant(value: impl Into<PropertyValue>) -> Self {
        match value.into() {
            PropertyValue::Scalar(v) => AnyProvider::Scalar(Arc::new(ConstantProvider(v))),
            PropertyValue::Vector2(v) => AnyProvider::Vector2(Arc::new(ConstantProvider(v))),
            PropertyValue::Vector3(v) => AnyProvider::Vector3(Arc::new(ConstantProvider(v))),
            PropertyValue::Color(v) => AnyProvider::Color(Arc::new(ConstantProvider(v))),
            PropertyValue::Path(v) => AnyProvider::Path(Arc::new(ConstantProvider(v))),
        }
    }

    pub fn scalar_fn(f: impl Fn(f32) -> f32 + Send + Sync + 'static) -> Self {
        AnyProvider::Scalar(Arc::new(ClosureProvider(f)))
    }

    pub fn vector2_fn(f: impl Fn(f32) -> Vec2 + Send + Sync + 'static) -> Self {
        AnyProvider::Vector2(Arc::new(ClosureProvider(f)))
    }

    pub fn vector3_fn(f: impl Fn(f32) -> Vec3 + Send + Sync + 'static) -> Self {
        AnyProvider::Vector3(Arc::new(ClosureProvider(f)))
    }

    pub fn color_fn(f: impl Fn(f32) -> Vec4 + Send + Sync + 'static) -> Self {
        AnyProvider::Color(Arc::new(ClosureProvider(f)))
    }
}

impl fmt::Debug for AnyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyProvider").field(&self.kind()).finish()
    }
}

/// Closed set of property value kinds stored in a [`PropertyMap`].
#[derive(Debug)]
pub enum AnyNodeProperty {
    Scalar(NodeProperty<f32>),
    Vector2(NodeProperty<Vec2>),
    Vector3(NodeProperty<Vec3>),
    Color(NodeProperty<Vec4>),
    Path(NodeProperty<BezierPath>),
}

macro_rules! dispatch {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            AnyNodeProperty::Scalar($p) => $body,
            AnyNodeProperty::Vector2($p) => $body,
            AnyNodeProperty::Vector3($p) => $body,
            AnyNodeProperty::Color($p) => $body,
            AnyNodeProperty::Path($p) => $body,
        }
    };
}

impl AnyNodeProperty {
    pub fn kind(&self) -> ValueKind {
        match self {
            AnyNodeProperty::Scalar(_) => ValueKind::Scalar,
            AnyNodeProperty::Vector2(_) => ValueKind::Vector2,
            AnyNodeProperty::Vector3(_) => ValueKind::Vector3,
            AnyNodeProperty::Color(_) => ValueKind::Color,
            AnyNodeProperty::Path(_) => ValueKind::Path,
        }
    }

    pub fn value(&self) -> PropertyValue {
        dispatch!(self, p => p.value().clone().into())
    }

    pub fn value_at(&self, frame: f32) -> PropertyValue {
        dispatch!(self, p => p.value_at(frame).into())
    }

    pub fn update(&mut self, frame: f32) -> bool {
        dispatch!(self, p => p.update(frame))
    }

    pub fn needs_update(&self, frame: f32) -> bool {
        dispatch!(self, p => p.needs_update(frame))
    }

    pub fn is_animated(&self) -> bool {
        dispatch!(self, p => p.provider().is_animated())
    }

    /// Installs `provider` if it produces this property's value kind. On a
    /// mismatch the provider is handed back unchanged.
    pub fn set_provider(&mut self, provider: AnyProvider) -> Result<(), AnyProvider> {
        match (self, provider) {
            (AnyNodeProperty::Scalar(p), AnyProvider::Scalar(v)) => p.set_provider(v),
            (AnyNodeProperty::Vector2(p), AnyProvider::Vector2(v)) => p.set_provider(v),
            (AnyNodeProperty::Vector3(p), AnyProvider::Vector3(v)) => p.set_provider(v),
            (AnyNodeProperty::Color(p), AnyProvider::Color(v)) => p.set_provider(v),
            (AnyNodeProperty::Path(p), AnyProvider::Path(v)) => p.set_provider(v),
            (_, other) => return Err(other),
        }
        Ok(())
    }
}

impl From<NodeProperty<f32>> for AnyNodeProperty {
    fn from(p: NodeProperty<f32>) -> Self {
        AnyNodeProperty::Scalar(p)
    }
}

impl From<NodeProperty<Vec2>> for AnyNodeProperty {
    fn from(p: NodeProperty<Vec2>) -> Self {
        AnyNodeProperty::Vector2(p)
    }
}

impl From<NodeProperty<Vec3>> for AnyNodeProperty {
    fn from(p: NodeProperty<Vec3>) -> Self {
        AnyNodeProperty::Vector3(p)
    }
}

impl From<NodeProperty<Vec4>> for AnyNodeProperty {
    fn from(p: NodeProperty<Vec4>) -> Self {
        AnyNodeProperty::Color(p)
    }
}

impl From<NodeProperty<BezierPath>> for AnyNodeProperty {
    fn from(p: NodeProperty<BezierPath>) -> Self {
        AnyNodeProperty::Path(p)
    }
}

/// Named properties of one construct, in insertion order.
///
/// The optional scope is an extra keypath segment placed between the owning
/// node and the property names (groups use `Transform`).
#[derive(Debug, Default)]
pub struct PropertyMap {
    scope: Option<String>,
    entries: Vec<(String, AnyNodeProperty)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            entries: Vec::new(),
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Inserts a property, replacing any existing one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, property: impl Into<AnyNodeProperty>) {
        let name = name.into();
        let property = property.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = property,
            None => self.entries.push((name, property)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AnyNodeProperty> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AnyNodeProperty> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnyNodeProperty)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut AnyNodeProperty)> {
        self.entries.iter_mut().map(|(n, p)| (n.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn scalar(&self, name: &str, default: f32) -> f32 {
        match self.get(name) {
            Some(AnyNodeProperty::Scalar(p)) => *p.value(),
            _ => default,
        }
    }

    pub fn vector2(&self, name: &str, default: Vec2) -> Vec2 {
        match self.get(name) {
            Some(AnyNodeProperty::Vector2(p)) => *p.value(),
            _ => default,
        }
    }

    pub fn vector3(&self, name: &str, default: Vec3) -> Vec3 {
        match self.get(name) {
            Some(AnyNodeProperty::Vector3(p)) => *p.value(),
            _ => default,
        }
    }

    pub fn color(&self, name: &str, default: Vec4) -> Vec4 {
        match self.get(name) {
            Some(AnyNodeProperty::Color(p)) => *p.value(),
            _ => default,
        }
    }

    pub fn path(&self, name: &str) -> Option<&BezierPath> {
        match self.get(name) {
            Some(AnyNodeProperty::Path(p)) => Some(p.value()),
            _ => None,
        }
    }

    /// Scalar value at `frame` computed straight from the provider.
    pub fn scalar_at(&self, name: &str, frame: f32) -> Option<f32> {
        match self.get(name) {
            Some(AnyNodeProperty::Scalar(p)) => Some(p.value_at(frame)),
            _ => None,
        }
    }

    /// Updates every property; returns whether any value changed.
    pub fn update(&mut self, frame: f32) -> bool {
        self.entries
            .iter_mut()
            .fold(false, |changed, (_, p)| p.update(frame) | changed)
    }

    pub fn needs_update(&self, frame: f32) -> bool {
        self.entries.iter().any(|(_, p)| p.needs_update(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animatable::{Keyframe, KeyframeInterpolator};

    fn animated_opacity() -> NodeProperty<f32> {
        let interp = KeyframeInterpolator::new(vec![Keyframe::linear(0.0, 10.0, 0.0, 1.0)]).unwrap();
        NodeProperty::new(Arc::new(interp))
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut prop = animated_opacity();
        assert!(prop.update(5.0));
        assert_eq!(*prop.value(), 0.5);
        assert!(!prop.update(5.0));
        assert!(prop.update(6.0));
    }

    #[test]
    fn test_constant_skips_evaluation_after_first_frame() {
        let mut prop = NodeProperty::constant(Vec2::new(3.0, 4.0));
        assert!(prop.needs_update(0.0));
        assert!(prop.update(0.0));
        assert!(!prop.needs_update(1.0e6));
        assert!(!prop.update(1.0e6));
        assert_eq!(*prop.value(), Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_set_provider_forces_reevaluation() {
        let mut prop = NodeProperty::constant(1.0_f32);
        prop.update(3.0);

        prop.set_provider(Arc::new(ConstantProvider(1.0)));
        assert!(prop.needs_update(3.0));
        // Same value: evaluated, but not reported as a change.
        assert!(!prop.update(3.0));

        prop.set_provider(Arc::new(ClosureProvider(|frame: f32| frame * 10.0)));
        assert!(prop.update(3.0));
        assert_eq!(*prop.value(), 30.0);
    }

    #[test]
    fn test_value_at_leaves_cache_alone() {
        let mut prop = animated_opacity();
        prop.update(2.0);
        assert_eq!(prop.value_at(8.0), 0.8);
        assert_eq!(*prop.value(), 0.2);
        assert!(!prop.update(2.0));
    }

    #[test]
    fn test_map_readers_and_defaults() {
        let mut map = PropertyMap::scoped("Transform");
        map.insert("Opacity", animated_opacity());
        map.insert("Position", NodeProperty::constant(Vec3::new(10.0, 20.0, 0.0)));
        assert_eq!(map.scope(), Some("Transform"));
        assert_eq!(map.len(), 2);

        assert!(map.update(10.0));
        assert_eq!(map.scalar("Opacity", 0.0), 1.0);
        assert_eq!(map.vector3("Position", Vec3::ZERO), Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(map.vector3("Scale", Vec3::ONE), Vec3::ONE);
        // Wrong kind falls back to the default as well.
        assert_eq!(map.scalar("Position", -1.0), -1.0);
        assert!(map.path("Path").is_none());

        assert!(!map.update(10.0));
        assert!(!map.needs_update(10.0));
        assert!(map.needs_update(11.0));
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let mut map = PropertyMap::new();
        map.insert("Rotation", NodeProperty::constant(10.0_f32));
        map.insert("Rotation", NodeProperty::constant(20.0_f32));
        assert_eq!(map.len(), 1);
        map.update(0.0);
        assert_eq!(map.scalar("Rotation", 0.0), 20.0);
    }

    #[test]
    fn test_kind_checked_override() {
        let mut prop: AnyNodeProperty = NodeProperty::constant(Vec4::ONE).into();
        let rejected = prop.set_provider(AnyProvider::constant(0.5_f32));
        assert_eq!(rejected.err().map(|p| p.kind()), Some(ValueKind::Scalar));

        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        assert!(prop.set_provider(AnyProvider::constant(red)).is_ok());
        assert!(prop.update(0.0));
        assert_eq!(prop.value(), PropertyValue::Color(red));
    }
}
