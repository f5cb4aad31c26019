//! The closed set of value kinds an animatable property can hold.

use glam::{Vec2, Vec3, Vec4};
use lottie_data::model::BezierPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Scalar,
    Vector2,
    Vector3,
    Color,
    Path,
}

/// A resolved property value, tagged with its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Scalar(f32),
    Vector2(Vec2),
    Vector3(Vec3),
    Color(Vec4),
    Path(BezierPath),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Scalar(_) => ValueKind::Scalar,
            PropertyValue::Vector2(_) => ValueKind::Vector2,
            PropertyValue::Vector3(_) => ValueKind::Vector3,
            PropertyValue::Color(_) => ValueKind::Color,
            PropertyValue::Path(_) => ValueKind::Path,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            PropertyValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector2(&self) -> Option<Vec2> {
        match self {
            PropertyValue::Vector2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector3(&self) -> Option<Vec3> {
        match self {
            PropertyValue::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Vec4> {
        match self {
            PropertyValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&BezierPath> {
        match self {
            PropertyValue::Path(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Scalar(v)
    }
}

impl From<Vec2> for PropertyValue {
    fn from(v: Vec2) -> Self {
        PropertyValue::Vector2(v)
    }
}

impl From<Vec3> for PropertyValue {
    fn from(v: Vec3) -> Self {
        PropertyValue::Vector3(v)
    }
}

impl From<Vec4> for PropertyValue {
    fn from(v: Vec4) -> Self {
        PropertyValue::Color(v)
    }
}

impl From<BezierPath> for PropertyValue {
    fn from(v: BezierPath) -> Self {
        PropertyValue::Path(v)
    }
}
