//! Render instructions produced by an evaluation pass.
//!
//! Containers are shared through `Arc`, so subtrees that did not change
//! between frames are handed out again without copying.

use glam::{Mat3, Mat4, Vec4};
use kurbo::BezPath;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RenderTree {
    pub width: f32,
    pub height: f32,
    pub frame: f32,
    pub root: Arc<RenderContainer>,
}

/// Drawable content of one group node and its subtree.
#[derive(Debug, Clone)]
pub struct RenderContainer {
    pub name: Option<String>,
    /// Transform relative to the owning container.
    pub transform: Mat4,
    /// Fully composed transform, including layer parent chains.
    pub world_transform: Mat4,
    pub opacity: f32,
    pub visible: bool,
    pub content: ContainerContent,
    pub matte: Option<Box<Matte>>,
}

impl Default for RenderContainer {
    fn default() -> Self {
        Self {
            name: None,
            transform: Mat4::IDENTITY,
            world_transform: Mat4::IDENTITY,
            opacity: 1.0,
            visible: true,
            content: ContainerContent::Empty,
            matte: None,
        }
    }
}

impl RenderContainer {
    /// Child layer containers, back to front. Empty for non-composition content.
    pub fn layers(&self) -> &[Arc<RenderContainer>] {
        match &self.content {
            ContainerContent::Layers(layers) => layers,
            _ => &[],
        }
    }

    pub fn shapes(&self) -> &[ShapeEntry] {
        match &self.content {
            ContainerContent::Shapes(shapes) => shapes,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub enum ContainerContent {
    /// Layers back to front.
    Layers(Vec<Arc<RenderContainer>>),
    /// Shape entries back to front.
    Shapes(Vec<ShapeEntry>),
    Image(ImageContent),
    Empty,
}

#[derive(Debug, Clone)]
pub struct ShapeEntry {
    pub transform: Mat3,
    pub alpha: f32,
    pub content: ShapeContent,
}

impl ShapeEntry {
    pub fn draw(item: ShapeItem) -> Self {
        Self {
            transform: Mat3::IDENTITY,
            alpha: 1.0,
            content: ShapeContent::Draw(item),
        }
    }

    pub fn group(container: Arc<RenderContainer>) -> Self {
        Self {
            transform: Mat3::IDENTITY,
            alpha: 1.0,
            content: ShapeContent::Group(container),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ShapeContent {
    Draw(ShapeItem),
    Group(Arc<RenderContainer>),
}

#[derive(Debug, Clone)]
pub struct ShapeItem {
    pub geometry: BezPath,
    pub fill: Option<Fill>,
    pub stroke: Option<Stroke>,
    pub trim: Option<Trim>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub color: Vec4,
    pub opacity: f32,
    pub rule: FillRule,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: Vec4,
    pub width: f32,
    pub opacity: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: Option<f32>,
}

/// Visible portion of a path. `start`/`end` are fractions of its length,
/// `offset` is in turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trim {
    pub start: f32,
    pub end: f32,
    pub offset: f32,
}

#[derive(Debug, Clone)]
pub struct Matte {
    pub mode: MatteType,
    pub source: Arc<RenderContainer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatteType {
    #[default]
    None,
    Add,
    Invert,
    Luma,
    LumaInverted,
}

impl MatteType {
    /// Maps the layer `tt` field.
    pub fn from_track_matte(tt: Option<u8>) -> Self {
        match tt {
            Some(1) => MatteType::Add,
            Some(2) => MatteType::Invert,
            Some(3) => MatteType::Luma,
            Some(4) => MatteType::LumaInverted,
            _ => MatteType::None,
        }
    }

    /// Consumers take the next rendered sibling as their matte.
    pub fn is_consumer(self) -> bool {
        self != MatteType::None
    }
}

#[derive(Debug, Clone)]
pub struct ImageContent {
    pub asset_id: String,
    pub width: u32,
    pub height: u32,
    /// Encoded image bytes (PNG/JPEG). `None` when no provider supplied them.
    pub data: Option<Arc<[u8]>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}
