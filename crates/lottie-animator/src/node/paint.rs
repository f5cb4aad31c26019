//! Fill and stroke styles applied to the geometry preceding them in a group.

use super::NodeBehavior;
use crate::property::PropertyMap;
use crate::renderer::{Fill, FillRule, LineCap, LineJoin, Stroke};
use glam::Vec4;

#[derive(Debug)]
pub struct FillNode {
    fill: Fill,
}

impl FillNode {
    /// `rule` is the model `r` field: 2 selects even-odd.
    pub fn new(rule: Option<u8>) -> Self {
        let rule = match rule {
            Some(2) => FillRule::EvenOdd,
            _ => FillRule::NonZero,
        };
        Self {
            fill: Fill {
                color: Vec4::ONE,
                opacity: 1.0,
                rule,
            },
        }
    }

    pub fn fill(&self) -> &Fill {
        &self.fill
    }
}

impl NodeBehavior for FillNode {
    fn perform_additional_output_updates(&mut self, properties: &PropertyMap) {
        self.fill.color = properties.color("Color", Vec4::ONE);
        self.fill.opacity = properties.scalar("Opacity", 1.0);
    }
}

#[derive(Debug)]
pub struct StrokeNode {
    stroke: Stroke,
}

impl StrokeNode {
    pub fn new(lc: u8, lj: u8, miter_limit: Option<f32>) -> Self {
        let cap = match lc {
            1 => LineCap::Butt,
            3 => LineCap::Square,
            _ => LineCap::Round,
        };
        let join = match lj {
            1 => LineJoin::Miter,
            3 => LineJoin::Bevel,
            _ => LineJoin::Round,
        };
        Self {
            stroke: Stroke {
                color: Vec4::ONE,
                width: 1.0,
                opacity: 1.0,
                cap,
                join,
                miter_limit,
            },
        }
    }

    pub fn stroke(&self) -> &Stroke {
        &self.stroke
    }
}

impl NodeBehavior for StrokeNode {
    fn perform_additional_output_updates(&mut self, properties: &PropertyMap) {
        self.stroke.color = properties.color("Color", Vec4::ONE);
        self.stroke.opacity = properties.scalar("Opacity", 1.0);
        self.stroke.width = properties.scalar("Stroke Width", 1.0);
    }
}
