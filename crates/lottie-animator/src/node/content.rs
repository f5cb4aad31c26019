//! Content of solid and image layers.

use super::NodeBehavior;
use crate::property::PropertyMap;
use crate::renderer::{Fill, FillRule, ImageContent, ShapeEntry, ShapeItem};
use glam::Vec4;
use kurbo::Shape as _;

/// A solid layer's colored rectangle, anchored at the layer origin.
#[derive(Debug)]
pub struct SolidNode {
    width: f32,
    height: f32,
    entries: Vec<ShapeEntry>,
}

impl SolidNode {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[ShapeEntry] {
        &self.entries
    }
}

impl NodeBehavior for SolidNode {
    fn perform_additional_output_updates(&mut self, properties: &PropertyMap) {
        let rect = kurbo::Rect::new(0.0, 0.0, self.width as f64, self.height as f64);
        self.entries = vec![ShapeEntry::draw(ShapeItem {
            geometry: rect.to_path(0.1),
            fill: Some(Fill {
                color: properties.color("Color", Vec4::W),
                opacity: 1.0,
                rule: FillRule::NonZero,
            }),
            stroke: None,
            trim: None,
        })];
    }
}

/// Parses `#rrggbb` (or `#rgb`) into an opaque color.
pub(crate) fn parse_hex_color(hex: &str) -> Option<Vec4> {
    let digits = hex.trim().trim_start_matches('#');
    let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
    match digits.len() {
        6 => Some(Vec4::new(
            channel(digits.get(0..2)?)?,
            channel(digits.get(2..4)?)?,
            channel(digits.get(4..6)?)?,
            1.0,
        )),
        3 => {
            let short = |i: usize| -> Option<f32> {
                let c = digits.get(i..i + 1)?;
                channel(&format!("{c}{c}"))
            };
            Some(Vec4::new(short(0)?, short(1)?, short(2)?, 1.0))
        }
        _ => None,
    }
}

#[derive(Debug)]
pub struct ImageNode {
    content: ImageContent,
}

impl ImageNode {
    pub fn new(content: ImageContent) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &ImageContent {
        &self.content
    }
}

impl NodeBehavior for ImageNode {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::NodeProperty;
    use crate::renderer::ShapeContent;

    #[test]
    fn test_hex_colors() {
        assert_eq!(parse_hex_color("#ff0000"), Some(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(parse_hex_color("#0f0"), Some(Vec4::new(0.0, 1.0, 0.0, 1.0)));
        assert_eq!(parse_hex_color("blue"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_solid_builds_filled_rect() {
        let mut props = PropertyMap::new();
        props.insert("Color", NodeProperty::constant(Vec4::new(0.0, 0.0, 1.0, 1.0)));
        props.update(0.0);

        let mut solid = SolidNode::new(100.0, 50.0);
        solid.perform_additional_output_updates(&props);
        assert_eq!(solid.entries().len(), 1);
        let ShapeContent::Draw(item) = &solid.entries()[0].content else {
            panic!("solid should draw a path");
        };
        let bounds = item.geometry.bounding_box();
        assert_eq!((bounds.width(), bounds.height()), (100.0, 50.0));
        assert_eq!(item.fill.as_ref().map(|f| f.color), Some(Vec4::new(0.0, 0.0, 1.0, 1.0)));
    }
}
