//! Shape modifiers: trim paths and repeaters.

use super::transform::{self, mat3_to_affine, repeater_step};
use super::NodeBehavior;
use crate::property::PropertyMap;
use crate::renderer::{ShapeEntry, Trim};
use glam::{Mat3, Vec3};
use kurbo::BezPath;

/// Trims every stroke and fill in its group and in nested groups that do not
/// declare their own trim.
#[derive(Debug, Default)]
pub struct TrimNode;

impl TrimNode {
    pub fn new() -> Self {
        Self
    }

    /// Reads the current trim from the node's properties. Start and end are
    /// fractions, offset is in turns.
    pub fn resolve(&self, properties: &PropertyMap) -> Trim {
        Trim {
            start: properties.scalar("Start", 0.0),
            end: properties.scalar("End", 1.0),
            offset: properties.scalar("Offset", 0.0),
        }
    }
}

impl NodeBehavior for TrimNode {}

/// Upper bound on repeated copies; larger counts are clamped.
pub const MAX_REPEATER_COPIES: usize = 1000;

/// Stacking of repeated copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeaterComposite {
    /// Each copy is drawn above the previous one.
    Above,
    Below,
}

impl RepeaterComposite {
    /// Maps the model `m` field.
    pub fn from_mode(m: u8) -> Self {
        match m {
            2 => RepeaterComposite::Below,
            _ => RepeaterComposite::Above,
        }
    }
}

#[derive(Debug)]
pub struct RepeaterNode {
    composite: RepeaterComposite,
    copies: usize,
    offset: i32,
    start_opacity: f32,
    end_opacity: f32,
    step: Mat3,
}

impl RepeaterNode {
    pub fn new(composite: RepeaterComposite) -> Self {
        Self {
            composite,
            copies: 1,
            offset: 0,
            start_opacity: 1.0,
            end_opacity: 1.0,
            step: Mat3::IDENTITY,
        }
    }

    pub fn copies(&self) -> usize {
        self.copies
    }

    /// Replaces the pending geometry and the entries emitted so far with
    /// `copies` transformed copies of themselves.
    pub fn apply(&self, geometries: &mut Vec<BezPath>, entries: &mut Vec<ShapeEntry>) {
        let original_geometries = std::mem::take(geometries);
        let original_entries = std::mem::take(entries);
        let inverse = if self.step.determinant().abs() > f32::EPSILON {
            self.step.inverse()
        } else {
            Mat3::IDENTITY
        };

        let mut order: Vec<usize> = (0..self.copies).collect();
        // Entries are kept topmost first.
        if self.composite == RepeaterComposite::Above {
            order.reverse();
        }

        for i in order {
            let t = if self.copies > 1 {
                i as f32 / (self.copies as f32 - 1.0)
            } else {
                0.0
            };
            let alpha = self.start_opacity + (self.end_opacity - self.start_opacity) * t;

            let shift = i as i64 + self.offset as i64;
            let base = if shift >= 0 { self.step } else { inverse };
            let copy = matrix_power(base, shift.unsigned_abs());

            let affine = mat3_to_affine(copy);
            geometries.extend(original_geometries.iter().map(|g| affine * g.clone()));
            entries.extend(original_entries.iter().map(|entry| {
                let mut entry = entry.clone();
                entry.transform = copy * entry.transform;
                entry.alpha *= alpha;
                entry
            }));
        }
    }
}

/// `base` raised to `exponent` by repeated squaring.
fn matrix_power(mut base: Mat3, mut exponent: u64) -> Mat3 {
    let mut result = Mat3::IDENTITY;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result *= base;
        }
        base *= base;
        exponent >>= 1;
    }
    result
}

impl NodeBehavior for RepeaterNode {
    fn perform_additional_output_updates(&mut self, properties: &PropertyMap) {
        self.copies = (properties.scalar("Copies", 1.0).round().max(0.0) as usize)
            .min(MAX_REPEATER_COPIES);
        self.offset = properties.scalar("Offset", 0.0).round() as i32;
        self.start_opacity = properties.scalar("Start Opacity", 1.0);
        self.end_opacity = properties.scalar("End Opacity", 1.0);

        let anchor = properties.vector3("Anchor Point", Vec3::ZERO).truncate();
        let pos = transform::position(properties).truncate();
        let scale = properties.vector3("Scale", Vec3::ONE).truncate();
        let rotation = properties.scalar("Rotation", 0.0);
        self.step = repeater_step(anchor, pos, scale, rotation);
    }
}
