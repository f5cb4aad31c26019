//! Transform property maps and the matrices built from them.
//!
//! Angles are stored in degrees and scale/opacity as fractions; conversion to
//! radians happens when the matrix is built.

use crate::error::BuildError;
use crate::keyframes::build_provider;
use crate::property::{NodeProperty, PropertyMap};
use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use lottie_data::model as data;

pub(crate) const SCOPE: &str = "Transform";

/// Builds the `Transform` map of a layer or shape group. `owner` labels
/// errors.
pub(crate) fn transform_properties(
    owner: &str,
    ks: &data::Transform,
    is_3d: bool,
) -> Result<PropertyMap, BuildError> {
    let mut map = PropertyMap::scoped(SCOPE);
    insert_transform(&mut map, owner, ks, is_3d)?;
    Ok(map)
}

/// Inserts the transform properties into an existing map (repeaters keep
/// theirs next to the copy count).
pub(crate) fn insert_transform(
    map: &mut PropertyMap,
    owner: &str,
    ks: &data::Transform,
    is_3d: bool,
) -> Result<(), BuildError> {
    let label = |name: &str| format!("{owner}.{name}");
    let vec3 = |v: &data::Vec3DefaultZero| Vec3::from(v.0);
    let degrees = |v: &f32| *v;

    map.insert(
        "Anchor Point",
        NodeProperty::new(build_provider(&label("Anchor Point"), &ks.a, Vec3::ZERO, vec3)?),
    );
    match &ks.p {
        data::PositionProperty::Unified(p) => {
            map.insert(
                "Position",
                NodeProperty::new(build_provider(&label("Position"), p, Vec3::ZERO, vec3)?),
            );
        }
        data::PositionProperty::Split { x, y, z } => {
            map.insert(
                "X Position",
                NodeProperty::new(build_provider(&label("X Position"), x, 0.0, degrees)?),
            );
            map.insert(
                "Y Position",
                NodeProperty::new(build_provider(&label("Y Position"), y, 0.0, degrees)?),
            );
            if let Some(z) = z {
                map.insert(
                    "Z Position",
                    NodeProperty::new(build_provider(&label("Z Position"), z, 0.0, degrees)?),
                );
            }
        }
    }
    map.insert(
        "Scale",
        NodeProperty::new(build_provider(&label("Scale"), &ks.s, Vec3::ONE, |v| {
            Vec3::from(v.0) / 100.0
        })?),
    );
    map.insert(
        "Rotation",
        NodeProperty::new(build_provider(&label("Rotation"), &ks.rz, 0.0, degrees)?),
    );
    if is_3d {
        if let Some(rx) = &ks.rx {
            map.insert(
                "Rotation X",
                NodeProperty::new(build_provider(&label("Rotation X"), rx, 0.0, degrees)?),
            );
        }
        if let Some(ry) = &ks.ry {
            map.insert(
                "Rotation Y",
                NodeProperty::new(build_provider(&label("Rotation Y"), ry, 0.0, degrees)?),
            );
        }
        if let Some(or) = &ks.or {
            map.insert(
                "Orientation",
                NodeProperty::new(build_provider(&label("Orientation"), or, Vec3::ZERO, vec3)?),
            );
        }
    }
    map.insert(
        "Skew",
        NodeProperty::new(build_provider(&label("Skew"), &ks.sk, 0.0, degrees)?),
    );
    map.insert(
        "Skew Axis",
        NodeProperty::new(build_provider(&label("Skew Axis"), &ks.sa, 0.0, degrees)?),
    );
    map.insert(
        "Opacity",
        NodeProperty::new(build_provider(&label("Opacity"), &ks.o, 1.0, |v| *v / 100.0)?),
    );
    Ok(())
}

pub(crate) fn position(properties: &PropertyMap) -> Vec3 {
    if properties.contains("Position") {
        return properties.vector3("Position", Vec3::ZERO);
    }
    Vec3::new(
        properties.scalar("X Position", 0.0),
        properties.scalar("Y Position", 0.0),
        properties.scalar("Z Position", 0.0),
    )
}

/// Layer matrix: `T * R * Skew * S * -A`.
pub(crate) fn layer_matrix(properties: &PropertyMap, is_3d: bool) -> Mat4 {
    let mut anchor = properties.vector3("Anchor Point", Vec3::ZERO);
    let mut pos = position(properties);
    let scale = properties.vector3("Scale", Vec3::ONE);
    let rz = properties.scalar("Rotation", 0.0).to_radians();
    let mut rx = properties.scalar("Rotation X", 0.0).to_radians();
    let mut ry = properties.scalar("Rotation Y", 0.0).to_radians();
    let mut orientation = properties.vector3("Orientation", Vec3::ZERO);
    let skew = properties.scalar("Skew", 0.0).to_radians();
    let skew_axis = properties.scalar("Skew Axis", 0.0).to_radians();

    if !is_3d {
        pos.z = 0.0;
        anchor.z = 0.0;
        rx = 0.0;
        ry = 0.0;
        orientation = Vec3::ZERO;
    }

    let mat_t = Mat4::from_translation(pos);
    let mat_or = Mat4::from_euler(
        glam::EulerRot::YXZ,
        orientation.y.to_radians(),
        orientation.x.to_radians(),
        orientation.z.to_radians(),
    );
    // Lottie rotates clockwise for positive angles.
    let mat_r = mat_or
        * Mat4::from_rotation_x(-rx)
        * Mat4::from_rotation_y(-ry)
        * Mat4::from_rotation_z(-rz);
    let mat_skew = mat3_to_mat4_2d(skew_matrix(skew, skew_axis));
    let mat_s = Mat4::from_scale(scale);
    let mat_a = Mat4::from_translation(-anchor);

    mat_t * mat_r * mat_skew * mat_s * mat_a
}

/// 2D matrix of a shape group transform.
pub(crate) fn shape_matrix(properties: &PropertyMap) -> Mat3 {
    let anchor = properties.vector3("Anchor Point", Vec3::ZERO).truncate();
    let pos = position(properties).truncate();
    let scale = properties.vector3("Scale", Vec3::ONE).truncate();
    let r = properties.scalar("Rotation", 0.0).to_radians();
    let skew = properties.scalar("Skew", 0.0).to_radians();
    let skew_axis = properties.scalar("Skew Axis", 0.0).to_radians();

    Mat3::from_translation(pos)
        * Mat3::from_rotation_z(-r)
        * skew_matrix(skew, skew_axis)
        * Mat3::from_scale(scale)
        * Mat3::from_translation(-anchor)
}

/// Shear by `skew` along the axis at angle `skew_axis` (both radians).
fn skew_matrix(skew: f32, skew_axis: f32) -> Mat3 {
    if skew == 0.0 {
        return Mat3::IDENTITY;
    }
    let tan_sk = skew.tan();
    if skew_axis.abs() < 0.01 {
        Mat3::from_cols(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(tan_sk, 1.0, 0.0),
            Vec3::Z,
        )
    } else if (skew_axis - std::f32::consts::FRAC_PI_2).abs() < 0.01 {
        Mat3::from_cols(
            Vec3::new(1.0, tan_sk, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::Z,
        )
    } else {
        let shear = Mat3::from_cols(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(tan_sk, 1.0, 0.0),
            Vec3::Z,
        );
        Mat3::from_rotation_z(skew_axis) * shear * Mat3::from_rotation_z(-skew_axis)
    }
}

pub(crate) fn mat3_to_mat4_2d(m: Mat3) -> Mat4 {
    let c = m.to_cols_array();
    Mat4::from_cols(
        Vec4::new(c[0], c[1], 0.0, c[2]),
        Vec4::new(c[3], c[4], 0.0, c[5]),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(c[6], c[7], 0.0, c[8]),
    )
}

pub(crate) fn mat3_to_affine(m: Mat3) -> kurbo::Affine {
    let c = m.to_cols_array();
    kurbo::Affine::new([
        c[0] as f64,
        c[1] as f64,
        c[3] as f64,
        c[4] as f64,
        c[6] as f64,
        c[7] as f64,
    ])
}

/// Repeater step: `T * (A * R * S * -A)`.
pub(crate) fn repeater_step(anchor: Vec2, pos: Vec2, scale: Vec2, rotation_deg: f32) -> Mat3 {
    Mat3::from_translation(pos)
        * Mat3::from_translation(anchor)
        * Mat3::from_rotation_z(-rotation_deg.to_radians())
        * Mat3::from_scale(scale)
        * Mat3::from_translation(-anchor)
}
