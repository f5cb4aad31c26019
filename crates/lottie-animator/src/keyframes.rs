//! Conversion of model properties into value providers.
//!
//! This is where keyframe data is validated; evaluation later assumes sorted,
//! gap-free segments.

use crate::animatable::{
    ConstantProvider, Interpolatable, Keyframe, KeyframeInterpolator, SharedProvider,
};
use crate::error::BuildError;
use glam::{Vec2, Vec3};
use lottie_data::model::{self as data, BezierTangent, Value};
use std::sync::Arc;

/// Builds the provider for one model property, converting every value with
/// `convert`. Properties without data resolve to `default`.
pub fn build_provider<T, U>(
    property: &str,
    prop: &data::Property<T>,
    default: U,
    convert: impl Fn(&T) -> U,
) -> Result<SharedProvider<U>, BuildError>
where
    U: Interpolatable + Send + Sync + 'static,
{
    match &prop.k {
        Value::Default => Ok(Arc::new(ConstantProvider(default))),
        Value::Static(v) => Ok(Arc::new(ConstantProvider(convert(v)))),
        Value::Animated(keyframes) => {
            let mut segments = build_keyframes(property, keyframes, &convert)?;
            if segments.len() == 1 && segments[0].start_value == segments[0].end_value {
                let only = segments.remove(0);
                return Ok(Arc::new(ConstantProvider(only.start_value)));
            }
            match KeyframeInterpolator::new(segments) {
                Some(interpolator) => Ok(Arc::new(interpolator)),
                None => Ok(Arc::new(ConstantProvider(default))),
            }
        }
    }
}

/// Turns model keyframes into interpolation segments.
///
/// Segment `n` spans model keyframes `n` and `n + 1`. A single model keyframe
/// becomes one zero-length segment holding its value.
pub fn build_keyframes<T, U>(
    property: &str,
    keyframes: &[data::Keyframe<T>],
    convert: &impl Fn(&T) -> U,
) -> Result<Vec<Keyframe<U>>, BuildError>
where
    U: Interpolatable,
{
    for (index, pair) in keyframes.windows(2).enumerate() {
        if pair[1].t < pair[0].t {
            return Err(BuildError::UnorderedKeyframes {
                property: property.to_string(),
                index: index + 1,
                previous: pair[0].t,
                next: pair[1].t,
            });
        }
    }

    let Some(first) = keyframes.first() else {
        return Ok(Vec::new());
    };
    let missing = |index: usize| BuildError::MissingKeyframeValue {
        property: property.to_string(),
        index,
    };

    let mut start_value = first.s.as_ref().map(convert).ok_or_else(|| missing(0))?;
    if keyframes.len() == 1 {
        let end_value = first.e.as_ref().map(convert).unwrap_or_else(|| start_value.clone());
        return Ok(vec![Keyframe::linear(first.t, first.t, start_value, end_value)]);
    }

    let mut segments = Vec::with_capacity(keyframes.len() - 1);
    for index in 0..keyframes.len() - 1 {
        let current = &keyframes[index];
        let next = &keyframes[index + 1];

        // Older exporters store the target in `e`; newer ones only in the next `s`.
        let end_value = match (&current.e, &next.s) {
            (Some(e), _) => convert(e),
            (None, Some(s)) => convert(s),
            (None, None) => return Err(missing(index + 1)),
        };
        let next_start = next.s.as_ref().map(convert).unwrap_or_else(|| end_value.clone());

        let ease_in = current.i.as_ref().or(next.i.as_ref()).map(tangent_point);
        let spatial_in = current.ti.as_deref().or(next.ti.as_deref()).and_then(spatial);

        segments.push(Keyframe {
            start_frame: current.t,
            end_frame: next.t,
            start_value: std::mem::replace(&mut start_value, next_start),
            end_value,
            ease_out: current.o.as_ref().map(tangent_point),
            ease_in,
            spatial_out: current.to.as_deref().and_then(spatial),
            spatial_in,
            hold: current.h == Some(1),
        });
    }

    Ok(segments)
}

fn tangent_point(tangent: &BezierTangent) -> Vec2 {
    Vec2::new(
        tangent.x.first().copied().unwrap_or(0.0),
        tangent.y.first().copied().unwrap_or(0.0),
    )
}

fn spatial(raw: &[f32]) -> Option<Vec3> {
    let v = Vec3::new(
        raw.first().copied().unwrap_or(0.0),
        raw.get(1).copied().unwrap_or(0.0),
        raw.get(2).copied().unwrap_or(0.0),
    );
    (v != Vec3::ZERO).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animatable::ValueProvider;
    use serde_json::json;

    fn scalar_property(k: serde_json::Value) -> data::Property<f32> {
        serde_json::from_value(json!({ "a": 1, "k": k })).unwrap()
    }

    #[test]
    fn test_out_of_order_keyframes_fail() {
        let prop = scalar_property(json!([
            { "t": 10, "s": [0] },
            { "t": 5, "s": [1] }
        ]));
        let err = build_provider("Opacity", &prop, 0.0, |v| *v).err().unwrap();
        assert!(matches!(
            err,
            BuildError::UnorderedKeyframes { index: 1, .. }
        ));
    }

    #[test]
    fn test_missing_first_value_fails() {
        let prop = scalar_property(json!([{ "t": 0 }, { "t": 5, "s": [1] }]));
        let err = build_provider("Opacity", &prop, 0.0, |v| *v).err().unwrap();
        assert!(matches!(err, BuildError::MissingKeyframeValue { index: 0, .. }));
    }

    #[test]
    fn test_legacy_end_values() {
        // Final keyframe carries only its time; targets live in `e`.
        let prop = scalar_property(json!([
            { "t": 0, "s": [0], "e": [50] },
            { "t": 10, "s": [50], "e": [100] },
            { "t": 20 }
        ]));
        let provider = build_provider("Rotation", &prop, 0.0, |v| *v).unwrap();
        assert_eq!(provider.value(5.0), 25.0);
        assert_eq!(provider.value(15.0), 75.0);
        assert_eq!(provider.value(40.0), 100.0);
    }

    #[test]
    fn test_hold_flag_and_conversion() {
        let prop = scalar_property(json!([
            { "t": 0, "s": [20], "h": 1 },
            { "t": 10, "s": [80] },
            { "t": 20, "s": [100] }
        ]));
        let provider = build_provider("Opacity", &prop, 1.0, |v| *v / 100.0).unwrap();
        assert_eq!(provider.value(9.5), 0.2);
        assert_eq!(provider.value(10.0), 0.8);
        assert!((provider.value(15.0) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_single_keyframe_is_constant() {
        let prop = scalar_property(json!([{ "t": 12, "s": [42] }]));
        let provider = build_provider("Rotation", &prop, 0.0, |v| *v).unwrap();
        assert!(!provider.is_animated());
        assert_eq!(provider.value(0.0), 42.0);
        assert_eq!(provider.value(1.0e7), 42.0);
    }

    #[test]
    fn test_easing_falls_back_to_next_in_tangent() {
        let prop = scalar_property(json!([
            { "t": 0, "s": [0], "o": { "x": [0.3], "y": [0.0] } },
            { "t": 10, "s": [1], "i": { "x": [0.7], "y": [1.0] } }
        ]));
        let segments = match &prop.k {
            Value::Animated(kfs) => build_keyframes("Start", kfs, &|v: &f32| *v).unwrap(),
            _ => unreachable!(),
        };
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].ease_out, Some(Vec2::new(0.3, 0.0)));
        assert_eq!(segments[0].ease_in, Some(Vec2::new(0.7, 1.0)));
    }

    #[test]
    fn test_spatial_tangents_only_when_non_zero() {
        let prop: data::Property<data::Vec3DefaultZero> = serde_json::from_value(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [0, 0, 0], "to": [0, 0, 0], "ti": [0, 0, 0] },
                { "t": 10, "s": [10, 0, 0], "to": [5, 5, 0], "ti": [-5, 5, 0] },
                { "t": 20, "s": [20, 0, 0] }
            ]
        }))
        .unwrap();
        let segments = match &prop.k {
            Value::Animated(kfs) => {
                build_keyframes("Position", kfs, &|v: &data::Vec3DefaultZero| Vec3::from(v.0))
                    .unwrap()
            }
            _ => unreachable!(),
        };
        assert_eq!(segments[0].spatial_out, None);
        assert_eq!(segments[0].spatial_in, None);
        assert_eq!(segments[1].spatial_out, Some(Vec3::new(5.0, 5.0, 0.0)));
        assert_eq!(segments[1].spatial_in, Some(Vec3::new(-5.0, 5.0, 0.0)));
    }
}
