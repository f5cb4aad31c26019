use serde::de::{DeserializeOwned, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Top-level composition document.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LottieJson {
    pub v: Option<String>,
    #[serde(default)]
    pub nm: Option<String>,
    pub ip: f32,
    pub op: f32,
    pub fr: f32,
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub ddd: Option<u8>,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl LottieJson {
    pub fn from_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }
}

/// A layer record. `ty` selects the kind: 0 precomposition, 1 solid,
/// 2 image, 3 null, 4 shape. Anything else is carried but not drawn.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Layer {
    #[serde(default)]
    pub ty: u8,
    #[serde(default)]
    pub ind: Option<u32>,
    #[serde(default)]
    pub parent: Option<u32>,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub ip: f32,
    #[serde(default)]
    pub op: f32,
    /// Start offset in frames.
    #[serde(default)]
    pub st: f32,
    /// Stretch factor; 2.0 plays the layer at half speed.
    #[serde(default = "unit_stretch")]
    pub sr: f32,
    #[serde(default)]
    pub ks: Transform,
    /// Time remap, in seconds of the referenced composition.
    #[serde(default)]
    pub tm: Option<Property<f32>>,
    #[serde(default)]
    pub ddd: Option<u8>,
    #[serde(default)]
    pub hd: Option<bool>,
    /// Track matte mode: 1 alpha, 2 inverted alpha, 3 luma, 4 inverted luma.
    #[serde(default)]
    pub tt: Option<u8>,
    /// Set on layers used as a matte source.
    #[serde(default)]
    pub td: Option<u8>,
    #[serde(default, rename = "refId")]
    pub ref_id: Option<String>,
    /// Solid color as `#rrggbb`.
    #[serde(default, rename = "sc")]
    pub color: Option<String>,
    #[serde(default)]
    pub sw: Option<u32>,
    #[serde(default)]
    pub sh: Option<u32>,
    #[serde(default)]
    pub shapes: Option<Vec<Shape>>,
}

fn unit_stretch() -> f32 {
    1.0
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "ty")]
pub enum Shape {
    #[serde(rename = "gr")]
    Group(GroupShape),
    #[serde(rename = "rc")]
    Rect(RectShape),
    #[serde(rename = "el")]
    Ellipse(EllipseShape),
    #[serde(rename = "sh")]
    Path(PathShape),
    #[serde(rename = "fl")]
    Fill(FillShape),
    #[serde(rename = "st")]
    Stroke(StrokeShape),
    #[serde(rename = "tm")]
    Trim(TrimShape),
    #[serde(rename = "rp")]
    Repeater(RepeaterShape),
    #[serde(rename = "tr")]
    Transform(TransformShape),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub hd: Option<bool>,
    pub it: Vec<Shape>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RectShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<Vec2>,
    pub p: Property<Vec2>,
    #[serde(default)]
    pub r: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EllipseShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<Vec2>,
    pub p: Property<Vec2>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub ks: Property<BezierPath>,
}

/// `r` is the fill rule: 1 non-zero, 2 even-odd.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FillShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Rgba>,
    pub o: Property<f32>,
    #[serde(default)]
    pub r: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StrokeShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<Rgba>,
    pub w: Property<f32>,
    pub o: Property<f32>,
    #[serde(default)]
    pub lc: u8,
    #[serde(default)]
    pub lj: u8,
    #[serde(default)]
    pub ml: Option<f32>,
}

/// Start and end are percentages, offset is in degrees.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TrimShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub s: Property<f32>,
    pub e: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub m: u8,
}

/// `m` is the composite mode: 1 above, 2 below.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepeaterShape {
    #[serde(default)]
    pub nm: Option<String>,
    pub c: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
    #[serde(default)]
    pub m: u8,
    pub tr: RepeaterTransform,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RepeaterTransform {
    #[serde(flatten)]
    pub t: Transform,
    #[serde(default)]
    pub so: Property<f32>,
    #[serde(default)]
    pub eo: Property<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransformShape {
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(flatten)]
    pub t: Transform,
}

/// Layer or group transform. Angles are in degrees, scale and opacity in
/// percent.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Transform {
    #[serde(default)]
    pub a: Property<Vec3DefaultZero>,
    #[serde(default)]
    pub p: PositionProperty,
    #[serde(default)]
    pub s: Property<Vec3Scale>,
    #[serde(default, alias = "r")]
    pub rz: Property<f32>,
    #[serde(default)]
    pub rx: Option<Property<f32>>,
    #[serde(default)]
    pub ry: Option<Property<f32>>,
    #[serde(default)]
    pub or: Option<Property<Vec3DefaultZero>>,
    #[serde(default)]
    pub sk: Property<f32>,
    /// Axis the skew is applied along; 0 is the x axis.
    #[serde(default)]
    pub sa: Property<f32>,
    #[serde(default)]
    pub o: Property<f32>,
}

/// Position is either one vector property or separate per-axis scalars.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum PositionProperty {
    Split {
        x: Property<f32>,
        y: Property<f32>,
        #[serde(default)]
        z: Option<Property<f32>>,
    },
    Unified(Property<Vec3DefaultZero>),
}

impl Default for PositionProperty {
    fn default() -> Self {
        PositionProperty::Unified(Property::default())
    }
}

/// An animatable field: `a` flags animation, `k` holds the value or the
/// keyframe list.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Property<T> {
    #[serde(default)]
    pub a: u8,
    #[serde(default)]
    #[serde(bound(deserialize = "T: DeserializeOwned"))]
    pub k: Value<T>,
}

impl<T> Default for Property<T> {
    fn default() -> Self {
        Property {
            a: 0,
            k: Value::Default,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub enum Value<T> {
    /// Field absent or unreadable; the consumer picks the default.
    Default,
    Static(T),
    Animated(Vec<Keyframe<T>>),
}

/// Reads `v` as a `T`, falling back to the first element when exporters
/// wrapped a single value in an array.
fn lenient<T: DeserializeOwned>(v: serde_json::Value) -> Option<T> {
    if let Ok(value) = serde_json::from_value::<T>(v.clone()) {
        return Some(value);
    }
    serde_json::from_value::<Vec<T>>(v)
        .ok()
        .and_then(|values| values.into_iter().next())
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Value<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Value::Default);
        }
        if let Ok(keyframes) = serde_json::from_value::<Vec<Keyframe<T>>>(raw.clone()) {
            return Ok(Value::Animated(keyframes));
        }
        Ok(lenient(raw).map_or(Value::Default, Value::Static))
    }
}

impl<T> Default for Value<T> {
    fn default() -> Self {
        Value::Default
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Keyframe<T> {
    pub t: f32,
    #[serde(default, deserialize_with = "keyframe_value")]
    pub s: Option<T>,
    #[serde(default, deserialize_with = "keyframe_value")]
    pub e: Option<T>,
    #[serde(default)]
    pub i: Option<BezierTangent>,
    #[serde(default)]
    pub o: Option<BezierTangent>,
    /// Spatial out tangent, relative to `s`.
    #[serde(default)]
    pub to: Option<Vec<f32>>,
    /// Spatial in tangent, relative to the next keyframe's value.
    #[serde(default)]
    pub ti: Option<Vec<f32>>,
    /// 1 holds the value until the next keyframe.
    #[serde(default)]
    pub h: Option<u8>,
}

fn keyframe_value<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(if raw.is_null() { None } else { lenient(raw) })
}

pub type Vec2 = [f32; 2];
pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// Easing handle, `{"x": [0.48], "y": [1]}` with one entry per dimension.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BezierTangent {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
}

impl<'de> Deserialize<'de> for BezierTangent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Scalar properties write {"x": 0.5}, multi-dimensional ones {"x": [0.5, 0.5]}.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Component {
            One(f32),
            Many(Vec<f32>),
        }

        impl Component {
            fn into_vec(self) -> Vec<f32> {
                match self {
                    Component::One(v) => vec![v],
                    Component::Many(v) => v,
                }
            }
        }

        #[derive(Deserialize)]
        struct Raw {
            x: Component,
            y: Component,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(BezierTangent {
            x: raw.x.into_vec(),
            y: raw.y.into_vec(),
        })
    }
}

/// Reads a float array of up to `N` entries, filling missing trailing
/// entries from `defaults` and ignoring extra ones.
struct Padded<const N: usize> {
    defaults: [f32; N],
}

impl<'de, const N: usize> Visitor<'de> for Padded<N> {
    type Value = [f32; N];

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "an array of at most {} numbers", N)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut out = self.defaults;
        for slot in out.iter_mut() {
            match seq.next_element::<f32>()? {
                Some(v) => *slot = v,
                None => return Ok(out),
            }
        }
        while seq.next_element::<serde::de::IgnoredAny>()?.is_some() {}
        Ok(out)
    }
}

/// Anchor, position and orientation; 2D documents omit z.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct Vec3DefaultZero(pub Vec3);

impl<'de> Deserialize<'de> for Vec3DefaultZero {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Padded { defaults: [0.0; 3] })
            .map(Vec3DefaultZero)
    }
}

/// Scale in percent; a missing z stays at 100.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Vec3Scale(pub Vec3);

impl Default for Vec3Scale {
    fn default() -> Self {
        Vec3Scale([100.0; 3])
    }
}

impl<'de> Deserialize<'de> for Vec3Scale {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Padded {
                defaults: [0.0, 0.0, 100.0],
            })
            .map(Vec3Scale)
    }
}

/// Color channels in 0..1. RGB input gets an opaque alpha.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Rgba(pub Vec4);

impl Default for Rgba {
    fn default() -> Self {
        Rgba([0.0, 0.0, 0.0, 1.0])
    }
}

impl<'de> Deserialize<'de> for Rgba {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer
            .deserialize_seq(Padded {
                defaults: [0.0, 0.0, 0.0, 1.0],
            })
            .map(Rgba)
    }
}

/// Cubic path: vertices `v` with in/out tangents relative to each vertex.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct BezierPath {
    #[serde(default)]
    pub c: bool,
    #[serde(default)]
    pub i: Vec<Vec2>,
    #[serde(default)]
    pub o: Vec<Vec2>,
    #[serde(default)]
    pub v: Vec<Vec2>,
}

/// A precomposition (`layers`) or an image (`p`, optionally under `u`).
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Asset {
    pub id: String,
    #[serde(default)]
    pub nm: Option<String>,
    #[serde(default)]
    pub layers: Option<Vec<Layer>>,
    #[serde(default)]
    pub w: Option<u32>,
    #[serde(default)]
    pub h: Option<u32>,
    #[serde(default)]
    pub u: Option<String>,
    #[serde(default)]
    pub p: Option<String>,
    /// Frame rate the precomposition's keyframes are authored in.
    #[serde(default)]
    pub fr: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_and_animated_values() {
        let stat: Property<f32> = serde_json::from_value(json!({ "a": 0, "k": 42 })).unwrap();
        assert!(matches!(stat.k, Value::Static(v) if v == 42.0));

        // Some exporters wrap scalars in a single-element array.
        let wrapped: Property<f32> = serde_json::from_value(json!({ "k": [7] })).unwrap();
        assert!(matches!(wrapped.k, Value::Static(v) if v == 7.0));

        let animated: Property<f32> = serde_json::from_value(json!({
            "a": 1,
            "k": [
                { "t": 0, "s": [0], "o": { "x": [0.4], "y": [0] }, "i": { "x": [0.6], "y": [1] } },
                { "t": 30, "s": [100] }
            ]
        }))
        .unwrap();
        match animated.k {
            Value::Animated(kfs) => {
                assert_eq!(kfs.len(), 2);
                assert_eq!(kfs[0].s, Some(0.0));
                assert_eq!(kfs[1].s, Some(100.0));
                assert_eq!(kfs[0].o.as_ref().unwrap().x, vec![0.4]);
            }
            other => panic!("expected animated value, got {other:?}"),
        }
    }

    #[test]
    fn test_rgb_color_gets_opaque_alpha() {
        let c: Property<Rgba> = serde_json::from_value(json!({ "k": [1, 0.5, 0] })).unwrap();
        assert!(matches!(c.k, Value::Static(Rgba(v)) if v == [1.0, 0.5, 0.0, 1.0]));
    }

    #[test]
    fn test_short_vectors_are_padded() {
        let anchor: Vec3DefaultZero = serde_json::from_value(json!([4, 5])).unwrap();
        assert_eq!(anchor.0, [4.0, 5.0, 0.0]);
        let scale: Vec3Scale = serde_json::from_value(json!([50, 25])).unwrap();
        assert_eq!(scale.0, [50.0, 25.0, 100.0]);
        let extra: Rgba = serde_json::from_value(json!([1, 1, 1, 0.5, 9])).unwrap();
        assert_eq!(extra.0, [1.0, 1.0, 1.0, 0.5]);
    }

    #[test]
    fn test_scalar_bezier_tangent() {
        let tangent: BezierTangent = serde_json::from_value(json!({ "x": 0.25, "y": 1 })).unwrap();
        assert_eq!(tangent.x, vec![0.25]);
        assert_eq!(tangent.y, vec![1.0]);
    }

    #[test]
    fn test_split_position_and_matte_fields() {
        let layer: Layer = serde_json::from_value(json!({
            "ty": 4,
            "nm": "Masked",
            "tt": 1,
            "ks": {
                "p": { "s": true, "x": { "k": 10 }, "y": { "k": 20 } }
            },
            "shapes": [{ "ty": "zz", "nm": "unsupported" }]
        }))
        .unwrap();
        assert_eq!(layer.tt, Some(1));
        assert_eq!(layer.sr, 1.0);
        assert!(matches!(layer.ks.p, PositionProperty::Split { .. }));
        assert!(matches!(layer.shapes.as_deref(), Some([Shape::Unknown])));
    }
}
