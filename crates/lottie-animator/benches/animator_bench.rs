use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lottie_animator::{AnimationScene, AssetRegistry, SceneConfig};
use lottie_data::model::LottieJson;
use serde_json::json;

/// A shape layer with `groups` animated groups, each holding a rect, a fill
/// and a stroke.
fn create_model(groups: usize) -> LottieJson {
    let items: Vec<_> = (0..groups)
        .map(|i| {
            json!({
                "ty": "gr",
                "nm": format!("Group {i}"),
                "it": [
                    {
                        "ty": "rc", "nm": "Rect",
                        "p": { "k": [0, 0] },
                        "s": { "a": 1, "k": [
                            { "t": 0, "s": [10, 10] },
                            { "t": 120, "s": [200, 80] }
                        ] },
                        "r": { "k": 4 }
                    },
                    { "ty": "fl", "nm": "Fill", "c": { "k": [1, 0, 0, 1] }, "o": { "k": 100 } },
                    {
                        "ty": "st", "nm": "Stroke", "c": { "k": [0, 0, 0, 1] },
                        "o": { "k": 100 }, "w": { "k": 2 }
                    },
                    {
                        "ty": "tr",
                        "p": { "k": [i as f32 * 12.0, 0] },
                        "r": { "a": 1, "k": [
                            { "t": 0, "s": [0] },
                            { "t": 120, "s": [360] }
                        ] }
                    }
                ]
            })
        })
        .collect();

    serde_json::from_value(json!({
        "fr": 60, "ip": 0, "op": 120, "w": 1920, "h": 1080,
        "layers": [
            { "ty": 4, "nm": "Animated", "ind": 1, "ip": 0, "op": 120, "shapes": items },
            {
                "ty": 1, "nm": "Background", "ind": 2, "ip": 0, "op": 120,
                "sc": "#202020", "sw": 1920, "sh": 1080
            }
        ]
    }))
    .unwrap_or_else(|e| panic!("bench fixture should parse: {e}"))
}

fn sequential_playback(c: &mut Criterion) {
    let model = create_model(50);
    let mut scene = AnimationScene::from_model(&model, &AssetRegistry::new(), &SceneConfig::default())
        .unwrap_or_else(|e| panic!("bench scene should build: {e}"));
    let mut frame = 0.0f32;

    c.bench_function("sequential_playback_50_groups", |b| {
        b.iter(|| {
            frame = (frame + 1.0) % 120.0;
            scene.update(black_box(frame));
            black_box(scene.render_tree());
        })
    });
}

fn unchanged_frame(c: &mut Criterion) {
    let model = create_model(50);
    let mut scene = AnimationScene::from_model(&model, &AssetRegistry::new(), &SceneConfig::default())
        .unwrap_or_else(|e| panic!("bench scene should build: {e}"));
    scene.update(30.0);

    c.bench_function("unchanged_frame_50_groups", |b| {
        b.iter(|| black_box(scene.update(black_box(30.0))))
    });
}

fn build_scene(c: &mut Criterion) {
    let model = create_model(50);
    c.bench_function("build_scene_50_groups", |b| {
        b.iter(|| {
            AnimationScene::from_model(
                black_box(&model),
                &AssetRegistry::new(),
                &SceneConfig::default(),
            )
        })
    });
}

criterion_group!(benches, sequential_playback, unchanged_frame, build_scene);
criterion_main!(benches);
