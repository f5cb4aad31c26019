//! Image data for image layers.
//!
//! The engine never touches the filesystem. Bytes come from images inserted
//! up front, from an injected [`ImageProvider`], or from `data:` URIs embedded
//! in the animation.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use lottie_data::model as data;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub enum ImageSource {
    /// Encoded bytes (PNG/JPG).
    Data(Vec<u8>),
}

/// Supplies image bytes for assets the animation references by path.
pub trait ImageProvider: Send + Sync {
    fn image(&self, asset: &data::Asset) -> Option<ImageSource>;
}

#[derive(Clone, Default)]
pub struct AssetRegistry {
    images: HashMap<String, Arc<[u8]>>,
    provider: Option<Arc<dyn ImageProvider>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(provider: Arc<dyn ImageProvider>) -> Self {
        Self {
            images: HashMap::new(),
            provider: Some(provider),
        }
    }

    pub fn set_provider(&mut self, provider: Arc<dyn ImageProvider>) {
        self.provider = Some(provider);
    }

    /// Registers bytes for an asset id; takes precedence over everything else.
    pub fn insert(&mut self, id: impl Into<String>, bytes: Vec<u8>) {
        self.images.insert(id.into(), bytes.into());
    }

    pub fn resolve(&self, asset: &data::Asset) -> Option<Arc<[u8]>> {
        if let Some(bytes) = self.images.get(&asset.id) {
            return Some(bytes.clone());
        }
        if let Some(ImageSource::Data(bytes)) =
            self.provider.as_ref().and_then(|p| p.image(asset))
        {
            return Some(bytes.into());
        }
        embedded_bytes(asset).map(Into::into)
    }
}

impl fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRegistry")
            .field("images", &self.images.keys().collect::<Vec<_>>())
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

fn embedded_bytes(asset: &data::Asset) -> Option<Vec<u8>> {
    let p = asset.p.as_deref()?;
    if !p.starts_with("data:") {
        return None;
    }
    let (header, payload) = p.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    BASE64_STANDARD.decode(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider;

    impl ImageProvider for FixedProvider {
        fn image(&self, asset: &data::Asset) -> Option<ImageSource> {
            (asset.id == "remote").then(|| ImageSource::Data(vec![7, 7, 7]))
        }
    }

    fn asset(id: &str, p: Option<&str>) -> data::Asset {
        data::Asset {
            id: id.to_string(),
            p: p.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_embedded_data_uri() {
        let registry = AssetRegistry::new();
        // "hello"
        let a = asset("img_0", Some("data:image/png;base64,aGVsbG8="));
        assert_eq!(registry.resolve(&a).as_deref(), Some(&b"hello"[..]));
        assert!(registry.resolve(&asset("img_1", Some("images/img_1.png"))).is_none());
    }

    #[test]
    fn test_lookup_precedence() {
        let mut registry = AssetRegistry::with_provider(Arc::new(FixedProvider));
        assert_eq!(
            registry.resolve(&asset("remote", Some("a.png"))).as_deref(),
            Some(&[7u8, 7, 7][..])
        );

        registry.insert("remote", vec![1, 2]);
        assert_eq!(
            registry.resolve(&asset("remote", Some("a.png"))).as_deref(),
            Some(&[1u8, 2][..])
        );
        assert!(registry.resolve(&asset("other", None)).is_none());
    }
}
