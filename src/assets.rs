//! Host-side asset storage and the file-system resource loader.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::LoadError;
use crate::gate::{Resource, ResourceLoader};

/// Bytes already available to the page, keyed by resource URL.
#[derive(Debug, Default)]
pub struct AssetStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(url.into(), bytes);
        }
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.entries.read().ok()?.get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries
            .read()
            .map(|e| e.contains_key(url))
            .unwrap_or(false)
    }

    /// Font assets (`.ttf` / `.otf`) as `(url, bytes)` pairs.
    pub fn fonts(&self) -> Vec<(String, Vec<u8>)> {
        let Ok(entries) = self.entries.read() else {
            return Vec::new();
        };
        let mut fonts: Vec<_> = entries
            .iter()
            .filter(|(url, _)| is_font(url))
            .map(|(url, bytes)| (url.clone(), bytes.clone()))
            .collect();
        fonts.sort_by(|a, b| a.0.cmp(&b.0));
        fonts
    }
}

fn is_font(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.ends_with(".ttf") || lower.ends_with(".otf")
}

/// Reads resources from disk relative to `base_dir` into an [`AssetStore`].
#[derive(Debug, Clone)]
pub struct AssetLoader {
    base_dir: PathBuf,
    store: Arc<AssetStore>,
}

impl AssetLoader {
    pub fn new(base_dir: impl AsRef<Path>, store: Arc<AssetStore>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }
}

#[async_trait]
impl ResourceLoader for AssetLoader {
    fn is_present(&self, resource: &Resource) -> bool {
        self.store.contains(&resource.url)
    }

    async fn load(&self, resource: &Resource) -> Result<(), LoadError> {
        let path = self.base_dir.join(&resource.url);
        log::debug!("Reading {} from {}", resource.id, path.display());
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| LoadError::Network {
                url: resource.url.clone(),
                message: e.to_string(),
            })?;
        if is_font(&resource.url) {
            ttf_parser::Face::parse(&bytes, 0).map_err(|e| LoadError::Parse {
                url: resource.url.clone(),
                message: e.to_string(),
            })?;
        }
        self.store.insert(resource.url.clone(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pdf-splice-assets-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_file_is_a_network_error() {
        let loader = AssetLoader::new(scratch_dir("missing"), Arc::new(AssetStore::new()));
        let err = loader
            .load(&Resource::new("lib", "nope.js"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Network { .. }));
    }

    #[tokio::test]
    async fn corrupt_font_is_a_parse_error() {
        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("bad.ttf"), b"not a font").unwrap();
        let store = Arc::new(AssetStore::new());
        let loader = AssetLoader::new(&dir, store.clone());
        let err = loader
            .load(&Resource::new("font", "bad.ttf"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(!store.contains("bad.ttf"));
    }

    #[tokio::test]
    async fn loaded_bytes_become_present() {
        let dir = scratch_dir("ok");
        std::fs::write(dir.join("engine.js"), b"// engine").unwrap();
        let store = Arc::new(AssetStore::new());
        let loader = AssetLoader::new(&dir, store.clone());
        let res = Resource::new("engine", "engine.js");
        assert!(!loader.is_present(&res));
        loader.load(&res).await.unwrap();
        assert!(loader.is_present(&res));
        assert_eq!(store.get("engine.js").unwrap(), b"// engine");
        assert!(store.fonts().is_empty());
    }
}
