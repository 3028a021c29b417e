use crate::editor::codec::InlineImage;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Durable image storage. Returns a stable reference for the stored bytes.
pub trait AssetStore: Send + Sync {
    fn upload(&self, image: &InlineImage, path_prefix: &str) -> Result<String>;
}

/// Stores uploads under a local directory and hands out `file://` URLs.
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// `prefix/with/../segments` becomes slugified relative path components.
fn prefix_components(path_prefix: &str) -> Vec<String> {
    path_prefix
        .split('/')
        .map(slug::slugify)
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn random_file_stem() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

impl AssetStore for LocalAssetStore {
    fn upload(&self, image: &InlineImage, path_prefix: &str) -> Result<String> {
        let mut dir = self.root.clone();
        for segment in prefix_components(path_prefix) {
            dir.push(segment);
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create upload folder {}", dir.display()))?;
        let dir = std::fs::canonicalize(&dir)
            .with_context(|| format!("resolve upload folder {}", dir.display()))?;

        let path = dir.join(format!("{}.{}", random_file_stem(), image.file_extension()));
        std::fs::write(&path, image.bytes())
            .with_context(|| format!("write upload {}", path.display()))?;

        let url = Url::from_file_path(&path)
            .map_err(|_| anyhow!("upload path is not absolute: {}", path.display()))?;
        tracing::debug!(url = %url, bytes = image.bytes().len(), "stored upload");
        Ok(url.to_string())
    }
}
