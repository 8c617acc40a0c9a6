//! Filesystem asset store for figure files.

use dossier_core::knowledge::AssetStore;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Figures stored as files directly under one root directory.
///
/// Names are plain file names; anything that would step outside the root
/// (parent components, absolute paths, drive prefixes) never exists.
#[derive(Debug, Clone)]
pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_contained(name: &str) -> bool {
        let normalized = name.replace('\\', "/");
        !name.is_empty()
            && Path::new(&normalized)
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    }
}

impl AssetStore for FsAssetStore {
    fn exists(&self, name: &str) -> bool {
        if !Self::is_contained(name) {
            warn!(name, "Rejected asset name outside the asset root");
            return false;
        }
        self.resolve(name).is_file()
    }

    fn resolve(&self, name: &str) -> PathBuf {
        if Self::is_contained(name) {
            self.root.join(name)
        } else {
            let file_name = Path::new(name)
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default();
            self.root.join(file_name)
        }
    }
}
