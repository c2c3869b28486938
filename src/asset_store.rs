//! Remote asset-store contract and a local-directory implementation.
//!
//! The store is only consulted from blocking worker threads, so
//! implementations may perform slow I/O.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Opaque identifier of one selectable item (and of everything rendered
/// for it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataId(pub String);

impl DataId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An item as listed by the asset store browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetItem {
    pub id: DataId,
    pub name: String,
    #[serde(default)]
    pub folder_id: Option<String>,
}

impl AssetItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DataId::new(id),
            name: name.into(),
            folder_id: None,
        }
    }
}

/// A file attached to an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    /// Location inside the store, when the store exposes one
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("Item {0} not found in the asset store")]
    ItemNotFound(DataId),

    #[error("File {0} cannot be fetched")]
    FileUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait AssetStore: Send + Sync {
    fn list_files(&self, item: &AssetItem) -> Result<Vec<FileDescriptor>, AssetStoreError>;

    /// Makes the file available locally and returns its path. May block.
    fn fetch(&self, file: &FileDescriptor) -> Result<PathBuf, AssetStoreError>;
}

/// Asset store laid out on disk: each item is a directory under `root`
/// named after its id, each entry of that directory is one file.
#[derive(Debug, Clone)]
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

    /// Every item directory currently present under the root
    pub fn items(&self) -> Result<Vec<AssetItem>, AssetStoreError> {
        let mut items: Vec<_> = fs::read_dir(&self.root)?
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                Some(AssetItem::new(name.clone(), name))
            })
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }
}

impl AssetStore for LocalAssetStore {
    fn list_files(&self, item: &AssetItem) -> Result<Vec<FileDescriptor>, AssetStoreError> {
        let item_dir = self.root.join(item.id.as_str());
        if !item_dir.is_dir() {
            return Err(AssetStoreError::ItemNotFound(item.id.clone()));
        }
        let mut files: Vec<_> = fs::read_dir(&item_dir)?
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let path = entry.path();
                let name = entry.file_name().to_str()?.to_string();
                let size = entry.metadata().ok().filter(|m| m.is_file()).map(|m| m.len());
                Some(FileDescriptor {
                    id: format!("{}/{}", item.id, name),
                    name,
                    size,
                    path: Some(path),
                })
            })
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Item {} lists {} file(s)", item.id, files.len());
        Ok(files)
    }

    fn fetch(&self, file: &FileDescriptor) -> Result<PathBuf, AssetStoreError> {
        match &file.path {
            Some(path) if path.exists() => Ok(path.clone()),
            Some(path) => {
                warn!("The file {} cannot be read from the asset store", path.display());
                Err(AssetStoreError::FileUnavailable(file.name.clone()))
            }
            None => Err(AssetStoreError::FileUnavailable(file.name.clone())),
        }
    }
}
