//! File-extension driven type dispatch from a fetched file to in-memory
//! volume or mesh data.

use crate::asset_store::{AssetItem, AssetStore, AssetStoreError};
use crate::enums::SortBy;
use crate::mesh::Mesh;
use crate::volume::Volume;
use crate::volume_loader::{VolumeLoader, VolumeLoaderError};

use glam::DVec3;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Extensions decoded as volumes. Longest suffix first.
pub const VOLUME_EXTENSIONS: [&str; 6] = [".nii.gz", ".nii", ".nrrd", ".mha", ".mhd", ".dcm"];

/// Extensions decoded as meshes
pub const MESH_EXTENSIONS: [&str; 2] = [".stl", ".vtp"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    Volume,
    Mesh,
}

impl DataKind {
    /// Resolves the kind and the matched extension from a file name.
    pub fn from_path(path: &Path) -> Option<(DataKind, &'static str)> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        VOLUME_EXTENSIONS
            .iter()
            .find(|ext| name.ends_with(*ext))
            .map(|ext| (DataKind::Volume, *ext))
            .or_else(|| {
                MESH_EXTENSIONS
                    .iter()
                    .find(|ext| name.ends_with(*ext))
                    .map(|ext| (DataKind::Mesh, *ext))
            })
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("File format is not handled for {0}")]
    UnsupportedFormat(String),

    #[error("No decoder registered for {0} files")]
    NoDecoder(&'static str),

    #[error("Extension {0} is not a supported {1:?} extension")]
    NotRegistrable(String, DataKind),

    #[error("Invalid data in {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error(transparent)]
    Dicom(#[from] VolumeLoaderError),
}

pub trait VolumeDecoder: Send + Sync {
    fn decode_volume(&self, path: &Path) -> Result<Volume, DecodeError>;
}

pub trait MeshDecoder: Send + Sync {
    fn decode_mesh(&self, path: &Path) -> Result<Mesh, DecodeError>;
}

/// Decodes single (possibly multi-frame) DICOM files and directories
/// holding a DICOM series.
pub struct DicomDecoder {
    pub sort_by: SortBy,
}

impl VolumeDecoder for DicomDecoder {
    fn decode_volume(&self, path: &Path) -> Result<Volume, DecodeError> {
        if path.is_dir() {
            return Ok(VolumeLoader::load_from_directory(path, self.sort_by)?);
        }
        Ok(VolumeLoader::load_from_file(path)?)
    }
}

/// Decodes binary and ASCII STL surfaces.
pub struct StlDecoder;

impl MeshDecoder for StlDecoder {
    fn decode_mesh(&self, path: &Path) -> Result<Mesh, DecodeError> {
        let invalid = |reason: String| DecodeError::Invalid {
            path: path.display().to_string(),
            reason,
        };
        let mut file = File::open(path).map_err(|e| invalid(e.to_string()))?;
        let stl = stl_io::read_stl(&mut file).map_err(|e| invalid(e.to_string()))?;
        debug!("STL contains {} faces", stl.faces.len());

        let vertices = stl
            .vertices
            .iter()
            .map(|v| DVec3::new(v[0] as f64, v[1] as f64, v[2] as f64))
            .collect();
        let triangles = stl
            .faces
            .iter()
            .map(|face| face.vertices.map(|i| i as u32))
            .collect();
        Mesh::new(vertices, triangles).map_err(|e| invalid(e.to_string()))
    }
}

/// Decoded content of one item
#[derive(Debug, Clone)]
pub enum LoadedData {
    Volume(Arc<Volume>),
    Mesh(Arc<Mesh>),
}

impl LoadedData {
    pub fn kind(&self) -> DataKind {
        match self {
            LoadedData::Volume(_) => DataKind::Volume,
            LoadedData::Mesh(_) => DataKind::Mesh,
        }
    }
}

/// Decoders keyed by extension. Only extensions of the closed
/// [`VOLUME_EXTENSIONS`] and [`MESH_EXTENSIONS`] sets can be registered.
#[derive(Default)]
pub struct DecoderRegistry {
    volumes: HashMap<&'static str, Arc<dyn VolumeDecoder>>,
    meshes: HashMap<&'static str, Arc<dyn MeshDecoder>>,
}

impl DecoderRegistry {
    /// Registry with the DICOM decoder for `.dcm` files and series folders
    /// and the STL mesh decoder.
    pub fn with_defaults(sort_by: SortBy) -> Self {
        let mut registry = Self::default();
        registry
            .volumes
            .insert(".dcm", Arc::new(DicomDecoder { sort_by }));
        registry.meshes.insert(".stl", Arc::new(StlDecoder));
        registry
    }

    pub fn register_volume_decoder(
        &mut self,
        extension: &str,
        decoder: Arc<dyn VolumeDecoder>,
    ) -> Result<(), DecodeError> {
        let ext = Self::closed_extension(&VOLUME_EXTENSIONS, extension)
            .ok_or_else(|| DecodeError::NotRegistrable(extension.to_string(), DataKind::Volume))?;
        self.volumes.insert(ext, decoder);
        Ok(())
    }

    pub fn register_mesh_decoder(
        &mut self,
        extension: &str,
        decoder: Arc<dyn MeshDecoder>,
    ) -> Result<(), DecodeError> {
        let ext = Self::closed_extension(&MESH_EXTENSIONS, extension)
            .ok_or_else(|| DecodeError::NotRegistrable(extension.to_string(), DataKind::Mesh))?;
        self.meshes.insert(ext, decoder);
        Ok(())
    }

    /// Decodes `path` with the decoder matching its extension. A directory
    /// is read as a DICOM series.
    pub fn decode(&self, path: &Path) -> Result<LoadedData, DecodeError> {
        let (kind, ext) = if path.is_dir() {
            (DataKind::Volume, ".dcm")
        } else {
            DataKind::from_path(path)
                .ok_or_else(|| DecodeError::UnsupportedFormat(path.display().to_string()))?
        };
        match kind {
            DataKind::Volume => {
                debug!("Loading volume {}", path.display());
                let decoder = self.volumes.get(ext).ok_or(DecodeError::NoDecoder(ext))?;
                Ok(LoadedData::Volume(Arc::new(decoder.decode_volume(path)?)))
            }
            DataKind::Mesh => {
                debug!("Loading mesh {}", path.display());
                let decoder = self.meshes.get(ext).ok_or(DecodeError::NoDecoder(ext))?;
                Ok(LoadedData::Mesh(Arc::new(decoder.decode_mesh(path)?)))
            }
        }
    }

    fn closed_extension(set: &[&'static str], extension: &str) -> Option<&'static str> {
        let wanted = extension.to_ascii_lowercase();
        let wanted = wanted.trim_start_matches('.');
        set.iter()
            .find(|ext| ext.trim_start_matches('.') == wanted)
            .copied()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No file to load. Please check the selected item.")]
    NoFile,

    #[error(
        "You are trying to load more than one file. If so, please load a compressed archive."
    )]
    MultipleFiles(usize),

    #[error(transparent)]
    Store(#[from] AssetStoreError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Load task failed: {0}")]
    Task(String),
}

/// Lists the item's files, fetches the single one and decodes it. Blocking.
pub fn load_item(
    store: &dyn AssetStore,
    decoders: &DecoderRegistry,
    item: &AssetItem,
) -> Result<LoadedData, LoadError> {
    debug!("Listing files of {}", item.id);
    let files = store.list_files(item)?;
    let file = match files.as_slice() {
        [] => return Err(LoadError::NoFile),
        [file] => file,
        files => return Err(LoadError::MultipleFiles(files.len())),
    };
    let path = store.fetch(file)?;
    Ok(decoders.decode(&path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_triangle_stl(path: &Path) {
        let triangle = stl_io::Triangle {
            normal: stl_io::Normal::new([0.0, 0.0, 1.0]),
            vertices: [
                stl_io::Vertex::new([0.0, 0.0, 0.0]),
                stl_io::Vertex::new([4.0, 0.0, 0.0]),
                stl_io::Vertex::new([0.0, 2.0, 0.0]),
            ],
        };
        let mut file = File::create(path).unwrap();
        stl_io::write_stl(&mut file, [triangle].iter()).unwrap();
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            DataKind::from_path(Path::new("brain.NII.GZ")),
            Some((DataKind::Volume, ".nii.gz"))
        );
        assert_eq!(
            DataKind::from_path(Path::new("/tmp/a/skull.stl")),
            Some((DataKind::Mesh, ".stl"))
        );
        assert_eq!(DataKind::from_path(Path::new("notes.txt")), None);
    }

    #[test]
    fn test_unknown_extension_is_a_decode_error() {
        let registry = DecoderRegistry::with_defaults(SortBy::default());
        let result = registry.decode(&PathBuf::from("/nonexistent/notes.txt"));
        assert!(matches!(result, Err(DecodeError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_supported_extension_without_decoder() {
        let registry = DecoderRegistry::with_defaults(SortBy::default());
        let result = registry.decode(&PathBuf::from("/nonexistent/brain.nrrd"));
        assert!(matches!(result, Err(DecodeError::NoDecoder(".nrrd"))));
    }

    #[test]
    fn test_register_outside_closed_set() {
        struct Never;
        impl MeshDecoder for Never {
            fn decode_mesh(&self, path: &Path) -> Result<Mesh, DecodeError> {
                Err(DecodeError::UnsupportedFormat(path.display().to_string()))
            }
        }
        let mut registry = DecoderRegistry::default();
        assert!(registry.register_mesh_decoder("obj", Arc::new(Never)).is_err());
        assert!(registry.register_mesh_decoder("STL", Arc::new(Never)).is_ok());
    }

    #[test]
    fn test_default_registry_decodes_stl() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skull.stl");
        write_triangle_stl(&path);

        let registry = DecoderRegistry::with_defaults(SortBy::default());
        let LoadedData::Mesh(mesh) = registry.decode(&path).unwrap() else {
            panic!("expected a mesh");
        };
        assert_eq!(mesh.triangles().len(), 1);
        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.bounds().max, DVec3::new(4.0, 2.0, 0.0));
    }

    #[test]
    fn test_garbage_stl_is_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.stl");
        std::fs::write(&path, b"not a mesh").unwrap();
        let result = StlDecoder.decode_mesh(&path);
        assert!(matches!(result, Err(DecodeError::Invalid { .. })));
    }
}
