//! Per-item scene records.
//!
//! An object starts unresolved when its item is selected and is replaced by
//! a resolved volume or mesh record once its data has been decoded. The
//! replacement keeps the id and the list of views it is attached to.

use crate::asset_store::{AssetItem, DataId};
use crate::loader::LoadedData;
use crate::mesh::Mesh;
use crate::renderable::Rgb;
use crate::viewport::ViewId;
use crate::volume::Volume;

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct VolumeAttributes {
    pub data: Arc<Volume>,
    pub scalar_range: (f64, f64),
    pub window_level_min_max: (f64, f64),
    pub preset_name: Option<String>,
    pub preset_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone)]
pub struct MeshAttributes {
    pub data: Arc<Mesh>,
    pub color: Rgb,
}

#[derive(Debug, Clone)]
pub enum ObjectKind {
    Unresolved,
    Volume(VolumeAttributes),
    Mesh(MeshAttributes),
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    id: DataId,
    name: String,
    kind: ObjectKind,
    loading: bool,
    loaded: bool,
    opacity: f64,
    views: Vec<ViewId>,
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

impl SceneObject {
    /// Unresolved object for a freshly selected item
    pub fn new(item: &AssetItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            kind: ObjectKind::Unresolved,
            loading: false,
            loaded: false,
            opacity: 1.0,
            views: Vec::new(),
        }
    }

    /// Builds the resolved record for decoded `data`. Volumes start with
    /// their full scalar range as window and `preset_name` applied over it;
    /// meshes take `mesh_color`.
    pub fn resolve(self, data: LoadedData, preset_name: Option<String>, mesh_color: Rgb) -> Self {
        let kind = match data {
            LoadedData::Volume(volume) => {
                let scalar_range = volume.scalar_range();
                ObjectKind::Volume(VolumeAttributes {
                    data: volume,
                    scalar_range,
                    window_level_min_max: scalar_range,
                    preset_name,
                    preset_range: Some(scalar_range),
                })
            }
            LoadedData::Mesh(mesh) => ObjectKind::Mesh(MeshAttributes {
                data: mesh,
                color: mesh_color,
            }),
        };
        Self {
            kind,
            loading: false,
            loaded: true,
            ..self
        }
    }

    pub fn id(&self) -> &DataId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    pub fn is_volume(&self) -> bool {
        matches!(self.kind, ObjectKind::Volume(_))
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self.kind, ObjectKind::Mesh(_))
    }

    pub fn volume(&self) -> Option<&VolumeAttributes> {
        match &self.kind {
            ObjectKind::Volume(attributes) => Some(attributes),
            _ => None,
        }
    }

    pub fn mesh(&self) -> Option<&MeshAttributes> {
        match &self.kind {
            ObjectKind::Mesh(attributes) => Some(attributes),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) -> bool {
        replace(&mut self.opacity, opacity.clamp(0.0, 1.0))
    }

    pub fn set_window_level_min_max(&mut self, min_max: (f64, f64)) -> bool {
        match &mut self.kind {
            ObjectKind::Volume(attributes) => {
                replace(&mut attributes.window_level_min_max, min_max)
            }
            _ => false,
        }
    }

    pub fn set_preset(&mut self, name: &str, range: Option<(f64, f64)>) -> bool {
        match &mut self.kind {
            ObjectKind::Volume(attributes) => {
                let name_changed = replace(&mut attributes.preset_name, Some(name.to_string()));
                replace(&mut attributes.preset_range, range) || name_changed
            }
            _ => false,
        }
    }

    pub fn set_color(&mut self, color: Rgb) -> bool {
        match &mut self.kind {
            ObjectKind::Mesh(attributes) => replace(&mut attributes.color, color),
            _ => false,
        }
    }

    /// Views the object is currently rendered into
    pub fn views(&self) -> &[ViewId] {
        &self.views
    }

    pub(crate) fn attach(&mut self, view: ViewId) {
        if !self.views.contains(&view) {
            self.views.push(view);
        }
    }

    pub(crate) fn detach(&mut self, view: ViewId) -> bool {
        let before = self.views.len();
        self.views.retain(|v| *v != view);
        self.views.len() != before
    }
}
