use crate::asset_store::DataId;
use crate::mesh::Mesh;
use crate::presets::{PresetCatalog, VolumeProperty};
use crate::renderable::{MeshActor, Renderable, Rgb, VolumeActor};
use crate::renderer::{Camera, RenderSettings, Renderer};
use crate::viewport::{View, ViewId, ViewportBase};
use crate::volume::Volume;

use glam::DVec3;
use std::sync::Arc;
use tracing::{debug, warn};

/// The perspective view: volumes are rendered directly with a transfer
/// function preset, meshes as plain surfaces.
#[derive(Debug)]
pub struct ThreeDViewport {
    base: ViewportBase,
    presets: Arc<PresetCatalog>,
    default_preset: Option<String>,
}

impl ThreeDViewport {
    pub fn new(presets: Arc<PresetCatalog>, default_preset: Option<String>, settings: RenderSettings) -> Self {
        Self {
            base: ViewportBase::new(ViewId::ThreeD, Renderer::new(Camera::perspective(), settings)),
            presets,
            default_preset,
        }
    }

    pub fn presets(&self) -> &PresetCatalog {
        &self.presets
    }

    /// Name of the preset new volumes get; the first catalog entry unless
    /// one was set.
    pub fn default_preset(&self) -> Option<&str> {
        self.default_preset
            .as_deref()
            .or_else(|| self.presets.first().map(|p| p.name.as_str()))
    }

    pub fn set_default_preset(&mut self, name: &str) {
        self.default_preset = Some(name.to_string());
    }

    pub fn volume_property(&self, data_id: &DataId) -> Option<&VolumeProperty> {
        self.base
            .renderables(data_id)
            .iter()
            .find_map(|entry| match &entry.renderable {
                Renderable::Volume(actor) => Some(&actor.property),
                _ => None,
            })
    }

    /// Applies the named preset to the volume of `data_id`, its curves
    /// remapped to `range` when given. An unknown name keeps the current
    /// appearance.
    pub fn set_volume_preset(
        &mut self,
        data_id: &DataId,
        preset_name: &str,
        range: Option<(f64, f64)>,
    ) -> bool {
        debug!("set_volume_preset {} {} {:?}", data_id, preset_name, range);
        let presets = self.presets.clone();
        let Some(preset) = presets.get_by_name(preset_name) else {
            warn!("Preset {} not found", preset_name);
            return false;
        };
        self.base.update_where(data_id, Renderable::is_volume, |r| match r {
            Renderable::Volume(actor) => preset.apply(&mut actor.property, range),
            _ => false,
        })
    }
}

impl View for ThreeDViewport {
    fn base(&self) -> &ViewportBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewportBase {
        &mut self.base
    }

    fn add_volume(&mut self, data_id: &DataId, volume: Arc<Volume>) {
        let mut property = VolumeProperty::default();
        match self
            .default_preset()
            .and_then(|name| self.presets.get_by_name(name))
        {
            Some(preset) => {
                preset.apply(&mut property, Some(volume.scalar_range()));
            }
            None => warn!("No preset available for {}", data_id),
        }
        let actor = VolumeActor {
            volume,
            property,
            opacity: 1.0,
        };
        self.base.register(data_id, Renderable::Volume(actor));
        self.reset();
    }

    fn add_mesh(&mut self, data_id: &DataId, mesh: Arc<Mesh>, color: Rgb) {
        let actor = MeshActor {
            mesh,
            color,
            opacity: 1.0,
        };
        self.base.register(data_id, Renderable::Mesh(actor));
        self.reset();
    }

    fn remove_data(&mut self, data_id: &DataId, suppress_redraw: bool) {
        self.base.unregister(data_id, None, suppress_redraw);
    }

    /// Looks at the visible bounds from the (+x, -y) corner, z up.
    fn reset(&mut self) {
        if let Some(bounds) = self.base.visible_bounds() {
            let zoom = self.base.renderer().settings().reset_zoom;
            let center = bounds.center();
            let camera = &mut self.base.renderer_mut().camera;
            camera.focal_point = center;
            camera.position = DVec3::new(bounds.max.x, bounds.min.y, center.z);
            camera.view_up = DVec3::Z;
            camera.reset_to_bounds(&bounds, zoom);
        }
        self.render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn viewport() -> ThreeDViewport {
        let catalog = PresetCatalog::builtin().unwrap();
        ThreeDViewport::new(Arc::new(catalog), None, RenderSettings::default())
    }

    fn volume() -> Arc<Volume> {
        let data = Array3::from_shape_fn((4, 4, 4), |(z, y, x)| (x + y + z) as f32 * 10.0);
        Arc::new(Volume::new(data, DVec3::ONE, DVec3::ZERO))
    }

    #[test]
    fn test_add_volume_applies_default_preset() {
        let mut view = viewport();
        let id = DataId::from("ct");
        view.add_volume(&id, volume());
        let property = view.volume_property(&id).unwrap();
        assert_eq!(property.color.range(), Some((0.0, 90.0)));
        let first = view.presets().first().unwrap().name.clone();
        assert!(!view.set_volume_preset(&id, &first, Some((0.0, 90.0))));
    }

    #[test]
    fn test_preset_change_and_miss() {
        let mut view = viewport();
        let id = DataId::from("ct");
        view.add_volume(&id, volume());
        let before = view.volume_property(&id).unwrap().clone();
        assert!(!view.set_volume_preset(&id, "does-not-exist", None));
        assert_eq!(view.volume_property(&id), Some(&before));
        assert!(view.set_volume_preset(&id, "MR-Default", Some((0.0, 90.0))));
        assert!(!view.set_volume_preset(&id, "MR-Default", Some((0.0, 90.0))));
    }

    #[test]
    fn test_reset_centers_on_visible_bounds() {
        let mut view = viewport();
        view.add_volume(&DataId::from("ct"), volume());
        assert_eq!(view.base().renderer().camera.focal_point, DVec3::splat(1.5));
        assert_eq!(view.base().renderer().camera.view_up, DVec3::Z);
    }
}
