//! One of the three orthogonal (at rest) slice views.
//!
//! The first volume added becomes the primary reslice surface: it defines
//! the cutting plane, gives the shared cursor its bounds and owns the
//! cursor widget. Later volumes are overlays on the same plane. When the
//! primary goes away the first overlay, in registration order, is rebuilt
//! as the new primary within the same call, so no frame is ever drawn with
//! overlays but no primary.

use crate::asset_store::DataId;
use crate::capture::{self, Layer, Plane};
use crate::cursor::SharedCursor;
use crate::enums::{Interpolation, Orientation};
use crate::mesh::Mesh;
use crate::renderable::{
    MeshSlice, Renderable, ResliceOverlay, ResliceSurface, Rgb, WindowLevel,
};
use crate::renderer::{Camera, RenderSettings, Renderer};
use crate::reslice_math::{self, SliceLine};
use crate::viewport::{View, ViewId, ViewportBase};
use crate::volume::Volume;

use glam::DVec3;
use image::GrayImage;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct SliceViewport {
    base: ViewportBase,
    orientation: Orientation,
    cursor: SharedCursor,
    obliques_visible: bool,
    overlay_opacity: f64,
}

impl SliceViewport {
    pub fn new(
        orientation: Orientation,
        cursor: SharedCursor,
        settings: RenderSettings,
        obliques_visible: bool,
        overlay_opacity: f64,
    ) -> Self {
        Self {
            base: ViewportBase::new(
                ViewId::Slice(orientation),
                Renderer::new(Camera::parallel(), settings),
            ),
            orientation,
            cursor,
            obliques_visible,
            overlay_opacity,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn cursor(&self) -> &SharedCursor {
        &self.cursor
    }

    fn primary(&self) -> Option<(&DataId, &ResliceSurface)> {
        self.base
            .entries()
            .find_map(|(id, entry)| match &entry.renderable {
                Renderable::ResliceSurface(surface) => Some((id, surface)),
                _ => None,
            })
    }

    fn overlays(&self) -> impl Iterator<Item = (&DataId, &ResliceOverlay)> {
        self.base
            .entries()
            .filter_map(|(id, entry)| match &entry.renderable {
                Renderable::ResliceOverlay(overlay) => Some((id, overlay)),
                _ => None,
            })
    }

    pub fn has_primary(&self) -> bool {
        self.primary().is_some()
    }

    pub fn primary_id(&self) -> Option<DataId> {
        self.primary().map(|(id, _)| id.clone())
    }

    pub fn primary_volume(&self) -> Option<Arc<Volume>> {
        self.primary().map(|(_, surface)| surface.volume.clone())
    }

    pub fn is_primary_volume(&self, data_id: &DataId) -> bool {
        self.primary().is_some_and(|(id, _)| id == data_id)
    }

    pub fn is_secondary_volume(&self, data_id: &DataId) -> bool {
        self.overlays().any(|(id, _)| id == data_id)
    }

    /// Overlay ids in registration order
    pub fn secondary_ids(&self) -> Vec<DataId> {
        self.overlays().map(|(id, _)| id.clone()).collect()
    }

    pub fn primary_count(&self) -> usize {
        self.base
            .entries()
            .filter(|(_, entry)| matches!(entry.renderable, Renderable::ResliceSurface(_)))
            .count()
    }

    /// Whether the cursor widget currently reacts to drags
    pub fn widget_active(&self) -> bool {
        self.primary()
            .is_some_and(|(_, surface)| surface.widget_processes_events)
    }

    pub fn obliques_visible(&self) -> bool {
        self.obliques_visible
    }

    fn slice_line(&self) -> Option<SliceLine> {
        let volume = self.primary_volume()?;
        let cursor = self.cursor.borrow();
        SliceLine::new(
            &cursor,
            self.orientation,
            &volume.bounds(),
            volume.spacing,
            None,
        )
    }

    /// Slider range `(0, count)`, `None` without a primary volume.
    pub fn get_slice_range(&self) -> Option<(usize, usize)> {
        self.slice_line().map(|line| (0, line.count))
    }

    /// Slider value of the current cursor center
    pub fn get_slice(&self) -> Option<usize> {
        let line = self.slice_line()?;
        line.index_of(self.cursor.borrow().center())
    }

    /// Moves the cursor to slice `index`. Redraws only on an actual move.
    pub fn set_slice(&mut self, index: usize) -> bool {
        let Some(position) = self.slice_line().and_then(|line| line.position_of(index)) else {
            return false;
        };
        let changed = reslice_math::set_reslice_center(&mut self.cursor.borrow_mut(), position);
        if changed {
            self.sync_from_cursor();
        }
        changed
    }

    /// Scroll on the primary surface: moves by whole slices.
    pub fn scroll(&mut self, slices: i64) -> bool {
        let (Some((_, count)), Some(current)) = (self.get_slice_range(), self.get_slice()) else {
            return false;
        };
        let target = (current as i64).saturating_add(slices).clamp(0, count as i64);
        self.set_slice(target as usize)
    }

    /// Cursor widget rotation around this view's normal
    pub fn rotate_cursor(&mut self, angle: f64) -> bool {
        if !self.widget_active() || angle == 0.0 {
            return false;
        }
        self.cursor
            .borrow_mut()
            .rotate_about(self.orientation, angle);
        self.sync_from_cursor();
        true
    }

    /// Cursor widget translation to `center`
    pub fn translate_cursor(&mut self, center: DVec3) -> bool {
        if !self.widget_active() {
            return false;
        }
        let changed = reslice_math::set_reslice_center(&mut self.cursor.borrow_mut(), center);
        if changed {
            self.sync_from_cursor();
        }
        changed
    }

    pub fn window_level(&self, data_id: &DataId) -> Option<WindowLevel> {
        self.base
            .renderables(data_id)
            .iter()
            .find_map(|entry| match &entry.renderable {
                Renderable::ResliceSurface(surface) => Some(surface.window_level),
                Renderable::ResliceOverlay(overlay) => Some(overlay.window_level),
                _ => None,
            })
    }

    /// Window/level drag on the primary surface. Returns the primary's id
    /// and its new window/level.
    pub fn adjust_window_level(
        &mut self,
        window_delta: f64,
        level_delta: f64,
    ) -> Option<(DataId, WindowLevel)> {
        let (id, current) = self
            .primary()
            .map(|(id, surface)| (id.clone(), surface.window_level))?;
        let updated = WindowLevel {
            window: (current.window + window_delta).max(0.0),
            level: current.level + level_delta,
        };
        self.set_volume_window_level(&id, updated);
        Some((id, updated))
    }

    pub fn set_volume_window_level(&mut self, data_id: &DataId, window_level: WindowLevel) -> bool {
        debug!(
            "{}: set_volume_window_level {} {:?}",
            self.id(),
            data_id,
            window_level
        );
        self.base.update_where(data_id, Renderable::is_volume, |r| {
            r.set_window_level(window_level)
        })
    }

    pub fn set_volume_window_level_min_max(&mut self, data_id: &DataId, min_max: (f64, f64)) -> bool {
        self.set_volume_window_level(data_id, WindowLevel::from_min_max(min_max))
    }

    /// Shows or hides the cursor lines; hidden lines cannot be dragged.
    pub fn set_obliques_visibility(&mut self, visible: bool) -> bool {
        self.obliques_visible = visible;
        let mut modified = false;
        for (_, entry) in self.base.entries_mut() {
            if let Renderable::ResliceSurface(surface) = &mut entry.renderable {
                modified = surface.set_obliques_visibility(visible) || modified;
            }
        }
        if modified {
            self.render();
        }
        modified
    }

    /// Re-derives the display from the shared cursor and redraws.
    pub fn sync_from_cursor(&mut self) -> bool {
        self.orient_camera();
        self.refresh_contours();
        self.render()
    }

    fn orient_camera(&mut self) {
        let cursor = self.cursor.borrow();
        if !cursor.is_initialized() {
            return;
        }
        let normal = cursor.normal(self.orientation);
        let view_up = cursor.view_up(self.orientation);
        let camera = &mut self.base.renderer_mut().camera;
        let distance = (camera.position - camera.focal_point).length().max(1.0);
        camera.position = camera.focal_point + normal * distance;
        camera.view_up = view_up;
    }

    fn reset_camera(&mut self) {
        let Some(volume) = self.primary_volume() else {
            return;
        };
        let (normal, view_up) = {
            let cursor = self.cursor.borrow();
            (
                cursor.normal(self.orientation),
                cursor.view_up(self.orientation),
            )
        };
        let zoom = self.base.renderer().settings().reset_zoom;
        self.base
            .renderer_mut()
            .camera
            .look_along(-normal, view_up, &volume.bounds(), zoom);
    }

    /// Recuts every mesh with the current plane. Contours stay hidden
    /// while there is no primary volume.
    fn refresh_contours(&mut self) {
        let has_primary = self.has_primary();
        let cursor = self.cursor.borrow();
        let visible = has_primary && cursor.is_initialized();
        let center = cursor.center();
        let normal = cursor.normal(self.orientation);
        for (_, entry) in self.base.entries_mut() {
            if let Renderable::MeshSlice(slice) = &mut entry.renderable {
                slice.visible = visible;
                slice.contour = if visible {
                    slice.mesh.cut(center, normal)
                } else {
                    Vec::new()
                };
            }
        }
    }

    fn promote_first_secondary(&mut self) {
        let candidate = self
            .base
            .entries()
            .find_map(|(id, entry)| match &entry.renderable {
                Renderable::ResliceOverlay(overlay) => Some((
                    id.clone(),
                    entry.handle,
                    overlay.volume.clone(),
                    overlay.window_level,
                )),
                _ => None,
            });
        let Some((id, handle, volume, window_level)) = candidate else {
            return;
        };
        info!("{}: promoting {} to primary", self.id(), id);
        self.base.unregister(&id, Some(handle), true);
        let mut surface = ResliceSurface::new(volume.clone(), self.obliques_visible);
        surface.set_window_level(window_level);
        self.base.register(&id, Renderable::ResliceSurface(surface));
        self.cursor.borrow_mut().attach_bounds(volume.bounds());
    }

    fn capture_plane(&self, volume: &Volume) -> Plane {
        let cursor = self.cursor.borrow();
        let plane = Plane {
            center: cursor.center(),
            normal: cursor.normal(self.orientation),
            view_up: cursor.view_up(self.orientation),
        };
        Plane {
            center: plane.project(volume.center()),
            ..plane
        }
    }

    fn capture_with(&self, width: u32, height: u32, pixel_size: f64) -> Option<GrayImage> {
        let (_, primary) = self.primary()?;
        let mut layers = vec![Layer {
            volume: &primary.volume,
            window_level: primary.window_level,
            opacity: 1.0,
        }];
        layers.extend(self.overlays().map(|(_, overlay)| Layer {
            volume: &overlay.volume,
            window_level: overlay.window_level,
            opacity: overlay.opacity,
        }));
        let plane = self.capture_plane(&primary.volume);
        capture::reslice(
            &plane,
            &layers,
            width,
            height,
            pixel_size,
            Interpolation::Linear,
        )
    }

    /// Frame of `width` x `height` covering what the camera shows.
    pub fn capture(&self, width: u32, height: u32) -> Option<GrayImage> {
        if height == 0 {
            return None;
        }
        let pixel_size = 2.0 * self.base.renderer().camera.parallel_scale / height as f64;
        self.capture_with(width, height, pixel_size)
    }

    /// Frame at the primary volume's isotropic resolution
    pub fn capture_native(&self) -> Option<GrayImage> {
        let volume = self.primary_volume()?;
        let (width, height) = volume.native_frame_size(self.orientation);
        self.capture_with(width, height, volume.spacing.min_element())
    }
}

impl View for SliceViewport {
    fn base(&self) -> &ViewportBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ViewportBase {
        &mut self.base
    }

    fn add_volume(&mut self, data_id: &DataId, volume: Arc<Volume>) {
        if self.has_primary() {
            debug!("{}: adding {} as overlay", self.id(), data_id);
            let overlay = ResliceOverlay::new(volume, self.overlay_opacity);
            self.base
                .register(data_id, Renderable::ResliceOverlay(overlay));
            self.render();
            return;
        }

        debug!("{}: adding {} as primary", self.id(), data_id);
        let bounds = volume.bounds();
        let surface = ResliceSurface::new(volume, self.obliques_visible);
        self.base
            .register(data_id, Renderable::ResliceSurface(surface));
        self.cursor.borrow_mut().attach_bounds(bounds);
        self.reset_camera();
        self.refresh_contours();
        self.render();
    }

    fn add_mesh(&mut self, data_id: &DataId, mesh: Arc<Mesh>, color: Rgb) {
        debug!("{}: adding mesh {}", self.id(), data_id);
        let slice = MeshSlice {
            mesh,
            color,
            opacity: 1.0,
            contour: Vec::new(),
            visible: false,
        };
        self.base.register(data_id, Renderable::MeshSlice(slice));
        self.refresh_contours();
        self.render();
    }

    fn remove_data(&mut self, data_id: &DataId, suppress_redraw: bool) {
        let was_primary = self.is_primary_volume(data_id);
        if self.base.unregister(data_id, None, true).is_empty() {
            return;
        }
        if was_primary {
            self.promote_first_secondary();
        }
        self.refresh_contours();
        if !suppress_redraw {
            self.render();
        }
    }

    fn reset(&mut self) {
        if let Some(volume) = self.primary_volume() {
            self.cursor.borrow_mut().reset(volume.center());
            self.reset_camera();
            self.refresh_contours();
        }
        self.render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ResliceCursor;
    use ndarray::Array3;

    fn volume(value: f32, origin: DVec3) -> Arc<Volume> {
        Arc::new(Volume::new(
            Array3::from_elem((11, 11, 11), value),
            DVec3::ONE,
            origin,
        ))
    }

    fn viewport(orientation: Orientation) -> SliceViewport {
        SliceViewport::new(
            orientation,
            ResliceCursor::shared(),
            RenderSettings::default(),
            true,
            0.8,
        )
    }

    #[test]
    fn test_first_volume_is_primary() {
        let mut view = viewport(Orientation::Axial);
        let a = DataId::from("a");
        let b = DataId::from("b");
        view.add_volume(&a, volume(1.0, DVec3::ZERO));
        view.add_volume(&b, volume(2.0, DVec3::ZERO));
        assert!(view.is_primary_volume(&a));
        assert!(view.is_secondary_volume(&b));
        assert_eq!(view.primary_count(), 1);
        assert_eq!(view.cursor().borrow().center(), DVec3::splat(5.0));
    }

    #[test]
    fn test_remove_primary_promotes_first_secondary() {
        let mut view = viewport(Orientation::Coronal);
        let ids: Vec<DataId> = ["a", "b", "c"].into_iter().map(DataId::from).collect();
        for id in &ids {
            view.add_volume(id, volume(1.0, DVec3::ZERO));
        }
        view.set_slice(2);
        let center = view.cursor().borrow().center();

        view.remove_data(&ids[0], false);
        assert!(view.is_primary_volume(&ids[1]));
        assert!(view.is_secondary_volume(&ids[2]));
        assert_eq!(view.primary_count(), 1);
        assert_eq!(view.cursor().borrow().center(), center);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut view = viewport(Orientation::Axial);
        view.remove_data(&DataId::from("missing"), false);
        assert_eq!(view.base().renderer().frames(), 0);
    }

    #[test]
    fn test_slider_api() {
        let mut view = viewport(Orientation::Sagittal);
        assert_eq!(view.get_slice_range(), None);
        assert!(!view.set_slice(3));

        view.add_volume(&DataId::from("a"), volume(1.0, DVec3::ZERO));
        assert_eq!(view.get_slice_range(), Some((0, 10)));
        let current = view.get_slice().unwrap();
        assert!(!view.set_slice(current));
        assert!(view.set_slice(7));
        assert_eq!(view.get_slice(), Some(7));
        assert!(view.scroll(100));
        assert_eq!(view.get_slice(), Some(10));
        assert!(!view.scroll(1));
    }

    #[test]
    fn test_hidden_obliques_block_drags() {
        let mut view = viewport(Orientation::Axial);
        view.add_volume(&DataId::from("a"), volume(1.0, DVec3::ZERO));
        assert!(view.set_obliques_visibility(false));
        assert!(!view.rotate_cursor(0.3));
        assert!(!view.translate_cursor(DVec3::ONE));
        assert!(view.set_obliques_visibility(true));
        assert!(view.rotate_cursor(0.3));
    }

    #[test]
    fn test_window_level_setter_is_idempotent() {
        let mut view = viewport(Orientation::Axial);
        let a = DataId::from("a");
        view.add_volume(&a, volume(1.0, DVec3::ZERO));
        assert!(view.set_volume_window_level_min_max(&a, (0.0, 100.0)));
        assert!(!view.set_volume_window_level_min_max(&a, (0.0, 100.0)));
        assert_eq!(
            view.window_level(&a),
            Some(WindowLevel {
                window: 100.0,
                level: 50.0
            })
        );
    }

    #[test]
    fn test_mesh_contour_hidden_without_primary() {
        let mut view = viewport(Orientation::Axial);
        let mesh = Mesh::new(
            vec![
                DVec3::new(0.0, 0.0, 0.0),
                DVec3::new(10.0, 0.0, 10.0),
                DVec3::new(0.0, 10.0, 10.0),
            ],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let m = DataId::from("mesh");
        view.add_mesh(&m, Arc::new(mesh), [1.0, 0.0, 0.0]);
        assert!(!view.base().renderables(&m)[0].renderable.is_visible());

        let v = DataId::from("volume");
        view.add_volume(&v, volume(1.0, DVec3::ZERO));
        match &view.base().renderables(&m)[0].renderable {
            Renderable::MeshSlice(slice) => {
                assert!(slice.visible);
                assert!(!slice.contour.is_empty());
            }
            other => panic!("unexpected {}", other.kind()),
        }

        view.remove_data(&v, false);
        assert!(!view.base().renderables(&m)[0].renderable.is_visible());
    }

    #[test]
    fn test_capture_native() {
        let mut view = viewport(Orientation::Axial);
        view.add_volume(&DataId::from("a"), volume(1.0, DVec3::ZERO));
        let image = view.capture_native().unwrap();
        assert_eq!(image.dimensions(), (11, 11));
        assert!(view.capture(64, 48).is_some());
    }
}
