//! The scene orchestrator: three slice views and one 3D view kept in sync
//! around a single shared reslice cursor.
//!
//! `QuadView` owns the scene objects and fans every add, remove and
//! attribute change out to the views an object is attached to. It is
//! synchronous and single-threaded; asynchronous loading and debounced
//! flushes are driven from [`crate::session::Session`].
//!
//! ```no_run
//! use mpr_scene::{AssetItem, Gesture, Orientation, PresetCatalog, QuadView, SceneSettings};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let presets = Arc::new(PresetCatalog::builtin()?);
//! let mut scene = QuadView::new(presets, SceneSettings::default());
//! let item = AssetItem::new("ct", "ct.dcm");
//! scene.select(&item);
//! // ... decode the item, then:
//! // scene.complete_load(&item.id, result);
//! scene.gesture(Orientation::Axial, Gesture::Scroll { slices: 1 });
//! # Ok(())
//! # }
//! ```

use crate::asset_store::{AssetItem, DataId};
use crate::cursor::{ResliceCursor, SharedCursor};
use crate::enums::Orientation;
use crate::loader::{DataKind, LoadError, LoadedData};
use crate::presets::PresetCatalog;
use crate::renderable::{Rgb, WindowLevel};
use crate::renderer::RenderSettings;
use crate::reslice_math;
use crate::scene_object::{ObjectKind, SceneObject};
use crate::slice_viewport::SliceViewport;
use crate::threed_viewport::ThreeDViewport;
use crate::viewport::{View, ViewId};

use glam::DVec3;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Colors handed to meshes in selection order
pub const MESH_PALETTE: [Rgb; 6] = [
    [0.89, 0.10, 0.11],
    [0.22, 0.49, 0.72],
    [0.30, 0.69, 0.29],
    [0.60, 0.31, 0.64],
    [1.00, 0.50, 0.00],
    [1.00, 1.00, 0.20],
];

#[derive(Debug, Clone)]
pub struct SceneSettings {
    pub render: RenderSettings,
    pub obliques_visible: bool,
    pub overlay_opacity: f64,
    pub default_preset: Option<String>,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            render: RenderSettings::default(),
            obliques_visible: true,
            overlay_opacity: 0.8,
            default_preset: None,
        }
    }
}

/// User input on a slice view
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    Scroll { slices: i64 },
    CursorRotate { angle: f64 },
    CursorTranslate { center: DVec3 },
    CursorDragEnd,
    WindowLevelDrag { window_delta: f64, level_delta: f64 },
    WindowLevelDragEnd,
}

/// Shared state committed by a debounced flush
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlushKey {
    Cursor,
    WindowLevel,
}

/// What the caller must do with the flush timer after a gesture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushRequest {
    None,
    /// (Re)arm the timer of this key
    Debounce(FlushKey),
    /// Already flushed; drop any pending timer of this key
    Flushed(FlushKey),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliderState {
    pub range: Option<(usize, usize)>,
    pub value: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CursorSnapshot {
    pub center: DVec3,
    pub normals: [DVec3; 3],
    /// Indexed by [`Orientation::index`]
    pub sliders: [SliderState; 3],
}

/// Events for the presentation layer
#[derive(Clone, Debug, PartialEq)]
pub enum SceneNotification {
    ItemSelected(DataId),
    ItemLoaded { id: DataId, kind: DataKind },
    ItemRemoved(DataId),
    LoadFailed { id: DataId, message: String },
    Cleared,
    CursorChanged(CursorSnapshot),
    WindowLevelChanged { id: DataId, min_max: (f64, f64) },
}

fn view_of<'a>(
    slice_views: &'a mut [SliceViewport; 3],
    threed_view: &'a mut ThreeDViewport,
    id: ViewId,
) -> &'a mut dyn View {
    match id {
        ViewId::Slice(orientation) => &mut slice_views[orientation.index()],
        ViewId::ThreeD => threed_view,
    }
}

pub struct QuadView {
    cursor: SharedCursor,
    slice_views: [SliceViewport; 3],
    threed_view: ThreeDViewport,
    objects: Vec<SceneObject>,
    detached: Vec<ViewId>,
    settings: SceneSettings,
    meshes_shown: usize,
    dragging: Option<Orientation>,
    pending_window_level: Option<(DataId, WindowLevel)>,
    notifications: Vec<SceneNotification>,
}

impl QuadView {
    pub fn new(presets: Arc<PresetCatalog>, settings: SceneSettings) -> Self {
        let cursor = ResliceCursor::shared();
        let slice_views = Orientation::ALL.map(|orientation| {
            SliceViewport::new(
                orientation,
                cursor.clone(),
                settings.render,
                settings.obliques_visible,
                settings.overlay_opacity,
            )
        });
        let threed_view =
            ThreeDViewport::new(presets, settings.default_preset.clone(), settings.render);
        Self {
            cursor,
            slice_views,
            threed_view,
            objects: Vec::new(),
            detached: Vec::new(),
            settings,
            meshes_shown: 0,
            dragging: None,
            pending_window_level: None,
            notifications: Vec::new(),
        }
    }

    pub fn cursor(&self) -> &SharedCursor {
        &self.cursor
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn slice_view(&self, orientation: Orientation) -> &SliceViewport {
        &self.slice_views[orientation.index()]
    }

    pub fn slice_view_mut(&mut self, orientation: Orientation) -> &mut SliceViewport {
        &mut self.slice_views[orientation.index()]
    }

    pub fn threed_view(&self) -> &ThreeDViewport {
        &self.threed_view
    }

    pub fn threed_view_mut(&mut self) -> &mut ThreeDViewport {
        &mut self.threed_view
    }

    pub fn view(&self, id: ViewId) -> &dyn View {
        match id {
            ViewId::Slice(orientation) => self.slice_view(orientation),
            ViewId::ThreeD => &self.threed_view,
        }
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, id: &DataId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id() == id)
    }

    fn position(&self, id: &DataId) -> Option<usize> {
        self.objects.iter().position(|o| o.id() == id)
    }

    pub fn contains(&self, id: &DataId) -> bool {
        self.position(id).is_some()
    }

    /// Events produced since the last call
    pub fn drain_notifications(&mut self) -> Vec<SceneNotification> {
        std::mem::take(&mut self.notifications)
    }

    fn attached_views(&self) -> Vec<ViewId> {
        ViewId::ALL
            .into_iter()
            .filter(|id| !self.detached.contains(id))
            .collect()
    }

    /// Creates the unresolved object of a newly selected item, flagged as
    /// loading. Returns `false` if the item is already in the scene.
    pub fn select(&mut self, item: &AssetItem) -> bool {
        if self.contains(&item.id) {
            return false;
        }
        info!("Selecting {} ({})", item.id, item.name);
        let mut object = SceneObject::new(item);
        object.set_loading(true);
        self.objects.push(object);
        self.notifications
            .push(SceneNotification::ItemSelected(item.id.clone()));
        true
    }

    /// Applies the outcome of an item load. A failure drops the object; a
    /// success replaces it with its resolved record and shows it in every
    /// attached view. Outcomes for items no longer selected are ignored.
    pub fn complete_load(&mut self, id: &DataId, result: Result<LoadedData, LoadError>) -> bool {
        let Some(index) = self.position(id) else {
            debug!("Dropping load result of deselected item {}", id);
            return false;
        };
        if !self.objects[index].is_loading() {
            return false;
        }

        let data = match result {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to load {}: {}", id, e);
                self.objects.remove(index);
                self.notifications.push(SceneNotification::LoadFailed {
                    id: id.clone(),
                    message: e.to_string(),
                });
                return false;
            }
        };

        let kind = data.kind();
        let color = MESH_PALETTE[self.meshes_shown % MESH_PALETTE.len()];
        if kind == DataKind::Mesh {
            self.meshes_shown += 1;
        }
        let preset = self.threed_view.default_preset().map(str::to_string);
        let unresolved = self.objects.remove(index);
        self.objects
            .insert(index, unresolved.resolve(data, preset, color));

        for view in self.attached_views() {
            self.show(index, view);
        }

        if kind == DataKind::Volume {
            let opacity = if self.is_primary(id) {
                1.0
            } else {
                self.settings.overlay_opacity
            };
            self.objects[index].set_opacity(opacity);
            self.apply_attributes(index);
        }

        info!("Loaded {} as {:?}", id, kind);
        self.notifications.push(SceneNotification::ItemLoaded {
            id: id.clone(),
            kind,
        });
        self.publish_cursor();
        true
    }

    /// Adds a resolved object to one view.
    fn show(&mut self, index: usize, view_id: ViewId) {
        let object = &mut self.objects[index];
        let view = view_of(&mut self.slice_views, &mut self.threed_view, view_id);
        match object.kind() {
            ObjectKind::Volume(attributes) => view.add_volume(object.id(), attributes.data.clone()),
            ObjectKind::Mesh(attributes) => {
                view.add_mesh(object.id(), attributes.data.clone(), attributes.color)
            }
            ObjectKind::Unresolved => return,
        }
        object.attach(view_id);
    }

    /// Pushes an object's stored appearance to the views it is attached to.
    fn apply_attributes(&mut self, index: usize) {
        let object = &self.objects[index];
        let id = object.id().clone();
        let opacity = object.opacity();
        let views = object.views().to_vec();
        match object.kind().clone() {
            ObjectKind::Volume(attributes) => {
                for view_id in views {
                    match view_id {
                        ViewId::Slice(o) => {
                            let view = &mut self.slice_views[o.index()];
                            view.set_volume_window_level_min_max(&id, attributes.window_level_min_max);
                            view.set_volume_opacity(&id, opacity);
                        }
                        ViewId::ThreeD => {
                            self.threed_view.set_volume_opacity(&id, opacity);
                            if let Some(name) = &attributes.preset_name {
                                self.threed_view
                                    .set_volume_preset(&id, name, attributes.preset_range);
                            }
                        }
                    }
                }
            }
            ObjectKind::Mesh(attributes) => {
                for view_id in views {
                    let view = view_of(&mut self.slice_views, &mut self.threed_view, view_id);
                    view.set_mesh_opacity(&id, opacity);
                    view.set_mesh_color(&id, attributes.color);
                }
            }
            ObjectKind::Unresolved => {}
        }
    }

    /// Releases the cursor once no slice view has a primary volume.
    fn release_cursor_if_unused(&mut self) {
        if self.slice_views.iter().all(|v| !v.has_primary()) {
            self.cursor.borrow_mut().release();
        }
    }

    /// Deselects an item: removes it from every view it is shown in.
    pub fn remove(&mut self, id: &DataId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        info!("Removing {}", id);
        let object = self.objects.remove(index);
        for view_id in object.views() {
            let view = view_of(&mut self.slice_views, &mut self.threed_view, *view_id);
            view.remove_data(id, true);
            view.render();
        }
        if self
            .pending_window_level
            .as_ref()
            .is_some_and(|(pending, _)| pending == id)
        {
            self.pending_window_level = None;
        }
        self.release_cursor_if_unused();
        self.notifications
            .push(SceneNotification::ItemRemoved(id.clone()));
        if object.is_volume() {
            self.publish_cursor();
        }
        true
    }

    /// Removes every object and empties every view.
    pub fn clear(&mut self) {
        info!("Clearing scene");
        self.objects.clear();
        for view in self.slice_views.iter_mut() {
            view.clear(false);
        }
        self.threed_view.clear(false);
        self.cursor.borrow_mut().release();
        self.meshes_shown = 0;
        self.dragging = None;
        self.pending_window_level = None;
        self.notifications.push(SceneNotification::Cleared);
    }

    /// Back to the axis-aligned cursor centered on the primary volume and
    /// recentered cameras.
    pub fn reset(&mut self) {
        for view in self.slice_views.iter_mut() {
            view.reset();
        }
        for view in self.slice_views.iter_mut() {
            view.sync_from_cursor();
        }
        self.threed_view.reset();
        self.publish_cursor();
    }

    fn sync_slice_views(&mut self, except: Option<Orientation>) {
        for view in self.slice_views.iter_mut() {
            if Some(view.orientation()) != except {
                view.sync_from_cursor();
            }
        }
    }

    fn begin_drag(&mut self, orientation: Orientation) {
        if self.dragging == Some(orientation) {
            return;
        }
        self.dragging = Some(orientation);
        for view in self.slice_views.iter_mut() {
            if view.orientation() != orientation {
                view.start_animation();
            }
        }
    }

    fn end_drag(&mut self) {
        if self.dragging.take().is_none() {
            return;
        }
        for view in self.slice_views.iter_mut() {
            view.stop_animation();
        }
    }

    /// Routes a gesture on the slice view of `orientation` into the shared
    /// cursor or the primary's window/level.
    pub fn gesture(&mut self, orientation: Orientation, gesture: Gesture) -> FlushRequest {
        let index = orientation.index();
        match gesture {
            Gesture::Scroll { slices } => {
                if !self.slice_views[index].scroll(slices) {
                    return FlushRequest::None;
                }
                self.sync_slice_views(Some(orientation));
                self.flush(FlushKey::Cursor);
                FlushRequest::Flushed(FlushKey::Cursor)
            }
            Gesture::CursorRotate { angle } => {
                if !self.slice_views[index].rotate_cursor(angle) {
                    return FlushRequest::None;
                }
                self.begin_drag(orientation);
                self.sync_slice_views(Some(orientation));
                FlushRequest::Debounce(FlushKey::Cursor)
            }
            Gesture::CursorTranslate { center } => {
                if !self.slice_views[index].translate_cursor(center) {
                    return FlushRequest::None;
                }
                self.begin_drag(orientation);
                self.sync_slice_views(Some(orientation));
                FlushRequest::Debounce(FlushKey::Cursor)
            }
            Gesture::CursorDragEnd => {
                self.end_drag();
                self.flush(FlushKey::Cursor);
                FlushRequest::Flushed(FlushKey::Cursor)
            }
            Gesture::WindowLevelDrag {
                window_delta,
                level_delta,
            } => {
                let Some((id, window_level)) =
                    self.slice_views[index].adjust_window_level(window_delta, level_delta)
                else {
                    return FlushRequest::None;
                };
                self.begin_drag(orientation);
                for view in self.slice_views.iter_mut() {
                    if view.orientation() != orientation {
                        view.set_volume_window_level(&id, window_level);
                    }
                }
                self.pending_window_level = Some((id, window_level));
                FlushRequest::Debounce(FlushKey::WindowLevel)
            }
            Gesture::WindowLevelDragEnd => {
                self.end_drag();
                self.flush(FlushKey::WindowLevel);
                FlushRequest::Flushed(FlushKey::WindowLevel)
            }
        }
    }

    /// Commits the shared state behind `key` and notifies about it.
    pub fn flush(&mut self, key: FlushKey) -> bool {
        debug!("Flushing {:?}", key);
        match key {
            FlushKey::Cursor => self.publish_cursor(),
            FlushKey::WindowLevel => {
                let Some((id, window_level)) = self.pending_window_level.take() else {
                    return false;
                };
                let min_max = window_level.to_min_max();
                let Some(index) = self.position(&id) else {
                    return false;
                };
                if !self.objects[index].set_window_level_min_max(min_max) {
                    return false;
                }
                self.notifications
                    .push(SceneNotification::WindowLevelChanged { id, min_max });
                true
            }
        }
    }

    pub fn cursor_snapshot(&self) -> Option<CursorSnapshot> {
        let cursor = self.cursor.borrow();
        if !cursor.is_initialized() {
            return None;
        }
        let sliders = Orientation::ALL.map(|o| SliderState {
            range: self.slice_view(o).get_slice_range(),
            value: self.slice_view(o).get_slice(),
        });
        Some(CursorSnapshot {
            center: cursor.center(),
            normals: cursor.normals(),
            sliders,
        })
    }

    fn publish_cursor(&mut self) -> bool {
        let Some(snapshot) = self.cursor_snapshot() else {
            return false;
        };
        self.notifications
            .push(SceneNotification::CursorChanged(snapshot));
        true
    }

    pub fn slice_range(&self, orientation: Orientation) -> Option<(usize, usize)> {
        self.slice_view(orientation).get_slice_range()
    }

    pub fn slice(&self, orientation: Orientation) -> Option<usize> {
        self.slice_view(orientation).get_slice()
    }

    /// Slider input for the view of `orientation`
    pub fn set_slice(&mut self, orientation: Orientation, index: usize) -> bool {
        if !self.slice_views[orientation.index()].set_slice(index) {
            return false;
        }
        self.sync_slice_views(Some(orientation));
        self.publish_cursor();
        true
    }

    /// Moves the shared center to `point`, clamped into the primary volume.
    pub fn set_cursor_position(&mut self, point: DVec3) -> bool {
        if !self.cursor.borrow().is_initialized() {
            return false;
        }
        if !reslice_math::set_reslice_center(&mut self.cursor.borrow_mut(), point) {
            return false;
        }
        self.sync_slice_views(None);
        self.publish_cursor();
        true
    }

    pub fn set_obliques_visibility(&mut self, visible: bool) -> bool {
        self.settings.obliques_visible = visible;
        let mut modified = false;
        for view in self.slice_views.iter_mut() {
            modified = view.set_obliques_visibility(visible) || modified;
        }
        modified
    }

    /// True if any attached slice view shows `id` as its primary volume.
    pub fn is_primary(&self, id: &DataId) -> bool {
        self.object(id).is_some_and(|object| {
            object.views().iter().any(|view| match view {
                ViewId::Slice(o) => self.slice_view(*o).is_primary_volume(id),
                ViewId::ThreeD => false,
            })
        })
    }

    fn loaded_index(&self, id: &DataId) -> Option<usize> {
        self.position(id)
            .filter(|index| self.objects[*index].is_loaded())
    }

    pub fn set_opacity(&mut self, id: &DataId, opacity: f64) -> bool {
        let Some(index) = self.loaded_index(id) else {
            return false;
        };
        if !self.objects[index].set_opacity(opacity) {
            return false;
        }
        let object = &self.objects[index];
        let opacity = object.opacity();
        let is_volume = object.is_volume();
        for view_id in object.views() {
            let view = view_of(&mut self.slice_views, &mut self.threed_view, *view_id);
            if is_volume {
                view.set_volume_opacity(id, opacity);
            } else {
                view.set_mesh_opacity(id, opacity);
            }
        }
        true
    }

    /// Window as `(min, max)`; only slice views show windowing.
    pub fn set_window_level_min_max(&mut self, id: &DataId, min_max: (f64, f64)) -> bool {
        let Some(index) = self.loaded_index(id) else {
            return false;
        };
        if !self.objects[index].set_window_level_min_max(min_max) {
            return false;
        }
        for view_id in self.objects[index].views() {
            if let ViewId::Slice(o) = view_id {
                self.slice_views[o.index()].set_volume_window_level_min_max(id, min_max);
            }
        }
        true
    }

    /// Applies a preset over the volume's scalar range; only the 3D view
    /// shows presets. Unknown names leave everything as is.
    pub fn set_preset(&mut self, id: &DataId, name: &str) -> bool {
        if self.threed_view.presets().get_by_name(name).is_none() {
            warn!("Preset {} not found", name);
            return false;
        }
        let Some(index) = self.loaded_index(id) else {
            return false;
        };
        let Some(range) = self.objects[index].volume().map(|v| v.scalar_range) else {
            return false;
        };
        if !self.objects[index].set_preset(name, Some(range)) {
            return false;
        }
        self.threed_view.set_default_preset(name);
        if self.objects[index].views().contains(&ViewId::ThreeD) {
            self.threed_view.set_volume_preset(id, name, Some(range));
        }
        true
    }

    pub fn set_color(&mut self, id: &DataId, color: Rgb) -> bool {
        let Some(index) = self.loaded_index(id) else {
            return false;
        };
        if !self.objects[index].set_color(color) {
            return false;
        }
        for view_id in self.objects[index].views() {
            view_of(&mut self.slice_views, &mut self.threed_view, *view_id)
                .set_mesh_color(id, color);
        }
        true
    }

    pub fn start_animation(&mut self) {
        for view in self.slice_views.iter_mut() {
            view.start_animation();
        }
        self.threed_view.start_animation();
    }

    pub fn stop_animation(&mut self) {
        for view in self.slice_views.iter_mut() {
            view.stop_animation();
        }
        self.threed_view.stop_animation();
    }

    pub fn is_detached(&self, view: ViewId) -> bool {
        self.detached.contains(&view)
    }

    /// Takes every object out of one view, e.g. while another view is
    /// shown fullscreen.
    pub fn detach_view(&mut self, view_id: ViewId) -> bool {
        if self.detached.contains(&view_id) {
            return false;
        }
        debug!("Detaching {}", view_id);
        self.detached.push(view_id);
        let view = view_of(&mut self.slice_views, &mut self.threed_view, view_id);
        for object in self.objects.iter_mut() {
            if object.detach(view_id) {
                view.remove_data(object.id(), true);
            }
        }
        view.render();
        self.release_cursor_if_unused();
        true
    }

    /// Shows every loaded object in a previously detached view again.
    pub fn attach_view(&mut self, view_id: ViewId) -> bool {
        let Some(position) = self.detached.iter().position(|v| *v == view_id) else {
            return false;
        };
        debug!("Attaching {}", view_id);
        self.detached.remove(position);
        // The volume that is primary elsewhere goes first so it is primary here too.
        let primary = match view_id {
            ViewId::Slice(_) => self.slice_views.iter().find_map(SliceViewport::primary_id),
            ViewId::ThreeD => None,
        };
        let mut order: Vec<usize> = (0..self.objects.len())
            .filter(|index| self.objects[*index].is_loaded())
            .collect();
        if let Some(primary) = primary {
            order.sort_by_key(|index| self.objects[*index].id() != &primary);
        }
        for index in order {
            self.show(index, view_id);
            self.apply_attributes(index);
        }
        if view_id.is_slice() {
            self.sync_slice_views(None);
        }
        self.publish_cursor();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use crate::renderable::Renderable;
    use crate::volume::Volume;
    use ndarray::Array3;

    fn scene() -> QuadView {
        QuadView::new(
            Arc::new(PresetCatalog::builtin().unwrap()),
            SceneSettings::default(),
        )
    }

    fn volume(value: f32) -> LoadedData {
        let data = Array3::from_elem((5, 6, 7), value);
        LoadedData::Volume(Arc::new(Volume::new(data, DVec3::ONE, DVec3::ZERO)))
    }

    fn load(scene: &mut QuadView, id: &str, data: LoadedData) {
        let item = AssetItem::new(id, id);
        assert!(scene.select(&item));
        assert!(scene.complete_load(&item.id, Ok(data)));
    }

    #[test]
    fn test_select_twice() {
        let mut scene = scene();
        let item = AssetItem::new("a", "a.dcm");
        assert!(scene.select(&item));
        assert!(!scene.select(&item));
        assert!(scene.object(&item.id).unwrap().is_loading());
    }

    #[test]
    fn test_failed_load_rolls_back() {
        let mut scene = scene();
        let item = AssetItem::new("a", "a.dcm");
        scene.select(&item);
        assert!(!scene.complete_load(&item.id, Err(LoadError::NoFile)));
        assert!(!scene.contains(&item.id));
        let notifications = scene.drain_notifications();
        assert!(notifications.contains(&SceneNotification::LoadFailed {
            id: item.id.clone(),
            message: "No file to load. Please check the selected item.".into(),
        }));
    }

    #[test]
    fn test_late_result_for_removed_item_is_dropped() {
        let mut scene = scene();
        let item = AssetItem::new("a", "a.dcm");
        scene.select(&item);
        scene.remove(&item.id);
        assert!(!scene.complete_load(&item.id, Ok(volume(1.0))));
        assert!(scene.threed_view().base().is_empty());
    }

    #[test]
    fn test_secondary_opacity_and_primary_flag() {
        let mut scene = scene();
        load(&mut scene, "a", volume(1.0));
        load(&mut scene, "b", volume(2.0));
        let a = DataId::from("a");
        let b = DataId::from("b");
        assert!(scene.is_primary(&a));
        assert!(!scene.is_primary(&b));
        assert_eq!(scene.object(&a).unwrap().opacity(), 1.0);
        assert_eq!(scene.object(&b).unwrap().opacity(), 0.8);
    }

    #[test]
    fn test_window_level_drag_flushes_min_max() {
        let mut scene = scene();
        load(&mut scene, "a", volume(1.0));
        let a = DataId::from("a");
        scene.set_window_level_min_max(&a, (0.0, 100.0));
        scene.drain_notifications();

        let request = scene.gesture(
            Orientation::Axial,
            Gesture::WindowLevelDrag {
                window_delta: 20.0,
                level_delta: 10.0,
            },
        );
        assert_eq!(request, FlushRequest::Debounce(FlushKey::WindowLevel));
        assert!(scene.slice_view(Orientation::Coronal).base().renderer().is_animating());
        assert_eq!(
            scene.slice_view(Orientation::Coronal).window_level(&a),
            Some(WindowLevel {
                window: 120.0,
                level: 60.0
            })
        );

        let request = scene.gesture(Orientation::Axial, Gesture::WindowLevelDragEnd);
        assert_eq!(request, FlushRequest::Flushed(FlushKey::WindowLevel));
        assert!(!scene.slice_view(Orientation::Coronal).base().renderer().is_animating());
        assert_eq!(
            scene.object(&a).unwrap().volume().unwrap().window_level_min_max,
            (0.0, 120.0)
        );
        assert_eq!(
            scene.drain_notifications(),
            vec![SceneNotification::WindowLevelChanged {
                id: a,
                min_max: (0.0, 120.0)
            }]
        );
    }

    #[test]
    fn test_unknown_preset_is_ignored() {
        let mut scene = scene();
        load(&mut scene, "a", volume(1.0));
        let a = DataId::from("a");
        let before = scene.object(&a).unwrap().volume().unwrap().preset_name.clone();
        assert!(!scene.set_preset(&a, "nope"));
        assert_eq!(scene.object(&a).unwrap().volume().unwrap().preset_name, before);
        assert!(scene.set_preset(&a, "CT-Bone"));
        assert!(!scene.set_preset(&a, "CT-Bone"));
        assert_eq!(scene.threed_view().default_preset(), Some("CT-Bone"));
    }

    #[test]
    fn test_clear_releases_cursor() {
        let mut scene = scene();
        load(&mut scene, "a", volume(1.0));
        scene.clear();
        assert!(scene.objects().is_empty());
        assert!(!scene.cursor().borrow().is_initialized());
        for o in Orientation::ALL {
            assert!(scene.slice_view(o).base().is_empty());
            assert_eq!(scene.slice_range(o), None);
        }
    }

    #[test]
    fn test_detach_and_attach_view() {
        let mut scene = scene();
        load(&mut scene, "a", volume(1.0));
        let a = DataId::from("a");
        assert!(scene.detach_view(ViewId::ThreeD));
        assert!(!scene.threed_view().base().contains(&a));
        assert!(!scene.object(&a).unwrap().views().contains(&ViewId::ThreeD));
        assert!(scene.attach_view(ViewId::ThreeD));
        assert!(scene.threed_view().base().contains(&a));
        assert!(!scene.attach_view(ViewId::ThreeD));
    }

    #[test]
    fn test_meshes_take_palette_colors_in_load_order() {
        let mut scene = scene();
        for id in ["m1", "m2"] {
            let mesh = Mesh::new(vec![DVec3::ZERO, DVec3::X, DVec3::Y], vec![[0, 1, 2]]).unwrap();
            load(&mut scene, id, LoadedData::Mesh(Arc::new(mesh)));
        }
        for (id, expected) in [("m1", MESH_PALETTE[0]), ("m2", MESH_PALETTE[1])] {
            let entries = scene.threed_view().base().renderables(&DataId::from(id));
            assert!(matches!(
                &entries[0].renderable,
                Renderable::Mesh(actor) if actor.color == expected
            ));
        }
    }

    #[test]
    fn test_cursor_position_is_clamped() {
        let mut scene = scene();
        load(&mut scene, "a", volume(1.0));
        assert!(scene.set_cursor_position(DVec3::new(100.0, 2.0, -5.0)));
        assert_eq!(scene.cursor().borrow().center(), DVec3::new(6.0, 2.0, 0.0));
        assert!(!scene.set_cursor_position(DVec3::new(100.0, 2.0, -5.0)));
    }
}
