use crate::asset_store::DataId;
use crate::enums::Orientation;
use crate::geometry::Bounds;
use crate::mesh::Mesh;
use crate::renderable::{Renderable, RenderableId, Rgb};
use crate::renderer::Renderer;
use crate::volume::Volume;

use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Identifies one of the four viewports of a scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewId {
    Slice(Orientation),
    ThreeD,
}

impl ViewId {
    pub const ALL: [ViewId; 4] = [
        ViewId::Slice(Orientation::Sagittal),
        ViewId::ThreeD,
        ViewId::Slice(Orientation::Coronal),
        ViewId::Slice(Orientation::Axial),
    ];

    pub fn is_slice(self) -> bool {
        matches!(self, ViewId::Slice(_))
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewId::Slice(orientation) => write!(f, "{orientation}_view"),
            ViewId::ThreeD => f.write_str("threed_view"),
        }
    }
}

#[derive(Debug)]
pub struct Registered {
    pub handle: RenderableId,
    pub renderable: Renderable,
}

/// A renderer plus the registry of what was added to it, per data id.
///
/// Ids keep their registration order, which is what promotion of a
/// secondary volume relies on.
#[derive(Debug)]
pub struct ViewportBase {
    id: ViewId,
    renderer: Renderer,
    registry: Vec<(DataId, Vec<Registered>)>,
    next_handle: u64,
}

impl ViewportBase {
    pub fn new(id: ViewId, renderer: Renderer) -> Self {
        Self {
            id,
            renderer,
            registry: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer {
        &mut self.renderer
    }

    /// Appends `renderable` to the list of `data_id`; never replaces.
    pub fn register(&mut self, data_id: &DataId, renderable: Renderable) -> RenderableId {
        let handle = RenderableId(self.next_handle);
        self.next_handle += 1;
        let entry = Registered { handle, renderable };
        match self.registry.iter_mut().find(|(id, _)| id == data_id) {
            Some((_, list)) => list.push(entry),
            None => self.registry.push((data_id.clone(), vec![entry])),
        }
        handle
    }

    /// Removes one renderable, or all of them when `only` is `None`, and
    /// detaches what was removed. Unknown ids are a no-op.
    pub fn unregister(
        &mut self,
        data_id: &DataId,
        only: Option<RenderableId>,
        suppress_redraw: bool,
    ) -> Vec<Renderable> {
        let Some(position) = self.registry.iter().position(|(id, _)| id == data_id) else {
            return Vec::new();
        };
        let list = &mut self.registry[position].1;
        let mut removed = Vec::new();
        let mut index = 0;
        while index < list.len() {
            if only.is_none_or(|handle| list[index].handle == handle) {
                let mut entry = list.remove(index);
                entry.renderable.detach();
                removed.push(entry.renderable);
            } else {
                index += 1;
            }
        }
        if list.is_empty() {
            self.registry.remove(position);
        }
        if !suppress_redraw {
            self.render();
        }
        removed
    }

    pub fn unregister_all(&mut self, suppress_redraw: bool) {
        let ids: Vec<DataId> = self.registry.iter().map(|(id, _)| id.clone()).collect();
        for id in ids {
            self.unregister(&id, None, true);
        }
        if !suppress_redraw {
            self.render();
        }
    }

    pub fn render(&mut self) -> bool {
        self.renderer.render()
    }

    pub fn contains(&self, data_id: &DataId) -> bool {
        self.registry.iter().any(|(id, _)| id == data_id)
    }

    pub fn data_ids(&self) -> impl Iterator<Item = &DataId> {
        self.registry.iter().map(|(id, _)| id)
    }

    pub fn renderables(&self, data_id: &DataId) -> &[Registered] {
        self.registry
            .iter()
            .find(|(id, _)| id == data_id)
            .map(|(_, list)| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn renderables_mut(&mut self, data_id: &DataId) -> &mut [Registered] {
        self.registry
            .iter_mut()
            .find(|(id, _)| id == data_id)
            .map(|(_, list)| list.as_mut_slice())
            .unwrap_or(&mut [])
    }

    /// Every registration in registration order
    pub fn entries(&self) -> impl Iterator<Item = (&DataId, &Registered)> {
        self.registry
            .iter()
            .flat_map(|(id, list)| list.iter().map(move |entry| (id, entry)))
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&DataId, &mut Registered)> {
        self.registry
            .iter_mut()
            .flat_map(|(id, list)| {
                let id = &*id;
                list.iter_mut().map(move |entry| (id, entry))
            })
    }

    pub fn len(&self) -> usize {
        self.registry.iter().map(|(_, list)| list.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Bounds of everything currently visible
    pub fn visible_bounds(&self) -> Option<Bounds> {
        let bounds: Vec<Bounds> = self
            .entries()
            .filter(|(_, entry)| entry.renderable.is_visible())
            .map(|(_, entry)| entry.renderable.bounds())
            .collect();
        Bounds::union_all(&bounds)
    }

    /// Applies `update` to every renderable of `data_id` matching `filter`
    /// and redraws once if any of them changed.
    pub fn update_where(
        &mut self,
        data_id: &DataId,
        filter: impl Fn(&Renderable) -> bool,
        mut update: impl FnMut(&mut Renderable) -> bool,
    ) -> bool {
        let mut modified = false;
        for entry in self.renderables_mut(data_id) {
            if filter(&entry.renderable) {
                modified = update(&mut entry.renderable) || modified;
            }
        }
        if modified {
            self.render();
        }
        modified
    }
}

/// Operations every viewport kind supports.
pub trait View {
    fn base(&self) -> &ViewportBase;

    fn base_mut(&mut self) -> &mut ViewportBase;

    fn add_volume(&mut self, data_id: &DataId, volume: Arc<Volume>);

    fn add_mesh(&mut self, data_id: &DataId, mesh: Arc<Mesh>, color: Rgb);

    fn remove_data(&mut self, data_id: &DataId, suppress_redraw: bool);

    /// Recenters the camera (and, for slice views, the cursor)
    fn reset(&mut self);

    fn id(&self) -> ViewId {
        self.base().id()
    }

    fn clear(&mut self, suppress_redraw: bool) {
        self.base_mut().unregister_all(suppress_redraw);
    }

    fn render(&mut self) -> bool {
        self.base_mut().render()
    }

    fn set_volume_opacity(&mut self, data_id: &DataId, opacity: f64) -> bool {
        debug!("{}: set_volume_opacity {} {}", self.id(), data_id, opacity);
        self.base_mut()
            .update_where(data_id, Renderable::is_volume, |r| r.set_opacity(opacity))
    }

    fn set_mesh_opacity(&mut self, data_id: &DataId, opacity: f64) -> bool {
        self.base_mut()
            .update_where(data_id, Renderable::is_mesh, |r| r.set_opacity(opacity))
    }

    fn set_mesh_color(&mut self, data_id: &DataId, color: Rgb) -> bool {
        self.base_mut()
            .update_where(data_id, Renderable::is_mesh, |r| r.set_color(color))
    }

    fn start_animation(&mut self) {
        self.base_mut().renderer_mut().start_animation();
    }

    fn stop_animation(&mut self) {
        self.base_mut().renderer_mut().stop_animation();
    }
}
