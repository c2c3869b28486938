//! Renderable objects a viewport registers per data id.

use crate::geometry::Bounds;
use crate::mesh::{Mesh, Segment};
use crate::presets::VolumeProperty;
use crate::volume::Volume;

use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub type Rgb = [f64; 3];

/// Handle of one registered renderable, unique within a viewport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderableId(pub(crate) u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowLevel {
    pub window: f64,
    pub level: f64,
}

impl WindowLevel {
    pub fn from_min_max((min, max): (f64, f64)) -> Self {
        Self {
            window: max - min,
            level: (min + max) / 2.0,
        }
    }

    pub fn to_min_max(self) -> (f64, f64) {
        (self.level - self.window / 2.0, self.level + self.window / 2.0)
    }

    /// Maps a scalar to `[0, 1]` through this window
    pub fn normalize(self, value: f64) -> f64 {
        if self.window <= 0.0 {
            return if value >= self.level { 1.0 } else { 0.0 };
        }
        ((value - (self.level - self.window / 2.0)) / self.window).clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderableKind {
    ResliceSurface,
    ResliceOverlay,
    MeshSlice,
    Volume,
    Mesh,
}

impl fmt::Display for RenderableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderableKind::ResliceSurface => "reslice-surface",
            RenderableKind::ResliceOverlay => "reslice-overlay",
            RenderableKind::MeshSlice => "mesh-slice",
            RenderableKind::Volume => "volume",
            RenderableKind::Mesh => "mesh",
        })
    }
}

/// Primary volume of a slice viewport: drives the shared cursor and owns
/// the cursor widget.
#[derive(Debug, Clone)]
pub struct ResliceSurface {
    pub volume: Arc<Volume>,
    pub window_level: WindowLevel,
    pub centerline_opacity: f64,
    pub widget_processes_events: bool,
    pub interactor_bound: bool,
}

impl ResliceSurface {
    pub fn new(volume: Arc<Volume>, obliques_visible: bool) -> Self {
        let window_level = WindowLevel::from_min_max(volume.scalar_range());
        let mut surface = Self {
            volume,
            window_level,
            centerline_opacity: 1.0,
            widget_processes_events: true,
            interactor_bound: true,
        };
        surface.set_obliques_visibility(obliques_visible);
        surface
    }

    pub fn set_window_level(&mut self, window_level: WindowLevel) -> bool {
        if self.window_level == window_level {
            return false;
        }
        self.window_level = window_level;
        true
    }

    /// Hidden obliques also stop the widget from reacting to drags.
    pub fn set_obliques_visibility(&mut self, visible: bool) -> bool {
        let opacity = if visible { 1.0 } else { 0.0 };
        if self.centerline_opacity == opacity && self.widget_processes_events == visible {
            return false;
        }
        self.centerline_opacity = opacity;
        self.widget_processes_events = visible;
        true
    }
}

/// Secondary volume drawn on the primary's cutting plane
#[derive(Debug, Clone)]
pub struct ResliceOverlay {
    pub volume: Arc<Volume>,
    pub window_level: WindowLevel,
    pub opacity: f64,
}

impl ResliceOverlay {
    pub fn new(volume: Arc<Volume>, opacity: f64) -> Self {
        let window_level = WindowLevel::from_min_max(volume.scalar_range());
        Self {
            volume,
            window_level,
            opacity,
        }
    }
}

/// Contour of a mesh cut by a slice viewport's plane
#[derive(Debug, Clone)]
pub struct MeshSlice {
    pub mesh: Arc<Mesh>,
    pub color: Rgb,
    pub opacity: f64,
    pub contour: Vec<Segment>,
    pub visible: bool,
}

/// Direct volume rendering in the 3D view
#[derive(Debug, Clone)]
pub struct VolumeActor {
    pub volume: Arc<Volume>,
    pub property: VolumeProperty,
    pub opacity: f64,
}

#[derive(Debug, Clone)]
pub struct MeshActor {
    pub mesh: Arc<Mesh>,
    pub color: Rgb,
    pub opacity: f64,
}

#[derive(Debug, Clone)]
pub enum Renderable {
    ResliceSurface(ResliceSurface),
    ResliceOverlay(ResliceOverlay),
    MeshSlice(MeshSlice),
    Volume(VolumeActor),
    Mesh(MeshActor),
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

impl Renderable {
    pub fn kind(&self) -> RenderableKind {
        match self {
            Renderable::ResliceSurface(_) => RenderableKind::ResliceSurface,
            Renderable::ResliceOverlay(_) => RenderableKind::ResliceOverlay,
            Renderable::MeshSlice(_) => RenderableKind::MeshSlice,
            Renderable::Volume(_) => RenderableKind::Volume,
            Renderable::Mesh(_) => RenderableKind::Mesh,
        }
    }

    pub fn volume(&self) -> Option<&Arc<Volume>> {
        match self {
            Renderable::ResliceSurface(s) => Some(&s.volume),
            Renderable::ResliceOverlay(o) => Some(&o.volume),
            Renderable::Volume(v) => Some(&v.volume),
            Renderable::MeshSlice(_) | Renderable::Mesh(_) => None,
        }
    }

    pub fn is_volume(&self) -> bool {
        self.volume().is_some()
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self, Renderable::MeshSlice(_) | Renderable::Mesh(_))
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Renderable::MeshSlice(m) => m.mesh.bounds(),
            Renderable::Mesh(m) => m.mesh.bounds(),
            other => other
                .volume()
                .map(|v| v.bounds())
                .unwrap_or_else(|| Bounds::new(Default::default(), Default::default())),
        }
    }

    /// Whether it contributes to the visible bounds
    pub fn is_visible(&self) -> bool {
        match self {
            Renderable::MeshSlice(m) => m.visible,
            _ => true,
        }
    }

    /// Releases what ties the renderable to its viewport.
    pub fn detach(&mut self) {
        debug!("Detaching {}", self.kind());
        match self {
            Renderable::ResliceSurface(surface) => {
                surface.interactor_bound = false;
                surface.widget_processes_events = false;
            }
            Renderable::MeshSlice(slice) => {
                slice.visible = false;
                slice.contour.clear();
            }
            _ => {}
        }
    }

    /// Primary surfaces have no opacity of their own and ignore it.
    pub fn set_opacity(&mut self, opacity: f64) -> bool {
        match self {
            Renderable::ResliceSurface(_) => false,
            Renderable::ResliceOverlay(o) => replace(&mut o.opacity, opacity),
            Renderable::MeshSlice(m) => replace(&mut m.opacity, opacity),
            Renderable::Volume(v) => replace(&mut v.opacity, opacity),
            Renderable::Mesh(m) => replace(&mut m.opacity, opacity),
        }
    }

    pub fn set_window_level(&mut self, window_level: WindowLevel) -> bool {
        match self {
            Renderable::ResliceSurface(s) => s.set_window_level(window_level),
            Renderable::ResliceOverlay(o) => replace(&mut o.window_level, window_level),
            _ => false,
        }
    }

    pub fn set_color(&mut self, color: Rgb) -> bool {
        match self {
            Renderable::MeshSlice(m) => replace(&mut m.color, color),
            Renderable::Mesh(m) => replace(&mut m.color, color),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use ndarray::Array3;

    fn volume() -> Arc<Volume> {
        let data = Array3::from_shape_fn((2, 2, 2), |(z, _, _)| z as f32 * 100.0);
        Arc::new(Volume::new(data, DVec3::ONE, DVec3::ZERO))
    }

    #[test]
    fn test_window_level_min_max() {
        let wl = WindowLevel::from_min_max((-100.0, 300.0));
        assert_eq!(wl, WindowLevel { window: 400.0, level: 100.0 });
        assert_eq!(wl.to_min_max(), (-100.0, 300.0));
        assert_eq!(wl.normalize(100.0), 0.5);
    }

    #[test]
    fn test_primary_surface_ignores_opacity() {
        let mut surface = Renderable::ResliceSurface(ResliceSurface::new(volume(), true));
        assert!(!surface.set_opacity(0.3));
        let mut overlay = Renderable::ResliceOverlay(ResliceOverlay::new(volume(), 0.8));
        assert!(overlay.set_opacity(0.3));
        assert!(!overlay.set_opacity(0.3));
    }

    #[test]
    fn test_hidden_obliques_disable_widget() {
        let mut surface = ResliceSurface::new(volume(), true);
        assert!(surface.set_obliques_visibility(false));
        assert!(!surface.widget_processes_events);
        assert_eq!(surface.centerline_opacity, 0.0);
        assert!(!surface.set_obliques_visibility(false));
    }

    #[test]
    fn test_detach_unbinds_interactor() {
        let mut surface = Renderable::ResliceSurface(ResliceSurface::new(volume(), true));
        surface.detach();
        match surface {
            Renderable::ResliceSurface(s) => assert!(!s.interactor_bound),
            _ => unreachable!(),
        }
    }
}
