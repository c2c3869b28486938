//! The reslice cursor: three mutually orthogonal cutting planes meeting at a
//! single center point. One instance is shared by every slice viewport of a
//! scene.

use crate::enums::Orientation;
use crate::geometry::{Bounds, orthonormalize};

use glam::{DQuat, DVec3};
use std::cell::RefCell;
use std::rc::Rc;

/// Handle to the cursor shared by the slice viewports of one scene.
pub type SharedCursor = Rc<RefCell<ResliceCursor>>;

#[derive(Clone, Debug, PartialEq)]
pub struct ResliceCursor {
    center: DVec3,
    normals: [DVec3; 3],
    view_ups: [DVec3; 3],
    bounds: Option<Bounds>,
}

impl Default for ResliceCursor {
    fn default() -> Self {
        Self {
            center: DVec3::ZERO,
            normals: Orientation::ALL.map(Orientation::default_normal),
            view_ups: Orientation::ALL.map(Orientation::default_view_up),
            bounds: None,
        }
    }
}

impl ResliceCursor {
    pub fn shared() -> SharedCursor {
        Rc::new(RefCell::new(Self::default()))
    }

    /// A cursor is initialized once a primary volume has given it bounds.
    pub fn is_initialized(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn center(&self) -> DVec3 {
        self.center
    }

    pub fn normals(&self) -> [DVec3; 3] {
        self.normals
    }

    pub fn normal(&self, axis: Orientation) -> DVec3 {
        self.normals[axis.index()]
    }

    pub fn view_up(&self, axis: Orientation) -> DVec3 {
        self.view_ups[axis.index()]
    }

    /// Bounds of the primary volume the center is clamped to
    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Binds the cursor to a primary volume's bounds. The first binding
    /// centers the cursor on the volume; later bindings only re-clamp.
    pub fn attach_bounds(&mut self, bounds: Bounds) {
        if self.bounds.is_none() {
            self.bounds = Some(bounds);
            self.reset(bounds.center());
        } else {
            self.bounds = Some(bounds);
            self.center = bounds.clamp(self.center);
        }
    }

    /// Drops the volume binding once no primary volume is displayed.
    pub fn release(&mut self) {
        *self = Self::default();
    }

    /// Back to the axis-aligned orientation, centered on `center`.
    pub fn reset(&mut self, center: DVec3) {
        self.center = match self.bounds {
            Some(bounds) => bounds.clamp(center),
            None => center,
        };
        self.normals = Orientation::ALL.map(Orientation::default_normal);
        self.view_ups = Orientation::ALL.map(Orientation::default_view_up);
    }

    pub(crate) fn clamp_to_bounds(&self, point: DVec3) -> DVec3 {
        match self.bounds {
            Some(bounds) => bounds.clamp(point),
            None => point,
        }
    }

    pub(crate) fn set_center_unchecked(&mut self, center: DVec3) {
        self.center = center;
    }

    /// Rigidly rotates the whole cursor so that `axis` gets `normal`.
    pub(crate) fn align_normal(&mut self, axis: Orientation, normal: DVec3) {
        let rotation = DQuat::from_rotation_arc(self.normal(axis), normal);
        self.normals = self.normals.map(|n| rotation * n);
        self.view_ups = self.view_ups.map(|u| rotation * u);
        self.normals[axis.index()] = normal;
        self.reorthogonalize(axis);
    }

    /// Rotates the two planes crossing `axis` around its normal; the plane
    /// of `axis` itself does not move.
    pub fn rotate_about(&mut self, axis: Orientation, angle: f64) {
        if angle == 0.0 {
            return;
        }
        let rotation = DQuat::from_axis_angle(self.normal(axis), angle);
        for other in axis.others() {
            self.normals[other.index()] = rotation * self.normals[other.index()];
            self.view_ups[other.index()] = rotation * self.view_ups[other.index()];
        }
        self.reorthogonalize(axis);
    }

    /// Replaces all three normals at once, orthonormalized around `anchor`.
    pub(crate) fn set_normals(&mut self, normals: [DVec3; 3], anchor: Orientation) {
        let old = self.normals;
        self.normals = normals;
        self.reorthogonalize(anchor);
        for axis in Orientation::ALL {
            let i = axis.index();
            let rotation = DQuat::from_rotation_arc(old[i], self.normals[i]);
            self.view_ups[i] = rotation * self.view_ups[i];
        }
    }

    fn reorthogonalize(&mut self, anchor: Orientation) {
        let [b, c] = anchor.others();
        let [na, nb, nc] = orthonormalize([
            self.normal(anchor),
            self.normal(b),
            self.normal(c),
        ]);
        self.normals[anchor.index()] = na;
        self.normals[b.index()] = nb;
        self.normals[c.index()] = nc;
        for axis in Orientation::ALL {
            let n = self.normal(axis);
            let up = self.view_ups[axis.index()];
            let projected = (up - n * up.dot(n)).normalize_or_zero();
            if projected != DVec3::ZERO {
                self.view_ups[axis.index()] = projected;
            }
        }
    }
}
