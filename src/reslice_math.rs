//! Plane math behind the slice sliders: center and normal accessors with
//! equality short-circuits, the line through a slice plane's normal
//! clipped to the volume, and index <-> position conversion along it.
//!
//! Everything here is stateless; the only mutation happens on the cursor
//! handed in.

use crate::cursor::ResliceCursor;
use crate::enums::Orientation;
use crate::geometry::Bounds;

use glam::DVec3;

/// Half length of the line intersected with the volume bounds
pub const LARGE: f64 = 1e6;

/// Slack when rounding a spacing-normalized length up to a slice count
const COUNT_TOLERANCE: f64 = 1e-6;

/// Normals closer than this per component are the same plane
const NORMAL_TOLERANCE: f64 = 1e-12;

pub fn reslice_center(cursor: &ResliceCursor) -> DVec3 {
    cursor.center()
}

/// Moves the cursor center, clamped into the primary volume's bounds.
/// Returns `false` if the (clamped) point is already the center.
pub fn set_reslice_center(cursor: &mut ResliceCursor, point: DVec3) -> bool {
    let clamped = cursor.clamp_to_bounds(point);
    if clamped == cursor.center() {
        return false;
    }
    cursor.set_center_unchecked(clamped);
    true
}

pub fn reslice_normals(cursor: &ResliceCursor) -> [DVec3; 3] {
    cursor.normals()
}

/// Points the plane of `axis` along `normal`, rotating the other two
/// planes with it. Zero vectors and the current normal are no-ops.
pub fn set_reslice_normal(cursor: &mut ResliceCursor, normal: DVec3, axis: Orientation) -> bool {
    let normal = normal.normalize_or_zero();
    if normal == DVec3::ZERO || normal.abs_diff_eq(cursor.normal(axis), NORMAL_TOLERANCE) {
        return false;
    }
    cursor.align_normal(axis, normal);
    true
}

/// Entry and exit points of the line through `center` along the normal of
/// `axis`. A `center` outside `bounds` falls back to the cursor center.
pub fn reslice_range(
    cursor: &ResliceCursor,
    axis: Orientation,
    bounds: &Bounds,
    center: Option<DVec3>,
) -> Option<(DVec3, DVec3)> {
    let center = center
        .filter(|c| bounds.contains(*c))
        .unwrap_or_else(|| cursor.center());
    let normal = cursor.normal(axis);
    bounds.intersect_line(center - normal * LARGE, center + normal * LARGE)
}

/// Number of slice steps between the two ends of a range, in units of
/// voxel spacing.
pub fn slice_count((start, end): (DVec3, DVec3), spacing: DVec3) -> usize {
    let safe = spacing.abs().max(DVec3::splat(f64::EPSILON));
    let length = ((end - start) / safe).length();
    (length - COUNT_TOLERANCE).ceil().max(0.0) as usize
}

/// Index of the slice nearest to `position`, clamped to `[0, count]`.
/// `None` while there is nothing to slice.
pub fn slice_index_from_position(
    position: DVec3,
    (start, end): (DVec3, DVec3),
    count: usize,
) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let line = end - start;
    let squared = line.length_squared();
    if squared == 0.0 {
        return None;
    }
    let t = ((position - start).dot(line) / squared).clamp(0.0, 1.0);
    Some(((t * count as f64).round() as usize).min(count))
}

pub fn position_from_slice_index(
    index: usize,
    (start, end): (DVec3, DVec3),
    count: usize,
) -> Option<DVec3> {
    if count == 0 {
        return None;
    }
    let t = index.min(count) as f64 / count as f64;
    Some(start + (end - start) * t)
}

/// The slider geometry of one axis for the current cursor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceLine {
    pub start: DVec3,
    pub end: DVec3,
    pub count: usize,
}

impl SliceLine {
    pub fn new(
        cursor: &ResliceCursor,
        axis: Orientation,
        bounds: &Bounds,
        spacing: DVec3,
        center: Option<DVec3>,
    ) -> Option<Self> {
        let (start, end) = reslice_range(cursor, axis, bounds, center)?;
        let count = slice_count((start, end), spacing);
        (count > 0).then_some(Self { start, end, count })
    }

    pub fn index_of(&self, position: DVec3) -> Option<usize> {
        slice_index_from_position(position, (self.start, self.end), self.count)
    }

    pub fn position_of(&self, index: usize) -> Option<DVec3> {
        position_from_slice_index(index, (self.start, self.end), self.count)
    }
}
