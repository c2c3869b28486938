use crate::enums::{Interpolation, Orientation};
use crate::geometry::Bounds;
use crate::interpolator::Interpolator;

use glam::DVec3;
use ndarray::Array3;
use rayon::prelude::*;

/// A decoded scalar volume.
///
/// Voxels are stored (depth, height, width) = (z, y, x). World position of
/// voxel `(i, j, k)` is `origin + (i, j, k) * spacing`.
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array3<f32>,
    pub spacing: DVec3,
    pub origin: DVec3,
    scalar_range: (f64, f64),
}

impl Volume {
    pub fn new(data: Array3<f32>, spacing: DVec3, origin: DVec3) -> Self {
        let scalar_range = Self::compute_scalar_range(&data);
        Self {
            data,
            spacing,
            origin,
            scalar_range,
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Minimum and maximum voxel value
    pub fn scalar_range(&self) -> (f64, f64) {
        self.scalar_range
    }

    /// World-space bounds through the centers of the outermost voxels
    pub fn bounds(&self) -> Bounds {
        let (depth, height, width) = self.dim();
        let last = DVec3::new(
            width.saturating_sub(1) as f64,
            height.saturating_sub(1) as f64,
            depth.saturating_sub(1) as f64,
        );
        Bounds::new(self.origin, self.origin + last * self.spacing)
    }

    pub fn center(&self) -> DVec3 {
        self.bounds().center()
    }

    /// Continuous voxel coordinates `(x, y, z)` of a world point
    pub fn world_to_voxel(&self, point: DVec3) -> DVec3 {
        (point - self.origin) / self.spacing
    }

    /// Samples the volume at a world position, `None` outside of it.
    pub fn sample(&self, point: DVec3, interpolation: Interpolation) -> Option<f32> {
        let voxel = self.world_to_voxel(point);
        match interpolation {
            Interpolation::Nearest => Interpolator::nearest(&self.data, voxel),
            Interpolation::Linear => Interpolator::trilinear_interpolate(&self.data, voxel),
        }
    }

    /// (width, height) of a frame showing this volume at isotropic
    /// resolution for an axis-aligned view.
    pub fn native_frame_size(&self, orientation: Orientation) -> (u32, u32) {
        let (z, y, x) = Interpolator::get_isotropic_dimensions(self.spacing, self.dim());
        // Always return (width, height) - standard image convention
        match orientation {
            // Looking down Z-axis: X is width, Y is height
            Orientation::Axial => (x, y),
            // Looking down Y-axis: X is width, Z is height
            Orientation::Coronal => (x, z),
            // Looking down X-axis: Y is width, Z is height
            Orientation::Sagittal => (y, z),
        }
    }

    fn compute_scalar_range(data: &Array3<f32>) -> (f64, f64) {
        if data.is_empty() {
            return (0.0, 0.0);
        }
        let (lo, hi) = data
            .par_iter()
            .filter(|v| v.is_finite())
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &v| (lo.min(v), hi.max(v)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );
        if lo > hi {
            return (0.0, 0.0);
        }
        (lo as f64, hi as f64)
    }
}
