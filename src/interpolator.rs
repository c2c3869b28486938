use glam::DVec3;
use ndarray::Array3;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Dimensions (depth, height, width) the volume would have if resampled
    /// to its smallest spacing in every direction.
    pub(crate) fn get_isotropic_dimensions(
        spacing: DVec3,
        original_dim: (usize, usize, usize),
    ) -> (u32, u32, u32) {
        let min_spacing = spacing.min_element();
        let inv_min_spacing = 1.0 / min_spacing; // Multiply instead of divide

        // original_dim is (depth, height, width) corresponding to (z, y, x)
        let new_x = (original_dim.2 as f64 * spacing.x * inv_min_spacing) as u32;
        let new_y = (original_dim.1 as f64 * spacing.y * inv_min_spacing) as u32;
        let new_z = (original_dim.0 as f64 * spacing.z * inv_min_spacing) as u32;

        (new_z, new_y, new_x)
    }

    /// Samples `data` at continuous voxel coordinates `(x, y, z)`.
    /// Returns `None` outside the voxel grid.
    #[inline]
    pub(crate) fn trilinear_interpolate(data: &Array3<f32>, voxel: DVec3) -> Option<f32> {
        let (depth, height, width) = data.dim();
        let (x, y, z) = (voxel.x as f32, voxel.y as f32, voxel.z as f32);
        if !Self::in_grid(x, width) || !Self::in_grid(y, height) || !Self::in_grid(z, depth) {
            return None;
        }
        let x = x.clamp(0.0, (width - 1) as f32);
        let y = y.clamp(0.0, (height - 1) as f32);
        let z = z.clamp(0.0, (depth - 1) as f32);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let z1 = (z0 + 1).min(depth - 1);

        let dx = x - x0 as f32;
        let dy = y - y0 as f32;
        let dz = z - z0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;
        let one_minus_dz = 1.0 - dz;

        let plane = |zi: usize| {
            let v00 = data[[zi, y0, x0]];
            let v01 = data[[zi, y0, x1]];
            let v10 = data[[zi, y1, x0]];
            let v11 = data[[zi, y1, x1]];
            let v0 = v00.mul_add(one_minus_dx, v01 * dx);
            let v1 = v10.mul_add(one_minus_dx, v11 * dx);
            v0.mul_add(one_minus_dy, v1 * dy)
        };

        Some(plane(z0).mul_add(one_minus_dz, plane(z1) * dz))
    }

    #[inline]
    pub(crate) fn nearest(data: &Array3<f32>, voxel: DVec3) -> Option<f32> {
        let (depth, height, width) = data.dim();
        let (x, y, z) = (voxel.x as f32, voxel.y as f32, voxel.z as f32);
        if !Self::in_grid(x, width) || !Self::in_grid(y, height) || !Self::in_grid(z, depth) {
            return None;
        }
        let index = |v: f32, len: usize| (v.round().max(0.0) as usize).min(len - 1);
        Some(data[[index(z, depth), index(y, height), index(x, width)]])
    }

    // Half a voxel of slack so samples on the boundary are still accepted
    #[inline]
    fn in_grid(v: f32, len: usize) -> bool {
        len > 0 && v >= -0.5 && v <= len as f32 - 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isotropic_dimensions() {
        let dims = Interpolator::get_isotropic_dimensions(DVec3::new(0.5, 0.5, 2.0), (10, 64, 64));
        assert_eq!(dims, (40, 64, 64));
    }

    #[test]
    fn test_trilinear_midpoint() {
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[[1, 1, 1]] = 8.0;
        let value = Interpolator::trilinear_interpolate(&data, DVec3::splat(0.5))
            .expect("inside the grid");
        assert!((value - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_outside_grid_is_none() {
        let data = Array3::<f32>::zeros((2, 2, 2));
        assert!(Interpolator::trilinear_interpolate(&data, DVec3::new(3.0, 0.0, 0.0)).is_none());
        assert!(Interpolator::nearest(&data, DVec3::new(0.0, -1.0, 0.0)).is_none());
    }
}
