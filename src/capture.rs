//! Software reslice of a slice viewport's plane into an 8-bit frame.

use crate::enums::Interpolation;
use crate::renderable::WindowLevel;
use crate::volume::Volume;

use glam::DVec3;
use image::{GrayImage, ImageBuffer};
use rayon::prelude::*;

/// An oblique plane, oriented for display
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    /// World point shown in the middle of the frame
    pub center: DVec3,
    pub normal: DVec3,
    pub view_up: DVec3,
}

impl Plane {
    /// In-plane axes of the frame: (right, up)
    pub fn axes(&self) -> (DVec3, DVec3) {
        let normal = self.normal.normalize_or_zero();
        let up = (self.view_up - normal * self.view_up.dot(normal)).normalize_or_zero();
        (up.cross(normal), up)
    }

    /// Projection of `point` onto the plane
    pub fn project(&self, point: DVec3) -> DVec3 {
        let normal = self.normal.normalize_or_zero();
        point - normal * (point - self.center).dot(normal)
    }
}

/// One volume drawn on the plane. The first layer is opaque.
#[derive(Clone, Copy, Debug)]
pub struct Layer<'a> {
    pub volume: &'a Volume,
    pub window_level: WindowLevel,
    pub opacity: f64,
}

/// Samples `layers` on a `width` x `height` grid of `pixel_size` spaced
/// points centered on the plane. `None` without layers or pixels.
pub fn reslice(
    plane: &Plane,
    layers: &[Layer<'_>],
    width: u32,
    height: u32,
    pixel_size: f64,
    interpolation: Interpolation,
) -> Option<GrayImage> {
    if layers.is_empty() || width == 0 || height == 0 || pixel_size <= 0.0 {
        return None;
    }
    let (right, up) = plane.axes();
    if right == DVec3::ZERO {
        return None;
    }

    let half_w = width as f64 / 2.0;
    let half_h = height as f64 / 2.0;
    let pixel_data: Vec<u8> = (0..height)
        .into_par_iter()
        .flat_map(|y| {
            (0..width)
                .map(|x| {
                    let u = (x as f64 + 0.5 - half_w) * pixel_size;
                    let v = (half_h - y as f64 - 0.5) * pixel_size;
                    let point = plane.center + right * u + up * v;
                    to_u8(composite(layers, point, interpolation))
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    ImageBuffer::from_raw(width, height, pixel_data)
}

fn composite(layers: &[Layer<'_>], point: DVec3, interpolation: Interpolation) -> f64 {
    let mut value = 0.0;
    for (i, layer) in layers.iter().enumerate() {
        let Some(sample) = layer.volume.sample(point, interpolation) else {
            continue;
        };
        let mapped = layer.window_level.normalize(sample as f64);
        if i == 0 {
            value = mapped;
        } else {
            let alpha = layer.opacity.clamp(0.0, 1.0);
            value = value * (1.0 - alpha) + mapped * alpha;
        }
    }
    value
}

fn to_u8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp() -> Volume {
        let data = Array3::from_shape_fn((5, 5, 5), |(_, _, x)| x as f32 * 25.0);
        Volume::new(data, DVec3::ONE, DVec3::ZERO)
    }

    fn axial_plane(center: DVec3) -> Plane {
        Plane {
            center,
            normal: DVec3::new(0.0, 0.0, -1.0),
            view_up: DVec3::new(0.0, -1.0, 0.0),
        }
    }

    #[test]
    fn test_axial_frame_runs_left_to_right() {
        let volume = ramp();
        let layer = Layer {
            volume: &volume,
            window_level: WindowLevel::from_min_max(volume.scalar_range()),
            opacity: 1.0,
        };
        let image = reslice(
            &axial_plane(DVec3::new(2.0, 2.0, 2.0)),
            &[layer],
            5,
            5,
            1.0,
            Interpolation::Nearest,
        )
        .unwrap();
        assert_eq!(image.dimensions(), (5, 5));
        assert_eq!(image.get_pixel(0, 2)[0], 0);
        assert_eq!(image.get_pixel(4, 2)[0], 255);
    }

    #[test]
    fn test_overlay_is_blended() {
        let volume = ramp();
        let flat = Volume::new(Array3::from_elem((5, 5, 5), 100.0), DVec3::ONE, DVec3::ZERO);
        let layers = [
            Layer {
                volume: &volume,
                window_level: WindowLevel::from_min_max((0.0, 100.0)),
                opacity: 1.0,
            },
            Layer {
                volume: &flat,
                window_level: WindowLevel::from_min_max((0.0, 100.0)),
                opacity: 0.5,
            },
        ];
        let image = reslice(
            &axial_plane(DVec3::new(2.0, 2.0, 2.0)),
            &layers,
            5,
            5,
            1.0,
            Interpolation::Nearest,
        )
        .unwrap();
        // column 0 is 0.0 in the primary, 1.0 in the overlay
        assert_eq!(image.get_pixel(0, 2)[0], 128);
    }

    #[test]
    fn test_empty_frame() {
        assert!(reslice(&axial_plane(DVec3::ZERO), &[], 4, 4, 1.0, Interpolation::Linear).is_none());
    }
}
