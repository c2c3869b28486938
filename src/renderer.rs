//! The renderer/camera pair each viewport owns.
//!
//! Rasterization is delegated to the presentation layer; this keeps the
//! state that layer needs: camera, frame counter and render quality.

use crate::geometry::Bounds;

use glam::DVec3;
use std::time::Duration;
use web_time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderQuality {
    Full,
    /// Reduced quality, in percent, while a gesture is in flight
    Interactive(u8),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    pub focal_point: DVec3,
    pub view_up: DVec3,
    pub parallel_projection: bool,
    /// Half the height of the viewport in world units (parallel projection)
    pub parallel_scale: f64,
    /// Vertical view angle in degrees (perspective projection)
    pub view_angle: f64,
}

impl Camera {
    pub fn perspective() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 1.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            parallel_projection: false,
            parallel_scale: 1.0,
            view_angle: 30.0,
        }
    }

    pub fn parallel() -> Self {
        Self {
            parallel_projection: true,
            ..Self::perspective()
        }
    }

    pub fn direction(&self) -> DVec3 {
        (self.focal_point - self.position).normalize_or_zero()
    }

    /// Keeps the viewing direction and fits the bounding sphere of `bounds`
    /// into `zoom` of the viewport.
    pub fn reset_to_bounds(&mut self, bounds: &Bounds, zoom: f64) {
        let zoom = if zoom > 0.0 { zoom } else { 1.0 };
        let radius = (bounds.diagonal() * 0.5).max(f64::EPSILON);
        let mut direction = self.direction();
        if direction == DVec3::ZERO {
            direction = -DVec3::Z;
        }
        let half_angle = (self.view_angle.to_radians() * 0.5).max(f64::EPSILON);
        let distance = radius / half_angle.sin() / zoom;

        self.focal_point = bounds.center();
        self.position = self.focal_point - direction * distance;
        self.parallel_scale = radius / zoom;
    }

    /// Looks along `direction` at the center of `bounds`.
    pub fn look_along(&mut self, direction: DVec3, view_up: DVec3, bounds: &Bounds, zoom: f64) {
        self.focal_point = bounds.center();
        self.position = self.focal_point - direction.normalize_or_zero();
        self.view_up = view_up;
        self.reset_to_bounds(bounds, zoom);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub interactive_quality: u8,
    pub frame_interval: Duration,
    pub reset_zoom: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            interactive_quality: 80,
            frame_interval: Duration::from_millis(50),
            reset_zoom: 0.8,
        }
    }
}

#[derive(Debug)]
pub struct Renderer {
    pub camera: Camera,
    settings: RenderSettings,
    frames: u64,
    animating: bool,
    last_quality: Option<RenderQuality>,
    last_frame: Option<Instant>,
    pending: bool,
}

impl Renderer {
    pub fn new(camera: Camera, settings: RenderSettings) -> Self {
        Self {
            camera,
            settings,
            frames: 0,
            animating: false,
            last_quality: None,
            last_frame: None,
            pending: false,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Number of frames produced so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    pub fn last_quality(&self) -> Option<RenderQuality> {
        self.last_quality
    }

    /// Whether a throttled frame is still owed
    pub fn has_pending_frame(&self) -> bool {
        self.pending
    }

    /// Produces a frame. While animating, frames closer together than the
    /// configured interval are skipped and remembered as pending.
    pub fn render(&mut self) -> bool {
        let now = Instant::now();
        if self.animating {
            if let Some(last) = self.last_frame {
                if now.duration_since(last) < self.settings.frame_interval {
                    self.pending = true;
                    return false;
                }
            }
        }
        self.frames += 1;
        self.last_frame = Some(now);
        self.pending = false;
        self.last_quality = Some(if self.animating {
            RenderQuality::Interactive(self.settings.interactive_quality)
        } else {
            RenderQuality::Full
        });
        true
    }

    pub fn start_animation(&mut self) {
        self.animating = true;
    }

    /// Leaves animation and produces one full quality frame.
    pub fn stop_animation(&mut self) {
        if !self.animating {
            return;
        }
        self.animating = false;
        self.render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_to_bounds_centers_focal_point() {
        let mut camera = Camera::perspective();
        let bounds = Bounds::new(DVec3::ZERO, DVec3::new(10.0, 10.0, 10.0));
        camera.reset_to_bounds(&bounds, 0.8);
        assert_eq!(camera.focal_point, DVec3::splat(5.0));
        let distance = (camera.position - camera.focal_point).length();
        let radius = bounds.diagonal() * 0.5;
        assert!(distance > radius);
    }

    #[test]
    fn test_animation_lowers_quality_until_stopped() {
        let settings = RenderSettings {
            frame_interval: Duration::from_secs(3600),
            ..RenderSettings::default()
        };
        let mut renderer = Renderer::new(Camera::parallel(), settings);
        renderer.start_animation();
        assert!(renderer.render());
        assert_eq!(renderer.last_quality(), Some(RenderQuality::Interactive(80)));
        assert!(!renderer.render());
        assert!(renderer.has_pending_frame());

        renderer.stop_animation();
        assert_eq!(renderer.last_quality(), Some(RenderQuality::Full));
        assert!(!renderer.has_pending_frame());
        assert_eq!(renderer.frames(), 2);
    }
}
