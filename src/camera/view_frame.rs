//! Image-plane corners of a perspective camera.
//!
//! Reproduces the host's `view_frame` query for a camera with unit draw size,
//! unit object scale and no lens shift, so snapshots that only carry lens and
//! render settings can still be projected.

use nalgebra::Vector3;

use crate::camera::{CameraState, SensorFit};
use crate::geometry::ViewFrame;

impl CameraState {
    /// Sensor fit after resolving `AUTO` against the render aspect.
    pub fn effective_sensor_fit(&self) -> SensorFit {
        match self.intrinsics.sensor_fit {
            SensorFit::Auto => {
                let (aspect_x, aspect_y) = self.render_aspect();
                if aspect_x >= aspect_y {
                    SensorFit::Horizontal
                } else {
                    SensorFit::Vertical
                }
            }
            fit => fit,
        }
    }

    fn render_aspect(&self) -> (f64, f64) {
        (
            self.render.resolution_x as f64 * self.intrinsics.pixel_aspect_x,
            self.render.resolution_y as f64 * self.intrinsics.pixel_aspect_y,
        )
    }

    /// Corners of the image plane in camera space.
    ///
    /// The plane sits at `z = -0.5 * focal / half_sensor`, where the sensor
    /// dimension is the height for vertical fit and the width otherwise. The
    /// fitted axis spans `[-0.5, 0.5]`; the other one is scaled by the render
    /// aspect.
    pub fn view_frame(&self) -> ViewFrame {
        let (aspect_x, aspect_y) = self.render_aspect();
        let (asp_x, asp_y) = match self.effective_sensor_fit() {
            SensorFit::Vertical => (aspect_x / aspect_y, 1.0),
            _ => (1.0, aspect_y / aspect_x),
        };

        // Only an explicit VERTICAL fit measures along the sensor height.
        let half_sensor = 0.5
            * match self.intrinsics.sensor_fit {
                SensorFit::Vertical => self.intrinsics.sensor_height,
                _ => self.intrinsics.sensor_width,
            };

        let draw_size = 0.5;
        let depth = draw_size * self.intrinsics.focal_length / -half_sensor;
        let fac_x = draw_size * asp_x;
        let fac_y = draw_size * asp_y;

        ViewFrame::new([
            Vector3::new(fac_x, fac_y, depth),
            Vector3::new(fac_x, -fac_y, depth),
            Vector3::new(-fac_x, -fac_y, depth),
            Vector3::new(-fac_x, fac_y, depth),
        ])
    }
}
