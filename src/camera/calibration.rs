//! Intrinsic and extrinsic calibration of the host camera.
//!
//! The intrinsic matrix follows the usual pinhole layout
//!
//! ```text
//! K = | αu  0  u0 |
//!     |  0 αv  v0 |
//!     |  0  0   1 |
//! ```
//!
//! where `αu`/`αv` are the focal length expressed in pixels along each axis and
//! `(u0, v0)` is the center of the scaled render. How millimetres map to pixels
//! depends on which sensor dimension is fixed ([`SensorFit`]).

use nalgebra::{Matrix3, Vector3};

use crate::camera::{CameraError, CameraState, Intrinsics, SensorFit};
use crate::geometry::{self, flatten_row_major};

impl Intrinsics {
    /// Returns the 3x3 intrinsic matrix. Skew is always zero.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Row-major K as written to `scene_camera.json`.
    ///
    /// Entries are rounded to single precision, the precision existing
    /// datasets were produced with.
    pub fn cam_k(&self) -> [f64; 9] {
        flatten_row_major(&self.k_matrix()).map(|v| v as f32 as f64)
    }
}

/// Computes the pixel intrinsics of the camera for the current render settings.
///
/// # Arguments
///
/// * `camera` - Camera snapshot. Its parameters are assumed valid (see
///   [`CameraState::validate_params`]).
///
/// # Examples
///
/// ```rust
/// use nalgebra::Matrix4;
/// use scene_annotator::camera::{
///     intrinsics, CameraIntrinsicsRaw, CameraState, RenderTarget, SensorFit,
/// };
///
/// let camera = CameraState::new(
///     CameraIntrinsicsRaw {
///         focal_length: 50.0,
///         sensor_width: 36.0,
///         sensor_height: 20.25,
///         sensor_fit: SensorFit::Horizontal,
///         pixel_aspect_x: 1.0,
///         pixel_aspect_y: 1.0,
///     },
///     RenderTarget { resolution_x: 1280, resolution_y: 720, resolution_percentage: 100 },
///     Matrix4::identity(),
/// )
/// .unwrap();
///
/// let k = intrinsics(&camera);
/// assert_eq!(k.cx, 640.0);
/// assert_eq!(k.cy, 360.0);
/// ```
pub fn intrinsics(camera: &CameraState) -> Intrinsics {
    let width = camera.render.width();
    let height = camera.render.height();

    let raw = &camera.intrinsics;
    let pixel_aspect_ratio = raw.pixel_aspect_ratio();

    let (s_u, s_v) = match raw.sensor_fit {
        // Sensor height is fixed; the effective width follows the pixel aspect.
        SensorFit::Vertical => (
            width / raw.sensor_width / pixel_aspect_ratio,
            height / raw.sensor_height,
        ),
        // Sensor width is fixed; the effective height follows the pixel aspect.
        SensorFit::Horizontal | SensorFit::Auto => (
            width / raw.sensor_width,
            height * pixel_aspect_ratio / raw.sensor_height,
        ),
    };

    Intrinsics {
        fx: raw.focal_length * s_u,
        fy: raw.focal_length * s_v,
        cx: width / 2.0,
        cy: height / 2.0,
    }
}

/// World-to-camera rigid transform split into rotation and translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrinsics {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Extrinsics {
    pub fn cam_r_w2c(&self) -> [f64; 9] {
        flatten_row_major(&self.rotation)
    }

    pub fn cam_t_w2c(&self) -> [f64; 3] {
        self.translation.into()
    }
}

/// Inverts the camera's world transform.
///
/// # Errors
///
/// * [`CameraError::SingularTransform`] if the camera transform has no inverse.
pub fn extrinsics(camera: &CameraState) -> Result<Extrinsics, CameraError> {
    let world_to_camera = geometry::invert_transform(&camera.camera_to_world)?;
    Ok(Extrinsics {
        rotation: geometry::rotation_block(&world_to_camera),
        translation: geometry::translation_column(&world_to_camera),
    })
}
