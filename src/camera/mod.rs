//! Camera state as reported by the host application.
//!
//! A [`CameraState`] is a per-frame snapshot: lens and sensor parameters
//! ([`CameraIntrinsicsRaw`]), the render target ([`RenderTarget`]) and the
//! camera's world transform. The [`calibration`] submodule derives the K
//! matrix and extrinsics from it, and [`view_frame`] computes the image-plane
//! corners used by the bounding box projection.

use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use yaml_rust::{Yaml, YamlLoader};

use crate::geometry::{self, GeometryError};

pub mod calibration;
pub mod view_frame;

pub use calibration::{extrinsics, intrinsics, Extrinsics};

/// Pinhole intrinsics in pixels: focal lengths and principal point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Effective render size in pixels, after the resolution percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Camera transform is singular")]
    SingularTransform,
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraError::YamlError(err.to_string())
    }
}

impl From<GeometryError> for CameraError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::SingularTransform => CameraError::SingularTransform,
        }
    }
}

/// Which sensor dimension is held fixed when the render aspect changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensorFit {
    #[default]
    Auto,
    Horizontal,
    Vertical,
}

impl SensorFit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorFit::Auto => "AUTO",
            SensorFit::Horizontal => "HORIZONTAL",
            SensorFit::Vertical => "VERTICAL",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CameraError> {
        match value.to_uppercase().as_str() {
            "AUTO" => Ok(SensorFit::Auto),
            "HORIZONTAL" => Ok(SensorFit::Horizontal),
            "VERTICAL" => Ok(SensorFit::Vertical),
            other => Err(CameraError::InvalidParams(format!(
                "Unknown sensor fit '{other}', expected AUTO, HORIZONTAL or VERTICAL"
            ))),
        }
    }
}

/// Lens and sensor settings, in millimetres, plus the render pixel aspect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsicsRaw {
    pub focal_length: f64,
    pub sensor_width: f64,
    pub sensor_height: f64,
    pub sensor_fit: SensorFit,
    pub pixel_aspect_x: f64,
    pub pixel_aspect_y: f64,
}

impl CameraIntrinsicsRaw {
    pub fn pixel_aspect_ratio(&self) -> f64 {
        self.pixel_aspect_x / self.pixel_aspect_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub resolution_percentage: u32,
}

impl RenderTarget {
    pub fn scale(&self) -> f64 {
        self.resolution_percentage as f64 / 100.0
    }

    /// Scaled render width in pixels, not rounded.
    pub fn width(&self) -> f64 {
        self.resolution_x as f64 * self.scale()
    }

    /// Scaled render height in pixels, not rounded.
    pub fn height(&self) -> f64 {
        self.resolution_y as f64 * self.scale()
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width() as u32,
            height: self.height() as u32,
        }
    }
}

/// Everything the annotators need to know about the camera for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    pub intrinsics: CameraIntrinsicsRaw,
    pub render: RenderTarget,
    #[serde(with = "geometry::matrix_rows")]
    pub camera_to_world: Matrix4<f64>,
}

impl CameraState {
    pub fn new(
        intrinsics: CameraIntrinsicsRaw,
        render: RenderTarget,
        camera_to_world: Matrix4<f64>,
    ) -> Result<Self, CameraError> {
        let state = CameraState {
            intrinsics,
            render,
            camera_to_world,
        };
        state.validate_params()?;
        Ok(state)
    }

    /// Checks that every parameter used as a divisor is positive and finite.
    pub fn validate_params(&self) -> Result<(), CameraError> {
        validation::validate_positive("focal_length", self.intrinsics.focal_length)?;
        validation::validate_positive("sensor_width", self.intrinsics.sensor_width)?;
        validation::validate_positive("sensor_height", self.intrinsics.sensor_height)?;
        validation::validate_positive("pixel_aspect_x", self.intrinsics.pixel_aspect_x)?;
        validation::validate_positive("pixel_aspect_y", self.intrinsics.pixel_aspect_y)?;
        if self.render.resolution_x == 0 || self.render.resolution_y == 0 {
            return Err(CameraError::InvalidParams(
                "Render resolution must be non-zero".to_string(),
            ));
        }
        if self.render.resolution_percentage == 0 {
            return Err(CameraError::InvalidParams(
                "Resolution percentage must be non-zero".to_string(),
            ));
        }
        if !self.camera_to_world.iter().all(|v| v.is_finite()) {
            return Err(CameraError::InvalidParams(
                "Camera transform contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// Loads a camera snapshot from a YAML file.
    ///
    /// Expected layout:
    ///
    /// ```yaml
    /// camera:
    ///   focal_length: 50.0
    ///   sensor_width: 36.0
    ///   sensor_height: 24.0
    ///   sensor_fit: AUTO
    ///   pixel_aspect: [1.0, 1.0]
    ///   resolution: [1280, 720]
    ///   resolution_percentage: 100
    ///   camera_to_world:
    ///     - [1.0, 0.0, 0.0, 0.0]
    ///     - [0.0, 1.0, 0.0, 0.0]
    ///     - [0.0, 0.0, 1.0, 10.0]
    ///     - [0.0, 0.0, 0.0, 1.0]
    /// ```
    ///
    /// # Errors
    ///
    /// * [`CameraError::IOError`] if the file cannot be read.
    /// * [`CameraError::YamlError`] if the content is not valid YAML.
    /// * [`CameraError::InvalidParams`] for missing or mistyped fields, and for
    ///   values rejected by [`CameraState::validate_params`].
    pub fn load_from_yaml(path: &str) -> Result<Self, CameraError> {
        let contents = fs::read_to_string(path)?;
        let docs = YamlLoader::load_from_str(&contents)?;
        let doc = docs.first().ok_or_else(|| {
            CameraError::YamlError(format!("'{path}' does not contain a YAML document"))
        })?;
        let cam = &doc["camera"];
        if cam.is_badvalue() {
            return Err(CameraError::InvalidParams(
                "YAML missing 'camera' section".to_string(),
            ));
        }

        let pixel_aspect = yaml_f64_array::<2>(&cam["pixel_aspect"], "pixel_aspect")?;
        let resolution = yaml_f64_array::<2>(&cam["resolution"], "resolution")?;
        let sensor_fit = cam["sensor_fit"].as_str().ok_or_else(|| {
            CameraError::InvalidParams("YAML missing 'sensor_fit' or not a string".to_string())
        })?;

        let intrinsics = CameraIntrinsicsRaw {
            focal_length: yaml_f64(&cam["focal_length"], "focal_length")?,
            sensor_width: yaml_f64(&cam["sensor_width"], "sensor_width")?,
            sensor_height: yaml_f64(&cam["sensor_height"], "sensor_height")?,
            sensor_fit: SensorFit::parse(sensor_fit)?,
            pixel_aspect_x: pixel_aspect[0],
            pixel_aspect_y: pixel_aspect[1],
        };

        let render = RenderTarget {
            resolution_x: resolution[0] as u32,
            resolution_y: resolution[1] as u32,
            resolution_percentage: cam["resolution_percentage"].as_i64().ok_or_else(|| {
                CameraError::InvalidParams(
                    "Invalid resolution_percentage: not an integer".to_string(),
                )
            })? as u32,
        };

        let rows = cam["camera_to_world"].as_vec().ok_or_else(|| {
            CameraError::InvalidParams("YAML missing 'camera_to_world' or not an array".to_string())
        })?;
        if rows.len() != 4 {
            return Err(CameraError::InvalidParams(format!(
                "camera_to_world must have 4 rows, found {}",
                rows.len()
            )));
        }
        let mut camera_to_world = Matrix4::identity();
        for (r, row) in rows.iter().enumerate() {
            let values = yaml_f64_array::<4>(row, "camera_to_world row")?;
            for (c, value) in values.iter().enumerate() {
                camera_to_world[(r, c)] = *value;
            }
        }

        CameraState::new(intrinsics, render, camera_to_world)
    }

    /// Saves the camera snapshot in the layout read by [`CameraState::load_from_yaml`].
    pub fn save_to_yaml(&self, path: &str) -> Result<(), CameraError> {
        let yaml_err = |e: serde_yaml::Error| CameraError::YamlError(e.to_string());
        let key = |k: &str| serde_yaml::Value::String(k.to_string());

        let rows: Vec<Vec<f64>> = (0..4)
            .map(|r| (0..4).map(|c| self.camera_to_world[(r, c)]).collect())
            .collect();

        let camera = serde_yaml::Mapping::from_iter([
            (
                key("focal_length"),
                serde_yaml::to_value(self.intrinsics.focal_length).map_err(yaml_err)?,
            ),
            (
                key("sensor_width"),
                serde_yaml::to_value(self.intrinsics.sensor_width).map_err(yaml_err)?,
            ),
            (
                key("sensor_height"),
                serde_yaml::to_value(self.intrinsics.sensor_height).map_err(yaml_err)?,
            ),
            (
                key("sensor_fit"),
                serde_yaml::Value::String(self.intrinsics.sensor_fit.as_str().to_string()),
            ),
            (
                key("pixel_aspect"),
                serde_yaml::to_value(vec![
                    self.intrinsics.pixel_aspect_x,
                    self.intrinsics.pixel_aspect_y,
                ])
                .map_err(yaml_err)?,
            ),
            (
                key("resolution"),
                serde_yaml::to_value(vec![self.render.resolution_x, self.render.resolution_y])
                    .map_err(yaml_err)?,
            ),
            (
                key("resolution_percentage"),
                serde_yaml::to_value(self.render.resolution_percentage).map_err(yaml_err)?,
            ),
            (
                key("camera_to_world"),
                serde_yaml::to_value(rows).map_err(yaml_err)?,
            ),
        ]);
        let yaml = serde_yaml::Mapping::from_iter([(
            key("camera"),
            serde_yaml::Value::Mapping(camera),
        )]);

        let yaml_string = serde_yaml::to_string(&yaml).map_err(yaml_err)?;
        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;
        Ok(())
    }
}

fn yaml_f64(node: &Yaml, field: &str) -> Result<f64, CameraError> {
    match node {
        Yaml::Real(_) => node.as_f64(),
        Yaml::Integer(v) => Some(*v as f64),
        _ => None,
    }
    .ok_or_else(|| CameraError::InvalidParams(format!("Invalid {field}: not a number")))
}

fn yaml_f64_array<const N: usize>(node: &Yaml, field: &str) -> Result<[f64; N], CameraError> {
    let values = node.as_vec().ok_or_else(|| {
        CameraError::InvalidParams(format!("YAML missing '{field}' or not an array"))
    })?;
    if values.len() != N {
        return Err(CameraError::InvalidParams(format!(
            "'{field}' must have {N} entries, found {}",
            values.len()
        )));
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = yaml_f64(value, field)?;
    }
    Ok(out)
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    pub fn validate_positive(name: &str, value: f64) -> Result<(), CameraError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(CameraError::InvalidParams(format!(
                "{name} must be positive and finite, got {value}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn hd_camera(camera_to_world: Matrix4<f64>) -> CameraState {
        CameraState::new(
            CameraIntrinsicsRaw {
                focal_length: 50.0,
                sensor_width: 36.0,
                sensor_height: 20.25,
                sensor_fit: SensorFit::Horizontal,
                pixel_aspect_x: 1.0,
                pixel_aspect_y: 1.0,
            },
            RenderTarget {
                resolution_x: 1280,
                resolution_y: 720,
                resolution_percentage: 100,
            },
            camera_to_world,
        )
        .unwrap()
    }

    #[test]
    fn test_camera_load_from_yaml() {
        let camera = CameraState::load_from_yaml("samples/camera.yaml").unwrap();

        assert_eq!(camera.intrinsics.focal_length, 50.0);
        assert_eq!(camera.intrinsics.sensor_width, 36.0);
        assert_eq!(camera.intrinsics.sensor_fit, SensorFit::Auto);
        assert_eq!(camera.render.resolution_x, 1280);
        assert_eq!(camera.render.resolution_y, 720);
        assert_eq!(camera.render.resolution_percentage, 100);
        assert_eq!(camera.camera_to_world[(2, 3)], 10.0);
    }

    #[test]
    fn test_camera_save_to_yaml() {
        fs::create_dir_all("output").unwrap_or_else(|_| {
            println!("Output directory already exists or couldn't be created");
        });

        let mut transform = Matrix4::identity();
        transform[(0, 3)] = 1.5;
        transform[(2, 3)] = -4.0;
        let camera = hd_camera(transform);

        let output_path = "output/camera_saved.yaml";
        camera.save_to_yaml(output_path).unwrap();
        let saved = CameraState::load_from_yaml(output_path).unwrap();

        assert_eq!(camera, saved);
    }

    #[test]
    fn test_validate_rejects_zero_sensor() {
        let mut camera = hd_camera(Matrix4::identity());
        camera.intrinsics.sensor_height = 0.0;
        assert!(matches!(
            camera.validate_params(),
            Err(CameraError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_sensor_fit_parse() {
        assert_eq!(SensorFit::parse("vertical").unwrap(), SensorFit::Vertical);
        assert!(SensorFit::parse("DIAGONAL").is_err());
    }

    #[test]
    fn test_render_target_scale() {
        let render = RenderTarget {
            resolution_x: 1920,
            resolution_y: 1080,
            resolution_percentage: 50,
        };
        assert_eq!(
            render.resolution(),
            Resolution {
                width: 960,
                height: 540
            }
        );
    }
}
