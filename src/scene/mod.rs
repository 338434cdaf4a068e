//! Read-only access to the host scene.
//!
//! The annotators never reach into the host application directly. They ask a
//! [`SceneProvider`] for the handful of values they need, which keeps every
//! computation a pure function of an explicit snapshot. [`SceneSnapshot`] is
//! the in-memory provider, typically exported by the host once per frame as
//! JSON.

use log::info;
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::camera::{CameraIntrinsicsRaw, CameraState, RenderTarget};
use crate::geometry::{self, ViewFrame};

#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    #[error("Object '{0}' does not exist in the scene")]
    UnknownObject(String),
    #[error("Invalid scene snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("Failed to parse JSON: {0}")]
    JsonError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for SceneError {
    fn from(err: std::io::Error) -> Self {
        SceneError::IOError(err.to_string())
    }
}

impl From<serde_json::Error> for SceneError {
    fn from(err: serde_json::Error) -> Self {
        SceneError::JsonError(err.to_string())
    }
}

/// Queries the annotators issue against the host scene.
pub trait SceneProvider {
    /// Vertex positions of the object's evaluated mesh, in object-local space.
    fn mesh_vertices_local(&self, object_name: &str) -> Result<Vec<Vector3<f64>>, SceneError>;

    fn object_to_world(&self, object_name: &str) -> Result<Matrix4<f64>, SceneError>;

    fn camera_to_world(&self) -> Matrix4<f64>;

    /// Image-plane corners of the active camera, in camera space.
    fn camera_view_frame(&self) -> ViewFrame;

    fn camera_intrinsics_raw(&self) -> CameraIntrinsicsRaw;

    fn render_target(&self) -> RenderTarget;

    /// Gathers the camera queries into one snapshot.
    fn camera_state(&self) -> CameraState {
        CameraState {
            intrinsics: self.camera_intrinsics_raw(),
            render: self.render_target(),
            camera_to_world: self.camera_to_world(),
        }
    }
}

/// A mesh object: local vertices and its placement in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub vertices: Vec<[f64; 3]>,
    #[serde(with = "geometry::matrix_rows")]
    pub object_to_world: Matrix4<f64>,
}

impl SceneObject {
    pub fn new(name: &str, vertices: &[Vector3<f64>], object_to_world: Matrix4<f64>) -> Self {
        SceneObject {
            name: name.to_string(),
            vertices: vertices.iter().map(|v| [v.x, v.y, v.z]).collect(),
            object_to_world,
        }
    }
}

/// State of the scene at one frame.
///
/// Objects keep the order they were added in; the view frame is derived from
/// the camera settings unless one was captured from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub camera: CameraState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_frame: Option<[[f64; 3]; 4]>,
    pub objects: Vec<SceneObject>,
}

impl SceneSnapshot {
    pub fn new(camera: CameraState) -> Self {
        SceneSnapshot {
            camera,
            view_frame: None,
            objects: Vec::new(),
        }
    }

    pub fn with_object(mut self, object: SceneObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn object(&self, object_name: &str) -> Result<&SceneObject, SceneError> {
        self.objects
            .iter()
            .find(|o| o.name == object_name)
            .ok_or_else(|| SceneError::UnknownObject(object_name.to_string()))
    }

    pub fn object_mut(&mut self, object_name: &str) -> Result<&mut SceneObject, SceneError> {
        self.objects
            .iter_mut()
            .find(|o| o.name == object_name)
            .ok_or_else(|| SceneError::UnknownObject(object_name.to_string()))
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects.iter().map(|o| o.name.clone()).collect()
    }

    /// Loads a snapshot exported by the host.
    ///
    /// # Errors
    ///
    /// * [`SceneError::IOError`] / [`SceneError::JsonError`] for unreadable input.
    /// * [`SceneError::InvalidSnapshot`] if the camera parameters are invalid or
    ///   two objects share a name.
    pub fn load_from_json(path: &str) -> Result<Self, SceneError> {
        let contents = fs::read_to_string(path)?;
        let snapshot: SceneSnapshot = serde_json::from_str(&contents)?;
        snapshot.validate()?;
        info!(
            "Loaded scene snapshot from {} with {} objects",
            path,
            snapshot.objects.len()
        );
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        self.camera
            .validate_params()
            .map_err(|e| SceneError::InvalidSnapshot(e.to_string()))?;
        for (i, object) in self.objects.iter().enumerate() {
            if self.objects[..i].iter().any(|o| o.name == object.name) {
                return Err(SceneError::InvalidSnapshot(format!(
                    "duplicate object name '{}'",
                    object.name
                )));
            }
        }
        Ok(())
    }
}

impl SceneProvider for SceneSnapshot {
    fn mesh_vertices_local(&self, object_name: &str) -> Result<Vec<Vector3<f64>>, SceneError> {
        Ok(self
            .object(object_name)?
            .vertices
            .iter()
            .map(|v| Vector3::from(*v))
            .collect())
    }

    fn object_to_world(&self, object_name: &str) -> Result<Matrix4<f64>, SceneError> {
        Ok(self.object(object_name)?.object_to_world)
    }

    fn camera_to_world(&self) -> Matrix4<f64> {
        self.camera.camera_to_world
    }

    fn camera_view_frame(&self) -> ViewFrame {
        match &self.view_frame {
            Some(corners) => ViewFrame::new(corners.map(Vector3::from)),
            None => self.camera.view_frame(),
        }
    }

    fn camera_intrinsics_raw(&self) -> CameraIntrinsicsRaw {
        self.camera.intrinsics
    }

    fn render_target(&self) -> RenderTarget {
        self.camera.render
    }
}

/// The eight corners of an axis-aligned box centered on the origin.
pub fn box_vertices(half_x: f64, half_y: f64, half_z: f64) -> Vec<Vector3<f64>> {
    let mut vertices = Vec::with_capacity(8);
    for &x in &[-half_x, half_x] {
        for &y in &[-half_y, half_y] {
            for &z in &[-half_z, half_z] {
                vertices.push(Vector3::new(x, y, z));
            }
        }
    }
    vertices
}
