use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

use crate::geometry::{
    self, compose_transform, flatten_row_major, rotation_block, translation_column, GeometryError,
};

/// One entry of `scene_gt.json`: the object's pose relative to the camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseAnnotation {
    #[serde(rename = "cam_R_m2c")]
    pub cam_r_m2c: [f64; 9],
    #[serde(rename = "cam_t_m2c")]
    pub cam_t_m2c: [f64; 3],
    pub obj_id: u32,
    pub obj_name: String,
}

impl PoseAnnotation {
    /// The object-to-camera transform this record was built from.
    pub fn transform(&self) -> Matrix4<f64> {
        compose_transform(&self.cam_r_m2c, &self.cam_t_m2c)
    }
}

/// Computes `T_m2c = T_m2w · T_c2w⁻¹` and splits it into rotation and translation.
///
/// The pose is produced whether or not the object is in view; pair it with the
/// bounding box record to decide whether it is relevant for a frame.
pub fn object_pose(
    object_to_world: &Matrix4<f64>,
    camera_to_world: &Matrix4<f64>,
    object_id: u32,
    object_name: &str,
) -> Result<PoseAnnotation, GeometryError> {
    let model_to_camera = object_to_world * geometry::invert_transform(camera_to_world)?;

    Ok(PoseAnnotation {
        cam_r_m2c: flatten_row_major(&rotation_block(&model_to_camera)),
        cam_t_m2c: translation_column(&model_to_camera).into(),
        obj_id: object_id,
        obj_name: object_name.to_string(),
    })
}
