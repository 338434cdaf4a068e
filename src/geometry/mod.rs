//! Projection math shared by the annotators.
//!
//! This module holds the rigid-transform helpers (axis normalization,
//! inversion, block extraction) and [`project_and_clip`], which turns a mesh
//! into a normalized 2D bounding box by projecting it through the camera's
//! view frame.
//!
//! Camera space follows the host convention: the camera looks down its local
//! `-Z` axis with `+Y` up. Normalized image coordinates are y-down.

use log::debug;
use nalgebra::{Matrix3, Matrix4, Vector3};
use serde::{Deserialize, Serialize};

/// Offset applied to an exact-zero bounding box coordinate.
pub const ZERO_COORDINATE_NUDGE: f64 = 0.0000001;

#[derive(thiserror::Error, Debug)]
pub enum GeometryError {
    #[error("Transform is singular and cannot be inverted")]
    SingularTransform,
}

/// The four corners of the camera's image plane in camera space.
///
/// Corner order is top-right, bottom-right, bottom-left, top-left. All corners
/// share the same (negative) `z`, the plane distance in front of the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewFrame {
    pub corners: [Vector3<f64>; 4],
}

impl ViewFrame {
    pub fn new(corners: [Vector3<f64>; 4]) -> Self {
        Self { corners }
    }
}

/// Axis-aligned bounding box in normalized image coordinates.
///
/// Both axes are in `[0, 1]`, `x` to the right and `y` down. The box always has
/// a strictly positive area; degenerate boxes are never constructed by
/// [`project_and_clip`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl NormalizedBBox {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.min_x + self.width() / 2.0,
            self.min_y + self.height() / 2.0,
        )
    }

    /// Box in the layout stored in `scene_gt_info.json`: `[x1, x2, width, height]`.
    ///
    /// The second entry is the right edge, not the top edge. Downstream readers
    /// of existing datasets depend on this layout.
    pub fn to_bop(&self) -> [f64; 4] {
        [self.min_x, self.max_x, self.width(), self.height()]
    }
}

/// Scales each basis column of the 3x3 block to unit length.
///
/// Translation is left untouched, so the result keeps position and
/// orientation but drops any scale baked into the transform.
pub fn normalize_axes(transform: &Matrix4<f64>) -> Matrix4<f64> {
    let mut normalized = *transform;
    for col in 0..3 {
        let axis = transform.fixed_view::<3, 1>(0, col).into_owned();
        let norm = axis.norm();
        if norm > f64::EPSILON {
            normalized
                .fixed_view_mut::<3, 1>(0, col)
                .copy_from(&(axis / norm));
        }
    }
    normalized
}

pub fn invert_transform(transform: &Matrix4<f64>) -> Result<Matrix4<f64>, GeometryError> {
    transform
        .try_inverse()
        .ok_or(GeometryError::SingularTransform)
}

/// Applies an affine transform to a point (implicit `w = 1`).
pub fn transform_point(transform: &Matrix4<f64>, point: &Vector3<f64>) -> Vector3<f64> {
    (transform * point.push(1.0)).xyz()
}

pub fn rotation_block(transform: &Matrix4<f64>) -> Matrix3<f64> {
    transform.fixed_view::<3, 3>(0, 0).into_owned()
}

pub fn translation_column(transform: &Matrix4<f64>) -> Vector3<f64> {
    transform.fixed_view::<3, 1>(0, 3).into_owned()
}

/// Flattens a 3x3 matrix in row-major order.
pub fn flatten_row_major(matrix: &Matrix3<f64>) -> [f64; 9] {
    std::array::from_fn(|i| matrix[(i / 3, i % 3)])
}

/// Rebuilds a rigid transform from a row-major rotation and a translation.
pub fn compose_transform(rotation: &[f64; 9], translation: &[f64; 3]) -> Matrix4<f64> {
    let mut transform = Matrix4::identity();
    for r in 0..3 {
        for c in 0..3 {
            transform[(r, c)] = rotation[r * 3 + c];
        }
        transform[(r, 3)] = translation[r];
    }
    transform
}

/// Projects a mesh through the camera and returns its clipped bounding box.
///
/// The mesh vertices are given in object-local space. They are moved to world
/// space with `object_to_world`, then into camera space with the inverse of the
/// axis-normalized `camera_to_world`. Vertices behind the camera are dropped.
/// Each remaining vertex is placed inside the view frame scaled to its own
/// depth, which yields its normalized position on the image.
///
/// # Returns
///
/// * `Ok(Some(bbox))` - The object covers a non-empty part of the image.
/// * `Ok(None)` - Every vertex is behind the camera, or the clipped box has no
///   area (the object is fully outside the frame).
///
/// # Errors
///
/// * [`GeometryError::SingularTransform`] if `camera_to_world` cannot be inverted.
pub fn project_and_clip(
    vertices_local: &[Vector3<f64>],
    object_to_world: &Matrix4<f64>,
    camera_to_world: &Matrix4<f64>,
    view_frame: &ViewFrame,
) -> Result<Option<NormalizedBBox>, GeometryError> {
    let world_to_camera = invert_transform(&normalize_axes(camera_to_world))?;
    let object_to_camera = world_to_camera * object_to_world;

    // Only the first three corners are needed; negating them makes the frame
    // depth positive, matching `z_local` below.
    let frame: [Vector3<f64>; 3] = std::array::from_fn(|i| -view_frame.corners[i]);

    let mut xs = Vec::with_capacity(vertices_local.len());
    let mut ys = Vec::with_capacity(vertices_local.len());

    for vertex in vertices_local {
        let co = transform_point(&object_to_camera, vertex);
        let z_local = -co.z;
        if z_local <= 0.0 {
            continue;
        }

        let scaled: [Vector3<f64>; 3] = std::array::from_fn(|i| frame[i] / (frame[i].z / z_local));

        let min_x = scaled[1].x;
        let max_x = scaled[2].x;
        let min_y = scaled[0].y;
        let max_y = scaled[1].y;

        xs.push((co.x - min_x) / (max_x - min_x));
        ys.push((co.y - min_y) / (max_y - min_y));
    }

    if xs.is_empty() {
        debug!("All {} vertices are behind the camera", vertices_local.len());
        return Ok(None);
    }

    let fold_min = |values: &[f64]| values.iter().copied().fold(f64::INFINITY, f64::min);
    let fold_max = |values: &[f64]| values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let mut coords = [
        fold_min(&xs).clamp(0.0, 1.0),
        fold_min(&ys).clamp(0.0, 1.0),
        fold_max(&xs).clamp(0.0, 1.0),
        fold_max(&ys).clamp(0.0, 1.0),
    ];

    if coords[0] == coords[2] || coords[1] == coords[3] {
        debug!("Projected box collapsed after clipping: {:?}", coords);
        return Ok(None);
    }

    nudge_zero_coordinate(&mut coords);
    let [min_x, min_y, max_x, max_y] = coords;
    if min_x >= max_x || min_y >= max_y {
        return Ok(None);
    }

    // Camera space is y-up; flip to image rows.
    Ok(Some(NormalizedBBox {
        min_x,
        min_y: 1.0 - max_y,
        max_x,
        max_y: 1.0 - min_y,
    }))
}

/// Moves the first coordinate equal to the overall minimum off zero.
///
/// Consumers of the labels divide by box coordinates.
fn nudge_zero_coordinate(coords: &mut [f64; 4]) {
    let smallest = coords.iter().copied().fold(f64::INFINITY, f64::min);
    if smallest == 0.0 {
        if let Some(index) = coords.iter().position(|&c| c == smallest) {
            coords[index] += ZERO_COORDINATE_NUDGE;
        }
    }
}

/// Serde adapter storing a [`Matrix4`] as four rows of four numbers.
pub mod matrix_rows {
    use nalgebra::Matrix4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(matrix: &Matrix4<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rows: [[f64; 4]; 4] =
            std::array::from_fn(|r| std::array::from_fn(|c| matrix[(r, c)]));
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Matrix4<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rows = <[[f64; 4]; 4]>::deserialize(deserializer)?;
        Ok(Matrix4::from_fn(|r, c| rows[r][c]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Translation3};

    /// Frame of a 36mm-wide sensor, 50mm lens, 16:9 render.
    fn sample_frame() -> ViewFrame {
        let depth = 0.5 * 50.0 / -18.0;
        let (fx, fy) = (0.5, 0.5 * 720.0 / 1280.0);
        ViewFrame::new([
            Vector3::new(fx, fy, depth),
            Vector3::new(fx, -fy, depth),
            Vector3::new(-fx, -fy, depth),
            Vector3::new(-fx, fy, depth),
        ])
    }

    fn cube(half: f64) -> Vec<Vector3<f64>> {
        let mut vertices = Vec::new();
        for &x in &[-half, half] {
            for &y in &[-half, half] {
                for &z in &[-half, half] {
                    vertices.push(Vector3::new(x, y, z));
                }
            }
        }
        vertices
    }

    fn translation(x: f64, y: f64, z: f64) -> Matrix4<f64> {
        Translation3::new(x, y, z).to_homogeneous()
    }

    #[test]
    fn test_cube_on_optical_axis_is_centered() {
        let bbox = project_and_clip(
            &cube(0.5),
            &translation(0.0, 0.0, -5.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap()
        .expect("cube in front of the camera must be visible");

        let (cx, cy) = bbox.center();
        assert_relative_eq!(cx, 0.5, epsilon = 1e-9);
        assert_relative_eq!(cy, 0.5, epsilon = 1e-9);
        assert_relative_eq!(bbox.min_x + bbox.max_x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.min_y + bbox.max_y, 1.0, epsilon = 1e-9);
        assert!(bbox.width() > 0.0 && bbox.height() > 0.0);
    }

    #[test]
    fn test_cube_extent_matches_pinhole_projection() {
        let bbox = project_and_clip(
            &cube(0.5),
            &translation(0.0, 0.0, -5.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap()
        .unwrap();

        // Nearest face at depth 4.5; frame half-width there is 0.5 * 4.5 / (25 / 18).
        let half_width = 0.5 * 4.5 / (25.0 / 18.0);
        let expected_max_x = (0.5 + half_width) / (2.0 * half_width);
        assert_relative_eq!(bbox.max_x, expected_max_x, epsilon = 1e-9);
    }

    #[test]
    fn test_mesh_behind_camera_is_not_visible() {
        let result = project_and_clip(
            &cube(0.5),
            &translation(0.0, 0.0, 5.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_mesh_outside_frame_is_degenerate() {
        // Far to the right: every vertex clips to x = 1.
        let result = project_and_clip(
            &cube(0.5),
            &translation(50.0, 0.0, -5.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_edge_on_plane_is_degenerate() {
        // A square in the y-z plane seen edge-on: every vertex lands on x = 0.5,
        // well inside the frame.
        let plane: Vec<Vector3<f64>> = [(-0.5, -0.5), (-0.5, 0.5), (0.5, -0.5), (0.5, 0.5)]
            .iter()
            .map(|&(y, z)| Vector3::new(0.0, y, z))
            .collect();

        let bbox = project_and_clip(
            &plane,
            &translation(0.0, 0.0, -6.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap();
        assert!(bbox.is_none());

        // The same square facing the camera is visible.
        let facing: Vec<Vector3<f64>> = plane.iter().map(|v| Vector3::new(v.z, v.y, 0.0)).collect();
        assert!(project_and_clip(
            &facing,
            &translation(0.0, 0.0, -6.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap()
        .is_some());
    }

    #[test]
    fn test_partially_visible_mesh_is_clipped_and_nudged() {
        let bbox = project_and_clip(
            &cube(2.0),
            &translation(-2.5, 0.0, -5.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(bbox.min_x, ZERO_COORDINATE_NUDGE);
        assert!(bbox.max_x < 1.0);
        assert!(bbox.min_y >= 0.0 && bbox.max_y <= 1.0);
    }

    #[test]
    fn test_camera_scale_is_ignored() {
        let scaled_camera = Matrix4::new_scaling(3.0);
        let plain = project_and_clip(
            &cube(0.5),
            &translation(0.3, 0.1, -5.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap()
        .unwrap();
        let scaled = project_and_clip(
            &cube(0.5),
            &translation(0.3, 0.1, -5.0),
            &scaled_camera,
            &sample_frame(),
        )
        .unwrap()
        .unwrap();
        assert_relative_eq!(plain.min_x, scaled.min_x, epsilon = 1e-12);
        assert_relative_eq!(plain.max_y, scaled.max_y, epsilon = 1e-12);
    }

    #[test]
    fn test_object_above_axis_lands_in_upper_half() {
        let bbox = project_and_clip(
            &cube(0.2),
            &translation(0.0, 0.8, -5.0),
            &Matrix4::identity(),
            &sample_frame(),
        )
        .unwrap()
        .unwrap();
        assert!(bbox.max_y < 0.5);
    }

    #[test]
    fn test_rotated_camera_sees_object() {
        // Camera turned 90 degrees to the left looks down world -X.
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let camera = rotation.to_homogeneous();
        let bbox = project_and_clip(
            &cube(0.5),
            &translation(-5.0, 0.0, 0.0),
            &camera,
            &sample_frame(),
        )
        .unwrap()
        .unwrap();
        let (cx, cy) = bbox.center();
        assert_relative_eq!(cx, 0.5, epsilon = 1e-9);
        assert_relative_eq!(cy, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_singular_camera_is_an_error() {
        let mut camera = Matrix4::identity();
        camera[(0, 0)] = 0.0;
        camera[(1, 0)] = 0.0;
        camera[(0, 1)] = 1.0;
        let result = project_and_clip(
            &cube(0.5),
            &Matrix4::identity(),
            &camera,
            &sample_frame(),
        );
        assert!(matches!(result, Err(GeometryError::SingularTransform)));
    }

    #[test]
    fn test_normalize_axes_keeps_translation() {
        let mut transform = Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 3.0, 4.0));
        transform[(0, 3)] = 7.0;
        let normalized = normalize_axes(&transform);
        assert_relative_eq!(rotation_block(&normalized), Matrix3::identity(), epsilon = 1e-12);
        assert_eq!(translation_column(&normalized), Vector3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn test_bop_layout() {
        let bbox = NormalizedBBox {
            min_x: 0.25,
            min_y: 0.1,
            max_x: 0.75,
            max_y: 0.6,
        };
        assert_eq!(bbox.to_bop(), [0.25, 0.75, 0.5, 0.5]);
    }

    #[test]
    fn test_compose_matches_blocks() {
        let rotation = Rotation3::from_euler_angles(0.1, -0.4, 0.9);
        let mut transform = rotation.to_homogeneous();
        transform[(0, 3)] = 1.0;
        transform[(1, 3)] = -2.0;
        transform[(2, 3)] = 0.5;

        let rebuilt = compose_transform(
            &flatten_row_major(&rotation_block(&transform)),
            &translation_column(&transform).into(),
        );
        assert_relative_eq!(rebuilt, transform, epsilon = 1e-12);
    }
}
