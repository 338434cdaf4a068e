use log::debug;
use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationError, ClassIndex};
use crate::geometry::{project_and_clip, NormalizedBBox};
use crate::scene::SceneProvider;

/// One entry of `scene_gt_info.json`.
///
/// `bbox_visib` carries the same box as `bbox_obj`; occlusion by other
/// objects is not taken into account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub bbox_obj: [f64; 4],
    pub bbox_visib: [f64; 4],
    pub class_label: u32,
    pub class_name: String,
}

impl AnnotationRecord {
    pub fn new(bbox: &NormalizedBBox, class_label: u32, class_name: &str) -> Self {
        let bop = bbox.to_bop();
        AnnotationRecord {
            bbox_obj: bop,
            bbox_visib: bop,
            class_label,
            class_name: class_name.to_string(),
        }
    }
}

/// Computes the bounding box record of one object, if it is in view.
///
/// # Returns
///
/// * `Ok(Some(record))` - The object projects onto a non-empty image region.
/// * `Ok(None)` - The object is behind the camera or outside the frame.
///
/// # Errors
///
/// * [`AnnotationError::UnknownClass`] if `object_name` is missing from `classes`.
/// * [`AnnotationError::Scene`] if the scene has no such object.
/// * [`AnnotationError::Geometry`] if the camera transform is singular.
pub fn annotate<S: SceneProvider + ?Sized>(
    object_name: &str,
    scene: &S,
    classes: &ClassIndex,
) -> Result<Option<AnnotationRecord>, AnnotationError> {
    let class_label = classes.get(object_name)?;
    let vertices = scene.mesh_vertices_local(object_name)?;
    let object_to_world = scene.object_to_world(object_name)?;

    let bbox = project_and_clip(
        &vertices,
        &object_to_world,
        &scene.camera_to_world(),
        &scene.camera_view_frame(),
    )?;

    match bbox {
        Some(bbox) => Ok(Some(AnnotationRecord::new(&bbox, class_label, object_name))),
        None => {
            debug!("Object '{}' is not visible", object_name);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::tests::hd_camera;
    use crate::scene::{box_vertices, SceneObject, SceneSnapshot};
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Translation3};

    fn scene_with(name: &str, transform: Matrix4<f64>) -> SceneSnapshot {
        SceneSnapshot::new(hd_camera(Matrix4::identity())).with_object(SceneObject::new(
            name,
            &box_vertices(0.5, 0.5, 0.5),
            transform,
        ))
    }

    #[test]
    fn test_visible_object_gets_record() {
        let scene = scene_with("mug", Translation3::new(0.0, 0.0, -6.0).to_homogeneous());
        let classes = ClassIndex::from_names(&["bowl", "mug"]);

        let record = annotate("mug", &scene, &classes).unwrap().unwrap();
        assert_eq!(record.class_label, 1);
        assert_eq!(record.class_name, "mug");
        assert_eq!(record.bbox_obj, record.bbox_visib);

        let [x1, x2, width, height] = record.bbox_obj;
        assert_relative_eq!(x2 - x1, width, epsilon = 1e-12);
        assert_relative_eq!(x1 + width / 2.0, 0.5, epsilon = 1e-9);
        assert!(height > width);
    }

    #[test]
    fn test_object_behind_camera_has_no_record() {
        let scene = scene_with("mug", Translation3::new(0.0, 0.0, 6.0).to_homogeneous());
        let classes = ClassIndex::from_names(&["mug"]);
        assert!(annotate("mug", &scene, &classes).unwrap().is_none());
    }

    #[test]
    fn test_missing_class_fails_fast() {
        let scene = scene_with("mug", Translation3::new(0.0, 0.0, -6.0).to_homogeneous());
        let classes = ClassIndex::from_names(&["bowl"]);
        assert!(matches!(
            annotate("mug", &scene, &classes),
            Err(AnnotationError::UnknownClass(_))
        ));
    }
}
