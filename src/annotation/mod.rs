//! BOP-style annotation of rendered frames.
//!
//! * [`bbox`] - normalized 2D bounding boxes (`scene_gt_info.json`).
//! * [`pose`] - object pose relative to the camera (`scene_gt.json`).
//! * [`aggregate`] - per-frame camera records and the run-level collection of
//!   all three files.

use std::collections::HashMap;

use crate::camera::CameraError;
use crate::geometry::GeometryError;
use crate::scene::SceneError;

pub mod aggregate;
pub mod bbox;
pub mod pose;

pub use aggregate::{annotate_frame, FrameAnnotation, SceneAnnotations, SceneCameraRecord};
pub use bbox::{annotate, AnnotationRecord};
pub use pose::{object_pose, PoseAnnotation};

#[derive(thiserror::Error, Debug)]
pub enum AnnotationError {
    #[error("Object '{0}' has no class index")]
    UnknownClass(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Maps object names to the integer class id written to the labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassIndex {
    ids: HashMap<String, u32>,
}

impl ClassIndex {
    /// Assigns ids in enumeration order, starting at zero.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let ids = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref().to_string(), i as u32))
            .collect();
        ClassIndex { ids }
    }

    pub fn insert(&mut self, name: &str, id: u32) {
        self.ids.insert(name.to_string(), id);
    }

    pub fn get(&self, name: &str) -> Result<u32, AnnotationError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| AnnotationError::UnknownClass(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_index_enumerates_names() {
        let classes = ClassIndex::from_names(&["mug", "bowl", "drill"]);
        assert_eq!(classes.get("mug").unwrap(), 0);
        assert_eq!(classes.get("drill").unwrap(), 2);
        assert_eq!(classes.len(), 3);
        assert!(matches!(
            classes.get("spoon"),
            Err(AnnotationError::UnknownClass(_))
        ));
    }
}
