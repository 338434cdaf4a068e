//! Per-frame aggregation of camera, pose and bounding box records.
//!
//! A run keeps three mappings resident, each keyed by the frame index as a
//! string, and writes them once at the end:
//!
//! * `scene_camera.json` - `{frame: SceneCameraRecord}`
//! * `scene_gt.json` - `{frame: [PoseAnnotation, ...]}`
//! * `scene_gt_info.json` - `{frame: [AnnotationRecord | null, ...]}`
//!
//! Within a frame, both lists follow the order of the object names passed to
//! [`annotate_frame`].

use log::{debug, info};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::path::Path;

use crate::annotation::{
    annotate, object_pose, AnnotationError, AnnotationRecord, ClassIndex, PoseAnnotation,
};
use crate::camera::{extrinsics, intrinsics};
use crate::scene::SceneProvider;
use crate::util::{self, UtilError};

pub const SCENE_CAMERA_FILE: &str = "scene_camera.json";
pub const SCENE_GT_FILE: &str = "scene_gt.json";
pub const SCENE_GT_INFO_FILE: &str = "scene_gt_info.json";

/// One entry of `scene_camera.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneCameraRecord {
    #[serde(rename = "cam_K")]
    pub cam_k: [f64; 9],
    #[serde(rename = "cam_R_w2c")]
    pub cam_r_w2c: [f64; 9],
    #[serde(rename = "cam_t_w2c")]
    pub cam_t_w2c: [f64; 3],
    pub depth_scale: u32,
}

/// Records produced for a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnnotation {
    pub camera: SceneCameraRecord,
    pub gt: Vec<PoseAnnotation>,
    pub gt_info: Vec<Option<AnnotationRecord>>,
}

impl FrameAnnotation {
    pub fn visible_count(&self) -> usize {
        self.gt_info.iter().filter(|r| r.is_some()).count()
    }
}

/// Annotates every named object for the current frame.
///
/// Camera intrinsics and extrinsics are computed once. Each object then gets a
/// pose unconditionally and a bounding box when it is visible; invisible
/// objects leave a `None` in `gt_info` so positions line up with `gt`.
///
/// # Errors
///
/// Fails if the camera settings are invalid or its transform is singular,
/// and on the first object that is missing from the scene or from `classes`.
pub fn annotate_frame<S, N>(
    frame_index: usize,
    object_names: &[N],
    classes: &ClassIndex,
    scene: &S,
) -> Result<FrameAnnotation, AnnotationError>
where
    S: SceneProvider + ?Sized,
    N: AsRef<str>,
{
    let camera_state = scene.camera_state();
    camera_state.validate_params()?;
    let k = intrinsics(&camera_state);
    let ext = extrinsics(&camera_state)?;

    let camera = SceneCameraRecord {
        cam_k: k.cam_k(),
        cam_r_w2c: ext.cam_r_w2c(),
        cam_t_w2c: ext.cam_t_w2c(),
        depth_scale: 1,
    };

    let camera_to_world = scene.camera_to_world();
    let mut gt = Vec::with_capacity(object_names.len());
    let mut gt_info = Vec::with_capacity(object_names.len());

    for name in object_names {
        let name = name.as_ref();
        let object_to_world = scene.object_to_world(name)?;
        gt.push(object_pose(
            &object_to_world,
            &camera_to_world,
            classes.get(name)?,
            name,
        )?);
        gt_info.push(annotate(name, scene, classes)?);
    }

    let frame = FrameAnnotation { camera, gt, gt_info };
    debug!(
        "Frame {}: {} of {} objects visible",
        frame_index,
        frame.visible_count(),
        object_names.len()
    );
    Ok(frame)
}

/// Insertion-ordered mapping from frame index to a per-frame value.
///
/// Serializes as a JSON object whose keys are the frame indices as strings,
/// in the order the frames were recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMap<T> {
    entries: Vec<(String, T)>,
    /// Position in `entries` of each recorded frame.
    positions: HashMap<usize, usize>,
}

impl<T> Default for FrameMap<T> {
    fn default() -> Self {
        FrameMap {
            entries: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<T> FrameMap<T> {
    /// Inserts or replaces the value for a frame. A replaced frame keeps its position.
    pub fn insert(&mut self, frame_index: usize, value: T) {
        match self.positions.get(&frame_index) {
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.positions.insert(frame_index, self.entries.len());
                self.entries.push((frame_index.to_string(), value));
            }
        }
    }

    pub fn get(&self, frame_index: usize) -> Option<&T> {
        self.positions
            .get(&frame_index)
            .map(|&position| &self.entries[position].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<T: Serialize> Serialize for FrameMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// All annotations of a run, kept in memory until [`SceneAnnotations::write_to_dir`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneAnnotations {
    pub scene_camera: FrameMap<SceneCameraRecord>,
    pub scene_gt: FrameMap<Vec<PoseAnnotation>>,
    pub scene_gt_info: FrameMap<Vec<Option<AnnotationRecord>>>,
}

impl SceneAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frame_index: usize, frame: FrameAnnotation) {
        self.scene_camera.insert(frame_index, frame.camera);
        self.scene_gt.insert(frame_index, frame.gt);
        self.scene_gt_info.insert(frame_index, frame.gt_info);
    }

    /// Annotates a frame and stores the result.
    pub fn record<S, N>(
        &mut self,
        frame_index: usize,
        object_names: &[N],
        classes: &ClassIndex,
        scene: &S,
    ) -> Result<(), AnnotationError>
    where
        S: SceneProvider + ?Sized,
        N: AsRef<str>,
    {
        let frame = annotate_frame(frame_index, object_names, classes, scene)?;
        self.insert(frame_index, frame);
        Ok(())
    }

    pub fn frame_count(&self) -> usize {
        self.scene_camera.len()
    }

    /// Writes the three BOP files into `dir`, creating it if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), UtilError> {
        util::ensure_dir(dir)?;
        util::save_json_compact(&dir.join(SCENE_CAMERA_FILE), &self.scene_camera)?;
        util::save_json_compact(&dir.join(SCENE_GT_FILE), &self.scene_gt)?;
        util::save_json_compact(&dir.join(SCENE_GT_INFO_FILE), &self.scene_gt_info)?;
        info!(
            "Wrote annotations for {} frames to {}",
            self.frame_count(),
            dir.display()
        );
        Ok(())
    }
}
