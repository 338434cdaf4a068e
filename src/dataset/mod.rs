//! Layout of a rendered classification dataset and its per-image label files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{PipelineOptions, TestCase, UncertaintyMode};
use crate::fuzzy::{estimate_uncertainty, FuzzyError, UncertaintyDomain};
use crate::util::{self, UtilError};

/// Label file written next to every rendered image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintySidecar {
    pub image_path: String,
    pub obj_name: String,
    pub focal_length: f64,
    pub uncertainty_label: Option<f64>,
    pub low_threshold: u32,
    pub high_threshold: u32,
    #[serde(rename = "Total_num_classes")]
    pub total_num_classes: usize,
}

impl UncertaintySidecar {
    /// Builds a sidecar. The thresholds are the bounds of the focal length
    /// domain, written for every split.
    pub fn new(
        image_path: &Path,
        obj_name: &str,
        focal_length: f64,
        uncertainty_label: Option<f64>,
        total_num_classes: usize,
    ) -> Self {
        let (low, high, _) = UncertaintyDomain::Distance.input_range();
        UncertaintySidecar {
            image_path: image_path.to_string_lossy().into_owned(),
            obj_name: obj_name.to_string(),
            focal_length,
            uncertainty_label,
            low_threshold: low as u32,
            high_threshold: high as u32,
            total_num_classes,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), UtilError> {
        util::save_json_pretty(path, self)
    }
}

/// `<root>/<dataset><test_case>/<object>/<index>.png`, with the sidecar
/// beside the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub dataset_name: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, dataset_name: &str) -> Self {
        OutputLayout {
            root: root.into(),
            dataset_name: dataset_name.to_string(),
        }
    }

    pub fn split_dir(&self, test_case: TestCase) -> PathBuf {
        self.root
            .join(format!("{}{}", self.dataset_name, test_case.as_str()))
    }

    pub fn object_dir(&self, test_case: TestCase, obj_name: &str) -> PathBuf {
        self.split_dir(test_case).join(obj_name)
    }

    pub fn image_path(&self, test_case: TestCase, obj_name: &str, index: usize) -> PathBuf {
        self.object_dir(test_case, obj_name)
            .join(format!("{index:06}.png"))
    }

    pub fn sidecar_path(&self, test_case: TestCase, obj_name: &str, index: usize) -> PathBuf {
        self.image_path(test_case, obj_name, index)
            .with_extension("json")
    }
}

/// Uncertainty label for one image of a split.
///
/// `value` is the parameter the split varies: light energy for lighting
/// splits, focal length for distance splits. Splits without a fuzzy domain,
/// and runs with uncertainty switched off, get no label.
pub fn label_for(
    options: &PipelineOptions,
    test_case: TestCase,
    value: f64,
) -> Result<Option<f64>, FuzzyError> {
    if options.uncertainty == UncertaintyMode::Off {
        return Ok(None);
    }
    match test_case.uncertainty_domain() {
        Some(domain) => estimate_uncertainty(domain, value).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::fs;

    #[test]
    fn test_output_layout() {
        let layout = OutputLayout::new("output/dataset", "ycb_");
        assert_eq!(
            layout.image_path(TestCase::DarkLighting, "mug", 7),
            PathBuf::from("output/dataset/ycb_dark_lighting/mug/000007.png")
        );
        assert_eq!(
            layout.sidecar_path(TestCase::DarkLighting, "mug", 7),
            PathBuf::from("output/dataset/ycb_dark_lighting/mug/000007.json")
        );
    }

    #[test]
    fn test_label_for_respects_mode_and_split() {
        let off = PipelineOptions::default();
        let fuzzy = PipelineOptions::with_uncertainty(UncertaintyMode::Fuzzy);

        assert_eq!(label_for(&off, TestCase::NormalDistance, 65.0).unwrap(), None);
        assert_eq!(label_for(&fuzzy, TestCase::BlurImages, 65.0).unwrap(), None);

        let label = label_for(&fuzzy, TestCase::NormalDistance, 65.0).unwrap().unwrap();
        assert!((label - 0.087556).abs() < 1e-9);
        let label = label_for(&fuzzy, TestCase::NormalLighting, 6.0).unwrap().unwrap();
        assert!((label - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_sidecar_file() {
        let layout = OutputLayout::new("output/dataset_test", "run_");
        let image = layout.image_path(TestCase::FarDistance, "bowl", 0);
        let sidecar = UncertaintySidecar::new(&image, "bowl", 42.0, Some(2.1), 3);
        let path = layout.sidecar_path(TestCase::FarDistance, "bowl", 0);
        sidecar.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"obj_name\": \"bowl\""));

        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["low_threshold"], 40);
        assert_eq!(json["high_threshold"], 110);
        assert_eq!(json["Total_num_classes"], 3);
        assert_eq!(json["uncertainty_label"], 2.1);

        let unlabeled = UncertaintySidecar::new(&image, "bowl", 42.0, None, 3);
        let json = serde_json::to_value(&unlabeled).unwrap();
        assert!(json["uncertainty_label"].is_null());
    }
}
