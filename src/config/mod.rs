//! Dataset requirements and pipeline options.
//!
//! The requirements file is the JSON document that drives a dataset run. Its
//! values are historically string-encoded (`"True"`, `"10"`), so it is read
//! through [`serde_json::Value`] and every field is converted explicitly, with
//! an error naming the offending key.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::fuzzy::UncertaintyDomain;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Missing key: {0}")]
    MissingKey(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("IO Error: {0}")]
    IOError(String),
    #[error("JSON Error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IOError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::JsonError(err.to_string())
    }
}

/// A dataset split. Each split varies one aspect of the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCase {
    NormalLighting,
    BrightLighting,
    DarkLighting,
    NearDistance,
    FarDistance,
    NormalDistance,
    RandomBackgroundColors,
    RandomBackgroundTextures,
    BlurImages,
    DistractorObjects,
    DeformedObjects,
    AllVariations,
}

impl TestCase {
    pub const ALL: [TestCase; 12] = [
        TestCase::NormalLighting,
        TestCase::BrightLighting,
        TestCase::DarkLighting,
        TestCase::NearDistance,
        TestCase::FarDistance,
        TestCase::NormalDistance,
        TestCase::RandomBackgroundColors,
        TestCase::RandomBackgroundTextures,
        TestCase::BlurImages,
        TestCase::DistractorObjects,
        TestCase::DeformedObjects,
        TestCase::AllVariations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestCase::NormalLighting => "normal_lighting",
            TestCase::BrightLighting => "bright_lighting",
            TestCase::DarkLighting => "dark_lighting",
            TestCase::NearDistance => "near_distance",
            TestCase::FarDistance => "far_distance",
            TestCase::NormalDistance => "normal_distance",
            TestCase::RandomBackgroundColors => "random_background_colors",
            TestCase::RandomBackgroundTextures => "random_background_textures",
            TestCase::BlurImages => "blur_images",
            TestCase::DistractorObjects => "distractor_objects",
            TestCase::DeformedObjects => "deformed_objects",
            TestCase::AllVariations => "all_variations",
        }
    }

    /// The fuzzy domain that scores images of this split, if any.
    ///
    /// Lighting splits vary the light energy, distance splits vary the focal
    /// length. Other splits carry no uncertainty label.
    pub fn uncertainty_domain(&self) -> Option<UncertaintyDomain> {
        match self {
            TestCase::NormalLighting | TestCase::BrightLighting | TestCase::DarkLighting => {
                Some(UncertaintyDomain::Light)
            }
            TestCase::NearDistance | TestCase::FarDistance | TestCase::NormalDistance => {
                Some(UncertaintyDomain::Distance)
            }
            _ => None,
        }
    }

    /// Whether the split samples its parameter from `[min_value, max_value]`.
    pub fn is_ranged(&self) -> bool {
        self.uncertainty_domain().is_some()
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestCase {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestCase::ALL
            .iter()
            .find(|tc| tc.as_str() == s)
            .copied()
            .ok_or_else(|| ConfigError::InvalidValue(format!("Unknown test case '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseSettings {
    pub enabled: bool,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

/// Parsed requirements file.
///
/// Parameter and test case entries keep the order of the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub output_path: PathBuf,
    pub textures_path: PathBuf,
    pub num_images_per_class: u32,
    pub parameters: Vec<(String, bool)>,
    pub test_cases: Vec<(TestCase, TestCaseSettings)>,
}

fn field<'a>(object: &'a Map<String, Value>, key: &str, context: &str) -> Result<&'a Value, ConfigError> {
    object
        .get(key)
        .ok_or_else(|| ConfigError::MissingKey(format!("{context}{key}")))
}

fn as_object<'a>(value: &'a Value, key: &str) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| ConfigError::InvalidValue(format!("{key} must be an object")))
}

fn parse_flag(value: &Value, key: &str) -> Result<bool, ConfigError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(s) if s == "True" || s == "true" => Ok(true),
        Value::String(s) if s == "False" || s == "false" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "{key}: expected a boolean flag, got {other}"
        ))),
    }
}

fn parse_number(value: &Value, key: &str) -> Result<f64, ConfigError> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite())
        .ok_or_else(|| ConfigError::InvalidValue(format!("{key}: expected a number, got {value}")))
}

fn parse_string(value: &Value, key: &str) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ConfigError::InvalidValue(format!("{key}: expected a string, got {value}")))
}

impl Requirements {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn load_from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let root = as_object(value, "requirements")?;

        let output_path = PathBuf::from(parse_string(field(root, "output_path", "")?, "output_path")?);
        let textures_path =
            PathBuf::from(parse_string(field(root, "textures_path", "")?, "textures_path")?);

        let count = parse_number(field(root, "Num_images_per_class", "")?, "Num_images_per_class")?;
        if count < 0.0 || count.fract() != 0.0 || count > u32::MAX as f64 {
            return Err(ConfigError::InvalidValue(format!(
                "Num_images_per_class: expected a non-negative integer, got {count}"
            )));
        }

        let parameters = as_object(field(root, "Parameters", "")?, "Parameters")?
            .iter()
            .map(|(name, flag)| Ok((name.clone(), parse_flag(flag, name)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut test_cases = Vec::new();
        for (name, entry) in as_object(field(root, "Test_cases", "")?, "Test_cases")? {
            let test_case: TestCase = name.parse()?;
            let entry = as_object(entry, name)?;
            let context = format!("Test_cases.{name}.");
            let enabled = parse_flag(field(entry, "condition", &context)?, name)?;
            let min_value = entry
                .get("min_value")
                .map(|v| parse_number(v, &format!("{context}min_value")))
                .transpose()?;
            let max_value = entry
                .get("max_value")
                .map(|v| parse_number(v, &format!("{context}max_value")))
                .transpose()?;
            test_cases.push((
                test_case,
                TestCaseSettings {
                    enabled,
                    min_value,
                    max_value,
                },
            ));
        }

        Ok(Requirements {
            output_path,
            textures_path,
            num_images_per_class: count as u32,
            parameters,
            test_cases,
        })
    }

    /// Test cases whose `condition` is set, in file order.
    pub fn enabled_test_cases(&self) -> Vec<TestCase> {
        self.test_cases
            .iter()
            .filter(|(_, settings)| settings.enabled)
            .map(|(tc, _)| *tc)
            .collect()
    }

    /// Scene parameters switched on (e.g. `random_rotation`), in file order.
    pub fn enabled_parameters(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn parameter_enabled(&self, name: &str) -> bool {
        self.parameters.iter().any(|(n, enabled)| n == name && *enabled)
    }

    pub fn settings(&self, test_case: TestCase) -> Result<&TestCaseSettings, ConfigError> {
        self.test_cases
            .iter()
            .find(|(tc, _)| *tc == test_case)
            .map(|(_, settings)| settings)
            .ok_or_else(|| ConfigError::MissingKey(format!("Test_cases.{test_case}")))
    }

    /// The `[min_value, max_value]` range of a test case.
    pub fn min_max_values(&self, test_case: TestCase) -> Result<(f64, f64), ConfigError> {
        let settings = self.settings(test_case)?;
        let min = settings
            .min_value
            .ok_or_else(|| ConfigError::MissingKey(format!("Test_cases.{test_case}.min_value")))?;
        let max = settings
            .max_value
            .ok_or_else(|| ConfigError::MissingKey(format!("Test_cases.{test_case}.max_value")))?;
        if min > max {
            return Err(ConfigError::InvalidValue(format!(
                "Test_cases.{test_case}: min_value {min} exceeds max_value {max}"
            )));
        }
        Ok((min, max))
    }

    /// Renders per object for every enabled split.
    pub fn renders_per_split(&self) -> Vec<(TestCase, u32)> {
        self.enabled_test_cases()
            .into_iter()
            .map(|tc| (tc, self.num_images_per_class))
            .collect()
    }

    /// `count` evenly spaced values covering the test case range, both ends
    /// included.
    pub fn sequential_step_values(
        &self,
        test_case: TestCase,
        count: usize,
    ) -> Result<Vec<f64>, ConfigError> {
        let (start, stop) = self.min_max_values(test_case)?;
        if count < 2 {
            return Err(ConfigError::InvalidValue(format!(
                "At least two sequential values are needed, got {count}"
            )));
        }
        let step = (stop - start) / (count - 1) as f64;
        Ok((0..count)
            .map(|i| if i == count - 1 { stop } else { start + i as f64 * step })
            .collect())
    }
}

/// How uncertainty labels are attached to rendered images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyMode {
    /// Sidecars carry a `null` label.
    #[default]
    Off,
    /// Labels come from the fuzzy estimator of the split's domain.
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub uncertainty: UncertaintyMode,
}

impl PipelineOptions {
    pub fn with_uncertainty(uncertainty: UncertaintyMode) -> Self {
        PipelineOptions { uncertainty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_requirements() -> Requirements {
        Requirements::load_from_json(Path::new("samples/requirements.json")).unwrap()
    }

    #[test]
    fn test_load_requirements() {
        let req = sample_requirements();
        assert_eq!(req.output_path, PathBuf::from("output/dataset"));
        assert_eq!(req.num_images_per_class, 10);
        assert_eq!(
            req.enabled_test_cases(),
            vec![
                TestCase::NormalLighting,
                TestCase::DarkLighting,
                TestCase::NearDistance
            ]
        );
        assert_eq!(req.enabled_parameters(), vec!["random_rotation", "random_textures"]);
        assert!(!req.parameter_enabled("random_color"));
    }

    #[test]
    fn test_min_max_values() {
        let req = sample_requirements();
        assert_eq!(req.min_max_values(TestCase::DarkLighting).unwrap(), (0.0, 2.0));
        assert_eq!(req.min_max_values(TestCase::NearDistance).unwrap(), (90.0, 140.0));
        assert!(matches!(
            req.min_max_values(TestCase::BlurImages),
            Err(ConfigError::MissingKey(_))
        ));
    }

    #[test]
    fn test_renders_per_split() {
        let splits = sample_requirements().renders_per_split();
        assert_eq!(splits.len(), 3);
        assert!(splits.iter().all(|(_, n)| *n == 10));
    }

    #[test]
    fn test_sequential_step_values() {
        let req = sample_requirements();
        let values = req.sequential_step_values(TestCase::NearDistance, 6).unwrap();
        assert_eq!(values.len(), 6);
        assert_eq!(values[0], 90.0);
        assert_relative_eq!(values[1], 100.0, epsilon = 1e-12);
        assert_eq!(values[5], 140.0);
        assert!(req.sequential_step_values(TestCase::NearDistance, 1).is_err());
    }

    #[test]
    fn test_missing_key_is_reported() {
        let err = Requirements::from_json_str(
            r#"{"output_path": "out", "textures_path": "tex", "Parameters": {}, "Test_cases": {}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(ref k) if k == "Num_images_per_class"));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let bad_flag = r#"{"output_path": "out", "textures_path": "tex", "Num_images_per_class": "3",
            "Parameters": {"random_rotation": "yes"}, "Test_cases": {}}"#;
        assert!(matches!(
            Requirements::from_json_str(bad_flag),
            Err(ConfigError::InvalidValue(_))
        ));

        let bad_case = r#"{"output_path": "out", "textures_path": "tex", "Num_images_per_class": 3,
            "Parameters": {}, "Test_cases": {"foggy": {"condition": "True"}}}"#;
        assert!(matches!(
            Requirements::from_json_str(bad_case),
            Err(ConfigError::InvalidValue(_))
        ));

        let bad_count = r#"{"output_path": "out", "textures_path": "tex", "Num_images_per_class": "2.5",
            "Parameters": {}, "Test_cases": {}}"#;
        assert!(Requirements::from_json_str(bad_count).is_err());
    }

    #[test]
    fn test_uncertainty_domains() {
        assert_eq!(
            TestCase::BrightLighting.uncertainty_domain(),
            Some(UncertaintyDomain::Light)
        );
        assert_eq!(
            TestCase::FarDistance.uncertainty_domain(),
            Some(UncertaintyDomain::Distance)
        );
        assert_eq!(TestCase::BlurImages.uncertainty_domain(), None);
        assert_eq!("all_variations".parse::<TestCase>().unwrap(), TestCase::AllVariations);
    }
}
