//! Uncertainty labels for rendered images.
//!
//! Two rule bases are provided. The `distance` domain takes the camera focal
//! length in millimetres (a proxy for object distance) and the `light` domain
//! takes the light energy. Both output a score where higher means the image is
//! harder to recognise.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::fuzzy::{
    FuzzyError, FuzzyRule, FuzzyVariable, MamdaniSystem, MembershipFunction, Universe,
};

/// Decimal places kept on distance-domain results.
const DISTANCE_DECIMALS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyDomain {
    Distance,
    Light,
}

impl UncertaintyDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            UncertaintyDomain::Distance => "distance",
            UncertaintyDomain::Light => "light",
        }
    }

    /// The sampled input universe as `(start, stop, step)`.
    pub fn input_range(&self) -> (f64, f64, f64) {
        match self {
            UncertaintyDomain::Distance => (40.0, 110.0, 1.0),
            UncertaintyDomain::Light => (0.0, 25.0, 0.1),
        }
    }
}

impl fmt::Display for UncertaintyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UncertaintyDomain {
    type Err = FuzzyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distance" => Ok(UncertaintyDomain::Distance),
            "light" => Ok(UncertaintyDomain::Light),
            _ => Err(FuzzyError::UnknownDomain(s.to_string())),
        }
    }
}

fn triangle(a: f64, b: f64, c: f64) -> MembershipFunction {
    MembershipFunction::Triangular { a, b, c }
}

fn input_variable(domain: UncertaintyDomain) -> Result<FuzzyVariable, FuzzyError> {
    let (start, stop, step) = domain.input_range();
    Ok(FuzzyVariable::new(domain.as_str(), Universe::new(start, stop, step)?))
}

/// Focal length rule base.
///
/// Short and long lenses (object far or very near) are uncertain, the normal
/// range is not. `Medium` is declared on the output but no rule uses it.
pub fn distance_system() -> Result<MamdaniSystem, FuzzyError> {
    let input = input_variable(UncertaintyDomain::Distance)?
        .with_term("far", triangle(40.0, 40.0, 55.0))
        .with_term("little_far", triangle(50.0, 55.0, 60.0))
        .with_term("normal", triangle(58.0, 65.0, 72.0))
        .with_term("little_near", triangle(70.0, 80.0, 90.0))
        .with_term("near", triangle(80.0, 110.0, 110.0));

    let output = FuzzyVariable::new("uncertainty", Universe::new(0.0, 2.7, 0.01)?)
        .with_term("Low", MembershipFunction::ZShape { a: 0.0, b: 0.3 })
        .with_term(
            "Little_high",
            MembershipFunction::Gaussian {
                mean: 0.8,
                sigma: 0.05,
            },
        )
        .with_term(
            "Medium",
            MembershipFunction::Gaussian {
                mean: 0.5,
                sigma: 0.05,
            },
        )
        .with_term("High", MembershipFunction::SShape { a: 1.0, b: 2.7 });

    MamdaniSystem::new(
        input,
        output,
        vec![
            FuzzyRule::new("far", "High"),
            FuzzyRule::new("normal", "Low"),
            FuzzyRule::new("little_far", "Little_high"),
            FuzzyRule::new("near", "High"),
            FuzzyRule::new("little_near", "Little_high"),
        ],
    )
}

/// Light energy rule base. Only the normal exposure range is trusted.
pub fn light_system() -> Result<MamdaniSystem, FuzzyError> {
    let input = input_variable(UncertaintyDomain::Light)?
        .with_term("dark", triangle(0.0, 0.0, 2.0))
        .with_term("little_dark", triangle(1.5, 2.5, 3.5))
        .with_term("normal", triangle(2.8, 6.0, 8.0))
        .with_term("little_bright", triangle(7.5, 11.0, 16.0))
        .with_term("bright", triangle(15.0, 19.0, 25.0));

    let output = FuzzyVariable::new("uncertainty", Universe::new(0.0, 1.0, 0.01)?)
        .with_term("Low", triangle(0.0, 0.0, 0.5))
        .with_term("High", triangle(0.6, 1.0, 1.0));

    MamdaniSystem::new(
        input,
        output,
        vec![
            FuzzyRule::new("bright", "High"),
            FuzzyRule::new("normal", "Low"),
            FuzzyRule::new("little_bright", "High"),
            FuzzyRule::new("dark", "High"),
            FuzzyRule::new("little_dark", "High"),
        ],
    )
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Both rule systems, built once and reused for every query.
#[derive(Debug, Clone)]
pub struct UncertaintyEstimator {
    distance: MamdaniSystem,
    light: MamdaniSystem,
}

impl UncertaintyEstimator {
    pub fn new() -> Result<Self, FuzzyError> {
        Ok(UncertaintyEstimator {
            distance: distance_system()?,
            light: light_system()?,
        })
    }

    pub fn system(&self, domain: UncertaintyDomain) -> &MamdaniSystem {
        match domain {
            UncertaintyDomain::Distance => &self.distance,
            UncertaintyDomain::Light => &self.light,
        }
    }

    /// Uncertainty score for `value` in the given domain.
    ///
    /// Distance results are rounded to six decimals, light results are
    /// returned at full precision. Inputs outside the domain are clamped to
    /// its sampled range.
    pub fn estimate(&self, domain: UncertaintyDomain, value: f64) -> Result<f64, FuzzyError> {
        let raw = self.system(domain).compute(value)?;
        let result = match domain {
            UncertaintyDomain::Distance => round_to(raw, DISTANCE_DECIMALS),
            UncertaintyDomain::Light => raw,
        };
        debug!("Uncertainty ({domain}) for {value}: {result}");
        Ok(result)
    }
}

static ESTIMATOR: OnceLock<Result<UncertaintyEstimator, FuzzyError>> = OnceLock::new();

/// Estimates uncertainty with a process-wide estimator built on first use.
pub fn estimate_uncertainty(domain: UncertaintyDomain, value: f64) -> Result<f64, FuzzyError> {
    match ESTIMATOR.get_or_init(UncertaintyEstimator::new) {
        Ok(estimator) => estimator.estimate(domain, value),
        Err(err) => Err(err.clone()),
    }
}
