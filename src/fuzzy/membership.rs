//! Membership function shapes.
//!
//! Every shape maps a crisp value to a degree of membership in `[0, 1]`. The
//! edge conventions (value exactly on a foot or a peak) match the common
//! scientific-Python fuzzy toolkit, so rule bases carried over from it keep
//! their numbers.

use serde::{Deserialize, Serialize};

use crate::fuzzy::FuzzyError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum MembershipFunction {
    /// Triangle with feet `a`, `c` and peak `b` (`a <= b <= c`).
    Triangular { a: f64, b: f64, c: f64 },
    /// Trapezoid rising over `[a, b]`, flat over `[b, c]`, falling over `[c, d]`.
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
    Gaussian { mean: f64, sigma: f64 },
    /// Logistic curve `1 / (1 + exp(-slope * (x - center)))`.
    Sigmoid { center: f64, slope: f64 },
    /// Left shoulder: 1 below `a`, smooth spline ramp down to 0 at `b`.
    ZShape { a: f64, b: f64 },
    /// Right shoulder: 0 below `a`, smooth spline ramp up to 1 at `b`.
    SShape { a: f64, b: f64 },
}

impl MembershipFunction {
    pub fn evaluate(&self, x: f64) -> f64 {
        match *self {
            MembershipFunction::Triangular { a, b, c } => {
                if a != b && a < x && x < b {
                    (x - a) / (b - a)
                } else if b != c && b < x && x < c {
                    (c - x) / (c - b)
                } else if x == b {
                    1.0
                } else {
                    0.0
                }
            }
            MembershipFunction::Trapezoidal { a, b, c, d } => {
                if x < a || x > d {
                    0.0
                } else if x < b {
                    // a < b here, otherwise x < a would have matched.
                    (x - a) / (b - a)
                } else if x <= c {
                    1.0
                } else {
                    (d - x) / (d - c)
                }
            }
            MembershipFunction::Gaussian { mean, sigma } => {
                (-(x - mean).powi(2) / (2.0 * sigma * sigma)).exp()
            }
            MembershipFunction::Sigmoid { center, slope } => {
                1.0 / (1.0 + (-slope * (x - center)).exp())
            }
            MembershipFunction::ZShape { a, b } => {
                let mid = (a + b) / 2.0;
                if x <= a {
                    1.0
                } else if x < mid {
                    1.0 - 2.0 * ((x - a) / (b - a)).powi(2)
                } else if x <= b {
                    2.0 * ((x - b) / (b - a)).powi(2)
                } else {
                    0.0
                }
            }
            MembershipFunction::SShape { a, b } => {
                let mid = (a + b) / 2.0;
                if x <= a {
                    0.0
                } else if x <= mid {
                    2.0 * ((x - a) / (b - a)).powi(2)
                } else if x <= b {
                    1.0 - 2.0 * ((x - b) / (b - a)).powi(2)
                } else {
                    1.0
                }
            }
        }
    }

    /// Rejects parameter sets for which the shape is undefined.
    pub fn validate(&self) -> Result<(), FuzzyError> {
        let ok = match *self {
            MembershipFunction::Triangular { a, b, c } => a <= b && b <= c,
            MembershipFunction::Trapezoidal { a, b, c, d } => a <= b && b <= c && c <= d,
            MembershipFunction::Gaussian { sigma, .. } => sigma > 0.0,
            MembershipFunction::Sigmoid { slope, .. } => slope.is_finite(),
            MembershipFunction::ZShape { a, b } | MembershipFunction::SShape { a, b } => a < b,
        };
        if ok {
            Ok(())
        } else {
            Err(FuzzyError::InvalidMembership(format!("{self:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_triangular_edges() {
        let mf = MembershipFunction::Triangular {
            a: 58.0,
            b: 65.0,
            c: 72.0,
        };
        assert_eq!(mf.evaluate(58.0), 0.0);
        assert_eq!(mf.evaluate(65.0), 1.0);
        assert_eq!(mf.evaluate(72.0), 0.0);
        assert_relative_eq!(mf.evaluate(61.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(mf.evaluate(70.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_triangular_shoulder() {
        // Peak on the left foot: full membership at the boundary itself.
        let mf = MembershipFunction::Triangular {
            a: 40.0,
            b: 40.0,
            c: 55.0,
        };
        assert_eq!(mf.evaluate(40.0), 1.0);
        assert_relative_eq!(mf.evaluate(45.0), 10.0 / 15.0, epsilon = 1e-12);
        assert_eq!(mf.evaluate(39.0), 0.0);
    }

    #[test]
    fn test_trapezoidal_plateau() {
        let mf = MembershipFunction::Trapezoidal {
            a: 0.0,
            b: 1.0,
            c: 2.0,
            d: 4.0,
        };
        assert_eq!(mf.evaluate(1.5), 1.0);
        assert_relative_eq!(mf.evaluate(0.25), 0.25, epsilon = 1e-12);
        assert_relative_eq!(mf.evaluate(3.0), 0.5, epsilon = 1e-12);
        assert_eq!(mf.evaluate(5.0), 0.0);
    }

    #[test]
    fn test_gaussian_and_sigmoid() {
        let gauss = MembershipFunction::Gaussian {
            mean: 0.8,
            sigma: 0.05,
        };
        assert_eq!(gauss.evaluate(0.8), 1.0);
        assert_relative_eq!(gauss.evaluate(0.85), (-0.5f64).exp(), epsilon = 1e-12);

        let sigmoid = MembershipFunction::Sigmoid {
            center: 1.0,
            slope: 10.0,
        };
        assert_eq!(sigmoid.evaluate(1.0), 0.5);
        assert!(sigmoid.evaluate(2.0) > 0.99);
    }

    #[test]
    fn test_spline_shoulders_mirror_each_other() {
        let z = MembershipFunction::ZShape { a: 0.0, b: 0.3 };
        let s = MembershipFunction::SShape { a: 0.0, b: 0.3 };
        assert_eq!(z.evaluate(0.0), 1.0);
        assert_eq!(z.evaluate(0.3), 0.0);
        assert_eq!(s.evaluate(0.3), 1.0);
        for x in [0.05, 0.1, 0.15, 0.2, 0.25] {
            assert_relative_eq!(z.evaluate(x) + s.evaluate(x), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_validate() {
        assert!(MembershipFunction::Triangular {
            a: 2.0,
            b: 1.0,
            c: 3.0
        }
        .validate()
        .is_err());
        assert!(MembershipFunction::Gaussian {
            mean: 0.0,
            sigma: 0.0
        }
        .validate()
        .is_err());
        assert!(MembershipFunction::SShape { a: 1.0, b: 2.7 }.validate().is_ok());
    }
}
