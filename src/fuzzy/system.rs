use log::trace;
use serde::{Deserialize, Serialize};

use crate::fuzzy::{FuzzyError, FuzzyVariable};

/// `IF input is <antecedent> THEN output is <consequent>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyRule {
    pub antecedent: String,
    pub consequent: String,
}

impl FuzzyRule {
    pub fn new(antecedent: &str, consequent: &str) -> Self {
        FuzzyRule {
            antecedent: antecedent.to_string(),
            consequent: consequent.to_string(),
        }
    }
}

/// Single-input, single-output Mamdani controller.
///
/// Rule strengths clip their consequent sets (min) and the clipped sets are
/// combined pointwise (max). Rules sharing a consequent clip it at their
/// strongest level. The output universe is refined with the points where each
/// sampled consequent crosses its clipping level before the result is
/// defuzzified with [`centroid`].
#[derive(Debug, Clone)]
pub struct MamdaniSystem {
    input: FuzzyVariable,
    output: FuzzyVariable,
    rules: Vec<FuzzyRule>,
    /// Output term index of each rule's consequent.
    consequents: Vec<usize>,
    output_samples: Vec<f64>,
    /// Every output term evaluated at `output_samples`, in term order.
    term_samples: Vec<Vec<f64>>,
}

impl MamdaniSystem {
    /// Builds the system, checking that every rule names existing terms.
    pub fn new(
        input: FuzzyVariable,
        output: FuzzyVariable,
        rules: Vec<FuzzyRule>,
    ) -> Result<Self, FuzzyError> {
        input.validate()?;
        output.validate()?;
        let mut consequents = Vec::with_capacity(rules.len());
        for rule in &rules {
            input.term(&rule.antecedent)?;
            consequents.push(output.term_index(&rule.consequent)?);
        }
        let output_samples = output.universe.samples();
        let term_samples = output
            .terms
            .iter()
            .map(|t| {
                output_samples
                    .iter()
                    .map(|&y| t.membership.evaluate(y))
                    .collect()
            })
            .collect();

        Ok(MamdaniSystem {
            input,
            output,
            rules,
            consequents,
            output_samples,
            term_samples,
        })
    }

    pub fn input(&self) -> &FuzzyVariable {
        &self.input
    }

    pub fn output(&self) -> &FuzzyVariable {
        &self.output
    }

    pub fn rules(&self) -> &[FuzzyRule] {
        &self.rules
    }

    /// Clipping level of every output term for input `x`.
    fn term_levels(&self, x: f64) -> Result<Vec<f64>, FuzzyError> {
        let mut levels = vec![0.0_f64; self.term_samples.len()];
        for (rule, &term) in self.rules.iter().zip(&self.consequents) {
            let strength = self.input.membership(&rule.antecedent, x)?;
            trace!(
                "{} is {} -> {} ({strength:.4})",
                self.input.name,
                rule.antecedent,
                rule.consequent
            );
            levels[term] = levels[term].max(strength);
        }
        Ok(levels)
    }

    /// Aggregated output membership for input `x` as `(grid, membership)`.
    ///
    /// The grid holds the output samples merged with the crossings of every
    /// clipped term, sorted and without duplicates. Terms are interpolated
    /// linearly between their samples.
    pub fn aggregate(&self, x: f64) -> Result<(Vec<f64>, Vec<f64>), FuzzyError> {
        let levels = self.term_levels(x)?;
        let fired: Vec<(&[f64], f64)> = self
            .term_samples
            .iter()
            .zip(levels)
            .filter(|(_, level)| *level > 0.0)
            .map(|(samples, level)| (samples.as_slice(), level))
            .collect();

        let mut grid = self.output_samples.clone();
        for &(samples, level) in &fired {
            grid.extend(level_crossings(&self.output_samples, samples, level));
        }
        grid.sort_by(f64::total_cmp);
        grid.dedup();

        let membership = grid
            .iter()
            .map(|&y| {
                fired.iter().fold(0.0_f64, |acc, &(samples, level)| {
                    acc.max(level.min(interpolate(&self.output_samples, samples, y)))
                })
            })
            .collect();

        Ok((grid, membership))
    }

    /// Crisp output for input `x`.
    pub fn compute(&self, x: f64) -> Result<f64, FuzzyError> {
        let (grid, membership) = self.aggregate(x)?;
        centroid(&grid, &membership).ok_or(FuzzyError::NoRuleFired(x))
    }
}

/// Points where the polyline through `(xs, ys)` reaches `level`, one for each
/// interval whose ends lie on different sides of it.
fn level_crossings<'a>(
    xs: &'a [f64],
    ys: &'a [f64],
    level: f64,
) -> impl Iterator<Item = f64> + 'a {
    xs.windows(2)
        .zip(ys.windows(2))
        .filter(move |(_, y)| (y[0] >= level) != (y[1] >= level))
        .map(move |(x, y)| x[0] + (level - y[0]) * (x[1] - x[0]) / (y[1] - y[0]))
}

/// Linear interpolation of `(xs, ys)` at `x`, held constant past either end.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let i = xs.partition_point(|&v| v <= x);
    match i {
        0 => ys.first().copied().unwrap_or(0.0),
        i if i == xs.len() => ys[i - 1],
        i => {
            let (x0, x1, y0, y1) = (xs[i - 1], xs[i], ys[i - 1], ys[i]);
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        }
    }
}

/// Center of gravity of a piecewise-linear membership curve.
///
/// Each segment between consecutive samples is integrated exactly as a
/// rectangle, triangle or trapezoid. Returns `None` when the curve has zero
/// area.
pub fn centroid(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let mut moment = 0.0;
    let mut area = 0.0;

    for (x, y) in xs.windows(2).zip(ys.windows(2)) {
        let (x1, x2, y1, y2) = (x[0], x[1], y[0], y[1]);
        if (y1 == 0.0 && y2 == 0.0) || x1 == x2 {
            continue;
        }
        let dx = x2 - x1;
        let (segment_moment, segment_area) = if y1 == y2 {
            (0.5 * (x1 + x2), dx * y1)
        } else if y1 == 0.0 {
            (2.0 / 3.0 * dx + x1, 0.5 * dx * y2)
        } else if y2 == 0.0 {
            (1.0 / 3.0 * dx + x1, 0.5 * dx * y1)
        } else {
            (
                (2.0 / 3.0 * dx * (y2 + 0.5 * y1)) / (y1 + y2) + x1,
                0.5 * dx * (y1 + y2),
            )
        };
        moment += segment_moment * segment_area;
        area += segment_area;
    }

    if area > 0.0 {
        Some(moment / area)
    } else {
        None
    }
}
