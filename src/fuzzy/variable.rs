use serde::{Deserialize, Serialize};

use crate::fuzzy::{FuzzyError, MembershipFunction};

/// Evenly sampled half-open range `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Universe {
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self, FuzzyError> {
        let finite = start.is_finite() && stop.is_finite() && step.is_finite();
        if !finite || step <= 0.0 || stop <= start {
            return Err(FuzzyError::InvalidUniverse(format!(
                "[{start}, {stop}) with step {step}"
            )));
        }
        Ok(Universe { start, stop, step })
    }

    pub fn len(&self) -> usize {
        ((self.stop - self.start) / self.step).ceil() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples(&self) -> Vec<f64> {
        (0..self.len())
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }

    /// Largest sample; `stop` itself is excluded.
    pub fn last(&self) -> f64 {
        self.start + (self.len().saturating_sub(1)) as f64 * self.step
    }

    /// Clamps a crisp value to the sampled range.
    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.start, self.last())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    pub membership: MembershipFunction,
}

/// A linguistic variable: a sampled domain split into named terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyVariable {
    pub name: String,
    pub universe: Universe,
    pub terms: Vec<Term>,
}

impl FuzzyVariable {
    pub fn new(name: &str, universe: Universe) -> Self {
        FuzzyVariable {
            name: name.to_string(),
            universe,
            terms: Vec::new(),
        }
    }

    /// Adds a term, replacing any existing term with the same name.
    pub fn with_term(mut self, name: &str, membership: MembershipFunction) -> Self {
        self.terms.retain(|t| t.name != name);
        self.terms.push(Term {
            name: name.to_string(),
            membership,
        });
        self
    }

    pub fn term_index(&self, name: &str) -> Result<usize, FuzzyError> {
        self.terms
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| FuzzyError::UnknownTerm {
                variable: self.name.clone(),
                term: name.to_string(),
            })
    }

    pub fn term(&self, name: &str) -> Result<&Term, FuzzyError> {
        Ok(&self.terms[self.term_index(name)?])
    }

    /// Degree of membership of `x` in a term, with `x` clamped to the universe.
    pub fn membership(&self, term: &str, x: f64) -> Result<f64, FuzzyError> {
        Ok(self.term(term)?.membership.evaluate(self.universe.clamp(x)))
    }

    pub fn validate(&self) -> Result<(), FuzzyError> {
        self.terms.iter().try_for_each(|t| t.membership.validate())
    }
}
