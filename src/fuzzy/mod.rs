//! Fuzzy uncertainty estimation.
//!
//! A small Mamdani inference engine ([`MamdaniSystem`]) over sampled
//! linguistic variables, and the two rule bases used to label rendered images
//! with an uncertainty score ([`uncertainty`]).

pub mod membership;
pub mod system;
pub mod uncertainty;
pub mod variable;

pub use membership::MembershipFunction;
pub use system::{centroid, FuzzyRule, MamdaniSystem};
pub use uncertainty::{estimate_uncertainty, UncertaintyDomain, UncertaintyEstimator};
pub use variable::{FuzzyVariable, Term, Universe};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FuzzyError {
    #[error("Variable '{variable}' has no term named '{term}'")]
    UnknownTerm { variable: String, term: String },
    #[error("No rule fired for input {0}")]
    NoRuleFired(f64),
    #[error("Invalid universe: {0}")]
    InvalidUniverse(String),
    #[error("Invalid membership function: {0}")]
    InvalidMembership(String),
    #[error("Unknown uncertainty domain: {0}")]
    UnknownDomain(String),
}
