pub mod fuzzy;
pub mod policy;

pub use fuzzy::{evaluate_crime_likelihood, FuzzyError, FuzzyInputs};
pub use policy::{AlertPayload, DecisionPolicy, Snapshot};
