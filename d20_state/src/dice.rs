//! The dice collaborator.
//!
//! The runtime never interprets dice grammar. It hands an opaque
//! specification to a [`DiceGenerator`] and gets an opaque result back.

use serde::{Deserialize, Serialize};

use crate::{StateError, Value};

/// An unevaluated dice expression, in whatever form the generator accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceSpecification(pub Value);

impl DiceSpecification {
    pub fn new(spec: impl Into<Value>) -> Self {
        Self(spec.into())
    }
}

/// The outcome of rolling a specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceResults {
    /// Generator-specific record of the individual rolls.
    pub rolled: Value,
    pub value: i64,
}

/// Produces dice results. Supplied by the host.
pub trait DiceGenerator {
    /// Roll a specification.
    fn execute(&self, spec: &DiceSpecification) -> Result<DiceResults, StateError>;

    /// Roll every die of a previous result again.
    fn reroll_all(&self, results: &DiceResults) -> Result<DiceResults, StateError>;
}

/// Generator installed when the host provides none. Every roll fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDice;

impl DiceGenerator for UnavailableDice {
    fn execute(&self, _spec: &DiceSpecification) -> Result<DiceResults, StateError> {
        Err(StateError::Dice("no dice generator installed".into()))
    }

    fn reroll_all(&self, _results: &DiceResults) -> Result<DiceResults, StateError> {
        Err(StateError::Dice("no dice generator installed".into()))
    }
}
