//! Predictor interface.
//!
//! A predictor estimates a scalar outcome (e.g. energy consumption for the
//! next interval) with a confidence score. Twins wrap one predictor each;
//! the leader's prediction becomes the round's proposal.

use crate::core::{Error, Result};
use rand::Rng;

/// One predictor estimate.
#[derive(Clone, Copy, Debug)]
pub struct Prediction {
    /// Predicted scalar value
    pub value: f64,
    /// Confidence score (0-1)
    pub confidence: f64,
}

/// A source of scalar predictions.
pub trait Predictor: Send + Sync {
    /// Produce a prediction.
    fn predict(&self) -> Result<Prediction>;
}

/// Predictor that always returns the same estimate.
pub struct FixedPredictor {
    value: f64,
    confidence: f64,
}

impl FixedPredictor {
    /// Create a predictor pinned to a value and confidence.
    pub fn new(value: f64, confidence: f64) -> Self {
        Self { value, confidence }
    }
}

impl Predictor for FixedPredictor {
    fn predict(&self) -> Result<Prediction> {
        Ok(Prediction {
            value: self.value,
            confidence: self.confidence,
        })
    }
}

/// Predictor that jitters around a base value (for simulations).
pub struct NoisyPredictor {
    base: f64,
    spread: f64,
    confidence: f64,
}

impl NoisyPredictor {
    /// Create a predictor returning `base ± spread` uniformly.
    pub fn new(base: f64, spread: f64, confidence: f64) -> Self {
        Self {
            base,
            spread,
            confidence,
        }
    }
}

impl Predictor for NoisyPredictor {
    fn predict(&self) -> Result<Prediction> {
        let jitter = if self.spread > 0.0 {
            rand::thread_rng().gen_range(-self.spread..=self.spread)
        } else {
            0.0
        };
        Ok(Prediction {
            value: self.base + jitter,
            confidence: self.confidence,
        })
    }
}

/// Predictor that always fails (for fault-path tests).
pub struct FailingPredictor;

impl Predictor for FailingPredictor {
    fn predict(&self) -> Result<Prediction> {
        Err(Error::PredictionFailed("model unavailable".to_string()))
    }
}
