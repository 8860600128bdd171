//! Dense MLP policy (CPU-only).
//!
//! A small fully-connected network loaded from JSON, mapping a flattened
//! observation window to one target-position scalar. Output is usually a
//! `tanh` layer, but the engine clamps whatever comes out.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::policy::Policy;
use crate::error::{Result, TraderError};
use crate::rl::features::ObservationWindow;
use crate::rl::FEATURE_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// `[out_dim][in_dim]`
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let sum = row.iter().zip(x).fold(*b, |acc, (w, v)| acc + w * v);
                self.activation.apply(sum)
            })
            .collect()
    }
}

/// Serialized policy network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DensePolicy {
    /// Rows per observation window the network was trained on
    pub lookback: usize,
    pub layers: Vec<DenseLayer>,
    /// Free-form training metadata
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(skip)]
    name: String,
}

impl DensePolicy {
    pub fn new(lookback: usize, layers: Vec<DenseLayer>) -> Result<Self> {
        let policy = Self {
            lookback,
            layers,
            metadata: serde_json::Value::Null,
            name: "dense".to_string(),
        };
        policy.validate().map_err(TraderError::Validation)?;
        Ok(policy)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let mut policy: Self = serde_json::from_str(&content)?;
        policy.validate().map_err(TraderError::Validation)?;
        policy.name = path
            .as_ref()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dense".to_string());
        Ok(policy)
    }

    pub fn input_dim(&self) -> usize {
        self.lookback * FEATURE_COUNT
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.lookback == 0 {
            return Err("lookback must be > 0".to_string());
        }
        if self.layers.is_empty() {
            return Err("layers must not be empty".to_string());
        }

        let mut expected_in = self.input_dim();
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.is_empty() {
                return Err(format!("layer[{idx}] has no outputs"));
            }
            if layer.bias.len() != layer.weights.len() {
                return Err(format!(
                    "layer[{idx}] bias len {} != out_dim {}",
                    layer.bias.len(),
                    layer.weights.len()
                ));
            }
            if let Some(r) = layer.weights.iter().position(|row| row.len() != expected_in) {
                return Err(format!(
                    "layer[{idx}] weights row {r} len {} != expected {expected_in}",
                    layer.weights[r].len()
                ));
            }
            let finite = layer.weights.iter().flatten().chain(&layer.bias).all(|v| v.is_finite());
            if !finite {
                return Err(format!("layer[{idx}] contains non-finite parameters"));
            }
            expected_in = layer.weights.len();
        }

        if expected_in != 1 {
            return Err(format!("final layer must have one output, has {expected_in}"));
        }
        Ok(())
    }

    fn forward(&self, input: Vec<f64>) -> f64 {
        let out = self
            .layers
            .iter()
            .fold(input, |x, layer| layer.forward(&x));
        out.first().copied().unwrap_or(0.0)
    }
}

impl Policy for DensePolicy {
    fn predict(&self, observation: &ObservationWindow) -> Result<f64> {
        if observation.lookback() != self.lookback {
            return Err(TraderError::Validation(format!(
                "policy expects lookback {}, observation has {}",
                self.lookback,
                observation.lookback()
            )));
        }
        let input: Vec<f64> = observation.to_flat().into_iter().map(f64::from).collect();
        Ok(self.forward(input))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close_only_policy(lookback: usize) -> DensePolicy {
        // Weight only the last row's close_norm column.
        let mut weights = vec![0.0; lookback * FEATURE_COUNT];
        weights[(lookback - 1) * FEATURE_COUNT + 3] = 1.0;
        DensePolicy::new(
            lookback,
            vec![DenseLayer {
                weights: vec![weights],
                bias: vec![0.0],
                activation: Activation::Tanh,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_predict_reads_last_close_feature() {
        let policy = close_only_policy(2);
        let mut row = [0.0_f32; FEATURE_COUNT];
        row[3] = 0.5;
        let obs = ObservationWindow::from_rows(vec![[0.0; FEATURE_COUNT], row], 2);
        let action = policy.predict(&obs).unwrap();
        assert!((action - 0.5_f64.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_lookback_mismatch_rejected() {
        let policy = close_only_policy(3);
        let obs = ObservationWindow::from_rows(vec![[0.0; FEATURE_COUNT]], 2);
        assert!(policy.predict(&obs).is_err());
    }

    #[test]
    fn test_validates_shapes() {
        let bad = DensePolicy::new(
            1,
            vec![DenseLayer {
                weights: vec![vec![1.0, 2.0]],
                bias: vec![0.0],
                activation: Activation::Linear,
            }],
        );
        assert!(bad.is_err());

        let two_outputs = DensePolicy::new(
            1,
            vec![DenseLayer {
                weights: vec![vec![0.0; FEATURE_COUNT]; 2],
                bias: vec![0.0; 2],
                activation: Activation::Linear,
            }],
        );
        assert!(two_outputs.is_err());
    }

    #[test]
    fn test_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, serde_json::to_string(&close_only_policy(4)).unwrap()).unwrap();

        let loaded = DensePolicy::from_file(&path).unwrap();
        assert_eq!(loaded.lookback, 4);
        assert_eq!(loaded.name(), "policy.json");
    }
}
