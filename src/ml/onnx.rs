//! ONNX policy inference (pure Rust via `tract-onnx`).
//!
//! Serves a policy exported from the training stack without a Python runtime.
//! The graph must take one `f32[1, lookback, 6]` input and produce a single
//! scalar action.

use std::path::Path;

use tract_onnx::prelude::*;

use super::policy::Policy;
use crate::error::{Result, TraderError};
use crate::rl::features::ObservationWindow;
use crate::rl::FEATURE_COUNT;

pub struct OnnxPolicy {
    plan: TypedRunnableModel<TypedModel>,
    lookback: usize,
    name: String,
}

impl std::fmt::Debug for OnnxPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPolicy")
            .field("lookback", &self.lookback)
            .field("name", &self.name)
            .finish()
    }
}

fn onnx_err(stage: &str) -> impl Fn(TractError) -> TraderError + '_ {
    move |e| TraderError::PolicyUnavailable(format!("onnx {stage} failed: {e}"))
}

impl OnnxPolicy {
    /// Load and specialize a model to the `[1, lookback, FEATURE_COUNT]` input.
    pub fn load(path: &Path, lookback: usize) -> Result<Self> {
        if lookback == 0 {
            return Err(TraderError::Validation("lookback must be > 0".to_string()));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(onnx_err("load"))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, lookback, FEATURE_COUNT)),
            )
            .map_err(onnx_err("input fact"))?
            .into_optimized()
            .map_err(onnx_err("optimize"))?
            .into_runnable()
            .map_err(onnx_err("runnable"))?;

        let policy = Self {
            plan,
            lookback,
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "onnx".to_string()),
        };

        // Dry run on zeros so a wrong output shape fails at load time, not on a tick.
        let zeros = ObservationWindow::from_rows(vec![[0.0; FEATURE_COUNT]], lookback);
        policy.predict(&zeros)?;
        Ok(policy)
    }
}

impl Policy for OnnxPolicy {
    fn predict(&self, observation: &ObservationWindow) -> Result<f64> {
        if observation.lookback() != self.lookback {
            return Err(TraderError::Validation(format!(
                "onnx policy expects lookback {}, observation has {}",
                self.lookback,
                observation.lookback()
            )));
        }

        let tensor = tract_ndarray::Array3::<f32>::from_shape_vec(
            (1, self.lookback, FEATURE_COUNT),
            observation.to_flat(),
        )
        .map_err(|e| TraderError::Internal(format!("onnx input reshape failed: {e}")))?
        .into_tvalue();

        let outputs = self.plan.run(tvec!(tensor)).map_err(onnx_err("run"))?;
        let first = outputs
            .first()
            .ok_or_else(|| TraderError::PolicyUnavailable("onnx produced no outputs".to_string()))?;
        let values = first.to_array_view::<f32>().map_err(onnx_err("output decode"))?;

        match values.iter().next() {
            Some(v) if values.len() == 1 => Ok(f64::from(*v)),
            _ => Err(TraderError::PolicyUnavailable(format!(
                "onnx policy must output one scalar, got {} values",
                values.len()
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
