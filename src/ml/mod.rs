//! Policy inference (deploy-safe).
//!
//! Policies are trained elsewhere; this module only loads and evaluates them.
//! Dense JSON networks are always available, ONNX graphs behind the `onnx`
//! feature.

pub mod dense;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod policy;

pub use dense::{Activation, DenseLayer, DensePolicy};
#[cfg(feature = "onnx")]
pub use onnx::OnnxPolicy;
pub use policy::{latest_artifact, ConstantPolicy, LoadedPolicy, Policy, PolicyProvider};
