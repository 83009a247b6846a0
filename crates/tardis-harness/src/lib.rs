//! Deterministic simulation harness for Tardis archive testing.
//!
//! [`SimEnv`] implements the Environment trait with a virtual clock and a
//! seeded RNG, so archive runs are reproducible.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and the real service,
//! and their results and observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod sim_env;

pub use model::{
    CallerId, IdTarget, KeyLength, ModelArchive, ObservableState, Operation, OperationResult,
    SmallMessage, after_ts, caller_address, release_at,
};
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv};
