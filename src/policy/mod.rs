//! Policy and neural network wrappers
//!
//! This module provides the actor-critic used by the trainer, built on tch-rs
//! neural networks.

pub mod mlp;

pub use mlp::{Activation, ActorCritic, MlpConfig, PolicyOutput};
