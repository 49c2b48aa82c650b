//! Actor-critic MLP with a centralized critic
//!
//! Two independent feedforward stacks share one `VarStore`. The actor sees a
//! single agent's local observation and produces categorical logits; the
//! critic sees the global state of the agent's replica and produces a scalar
//! value. No parameters are shared between the two.
//!
//! # Architecture
//!
//! ```text
//!  Observation            Global state
//!       |                      |
//!  [Dense(64)]            [Dense(64)]
//!       |                      |
//!    ReLU/Tanh             ReLU/Tanh
//!       |                      |
//!  [Dense(64)]            [Dense(64)]
//!       |                      |
//!    ReLU/Tanh             ReLU/Tanh
//!       |                      |
//!  [Dense(n)]             [Dense(1)]
//!       |                      |
//!    Logits                  Value
//! ```
//!
//! Every layer uses orthogonal weights scaled by the activation's gain and a
//! zero bias.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tch::{
    Device, Kind, Tensor,
    nn::{self, Init, Module, OptimizerConfig},
};

/// Hidden-layer nonlinearity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Rectified linear unit
    #[serde(alias = "ReLU")]
    ReLU,
    /// Hyperbolic tangent
    #[serde(alias = "Tanh")]
    Tanh,
}

impl Activation {
    /// Recommended orthogonal-init gain for this nonlinearity
    pub fn gain(self) -> f64 {
        match self {
            Activation::ReLU => 2.0_f64.sqrt(),
            Activation::Tanh => 5.0 / 3.0,
        }
    }

    fn apply(self, x: &Tensor) -> Tensor {
        match self {
            Activation::ReLU => x.relu(),
            Activation::Tanh => x.tanh(),
        }
    }
}

/// Architecture of both networks
#[derive(Debug, Clone)]
pub struct MlpConfig {
    /// Width of both hidden layers
    pub hidden_dim: i64,
    /// Nonlinearity after each hidden layer
    pub activation: Activation,
    /// Place the model on CUDA when a device is available
    pub cuda: bool,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self { hidden_dim: 64, activation: Activation::ReLU, cuda: true }
    }
}

/// Output of [`ActorCritic::act`], one entry per row of the input batch
#[derive(Debug)]
pub struct PolicyOutput {
    /// Sampled or supplied actions `[B]` (Int64)
    pub actions: Tensor,
    /// Log-probabilities of `actions` `[B]`
    pub log_probs: Tensor,
    /// Entropy of each categorical distribution `[B]`
    pub entropy: Tensor,
    /// Critic values `[B]`
    pub values: Tensor,
}

/// Decentralized actor with a centralized critic
pub struct ActorCritic {
    vs: nn::VarStore,
    actor: nn::Sequential,
    critic: nn::Sequential,
    device: Device,
    obs_dim: i64,
    state_dim: i64,
    action_dim: i64,
}

/// Two hidden layers plus a linear output, all orthogonally initialized
fn mlp(p: nn::Path, in_dim: i64, out_dim: i64, config: &MlpConfig) -> nn::Sequential {
    let layer_config = nn::LinearConfig {
        ws_init: Init::Orthogonal { gain: config.activation.gain() },
        bs_init: Some(Init::Const(0.0)),
        bias: true,
    };
    let activation = config.activation;

    nn::seq()
        .add(nn::linear(&p / "fc1", in_dim, config.hidden_dim, layer_config))
        .add_fn(move |x| activation.apply(x))
        .add(nn::linear(&p / "fc2", config.hidden_dim, config.hidden_dim, layer_config))
        .add_fn(move |x| activation.apply(x))
        .add(nn::linear(&p / "out", config.hidden_dim, out_dim, layer_config))
}

impl ActorCritic {
    /// Create an actor-critic with the default architecture
    ///
    /// # Arguments
    ///
    /// * `obs_dim` - Width of one local observation
    /// * `state_dim` - Width of one global state
    /// * `action_dim` - Number of discrete actions
    pub fn new(obs_dim: i64, state_dim: i64, action_dim: i64) -> Self {
        Self::with_config(obs_dim, state_dim, action_dim, MlpConfig::default())
    }

    /// Create an actor-critic with a custom architecture
    pub fn with_config(obs_dim: i64, state_dim: i64, action_dim: i64, config: MlpConfig) -> Self {
        let device = if config.cuda { Device::cuda_if_available() } else { Device::Cpu };
        tracing::info!("ActorCritic using device: {:?}", device);

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let actor = mlp(&root / "actor", obs_dim, action_dim, &config);
        let critic = mlp(&root / "critic", state_dim, 1, &config);

        Self { vs, actor, critic, device, obs_dim, state_dim, action_dim }
    }

    /// Action logits `[B, action_dim]` for local observations `[B, obs_dim]`
    pub fn logits(&self, obs: &Tensor) -> Tensor {
        self.actor.forward(obs)
    }

    /// Values `[B]` for global states `[B, state_dim]`
    pub fn value(&self, states: &Tensor) -> Tensor {
        self.critic.forward(states).squeeze_dim(-1)
    }

    /// Sample or evaluate actions and estimate values
    ///
    /// With `actions = None` one action per row is sampled from the
    /// categorical distribution; otherwise the supplied actions are scored.
    /// Both branches stay differentiable.
    pub fn act(&self, obs: &Tensor, states: &Tensor, actions: Option<&Tensor>) -> PolicyOutput {
        let log_probs_all = self.logits(obs).log_softmax(-1, Kind::Float);
        let probs = log_probs_all.exp();

        let actions = match actions {
            Some(actions) => actions.shallow_clone(),
            None => probs.multinomial(1, true).squeeze_dim(-1),
        };

        let log_probs = log_probs_all.gather(-1, &actions.unsqueeze(-1), false).squeeze_dim(-1);
        let entropy = -(&probs * &log_probs_all).sum_dim_intlist(-1, false, Kind::Float);
        let values = self.value(states);

        PolicyOutput { actions, log_probs, entropy, values }
    }

    /// Build an Adam optimizer over every parameter
    pub fn optimizer(&self, learning_rate: f64, eps: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam { eps, ..Default::default() }.build(&self.vs, learning_rate)?)
    }

    /// Device holding the parameters
    pub fn device(&self) -> Device {
        self.device
    }

    /// Actor input width
    pub fn obs_dim(&self) -> i64 {
        self.obs_dim
    }

    /// Critic input width
    pub fn state_dim(&self) -> i64 {
        self.state_dim
    }

    /// Number of discrete actions
    pub fn action_dim(&self) -> i64 {
        self.action_dim
    }

    /// Get reference to variable store
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Get mutable reference to variable store
    pub fn var_store_mut(&mut self) -> &mut nn::VarStore {
        &mut self.vs
    }
}
