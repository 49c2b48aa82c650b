//! Generalized Advantage Estimation (GAE) computation
//!
//! This module implements GAE for computing advantages from trajectories.
//! GAE helps reduce variance in policy gradient methods while maintaining
//! sufficient bias for learning.

/// Compute Generalized Advantage Estimation (GAE) for every slot at once
///
/// All per-step arrays are laid out `[num_steps, num_slots]`; each slot is an
/// independent stream processed backwards in time.
///
/// # Arguments
/// * `rewards` - Rewards [num_steps, num_slots]
/// * `values` - Value estimates in raw return space [num_steps, num_slots]
/// * `dones` - Done flags entering each step [num_steps, num_slots]
/// * `next_values` - Bootstrap values after the last step [num_slots]
/// * `next_dones` - Done flags entering the bootstrap state [num_slots]
/// * `gamma` - Discount factor (0 < gamma <= 1)
/// * `gae_lambda` - GAE lambda parameter (0 <= lambda <= 1)
/// * `advantages` / `returns` - Outputs [num_steps, num_slots]
///
/// # Mathematical Formula
/// ```text
/// nonterminal_t = 1 - done_{t+1}
/// δ_t = r_t + γ * V_{t+1} * nonterminal_t - V_t
/// A_t = δ_t + γ * λ * nonterminal_t * A_{t+1}
/// R_t = A_t + V_t
/// ```
///
/// where `done_T` and `V_T` are the bootstrap flag and value.
#[allow(clippy::too_many_arguments)]
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    next_values: &[f32],
    next_dones: &[bool],
    gamma: f32,
    gae_lambda: f32,
    advantages: &mut [f32],
    returns: &mut [f32],
) {
    let num_slots = next_values.len();
    debug_assert_eq!(next_dones.len(), num_slots, "next_dones length mismatch");
    debug_assert!(num_slots > 0 && rewards.len() % num_slots == 0, "ragged rollout");
    debug_assert_eq!(values.len(), rewards.len());
    debug_assert_eq!(dones.len(), rewards.len());
    debug_assert_eq!(advantages.len(), rewards.len());
    debug_assert_eq!(returns.len(), rewards.len());

    let num_steps = rewards.len() / num_slots;
    let mut last_gae = vec![0.0_f32; num_slots];

    for t in (0..num_steps).rev() {
        for slot in 0..num_slots {
            let i = t * num_slots + slot;

            let (next_done, next_value) = if t == num_steps - 1 {
                (next_dones[slot], next_values[slot])
            } else {
                (dones[i + num_slots], values[i + num_slots])
            };
            let next_non_terminal = if next_done { 0.0 } else { 1.0 };

            let delta = rewards[i] + gamma * next_value * next_non_terminal - values[i];
            last_gae[slot] = delta + gamma * gae_lambda * next_non_terminal * last_gae[slot];

            advantages[i] = last_gae[slot];
            returns[i] = last_gae[slot] + values[i];
        }
    }
}
