//! Episode statistics
//!
//! Per-slot accumulators of episodic reward and length, summarized whenever
//! some slots finish an episode.

/// Summary of one step on which some slots finished an episode
///
/// Averages are taken over every slot with unfinished slots counting as
/// zero, so partial completions pull the figures down.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    /// `Σ_done reward / num_slots`
    pub average_per_player_return: f64,

    /// `num_slots × average_per_player_return`, the summed return of the
    /// finished slots
    pub share_return: f64,

    /// `Σ_done length / num_slots`
    pub episodic_length: f64,

    /// Number of slots that finished
    pub finished_slots: usize,
}

/// Running episodic reward/length for every slot
#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    rewards: Vec<f64>,
    lengths: Vec<usize>,
}

impl EpisodeTracker {
    /// Create a tracker over `num_slots` slots
    pub fn new(num_slots: usize) -> Self {
        Self { rewards: vec![0.0; num_slots], lengths: vec![0; num_slots] }
    }

    /// Account for one environment step
    ///
    /// Every slot's length grows by one and its reward by this step's reward.
    /// If any slot is done, returns the done-weighted means over all slots
    /// (the reward of the final step included) and zeroes exactly the done
    /// slots.
    pub fn step(&mut self, rewards: &[f32], dones: &[bool]) -> Option<EpisodeSummary> {
        debug_assert_eq!(rewards.len(), self.rewards.len(), "reward count mismatch");
        debug_assert_eq!(dones.len(), self.rewards.len(), "done count mismatch");

        for ((total, length), &reward) in self.rewards.iter_mut().zip(&mut self.lengths).zip(rewards) {
            *total += reward as f64;
            *length += 1;
        }

        let finished = dones.iter().filter(|&&done| done).count();
        if finished == 0 {
            return None;
        }

        let mut reward_sum = 0.0;
        let mut length_sum = 0;
        for (slot, _) in dones.iter().enumerate().filter(|(_, done)| **done) {
            reward_sum += self.rewards[slot];
            length_sum += self.lengths[slot];
            self.rewards[slot] = 0.0;
            self.lengths[slot] = 0;
        }

        let num_slots = self.rewards.len() as f64;
        let per_player = reward_sum / num_slots;
        Some(EpisodeSummary {
            average_per_player_return: per_player,
            share_return: per_player * num_slots,
            episodic_length: length_sum as f64 / num_slots,
            finished_slots: finished,
        })
    }

    /// Current accumulated reward of a slot
    pub fn reward(&self, slot: usize) -> f64 {
        self.rewards[slot]
    }

    /// Current accumulated length of a slot
    pub fn length(&self, slot: usize) -> usize {
        self.lengths[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_summary_without_done() {
        let mut tracker = EpisodeTracker::new(2);
        assert!(tracker.step(&[1.0, 2.0], &[false, false]).is_none());
        assert_eq!(tracker.reward(1), 2.0);
        assert_eq!(tracker.length(0), 1);
    }

    #[test]
    fn test_final_reward_included_and_reset() {
        let mut tracker = EpisodeTracker::new(2);
        tracker.step(&[1.0, 1.0], &[false, false]);

        let summary = tracker.step(&[3.0, 0.5], &[true, false]).unwrap();

        // Slot 0 finished with 4.0 over 2 steps; slot 1 counts as zero
        assert_eq!(summary.finished_slots, 1);
        assert_eq!(summary.average_per_player_return, 2.0);
        assert_eq!(summary.share_return, 4.0);
        assert_eq!(summary.episodic_length, 1.0);

        // Done slot is exactly zero, the other keeps accumulating
        assert_eq!(tracker.reward(0), 0.0);
        assert_eq!(tracker.length(0), 0);
        assert_eq!(tracker.reward(1), 1.5);
        assert_eq!(tracker.length(1), 2);
    }

    #[test]
    fn test_unfinished_slots_count_as_zero() {
        let mut tracker = EpisodeTracker::new(4);
        let summary = tracker.step(&[1.0, 3.0, 100.0, 100.0], &[true, true, false, false]).unwrap();

        assert_eq!(summary.average_per_player_return, 1.0);
        assert_eq!(summary.share_return, 4.0);
        assert_eq!(summary.episodic_length, 0.5);
        assert_eq!(tracker.reward(2), 100.0);
    }

    #[test]
    fn test_all_slots_finishing_together() {
        let mut tracker = EpisodeTracker::new(3);
        tracker.step(&[-1.0, -1.0, -1.0], &[false; 3]);
        let summary = tracker.step(&[-2.0, -2.0, -2.0], &[true; 3]).unwrap();

        assert_eq!(summary.average_per_player_return, -3.0);
        assert_eq!(summary.share_return, -9.0);
        assert_eq!(summary.episodic_length, 2.0);
    }
}
