//! Tests for rollout buffer functionality

mod gae_tests {
    use crate::buffer::rollout::compute_gae;

    fn run_gae(
        rewards: &[f32],
        values: &[f32],
        dones: &[bool],
        next_values: &[f32],
        next_dones: &[bool],
        gamma: f32,
        gae_lambda: f32,
    ) -> (Vec<f32>, Vec<f32>) {
        let mut advantages = vec![f32::NAN; rewards.len()];
        let mut returns = vec![f32::NAN; rewards.len()];
        compute_gae(
            rewards,
            values,
            dones,
            next_values,
            next_dones,
            gamma,
            gae_lambda,
            &mut advantages,
            &mut returns,
        );
        (advantages, returns)
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
        }
    }

    #[test]
    fn test_gae_two_step_scenario() {
        let (advantages, returns) =
            run_gae(&[1.0, 2.0], &[0.5, 0.5], &[false, false], &[0.0], &[true], 0.99, 0.95);

        // Step 1: delta = 2 - 0.5; step 0: 0.995 + 0.99 * 0.95 * 1.5
        assert_close(&advantages, &[2.40575, 1.5]);
        assert_close(&returns, &[2.90575, 2.0]);
    }

    #[test]
    fn test_gae_zero_rollout_is_zero() {
        let n = 4 * 3;
        let (advantages, returns) =
            run_gae(&vec![0.0; n], &vec![0.0; n], &vec![false; n], &[0.0; 3], &[false; 3], 0.99, 0.95);

        assert!(advantages.iter().all(|&a| a == 0.0));
        assert!(returns.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn test_gae_lambda_one_is_discounted_return() {
        let gamma = 0.9;
        let rewards = [1.0, -2.0, 3.0];
        let values = [0.3, 1.7, -0.4];
        let bootstrap = 5.0;

        let (_, returns) = run_gae(&rewards, &values, &[false; 3], &[bootstrap], &[false], gamma, 1.0);

        let r2 = 3.0 + gamma * bootstrap;
        let r1 = -2.0 + gamma * r2;
        let r0 = 1.0 + gamma * r1;
        assert_close(&returns, &[r0, r1, r2]);
    }

    #[test]
    fn test_gae_lambda_zero_is_td_error() {
        let gamma = 0.99;
        let rewards = [1.0, 0.5, -1.0];
        let values = [0.2, 0.4, 0.8];
        let bootstrap = 1.5;

        let (advantages, _) =
            run_gae(&rewards, &values, &[false; 3], &[bootstrap], &[false], gamma, 0.0);

        let expected = [
            1.0 + gamma * 0.4 - 0.2,
            0.5 + gamma * 0.8 - 0.4,
            -1.0 + gamma * bootstrap - 0.8,
        ];
        assert_close(&advantages, &expected);
    }

    #[test]
    fn test_gae_episode_boundary_blocks_bootstrap() {
        // Episode restarts entering step 2, so step 1 must not see step 2
        let rewards = [1.0, 1.0, 5.0];
        let values = [0.0, 0.0, 10.0];
        let dones = [false, false, true];

        let (advantages, _) = run_gae(&rewards, &values, &dones, &[0.0], &[true], 1.0, 1.0);

        assert_close(&advantages[..2], &[2.0, 1.0]);
        assert_close(&advantages[2..], &[-5.0]);
    }

    #[test]
    fn test_gae_slots_are_independent() {
        // Two slots interleaved step-major: slot 0 terminates at the end, slot 1 bootstraps
        let rewards = [1.0, 0.0, 2.0, 0.0];
        let values = [0.5, 1.0, 0.5, 1.0];
        let dones = [false; 4];

        let (advantages, _) =
            run_gae(&rewards, &values, &dones, &[0.0, 1.0], &[true, false], 0.99, 0.95);

        let (slot0, _) = run_gae(&[1.0, 2.0], &[0.5, 0.5], &[false; 2], &[0.0], &[true], 0.99, 0.95);
        let (slot1, _) = run_gae(&[0.0, 0.0], &[1.0, 1.0], &[false; 2], &[1.0], &[false], 0.99, 0.95);

        assert_close(&[advantages[0], advantages[2]], &slot0);
        assert_close(&[advantages[1], advantages[3]], &slot1);
    }
}

mod buffer_tests {
    use crate::buffer::rollout::RolloutBuffer;
    use crate::utils::ReturnNormalizer;

    #[test]
    fn test_buffer_advantages_use_denormalized_values() {
        let mut normalizer = ReturnNormalizer::new(0.0);
        normalizer.update(&[0.0, 2.0]);

        // mean = 1, std = 1: stored normalized values of -0.5 map back to 0.5
        let mut buffer = RolloutBuffer::new(2, 1, 1, 1);
        for step in 0..2 {
            buffer.record_inputs(step, &[0.0], &[0.0], &[false]);
            buffer.record_policy(step, &[0], &[0.0], &[-0.5]);
        }
        buffer.record_rewards(0, &[1.0]);
        buffer.record_rewards(1, &[2.0]);

        buffer.denormalize_values(&normalizer);
        buffer.compute_advantages(&[0.0], &[true], 0.99, 0.95);

        assert!((buffer.advantages()[0] - 2.40575).abs() < 1e-5);
        assert!((buffer.returns()[1] - 2.0).abs() < 1e-5);
        assert_eq!(buffer.values(), &[0.5, 0.5]);
    }
}

mod sampling_tests {
    use rand::{SeedableRng, rngs::StdRng};

    use crate::buffer::rollout::generate_minibatch_indices;

    #[test]
    fn test_single_minibatch_covers_everything() {
        let mut rng = StdRng::seed_from_u64(0);
        let batches = generate_minibatch_indices(75, 75, &mut rng);

        assert_eq!(batches.len(), 1);
        let mut seen = batches[0].clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..75).collect::<Vec<_>>());
    }

    #[test]
    fn test_last_minibatch_may_be_short() {
        let mut rng = StdRng::seed_from_u64(0);
        let batches = generate_minibatch_indices(10, 4, &mut rng);

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);

        let mut seen: Vec<usize> = batches.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let a = generate_minibatch_indices(50, 10, &mut StdRng::seed_from_u64(3));
        let b = generate_minibatch_indices(50, 10, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
