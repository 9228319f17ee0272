use proptest::prelude::*;
use servotune::{
    default_arms, Arm, ArmRegistry, Policy, PolicyEngine, StatsConfig,
};

fn engine_with(policy: Policy, epsilon: f64, seed: u64) -> PolicyEngine {
    let reg = ArmRegistry::new(default_arms()).unwrap();
    PolicyEngine::with_seed(reg, policy, epsilon, StatsConfig::default(), seed)
}

#[test]
fn untried_arms_report_zero_trials_and_no_average() {
    let mut e = engine_with(Policy::Ucb1, 0.0, 0);
    // Try only the first two arms.
    for _ in 0..2 {
        let arm = e.select_arm();
        e.update(arm, 20.0);
    }
    let snap = e.snapshot();
    for row in &snap.arms {
        if row.trials == 0 {
            assert_eq!(row.avg_reward, None);
        } else {
            assert!(row.avg_reward.is_some());
        }
    }
    assert_eq!(snap.arms.iter().filter(|a| a.trials == 0).count(), 2);
}

#[test]
fn ucb1_covers_every_arm_within_the_first_k_selections() {
    // Holds for any seed: untried arms score infinite.
    for seed in 0..32u64 {
        let mut e = engine_with(Policy::Ucb1, 0.0, seed);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..4 {
            let arm = e.select_arm();
            seen.insert(arm);
            e.update(arm, 10.0 + seed as f64);
        }
        assert_eq!(seen.len(), 4, "seed {seed}: some arm was starved");
    }
}

#[test]
fn epsilon_zero_always_returns_the_best_mean_once_all_arms_have_data() {
    let mut e = engine_with(Policy::EpsilonGreedy, 0.0, 3);
    let best = Arm { batch: 16, workers: 2 };
    for arm in default_arms() {
        let lat = if arm == best { 5.0 } else { 50.0 };
        e.update(arm, lat);
    }
    for _ in 0..25 {
        let chosen = e.select_arm();
        assert_eq!(chosen, best);
        e.update(chosen, 5.0);
    }
}

#[test]
fn disabled_engine_returns_the_same_arm_five_times_without_consuming_rounds() {
    let mut e = engine_with(Policy::Thompson, 0.0, 11);
    let arm = e.select_arm();
    e.update(arm, 18.0);
    let t = e.snapshot().t;
    e.set_enabled(false);
    let frozen: Vec<Arm> = (0..5).map(|_| e.select_arm()).collect();
    assert!(frozen.iter().all(|a| *a == arm));
    assert_eq!(e.snapshot().t, t);
}

proptest! {
    /// Every recorded latency decreases the arm's reward sum by exactly that
    /// latency, for any policy and any latency stream.
    #[test]
    fn reward_sum_is_negated_latency_sum(
        seed in any::<u64>(),
        latencies in proptest::collection::vec(0.1f64..10_000.0, 1..200),
    ) {
        let mut e = engine_with(Policy::Ucb1, 0.0, seed);
        let mut expected: std::collections::HashMap<Arm, (u64, f64)> =
            std::collections::HashMap::new();
        for lat in &latencies {
            let arm = e.select_arm();
            e.update(arm, *lat);
            let entry = expected.entry(arm).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += lat;
        }
        let snap = e.snapshot();
        for row in &snap.arms {
            let (trials, lat_sum) = expected.get(&row.arm).copied().unwrap_or((0, 0.0));
            prop_assert_eq!(row.trials, trials);
            match row.avg_reward {
                Some(avg) => {
                    let expected_avg = -lat_sum / trials as f64;
                    prop_assert!((avg - expected_avg).abs() < 1e-9);
                }
                None => prop_assert_eq!(trials, 0),
            }
        }
    }

    /// Selection always yields a registry member and total trials equal the
    /// number of updates, under every policy.
    #[test]
    fn trials_are_conserved_under_any_policy(
        seed in any::<u64>(),
        policy_idx in 0usize..3,
        steps in 1usize..300,
    ) {
        let policy = [Policy::EpsilonGreedy, Policy::Ucb1, Policy::Thompson][policy_idx];
        let arms = default_arms();
        let mut e = engine_with(policy, 0.2, seed);
        for step in 0..steps {
            let arm = e.select_arm();
            prop_assert!(arms.contains(&arm));
            e.update(arm, 10.0 + (step % 7) as f64);
        }
        let snap = e.snapshot();
        let total: u64 = snap.arms.iter().map(|a| a.trials).sum();
        prop_assert_eq!(total, steps as u64);
        prop_assert_eq!(snap.t, steps as u64);
    }

    /// Same seed + same reward stream → identical selection sequence.
    #[test]
    fn policies_are_deterministic_given_a_seed(
        seed in any::<u64>(),
        policy_idx in 0usize..3,
        latencies in proptest::collection::vec(1.0f64..500.0, 1..100),
    ) {
        let policy = [Policy::EpsilonGreedy, Policy::Ucb1, Policy::Thompson][policy_idx];
        let mut e1 = engine_with(policy, 0.3, seed);
        let mut e2 = engine_with(policy, 0.3, seed);
        for lat in &latencies {
            let a1 = e1.select_arm();
            let a2 = e2.select_arm();
            prop_assert_eq!(a1, a2);
            e1.update(a1, *lat);
            e2.update(a2, *lat);
        }
    }
}
