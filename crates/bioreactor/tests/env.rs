use bioreactor::{EnvConfig, FermentationEnv, StepInfo, Termination};
use kinetics::{Control, Kinetics, StateLayout};
use ml::{Bounds, EpisodeEnd, Env, Step};

fn short_batch(horizon: usize) -> EnvConfig {
    EnvConfig {
        horizon,
        ..EnvConfig::default()
    }
}

fn run_episode(env: &mut FermentationEnv, seed: u64, action: &[f64]) -> Vec<Step<StepInfo>> {
    env.reset(Some(seed));
    let mut steps = Vec::new();
    loop {
        let step = env.step(action);
        let done = step.done();
        steps.push(step);
        if done {
            return steps;
        }
    }
}

#[test]
fn in_and_out_of_bounds_actions_never_fail() {
    let mut env = FermentationEnv::new(short_batch(6)).unwrap();
    let obs = env.reset(Some(3));
    assert_eq!(obs.len(), env.observation_size());

    let actions: [&[f64]; 6] = [
        &[0.0, 25.0, 4.0],
        &[0.02, 30.0, 5.0],
        &[-1.0, 100.0, -3.0],
        &[f64::NAN, 20.0, 4.0],
        &[0.01],
        &[0.01, 20.0, 4.0, 9.0],
    ];
    for action in actions {
        let step = env.step(action);
        assert_eq!(step.observation.len(), env.observation_size());
        assert!(step.reward.is_finite(), "{action:?} -> {}", step.reward);
        let Control { feed_rate, temperature, ph } = step.info.control;
        assert!((0.0..=0.05).contains(&feed_rate));
        assert!((15.0..=35.0).contains(&temperature));
        assert!((3.0..=6.0).contains(&ph));
        assert!(step.info.state.iter().all(|x| x.is_finite() && *x >= 0.0));
    }
}

#[test]
fn clipping_is_reported_and_penalized() {
    let mut env = FermentationEnv::new(short_batch(3)).unwrap();
    env.reset(Some(1));
    let inside = env.step(&[0.0, 25.0, 4.5]);
    assert!(!inside.info.clipped);
    assert_eq!(inside.info.breakdown.clip_penalty, 0.0);

    env.reset(Some(1));
    let outside = env.step(&[0.0, 45.0, 4.5]);
    assert!(outside.info.clipped);
    assert!(outside.info.breakdown.clip_penalty < 0.0);
    assert_eq!(outside.info.control.temperature, 35.0);
}

#[test]
fn horizon_ends_episode_exactly() {
    for horizon in [1, 4, 7] {
        let mut env = FermentationEnv::new(short_batch(horizon)).unwrap();
        let steps = run_episode(&mut env, 0, &[0.0, 28.0, 4.5]);
        assert_eq!(steps.len(), horizon);
        let last = steps.last().unwrap();
        assert_eq!(last.end, Some(EpisodeEnd::Truncated));
        assert_eq!(last.info.termination, Some(Termination::Horizon));
        assert_eq!(last.info.step, horizon);
        assert!((last.info.time - 2.0 * horizon as f64).abs() < 1e-9);
        assert!(steps[..horizon - 1].iter().all(|s| !s.done()));
    }
}

#[test]
fn stepping_after_done_is_a_terminal_noop() {
    let mut env = FermentationEnv::new(short_batch(1)).unwrap();
    env.reset(Some(0));
    let last = env.step(&[0.0, 28.0, 4.5]);
    assert!(last.truncated());
    let state = env.state().to_vec();

    let extra = env.step(&[0.05, 28.0, 4.5]);
    assert_eq!(extra.reward, 0.0);
    assert_eq!(extra.end, Some(EpisodeEnd::Truncated));
    assert_eq!(env.state(), state.as_slice());
    assert_eq!(env.step_count(), 1);

    env.reset(None);
    assert_eq!(env.step_count(), 0);
    assert!(env.termination().is_none());
}

#[test]
fn reset_with_seed_is_reproducible() {
    let mut a = FermentationEnv::new(EnvConfig::default()).unwrap();
    let mut b = FermentationEnv::new(EnvConfig::default()).unwrap();
    assert_eq!(a.reset(Some(42)), b.reset(Some(42)));
    assert_eq!(a.state(), b.state());
    let first = a.state().to_vec();
    a.reset(Some(43));
    assert_ne!(a.state(), first.as_slice());

    for (i, (x, range)) in a.state().iter().zip(a.config().initial.ranges()).enumerate() {
        assert!(range.low <= *x && *x <= range.high, "component {i}: {x} outside {range:?}");
    }
}

#[test]
fn fixed_initial_state_uses_midpoints() {
    let mut config = EnvConfig::default();
    config.initial.randomize = false;
    let mut env = FermentationEnv::new(config).unwrap();
    env.reset(Some(9));
    let expected = [0.2, 0.03, 100.0, 3.0, 0.0, 1.0];
    for (x, e) in env.state().iter().zip(expected) {
        assert!((x - e).abs() < 1e-12, "{x} vs {e}");
    }
}

#[test]
fn episodes_are_deterministic_per_seed() {
    let mut config = EnvConfig::default();
    config.observation.noise_std = 0.02;
    config.horizon = 10;
    let mut env = FermentationEnv::new(config).unwrap();
    let first: Vec<f64> = run_episode(&mut env, 5, &[0.01, 27.0, 4.2]).iter().map(|s| s.reward).collect();
    let second: Vec<f64> = run_episode(&mut env, 5, &[0.01, 27.0, 4.2]).iter().map(|s| s.reward).collect();
    assert_eq!(first, second);
}

#[test]
fn overfeeding_overflows_the_vessel() {
    let mut config = EnvConfig::default();
    config.feasibility.max_volume = 1.15;
    let mut env = FermentationEnv::new(config).unwrap();
    let steps = run_episode(&mut env, 0, &[0.05, 28.0, 4.5]);
    let last = steps.last().unwrap();
    assert_eq!(last.info.termination, Some(Termination::VolumeOverflow));
    assert!(matches!(last.end, Some(EpisodeEnd::Terminal { .. })));
    assert!(last.info.breakdown.infeasible_penalty < 0.0);
    // 0.1 L per decision: 1.1 L after the first, 1.2 L after the second.
    assert_eq!(steps.len(), 2);
}

#[test]
fn product_forms_during_batch_growth() {
    let mut env = FermentationEnv::new(short_batch(10)).unwrap();
    let steps = run_episode(&mut env, 2, &[0.0, 28.0, 4.5]);
    let p = env.layout().product();
    assert!(steps.last().unwrap().info.state[p] > 0.0);
    assert!(steps.iter().all(|s| s.info.breakdown.productivity >= 0.0));
}

/// Blows up as soon as any biomass is present.
#[derive(Debug)]
struct Unstable;

impl Kinetics for Unstable {
    fn layout(&self) -> StateLayout {
        StateLayout::new(2, 2)
    }

    fn derivative_into(&self, state: &[f64], _control: &Control, out: &mut [f64]) {
        out.fill(0.0);
        out[0] = if state[0] > 0.0 { f64::INFINITY } else { 0.0 };
    }
}

#[test]
fn numerical_failure_is_abnormal_and_keeps_last_state() {
    let mut env = FermentationEnv::with_model(EnvConfig::default(), Unstable).unwrap();
    env.reset(Some(0));
    let initial = env.state().to_vec();

    let step = env.step(&[0.0, 25.0, 4.5]);
    assert!(step.abnormal());
    assert!(matches!(
        step.info.termination,
        Some(Termination::NumericalFailure { substep: Some(0), .. })
    ));
    assert_eq!(step.info.state, initial);
    assert_eq!(step.info.time, 0.0);
    assert!(step.reward.is_finite());
    assert!(step.info.breakdown.failure_penalty < 0.0);

    let again = env.step(&[0.0, 25.0, 4.5]);
    assert!(again.abnormal());
    assert_eq!(again.reward, 0.0);
}

#[test]
fn layout_mismatch_is_rejected() {
    #[derive(Debug)]
    struct OneSpecies;
    impl Kinetics for OneSpecies {
        fn layout(&self) -> StateLayout {
            StateLayout::new(1, 1)
        }
        fn derivative_into(&self, _state: &[f64], _control: &Control, out: &mut [f64]) {
            out.fill(0.0);
        }
    }
    let err = FermentationEnv::with_model(EnvConfig::default(), OneSpecies).unwrap_err();
    assert_eq!(err.field, "kinetics");
}

#[test]
fn config_round_trips_through_json() {
    let mut config = EnvConfig::default();
    config.horizon = 12;
    config.actions.feed_rate = Bounds::new(0.0, 0.1);
    config.observation.include_time = true;
    let json = serde_json::to_string_pretty(&config).unwrap();
    let back: EnvConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);

    let env = FermentationEnv::new(back).unwrap();
    assert_eq!(env.observation_size(), 7);
    assert_eq!(env.action_bounds()[0], Bounds::new(0.0, 0.1));
}
