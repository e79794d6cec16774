use approx::assert_abs_diff_eq;
use kinetics::{
    Control, Integrator, IntegratorConfig, KineticParams, Kinetics, MixedCultureModel, Scheme,
};

fn two_species() -> MixedCultureModel {
    MixedCultureModel::new(KineticParams::two_species_example()).unwrap()
}

fn wine() -> MixedCultureModel {
    MixedCultureModel::new(KineticParams::wine_like()).unwrap()
}

fn integrate_in_steps(integrator: &Integrator, model: &MixedCultureModel, y0: &[f64], total: f64, n: usize) -> Vec<f64> {
    let dt = total / n as f64;
    let control = Control::batch(30.0, 5.5);
    let mut y = y0.to_vec();
    for _ in 0..n {
        y = integrator.integrate(model, &y, &control, dt).unwrap();
    }
    y
}

fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[test]
fn integrate_is_bit_deterministic() {
    let model = wine();
    let integrator = Integrator::rk4(0.05);
    let control = Control { feed_rate: 0.02, temperature: 24.0, ph: 4.1 };
    let state = [0.25, 0.03, 110.0, 3.2, 0.4, 1.0];
    let a = integrator.integrate(&model, &state, &control, 0.37).unwrap();
    let b = integrator.integrate(&model, &state, &control, 0.37).unwrap();
    assert_eq!(
        a.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
        b.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
    );
}

#[test]
fn rk4_error_shrinks_with_fourth_order() {
    let model = two_species();
    let integrator = Integrator::rk4(0.1);
    let y0 = [0.1, 0.1, 10.0, 0.0, 1.0];
    let total = 2.0;
    let reference = integrate_in_steps(&integrator, &model, &y0, total, 2048);

    let errors: Vec<f64> = [1, 2, 4, 8, 16, 32]
        .iter()
        .map(|&n| max_abs_diff(&integrate_in_steps(&integrator, &model, &y0, total, n), &reference))
        .collect();

    for pair in errors.windows(2) {
        assert!(pair[1] < pair[0], "error did not shrink: {errors:?}");
    }
    let ratio = errors[4] / errors[5];
    assert!(ratio > 8.0, "expected ~16x reduction per halving, got {ratio} ({errors:?})");
}

#[test]
fn euler_converges_at_first_order() {
    let model = two_species();
    let integrator = Integrator::new(IntegratorConfig {
        scheme: Scheme::Euler,
        ..IntegratorConfig::default()
    })
    .unwrap();
    let rk4 = Integrator::rk4(0.1);
    let y0 = [0.1, 0.1, 10.0, 0.0, 1.0];
    let reference = integrate_in_steps(&rk4, &model, &y0, 2.0, 2048);
    let coarse = max_abs_diff(&integrate_in_steps(&integrator, &model, &y0, 2.0, 64), &reference);
    let fine = max_abs_diff(&integrate_in_steps(&integrator, &model, &y0, 2.0, 128), &reference);
    let ratio = coarse / fine;
    assert!((1.5..2.5).contains(&ratio), "ratio {ratio}");
}

#[test]
fn last_substep_is_shortened_to_end_on_the_interval() {
    let model = two_species();
    let integrator = Integrator::rk4(0.05);
    let control = Control::batch(30.0, 5.5);
    let y0 = [0.1, 0.1, 10.0, 0.0, 1.0];

    let traj = integrator.trajectory(&model, &y0, &control, 0.0, 0.12).unwrap();
    assert_eq!(traj.len(), 4);
    for (t, expected) in traj.times().iter().zip([0.0, 0.05, 0.1, 0.12]) {
        assert_abs_diff_eq!(*t, expected, epsilon = 1e-12);
    }
    let layout = model.layout();
    assert_eq!(traj.column(layout.volume()), vec![1.0; 4]);
    let substrate = traj.column(layout.substrate(0));
    assert!(substrate.windows(2).all(|w| w[1] < w[0]), "{substrate:?}");

    let coarse = integrator.advance(&model, &y0, &control, 0.12).unwrap();
    assert_eq!(traj.final_state().unwrap(), coarse.as_slice());
    let fine = integrate_in_steps(&integrator, &model, &y0, 0.12, 120);
    assert!(max_abs_diff(&coarse, &fine) < 1e-8, "{coarse:?} vs {fine:?}");
}

#[test]
fn overshoot_is_floored_to_zero() {
    let model = two_species();
    let integrator = Integrator::new(IntegratorConfig {
        scheme: Scheme::Euler,
        dt: 1.0,
        floor: 1e-12,
    })
    .unwrap();
    let next = integrator
        .integrate(&model, &[10.0, 10.0, 0.1, 0.0, 1.0], &Control::batch(30.0, 5.5), 1.0)
        .unwrap();
    assert_eq!(next[2], 0.0);
    assert!(next.iter().all(|v| *v >= 0.0));
}

/// Substrate-limited batch culture without inhibition: biomass rises and
/// substrate falls monotonically until the substrate is (nearly) gone.
#[test]
fn batch_culture_grows_until_substrate_runs_out() {
    let model = two_species();
    let integrator = Integrator::rk4(0.05);
    let layout = model.layout();
    let control = Control::batch(30.0, 5.5);
    let trajectory = integrator
        .trajectory(&model, &[0.05, 0.05, 20.0, 0.0, 1.0], &control, 0.0, 40.0)
        .unwrap();

    let states = trajectory.states();
    for pair in states.windows(2) {
        let (before, after) = (&pair[0], &pair[1]);
        assert!(layout.total_biomass(after) >= layout.total_biomass(before));
        assert!(after[layout.substrate(0)] <= before[layout.substrate(0)]);
        for i in layout.biomass() {
            assert!(after[i] >= before[i]);
        }
    }
    let last = trajectory.final_state().unwrap();
    assert!(last[layout.substrate(0)] < 1e-3, "substrate left: {}", last[2]);
    assert!(layout.total_biomass(last) > 8.0);
}

#[test]
fn fed_batch_volume_tracks_feed() {
    let model = wine();
    let integrator = Integrator::rk4(0.05);
    let control = Control { feed_rate: 0.01, temperature: 26.0, ph: 4.0 };
    let next = integrator
        .advance(&model, &[0.2, 0.02, 100.0, 3.0, 0.0, 1.0], &control, 10.0)
        .unwrap();
    assert!((next[5] - 1.1).abs() < 1e-9);
    assert!(next.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn parameters_load_from_json() {
    let params = KineticParams::wine_like();
    let json = serde_json::to_string(&params).unwrap();
    let back: KineticParams = serde_json::from_str(&json).unwrap();
    assert_eq!(back, params);
    assert!(MixedCultureModel::new(back).is_ok());

    let mut broken = serde_json::to_value(&params).unwrap();
    broken["species"][1]["yield_biomass"] = serde_json::json!(0.0);
    let broken: KineticParams = serde_json::from_value(broken).unwrap();
    assert!(MixedCultureModel::new(broken).is_err());
}
