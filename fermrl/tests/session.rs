use fermrl::app::{self, Controller};
use fermrl::RunConfig;
use rl::{Outcome, StopToken, UpdateSchedule};

fn small() -> RunConfig {
    RunConfig::from_json(r#"{ "env": { "horizon": 4 }, "trainer": { "episodes": 3, "log_every": 0 } }"#).unwrap()
}

#[test]
fn empty_json_is_the_default_configuration() {
    assert_eq!(RunConfig::from_json("{}").unwrap(), RunConfig::default());
}

#[test]
fn partial_sections_keep_other_defaults() {
    let config = RunConfig::from_json(
        r#"{
            "env": { "horizon": 12, "decision_interval": 1.0 },
            "agent": { "hidden": 8 },
            "trainer": { "episodes": 5, "schedule": { "every_n_steps": 4 } }
        }"#,
    )
    .unwrap();
    assert_eq!(config.env.horizon, 12);
    assert_eq!(config.env.integrator, RunConfig::default().env.integrator);
    assert_eq!(config.agent.hidden, 8);
    assert_eq!(config.agent.gamma, 0.99);
    assert_eq!(config.trainer.schedule, UpdateSchedule::EveryNSteps(4));
}

#[test]
fn malformed_json_is_an_error() {
    assert!(RunConfig::from_json(r#"{ "env": { "horizon": "long" } }"#).is_err());
    assert!(RunConfig::load("/nonexistent/fermrl.json").is_err());
}

#[test]
fn invalid_values_fail_at_construction() {
    let mut config = small();
    config.env.horizon = 0;
    let err = app::run(&config, Controller::ActorCritic, 0, &StopToken::new()).unwrap_err();
    assert!(err.to_string().contains("horizon"), "{err}");
}

#[test]
fn reseed_sets_every_seed() {
    let mut config = RunConfig::default();
    config.reseed(17);
    assert_eq!((config.env.seed, config.agent.seed, config.trainer.seed), (17, 17, 17));
}

#[test]
fn sessions_run_end_to_end() {
    let config = small();
    for controller in [Controller::ActorCritic, Controller::Baseline] {
        let session = app::run(&config, controller, 2, &StopToken::new()).unwrap();
        assert_eq!(session.report.outcome, Outcome::Completed);
        assert_eq!(session.report.episodes.len(), 3);
        assert_eq!(session.evaluation.len(), 2);
        assert!(session.mean_evaluation_return().is_some_and(f64::is_finite));
        app::finish(&session).unwrap();

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["report"]["outcome"]["status"], "completed");
    }
}

#[test]
fn a_stopped_token_cancels_before_the_first_episode() {
    let stop = StopToken::new();
    stop.request_stop();
    let session = app::run(&small(), Controller::Baseline, 2, &stop).unwrap();
    assert_eq!(session.report.outcome, Outcome::Cancelled);
    assert!(session.report.episodes.is_empty());
    assert!(session.evaluation.is_empty());
}
