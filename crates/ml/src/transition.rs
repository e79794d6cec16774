use serde::{Deserialize, Serialize};

/// One `(s, a, r, s', done)` record produced by a single environment step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub observation: Vec<f64>,
    /// The action the agent proposed, before any clipping by the environment.
    pub action: Vec<f64>,
    pub reward: f64,
    pub next_observation: Vec<f64>,
    pub done: bool,
    /// The episode ended on its time limit rather than a terminal state.
    pub truncated: bool,
}

impl Transition {
    /// `true` when the next state has no future value: the episode ended for
    /// a reason other than the time limit.
    #[must_use]
    pub fn terminal(&self) -> bool {
        self.done && !self.truncated
    }
}
