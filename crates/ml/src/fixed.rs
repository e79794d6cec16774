use crate::agent::{Agent, AgentError, Mode, UpdateMetrics};
use crate::env::Bounds;
use crate::transition::Transition;

/// Always proposes the same action and never learns.
///
/// Useful as a baseline ("do nothing" controller) and for checking that a
/// training pipeline is deterministic.
#[derive(Clone, Debug)]
pub struct FixedAgent {
    action: Vec<f64>,
    mode: Mode,
    updates: u64,
}

impl FixedAgent {
    #[must_use]
    pub fn new(action: Vec<f64>) -> Self {
        Self {
            action,
            mode: Mode::Training,
            updates: 0,
        }
    }

    /// The midpoint of every action bound.
    #[must_use]
    pub fn midpoint(bounds: &[Bounds]) -> Self {
        Self::new(bounds.iter().map(Bounds::mid).collect())
    }

    #[must_use]
    pub fn action(&self) -> &[f64] {
        &self.action
    }
}

impl Agent for FixedAgent {
    fn act(&self, _observation: &[f64], _rng: &mut fastrand::Rng) -> Vec<f64> {
        self.action.clone()
    }

    fn update(&mut self, batch: &[Transition]) -> Result<UpdateMetrics, AgentError> {
        if self.mode == Mode::Evaluation {
            return Err(AgentError::UpdateInEvaluation);
        }
        if batch.is_empty() {
            return Err(AgentError::EmptyBatch);
        }
        self.updates += 1;
        Ok(UpdateMetrics {
            update: self.updates,
            batch_size: batch.len(),
            ..UpdateMetrics::default()
        })
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
