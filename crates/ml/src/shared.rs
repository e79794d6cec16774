use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::agent::{Agent, AgentError, Mode, UpdateMetrics};
use crate::transition::Transition;

/// An agent shared between worker threads.
///
/// `act` holds the read lock for the whole forward pass, so every action is
/// computed from one consistent parameter set. `update` takes the write lock
/// and replaces the parameters in one go.
pub struct SharedAgent<A> {
    inner: Arc<RwLock<A>>,
}

impl<A> Clone for SharedAgent<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Agent> SharedAgent<A> {
    pub fn new(agent: A) -> Self {
        Self {
            inner: Arc::new(RwLock::new(agent)),
        }
    }

    pub fn act(&self, observation: &[f64], rng: &mut fastrand::Rng) -> Vec<f64> {
        self.inner.read().act(observation, rng)
    }

    /// # Errors
    ///
    /// Whatever the wrapped agent's update returns.
    pub fn update(&self, batch: &[Transition]) -> Result<UpdateMetrics, AgentError> {
        self.inner.write().update(batch)
    }

    pub fn mode(&self) -> Mode {
        self.inner.read().mode()
    }

    pub fn set_mode(&self, mode: Mode) {
        self.inner.write().set_mode(mode);
    }

    pub fn read(&self) -> RwLockReadGuard<'_, A> {
        self.inner.read()
    }

    /// Returns the agent if this is the last handle, or the handle back.
    ///
    /// # Errors
    ///
    /// Returns `self` when other clones are still alive.
    pub fn into_inner(self) -> Result<A, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FixedAgent;

    #[test]
    fn clones_share_state() {
        let shared = SharedAgent::new(FixedAgent::new(vec![1.0]));
        let other = shared.clone();
        other.set_mode(Mode::Evaluation);
        assert_eq!(shared.mode(), Mode::Evaluation);
        drop(other);
        let agent = shared.into_inner().ok().unwrap();
        assert_eq!(agent.mode(), Mode::Evaluation);
    }

    #[test]
    fn acts_from_many_threads() {
        let shared = SharedAgent::new(FixedAgent::new(vec![0.5, 2.0]));
        let handles: Vec<_> = (0..4)
            .map(|seed| {
                let agent = shared.clone();
                std::thread::spawn(move || {
                    let mut rng = fastrand::Rng::with_seed(seed);
                    agent.act(&[0.0], &mut rng)
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![0.5, 2.0]);
        }
    }
}
