use std::collections::VecDeque;

use crate::transition::Transition;

/// Fixed-capacity experience buffer. When full, pushing evicts the oldest
/// transition.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    capacity: usize,
    items: VecDeque<Transition>,
}

impl ReplayBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay capacity must be positive");
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(transition);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.items.iter()
    }

    /// Draws `min(n, len)` distinct transitions uniformly at random.
    #[must_use]
    pub fn sample(&self, n: usize, rng: &mut fastrand::Rng) -> Vec<Transition> {
        let n = n.min(self.items.len());
        let mut indices: Vec<usize> = (0..self.items.len()).collect();
        // Partial Fisher-Yates: the first n slots end up a uniform sample.
        for i in 0..n {
            let j = rng.usize(i..indices.len());
            indices.swap(i, j);
        }
        indices[..n].iter().map(|&i| self.items[i].clone()).collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(reward: f64) -> Transition {
        Transition {
            observation: vec![],
            action: vec![],
            reward,
            next_observation: vec![],
            done: false,
            truncated: false,
        }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buffer = ReplayBuffer::new(3);
        for r in 0..5 {
            buffer.push(tagged(f64::from(r)));
        }
        let rewards: Vec<f64> = buffer.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.len(), buffer.capacity());
    }

    #[test]
    fn sample_is_distinct_and_seeded() {
        let mut buffer = ReplayBuffer::new(50);
        for r in 0..50 {
            buffer.push(tagged(f64::from(r)));
        }
        let draw = |seed| {
            let mut rng = fastrand::Rng::with_seed(seed);
            buffer.sample(20, &mut rng).iter().map(|t| t.reward).collect::<Vec<_>>()
        };
        let a = draw(9);
        assert_eq!(a, draw(9));
        let mut sorted = a.clone();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();
        assert_eq!(sorted.len(), 20);
    }

    #[test]
    fn oversized_sample_returns_everything() {
        let mut buffer = ReplayBuffer::new(4);
        buffer.push(tagged(1.0));
        buffer.push(tagged(2.0));
        let mut rng = fastrand::Rng::with_seed(0);
        assert_eq!(buffer.sample(10, &mut rng).len(), 2);
    }
}
