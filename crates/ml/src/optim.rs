/// Adam optimizer over a fixed list of parameter buffers.
#[derive(Clone, Debug)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: i32,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    /// `sizes` lists the length of every parameter buffer, in the order the
    /// buffers will be passed to [`Adam::step`].
    #[must_use]
    pub fn new(sizes: &[usize], lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: sizes.iter().map(|&n| vec![0.0; n]).collect(),
            v: sizes.iter().map(|&n| vec![0.0; n]).collect(),
        }
    }

    pub fn step(&mut self, params: &mut [&mut Vec<f64>], grads: &[&[f64]]) {
        assert_eq!(params.len(), self.m.len(), "parameter list changed size");
        assert_eq!(grads.len(), self.m.len(), "gradient list changed size");
        self.t = self.t.saturating_add(1);
        let correction1 = 1.0 - self.beta1.powi(self.t);
        let correction2 = 1.0 - self.beta2.powi(self.t);
        let lr_t = self.lr * correction2.sqrt() / correction1;

        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.eps);
        for ((p, grad), (m, v)) in params.iter_mut().zip(grads).zip(self.m.iter_mut().zip(&mut self.v)) {
            for (((x, &g), m), v) in p.iter_mut().zip(grad.iter()).zip(m.iter_mut()).zip(v.iter_mut()) {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g.powi(2);
                *x -= lr_t * *m / (v.sqrt() + eps);
            }
        }
    }
}

/// Scales all gradients together so their joint L2 norm is at most
/// `max_norm`. Returns the norm before scaling.
pub fn clip_global_norm(grads: &mut [&mut Vec<f64>], max_norm: f64) -> f64 {
    let norm = grads
        .iter()
        .flat_map(|g| g.iter())
        .map(|x| x * x)
        .sum::<f64>()
        .sqrt();
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        for g in grads.iter_mut() {
            for x in g.iter_mut() {
                *x *= scale;
            }
        }
    }
    norm
}
