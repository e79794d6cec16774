/// A fully connected neural network layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Dense {
    /// The weight matrix, `out_dim x in_dim`, row-major.
    pub w: Vec<f64>,
    /// The bias vector.
    pub b: Vec<f64>,
    /// The number of input dimensions.
    pub in_dim: usize,
    /// The number of output dimensions.
    pub out_dim: usize,
}

/// Gradient buffers shaped like a [`Dense`] layer.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseGrad {
    pub w: Vec<f64>,
    pub b: Vec<f64>,
}

impl Dense {
    /// Creates a new `Dense` layer with the given weights and biases.
    ///
    /// # Panics
    ///
    /// Panics if the buffer lengths do not match the dimensions.
    #[must_use]
    pub fn new(weights: Vec<f64>, bias: Vec<f64>, in_dim: usize, out_dim: usize) -> Self {
        assert_eq!(weights.len(), in_dim * out_dim);
        assert_eq!(bias.len(), out_dim);
        Self {
            w: weights,
            b: bias,
            in_dim,
            out_dim,
        }
    }

    /// Glorot-uniform weights scaled by `gain`, zero bias.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn glorot(in_dim: usize, out_dim: usize, gain: f64, rng: &mut fastrand::Rng) -> Self {
        let limit = gain * (6.0 / (in_dim + out_dim) as f64).sqrt();
        let weights = (0..in_dim * out_dim)
            .map(|_| (rng.f64() * 2.0 - 1.0) * limit)
            .collect();
        Self::new(weights, vec![0.0; out_dim], in_dim, out_dim)
    }

    #[must_use]
    pub fn zeros(in_dim: usize, out_dim: usize) -> Self {
        Self::new(vec![0.0; in_dim * out_dim], vec![0.0; out_dim], in_dim, out_dim)
    }

    /// Performs the forward pass through the layer.
    #[must_use]
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.in_dim, "input size");
        (0..self.out_dim)
            .map(|o| {
                let row = &self.w[o * self.in_dim..(o + 1) * self.in_dim];
                row.iter().zip(x).fold(self.b[o], |acc, (w, xi)| w.mul_add(*xi, acc))
            })
            .collect()
    }

    /// Accumulates parameter gradients for one sample into `grads` and
    /// returns the gradient with respect to the input.
    pub fn backward(&self, x: &[f64], grad_out: &[f64], grads: &mut DenseGrad) -> Vec<f64> {
        let mut grad_input = vec![0.0; self.in_dim];
        for (o, &go) in grad_out.iter().enumerate() {
            let row = o * self.in_dim..(o + 1) * self.in_dim;
            for (((gw, &w), &xi), gi) in grads.w[row.clone()].iter_mut().zip(&self.w[row]).zip(x).zip(&mut grad_input) {
                *gw += go * xi;
                *gi += w * go;
            }
            grads.b[o] += go;
        }
        grad_input
    }

    #[must_use]
    pub fn zero_grad(&self) -> DenseGrad {
        DenseGrad {
            w: vec![0.0; self.w.len()],
            b: vec![0.0; self.b.len()],
        }
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.w.iter().chain(&self.b).all(|v| v.is_finite())
    }
}

/// One tanh hidden layer followed by a linear output layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Mlp {
    pub hidden: Dense,
    pub out: Dense,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MlpGrad {
    pub hidden: DenseGrad,
    pub out: DenseGrad,
}

impl MlpGrad {
    /// Buffers in the order of [`Mlp::params_mut`].
    pub fn buffers_mut(&mut self) -> [&mut Vec<f64>; 4] {
        [&mut self.hidden.w, &mut self.hidden.b, &mut self.out.w, &mut self.out.b]
    }

    #[must_use]
    pub fn buffers(&self) -> [&[f64]; 4] {
        [&self.hidden.w, &self.hidden.b, &self.out.w, &self.out.b]
    }
}

impl Mlp {
    /// Glorot-initialized hidden layer; the output layer is scaled by
    /// `out_gain`, so `0.0` gives an all-zero output at initialization.
    #[must_use]
    pub fn new(in_dim: usize, hidden: usize, out_dim: usize, out_gain: f64, rng: &mut fastrand::Rng) -> Self {
        let hidden_layer = Dense::glorot(in_dim, hidden, 1.0, rng);
        let out = if out_gain == 0.0 {
            Dense::zeros(hidden, out_dim)
        } else {
            Dense::glorot(hidden, out_dim, out_gain, rng)
        };
        Self {
            hidden: hidden_layer,
            out,
        }
    }

    #[must_use]
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        self.forward_cached(x).0
    }

    /// Returns the output and the hidden activations needed by
    /// [`Mlp::backward`].
    #[must_use]
    pub fn forward_cached(&self, x: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let h: Vec<f64> = self.hidden.forward(x).into_iter().map(f64::tanh).collect();
        (self.out.forward(&h), h)
    }

    pub fn backward(&self, x: &[f64], h: &[f64], grad_out: &[f64], grads: &mut MlpGrad) {
        let grad_h = self.out.backward(h, grad_out, &mut grads.out);
        let grad_pre: Vec<f64> = grad_h.iter().zip(h).map(|(g, t)| g * (1.0 - t * t)).collect();
        self.hidden.backward(x, &grad_pre, &mut grads.hidden);
    }

    #[must_use]
    pub fn zero_grad(&self) -> MlpGrad {
        MlpGrad {
            hidden: self.hidden.zero_grad(),
            out: self.out.zero_grad(),
        }
    }

    pub fn params_mut(&mut self) -> [&mut Vec<f64>; 4] {
        [&mut self.hidden.w, &mut self.hidden.b, &mut self.out.w, &mut self.out.b]
    }

    #[must_use]
    pub fn param_sizes(&self) -> [usize; 4] {
        [self.hidden.w.len(), self.hidden.b.len(), self.out.w.len(), self.out.b.len()]
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.hidden.is_finite() && self.out.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loss(mlp: &Mlp, x: &[f64]) -> f64 {
        mlp.forward(x).iter().sum()
    }

    #[test]
    fn dense_forward_matches_manual() {
        let layer = Dense::new(vec![1.0, 2.0, 3.0, 4.0], vec![0.5, -0.5], 2, 2);
        assert_eq!(layer.forward(&[1.0, -1.0]), vec![-0.5, -1.5]);
    }

    #[test]
    fn mlp_backward_matches_finite_differences() {
        let mut rng = fastrand::Rng::with_seed(0);
        let mlp = Mlp::new(3, 5, 2, 1.0, &mut rng);
        let x = [0.9, -0.1, 0.3];
        let (y, h) = mlp.forward_cached(&x);
        let mut grads = mlp.zero_grad();
        mlp.backward(&x, &h, &vec![1.0; y.len()], &mut grads);

        let eps = 1e-6;
        for (buffer, analytic) in [(0usize, &grads.hidden.w), (2, &grads.out.w)] {
            for (i, &expected) in analytic.iter().enumerate() {
                let mut plus = mlp.clone();
                plus.params_mut()[buffer][i] += eps;
                let mut minus = mlp.clone();
                minus.params_mut()[buffer][i] -= eps;
                let numeric = (loss(&plus, &x) - loss(&minus, &x)) / (2.0 * eps);
                let diff = (numeric - expected).abs();
                assert!(diff < 1e-6, "buffer {buffer} weight {i}: numeric {numeric}, analytic {expected}");
            }
        }
    }

    #[test]
    fn zero_output_gain_gives_zero_output() {
        let mut rng = fastrand::Rng::with_seed(1);
        let mlp = Mlp::new(4, 8, 1, 0.0, &mut rng);
        assert_eq!(mlp.forward(&[1.0, 2.0, 3.0, 4.0]), vec![0.0]);
    }
}
