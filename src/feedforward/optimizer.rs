/// RMSprop optimizer settings.
///
/// Every weight keeps its own moving average of the squared gradient
/// (see `Neuron`), this structure only carries the shared hyperparameters.
/// The update for a weight `w` with averaged gradient `g` and accumulator `a` is:
/// `a = decay * a + (1 - decay) * g^2`
/// `w -= learning_rate / (sqrt(a) + epsilon) * g`
///
/// # Examples
/// ```
/// # use bpnnet::feedforward::RmsProp;
/// let optimizer = RmsProp::new(0.001).with_decay(0.95);
/// assert_eq!(optimizer.learning_rate, 0.001);
/// assert_eq!(optimizer.epsilon, 1e-8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RmsProp {
    pub learning_rate: f64,
    pub decay: f64,
    pub epsilon: f64,
}

impl RmsProp {
    pub const DEFAULT_DECAY: f64 = 0.9;
    pub const DEFAULT_EPSILON: f64 = 1e-8;

    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            decay: Self::DEFAULT_DECAY,
            epsilon: Self::DEFAULT_EPSILON,
        }
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Folds `gradient` into `accumulator` and returns the weight change.
    pub(super) fn step(&self, accumulator: &mut f64, gradient: f64) -> f64 {
        *accumulator = self.decay * *accumulator + (1.0 - self.decay) * gradient * gradient;
        -(self.learning_rate / (accumulator.sqrt() + self.epsilon)) * gradient
    }
}

impl Default for RmsProp {
    fn default() -> Self {
        Self::new(0.001)
    }
}
