use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

use super::layer::Layer;
use super::optimizer::RmsProp;

/// Inner potentials smaller than this (by magnitude) are snapped to zero.
pub const POTENTIAL_SNAP: f64 = 1e-14;

/// Whether a neuron computes an activation or is the constant bias unit of its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeuronKind {
    Regular,
    /// Output pinned to `1.0`. Never a target of gradients, but its outgoing
    /// weights are trained like any other.
    Bias,
}

/// Single unit of the network.
///
/// A neuron owns the weights of the edges *leaving* it: `weights[i]` connects it
/// to neuron `i` of the next layer. So, to compute its own potential, neuron `j`
/// reads `weights[j]` of every unit of the previous layer.
/// All per-weight vectors (`weights`, `accumulators`, `gradient_sums`) have the
/// same length, the number of regular neurons in the next layer.
#[derive(Debug, Clone)]
pub struct Neuron {
    kind: NeuronKind,

    /// Position inside its own layer, i.e. the column in the previous layer's weights.
    index: usize,

    weights: Box<[f64]>,

    /// RMSprop moving average of the squared gradient, one per weight.
    accumulators: Box<[f64]>,

    /// Weight gradients summed over the current mini-batch.
    gradient_sums: Box<[f64]>,

    potential: f64,
    output: f64,

    /// dL/d(potential)
    gradient: f64,

    dropout: f64,

    /// Factor applied to the activation on the last forward pass:
    /// `0` when dropped, `1 / (1 - p)` when kept under dropout, `1` otherwise.
    dropout_scale: f64,

    rng: StdRng,
}

impl Neuron {
    /// Returns a regular neuron with `fan_out` He-initialized outgoing weights.
    ///
    /// # Arguments
    /// * `fan_in` - number of regular neurons feeding the layer these weights lead to;
    /// * `fan_out` - number of outgoing weights (regular neurons in the next layer);
    /// * `index` - position of the neuron inside its layer;
    /// * `seed` - seed for this neuron's own generator (weights, then dropout draws).
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::Neuron;
    /// let neuron = Neuron::new(4, 3, 0, 42);
    /// assert_eq!(neuron.weights().len(), 3);
    /// assert!(neuron.gradient_sums().iter().all(|&g| g == 0.0));
    /// ```
    pub fn new(fan_in: usize, fan_out: usize, index: usize, seed: u64) -> Neuron {
        Neuron::build(NeuronKind::Regular, fan_in, fan_out, index, seed)
    }

    /// Returns the bias unit of a layer, its output is `1.0`.
    pub fn bias(fan_in: usize, fan_out: usize, index: usize, seed: u64) -> Neuron {
        let mut neuron = Neuron::build(NeuronKind::Bias, fan_in, fan_out, index, seed);
        neuron.output = 1.0;
        neuron
    }

    fn build(kind: NeuronKind, fan_in: usize, fan_out: usize, index: usize, seed: u64) -> Neuron {
        let mut rng = StdRng::seed_from_u64(seed);

        // He initialization: N(0, sqrt(2 / fan_in))
        let std_dev = (2.0 / fan_in.max(1) as f64).sqrt();
        let weights: Box<[f64]> = (0..fan_out)
            .map(|_| rng.sample::<f64, _>(StandardNormal) * std_dev)
            .collect();

        Neuron {
            kind,
            index,
            weights,
            accumulators: vec![0.0; fan_out].into_boxed_slice(),
            gradient_sums: vec![0.0; fan_out].into_boxed_slice(),
            potential: 0.0,
            output: 0.0,
            gradient: 0.0,
            dropout: 0.0,
            dropout_scale: 1.0,
            rng,
        }
    }

    pub fn kind(&self) -> NeuronKind {
        self.kind
    }

    pub fn is_bias(&self) -> bool {
        self.kind == NeuronKind::Bias
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn accumulators(&self) -> &[f64] {
        &self.accumulators
    }

    pub fn gradient_sums(&self) -> &[f64] {
        &self.gradient_sums
    }

    pub fn potential(&self) -> f64 {
        self.potential
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn gradient(&self) -> f64 {
        self.gradient
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    /// Input layer values and softmax outputs are written directly.
    pub(super) fn set_output(&mut self, value: f64) {
        if !self.is_bias() {
            self.output = value;
        }
    }

    pub(super) fn set_dropout(&mut self, probability: f64) {
        self.dropout = probability;
    }

    pub(super) fn set_weights(&mut self, weights: &[f64]) {
        self.weights.copy_from_slice(weights);
    }

    fn relu(x: f64) -> f64 {
        x.max(0.0)
    }

    fn relu_der(x: f64) -> f64 {
        if x > 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// Weighted sum of every unit of `prev_layer` (bias included) through the weights
    /// that lead to this neuron.
    pub fn compute_potential(&mut self, prev_layer: &Layer) {
        let sum: f64 = prev_layer
            .units()
            .map(|n| n.output * n.weights[self.index])
            .sum();

        self.potential = if sum.abs() < POTENTIAL_SNAP { 0.0 } else { sum };
    }

    /// ReLU of the stored potential.
    ///
    /// With `training` set and a non-zero dropout probability `p`, the neuron is
    /// dropped with probability `p` (potential and output become `0`); a kept
    /// neuron has its output scaled by `1 / (1 - p)`.
    pub fn compute_output(&mut self, training: bool) {
        self.dropout_scale = 1.0;

        if training && self.dropout > 0.0 {
            if self.rng.gen::<f64>() < self.dropout {
                self.potential = 0.0;
                self.output = 0.0;
                self.dropout_scale = 0.0;
                return;
            }
            self.dropout_scale = 1.0 / (1.0 - self.dropout);
        }

        self.output = Neuron::relu(self.potential) * self.dropout_scale;
    }

    /// Softmax + categorical cross-entropy gradient, valid only for that pairing.
    pub fn compute_output_gradient(&mut self, target: f64) {
        self.gradient = self.output - target;
    }

    /// Backpropagates gradients of the regular neurons of `next_layer` through this
    /// neuron's outgoing weights.
    pub fn compute_hidden_gradient(&mut self, next_layer: &Layer) {
        let sum: f64 = self
            .weights
            .iter()
            .zip(next_layer.neurons())
            .map(|(w, n)| w * n.gradient)
            .sum();

        self.gradient = sum * Neuron::relu_der(self.potential) * self.dropout_scale;
    }

    /// Adds this sample's gradient of each outgoing weight to the batch sums.
    pub fn accumulate_weight_gradients(&mut self, next_layer: &Layer) {
        let output = self.output;
        for (sum, n) in self.gradient_sums.iter_mut().zip(next_layer.neurons()) {
            *sum += n.gradient * output;
        }
    }

    /// Divides the batch sums by `batch_size`. Caller guarantees `batch_size > 0`.
    pub fn average_gradients(&mut self, batch_size: usize) {
        let n = batch_size as f64;
        for sum in self.gradient_sums.iter_mut() {
            *sum /= n;
        }
    }

    pub fn reset_gradients(&mut self) {
        for sum in self.gradient_sums.iter_mut() {
            *sum = 0.0;
        }
    }

    /// Applies one RMSprop step to every outgoing weight using the averaged gradients.
    pub fn update_weights(&mut self, optimizer: &RmsProp) {
        for ((w, acc), &g) in self
            .weights
            .iter_mut()
            .zip(self.accumulators.iter_mut())
            .zip(self.gradient_sums.iter())
        {
            *w += optimizer.step(acc, g);
        }
    }
}

/// Derives the seed of neuron `index` in layer `layer` from the master seed.
///
/// SplitMix64 finalizer over the mixed coordinates, so every neuron gets its own
/// stream regardless of how many neurons the other layers have.
pub fn derive_seed(master: u64, layer: usize, index: usize) -> u64 {
    let mut z = master
        .wrapping_add((layer as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((index as u64).wrapping_mul(0xD1B5_4A32_D192_ED03));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn layer_with_outputs(outputs: &[f64], fan_out: usize) -> Layer {
        let mut layer = Layer::new(0, outputs.len(), fan_out, 7);
        for (n, &o) in layer.neurons_mut().zip(outputs) {
            n.set_output(o);
        }
        layer
    }

    #[test]
    fn he_init_is_reproducible() {
        let a = Neuron::new(8, 16, 3, 1234);
        let b = Neuron::new(8, 16, 3, 1234);
        let c = Neuron::new(8, 16, 3, 4321);
        assert_eq!(a.weights(), b.weights());
        assert_ne!(a.weights(), c.weights());
        assert_eq!(a.accumulators().len(), 16);
        assert_eq!(a.gradient_sums().len(), 16);
    }

    #[test]
    fn he_init_spread_follows_fan_in() {
        let neuron = Neuron::new(50, 20_000, 0, 9);
        let n = neuron.weights().len() as f64;
        let mean = neuron.weights().iter().sum::<f64>() / n;
        let var = neuron.weights().iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n;

        assert_abs_diff_eq!(mean, 0.0, epsilon = 0.01);
        assert_abs_diff_eq!(var, 2.0 / 50.0, epsilon = 0.004);
    }

    #[test]
    fn bias_output_is_pinned() {
        let mut bias = Neuron::bias(3, 2, 3, 0);
        assert_eq!(bias.output(), 1.0);
        bias.set_output(0.25);
        assert_eq!(bias.output(), 1.0);
        assert!(bias.is_bias());
    }

    #[test]
    fn potential_reads_own_column_and_bias() {
        let mut prev = layer_with_outputs(&[1.0, 2.0], 2);
        prev.neuron_mut(0).set_weights(&[0.5, -1.0]);
        prev.neuron_mut(1).set_weights(&[0.25, 3.0]);
        prev.bias_mut().set_weights(&[0.1, 0.2]);

        let mut first = Neuron::new(2, 0, 0, 0);
        first.compute_potential(&prev);
        assert_abs_diff_eq!(first.potential(), 0.5 + 0.5 + 0.1, epsilon = 1e-12);

        let mut second = Neuron::new(2, 0, 1, 0);
        second.compute_potential(&prev);
        assert_abs_diff_eq!(second.potential(), -1.0 + 6.0 + 0.2, epsilon = 1e-12);
    }

    #[test]
    fn tiny_potential_snaps_to_zero() {
        let mut prev = layer_with_outputs(&[1e-8], 1);
        prev.neuron_mut(0).set_weights(&[1e-7]);
        prev.bias_mut().set_weights(&[0.0]);

        let mut neuron = Neuron::new(1, 0, 0, 0);
        neuron.compute_potential(&prev);
        assert_eq!(neuron.potential(), 0.0);
    }

    #[test]
    fn relu_output_and_hidden_gradient() {
        let mut next = layer_with_outputs(&[0.0, 0.0], 0);
        next.neuron_mut(0).gradient = 0.5;
        next.neuron_mut(1).gradient = -2.0;
        // the bias gradient must be ignored
        next.bias_mut().gradient = 100.0;

        let mut neuron = Neuron::new(1, 2, 0, 0);
        neuron.set_weights(&[2.0, 1.0]);

        neuron.potential = -0.3;
        neuron.compute_output(false);
        assert_eq!(neuron.output(), 0.0);
        neuron.compute_hidden_gradient(&next);
        assert_eq!(neuron.gradient(), 0.0);

        neuron.potential = 0.3;
        neuron.compute_output(false);
        assert_abs_diff_eq!(neuron.output(), 0.3, epsilon = 1e-12);
        neuron.compute_hidden_gradient(&next);
        assert_abs_diff_eq!(neuron.gradient(), 2.0 * 0.5 - 2.0, epsilon = 1e-12);
    }

    #[test]
    fn gradient_sums_accumulate_average_and_reset() {
        let mut next = layer_with_outputs(&[0.0, 0.0], 0);
        next.neuron_mut(0).gradient = 1.0;
        next.neuron_mut(1).gradient = -3.0;

        let mut neuron = Neuron::new(1, 2, 0, 0);
        neuron.output = 2.0;
        neuron.accumulate_weight_gradients(&next);
        neuron.output = 4.0;
        neuron.accumulate_weight_gradients(&next);
        assert_eq!(neuron.gradient_sums(), &[6.0, -18.0]);

        neuron.average_gradients(2);
        assert_eq!(neuron.gradient_sums(), &[3.0, -9.0]);

        neuron.reset_gradients();
        assert_eq!(neuron.gradient_sums(), &[0.0, 0.0]);
    }

    #[test]
    fn update_uses_rmsprop() {
        let optimizer = RmsProp::new(0.1);
        let mut neuron = Neuron::new(1, 1, 0, 0);
        neuron.set_weights(&[1.0]);
        neuron.gradient_sums[0] = 0.5;

        neuron.update_weights(&optimizer);

        let acc = 0.1 * 0.25;
        assert_abs_diff_eq!(neuron.accumulators()[0], acc, epsilon = 1e-12);
        assert_abs_diff_eq!(
            neuron.weights()[0],
            1.0 - 0.1 / (acc.sqrt() + 1e-8) * 0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn dropout_only_while_training() {
        let mut neuron = Neuron::new(1, 0, 0, 5);
        neuron.set_dropout(0.5);
        neuron.potential = 1.0;

        neuron.compute_output(false);
        assert_eq!(neuron.output(), 1.0);

        let mut dropped = 0;
        for _ in 0..1000 {
            neuron.potential = 1.0;
            neuron.compute_output(true);
            if neuron.output() == 0.0 {
                assert_eq!(neuron.potential(), 0.0);
                dropped += 1;
            } else {
                assert_abs_diff_eq!(neuron.output(), 2.0, epsilon = 1e-12);
            }
        }
        assert!(dropped > 400 && dropped < 600, "dropped {}", dropped);
    }

    #[test]
    fn dropout_scales_hidden_gradient() {
        let mut next = layer_with_outputs(&[0.0, 0.0], 0);
        next.neuron_mut(0).gradient = 0.5;
        next.neuron_mut(1).gradient = 0.25;

        let mut neuron = Neuron::new(1, 2, 0, 11);
        neuron.set_weights(&[2.0, -1.0]);
        neuron.set_dropout(0.75);
        let sum = 2.0 * 0.5 - 0.25;

        let (mut kept, mut dropped) = (false, false);
        for _ in 0..200 {
            neuron.potential = 0.4;
            neuron.compute_output(true);
            neuron.compute_hidden_gradient(&next);

            if neuron.output() == 0.0 {
                assert_eq!(neuron.gradient(), 0.0);
                dropped = true;
            } else {
                assert_abs_diff_eq!(neuron.output(), 0.4 * 4.0, epsilon = 1e-12);
                assert_abs_diff_eq!(neuron.gradient(), sum * 4.0, epsilon = 1e-12);
                kept = true;
            }
        }
        assert!(kept && dropped);

        // evaluation passes are unscaled
        neuron.potential = 0.4;
        neuron.compute_output(false);
        neuron.compute_hidden_gradient(&next);
        assert_abs_diff_eq!(neuron.gradient(), sum, epsilon = 1e-12);
    }

    #[test]
    fn derived_seeds_differ_per_coordinate() {
        let s = derive_seed(42, 1, 2);
        assert_eq!(s, derive_seed(42, 1, 2));
        assert_ne!(s, derive_seed(42, 2, 1));
        assert_ne!(s, derive_seed(43, 1, 2));
        assert_ne!(derive_seed(0, 0, 0), derive_seed(0, 0, 1));
    }
}
