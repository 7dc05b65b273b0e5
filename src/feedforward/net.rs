use thiserror::Error;
use tracing::trace;

use super::layer::Layer;
use super::optimizer::RmsProp;
use super::trainer::{TrainConfig, Trainer};

/// Outputs are floored to this value before taking their logarithm.
pub const LOG_FLOOR: f64 = 1e-6;

/// Smoothing factor of `Net::recent_average_loss`.
pub const RECENT_AVERAGE_SMOOTHING: f64 = 100.0;

/// Neural network structure
///
/// Layers are built once from the topology and never change shape afterwards.
/// Hidden layers use ReLU, the output layer is a softmax over all of its neurons,
/// and the loss is categorical cross-entropy.
///
/// Cross-layer access is always by index into `layers`: a neuron of layer `l`
/// only ever sees layer `l - 1` (forward) or layer `l + 1` (backward), borrowed
/// for the duration of a single call.
pub struct Net {
    /// The number of regular neurons in each layer.
    topology: Box<[usize]>,

    layers: Vec<Layer>,

    optimizer: RmsProp,

    /// Enables dropout on the forward pass.
    training: bool,

    /// Loss computed by the last `Net::back_prop`.
    loss: f64,

    recent_average_loss: f64,
}

impl Net {
    /// Returns network for given topology.
    /// Weights are He-initialized, each neuron from its own seed derived from `seed`.
    ///
    /// # Arguments
    /// * `topology` - a number slice that holds a desired number of neurons in each layer;
    /// * `optimizer` - RMSprop settings used by `Net::update_weights`;
    /// * `seed` - master seed.
    ///
    /// # Returns
    /// * `Ok(Net)` if there are at least two layers and none of them is empty;
    /// * `Err(NetError)` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::{Net, RmsProp};
    /// let net = Net::new(&[784, 128, 10], RmsProp::new(0.001), 42).unwrap();
    /// assert_eq!(net.layers().len(), 3);
    /// assert_eq!(net.layers()[1].len(), 129);
    ///
    /// assert!(Net::new(&[10], RmsProp::new(0.001), 42).is_err());
    /// assert!(Net::new(&[10, 0, 2], RmsProp::new(0.001), 42).is_err());
    /// ```
    pub fn new(topology: &[usize], optimizer: RmsProp, seed: u64) -> Result<Net, NetError> {
        if topology.len() < 2 {
            return Err(NetError::BadTopology(topology.len()));
        }
        if let Some(index) = topology.iter().position(|&size| size == 0) {
            return Err(NetError::EmptyLayer(index));
        }

        let layers = topology
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                // The last layer has no outgoing weights
                let fan_out = topology.get(i + 1).copied().unwrap_or(0);
                Layer::new(i, size, fan_out, seed)
            })
            .collect();

        trace!(?topology, seed, "network built");

        Ok(Net {
            topology: topology.to_owned().into_boxed_slice(),
            layers,
            optimizer,
            training: false,
            loss: 0.0,
            recent_average_loss: 0.0,
        })
    }

    pub fn topology(&self) -> &[usize] {
        &self.topology
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn optimizer(&self) -> &RmsProp {
        &self.optimizer
    }

    pub fn input_size(&self) -> usize {
        self.topology[0]
    }

    pub fn output_size(&self) -> usize {
        self.topology[self.topology.len() - 1]
    }

    fn output_layer(&self) -> &Layer {
        &self.layers[self.layers.len() - 1]
    }

    /// Switches dropout on (training) or off (evaluation).
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Sets the dropout probability of every neuron of hidden layer `layer`.
    ///
    /// # Returns
    /// * `Err(NetError::BadLayer)` if `layer` is the input or the output layer;
    /// * `Err(NetError::BadDropout)` if `probability` is not in `[0, 1)`.
    pub fn set_dropout(&mut self, layer: usize, probability: f64) -> Result<(), NetError> {
        let layers = self.layers.len();
        if layer == 0 || layer >= layers - 1 {
            return Err(NetError::BadLayer {
                index: layer,
                layers,
            });
        }
        if !(0.0..1.0).contains(&probability) {
            return Err(NetError::BadDropout(probability));
        }

        for neuron in self.layers[layer].neurons_mut() {
            neuron.set_dropout(probability);
        }
        Ok(())
    }

    /// Sets the same dropout probability on all hidden layers.
    pub fn set_hidden_dropout(&mut self, probability: f64) -> Result<(), NetError> {
        if !(0.0..1.0).contains(&probability) {
            return Err(NetError::BadDropout(probability));
        }
        for layer in 1..self.layers.len() - 1 {
            self.set_dropout(layer, probability)?;
        }
        Ok(())
    }

    /// Propagates `inputs` through the network.
    /// Read the outcome with `Net::results`.
    ///
    /// # Returns
    /// * `Ok(())` if `inputs` has exactly as many values as the input layer has neurons;
    /// * `Err(NetError::BadInputs)` otherwise, leaving the network untouched.
    pub fn feed_forward(&mut self, inputs: &[f64]) -> Result<(), NetError> {
        if inputs.len() != self.topology[0] {
            return Err(NetError::BadInputs(SizeMismatch {
                expected: self.topology[0],
                got: inputs.len(),
            }));
        }

        for (neuron, &value) in self.layers[0].neurons_mut().zip(inputs) {
            neuron.set_output(value);
        }

        let training = self.training;
        let output_layer = self.layers.len() - 1;

        for layer_num in 1..self.layers.len() {
            let (done, rest) = self.layers.split_at_mut(layer_num);
            let prev_layer = &done[layer_num - 1];
            let layer = &mut rest[0];

            for neuron in layer.neurons_mut() {
                neuron.compute_potential(prev_layer);
                if layer_num != output_layer {
                    neuron.compute_output(training);
                }
            }
        }

        self.softmax();
        Ok(())
    }

    /// Joint softmax over the potentials of the output layer.
    fn softmax(&mut self) {
        let output_layer = self.layers.len() - 1;
        let layer = &mut self.layers[output_layer];

        // Shifting by the maximum keeps exp() finite, the ratios are unchanged
        let max = layer
            .neurons()
            .map(|n| n.potential())
            .fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = layer.neurons().map(|n| (n.potential() - max).exp()).sum();

        for neuron in layer.neurons_mut() {
            let value = (neuron.potential() - max).exp() / sum;
            neuron.set_output(value);
        }
    }

    /// Outputs of the output layer (bias excluded), in order.
    pub fn results(&self) -> Vec<f64> {
        self.output_layer().outputs()
    }

    /// Calculates output of the network using given input.
    ///
    /// # Arguments
    /// * `inputs` - slice that holds activations of input neurons;
    /// * `outputs` - mutable slice that will be filled with activations of output neurons.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::{Net, RmsProp};
    /// let mut net = Net::new(&[4, 8, 3], RmsProp::new(0.01), 1).unwrap();
    /// let mut outputs = [0.0; 3];
    /// net.process(&[0.5, 0.1, 0.0, 1.0], &mut outputs).unwrap();
    /// assert!((outputs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    /// ```
    pub fn process(&mut self, inputs: &[f64], outputs: &mut [f64]) -> Result<(), NetError> {
        let output_size = self.output_size();
        if outputs.len() != output_size {
            return Err(NetError::BadOutputs(SizeMismatch {
                expected: output_size,
                got: outputs.len(),
            }));
        }

        self.feed_forward(inputs)?;
        for (o, n) in outputs.iter_mut().zip(self.output_layer().neurons()) {
            *o = n.output();
        }
        Ok(())
    }

    /// Feeds `inputs` forward and returns the index of the most probable class.
    pub fn predict(&mut self, inputs: &[f64]) -> Result<usize, NetError> {
        self.feed_forward(inputs)?;
        Ok(argmax(&self.results()).unwrap_or(0))
    }

    /// Calculates categorical cross-entropy of the outputs given the desired values.
    /// Implements the formula:
    /// `-sum(targets[i] * ln(max(outputs[i], 1e-6)))`
    ///
    /// # Returns
    /// * `Ok(f64)` if `outputs` and `targets` have the same size;
    /// * `SizeMismatch` otherwise.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::Net;
    /// let loss = Net::cross_entropy(&[0.5, 0.25, 0.25], &[0.0, 1.0, 0.0]).unwrap();
    /// assert!((loss - 4f64.ln()).abs() < 1e-12);
    /// ```
    pub fn cross_entropy(outputs: &[f64], targets: &[f64]) -> Result<f64, SizeMismatch> {
        if outputs.len() != targets.len() {
            return Err(SizeMismatch {
                expected: outputs.len(),
                got: targets.len(),
            });
        }

        Ok(-outputs
            .iter()
            .zip(targets.iter())
            .map(|(&o, &t)| t * o.max(LOG_FLOOR).ln())
            .sum::<f64>())
    }

    fn check_targets(&self, targets: &[f64]) -> Result<(), NetError> {
        let output_size = self.output_size();
        if targets.len() != output_size {
            return Err(NetError::BadTargets(SizeMismatch {
                expected: output_size,
                got: targets.len(),
            }));
        }
        Ok(())
    }

    /// Loss of the current output layer state against `targets`.
    /// Gradients and the stored loss are left untouched.
    pub fn get_loss(&self, targets: &[f64]) -> Result<f64, NetError> {
        self.check_targets(targets)?;
        Ok(Net::cross_entropy(&self.results(), targets)?)
    }

    /// Computes the loss of the last forward pass, then backpropagates the error and
    /// adds every weight gradient to its batch sum. Weights are not changed.
    ///
    /// # Returns
    /// * `Ok(loss)` if `targets` has as many values as the output layer has neurons;
    /// * `Err(NetError::BadTargets)` otherwise.
    pub fn back_prop(&mut self, targets: &[f64]) -> Result<f64, NetError> {
        self.check_targets(targets)?;

        let loss = Net::cross_entropy(&self.results(), targets)?;
        self.loss = loss;
        self.recent_average_loss = (self.recent_average_loss * RECENT_AVERAGE_SMOOTHING + loss)
            / (RECENT_AVERAGE_SMOOTHING + 1.0);

        let output_layer = self.layers.len() - 1;

        for (neuron, &target) in self.layers[output_layer].neurons_mut().zip(targets) {
            neuron.compute_output_gradient(target);
        }

        // Hidden layers, last to first
        for layer_num in (1..output_layer).rev() {
            let (done, rest) = self.layers.split_at_mut(layer_num + 1);
            let next_layer = &rest[0];
            for neuron in done[layer_num].neurons_mut() {
                neuron.compute_hidden_gradient(next_layer);
            }
        }

        // Weight gradients, first to second-to-last layer
        for layer_num in 0..output_layer {
            let (done, rest) = self.layers.split_at_mut(layer_num + 1);
            let next_layer = &rest[0];
            for neuron in done[layer_num].units_mut() {
                neuron.accumulate_weight_gradients(next_layer);
            }
        }

        Ok(loss)
    }

    /// Zeroes every accumulated weight gradient. Called before each mini-batch.
    pub fn reset_gradient_sum(&mut self) {
        for layer in self.layers.iter_mut() {
            for neuron in layer.units_mut() {
                neuron.reset_gradients();
            }
        }
    }

    /// Divides the accumulated gradients by the number of samples actually seen
    /// in the batch.
    pub fn calc_avg_gradient(&mut self, batch_size: usize) -> Result<(), NetError> {
        if batch_size == 0 {
            return Err(NetError::BadBatchSize);
        }
        for layer in self.layers.iter_mut() {
            for neuron in layer.units_mut() {
                neuron.average_gradients(batch_size);
            }
        }
        Ok(())
    }

    /// Applies one RMSprop step to every weight using the averaged gradients.
    pub fn update_weights(&mut self) {
        let optimizer = self.optimizer;
        for layer in self.layers.iter_mut() {
            for neuron in layer.units_mut() {
                neuron.update_weights(&optimizer);
            }
        }
    }

    /// Loss of the last `Net::back_prop`.
    pub fn loss(&self) -> f64 {
        self.loss
    }

    /// Exponentially smoothed loss over the recent `Net::back_prop` calls.
    pub fn recent_average_loss(&self) -> f64 {
        self.recent_average_loss
    }

    /// Returns `true` if `output` and `label` have their maximum at the same index.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::Net;
    /// assert!(Net::compare_result(&[0.1, 0.7, 0.2], &[0.0, 1.0, 0.0]));
    /// assert!(!Net::compare_result(&[0.4, 0.4, 0.2], &[0.0, 1.0, 0.0]));
    /// ```
    pub fn compare_result(output: &[f64], label: &[f64]) -> bool {
        argmax(output) == argmax(label)
    }

    /// Consumes `Net` and builds `Trainer` object containing it.
    /// See `Trainer`'s documentation for details.
    pub fn build_trainer(self, config: TrainConfig) -> Result<Trainer, NetError> {
        Trainer::build(self, config)
    }

    #[cfg(test)]
    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }
}

/// Index of the first maximum of `values`, `None` if empty.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, max)) if v <= max => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Error structure for `Net` operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetError {
    #[error("Net must have at least two layers (input and output), but got topology with len {0}!")]
    BadTopology(usize),
    #[error("Every layer must have at least one neuron, but layer {0} is empty!")]
    EmptyLayer(usize),
    #[error("Wrong number of inputs. {0}")]
    BadInputs(SizeMismatch),
    #[error("Wrong number of outputs. {0}")]
    BadOutputs(SizeMismatch),
    #[error("Wrong number of targets. {0}")]
    BadTargets(SizeMismatch),
    #[error("Batch size must be positive!")]
    BadBatchSize,
    #[error("Dropout applies to hidden layers only, but got layer {index} of {layers}!")]
    BadLayer { index: usize, layers: usize },
    #[error("Dropout probability must be in [0, 1), but got {0}!")]
    BadDropout(f64),
    #[error(transparent)]
    SizeMismatch(#[from] SizeMismatch),
}

/// Error structure for collections size mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Expected {expected} values, but got {got}!")]
pub struct SizeMismatch {
    pub expected: usize,
    pub got: usize,
}
