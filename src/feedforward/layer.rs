use std::iter;

use super::neuron::{derive_seed, Neuron};

/// Seed coordinate of the bias, out of reach of any regular neuron index.
const BIAS_SEED_SLOT: usize = usize::MAX;

/// Ordered group of regular neurons plus the layer's bias unit.
///
/// The bias is kept apart from `neurons` so loops over "real" neurons never have to
/// skip a trailing element: use `neurons` for activations and gradients, `units`
/// for the sources of the next layer's weighted sums.
#[derive(Debug, Clone)]
pub struct Layer {
    neurons: Vec<Neuron>,
    bias: Neuron,
}

impl Layer {
    /// Builds layer number `index` with `size` regular neurons and a bias, each
    /// holding `fan_out` outgoing weights. Neuron seeds are derived from `master_seed`.
    pub fn new(index: usize, size: usize, fan_out: usize, master_seed: u64) -> Layer {
        let neurons = (0..size)
            .map(|i| Neuron::new(size, fan_out, i, derive_seed(master_seed, index, i)))
            .collect();
        let bias_seed = derive_seed(master_seed, index, BIAS_SEED_SLOT);
        let bias = Neuron::bias(size, fan_out, size, bias_seed);

        Layer { neurons, bias }
    }

    /// Number of units, bias included.
    pub fn len(&self) -> usize {
        self.neurons.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of regular neurons.
    pub fn size(&self) -> usize {
        self.neurons.len()
    }

    pub fn neurons(&self) -> std::slice::Iter<'_, Neuron> {
        self.neurons.iter()
    }

    pub fn neurons_mut(&mut self) -> std::slice::IterMut<'_, Neuron> {
        self.neurons.iter_mut()
    }

    /// Regular neurons followed by the bias.
    pub fn units(&self) -> impl Iterator<Item = &Neuron> {
        self.neurons.iter().chain(iter::once(&self.bias))
    }

    pub(super) fn units_mut(&mut self) -> impl Iterator<Item = &mut Neuron> {
        self.neurons.iter_mut().chain(iter::once(&mut self.bias))
    }

    pub fn neuron(&self, index: usize) -> &Neuron {
        &self.neurons[index]
    }

    pub(super) fn neuron_mut(&mut self, index: usize) -> &mut Neuron {
        &mut self.neurons[index]
    }

    /// Unit `index`, where `index == size()` is the bias.
    pub fn unit(&self, index: usize) -> &Neuron {
        if index == self.neurons.len() {
            &self.bias
        } else {
            &self.neurons[index]
        }
    }

    pub fn bias(&self) -> &Neuron {
        &self.bias
    }

    pub(super) fn bias_mut(&mut self) -> &mut Neuron {
        &mut self.bias
    }

    pub fn outputs(&self) -> Vec<f64> {
        self.neurons.iter().map(Neuron::output).collect()
    }
}
