//! Feedforward neural network with backpropagation-based mini-batch training

mod layer;
mod net;
mod neuron;
mod optimizer;
mod trainer;

pub use layer::*;
pub use net::*;
pub use neuron::*;
pub use optimizer::*;
pub use trainer::*;
