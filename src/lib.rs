//! Fully-connected classifier trained with backpropagation, mini-batch RMSprop,
//! softmax cross-entropy loss and dropout.

pub mod data;
pub mod feedforward;

#[cfg(feature = "python")]
pub mod python_ffi;
