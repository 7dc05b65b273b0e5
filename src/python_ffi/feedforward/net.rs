use pyo3::prelude::*;

use super::trainer::Trainer;
use crate::feedforward::{Net as InnerNet, NetError, RmsProp, SizeMismatch, TrainConfig};
use crate::python_ffi::handle::Handle;
use crate::Impl_to_PyErr;

#[pyclass]
pub struct Net {
    pub(super) net: Handle<InnerNet>,
    pub(super) outputs_buffer: Box<[f64]>,
}

#[pymethods]
impl Net {
    #[new]
    #[args(learning_rate = "0.001", seed = "0")]
    pub fn new(topology: Vec<usize>, learning_rate: f64, seed: u64) -> PyResult<Self> {
        let net = InnerNet::new(&topology, RmsProp::new(learning_rate), seed)?;
        let outputs_buffer = vec![0.0; net.output_size()].into_boxed_slice();

        Ok(Self {
            net: Handle::new("Net", net),
            outputs_buffer,
        })
    }

    pub fn topology(&self) -> PyResult<Vec<usize>> {
        Ok(self.net.get()?.topology().to_vec())
    }

    /// Class probabilities for `inputs`.
    pub fn process(&mut self, inputs: Vec<f64>) -> PyResult<Vec<f64>> {
        self.net.get_mut()?.process(&inputs, &mut self.outputs_buffer)?;
        Ok(self.outputs_buffer.to_vec())
    }

    pub fn predict(&mut self, inputs: Vec<f64>) -> PyResult<usize> {
        Ok(self.net.get_mut()?.predict(&inputs)?)
    }

    /// Hands the network over to a new `Trainer`; this object becomes unusable.
    #[args(epochs = "10", batch_size = "32", dropout = "0.0", seed = "0")]
    pub fn build_trainer(
        &mut self,
        epochs: usize,
        batch_size: usize,
        dropout: f64,
        seed: u64,
    ) -> PyResult<Trainer> {
        let config = TrainConfig::default()
            .with_epochs(epochs)
            .with_batch_size(batch_size)
            .with_dropout(dropout)
            .with_seed(seed);

        // Validate before taking the network so a bad config leaves this object usable
        if config.batch_size == 0 {
            return Err(NetError::BadBatchSize.into());
        }
        if !(0.0..1.0).contains(&dropout) {
            return Err(NetError::BadDropout(dropout).into());
        }
        let trainer = self.net.take()?.build_trainer(config)?;

        Ok(Trainer {
            trainer: Handle::new("Trainer", trainer),
            outputs_buffer: self.outputs_buffer.clone(),
        })
    }

    #[staticmethod]
    pub fn cross_entropy(outputs: Vec<f64>, targets: Vec<f64>) -> Result<f64, SizeMismatch> {
        InnerNet::cross_entropy(&outputs, &targets)
    }

    #[staticmethod]
    pub fn compare_result(output: Vec<f64>, label: Vec<f64>) -> bool {
        InnerNet::compare_result(&output, &label)
    }
}

Impl_to_PyErr!(for NetError, SizeMismatch);
