use pyo3::prelude::*;

use super::net::Net;
use crate::feedforward::Trainer as InnerTrainer;
use crate::python_ffi::handle::Handle;

#[pyclass]
pub struct Trainer {
    pub(super) trainer: Handle<InnerTrainer>,
    pub(super) outputs_buffer: Box<[f64]>,
}

#[pymethods]
impl Trainer {
    pub fn topology(&self) -> PyResult<Vec<usize>> {
        Ok(self.trainer.get()?.net_ref().topology().to_vec())
    }

    pub fn process(&mut self, inputs: Vec<f64>) -> PyResult<Vec<f64>> {
        self.trainer
            .get_mut()?
            .net_mut()
            .process(&inputs, &mut self.outputs_buffer)?;
        Ok(self.outputs_buffer.to_vec())
    }

    /// Accumulates one sample and returns its loss.
    pub fn train(&mut self, inputs: Vec<f64>, targets: Vec<f64>) -> PyResult<f64> {
        Ok(self.trainer.get_mut()?.train(&inputs, &targets)?)
    }

    pub fn apply_training(&mut self) -> PyResult<()> {
        Ok(self.trainer.get_mut()?.apply_training()?)
    }

    /// Trains on every `(inputs, targets)` pair, then applies; returns the mean loss.
    pub fn train_batch(&mut self, samples: Vec<(Vec<f64>, Vec<f64>)>) -> PyResult<f64> {
        Ok(self
            .trainer
            .get_mut()?
            .train_batch(samples.iter().map(|(x, y)| (&x[..], &y[..])))?)
    }

    /// Returns `(loss, accuracy)` over the samples.
    pub fn evaluate(&mut self, samples: Vec<(Vec<f64>, Vec<f64>)>) -> PyResult<(f64, f64)> {
        let eval = self
            .trainer
            .get_mut()?
            .evaluate_samples(samples.iter().map(|(x, y)| (&x[..], &y[..])))?;
        Ok((eval.loss, eval.accuracy))
    }

    /// Hands the network back; this object becomes unusable.
    pub fn teardown(&mut self) -> PyResult<Net> {
        Ok(Net {
            net: Handle::new("Net", self.trainer.take()?.teardown()),
            outputs_buffer: self.outputs_buffer.clone(),
        })
    }
}
