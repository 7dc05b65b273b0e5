use thiserror::Error;
use tracing::{debug, info, warn};

use super::net::{Net, NetError};
use crate::data::{DataError, Dataset};

/// Training settings.
///
/// # Examples
/// ```
/// # use bpnnet::feedforward::TrainConfig;
/// let config = TrainConfig::default().with_epochs(50).with_batch_size(16).with_dropout(0.2);
/// assert_eq!(config.train_fraction, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,

    /// Samples per weight update; the last batch of an epoch may be smaller.
    pub batch_size: usize,

    /// Dropout probability of every hidden neuron while training.
    pub dropout: f64,

    /// Leading fraction of the dataset used for training, the rest validates.
    pub train_fraction: f64,

    pub seed: u64,

    /// Reshuffle the training rows before every epoch.
    pub shuffle: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            epochs: 10,
            batch_size: 32,
            dropout: 0.0,
            train_fraction: 1.0,
            seed: 0,
            shuffle: true,
        }
    }
}

impl TrainConfig {
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_train_fraction(mut self, train_fraction: f64) -> Self {
        self.train_fraction = train_fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}

/// Loss and top-1 accuracy over a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Evaluation {
    /// Mean categorical cross-entropy.
    pub loss: f64,
    /// Share of samples whose most probable class matches the label, in `[0, 1]`.
    pub accuracy: f64,
    pub samples: usize,
}

impl Evaluation {
    fn from_sums(loss_sum: f64, correct: usize, samples: usize) -> Evaluation {
        if samples == 0 {
            return Evaluation::default();
        }
        Evaluation {
            loss: loss_sum / samples as f64,
            accuracy: correct as f64 / samples as f64,
            samples,
        }
    }
}

/// Outcome of a single epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    /// Number of samples averaged by each weight update, in order.
    pub batch_sizes: Vec<usize>,
    /// Measured on the training pass itself, dropout included.
    pub train: Evaluation,
    pub valid: Option<Evaluation>,
}

/// Sizes of the mini-batches covering `len` samples: `batch_size` each, except a
/// smaller trailing batch when `len` is not a multiple of it.
///
/// # Examples
/// ```
/// # use bpnnet::feedforward::batch_sizes;
/// assert_eq!(batch_sizes(10, 4).collect::<Vec<_>>(), vec![4, 4, 2]);
/// assert_eq!(batch_sizes(8, 4).collect::<Vec<_>>(), vec![4, 4]);
/// ```
pub fn batch_sizes(len: usize, batch_size: usize) -> impl Iterator<Item = usize> {
    let batch_size = batch_size.max(1);
    (0..len)
        .step_by(batch_size)
        .map(move |start| batch_size.min(len - start))
}

/// Net trainer structure.
///
/// Training procedure will look like this:
/// * One calls `Net::build_trainer`, which will consume `Net` and return `Trainer` object.
/// (Consuming `Net` is needed to prevent one from using it while a batch is half accumulated.)
/// * Samples are accumulated via `Trainer::train` and applied via `Trainer::apply_training`,
/// or both at once via `Trainer::train_batch`; `Trainer::fit` runs whole epochs over datasets.
/// * Once finished training, one can use `Trainer::teardown` to get `Net` object back.
pub struct Trainer {
    pub(crate) net: Net,

    config: TrainConfig,

    /// Samples accumulated since the last applied update.
    gradient_counter: usize,
}

impl Trainer {
    /// Consumes `Net` and builds `Trainer` object containing it.
    /// Configured dropout is set on every hidden layer.
    pub(super) fn build(mut net: Net, config: TrainConfig) -> Result<Trainer, NetError> {
        if config.batch_size == 0 {
            return Err(NetError::BadBatchSize);
        }
        net.set_hidden_dropout(config.dropout)?;
        net.set_training(false);
        net.reset_gradient_sum();

        Ok(Trainer {
            net,
            config,
            gradient_counter: 0,
        })
    }

    /// Returns reference to contained `Net`.
    pub fn net_ref(&self) -> &Net {
        &self.net
    }

    /// Returns mutable reference to contained `Net`, allowing the use of `Net::process`.
    pub fn net_mut(&mut self) -> &mut Net {
        &mut self.net
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Performs forward and backward pass on a given sample, accumulating its gradients.
    /// Note that weights are not updated by this method; the first sample after an
    /// update starts a new batch. To finally apply changes, call `Trainer::apply_training`.
    ///
    /// # Returns
    /// * The loss of this sample.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::{Net, RmsProp, TrainConfig};
    /// let net = Net::new(&[2, 4, 2], RmsProp::new(0.01), 7).unwrap();
    /// let mut trainer = net.build_trainer(TrainConfig::default()).unwrap();
    /// let loss = trainer.train(&[0.0, 1.0], &[0.0, 1.0]).unwrap();
    /// assert!(loss > 0.0);
    /// trainer.apply_training().unwrap();
    /// ```
    pub fn train(&mut self, inputs: &[f64], targets: &[f64]) -> Result<f64, NetError> {
        if self.gradient_counter == 0 {
            self.net.reset_gradient_sum();
        }

        self.net.feed_forward(inputs)?;
        let loss = self.net.back_prop(targets)?;
        self.gradient_counter += 1;

        Ok(loss)
    }

    /// Applies training, previously done by `Trainer::train`: averages the gradients
    /// over the samples actually accumulated and updates the weights.
    /// Does nothing if no sample was accumulated.
    pub fn apply_training(&mut self) -> Result<(), NetError> {
        if self.gradient_counter > 0 {
            self.net.calc_avg_gradient(self.gradient_counter)?;
            self.net.update_weights();
            self.net.reset_gradient_sum();
            self.gradient_counter = 0;
        }
        Ok(())
    }

    /// Performs training for every sample in a given batch, then applies.
    /// (It is equivalent to calling `Trainer::train` repeatedly, and then `Trainer::apply_training`.)
    ///
    /// # Returns
    /// * The average loss over the batch, `0` for an empty one.
    pub fn train_batch<'a, I>(&mut self, samples: I) -> Result<f64, NetError>
    where
        I: IntoIterator<Item = (&'a [f64], &'a [f64])>,
    {
        // Anything accumulated before belongs to another batch
        self.apply_training()?;

        let mut loss_sum = 0.0;
        let mut count = 0;
        for (inputs, targets) in samples {
            loss_sum += self.train(inputs, targets)?;
            count += 1;
        }

        self.apply_training()?;

        Ok(if count == 0 {
            0.0
        } else {
            loss_sum / count as f64
        })
    }

    /// Runs one epoch over the training rows of `inputs` and `labels`, then
    /// evaluates on their validation rows (if any).
    ///
    /// Dropout is active during the training pass only.
    pub fn train_epoch<I, L>(
        &mut self,
        inputs: &mut I,
        labels: &mut L,
        epoch: usize,
    ) -> Result<EpochReport, TrainError>
    where
        I: Dataset,
        L: Dataset,
    {
        let train_len = inputs.train_len();
        if train_len == 0 {
            return Err(TrainError::EmptyTrainingSet);
        }
        if train_len != labels.train_len() {
            return Err(TrainError::LengthMismatch {
                inputs: train_len,
                labels: labels.train_len(),
            });
        }

        if self.config.shuffle {
            // Same seed for both so rows stay paired
            let seed = self.config.seed.wrapping_add(epoch as u64);
            inputs.shuffle(seed);
            labels.shuffle(seed);
        }

        self.apply_training()?;
        self.net.set_training(true);

        let mut sizes = Vec::new();
        let mut loss_sum = 0.0;
        let mut correct = 0;

        for (batch, batch_size) in batch_sizes(train_len, self.config.batch_size).enumerate() {
            let mut batch_loss = 0.0;

            for _ in 0..batch_size {
                let x = inputs.next_train().ok_or(TrainError::EmptyTrainingSet)?;
                let y = labels.next_train().ok_or(TrainError::EmptyTrainingSet)?;

                let loss = self.train(x, y)?;
                batch_loss += loss;
                if Net::compare_result(&self.net.results(), y) {
                    correct += 1;
                }
            }

            self.apply_training()?;
            debug!(epoch, batch, batch_size, loss = batch_loss / batch_size as f64, "batch applied");

            loss_sum += batch_loss;
            sizes.push(batch_size);
        }

        self.net.set_training(false);

        let train = Evaluation::from_sums(loss_sum, correct, train_len);
        let valid = if inputs.valid_len() > 0 {
            Some(self.evaluate_valid(inputs, labels)?)
        } else {
            None
        };

        match valid {
            Some(v) => info!(
                epoch,
                loss = train.loss,
                accuracy = train.accuracy,
                valid_loss = v.loss,
                valid_accuracy = v.accuracy,
                "epoch finished"
            ),
            None => info!(epoch, loss = train.loss, accuracy = train.accuracy, "epoch finished"),
        }

        Ok(EpochReport {
            epoch,
            batch_sizes: sizes,
            train,
            valid,
        })
    }

    /// Splits both datasets by `TrainConfig::train_fraction` and trains for
    /// `TrainConfig::epochs` epochs.
    ///
    /// # Returns
    /// * One report per epoch;
    /// * `Err(TrainError)` if datasets disagree in length, there is nothing to train on,
    /// or a sample does not fit the network.
    pub fn fit<I, L>(&mut self, inputs: &mut I, labels: &mut L) -> Result<Vec<EpochReport>, TrainError>
    where
        I: Dataset,
        L: Dataset,
    {
        if inputs.len() != labels.len() {
            return Err(TrainError::LengthMismatch {
                inputs: inputs.len(),
                labels: labels.len(),
            });
        }

        inputs.split(self.config.train_fraction)?;
        labels.split(self.config.train_fraction)?;

        if inputs.train_len() == 0 {
            return Err(TrainError::EmptyTrainingSet);
        }
        if inputs.valid_len() == 0 && self.config.train_fraction < 1.0 {
            warn!(
                samples = inputs.len(),
                fraction = self.config.train_fraction,
                "validation split is empty"
            );
        }

        info!(
            train = inputs.train_len(),
            valid = inputs.valid_len(),
            epochs = self.config.epochs,
            batch_size = self.config.batch_size,
            "training started"
        );

        let mut reports = Vec::with_capacity(self.config.epochs);
        for epoch in 0..self.config.epochs {
            reports.push(self.train_epoch(inputs, labels, epoch)?);
        }
        Ok(reports)
    }

    /// Loss and accuracy over `(inputs, targets)` pairs.
    /// Gradients are not touched and dropout is off.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::feedforward::{Net, RmsProp, TrainConfig};
    /// let net = Net::new(&[2, 3, 2], RmsProp::new(0.01), 1).unwrap();
    /// let mut trainer = net.build_trainer(TrainConfig::default()).unwrap();
    /// let samples = vec![(vec![0.0, 1.0], vec![0.0, 1.0]), (vec![1.0, 1.0], vec![1.0, 0.0])];
    /// let eval = trainer
    ///     .evaluate_samples(samples.iter().map(|(x, y)| (&x[..], &y[..])))
    ///     .unwrap();
    /// assert_eq!(eval.samples, 2);
    /// ```
    pub fn evaluate_samples<'a, S>(&mut self, samples: S) -> Result<Evaluation, NetError>
    where
        S: IntoIterator<Item = (&'a [f64], &'a [f64])>,
    {
        let training = self.net.is_training();
        self.net.set_training(false);

        let mut loss_sum = 0.0;
        let mut correct = 0;
        let mut count = 0;
        let mut outcome = Ok(());
        for (inputs, targets) in samples {
            match self.evaluate_sample(inputs, targets) {
                Ok((loss, hit)) => {
                    loss_sum += loss;
                    correct += hit as usize;
                    count += 1;
                }
                Err(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        self.net.set_training(training);
        outcome?;

        Ok(Evaluation::from_sums(loss_sum, correct, count))
    }

    fn evaluate_sample(&mut self, inputs: &[f64], targets: &[f64]) -> Result<(f64, bool), NetError> {
        self.net.feed_forward(inputs)?;
        let results = self.net.results();
        Ok((self.net.get_loss(targets)?, Net::compare_result(&results, targets)))
    }

    /// Loss and accuracy over every row of `inputs` and `labels`, ignoring their split.
    pub fn evaluate<I, L>(&mut self, inputs: &I, labels: &L) -> Result<Evaluation, TrainError>
    where
        I: Dataset,
        L: Dataset,
    {
        if inputs.len() != labels.len() {
            return Err(TrainError::LengthMismatch {
                inputs: inputs.len(),
                labels: labels.len(),
            });
        }
        Ok(self.evaluate_samples(inputs.rows().iter().zip(labels.rows().iter()))?)
    }

    /// Loss and accuracy over the training rows only.
    pub fn evaluate_train<I, L>(&mut self, inputs: &I, labels: &L) -> Result<Evaluation, TrainError>
    where
        I: Dataset,
        L: Dataset,
    {
        Ok(self.evaluate_samples(inputs.rows().train().zip(labels.rows().train()))?)
    }

    /// Loss and accuracy over the validation rows only.
    pub fn evaluate_valid<I, L>(&mut self, inputs: &I, labels: &L) -> Result<Evaluation, TrainError>
    where
        I: Dataset,
        L: Dataset,
    {
        Ok(self.evaluate_samples(inputs.rows().valid().zip(labels.rows().valid()))?)
    }

    /// Most probable class of every row of `inputs`.
    pub fn predict_all<I: Dataset>(&mut self, inputs: &I) -> Result<Vec<usize>, NetError> {
        inputs.rows().iter().map(|x| self.net.predict(x)).collect()
    }

    /// Consumes `Trainer` object, and returns contained `Net` back.
    /// Note that unapplied training, done by `Trainer::train` will be lost,
    /// so don't forget to call `Trainer::apply_training` before!
    pub fn teardown(mut self) -> Net {
        self.net.set_training(false);
        self.net
    }
}

/// Error structure for `Trainer` operations
#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Got {inputs} input row(s), but {labels} label row(s)!")]
    LengthMismatch { inputs: usize, labels: usize },

    #[error("There are no training samples!")]
    EmptyTrainingSet,
}
