//! Trains a classifier on CSV data and reports its accuracy.
//!
//! Usage:
//! ```text
//! train 2 2 1 --epochs 2000 --learning-rate 0.01 --batch-size 1
//! train 2 16 2 --epochs 2000 --learning-rate 0.01 --batch-size 1
//! train 784 128 10 --epochs 20 --learning-rate 0.001 --batch-size 32 \
//!     --inputs fashion_inputs.csv --labels fashion_labels.csv --divisor 255 \
//!     --train-fraction 0.8 --dropout 0.2
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bpnnet::data::{write_predictions, Dataset, InputData, LabelData};
use bpnnet::feedforward::{Evaluation, Net, RmsProp, TrainConfig};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about = "Train a feedforward classifier with mini-batch RMSprop")]
struct Args {
    /// Layer sizes, input layer first, output layer (number of classes) last
    #[arg(required = true, num_args = 2.., value_parser = parse_layer_size)]
    topology: Vec<usize>,

    #[arg(short, long)]
    epochs: usize,

    #[arg(short, long)]
    learning_rate: f64,

    #[arg(short, long)]
    batch_size: usize,

    /// Feature rows, one sample per line
    #[arg(long, default_value = "data/xor_inputs.csv")]
    inputs: PathBuf,

    /// Labels, one sample per line
    #[arg(long, default_value = "data/xor_labels.csv")]
    labels: PathBuf,

    /// Labels are one-hot rows instead of class numbers
    #[arg(long)]
    one_hot: bool,

    /// Every input value is divided by this
    #[arg(long, default_value_t = 1.0)]
    divisor: f64,

    /// Leading share of the rows used for training, the rest validates
    #[arg(long, default_value_t = 1.0)]
    train_fraction: f64,

    /// Dropout probability of hidden neurons
    #[arg(long, default_value_t = 0.0)]
    dropout: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Keep the row order between epochs
    #[arg(long)]
    no_shuffle: bool,

    #[arg(long, requires = "test_labels")]
    test_inputs: Option<PathBuf>,

    #[arg(long, requires = "test_inputs")]
    test_labels: Option<PathBuf>,

    /// Where to write the predicted class of every test row (or every row without a test set)
    #[arg(long)]
    predictions: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn parse_layer_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("layer size must be positive".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

fn load(
    inputs: &Path,
    labels: &Path,
    args: &Args,
    categories: usize,
) -> Result<(InputData, LabelData)> {
    let inputs_data = InputData::from_csv(inputs, args.divisor)
        .with_context(|| format!("Failed to load inputs from {}", inputs.display()))?;
    let labels_data = LabelData::from_csv(labels, categories, args.one_hot)
        .with_context(|| format!("Failed to load labels from {}", labels.display()))?;
    Ok((inputs_data, labels_data))
}

fn print_accuracy(name: &str, eval: &Evaluation) {
    println!(
        "{:<10} accuracy: {:>6.2}% ({} samples, loss {:.4})",
        name,
        eval.accuracy * 100.0,
        eval.samples,
        eval.loss
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder().with_max_level(args.log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let categories = args.topology.last().copied().unwrap_or_default();
    let (mut inputs, mut labels) = load(&args.inputs, &args.labels, &args, categories)?;
    info!(rows = inputs.len(), path = %args.inputs.display(), "dataset loaded");

    let net = Net::new(&args.topology, RmsProp::new(args.learning_rate), args.seed)
        .context("Failed to build the network")?;
    let config = TrainConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        dropout: args.dropout,
        train_fraction: args.train_fraction,
        seed: args.seed,
        shuffle: !args.no_shuffle,
    };
    let mut trainer = net.build_trainer(config).context("Invalid training settings")?;

    trainer
        .fit(&mut inputs, &mut labels)
        .context("Training failed")?;

    print_accuracy("training", &trainer.evaluate_train(&inputs, &labels)?);
    if inputs.valid_len() > 0 {
        print_accuracy("validation", &trainer.evaluate_valid(&inputs, &labels)?);
    }

    let predicted = match (&args.test_inputs, &args.test_labels) {
        (Some(test_inputs), Some(test_labels)) => {
            let (test_inputs, test_labels) = load(test_inputs, test_labels, &args, categories)?;
            print_accuracy("test", &trainer.evaluate(&test_inputs, &test_labels)?);
            trainer.predict_all(&test_inputs)?
        }
        _ => trainer.predict_all(&inputs)?,
    };

    if let Some(path) = &args.predictions {
        write_predictions(path, &predicted)
            .with_context(|| format!("Failed to write predictions to {}", path.display()))?;
        info!(rows = predicted.len(), path = %path.display(), "predictions saved");
    }

    Ok(())
}
