use std::path::PathBuf;

use bpnnet::data::{write_predictions, Dataset, InputData, LabelData};
use bpnnet::feedforward::{Net, RmsProp, TrainConfig};

fn data_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

#[test]
fn bundled_xor_files_load() {
    let inputs = InputData::from_csv(data_file("xor_inputs.csv"), 1.0).unwrap();
    let labels = LabelData::from_csv(data_file("xor_labels.csv"), 2, false).unwrap();

    assert_eq!(inputs.len(), 4);
    assert_eq!(labels.len(), 4);
    assert_eq!(inputs.get(2), Some(&[1.0, 0.0][..]));
    let classes: Vec<usize> = (0..4)
        .map(|i| labels.decode(labels.get(i).unwrap()).unwrap())
        .collect();
    assert_eq!(classes, vec![0, 1, 1, 0]);
}

#[test]
fn bundled_xor_files_train_single_output_net() {
    let mut inputs = InputData::from_csv(data_file("xor_inputs.csv"), 1.0).unwrap();
    let mut labels = LabelData::from_csv(data_file("xor_labels.csv"), 1, false).unwrap();
    assert_eq!(labels.get(1), Some(&[1.0][..]));

    let net = Net::new(&[2, 2, 1], RmsProp::new(0.01), 42).unwrap();
    let config = TrainConfig::default()
        .with_epochs(20)
        .with_batch_size(1)
        .with_seed(42);
    let mut trainer = net.build_trainer(config).unwrap();
    let reports = trainer.fit(&mut inputs, &mut labels).unwrap();
    assert_eq!(reports.len(), 20);

    let eval = trainer.evaluate(&inputs, &labels).unwrap();
    assert_eq!(eval.samples, 4);
    assert!(eval.loss < 0.1);
    assert_eq!(eval.accuracy, 1.0);
}

#[test]
fn train_on_files_and_save_predictions() {
    let mut inputs = InputData::from_csv(data_file("xor_inputs.csv"), 1.0).unwrap();
    let mut labels = LabelData::from_csv(data_file("xor_labels.csv"), 2, false).unwrap();

    let net = Net::new(&[2, 4, 2], RmsProp::new(0.01), 9).unwrap();
    let config = TrainConfig::default().with_epochs(5).with_batch_size(3);
    let mut trainer = net.build_trainer(config).unwrap();
    let reports = trainer.fit(&mut inputs, &mut labels).unwrap();
    assert!(reports.iter().all(|r| r.batch_sizes == vec![3, 1]));

    let predictions = trainer.predict_all(&inputs).unwrap();
    assert_eq!(predictions.len(), 4);
    assert!(predictions.iter().all(|&p| p < 2));

    let path = std::env::temp_dir().join(format!("bpnnet_predictions_{}.csv", std::process::id()));
    write_predictions(&path, &predictions).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<usize> = written.lines().map(|l| l.parse().unwrap()).collect();
    assert_eq!(lines, predictions);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn validation_rows_are_held_out() {
    let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (10 - i) as f64]).collect();
    let classes: Vec<usize> = (0..10).map(|i| (i >= 5) as usize).collect();
    let mut inputs = InputData::from_rows(rows);
    let mut labels = LabelData::from_classes(&classes, 2).unwrap();

    let net = Net::new(&[2, 4, 2], RmsProp::new(0.01), 1).unwrap();
    let config = TrainConfig::default()
        .with_epochs(2)
        .with_batch_size(4)
        .with_train_fraction(0.8);
    let mut trainer = net.build_trainer(config).unwrap();
    let reports = trainer.fit(&mut inputs, &mut labels).unwrap();

    assert_eq!(inputs.train_len(), 8);
    assert_eq!(inputs.valid_len(), 2);
    for report in reports {
        assert_eq!(report.batch_sizes, vec![4, 4]);
        assert_eq!(report.train.samples, 8);
        assert_eq!(report.valid.map(|v| v.samples), Some(2));
    }
}
