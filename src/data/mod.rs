//! Datasets feeding the network: numeric feature rows and their one-hot labels

mod error;
mod input;
mod label;
mod rows;

pub use error::*;
pub use input::*;
pub use label::*;
pub use rows::*;

use std::path::Path;

/// Sequential access to the rows of a dataset.
///
/// Implementors only expose their `Rows`; cursors, splitting and shuffling are shared.
pub trait Dataset {
    fn rows(&self) -> &Rows;

    fn rows_mut(&mut self) -> &mut Rows;

    fn len(&self) -> usize {
        self.rows().len()
    }

    fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    fn train_len(&self) -> usize {
        self.rows().train_len()
    }

    fn valid_len(&self) -> usize {
        self.rows().valid_len()
    }

    fn get(&self, index: usize) -> Option<&[f64]> {
        self.rows().get(index)
    }

    fn next(&mut self) -> Option<&[f64]> {
        self.rows_mut().next()
    }

    fn next_train(&mut self) -> Option<&[f64]> {
        self.rows_mut().next_train()
    }

    fn next_valid(&mut self) -> Option<&[f64]> {
        self.rows_mut().next_valid()
    }

    fn shuffle(&mut self, seed: u64) {
        self.rows_mut().shuffle(seed)
    }

    fn split(&mut self, fraction: f64) -> Result<(), DataError> {
        self.rows_mut().split(fraction)
    }
}

/// Writes one predicted class per line.
pub fn write_predictions<P: AsRef<Path>>(path: P, predictions: &[usize]) -> Result<(), DataError> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    for prediction in predictions {
        writer.write_record(&[prediction.to_string()])?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Reads every record of a header-less CSV file as numbers.
pub(crate) fn read_csv(path: &Path) -> Result<Vec<(u64, Vec<f64>)>, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| DataError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let mut records = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map_or(i as u64 + 1, |p| p.line());
        let values = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|_| DataError::Parse {
                    line,
                    value: field.to_owned(),
                })
            })
            .collect::<Result<Vec<f64>, DataError>>()?;
        records.push((line, values));
    }
    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::fs;
    use std::path::PathBuf;

    /// Writes `contents` to a fresh file under the system temp directory.
    pub(crate) fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bpnnet-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn predictions_are_written_one_per_line() {
        let path = temp_file("predictions.csv", "");
        super::write_predictions(&path, &[3, 0, 2]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "3\n0\n2\n");
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let err = super::read_csv(std::path::Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, super::DataError::Open { .. }));
    }
}
