use std::path::Path;

use super::{read_csv, DataError, Dataset, Rows};

/// Feature vectors, one CSV row per sample.
#[derive(Debug, Clone)]
pub struct InputData {
    rows: Rows,
}

impl InputData {
    /// Reads comma-separated rows, dividing every value by `divisor`
    /// (e.g. `255.0` to bring pixel values into `[0, 1]`).
    pub fn from_csv<P: AsRef<Path>>(path: P, divisor: f64) -> Result<InputData, DataError> {
        let data = read_csv(path.as_ref())?
            .into_iter()
            .map(|(_, values)| values.into_iter().map(|v| v / divisor).collect())
            .collect();

        Ok(InputData {
            rows: Rows::new(data),
        })
    }

    /// # Examples
    /// ```
    /// # use bpnnet::data::{Dataset, InputData};
    /// let mut inputs = InputData::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
    /// assert_eq!(inputs.len(), 2);
    /// assert_eq!(inputs.next(), Some(&[0.0, 1.0][..]));
    /// ```
    pub fn from_rows(rows: Vec<Vec<f64>>) -> InputData {
        InputData {
            rows: Rows::new(rows),
        }
    }
}

impl Dataset for InputData {
    fn rows(&self) -> &Rows {
        &self.rows
    }

    fn rows_mut(&mut self) -> &mut Rows {
        &mut self.rows
    }
}
