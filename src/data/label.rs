use std::path::Path;

use super::{read_csv, DataError, Dataset, Rows};

/// One-hot label vectors of width `categories`.
#[derive(Debug, Clone)]
pub struct LabelData {
    rows: Rows,
    categories: usize,
}

impl LabelData {
    /// Reads labels from a CSV file.
    ///
    /// # Arguments
    /// * `path` - file to read;
    /// * `categories` - number of classes, the width of every label vector;
    /// * `one_hot` - whether rows are already one-hot encoded, otherwise every row
    /// holds a single class number.
    ///
    /// With a single category there is nothing to encode: every row must hold one
    /// value, taken as the raw target of the only output.
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        categories: usize,
        one_hot: bool,
    ) -> Result<LabelData, DataError> {
        let mut data = Vec::new();

        for (line, values) in read_csv(path.as_ref())? {
            if one_hot || categories == 1 {
                if values.len() != categories {
                    return Err(DataError::BadLabelWidth {
                        line,
                        expected: categories,
                        got: values.len(),
                    });
                }
                data.push(values);
            } else {
                let class = match values.as_slice() {
                    [v] if v.is_finite() && *v >= 0.0 => v.trunc() as usize,
                    _ => {
                        return Err(DataError::Parse {
                            line,
                            value: format!("{:?}", values),
                        })
                    }
                };
                data.push(LabelData::encode_with(class, categories)?);
            }
        }

        Ok(LabelData {
            rows: Rows::new(data),
            categories,
        })
    }

    /// Labels from already encoded vectors.
    pub fn from_rows(rows: Vec<Vec<f64>>, categories: usize) -> Result<LabelData, DataError> {
        if let Some(row) = rows.iter().find(|r| r.len() != categories) {
            return Err(DataError::BadEncodingWidth {
                expected: categories,
                got: row.len(),
            });
        }
        Ok(LabelData {
            rows: Rows::new(rows),
            categories,
        })
    }

    /// Labels from class numbers.
    ///
    /// # Examples
    /// ```
    /// # use bpnnet::data::{Dataset, LabelData};
    /// let labels = LabelData::from_classes(&[0, 1, 1, 0], 2).unwrap();
    /// assert_eq!(labels.get(1), Some(&[0.0, 1.0][..]));
    /// assert!(LabelData::from_classes(&[2], 2).is_err());
    /// ```
    pub fn from_classes(classes: &[usize], categories: usize) -> Result<LabelData, DataError> {
        let rows = classes
            .iter()
            .map(|&c| LabelData::encode_with(c, categories))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LabelData {
            rows: Rows::new(rows),
            categories,
        })
    }

    pub fn categories(&self) -> usize {
        self.categories
    }

    fn encode_with(label: usize, categories: usize) -> Result<Vec<f64>, DataError> {
        if label >= categories {
            return Err(DataError::LabelOutOfRange { label, categories });
        }
        let mut encoded = vec![0.0; categories];
        encoded[label] = 1.0;
        Ok(encoded)
    }

    /// Vector of `categories` zeros with a single `1.0` at `label`.
    pub fn encode(&self, label: usize) -> Result<Vec<f64>, DataError> {
        LabelData::encode_with(label, self.categories)
    }

    /// Index of the single `1.0` of a one-hot vector.
    ///
    /// Fails unless `encoded` has `categories` values, exactly one of them `1.0`
    /// and all others `0.0`.
    pub fn decode(&self, encoded: &[f64]) -> Result<usize, DataError> {
        if encoded.len() != self.categories {
            return Err(DataError::BadEncodingWidth {
                expected: self.categories,
                got: encoded.len(),
            });
        }

        let mut label = None;
        for (i, &v) in encoded.iter().enumerate() {
            if v == 1.0 && label.is_none() {
                label = Some(i);
            } else if v != 0.0 {
                return Err(DataError::NotOneHot);
            }
        }
        label.ok_or(DataError::NotOneHot)
    }
}

impl Dataset for LabelData {
    fn rows(&self) -> &Rows {
        &self.rows
    }

    fn rows_mut(&mut self) -> &mut Rows {
        &mut self.rows
    }
}
