use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::error::DataError;

/// Rows of numbers split into a leading training part and a trailing validation part.
///
/// Three independent round-robin cursors walk over all rows, the training rows
/// and the validation rows; each returns the row under it and advances,
/// wrapping back to the first row of its range.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    data: Vec<Vec<f64>>,

    /// `data[..split]` is training data, `data[split..]` is validation data.
    split: usize,

    cursor: usize,
    train_cursor: usize,
    valid_cursor: usize,
}

impl Rows {
    /// All rows start out as training rows.
    pub fn new(data: Vec<Vec<f64>>) -> Rows {
        let split = data.len();
        Rows {
            data,
            split,
            cursor: 0,
            train_cursor: 0,
            valid_cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn train_len(&self) -> usize {
        self.split
    }

    pub fn valid_len(&self) -> usize {
        self.data.len() - self.split
    }

    pub fn get(&self, index: usize) -> Option<&[f64]> {
        self.data.get(index).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.data.iter().map(Vec::as_slice)
    }

    pub fn train(&self) -> impl Iterator<Item = &[f64]> {
        self.data[..self.split].iter().map(Vec::as_slice)
    }

    pub fn valid(&self) -> impl Iterator<Item = &[f64]> {
        self.data[self.split..].iter().map(Vec::as_slice)
    }

    fn advance(cursor: &mut usize, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let current = *cursor % len;
        *cursor = (current + 1) % len;
        Some(current)
    }

    pub fn next(&mut self) -> Option<&[f64]> {
        let i = Rows::advance(&mut self.cursor, self.data.len())?;
        Some(&self.data[i])
    }

    pub fn next_train(&mut self) -> Option<&[f64]> {
        let i = Rows::advance(&mut self.train_cursor, self.split)?;
        Some(&self.data[i])
    }

    pub fn next_valid(&mut self) -> Option<&[f64]> {
        let i = Rows::advance(&mut self.valid_cursor, self.data.len() - self.split)?;
        Some(&self.data[self.split + i])
    }

    /// Keeps the leading `floor(len * fraction)` rows for training, the rest for validation.
    pub fn split(&mut self, fraction: f64) -> Result<(), DataError> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(DataError::BadFraction(fraction));
        }
        self.split = (self.data.len() as f64 * fraction).floor() as usize;
        self.train_cursor = 0;
        self.valid_cursor = 0;
        Ok(())
    }

    /// Reorders the training rows only. Equal seeds give equal permutations for
    /// equal training lengths, which keeps inputs and labels aligned.
    pub fn shuffle(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.data[..self.split].shuffle(&mut rng);
        self.train_cursor = 0;
    }
}
