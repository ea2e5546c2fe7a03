use std::cmp::Ordering;

use linfa_nn::distance::{Distance, L2Dist};
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour, NearestNeighbourIndex};
use ndarray::{Array2, ArrayView1};

use crate::classify::{
    Classifier, ClassifyError, ModelKind, N_CLASSES, check_dimension, check_training_set,
};

/// k-nearest neighbours with uniform votes over a `linfa-nn` linear index.
///
/// Neighbours at equal distance are taken in training order, and a split
/// vote goes to the lower class index.
#[derive(Debug, Clone)]
pub struct Knn {
    k: usize,
    train: Array2<f64>,
    labels: Vec<usize>,
}

impl Knn {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            train: Array2::zeros((0, 0)),
            labels: Vec::new(),
        }
    }

    fn vote(
        &self,
        index: &dyn NearestNeighbourIndex<f64>,
        row: &[f64],
    ) -> Result<usize, ClassifyError> {
        let point = ArrayView1::from(row);
        // the index orders equal distances arbitrarily, so re-rank the full scan
        let mut ranked: Vec<(f64, usize)> = index
            .k_nearest(point, self.labels.len())?
            .into_iter()
            .map(|(pt, i)| (L2Dist.rdistance(point, pt), i))
            .collect();
        ranked.sort_by(|a, b| match a.0.total_cmp(&b.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });

        let mut votes = [0usize; N_CLASSES];
        for &(_, i) in ranked.iter().take(self.k) {
            votes[self.labels[i]] += 1;
        }
        let mut best = 0usize;
        for c in 1..N_CLASSES {
            if votes[c] > votes[best] {
                best = c;
            }
        }
        Ok(best)
    }
}

impl Classifier for Knn {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(), ClassifyError> {
        check_training_set(x, y)?;
        if self.k == 0 || x.nrows() < self.k {
            return Err(ClassifyError::TooFewNeighbors {
                k: self.k,
                n: x.nrows(),
            });
        }
        self.train = x.to_owned();
        self.labels = y.to_vec();
        Ok(())
    }

    fn predict_one(&self, row: &[f64]) -> Result<usize, ClassifyError> {
        if self.labels.is_empty() {
            return Err(ClassifyError::NotFitted);
        }
        check_dimension(self.train.ncols(), row.len())?;
        let index = CommonNearestNeighbour::LinearSearch.from_batch(&self.train, L2Dist)?;
        self.vote(&*index, row)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, ClassifyError> {
        if self.labels.is_empty() {
            return Err(ClassifyError::NotFitted);
        }
        check_dimension(self.train.ncols(), x.ncols())?;
        let index = CommonNearestNeighbour::LinearSearch.from_batch(&self.train, L2Dist)?;
        x.outer_iter()
            .map(|row| match row.as_slice() {
                Some(r) => self.vote(&*index, r),
                None => self.vote(&*index, &row.to_vec()),
            })
            .collect()
    }

    fn kind(&self) -> ModelKind {
        ModelKind::Knn
    }
}
