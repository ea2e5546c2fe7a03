use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::classify::{ClassifyError, N_CLASSES};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified K-fold split.
///
/// Per-class fold sizes come from dealing the class-sorted label list
/// round-robin over the folds. Without a seed, each class fills folds in
/// sample order; with a seed, the fold assignment within each class is
/// shuffled by a seeded `StdRng`.
pub fn stratified_folds(
    labels: &[usize],
    n_splits: usize,
    seed: Option<u64>,
) -> Result<Vec<Fold>, ClassifyError> {
    let n = labels.len();
    if n_splits < 2 {
        return Err(ClassifyError::Folds(format!(
            "need at least 2 folds, got {n_splits}"
        )));
    }
    if n_splits > n {
        return Err(ClassifyError::Folds(format!(
            "cannot split {n} samples into {n_splits} folds"
        )));
    }
    let mut counts = [0usize; N_CLASSES];
    for &c in labels {
        if c >= N_CLASSES {
            return Err(ClassifyError::BadLabel(c));
        }
        counts[c] += 1;
    }
    if counts.iter().all(|&c| n_splits > c) {
        return Err(ClassifyError::Folds(format!(
            "{n_splits} folds exceed the size of every class {counts:?}"
        )));
    }
    let smallest = counts.iter().copied().filter(|&c| c > 0).min().unwrap_or(0);
    if smallest < n_splits {
        tracing::warn!(
            smallest,
            n_splits, "least populated class has fewer members than folds"
        );
    }

    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    let mut allocation = vec![[0usize; N_CLASSES]; n_splits];
    for (pos, &c) in sorted.iter().enumerate() {
        allocation[pos % n_splits][c] += 1;
    }

    let mut rng = seed.map(StdRng::seed_from_u64);
    let mut test_fold = vec![0usize; n];
    for class in 0..N_CLASSES {
        let mut per_class: Vec<usize> = Vec::with_capacity(counts[class]);
        for (fold, alloc) in allocation.iter().enumerate() {
            per_class.extend(std::iter::repeat_n(fold, alloc[class]));
        }
        if let Some(rng) = rng.as_mut() {
            per_class.shuffle(rng);
        }
        let members = labels
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == class)
            .map(|(i, _)| i);
        for (sample, fold) in members.zip(per_class) {
            test_fold[sample] = fold;
        }
    }

    Ok((0..n_splits)
        .map(|index| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..n).partition(|&i| test_fold[i] == index);
            Fold { index, train, test }
        })
        .collect())
}
