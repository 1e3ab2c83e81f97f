//! Seeded, label-stratified train/evaluation partitioning.

use crate::data::Dataset;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error(
        "The dataset has {positives} respondents with the condition and {negatives} without. Both classes need at least two respondents to be stratified."
    )]
    ClassTooSmall { positives: usize, negatives: usize },
    #[error("Train fraction {0} must lie strictly between 0 and 1.")]
    InvalidFraction(f64),
}

/// The two partitions produced by [`stratified_split`].
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub train: Dataset,
    pub evaluation: Dataset,
}

/// Splits `dataset` so that both partitions keep the outcome proportion.
///
/// Each label class is shuffled independently with a generator seeded from `seed`;
/// `round(n_class * train_fraction)` of its records go to training, clamped to
/// `1..n_class` so both partitions see both classes. Within a partition records keep
/// their original dataset order.
pub fn stratified_split(
    dataset: &Dataset,
    train_fraction: f64,
    seed: u64,
) -> Result<Partition, SplitError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(train_fraction));
    }

    let (mut positive, mut negative): (Vec<usize>, Vec<usize>) =
        (0..dataset.len()).partition(|&i| dataset.records()[i].has_condition);
    if positive.len() < 2 || negative.len() < 2 {
        return Err(SplitError::ClassTooSmall {
            positives: positive.len(),
            negatives: negative.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(dataset.len());
    let mut evaluation = Vec::with_capacity(dataset.len());
    for class in [&mut negative, &mut positive] {
        class.shuffle(&mut rng);
        let n_train = class_train_count(class.len(), train_fraction);
        train.extend_from_slice(&class[..n_train]);
        evaluation.extend_from_slice(&class[n_train..]);
    }
    train.sort_unstable();
    evaluation.sort_unstable();

    log::info!(
        "Stratified split (seed {seed}): {} training, {} evaluation respondents.",
        train.len(),
        evaluation.len()
    );

    Ok(Partition {
        train: dataset.subset(&train),
        evaluation: dataset.subset(&evaluation),
    })
}

fn class_train_count(class_size: usize, train_fraction: f64) -> usize {
    let target = (class_size as f64 * train_fraction).round() as usize;
    target.clamp(1, class_size - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Record, Sex};
    use std::collections::HashSet;

    fn dataset(n: usize, positives_every: usize) -> Dataset {
        let records = (0..n)
            .map(|i| Record {
                has_condition: i % positives_every == 0,
                age: 20.0 + i as f64,
                sex: if i % 2 == 0 { Sex::Male } else { Sex::Female },
                bmi: 25.0,
                systolic_bp: 120.0,
                physically_active: i % 3 == 0,
            })
            .collect();
        Dataset::new(records)
    }

    #[test]
    fn partitions_preserve_label_proportion() {
        let data = dataset(1000, 10);
        let split = stratified_split(&data, 0.7, 42).unwrap();
        assert_eq!(split.train.len() + split.evaluation.len(), 1000);
        assert_eq!(split.train.positives(), 70);
        assert_eq!(split.evaluation.positives(), 30);
        assert_eq!(split.train.len(), 700);
        assert_eq!(split.evaluation.len(), 300);
    }

    #[test]
    fn rounding_stays_within_one_record_per_class() {
        for &(n, every) in &[(37, 4), (101, 7), (53, 2), (29, 9)] {
            let data = dataset(n, every);
            let positives = data.positives();
            let negatives = n - positives;
            let split = stratified_split(&data, 0.7, 3).unwrap();
            let expected_pos = positives as f64 * 0.7;
            let expected_neg = negatives as f64 * 0.7;
            let train_pos = split.train.positives() as f64;
            let train_neg = (split.train.len() - split.train.positives()) as f64;
            assert!((train_pos - expected_pos).abs() <= 0.5 + 1e-9);
            assert!((train_neg - expected_neg).abs() <= 0.5 + 1e-9);
            assert!(split.evaluation.positives() >= 1);
        }
    }

    #[test]
    fn partitions_are_disjoint_and_cover_the_dataset() {
        let data = dataset(200, 5);
        let split = stratified_split(&data, 0.7, 11).unwrap();
        // Ages are unique, so they identify records.
        let train: HashSet<u64> = split.train.records().iter().map(|r| r.age as u64).collect();
        let evaluation: HashSet<u64> = split
            .evaluation
            .records()
            .iter()
            .map(|r| r.age as u64)
            .collect();
        assert!(train.is_disjoint(&evaluation));
        assert_eq!(train.len() + evaluation.len(), 200);
    }

    #[test]
    fn same_seed_same_split_and_different_seed_differs() {
        let data = dataset(300, 6);
        let a = stratified_split(&data, 0.7, 99).unwrap();
        let b = stratified_split(&data, 0.7, 99).unwrap();
        let c = stratified_split(&data, 0.7, 100).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn records_keep_dataset_order() {
        let data = dataset(120, 4);
        let split = stratified_split(&data, 0.7, 5).unwrap();
        let ages: Vec<f64> = split.train.records().iter().map(|r| r.age).collect();
        assert!(ages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn single_class_cannot_be_stratified() {
        let data = dataset(50, 1);
        let err = stratified_split(&data, 0.7, 1).unwrap_err();
        assert_eq!(
            err,
            SplitError::ClassTooSmall {
                positives: 50,
                negatives: 0
            }
        );
    }
}
