use crate::digit_csv::DigitTable;

use log::info;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;

pub const DEFAULT_HOLDOUT_SEED: u64 = 555;
pub const DEFAULT_NUM_HOLDOUT: usize = 5000;

pub struct HoldoutSplit {
    /// training rows in the original order
    pub train: Vec<usize>,
    /// held-out rows in the original order
    pub valid: Vec<usize>,
}

/// Hold out `n_valid` random rows out of `n_total`, at most half of
/// them; the same seed always picks the same rows
pub fn holdout_split(n_total: usize, n_valid: usize, seed: u64) -> HoldoutSplit {
    let n_valid = n_valid.min(n_total / 2);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut is_valid = vec![false; n_total];
    for i in sample(&mut rng, n_total, n_valid).into_iter() {
        is_valid[i] = true;
    }

    let (valid, train): (Vec<usize>, Vec<usize>) = (0..n_total).partition(|&i| is_valid[i]);
    HoldoutSplit { train, valid }
}

pub struct TrainValid {
    pub train: DigitTable,
    pub valid: DigitTable,
}

/// Split a table by `holdout_split`
pub fn split_table(table: &DigitTable, n_valid: usize, seed: u64) -> TrainValid {
    let split = holdout_split(table.nrows(), n_valid, seed);
    info!(
        "{} training and {} held-out images",
        split.train.len(),
        split.valid.len()
    );
    TrainValid {
        train: table.select_rows(&split.train),
        valid: table.select_rows(&split.valid),
    }
}
