use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::ModelError;

/// Stratified train/test split over binary labels. Each class contributes
/// `round(n_class * test_size)` rows to the test set, chosen by a seeded
/// shuffle. Returns `(train_indices, test_indices)`, each ascending.
pub fn stratified_split(
    y: &[u8],
    test_size: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), ModelError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(ModelError::InvalidParams(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for class in [0u8, 1u8] {
        let mut members: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
        members.shuffle(&mut rng);

        let n_test = (members.len() as f64 * test_size).round() as usize;
        // Keep at least one training row per present class.
        let n_test = n_test.min(members.len().saturating_sub(1));

        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    if test.is_empty() {
        return Err(ModelError::InvalidParams(format!(
            "test split of {test_size} leaves no test rows out of {}",
            y.len()
        )));
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
