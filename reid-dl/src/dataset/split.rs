use crate::{common::*, utils::Ratio};

/// Variants of split permutation sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SplitSource {
    /// Permute indices with a nondeterministically seeded RNG.
    Entropy,
    /// Permute indices with a seeded RNG.
    Seed { seed: u64 },
    /// Read the permutation from a JSON index array file.
    File { file: PathBuf },
}

impl Default for SplitSource {
    fn default() -> Self {
        Self::Entropy
    }
}

impl SplitSource {
    fn permutation(&self, len: usize) -> Result<Vec<usize>> {
        let permutation = match *self {
            Self::Entropy => shuffled_indexes(len, &mut StdRng::from_entropy()),
            Self::Seed { seed } => shuffled_indexes(len, &mut StdRng::seed_from_u64(seed)),
            Self::File { ref file } => load_permutation_file(file, len)?,
        };
        Ok(permutation)
    }
}

fn shuffled_indexes(len: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut indexes: Vec<_> = (0..len).collect();
    indexes.shuffle(rng);
    indexes
}

/// Loads a permutation of `0..expect_len` from a JSON array file.
pub fn load_permutation_file(path: impl AsRef<Path>, expect_len: usize) -> Result<Vec<usize>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read permutation file '{}'", path.display()))?;
    let indexes: Vec<usize> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse permutation file '{}'", path.display()))?;

    ensure!(
        indexes.len() == expect_len,
        "the permutation file '{}' has {} indices, but the dataset has {} records",
        path.display(),
        indexes.len(),
        expect_len
    );

    let mut seen = vec![false; expect_len];
    indexes.iter().try_for_each(|&index| {
        ensure!(
            index < expect_len,
            "the permutation file '{}' contains an out of bound index {}",
            path.display(),
            index
        );
        ensure!(
            !seen[index],
            "the permutation file '{}' contains a duplicated index {}",
            path.display(),
            index
        );
        seen[index] = true;
        Ok(())
    })?;

    Ok(indexes)
}

/// The train/validation partition of record indices.
///
/// A prefix of the permutation of size `floor(len * val_split)` forms the
/// validation set, and the remaining suffix forms the train set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainValSplit {
    train_index: Vec<usize>,
    val_index: Vec<usize>,
}

impl TrainValSplit {
    pub fn new(len: usize, val_split: Ratio, source: &SplitSource) -> Result<Self> {
        let permutation = source.permutation(len)?;
        let num_val = (len as f64 * val_split.to_f64()) as usize;
        let val_index = permutation[..num_val].to_vec();
        let train_index = permutation[num_val..].to_vec();

        if len > 0 && val_index.is_empty() {
            warn!(
                "the validation split {} of {} records rounds down to zero",
                val_split, len
            );
        }

        Ok(Self {
            train_index,
            val_index,
        })
    }

    pub fn train_index(&self) -> &[usize] {
        &self.train_index
    }

    pub fn val_index(&self) -> &[usize] {
        &self.val_index
    }

    pub fn num_train(&self) -> usize {
        self.train_index.len()
    }

    pub fn num_val(&self) -> usize {
        self.val_index.len()
    }
}
