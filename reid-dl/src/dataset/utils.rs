use crate::common::*;

/// Maps arbitrary integer labels to dense zero-based indices.
///
/// Returns the dense index of every input label along with the number of
/// distinct labels. Dense indices follow the ascending order of raw labels,
/// so equal raw labels always share one dense index and the mapping is
/// monotonic in the raw label value.
pub fn remap_ids(ids: &[i64]) -> (Vec<usize>, usize) {
    let unique: Vec<i64> = {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        unique
    };
    let index_of: HashMap<i64, usize> = unique
        .iter()
        .enumerate()
        .map(|(index, &id)| (id, index))
        .collect();
    let classes: Vec<_> = ids.iter().map(|id| index_of[id]).collect();

    (classes, unique.len())
}

/// Verifies that every dense identity has at least `min_count` samples.
///
/// A group lookup draws `min_count` distinct images of one identity, so an
/// identity with fewer samples can never fill its group.
pub fn check_min_samples_per_class(classes: &[usize], min_count: usize) -> Result<()> {
    let mut counts = HashMap::new();
    classes.iter().for_each(|&class| {
        *counts.entry(class).or_insert(0usize) += 1;
    });

    counts.into_iter().sorted().try_for_each(|(class, count)| {
        ensure!(
            count >= min_count,
            "identity {} has only {} samples, but at least {} are required",
            class,
            count,
            min_count
        );
        Ok(())
    })
}

/// Variants of per-lookup sampling seed policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Sampling {
    /// Sample with a nondeterministically seeded RNG.
    Entropy,
    /// Derive one RNG per lookup from the seed and the lookup ordinal.
    Seed { seed: u64 },
}

impl Default for Sampling {
    fn default() -> Self {
        Self::Entropy
    }
}

impl Sampling {
    pub(crate) fn seed(&self) -> Option<u64> {
        match *self {
            Self::Entropy => None,
            Self::Seed { seed } => Some(seed),
        }
    }
}

/// The per-lookup random source of a dataset instance.
///
/// Each call to [draw](LookupRng::draw) hands out an independent RNG. With a
/// fixed seed the n-th handed RNG is a pure function of the seed and n, so
/// lookups stay reproducible while concurrent callers never contend on one
/// RNG state.
#[derive(Debug)]
pub(crate) struct LookupRng {
    seed: Option<u64>,
    draws: AtomicU64,
}

impl LookupRng {
    pub fn new(seed: impl Into<Option<u64>>) -> Self {
        Self {
            seed: seed.into(),
            draws: AtomicU64::new(0),
        }
    }

    pub fn draw(&self) -> StdRng {
        match self.seed {
            Some(seed) => {
                let nth = self.draws.fetch_add(1, atomic::Ordering::Relaxed);
                StdRng::seed_from_u64(seed ^ nth.wrapping_mul(0x9e37_79b9_7f4a_7c15))
            }
            None => StdRng::from_entropy(),
        }
    }
}
