use super::*;
use crate::{
    common::*,
    processor::{ImagePipeline, ImagePipelineInit},
    utils::Ratio,
};

/// The identity-balanced dataset initializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalancedIdentityDatasetInit {
    /// The manifest file listing one sample per line.
    pub manifest_file: PathBuf,
    /// The image transform options.
    #[serde(default)]
    pub pipeline: ImagePipelineInit,
    /// The fraction of identities reserved for validation.
    #[serde(default = "default_val_split")]
    pub val_split: Ratio,
    /// The number of identities composing one training batch.
    #[serde(default = "default_classes_per_batch")]
    pub classes_per_batch: NonZeroUsize,
    /// The number of images drawn per identity on every lookup.
    #[serde(default = "default_images_per_class")]
    pub images_per_class: NonZeroUsize,
    /// The split permutation options.
    #[serde(default)]
    pub split: SplitSource,
    /// The lookup sampling options.
    #[serde(default)]
    pub sampling: Sampling,
}

impl BalancedIdentityDatasetInit {
    pub async fn load(self) -> Result<BalancedIdentityDataset> {
        let Self {
            manifest_file,
            pipeline,
            val_split,
            classes_per_batch,
            images_per_class,
            split,
            sampling,
        } = self;

        let pipeline = Arc::new(pipeline.build()?);
        let samples = {
            let manifest_file = manifest_file.clone();
            tokio::task::spawn_blocking(move || load_manifest(&manifest_file, ManifestFormat::Id))
                .await??
        };
        ensure!(
            !samples.is_empty(),
            "the manifest file '{}' has no samples",
            manifest_file.display()
        );

        // remap raw identities to dense indices
        let ids: Vec<_> = samples.iter().map(|sample| sample.id).collect();
        let (classes, num_identities) = remap_ids(&ids);
        check_min_samples_per_class(&classes, images_per_class.get()).with_context(|| {
            format!(
                "cannot draw {} images per identity from the manifest file '{}'",
                images_per_class,
                manifest_file.display()
            )
        })?;

        // group sample indices by identity
        let mut id_index = vec![vec![]; num_identities];
        classes.iter().enumerate().for_each(|(index, &class)| {
            id_index[class].push(index);
        });

        let split = TrainValSplit::new(num_identities, val_split, &split)?;
        let samples: Vec<_> = samples.into_iter().map(Arc::new).collect();

        info!(
            "loaded {} samples of {} identities from '{}'",
            samples.len(),
            num_identities,
            manifest_file.display()
        );

        Ok(BalancedIdentityDataset {
            samples,
            id_index,
            num_identities,
            classes_per_batch,
            images_per_class,
            split,
            pipeline,
            rng: LookupRng::new(sampling.seed()),
        })
    }
}

fn default_val_split() -> Ratio {
    Ratio::try_from(0.01).unwrap()
}

fn default_classes_per_batch() -> NonZeroUsize {
    NonZeroUsize::new(32).unwrap()
}

fn default_images_per_class() -> NonZeroUsize {
    NonZeroUsize::new(4).unwrap()
}

/// The dataset that looks up one balanced image group per identity.
///
/// Raw identity labels are remapped to dense indices, and every record is
/// one identity. A lookup draws `images_per_class` samples of the identity
/// without replacement, so repeated lookups vary while each returned group
/// is duplicate free.
#[derive(Debug)]
pub struct BalancedIdentityDataset {
    samples: Vec<Arc<ManifestEntry>>,
    id_index: Vec<Vec<usize>>,
    num_identities: usize,
    classes_per_batch: NonZeroUsize,
    images_per_class: NonZeroUsize,
    split: TrainValSplit,
    pipeline: Arc<ImagePipeline>,
    rng: LookupRng,
}

impl BalancedIdentityDataset {
    /// Get the list of samples in manifest order.
    pub fn samples(&self) -> &[Arc<ManifestEntry>] {
        &self.samples
    }

    /// Get the sample indices of each dense identity.
    pub fn identity_index(&self) -> &[Vec<usize>] {
        &self.id_index
    }

    /// The number of identities composing one training batch.
    pub fn classes_per_batch(&self) -> NonZeroUsize {
        self.classes_per_batch
    }

    /// The number of images drawn per identity on every lookup.
    pub fn images_per_class(&self) -> NonZeroUsize {
        self.images_per_class
    }
}

impl GenericDataset for BalancedIdentityDataset {
    fn num_identities(&self) -> usize {
        self.num_identities
    }
}

impl PartitionedDataset for BalancedIdentityDataset {
    fn split(&self) -> &TrainValSplit {
        &self.split
    }
}

impl RandomAccessDataset for BalancedIdentityDataset {
    type Record = GroupRecord;

    fn num_records(&self) -> usize {
        self.num_identities
    }

    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<GroupRecord>> + Send>> {
        let num_images = self.images_per_class.get();
        let pipeline = self.pipeline.clone();
        let mut rng = self.rng.draw();
        let selected: Option<Vec<_>> = self.id_index.get(index).map(|indexes| {
            indexes
                .choose_multiple(&mut rng, num_images)
                .map(|&sample_index| self.samples[sample_index].clone())
                .collect()
        });

        Box::pin(async move {
            let selected = selected.ok_or_else(|| format_err!("invalid index {}", index))?;
            debug_assert_eq!(selected.len(), num_images);

            let images = tokio::task::spawn_blocking(move || -> Result<_> {
                let images: Vec<_> = selected
                    .iter()
                    .map(|sample| {
                        pipeline.load(&sample.image_file, &mut rng).with_context(|| {
                            format!("failed to load image file '{}'", sample.image_file.display())
                        })
                    })
                    .try_collect()?;
                Ok(Tensor::stack(&images, 0))
            })
            .await??;

            let ids = Tensor::of_slice(&vec![index as i64; num_images]);
            Ok(GroupRecord { images, ids })
        })
    }
}
