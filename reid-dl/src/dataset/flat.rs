use super::*;
use crate::{
    common::*,
    processor::{ImagePipeline, ImagePipelineInit},
    utils::Ratio,
};

/// The flat re-identification dataset initializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlatDatasetInit {
    /// The manifest file listing one sample per line.
    pub manifest_file: PathBuf,
    /// The manifest line format.
    #[serde(default)]
    pub format: ManifestFormat,
    /// The image transform options.
    #[serde(default)]
    pub pipeline: ImagePipelineInit,
    /// The fraction of records reserved for validation.
    #[serde(default = "default_val_split")]
    pub val_split: Ratio,
    /// The split permutation options.
    #[serde(default)]
    pub split: SplitSource,
    /// The lookup sampling options.
    #[serde(default)]
    pub sampling: Sampling,
}

impl FlatDatasetInit {
    pub async fn load(self) -> Result<FlatDataset> {
        let Self {
            manifest_file,
            format,
            pipeline,
            val_split,
            split,
            sampling,
        } = self;

        let pipeline = Arc::new(pipeline.build()?);
        let samples = {
            let manifest_file = manifest_file.clone();
            tokio::task::spawn_blocking(move || load_manifest(&manifest_file, format)).await??
        };
        ensure!(
            !samples.is_empty(),
            "the manifest file '{}' has no samples",
            manifest_file.display()
        );

        let num_identities = samples.iter().map(|sample| sample.id).unique().count();
        let num_colors = samples
            .iter()
            .filter_map(|sample| sample.color)
            .unique()
            .count();
        let num_car_types = samples
            .iter()
            .filter_map(|sample| sample.car_type)
            .unique()
            .count();
        let split = TrainValSplit::new(samples.len(), val_split, &split)?;
        let samples: Vec<_> = samples.into_iter().map(Arc::new).collect();

        info!(
            "loaded {} samples of {} identities from '{}'",
            samples.len(),
            num_identities,
            manifest_file.display()
        );

        Ok(FlatDataset {
            samples,
            num_identities,
            num_colors,
            num_car_types,
            split,
            pipeline,
            rng: LookupRng::new(sampling.seed()),
        })
    }
}

fn default_val_split() -> Ratio {
    Ratio::try_from(0.05).unwrap()
}

/// The dataset that looks up one labeled image per record.
///
/// Identity labels are kept as they appear in the manifest. Lookups decode
/// and transform the image on demand.
#[derive(Debug)]
pub struct FlatDataset {
    samples: Vec<Arc<ManifestEntry>>,
    num_identities: usize,
    num_colors: usize,
    num_car_types: usize,
    split: TrainValSplit,
    pipeline: Arc<ImagePipeline>,
    rng: LookupRng,
}

impl FlatDataset {
    /// Get the list of samples in manifest order.
    pub fn samples(&self) -> &[Arc<ManifestEntry>] {
        &self.samples
    }

    /// The number of distinct color labels.
    pub fn num_colors(&self) -> usize {
        self.num_colors
    }

    /// The number of distinct car type labels.
    pub fn num_car_types(&self) -> usize {
        self.num_car_types
    }
}

impl GenericDataset for FlatDataset {
    fn num_identities(&self) -> usize {
        self.num_identities
    }
}

impl PartitionedDataset for FlatDataset {
    fn split(&self) -> &TrainValSplit {
        &self.split
    }
}

impl RandomAccessDataset for FlatDataset {
    type Record = ImageRecord;

    fn num_records(&self) -> usize {
        self.samples.len()
    }

    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<ImageRecord>> + Send>> {
        let sample = self.samples.get(index).cloned();
        let pipeline = self.pipeline.clone();
        let mut rng = self.rng.draw();

        Box::pin(async move {
            let sample = sample.ok_or_else(|| format_err!("invalid index {}", index))?;
            let ManifestEntry { id, color, car_type, .. } = *sample;

            let image = tokio::task::spawn_blocking(move || {
                pipeline.load(&sample.image_file, &mut rng).with_context(|| {
                    format!("failed to load image file '{}'", sample.image_file.display())
                })
            })
            .await??;

            Ok(ImageRecord {
                image,
                id,
                color,
                car_type,
            })
        })
    }
}
