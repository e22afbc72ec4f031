//! Data pipeline configuration format.

use crate::{
    common::*,
    dataset::{BalancedIdentityDatasetInit, FlatDatasetInit},
    stream::BatchStreamInit,
};

/// The main data pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub stream: BatchStreamInit,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }
}

/// Variants of dataset and options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DatasetConfig {
    /// Flat dataset options.
    Flat(FlatDatasetInit),
    /// Identity balanced dataset options.
    Balanced(BalancedIdentityDatasetInit),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Sampling;

    #[test]
    fn config_parses_json5() -> Result<()> {
        let text = r#"{
    dataset: {
        type: "Balanced",
        manifest_file: "data/train.txt",
        val_split: 0.01,
        classes_per_batch: 32,
        images_per_class: 4,
        pipeline: {
            output_hw: [224, 224],
            random_crop: true,
            horizontal_flip: true,
            jitter: { type: "Lighting" },
        },
        sampling: { type: "Seed", seed: 42 },
    },
    stream: {
        batch_size: 32,
        num_workers: 8,
    },
}"#;

        let config: Config = json5::from_str(text)?;
        let dataset = match config.dataset {
            DatasetConfig::Balanced(init) => init,
            DatasetConfig::Flat(_) => bail!("expect a balanced dataset"),
        };
        assert_eq!(dataset.manifest_file, PathBuf::from("data/train.txt"));
        assert_eq!(dataset.classes_per_batch.get(), 32);
        assert_eq!(dataset.images_per_class.get(), 4);
        assert!(dataset.pipeline.random_crop);
        assert!(dataset.pipeline.horizontal_flip);
        assert_eq!(dataset.sampling, Sampling::Seed { seed: 42 });
        assert_eq!(config.stream.batch_size.get(), 32);
        assert_eq!(config.stream.num_workers, NonZeroUsize::new(8));
        assert!(config.stream.shuffle);

        Ok(())
    }
}
