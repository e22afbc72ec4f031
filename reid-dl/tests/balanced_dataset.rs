use anyhow::Result;
use futures::TryStreamExt;
use reid_dl::{
    dataset::{
        BalancedIdentityDatasetInit, GenericDataset, PartitionedDataset, RandomAccessDataset,
        Sampling, SplitSource,
    },
    processor::ImagePipelineInit,
    stream::{BatchStreamInit, GroupBatch},
    utils::Ratio,
};
use std::{
    collections::HashSet,
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
use tch::{kind::FLOAT_CPU, vision, IndexOp, Kind, Tensor};

/// Writes a constant valued image, so a decoded image identifies its source
/// row by its mean pixel value.
fn write_image(path: impl AsRef<Path>, value: i64) -> Result<()> {
    let image = (Tensor::ones(&[3, 32, 24], FLOAT_CPU) * value as f64).to_kind(Kind::Uint8);
    vision::image::save(&image, path)?;
    Ok(())
}

fn small_pipeline() -> ImagePipelineInit {
    ImagePipelineInit {
        output_hw: [nz(16), nz(16)],
        random_crop: false,
        horizontal_flip: false,
        jitter: None,
        normalize: false,
    }
}

fn nz(value: usize) -> NonZeroUsize {
    NonZeroUsize::new(value).unwrap()
}

/// Writes one image per (row, file id) pair and the manifest listing them.
fn build_fixture(dir: &Path, file_ids: &[i64]) -> Result<PathBuf> {
    let lines: Vec<_> = file_ids
        .iter()
        .enumerate()
        .map(|(row, &file_id)| -> Result<_> {
            let image_file = dir.join(format!("img_{:03}.png", row));
            write_image(&image_file, row as i64)?;
            Ok(format!("{} {}", image_file.display(), file_id))
        })
        .collect::<Result<_>>()?;
    let manifest_file = dir.join("train.txt");
    fs::write(&manifest_file, lines.join("\n"))?;
    Ok(manifest_file)
}

/// Recovers the source rows of a `[images, 3, height, width]` group tensor
/// from the constant pixel values.
fn source_rows(images: &Tensor) -> Result<Vec<i64>> {
    let num_images = images.size4()?.0;
    let rows = (0..num_images)
        .map(|index| {
            let mean = f64::from(&images.i(index).mean(Kind::Float));
            (mean * 255.0).round() as i64
        })
        .collect();
    Ok(rows)
}

#[tokio::test]
async fn balanced_dataset_groups_by_identity() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // three identities with file ids 5, 7 and 9, each appearing six times
    let file_ids: Vec<_> = [5i64, 7, 9]
        .iter()
        .flat_map(|&file_id| vec![file_id; 6])
        .collect();
    let manifest_file = build_fixture(dir.path(), &file_ids)?;

    let dataset = BalancedIdentityDatasetInit {
        manifest_file,
        pipeline: small_pipeline(),
        val_split: Ratio::try_from(0.0)?,
        classes_per_batch: nz(2),
        images_per_class: nz(4),
        split: SplitSource::Seed { seed: 1 },
        sampling: Sampling::Entropy,
    }
    .load()
    .await?;

    assert_eq!(dataset.num_identities(), 3);
    assert_eq!(dataset.num_records(), 3);
    assert_eq!(dataset.images_per_class().get(), 4);
    let expect_index: Vec<Vec<usize>> = vec![
        (0..6).collect(),
        (6..12).collect(),
        (12..18).collect(),
    ];
    assert_eq!(dataset.identity_index(), expect_index);

    // a lookup returns four distinct images of the queried identity
    let record = dataset.nth(1).await?;
    assert_eq!(record.images.size(), [4, 3, 16, 16]);
    assert_eq!(record.ids, Tensor::of_slice(&[1i64, 1, 1, 1]));

    let rows = source_rows(&record.images)?;
    let unique: HashSet<_> = rows.iter().copied().collect();
    assert_eq!(unique.len(), 4);
    assert!(rows.iter().all(|&row| (6..12).contains(&row)));

    // selected subsets vary across lookups
    let mut subsets = HashSet::new();
    for _ in 0..10 {
        let record = dataset.nth(1).await?;
        let mut rows = source_rows(&record.images)?;
        rows.sort_unstable();
        subsets.insert(rows);
    }
    assert!(subsets.len() > 1);

    assert!(dataset.nth(3).await.is_err());

    Ok(())
}

#[tokio::test]
async fn balanced_construction_rejects_scarce_identity() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // the identity with file id 9 appears only twice
    let mut file_ids = vec![5i64; 6];
    file_ids.extend(vec![7; 6]);
    file_ids.extend(vec![9; 2]);
    let manifest_file = build_fixture(dir.path(), &file_ids)?;

    let err = BalancedIdentityDatasetInit {
        manifest_file,
        pipeline: small_pipeline(),
        val_split: Ratio::try_from(0.0)?,
        classes_per_batch: nz(2),
        images_per_class: nz(4),
        split: SplitSource::Seed { seed: 1 },
        sampling: Sampling::Entropy,
    }
    .load()
    .await
    .err()
    .unwrap();

    let message = format!("{:?}", err);
    assert!(message.contains("at least 4"));

    Ok(())
}

#[tokio::test]
async fn balanced_split_partitions_identities() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file_ids: Vec<_> = (1i64..=10)
        .flat_map(|file_id| vec![file_id; 4])
        .collect();
    let manifest_file = build_fixture(dir.path(), &file_ids)?;

    let dataset = BalancedIdentityDatasetInit {
        manifest_file,
        pipeline: small_pipeline(),
        val_split: Ratio::try_from(0.3)?,
        classes_per_batch: nz(2),
        images_per_class: nz(4),
        split: SplitSource::Seed { seed: 9 },
        sampling: Sampling::Entropy,
    }
    .load()
    .await?;

    let split = dataset.split();
    assert_eq!(split.num_val(), 3);
    assert_eq!(split.num_train(), 7);

    let mut identities: Vec<_> = split
        .train_index()
        .iter()
        .chain(split.val_index())
        .copied()
        .collect();
    identities.sort_unstable();
    let expect: Vec<_> = (0..10).collect();
    assert_eq!(identities, expect);

    Ok(())
}

#[tokio::test]
async fn balanced_stream_composes_group_batches() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file_ids: Vec<_> = [5i64, 7, 9]
        .iter()
        .flat_map(|&file_id| vec![file_id; 6])
        .collect();
    let manifest_file = build_fixture(dir.path(), &file_ids)?;

    let dataset = Arc::new(
        BalancedIdentityDatasetInit {
            manifest_file,
            pipeline: small_pipeline(),
            val_split: Ratio::try_from(0.0)?,
            classes_per_batch: nz(2),
            images_per_class: nz(4),
            split: SplitSource::Seed { seed: 2 },
            sampling: Sampling::Seed { seed: 2 },
        }
        .load()
        .await?,
    );

    let init = BatchStreamInit {
        batch_size: dataset.classes_per_batch(),
        shuffle: true,
        num_workers: Some(nz(2)),
        worker_buf_size: None,
        sampling: Sampling::Seed { seed: 2 },
    };
    let batches: Vec<GroupBatch> = init.train_stream(dataset.clone())?.try_collect().await?;

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].images.size(), [2, 4, 3, 16, 16]);
    assert_eq!(batches[0].ids.size(), [2, 4]);
    assert_eq!(batches[1].images.size(), [1, 4, 3, 16, 16]);

    // every identity appears in exactly one batch
    let mut identities: Vec<i64> = batches
        .iter()
        .flat_map(|batch| {
            let num_groups = batch.ids.size()[0];
            (0..num_groups)
                .map(|group| i64::from(&batch.ids.i((group, 0))))
                .collect::<Vec<_>>()
        })
        .collect();
    identities.sort_unstable();
    assert_eq!(identities, [0, 1, 2]);

    Ok(())
}
