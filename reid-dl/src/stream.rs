//! Batch composition helpers over random access datasets.

use crate::{
    common::*,
    dataset::{
        GroupRecord, ImageRecord, PartitionedDataset, RandomAccessDataset, Sampling, SubsetDataset,
    },
};

/// The record types that can be stacked into one batch.
pub trait Collate
where
    Self: Sized,
{
    /// The stacked batch type.
    type Batch;

    /// Stacks a chunk of records into one batch.
    fn collate(records: Vec<Self>) -> Result<Self::Batch>;
}

/// The batch of flat image records.
#[derive(Debug, TensorLike)]
pub struct FlatBatch {
    /// The images in `[batch, channel, height, width]` shape.
    pub images: Tensor,
    /// The identity labels in `[batch]` shape.
    pub ids: Tensor,
    /// The color labels in `[batch]` shape, present when every record has one.
    pub colors: Option<Tensor>,
    /// The car type labels in `[batch]` shape, present when every record has
    /// one.
    pub car_types: Option<Tensor>,
}

impl Collate for ImageRecord {
    type Batch = FlatBatch;

    fn collate(records: Vec<Self>) -> Result<FlatBatch> {
        ensure!(!records.is_empty(), "the chunk of records must not be empty");

        let (image_vec, id_vec, color_vec, car_type_vec) = records
            .into_iter()
            .map(|record| {
                let ImageRecord {
                    image,
                    id,
                    color,
                    car_type,
                } = record;
                (image, id, color, car_type)
            })
            .unzip_n_vec();

        let images = Tensor::stack(&image_vec, 0);
        let ids = Tensor::of_slice(&id_vec);
        let colors = color_vec
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(|colors| Tensor::of_slice(&colors));
        let car_types = car_type_vec
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .map(|car_types| Tensor::of_slice(&car_types));

        Ok(FlatBatch {
            images,
            ids,
            colors,
            car_types,
        })
    }
}

/// The batch of identity balanced groups.
#[derive(Debug, TensorLike)]
pub struct GroupBatch {
    /// The images in `[class, image, channel, height, width]` shape.
    pub images: Tensor,
    /// The identity labels in `[class, image]` shape.
    pub ids: Tensor,
}

impl Collate for GroupRecord {
    type Batch = GroupBatch;

    fn collate(records: Vec<Self>) -> Result<GroupBatch> {
        ensure!(!records.is_empty(), "the chunk of records must not be empty");

        let (image_vec, id_vec) = records
            .into_iter()
            .map(|record| {
                let GroupRecord { images, ids } = record;
                (images, ids)
            })
            .unzip_n_vec();

        Ok(GroupBatch {
            images: Tensor::stack(&image_vec, 0),
            ids: Tensor::stack(&id_vec, 0),
        })
    }
}

/// The batch stream initializer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchStreamInit {
    /// The number of records composing one batch.
    pub batch_size: NonZeroUsize,
    /// If set, shuffle the record order.
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    /// The number of parallel workers, defaulting to the number of cores.
    #[serde(default)]
    pub num_workers: Option<NonZeroUsize>,
    /// The per worker buffer size, effective when `num_workers` is unset.
    #[serde(default)]
    pub worker_buf_size: Option<usize>,
    /// The sampling options for shuffling.
    #[serde(default)]
    pub sampling: Sampling,
}

impl BatchStreamInit {
    /// Builds the batch stream over the train partition.
    pub fn train_stream<D>(
        &self,
        dataset: Arc<D>,
    ) -> Result<BoxStream<'static, Result<<D::Record as Collate>::Batch>>>
    where
        D: 'static + PartitionedDataset + RandomAccessDataset + Sync,
        D::Record: 'static + Send + Collate,
        <D::Record as Collate>::Batch: 'static + Send,
    {
        let indexes = dataset.split().train_index().to_vec();
        self.subset_stream(dataset, indexes)
    }

    /// Builds the batch stream over the validation partition.
    pub fn val_stream<D>(
        &self,
        dataset: Arc<D>,
    ) -> Result<BoxStream<'static, Result<<D::Record as Collate>::Batch>>>
    where
        D: 'static + PartitionedDataset + RandomAccessDataset + Sync,
        D::Record: 'static + Send + Collate,
        <D::Record as Collate>::Batch: 'static + Send,
    {
        let indexes = dataset.split().val_index().to_vec();
        self.subset_stream(dataset, indexes)
    }

    /// Builds the batch stream over the given record indices.
    ///
    /// The stream makes one pass over the indices. Every record is loaded in
    /// parallel, and completed batches are restored to the input order. The
    /// final batch may be smaller than `batch_size`.
    pub fn subset_stream<D>(
        &self,
        dataset: Arc<D>,
        indexes: Vec<usize>,
    ) -> Result<BoxStream<'static, Result<<D::Record as Collate>::Batch>>>
    where
        D: 'static + RandomAccessDataset + Sync,
        D::Record: 'static + Send + Collate,
        <D::Record as Collate>::Batch: 'static + Send,
    {
        let Self {
            batch_size,
            shuffle,
            num_workers,
            worker_buf_size,
            sampling,
        } = *self;
        let dataset = Arc::new(SubsetDataset::new(dataset, indexes)?);

        // parallel stream config
        let par_config: par_stream::ParParams = match num_workers {
            Some(num_workers) => num_workers.get().into(),
            None => {
                let buf_size: par_stream::BufSize = match worker_buf_size {
                    Some(buf_size) => Some(buf_size).into(),
                    None => 2.0.into(),
                };
                Some(par_stream::ParParamsConfig::Manual {
                    num_workers: par_stream::NumWorkers::Default,
                    buf_size,
                })
                .into()
            }
        };

        // order records
        let mut order: Vec<_> = (0..dataset.num_records()).collect();
        if shuffle {
            match sampling.seed() {
                Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => order.shuffle(&mut StdRng::from_entropy()),
            }
        }

        // load records in parallel
        let stream = stream::iter(order)
            .enumerate()
            .map(Ok)
            .try_par_then_unordered(par_config.clone(), move |(index, record_index)| {
                let dataset = dataset.clone();

                async move {
                    let record = dataset.nth(record_index).await?;
                    anyhow::Ok((index, record))
                }
            })
            .try_reorder_enumerated();

        // group into batches
        let stream = stream
            .chunks(batch_size.get())
            .enumerate()
            .par_map_unordered(par_config, |(index, results)| {
                move || {
                    let chunk: Vec<_> = results.into_iter().try_collect()?;
                    let batch = <D::Record as Collate>::collate(chunk)?;
                    anyhow::Ok((index, batch))
                }
            })
            .try_reorder_enumerated();

        Ok(stream.boxed())
    }
}

fn default_shuffle() -> bool {
    true
}
