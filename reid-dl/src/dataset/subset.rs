use super::*;
use crate::common::*;

/// The dataset wrapper that restricts lookups to an index subset.
#[derive(Debug)]
pub struct SubsetDataset<D>
where
    D: RandomAccessDataset,
{
    dataset: Arc<D>,
    indexes: Vec<usize>,
}

impl<D> SubsetDataset<D>
where
    D: RandomAccessDataset,
{
    pub fn new(dataset: Arc<D>, indexes: Vec<usize>) -> Result<Self> {
        let num_records = dataset.num_records();
        indexes.iter().try_for_each(|&index| {
            ensure!(
                index < num_records,
                "the index {} exceeds the number of records {}",
                index,
                num_records
            );
            Ok(())
        })?;

        Ok(Self { dataset, indexes })
    }

    /// Restricts the dataset to its train partition.
    pub fn train(dataset: Arc<D>) -> Result<Self>
    where
        D: PartitionedDataset,
    {
        let indexes = dataset.split().train_index().to_vec();
        Self::new(dataset, indexes)
    }

    /// Restricts the dataset to its validation partition.
    pub fn val(dataset: Arc<D>) -> Result<Self>
    where
        D: PartitionedDataset,
    {
        let indexes = dataset.split().val_index().to_vec();
        Self::new(dataset, indexes)
    }

    /// Get the retained indices of the underlying dataset.
    pub fn indexes(&self) -> &[usize] {
        &self.indexes
    }
}

impl<D> GenericDataset for SubsetDataset<D>
where
    D: RandomAccessDataset + Sync,
{
    fn num_identities(&self) -> usize {
        self.dataset.num_identities()
    }
}

impl<D> RandomAccessDataset for SubsetDataset<D>
where
    D: RandomAccessDataset + Sync,
    D::Record: Send + 'static,
{
    type Record = D::Record;

    fn num_records(&self) -> usize {
        self.indexes.len()
    }

    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<D::Record>> + Send>> {
        match self.indexes.get(index).copied() {
            Some(orig_index) => self.dataset.nth(orig_index),
            None => Box::pin(future::ready(Err(format_err!("invalid index {}", index)))),
        }
    }
}
