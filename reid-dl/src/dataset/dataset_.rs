use super::*;
use crate::common::*;

/// The generic dataset trait.
pub trait GenericDataset
where
    Self: Debug + Send,
{
    /// The number of distinct identities of the dataset.
    fn num_identities(&self) -> usize;
}

/// The dataset with a train/validation partition.
pub trait PartitionedDataset
where
    Self: GenericDataset,
{
    /// Get the train/validation partition of record indices.
    fn split(&self) -> &TrainValSplit;
}

/// The dataset that can be random accessed.
pub trait RandomAccessDataset
where
    Self: GenericDataset,
{
    /// The record type returned by a lookup.
    type Record;

    /// Get number of records in the dataset.
    fn num_records(&self) -> usize;

    /// Get the nth record in the dataset.
    fn nth(&self, index: usize) -> Pin<Box<dyn Future<Output = Result<Self::Record>> + Send>>;
}
