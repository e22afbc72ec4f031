use crate::common::*;

/// The record with image pixels and labels.
#[derive(Debug, TensorLike)]
pub struct ImageRecord {
    /// Image pixels with shape `[3, height, width]`.
    pub image: Tensor,
    #[tensor_like(clone)]
    pub id: i64,
    #[tensor_like(clone)]
    pub color: Option<i64>,
    #[tensor_like(clone)]
    pub car_type: Option<i64>,
}

/// The group of records drawn from one identity.
#[derive(Debug, TensorLike)]
pub struct GroupRecord {
    /// Image pixels with shape `[images_per_id, 3, height, width]`.
    pub images: Tensor,
    /// Identity labels with shape `[images_per_id]`.
    pub ids: Tensor,
}
