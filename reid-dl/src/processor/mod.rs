//! Data preprocessing building blocks.

pub mod jitter;
pub mod pipeline;

pub use jitter::*;
pub use pipeline::*;
