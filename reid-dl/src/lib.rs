//! The building blocks of re-identification training data pipelines.

mod common;
pub mod config;
pub mod dataset;
pub mod processor;
pub mod stream;
pub mod utils;
