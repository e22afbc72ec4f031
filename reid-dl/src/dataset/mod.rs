//! Dataset loading and sampling toolkit.

mod balanced;
mod dataset_;
mod flat;
mod manifest;
mod record;
mod split;
mod subset;
mod utils;

pub use balanced::*;
pub use dataset_::*;
pub use flat::*;
pub use manifest::*;
pub use record::*;
pub use split::*;
pub use subset::*;
pub use utils::*;
