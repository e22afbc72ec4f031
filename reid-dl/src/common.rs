pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use approx::{abs_diff_eq, assert_abs_diff_eq, AbsDiffEq};
pub use futures::{
    future,
    future::FutureExt as _,
    stream::{self, BoxStream, Stream, StreamExt as _, TryStreamExt as _},
};
pub use itertools::{izip, Itertools as _};
pub use log::{info, warn};
pub use noisy_float::prelude::*;
pub use par_stream::prelude::*;
pub use rand::prelude::*;
pub use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    collections::{HashMap, HashSet},
    convert::{TryFrom, TryInto},
    fmt,
    fmt::{Debug, Display, Formatter},
    future::Future,
    num::NonZeroUsize,
    ops::Range,
    path::{Path, PathBuf},
    pin::Pin,
    sync::{
        atomic::{self, AtomicU64},
        Arc,
    },
};
pub use tch::{
    kind::{FLOAT_CPU, INT64_CPU},
    vision, Device, IndexOp, Kind, Tensor,
};
pub use tch_tensor_like::TensorLike;

unzip_n::unzip_n!(pub 2);
unzip_n::unzip_n!(pub 4);
