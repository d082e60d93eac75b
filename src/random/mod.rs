//! Named random streams.
//!
//! Each stream declared with [`define_rng!`](crate::define_rng) is seeded from the realization's
//! base seed plus a hash of its name, so extra draws on one stream never shift another.
mod context_ext;
mod macros;
mod sampling_algorithms;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use context_ext::ContextRandomExt;
pub use sampling_algorithms::sample_multiple_from_known_length;

use crate::rand::SeedableRng;
use crate::{define_data_plugin, HashMap};

/// Key type of one stream.
pub trait RngId: Copy {
    type RngType: SeedableRng;
    const NAME: &'static str;
}

struct RngData {
    base_seed: u64,
    /// Streams created so far in this realization, boxed `RngId::RngType`s keyed by id type.
    streams: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

define_data_plugin!(
    RngPlugin,
    RngData,
    RngData {
        base_seed: 0,
        streams: RefCell::new(HashMap::default()),
    }
);
