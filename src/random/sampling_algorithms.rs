//! Algorithms for uniform random sampling from iterators of known length. These are written to be
//! generic over the container type, so unit worklists and filtered agent lists can be sampled
//! without first being collected.

use crate::rand::seq::index::sample as choose_range;
use crate::rand::Rng;

/// Sample multiple random elements uniformly without replacement from a container of known length.
/// At most `iter.len()` elements are returned.
///
/// Selected items come back in iteration order, not in draw order, so the result only depends on
/// which indices were drawn.
pub fn sample_multiple_from_known_length<I, R, T>(rng: &mut R, iter: I, requested: usize) -> Vec<T>
where
    R: Rng,
    I: IntoIterator<Item = T> + ExactSizeIterator<Item = T>,
{
    let requested = requested.min(iter.len());
    if requested == 0 {
        return Vec::new();
    }

    let mut indexes = Vec::with_capacity(requested);
    indexes.extend(choose_range(rng, iter.len(), requested));
    indexes.sort_unstable();
    let mut index_iterator = indexes.into_iter();
    let mut next_idx = index_iterator.next();
    let mut selected = Vec::with_capacity(requested);

    for (idx, item) in iter.enumerate() {
        if Some(idx) == next_idx {
            selected.push(item);
            next_idx = index_iterator.next();
            if next_idx.is_none() {
                break;
            }
        }
    }

    selected
}
