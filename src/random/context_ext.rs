use std::any::{Any, TypeId};
use std::cell::RefMut;

use log::trace;

use crate::hashing::hash_str;
use crate::rand::seq::SliceRandom;
use crate::rand::{Rng, SeedableRng};
use crate::random::{sample_multiple_from_known_length, RngId, RngPlugin};
use crate::Context;

/// The stream for `R`, created from the base seed on first use. Panics if `init_random` was
/// never called.
fn get_rng<R: RngId + 'static>(context: &Context) -> RefMut<R::RngType> {
    let data = context.get_data(RngPlugin);
    let streams = data.streams.borrow_mut();
    RefMut::map(streams, |streams| {
        streams
            .entry(TypeId::of::<R>())
            .or_insert_with(|| {
                trace!("creating stream {} (seed={})", R::NAME, data.base_seed);
                let seed = data.base_seed.wrapping_add(hash_str(R::NAME));
                Box::new(R::RngType::seed_from_u64(seed)) as Box<dyn Any>
            })
            .downcast_mut::<R::RngType>()
            .expect("stream stored under the wrong type")
    })
}

pub trait ContextRandomExt {
    /// Sets the base seed and drops every stream, so each one restarts from the new seed on its
    /// next draw.
    fn init_random(&mut self, base_seed: u64);

    /// Applies `sampler` to the stream named by `rng_type`.
    fn sample<R: RngId + 'static, T>(
        &self,
        rng_type: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T;

    /// A uniform draw in `[0, 1)`.
    fn sample_uniform<R: RngId + 'static>(&self, rng_id: R) -> f64
    where
        R::RngType: Rng;

    /// Shuffles `items` in place.
    fn shuffle<R: RngId + 'static, T>(&self, rng_id: R, items: &mut [T])
    where
        R::RngType: Rng;

    /// Draws `requested` items from `items` without replacement, keeping their
    /// input order. Returns fewer when `items` is shorter.
    fn sample_without_replacement<R: RngId + 'static, T: Clone>(
        &self,
        rng_id: R,
        items: &[T],
        requested: usize,
    ) -> Vec<T>
    where
        R::RngType: Rng;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("random streams seeded from {base_seed}");
        let data = self.get_data_mut(RngPlugin);
        data.base_seed = base_seed;
        data.streams.get_mut().clear();
    }

    fn sample<R: RngId + 'static, T>(
        &self,
        _rng_type: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T {
        let mut rng = get_rng::<R>(self);
        sampler(&mut rng)
    }

    fn sample_uniform<R: RngId + 'static>(&self, rng_id: R) -> f64
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random::<f64>())
    }

    fn shuffle<R: RngId + 'static, T>(&self, rng_id: R, items: &mut [T])
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| items.shuffle(rng));
    }

    fn sample_without_replacement<R: RngId + 'static, T: Clone>(
        &self,
        rng_id: R,
        items: &[T],
        requested: usize,
    ) -> Vec<T>
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| {
            sample_multiple_from_known_length(rng, items.iter().cloned(), requested)
        })
    }
}

#[cfg(test)]
mod test {
    use crate::context::Context;
    use crate::define_rng;
    use crate::rand::RngCore;
    use crate::random::context_ext::ContextRandomExt;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn get_rng_basic() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    fn multiple_rng_types() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample(FooRng, RngCore::next_u64),
            context.sample(BarRng, RngCore::next_u64)
        );
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);

        let run_0 = context.sample(FooRng, RngCore::next_u64);
        let run_1 = context.sample(FooRng, RngCore::next_u64);

        // Reset with same seed, ensure we get the same values
        context.init_random(42);
        assert_eq!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_eq!(run_1, context.sample(FooRng, RngCore::next_u64));

        // Reset with different seed, ensure we get different values
        context.init_random(88);
        assert_ne!(run_0, context.sample(FooRng, RngCore::next_u64));
        assert_ne!(run_1, context.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn streams_do_not_interfere() {
        let mut context = Context::new();
        context.init_random(42);
        let alone = context.sample(FooRng, RngCore::next_u64);

        context.init_random(42);
        context.sample(BarRng, RngCore::next_u64);
        assert_eq!(alone, context.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn sample_uniform_in_unit_interval() {
        let mut context = Context::new();
        context.init_random(42);
        for _ in 0..1000 {
            let u = context.sample_uniform(FooRng);
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut context = Context::new();
        context.init_random(42);
        let mut items: Vec<u32> = (0..50).collect();
        context.shuffle(FooRng, &mut items);
        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn sample_without_replacement_counts() {
        let mut context = Context::new();
        context.init_random(42);
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(context.sample_without_replacement(FooRng, &items, 5).len(), 5);
        assert_eq!(context.sample_without_replacement(FooRng, &items, 20).len(), 10);
    }
}
