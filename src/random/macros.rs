/// Declares a named random stream, e.g. `define_rng!(TransmissionRng);`.
///
/// Declaring the same name twice anywhere in the build is a link error.
#[macro_export]
macro_rules! define_rng {
    ($stream:ident) => {
        #[derive(Copy, Clone, Debug)]
        pub struct $stream;

        impl $crate::random::RngId for $stream {
            type RngType = $crate::rand::rngs::SmallRng;
            const NAME: &'static str = stringify!($stream);
        }

        $crate::paste::paste! {
            #[doc(hidden)]
            #[no_mangle]
            #[allow(non_upper_case_globals)]
            pub static [<sirlabor_rng_stream_ $stream>]: () = ();
        }
    };
}
