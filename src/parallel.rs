//! Parallel iteration switch.
//!
//! With the `parallel` feature the neighbour searches and surrogate
//! evaluations fan out over rayon; without it they run sequentially on the
//! calling thread. Results are always collected in index order and reduced
//! afterwards, so estimates do not depend on the thread count.
//!
//! ```ignore
//! use crate::iter_maybe_parallel;
//!
//! let counts: Vec<_> = iter_maybe_parallel!(0..n_points)
//!     .map(|i| neighbour_counts(i))
//!     .collect();
//! ```

/// Iterate a range or owned collection in parallel when the `parallel`
/// feature is enabled, sequentially otherwise.
///
/// Call sites import `rayon::iter::ParallelIterator` under
/// `#[cfg(feature = "parallel")]` to get the adaptor methods.
#[macro_export]
macro_rules! iter_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        {
            use rayon::iter::IntoParallelIterator;

            IntoParallelIterator::into_par_iter($expr)
        }
        #[cfg(not(feature = "parallel"))]
        {
            IntoIterator::into_iter($expr)
        }
    }};
}

pub use iter_maybe_parallel;
