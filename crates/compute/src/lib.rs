#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Strata Compute
//!
//! Low-level execution and numeric building blocks shared by the physics
//! crate.
//!
//! -   [`ThreadPool`] runs a fixed number of repeatable tasks per frame on
//!     spin-waiting worker threads. The owner thread acts as worker 0 and
//!     [`ThreadPool::end`] is the synchronization barrier between dependent
//!     passes.
//! -   [`SpinLock`] is the `spin` crate's mutex, used for short critical
//!     sections inside a parallel bracket.
//! -   [`linalg`] holds the dense single-precision solvers: a
//!     Jacobi-preconditioned [`ConjugateGradient`] and an in-place
//!     [`gaussian_elimination`] with partial pivoting.
//!
//! ```rust
//! use compute::{ConjugateGradient, ThreadPool};
//!
//! let a = [2.0_f32, 1.0, 1.0, 2.0];
//! let b = [1.0_f32, 1.0];
//! let mut x = [0.0_f32; 2];
//! let mut precond = [0.0_f32; 4];
//! ConjugateGradient::default()
//!     .solve(2, 1.0e-5, &mut x, &b, &a, &mut precond)
//!     .unwrap();
//! assert!((x[0] - 1.0 / 3.0).abs() < 1.0e-4);
//!
//! let mut pool = ThreadPool::new("solver");
//! pool.set_thread_count(1);
//! assert_eq!(pool.thread_count(), 1);
//! ```

use thiserror::Error;

pub mod linalg;
pub mod thread_pool;

pub use linalg::{
    covariance_matrix, flush_to_zero, flush_to_zero_slice, gaussian_elimination,
    matrix_times_vector, test_psd_matrix, ConjugateGradient, SolveReport,
};
/// Busy-wait lock for the short merges workers make inside a bracket.
pub use spin::{Mutex as SpinLock, MutexGuard as SpinLockGuard};
pub use thread_pool::{ThreadPool, MAX_THREADS_COUNT};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    #[error("buffer shape mismatch: {0}")]
    ShapeMismatch(&'static str),
}
