//! This library implements the Groth16 prover core: given a compiled rank-1
//! constraint system, a proving key, and a witness assignment, it produces
//! the three-element proof `(Ar, Bs, Krs)` over a pairing-friendly curve.
//!
//! The pipeline solves the constraint system, computes the quotient
//! polynomial `H` with three forward and one inverse FFT on a multiplicative
//! coset, and schedules four multi-scalar multiplications against a fixed
//! worker budget, folding partial results into `Krs` as they arrive.
#![deny(future_incompatible, nonstandard_style, rust_2018_idioms)]
#![allow(clippy::type_complexity)]
#![forbid(unsafe_code)]

// public modules
pub mod errors;
pub mod fft;
pub mod parallel;
pub mod prover;
pub mod provider;
pub mod r1cs;
pub mod traits;

pub use fft::Domain;
pub use prover::{Proof, ProvingKey, prove, prove_with};

/// Enters a named tracing span and starts a wall clock for it, so hot-path
/// phases can report `elapsed_ms` on completion. Callers have
/// `std::time::Instant` in scope.
#[macro_export]
macro_rules! start_span {
  ($name:expr) => {{
    let span = tracing::info_span!($name);
    (span.entered(), Instant::now())
  }};
  ($name:expr, $($fields:tt)*) => {{
    let span = tracing::info_span!($name, $($fields)*);
    (span.entered(), Instant::now())
  }};
}
