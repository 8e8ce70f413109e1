//! This module provides a multi-scalar multiplication routine.
//! The bucket method is adapted from halo2, with unit scalars accumulated by
//! mixed addition and zero scalars skipped outright.
//!
//! Scalars arrive as canonical little-endian byte representations rather than
//! field elements: the prover converts wire values and quotient-polynomial
//! coefficients out of Montgomery form exactly once, and every window digit
//! here is read straight from those bytes.
use crate::{errors::Groth16Error, start_span};
use ff::{Field, PrimeField};
use halo2curves::{
  CurveAffine,
  group::{Curve, Group},
};
use rayon::prelude::*;
use std::time::Instant;
use tracing::info;

#[derive(Clone, Copy)]
enum Bucket<C: CurveAffine> {
  None,
  Affine(C),
  Projective(C::Curve),
}

impl<C: CurveAffine> Bucket<C> {
  fn add_assign(&mut self, other: &C) {
    *self = match *self {
      Bucket::None => Bucket::Affine(*other),
      Bucket::Affine(a) => Bucket::Projective(a + *other),
      Bucket::Projective(a) => Bucket::Projective(a + other),
    }
  }

  fn add(self, other: C::Curve) -> C::Curve {
    match self {
      Bucket::None => other,
      Bucket::Affine(a) => other + a,
      Bucket::Projective(a) => other + a,
    }
  }
}

fn get_at(segment: usize, c: usize, bytes: &[u8]) -> usize {
  let skip_bits = segment * c;
  let skip_bytes = skip_bits / 8;

  if skip_bytes >= bytes.len() {
    return 0;
  }

  let mut v = [0; 8];
  for (v, o) in v.iter_mut().zip(bytes[skip_bytes..].iter()) {
    *v = *o;
  }

  let mut tmp = u64::from_le_bytes(v);
  tmp >>= skip_bits - (skip_bytes * 8);
  tmp %= 1 << c;

  tmp as usize
}

fn msm_serial<C: CurveAffine>(
  bases: &[C],
  scalars: &[<C::Scalar as PrimeField>::Repr],
) -> C::Curve {
  let c = if bases.len() < 4 {
    1
  } else if bases.len() < 32 {
    3
  } else {
    (f64::from(bases.len() as u32)).ln().ceil() as usize
  };

  let zero_repr = C::Scalar::ZERO.to_repr();
  let one_repr = C::Scalar::ONE.to_repr();

  // Unit scalars: accumulated by mixed addition and separated from the rest
  let mut unit_sum = C::Curve::identity();
  let mut general = Vec::new();

  for (s, b) in scalars.iter().zip(bases) {
    if s.as_ref() == one_repr.as_ref() {
      unit_sum += *b;
    } else if s.as_ref() != zero_repr.as_ref() {
      general.push((s, *b));
    }
  }

  if general.is_empty() {
    return unit_sum;
  }

  let general_sum = {
    let segments = (zero_repr.as_ref().len() * 8) / c + 1;
    (0..segments)
      .rev()
      .fold(C::Curve::identity(), |mut acc, segment| {
        (0..c).for_each(|_| acc = acc.double());

        let mut buckets = vec![Bucket::None; (1 << c) - 1];

        for (repr, base) in general.iter() {
          let digit = get_at(segment, c, repr.as_ref());
          if digit != 0 {
            buckets[digit - 1].add_assign(base);
          }
        }

        // Summation by parts
        // e.g. 3a + 2b + 1c = a +
        //                    (a) + b +
        //                    ((a) + b) + c
        let mut running_sum = C::Curve::identity();
        for exp in buckets.into_iter().rev() {
          running_sum = exp.add(running_sum);
          acc += &running_sum;
        }
        acc
      })
  };

  unit_sum + general_sum
}

/// Performs a multi-scalar multiplication over at most `nb_tasks` contiguous
/// chunks, reduced by projective addition.
///
/// The caller supplies scalars in regular (non-Montgomery) form; use
/// `PrimeField::to_repr` on the field elements feeding an MSM. Concurrent
/// MSMs share the rayon pool, so a bound of `nb_tasks` per call keeps the
/// whole prover within the process-wide worker budget.
///
/// # Errors
/// Returns `Groth16Error::InvalidInputLength` if `bases` and `scalars` have
/// different lengths.
pub fn msm<C: CurveAffine>(
  bases: &[C],
  scalars: &[<C::Scalar as PrimeField>::Repr],
  nb_tasks: usize,
) -> Result<C::Curve, Groth16Error> {
  let (_msm_span, msm_t) = start_span!("msm", size = scalars.len());

  if bases.len() != scalars.len() {
    return Err(Groth16Error::InvalidInputLength);
  }

  let nb_tasks = nb_tasks.max(1);
  let result = if nb_tasks > 1 && scalars.len() > nb_tasks {
    let chunk = scalars.len().div_ceil(nb_tasks);
    scalars
      .par_chunks(chunk)
      .zip(bases.par_chunks(chunk))
      .map(|(scalars, bases)| msm_serial(bases, scalars))
      .reduce(C::Curve::identity, |sum, p| sum + p)
  } else {
    msm_serial(bases, scalars)
  };

  info!(elapsed_ms = %msm_t.elapsed().as_millis(), size = scalars.len(), "msm");
  Ok(result)
}

/// Multiplies one affine base by each scalar in `scalars`, normalizing the
/// results back to affine in a single batch inversion.
pub fn batch_scalar_mul<C: CurveAffine>(base: &C, scalars: &[C::Scalar]) -> Vec<C> {
  let projective = scalars
    .iter()
    .map(|s| base.to_curve() * *s)
    .collect::<Vec<_>>();
  let mut affine = vec![C::identity(); scalars.len()];
  C::Curve::batch_normalize(&projective, &mut affine);
  affine
}
