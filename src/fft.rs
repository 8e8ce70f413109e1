//! This module provides the FFT machinery used to compute the quotient
//! polynomial: the power-of-two evaluation domain, the fused scale-and-shift
//! exponent tables, and an in-place radix-2 FFT parallelized over the rayon
//! pool.
use crate::errors::Groth16Error;
use ff::PrimeField;
use rayon::prelude::*;

/// Number of field multiplications that cost roughly as much as one general
/// exponentiation; below this per-chunk workload the exponent table is built
/// sequentially.
pub(crate) const RATIO_EXP_MUL: usize = 2400 / 26;

/// A multiplicative subgroup of order `2^k` in the scalar field, together
/// with the square root of its generator used as the coset shift.
///
/// `generator_sqrt` is a primitive `2^{k+1}`-th root of unity, so
/// `X^n - 1` evaluates to `-2` everywhere on the coset
/// `generator_sqrt · ⟨generator⟩`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain<F: PrimeField> {
  /// number of points, `2^k`
  pub cardinality: usize,
  /// `2^{-k} mod r`
  pub cardinality_inv: F,
  /// primitive `2^k`-th root of unity
  pub generator: F,
  /// inverse of `generator`
  pub generator_inv: F,
  /// primitive `2^{k+1}`-th root of unity whose square is `generator`
  pub generator_sqrt: F,
  /// inverse of `generator_sqrt`
  pub generator_sqrt_inv: F,
}

impl<F: PrimeField> Domain<F> {
  /// Builds the smallest domain with at least `min_size` points.
  ///
  /// # Errors
  /// Returns `Groth16Error::DomainSizeExceeded` when the field's two-adicity
  /// cannot host the coset shift, i.e. when `2^{k+1}` exceeds the largest
  /// power-of-two subgroup of `F`.
  pub fn new(min_size: usize) -> Result<Self, Groth16Error> {
    let k = min_size.max(1).next_power_of_two().trailing_zeros();
    if k + 1 > F::S {
      return Err(Groth16Error::DomainSizeExceeded {
        needed: k,
        max: F::S - 1,
      });
    }

    let generator_sqrt = F::ROOT_OF_UNITY.pow_vartime([1u64 << (F::S - k - 1)]);
    let generator = generator_sqrt.square();

    Ok(Domain {
      cardinality: 1 << k,
      cardinality_inv: F::from(1u64 << k).invert().unwrap(),
      generator,
      generator_inv: generator.invert().unwrap(),
      generator_sqrt,
      generator_sqrt_inv: generator_sqrt.invert().unwrap(),
    })
  }
}

/// Fills a table with `table[i] = scale · w^i`.
///
/// The tail is split into contiguous chunks of `(n - 1) / nb_tasks` indices;
/// each chunk pays a single exponentiation for its leading entry and walks
/// forward by multiplications. When the chunks would be shorter than
/// `RATIO_EXP_MUL` the whole tail is walked sequentially instead, so the
/// parallel and sequential paths produce bitwise-identical tables.
pub fn build_exp_table<F: PrimeField>(scale: F, w: F, n: usize, nb_tasks: usize) -> Vec<F> {
  let mut table = vec![F::ZERO; n];
  if n == 0 {
    return table;
  }
  table[0] = scale;
  if n == 1 {
    return table;
  }

  let interval = (n - 1) / nb_tasks.max(1);
  if interval < RATIO_EXP_MUL {
    for i in 1..n {
      table[i] = table[i - 1] * w;
    }
  } else {
    let (_, mut rest) = table.split_at_mut(1);
    rayon::scope(|scope| {
      let mut start = 1;
      while !rest.is_empty() {
        let len = interval.min(rest.len());
        let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(len);
        rest = tail;
        let chunk_start = start as u64;
        scope.spawn(move |_| {
          chunk[0] = w.pow_vartime([chunk_start]) * scale;
          for i in 1..chunk.len() {
            chunk[i] = chunk[i - 1] * w;
          }
        });
        start += len;
      }
    });
  }
  table
}

/// In-place radix-2 FFT of a power-of-two-length slice, with twiddle factors
/// drawn from powers of `omega`.
///
/// Passing the domain generator evaluates coefficients on the subgroup;
/// passing its inverse runs the inverse transform up to the `n^{-1}` scaling,
/// which callers fold into a subsequent pointwise pass.
pub fn fft<F: PrimeField>(v: &mut [F], omega: F, nb_tasks: usize) {
  let n = v.len();
  if n <= 1 {
    return;
  }
  debug_assert!(n.is_power_of_two());
  let log_n = n.trailing_zeros();
  let nb_tasks = nb_tasks.max(1);

  let twiddles = build_exp_table(F::ONE, omega, n / 2, nb_tasks);

  for k in 0..n {
    let rk = k.reverse_bits() >> (usize::BITS - log_n);
    if k < rk {
      v.swap(k, rk);
    }
  }

  let mut m = 1;
  while m < n {
    // blocks of 2m share the same twiddle schedule and are independent
    let nb_blocks = n / (2 * m);
    if nb_blocks > 1 {
      let blocks_per_task = nb_blocks.div_ceil(nb_tasks);
      v.par_chunks_mut(2 * m * blocks_per_task).for_each(|slab| {
        for block in slab.chunks_mut(2 * m) {
          let (lo, hi) = block.split_at_mut(m);
          for i in 0..m {
            let t = hi[i] * twiddles[i * nb_blocks];
            hi[i] = lo[i] - t;
            lo[i] += t;
          }
        }
      });
    } else {
      // final stage: a single block, parallelized across butterfly pairs
      let chunk = m.div_ceil(nb_tasks);
      let (lo, hi) = v.split_at_mut(m);
      lo.par_chunks_mut(chunk)
        .zip(hi.par_chunks_mut(chunk))
        .enumerate()
        .for_each(|(ci, (lc, hc))| {
          let base = ci * chunk;
          for i in 0..lc.len() {
            let t = hc[i] * twiddles[base + i];
            hc[i] = lc[i] - t;
            lc[i] += t;
          }
        });
    }
    m *= 2;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ff::Field;
  use halo2curves::bn256::Fr;
  use rand::{Rng, SeedableRng, rngs::StdRng};

  fn random_vec(n: usize, rng: &mut StdRng) -> Vec<Fr> {
    (0..n).map(|_| Fr::from(rng.gen::<u64>())).collect()
  }

  fn naive_dft(coeffs: &[Fr], omega: Fr) -> Vec<Fr> {
    let n = coeffs.len();
    (0..n)
      .map(|k| {
        let x = omega.pow_vartime([k as u64]);
        coeffs
          .iter()
          .rev()
          .fold(Fr::ZERO, |acc, c| acc * x + c)
      })
      .collect()
  }

  #[test]
  fn test_domain_constants() {
    for min_size in [1, 2, 3, 100, 255, 256] {
      let domain = Domain::<Fr>::new(min_size).unwrap();
      let n = domain.cardinality;
      assert!(n >= min_size && n.is_power_of_two());

      assert_eq!(domain.generator.pow_vartime([n as u64]), Fr::ONE);
      if n > 1 {
        assert_ne!(domain.generator.pow_vartime([(n / 2) as u64]), Fr::ONE);
      }
      assert_eq!(domain.generator_sqrt.square(), domain.generator);
      assert_eq!(domain.generator * domain.generator_inv, Fr::ONE);
      assert_eq!(domain.generator_sqrt * domain.generator_sqrt_inv, Fr::ONE);
      assert_eq!(Fr::from(n as u64) * domain.cardinality_inv, Fr::ONE);
    }
  }

  #[test]
  fn test_domain_oversize() {
    let oversize = 1usize << (Fr::S as usize);
    assert!(matches!(
      Domain::<Fr>::new(oversize),
      Err(Groth16Error::DomainSizeExceeded { .. })
    ));
  }

  #[test]
  fn test_vanishing_on_coset() {
    // X^n - 1 must equal -2 on every point of the shifted coset
    let domain = Domain::<Fr>::new(64).unwrap();
    let n = domain.cardinality as u64;
    let minus_two = -Fr::from(2u64);
    for i in [0u64, 1, 7, 63] {
      let x = domain.generator_sqrt * domain.generator.pow_vartime([i]);
      assert_eq!(x.pow_vartime([n]) - Fr::ONE, minus_two);
    }
  }

  #[test]
  fn test_exp_table_matches_naive() {
    let mut rng = StdRng::seed_from_u64(0);
    let scale = Fr::from(rng.gen::<u64>());
    let w = Fr::from(rng.gen::<u64>());
    for n in [0, 1, 2, 5, 300, 1024] {
      let table = build_exp_table(scale, w, n, 4);
      let mut expected = scale;
      for (i, entry) in table.iter().enumerate() {
        assert_eq!(*entry, expected, "index {i} of {n}");
        expected *= w;
      }
    }
  }

  #[test]
  fn test_exp_table_parallel_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(1);
    let scale = Fr::from(rng.gen::<u64>());
    let w = Fr::from(rng.gen::<u64>());
    let n = 4096;
    // large nb_tasks forces the sequential path, small counts the chunked one
    let sequential = build_exp_table(scale, w, n, n);
    for nb_tasks in [1, 2, 3, 8] {
      assert_eq!(build_exp_table(scale, w, n, nb_tasks), sequential);
    }
  }

  #[test]
  fn test_fft_matches_naive_dft() {
    let mut rng = StdRng::seed_from_u64(2);
    for log_n in [0u32, 1, 3, 6] {
      let n = 1usize << log_n;
      let domain = Domain::<Fr>::new(n).unwrap();
      let coeffs = random_vec(n, &mut rng);
      let mut evals = coeffs.clone();
      fft(&mut evals, domain.generator, 4);
      assert_eq!(evals, naive_dft(&coeffs, domain.generator), "n = {n}");
    }
  }

  #[test]
  fn test_fft_inverse_roundtrip() {
    let mut rng = StdRng::seed_from_u64(3);
    let domain = Domain::<Fr>::new(256).unwrap();
    let coeffs = random_vec(domain.cardinality, &mut rng);

    let mut v = coeffs.clone();
    fft(&mut v, domain.generator, 4);
    fft(&mut v, domain.generator_inv, 4);
    for x in v.iter_mut() {
      *x *= domain.cardinality_inv;
    }
    assert_eq!(v, coeffs);
  }

  #[test]
  fn test_fft_single_threaded_matches_parallel() {
    let mut rng = StdRng::seed_from_u64(4);
    let domain = Domain::<Fr>::new(512).unwrap();
    let coeffs = random_vec(domain.cardinality, &mut rng);

    let mut a = coeffs.clone();
    let mut b = coeffs;
    fft(&mut a, domain.generator, 1);
    fft(&mut b, domain.generator, 8);
    assert_eq!(a, b);
  }
}
