//! This module implements the Groth16 prover: solving the constraint system,
//! computing the quotient polynomial `H` over a multiplicative coset, and
//! combining four multi-scalar multiplications with the blinding terms into
//! the three proof elements.
use crate::{
  errors::Groth16Error,
  fft::{Domain, build_exp_table, fft},
  parallel::parallelize_with,
  provider::msm::{batch_scalar_mul, msm},
  r1cs::R1cs,
  start_span,
  traits::Engine,
};
use ff::{Field, FromUniformBytes, PrimeField};
use halo2curves::group::{Curve, GroupEncoding, prime::PrimeCurveAffine};
use once_cell::sync::OnceCell;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::sync::mpsc;
use std::thread;
use std::time::Instant;
use tracing::info;

type ScalarRepr<E> = <<E as Engine>::Scalar as PrimeField>::Repr;

/// The `G1` half of a proving key: per-wire bases for the `Ar`, `Bs1` and
/// `Krs` multi-scalar multiplications, the domain-sized powers consumed by
/// the quotient term, and the setup constants.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ProvingKeyG1<E: Engine> {
  /// bases of the `Ar` MSM, one per wire
  pub a: Vec<E::G1Affine>,
  /// bases of the `Bs1` MSM, one per wire
  pub b: Vec<E::G1Affine>,
  /// bases of the private-wire part of `Krs`
  pub k: Vec<E::G1Affine>,
  /// bases of the quotient part of `Krs`, one per domain point
  pub z: Vec<E::G1Affine>,
  /// `α` in `G1`
  pub alpha: E::G1Affine,
  /// `β` in `G1`
  pub beta: E::G1Affine,
  /// `δ` in `G1`
  pub delta: E::G1Affine,
}

/// The `G2` half of a proving key.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ProvingKeyG2<E: Engine> {
  /// bases of the `Bs` MSM, one per wire
  pub b: Vec<E::G2Affine>,
  /// `β` in `G2`
  pub beta: E::G2Affine,
  /// `δ` in `G2`
  pub delta: E::G2Affine,
}

/// A Groth16 proving key. Read-only once produced; a single key serves any
/// number of concurrent proofs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ProvingKey<E: Engine> {
  /// `G1` bases and constants
  pub g1: ProvingKeyG1<E>,
  /// `G2` bases and constants
  pub g2: ProvingKeyG2<E>,
}

impl<E: Engine> ProvingKey<E> {
  /// Checks that every base array matches the constraint system's counts and
  /// the FFT domain's cardinality.
  ///
  /// # Errors
  /// Returns `Groth16Error::KeyShapeMismatch` naming the first array whose
  /// length disagrees.
  pub fn check_shape(
    &self,
    r1cs: &R1cs<E::Scalar>,
    cardinality: usize,
  ) -> Result<(), Groth16Error> {
    let checks = [
      ("G1.A", self.g1.a.len(), r1cs.nb_wires),
      ("G1.B", self.g1.b.len(), r1cs.nb_wires),
      ("G2.B", self.g2.b.len(), r1cs.nb_wires),
      ("G1.K", self.g1.k.len(), r1cs.nb_private_wires()),
      ("G1.Z", self.g1.z.len(), cardinality),
    ];
    for (name, got, expected) in checks {
      if got != expected {
        return Err(Groth16Error::KeyShapeMismatch {
          reason: format!("{name} holds {got} points, expected {expected}"),
        });
      }
    }
    Ok(())
  }
}

/// A Groth16 proof. Verifies against a statement and the matching verifying
/// key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Proof<E: Engine> {
  /// first proof element, in `G1`
  pub ar: E::G1Affine,
  /// second proof element, in `G2`
  pub bs: E::G2Affine,
  /// third proof element, in `G1`
  pub krs: E::G1Affine,
}

impl<E: Engine> Proof<E> {
  /// Serializes the proof as the concatenation of the three compressed point
  /// encodings, `Ar || Bs || Krs`.
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(self.ar.to_bytes().as_ref());
    out.extend_from_slice(self.bs.to_bytes().as_ref());
    out.extend_from_slice(self.krs.to_bytes().as_ref());
    out
  }
}

/// A partial result folded into the `Krs` accumulator as it arrives.
enum FoldEvent<E: Engine> {
  /// the `G1.Z · H` MSM
  Quotient(E::G1),
  /// the finished `Ar` accumulator, to be scaled by `s`
  ArTerm(E::G1),
  /// the finished `Bs1` accumulator, to be scaled by `r`
  Bs1Term(E::G1),
}

/// Produces a Groth16 proof for `assignment` under `pk`, drawing blinding
/// randomness from the system CSPRNG and discarding solver diagnostics.
///
/// # Errors
/// Propagates solver failures verbatim and fails fast on shape or domain
/// mismatches; see `prove_with`.
pub fn prove<E: Engine>(
  r1cs: &R1cs<E::Scalar>,
  pk: &ProvingKey<E>,
  assignment: &HashMap<String, E::Scalar>,
) -> Result<Proof<E>, Groth16Error> {
  prove_with(r1cs, pk, assignment, &mut OsRng, None)
}

/// `prove` with an explicit randomness source and an optional sink for the
/// solver's diagnostics (circuit `println` output and failure traces).
///
/// # Errors
/// - `Unsatisfied` (and friends) from the solver, before any proof work;
/// - `DomainSizeExceeded` when the constraint count outgrows the field's
///   two-adicity;
/// - `KeyShapeMismatch` when `pk` does not fit `r1cs`;
/// - `RandomnessFailure` when `rng` fails while sampling `r` or `s`.
pub fn prove_with<E: Engine, R: RngCore>(
  r1cs: &R1cs<E::Scalar>,
  pk: &ProvingKey<E>,
  assignment: &HashMap<String, E::Scalar>,
  rng: &mut R,
  diagnostics: Option<&mut dyn Write>,
) -> Result<Proof<E>, Groth16Error> {
  let (_prove_span, prove_t) = start_span!("groth16_prove", constraints = r1cs.nb_constraints());
  let nb_tasks = rayon::current_num_threads();
  let nb_private_wires = r1cs.nb_private_wires();

  let domain = Domain::<E::Scalar>::new(r1cs.nb_constraints())?;
  pk.check_shape(r1cs, domain.cardinality)?;

  // solve the R1CS; a, b, c get the headroom they need for zero-padding
  let nb_constraints = r1cs.nb_constraints();
  let mut a = Vec::with_capacity(domain.cardinality);
  let mut b = Vec::with_capacity(domain.cardinality);
  let mut c = Vec::with_capacity(domain.cardinality);
  a.resize(nb_constraints, E::Scalar::ZERO);
  b.resize(nb_constraints, E::Scalar::ZERO);
  c.resize(nb_constraints, E::Scalar::ZERO);
  let mut wire_values = vec![E::Scalar::ZERO; r1cs.nb_wires];
  r1cs.solve(assignment, &mut a, &mut b, &mut c, &mut wire_values, diagnostics)?;

  // wire values in regular form, the MSM precondition
  let mut wire_reprs = vec![ScalarRepr::<E>::default(); r1cs.nb_wires];
  parallelize_with(nb_tasks, &mut wire_reprs, |chunk, offset| {
    for (i, out) in chunk.iter_mut().enumerate() {
      *out = wire_values[offset + i].to_repr();
    }
  });

  // H runs on its own task and saturates the pool with FFTs; the blinding
  // scalars and the shared-base delta batch are computed meanwhile
  let mut h_slot = None;
  let (r, s, deltas) = thread::scope(|scope| {
    scope.spawn(|| {
      h_slot = Some(compute_h(a, b, c, &domain, nb_tasks));
    });

    let r = random_scalar::<E::Scalar, _>(rng)?;
    let s = random_scalar::<E::Scalar, _>(rng)?;
    let kr = -(r * s);

    // r·δ, s·δ, kr·δ as one batch on the shared base
    let deltas = batch_scalar_mul(&pk.g1.delta, &[r, s, kr]);
    Ok::<_, Groth16Error>((r, s, deltas))
  })?;
  let h = h_slot.ok_or_else(|| Groth16Error::Internal {
    reason: "quotient-polynomial task reported no result".to_string(),
  })?;

  let (ev_tx, ev_rx) = mpsc::channel::<Result<FoldEvent<E>, Groth16Error>>();
  let mut ar_slot: Option<Result<E::G1Affine, Groth16Error>> = None;
  let mut krs_slot: Option<Result<E::G1Affine, Groth16Error>> = None;

  let bs = thread::scope(|scope| {
    // Krs: the quotient MSM runs nested so its completion can be folded in
    // arrival order along with the Ar and Bs1 contributions
    {
      let ev_tx = ev_tx.clone();
      let h = &h;
      scope.spawn(move || {
        let _ = ev_tx.send(msm(&pk.g1.z, h, nb_tasks).map(FoldEvent::Quotient));
      });
    }
    {
      let wire_reprs = &wire_reprs;
      let deltas = &deltas;
      let krs_slot = &mut krs_slot;
      scope.spawn(move || {
        *krs_slot = Some(compute_krs::<E>(
          pk,
          wire_reprs,
          deltas,
          nb_private_wires,
          r,
          s,
          ev_rx,
          nb_tasks,
        ));
      });
    }
    {
      let ev_tx = ev_tx.clone();
      let wire_reprs = &wire_reprs;
      let deltas = &deltas;
      let ar_slot = &mut ar_slot;
      scope.spawn(move || {
        let result = msm(&pk.g1.a, wire_reprs, nb_tasks).map(|mut ar| {
          ar += pk.g1.alpha;
          ar += deltas[0];
          ar
        });
        match result {
          Ok(ar) => {
            *ar_slot = Some(Ok(ar.to_affine()));
            let _ = ev_tx.send(Ok(FoldEvent::ArTerm(ar)));
          }
          Err(e) => {
            *ar_slot = Some(Err(e.clone()));
            let _ = ev_tx.send(Err(e));
          }
        }
      });
    }
    {
      let ev_tx = ev_tx.clone();
      let wire_reprs = &wire_reprs;
      let deltas = &deltas;
      scope.spawn(move || {
        let result = msm(&pk.g1.b, wire_reprs, nb_tasks).map(|mut bs1| {
          bs1 += pk.g1.beta;
          bs1 += deltas[1];
          bs1
        });
        let _ = ev_tx.send(result.map(FoldEvent::Bs1Term));
      });
    }
    // only the three task senders may keep the event channel open, so a
    // dying task disconnects the Krs fold loop instead of wedging it
    drop(ev_tx);

    compute_bs2::<E>(scope, pk, &wire_reprs, s, nb_tasks)
  })?;

  let ar = ar_slot.ok_or_else(|| Groth16Error::Internal {
    reason: "Ar task reported no result".to_string(),
  })??;
  let krs = krs_slot.ok_or_else(|| Groth16Error::Internal {
    reason: "Krs task reported no result".to_string(),
  })??;

  info!(
    elapsed_ms = %prove_t.elapsed().as_millis(),
    constraints = r1cs.nb_constraints(),
    "groth16_prove"
  );
  Ok(Proof { ar, bs, krs })
}

fn random_scalar<F: PrimeField + FromUniformBytes<64>, R: RngCore>(
  rng: &mut R,
) -> Result<F, Groth16Error> {
  let mut bytes = [0u8; 64];
  rng
    .try_fill_bytes(&mut bytes)
    .map_err(|e| Groth16Error::RandomnessFailure {
      reason: e.to_string(),
    })?;
  Ok(F::from_uniform_bytes(&bytes))
}

/// The private-wire MSM plus the `kr·δ` shift, folding the quotient, `s·Ar`
/// and `r·Bs1` contributions as each becomes available. Exactly three events
/// are consumed; the fold order is irrelevant to the sum.
#[allow(clippy::too_many_arguments)]
fn compute_krs<E: Engine>(
  pk: &ProvingKey<E>,
  wire_reprs: &[ScalarRepr<E>],
  deltas: &[E::G1Affine],
  nb_private_wires: usize,
  r: E::Scalar,
  s: E::Scalar,
  events: mpsc::Receiver<Result<FoldEvent<E>, Groth16Error>>,
  nb_tasks: usize,
) -> Result<E::G1Affine, Groth16Error> {
  let mut krs = msm(
    &pk.g1.k[..nb_private_wires],
    &wire_reprs[..nb_private_wires],
    nb_tasks,
  )?;
  krs += deltas[2];

  let mut failure: Option<Groth16Error> = None;
  for _ in 0..3 {
    match events.recv() {
      Ok(Ok(FoldEvent::Quotient(p))) => krs += p,
      Ok(Ok(FoldEvent::ArTerm(p))) => krs += p * s,
      Ok(Ok(FoldEvent::Bs1Term(p))) => krs += p * r,
      Ok(Err(e)) => {
        if failure.is_none() {
          failure = Some(e);
        }
      }
      Err(_) => {
        if failure.is_none() {
          failure = Some(Groth16Error::Internal {
            reason: "a fold contribution went missing".to_string(),
          });
        }
        break;
      }
    }
  }

  match failure {
    Some(e) => Err(e),
    None => Ok(krs.to_affine()),
  }
}

/// The `G2` multi-scalar multiplication, split three ways when large enough
/// that the sub-MSMs pay for their scheduling, then shifted by `s·δ` and `β`.
fn compute_bs2<'scope, E: Engine>(
  scope: &'scope thread::Scope<'scope, '_>,
  pk: &'scope ProvingKey<E>,
  wire_reprs: &'scope [ScalarRepr<E>],
  s: E::Scalar,
  nb_tasks: usize,
) -> Result<E::G2Affine, Groth16Error> {
  let split = pk.g2.b.len() / 3;
  let mut bs = if split > 10 {
    let (tx1, rx1) = mpsc::channel();
    let (tx2, rx2) = mpsc::channel();
    scope.spawn(move || {
      let _ = tx1.send(msm(&pk.g2.b[..split], &wire_reprs[..split], nb_tasks));
    });
    scope.spawn(move || {
      let _ = tx2.send(msm(
        &pk.g2.b[split..2 * split],
        &wire_reprs[split..2 * split],
        nb_tasks,
      ));
    });
    let mut bs = msm(&pk.g2.b[2 * split..], &wire_reprs[2 * split..], nb_tasks)?;

    let disconnected = |_| Groth16Error::Internal {
      reason: "a Bs sub-MSM went missing".to_string(),
    };
    bs += rx1.recv().map_err(disconnected)??;
    bs += rx2.recv().map_err(disconnected)??;
    bs
  } else {
    msm(&pk.g2.b, wire_reprs, nb_tasks)?
  };

  bs += pk.g2.delta.to_curve() * s;
  bs += pk.g2.beta;
  Ok(bs.to_affine())
}

/// Computes the coefficients of `h(X) = (a(X)·b(X) − c(X)) / (X^n − 1)` and
/// converts them to regular form for the quotient MSM.
///
/// The three input vectors are interpolated with an inverse FFT, re-evaluated
/// on the coset `√ω·⟨ω⟩` (where the vanishing polynomial is the constant
/// `−2`), combined pointwise, and interpolated back. Both the `n^{-1}` iFFT
/// scaling and the coset shift are folded into a single precomputed table
/// applied between the two transforms of each pass.
fn compute_h<F: PrimeField>(
  mut a: Vec<F>,
  mut b: Vec<F>,
  mut c: Vec<F>,
  domain: &Domain<F>,
  nb_tasks: usize,
) -> Vec<F::Repr> {
  let (_h_span, h_t) = start_span!("compute_h", size = domain.cardinality);
  let n = domain.cardinality;
  a.resize(n, F::ZERO);
  b.resize(n, F::ZERO);
  c.resize(n, F::ZERO);

  // the table is scheduled before the FFTs so its workers are already
  // running when the transforms leave parts of the pool idle
  let exp_table: OnceCell<Vec<F>> = OnceCell::new();
  let to_coset = |v: &mut [F]| {
    fft(v, domain.generator_inv, nb_tasks);
    let table = exp_table.wait();
    parallelize_with(nb_tasks, v, |chunk, offset| {
      for (i, x) in chunk.iter_mut().enumerate() {
        *x *= table[offset + i];
      }
    });
    fft(v, domain.generator, nb_tasks);
  };
  thread::scope(|scope| {
    scope.spawn(|| {
      let _ = exp_table.set(build_exp_table(
        domain.cardinality_inv,
        domain.generator_sqrt,
        n,
        nb_tasks,
      ));
    });
    scope.spawn(|| to_coset(&mut a));
    scope.spawn(|| to_coset(&mut b));
    to_coset(&mut c);
  });

  // on the coset, h = (a∘b − c) · (X^n − 1)^{-1} = (a∘b − c) · (−2)^{-1}
  let minus_two_inv = (-F::from(2u64)).invert().unwrap();
  parallelize_with(nb_tasks, &mut a, |chunk, offset| {
    for (i, x) in chunk.iter_mut().enumerate() {
      *x = (*x * b[offset + i] - c[offset + i]) * minus_two_inv;
    }
  });
  drop(b);
  drop(c);

  let exp_table: OnceCell<Vec<F>> = OnceCell::new();
  let mut h = vec![F::Repr::default(); n];
  thread::scope(|scope| {
    scope.spawn(|| {
      let _ = exp_table.set(build_exp_table(
        domain.cardinality_inv,
        domain.generator_sqrt_inv,
        n,
        nb_tasks,
      ));
    });

    fft(&mut a, domain.generator_inv, nb_tasks);
    let table = exp_table.wait();
    let a = &a;
    // the Montgomery-out conversion rides the closing multiply, saving a pass
    parallelize_with(nb_tasks, &mut h, |chunk, offset| {
      for (i, out) in chunk.iter_mut().enumerate() {
        *out = (a[offset + i] * table[offset + i]).to_repr();
      }
    });
  });

  info!(elapsed_ms = %h_t.elapsed().as_millis(), size = n, "compute_h");
  h
}
