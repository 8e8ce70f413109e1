//! Test-only circuit-specific setup and pairing-check verification, so the
//! prover's output can be checked end-to-end. Nothing here ships with the
//! library: keys are derived from fresh toxic waste per test.
use ff::Field;
use groth16_core::{
  Domain, ProvingKey,
  prover::{Proof, ProvingKeyG1, ProvingKeyG2},
  r1cs::R1cs,
  traits::Engine,
};
use halo2curves::group::{Curve, Group, prime::PrimeCurveAffine};
use rand_core::RngCore;

/// The verification half of a test setup.
pub struct VerifyingKey<E: Engine> {
  pub alpha: E::G1Affine,
  pub beta: E::G2Affine,
  pub gamma: E::G2Affine,
  pub delta: E::G2Affine,
  /// statement bases, one per public wire (constant-one wire first)
  pub k: Vec<E::G1Affine>,
}

fn batch_to_affine<E: Engine>(points: Vec<E::G1>) -> Vec<E::G1Affine> {
  let mut affine = vec![E::G1Affine::identity(); points.len()];
  E::G1::batch_normalize(&points, &mut affine);
  affine
}

/// Runs a circuit-specific trusted setup over fresh random toxic waste.
pub fn setup<E: Engine, R: RngCore>(
  r1cs: &R1cs<E::Scalar>,
  rng: &mut R,
) -> (ProvingKey<E>, VerifyingKey<E>) {
  let domain = Domain::<E::Scalar>::new(r1cs.nb_constraints()).unwrap();
  let n = domain.cardinality;
  let nb_wires = r1cs.nb_wires;
  let nb_private = r1cs.nb_private_wires();

  let tau = E::Scalar::random(&mut *rng);
  let alpha = E::Scalar::random(&mut *rng);
  let beta = E::Scalar::random(&mut *rng);
  let gamma = E::Scalar::random(&mut *rng);
  let delta = E::Scalar::random(&mut *rng);
  let gamma_inv = gamma.invert().unwrap();
  let delta_inv = delta.invert().unwrap();

  // Lagrange-basis evaluations over the domain:
  // l_j(tau) = z(tau) · g^j / (n · (tau − g^j))
  let z_tau = tau.pow_vartime([n as u64]) - E::Scalar::ONE;
  let n_scalar = E::Scalar::from(n as u64);
  let mut lagrange = Vec::with_capacity(r1cs.nb_constraints());
  let mut g_pow = E::Scalar::ONE;
  for _ in 0..r1cs.nb_constraints() {
    lagrange.push(z_tau * g_pow * (n_scalar * (tau - g_pow)).invert().unwrap());
    g_pow *= domain.generator;
  }

  // per-wire QAP evaluations u_i(tau), v_i(tau), w_i(tau)
  let mut u = vec![E::Scalar::ZERO; nb_wires];
  let mut v = vec![E::Scalar::ZERO; nb_wires];
  let mut w = vec![E::Scalar::ZERO; nb_wires];
  for (j, constraint) in r1cs.constraints.iter().enumerate() {
    for t in &constraint.l.terms {
      u[t.wire] += t.coeff * lagrange[j];
    }
    for t in &constraint.r.terms {
      v[t.wire] += t.coeff * lagrange[j];
    }
    for t in &constraint.o.terms {
      w[t.wire] += t.coeff * lagrange[j];
    }
  }

  let g1 = E::G1Affine::generator();
  let g2 = E::G2Affine::generator();

  let a_bases = batch_to_affine::<E>(u.iter().map(|ui| g1 * *ui).collect());
  let b_bases_g1 = batch_to_affine::<E>(v.iter().map(|vi| g1 * *vi).collect());
  let b_bases_g2 = {
    let points: Vec<E::G2> = v.iter().map(|vi| g2 * *vi).collect();
    let mut affine = vec![E::G2Affine::identity(); points.len()];
    E::G2::batch_normalize(&points, &mut affine);
    affine
  };

  let k_bases = batch_to_affine::<E>(
    (0..nb_private)
      .map(|i| g1 * ((beta * u[i] + alpha * v[i] + w[i]) * delta_inv))
      .collect(),
  );

  let z_bases = {
    let zeta = z_tau * delta_inv;
    let mut acc = zeta;
    let mut points = Vec::with_capacity(n);
    for _ in 0..n {
      points.push(g1 * acc);
      acc *= tau;
    }
    batch_to_affine::<E>(points)
  };

  let vk_k = batch_to_affine::<E>(
    (nb_private..nb_wires)
      .map(|i| g1 * ((beta * u[i] + alpha * v[i] + w[i]) * gamma_inv))
      .collect(),
  );

  let pk = ProvingKey {
    g1: ProvingKeyG1 {
      a: a_bases,
      b: b_bases_g1,
      k: k_bases,
      z: z_bases,
      alpha: (g1 * alpha).to_affine(),
      beta: (g1 * beta).to_affine(),
      delta: (g1 * delta).to_affine(),
    },
    g2: ProvingKeyG2 {
      b: b_bases_g2,
      beta: (g2 * beta).to_affine(),
      delta: (g2 * delta).to_affine(),
    },
  };
  let vk = VerifyingKey {
    alpha: (g1 * alpha).to_affine(),
    beta: (g2 * beta).to_affine(),
    gamma: (g2 * gamma).to_affine(),
    delta: (g2 * delta).to_affine(),
    k: vk_k,
  };
  (pk, vk)
}

/// Checks the Groth16 pairing equation:
/// `e(Ar, Bs) = e(α, β) · e(Σ xᵢ·Kᵢ, γ) · e(Krs, δ)`.
pub fn verify<E: Engine>(vk: &VerifyingKey<E>, proof: &Proof<E>, publics: &[E::Scalar]) -> bool {
  assert_eq!(publics.len(), vk.k.len());
  let mut statement = E::G1::identity();
  for (x, k) in publics.iter().zip(vk.k.iter()) {
    statement += *k * *x;
  }
  let statement = statement.to_affine();

  E::pairing(&proof.ar, &proof.bs)
    == E::pairing(&vk.alpha, &vk.beta)
      + E::pairing(&statement, &vk.gamma)
      + E::pairing(&proof.krs, &vk.delta)
}
