//! This module implements the prover's `Engine` trait for supported curves.
pub mod msm;

use crate::traits::Engine;
use halo2curves::bn256;
use halo2curves::pairing::Engine as _;
use serde::{Deserialize, Serialize};

/// An implementation of the `Engine` trait with BN254 (also known as BN256 or alt_bn128)
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bn256Engine;

impl Engine for Bn256Engine {
  type Scalar = bn256::Fr;
  type G1 = bn256::G1;
  type G1Affine = bn256::G1Affine;
  type G2 = bn256::G2;
  type G2Affine = bn256::G2Affine;
  type Gt = bn256::Gt;

  fn pairing(p: &Self::G1Affine, q: &Self::G2Affine) -> Self::Gt {
    bn256::Bn256::pairing(p, q)
  }
}
