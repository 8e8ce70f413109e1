//! This module defines the pairing-engine abstraction the prover is generic
//! over: the scalar field and the two source groups, each with an affine
//! representation for stored bases and a projective one for accumulation.
use core::fmt::Debug;
use ff::{FromUniformBytes, WithSmallOrderMulGroup};
use halo2curves::{CurveAffine, CurveExt, group::Group};
use serde::{Deserialize, Serialize};

/// A collection of types describing a pairing-friendly curve.
///
/// `G1`/`G2` are the projective (Jacobian) forms used while accumulating;
/// `G1Affine`/`G2Affine` are the storage form of precomputed bases and of the
/// externally visible proof. The pairing itself is only exercised by
/// verifiers; the prover needs it for nothing but completeness of the
/// abstraction.
pub trait Engine: Clone + Copy + Debug + Send + Sync + Sized + Eq + PartialEq + 'static {
  /// A type representing an element of the scalar field
  type Scalar: WithSmallOrderMulGroup<3>
    + FromUniformBytes<64>
    + Ord
    + Send
    + Sync
    + Serialize
    + for<'de> Deserialize<'de>;

  /// The projective representation of an element of the first group
  type G1: CurveExt<AffineExt = Self::G1Affine, ScalarExt = Self::Scalar>;

  /// The affine representation of an element of the first group
  type G1Affine: CurveAffine<CurveExt = Self::G1, ScalarExt = Self::Scalar>
    + PartialEq
    + Serialize
    + for<'de> Deserialize<'de>;

  /// The projective representation of an element of the second group
  type G2: CurveExt<AffineExt = Self::G2Affine, ScalarExt = Self::Scalar>;

  /// The affine representation of an element of the second group
  type G2Affine: CurveAffine<CurveExt = Self::G2, ScalarExt = Self::Scalar>
    + PartialEq
    + Serialize
    + for<'de> Deserialize<'de>;

  /// The target group of the pairing
  type Gt: Group<Scalar = Self::Scalar>;

  /// Invokes the pairing on a pair of affine points
  fn pairing(p: &Self::G1Affine, q: &Self::G2Affine) -> Self::Gt;
}
