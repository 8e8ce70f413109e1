//! This module defines errors returned by the library.
use thiserror::Error;

/// Errors returned by the Groth16 prover
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Groth16Error {
  /// returned by the solver when a constraint does not hold for the supplied witness
  #[error("constraint is not satisfied: {reason}")]
  Unsatisfied {
    /// rendered trace naming the constraint kind, operand values, and declaration site
    reason: String,
  },
  /// returned when the witness map has no value for a named input wire
  #[error("variable \"{name}\" is not assigned")]
  MissingAssignment {
    /// name of the unassigned wire
    name: String,
  },
  /// returned when the witness map names a wire the circuit does not declare
  #[error("unknown variable \"{name}\"")]
  UnknownVariable {
    /// name supplied in the witness map
    name: String,
  },
  /// returned when the constraint count exceeds the largest power-of-two subgroup
  /// supported by the scalar field's two-adicity
  #[error("circuit needs a domain of 2^{needed} points but the field supports at most 2^{max}")]
  DomainSizeExceeded {
    /// log2 of the required domain cardinality
    needed: u32,
    /// log2 of the largest supported cardinality
    max: u32,
  },
  /// returned when proving-key array lengths disagree with the R1CS counts
  #[error("proving key does not match the circuit: {reason}")]
  KeyShapeMismatch {
    /// which array disagrees and how
    reason: String,
  },
  /// returned when the CSPRNG fails while sampling the blinding scalars
  #[error("randomness source failure: {reason}")]
  RandomnessFailure {
    /// error reported by the RNG
    reason: String,
  },
  /// returned if MSM bases and scalars have different lengths
  #[error("InvalidInputLength")]
  InvalidInputLength,
  /// returned when a prover task fails to report a result; indicates a bug
  #[error("internal error: {reason}")]
  Internal {
    /// what went missing
    reason: String,
  },
}
