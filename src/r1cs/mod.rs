//! This module defines the rank-1 constraint system consumed by the prover:
//! sparse linear combinations over named wires, the constraint list in
//! solving order, and the witness solver that instantiates internal wires and
//! checks every constraint before any proof work starts.
use crate::errors::Groth16Error;
use ff::PrimeField;
use std::collections::HashMap;
use std::io::Write;

mod builder;
pub use builder::{R1csBuilder, Wire};

/// A single `coeff · wire` product inside a linear combination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Term<F> {
  /// multiplicative coefficient
  pub coeff: F,
  /// wire index
  pub wire: usize,
}

/// A sparse linear combination of wires.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearCombination<F> {
  /// the terms, at most one per wire
  pub terms: Vec<Term<F>>,
}

impl<F: PrimeField> LinearCombination<F> {
  fn eval(&self, values: &[F], solved: &[bool]) -> Result<F, Groth16Error> {
    self.terms.iter().try_fold(F::ZERO, |acc, t| {
      if !solved[t.wire] {
        return Err(Groth16Error::Internal {
          reason: format!("wire {} read before instantiation", t.wire),
        });
      }
      Ok(acc + t.coeff * values[t.wire])
    })
  }

  /// Evaluates all terms except the one on `wire`, returning the partial sum
  /// and the coefficient of `wire` (zero when absent).
  fn eval_without(
    &self,
    wire: usize,
    values: &[F],
    solved: &[bool],
  ) -> Result<(F, F), Groth16Error> {
    let mut rest = F::ZERO;
    let mut coeff = F::ZERO;
    for t in &self.terms {
      if t.wire == wire {
        coeff += t.coeff;
      } else {
        if !solved[t.wire] {
          return Err(Groth16Error::Internal {
            reason: format!("wire {} read before instantiation", t.wire),
          });
        }
        rest += t.coeff * values[t.wire];
      }
    }
    Ok((rest, coeff))
  }

  fn contains(&self, wire: usize) -> bool {
    self.terms.iter().any(|t| t.wire == wire)
  }
}

/// The operation a constraint was declared by; names the failure in solver
/// diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintKind {
  /// `o = l + r`
  Add,
  /// `o = l · r`
  Mul,
  /// `o = l / r`, solved by instantiating the quotient wire
  Div,
  /// `l = o`
  AssertIsEqual,
  /// `l · (1 − l) = 0`
  AssertIsBoolean,
}

impl ConstraintKind {
  fn tag(&self) -> &'static str {
    match self {
      ConstraintKind::Add => "[add]",
      ConstraintKind::Mul => "[mul]",
      ConstraintKind::Div => "[div]",
      ConstraintKind::AssertIsEqual => "[assertIsEqual]",
      ConstraintKind::AssertIsBoolean => "[assertIsBoolean]",
    }
  }
}

/// One piece of a diagnostic template: literal text, or a wire whose value is
/// substituted when the template is rendered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogToken {
  /// literal text
  Text(String),
  /// substituted with the wire's value at render time
  Wire(usize),
}

/// Debug metadata recorded when a constraint is declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugInfo {
  /// the declaring operation
  pub kind: ConstraintKind,
  /// value template rendered on failure, e.g. `9 == (3 + 5)`
  pub tokens: Vec<LogToken>,
  /// source location of the declaration site
  pub location: String,
}

/// A rank-1 constraint `l · r = o`, optionally instantiating one wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint<F> {
  /// left linear combination
  pub l: LinearCombination<F>,
  /// right linear combination
  pub r: LinearCombination<F>,
  /// output linear combination
  pub o: LinearCombination<F>,
  /// wire whose value this constraint determines, if any
  pub solved_wire: Option<usize>,
  /// diagnostics recorded at declaration
  pub debug: DebugInfo,
}

/// A compiled rank-1 constraint system.
///
/// Wires are laid out private-first: indices `0..nb_private_wires()` are
/// private, the rest public, with the constant-one wire leading the public
/// segment. Constraints are stored in solving order, each instantiating at
/// most one wire from already-known ones.
#[derive(Clone, Debug)]
pub struct R1cs<F: PrimeField> {
  /// total number of wires
  pub nb_wires: usize,
  /// number of public wires, the constant-one wire included
  pub nb_public_wires: usize,
  /// constraints in solving order
  pub constraints: Vec<Constraint<F>>,
  pub(crate) wire_names: HashMap<String, usize>,
  pub(crate) logs: Vec<Vec<LogToken>>,
}

impl<F: PrimeField> R1cs<F> {
  /// Number of constraints.
  pub fn nb_constraints(&self) -> usize {
    self.constraints.len()
  }

  /// Number of private wires.
  pub fn nb_private_wires(&self) -> usize {
    self.nb_wires - self.nb_public_wires
  }

  /// Index of the constant-one wire.
  pub fn one_wire(&self) -> usize {
    self.nb_private_wires()
  }

  /// Values of the public wires in index order, the leading constant one
  /// included. This is the statement a verifier checks the proof against.
  ///
  /// # Errors
  /// Fails like `solve` does when the assignment does not cover the circuit's
  /// public inputs.
  pub fn public_values(&self, assignment: &HashMap<String, F>) -> Result<Vec<F>, Groth16Error> {
    let nb_private = self.nb_private_wires();
    let mut values = vec![F::ONE; self.nb_public_wires];
    for (name, &wire) in &self.wire_names {
      if wire > self.one_wire() {
        values[wire - nb_private] = *assignment
          .get(name)
          .ok_or_else(|| Groth16Error::MissingAssignment { name: name.clone() })?;
      }
    }
    Ok(values)
  }

  /// Solves the system: instantiates every internal wire from the named
  /// assignment, fills `a`, `b`, `c` with the evaluated linear combinations,
  /// and checks `a[i] · b[i] = c[i]` for every constraint.
  ///
  /// Diagnostics (circuit `println` entries and failure traces) are written
  /// to `sink` when one is provided, and discarded otherwise.
  ///
  /// # Errors
  /// - `Unsatisfied` when a constraint does not hold, with the constraint
  ///   kind, operand values, and declaration site in the message;
  /// - `MissingAssignment`/`UnknownVariable` when the assignment and the
  ///   circuit's named wires disagree.
  pub fn solve(
    &self,
    assignment: &HashMap<String, F>,
    a: &mut [F],
    b: &mut [F],
    c: &mut [F],
    wire_values: &mut [F],
    mut sink: Option<&mut dyn Write>,
  ) -> Result<(), Groth16Error> {
    debug_assert_eq!(a.len(), self.nb_constraints());
    debug_assert_eq!(wire_values.len(), self.nb_wires);

    for name in assignment.keys() {
      if !self.wire_names.contains_key(name) {
        return Err(Groth16Error::UnknownVariable { name: name.clone() });
      }
    }

    let mut solved = vec![false; self.nb_wires];
    wire_values[self.one_wire()] = F::ONE;
    solved[self.one_wire()] = true;
    for (name, &wire) in &self.wire_names {
      let value = assignment
        .get(name)
        .ok_or_else(|| Groth16Error::MissingAssignment { name: name.clone() })?;
      wire_values[wire] = *value;
      solved[wire] = true;
    }

    for (i, constraint) in self.constraints.iter().enumerate() {
      if let Some(wire) = constraint.solved_wire {
        if !solved[wire] {
          let value = self.instantiate(i, constraint, wire, wire_values, &solved, &mut sink)?;
          wire_values[wire] = value;
          solved[wire] = true;
        }
      }

      let l = constraint.l.eval(wire_values, &solved)?;
      let r = constraint.r.eval(wire_values, &solved)?;
      let o = constraint.o.eval(wire_values, &solved)?;
      if l * r != o {
        return Err(self.fail(i, constraint, wire_values, &solved, &mut sink));
      }
      a[i] = l;
      b[i] = r;
      c[i] = o;
    }

    if let Some(sink) = sink.as_deref_mut() {
      for log in &self.logs {
        let _ = writeln!(sink, "{}", render_tokens(log, wire_values, &solved));
      }
    }
    Ok(())
  }

  /// Computes the value of `wire`, the single unknown of `constraint`.
  fn instantiate(
    &self,
    index: usize,
    constraint: &Constraint<F>,
    wire: usize,
    wire_values: &[F],
    solved: &[bool],
    sink: &mut Option<&mut dyn Write>,
  ) -> Result<F, Groth16Error> {
    let invert = |x: F| -> Result<F, Groth16Error> {
      Option::from(x.invert()).ok_or_else(|| Groth16Error::Internal {
        reason: format!("constraint #{index} instantiates through a zero coefficient"),
      })
    };

    if constraint.o.contains(wire) {
      let l = constraint.l.eval(wire_values, solved)?;
      let r = constraint.r.eval(wire_values, solved)?;
      let (rest, coeff) = constraint.o.eval_without(wire, wire_values, solved)?;
      return Ok((l * r - rest) * invert(coeff)?);
    }

    let (known_side, unknown_side) = if constraint.l.contains(wire) {
      (&constraint.r, &constraint.l)
    } else {
      (&constraint.l, &constraint.r)
    };

    let known = known_side.eval(wire_values, solved)?;
    if known.is_zero_vartime() {
      // division by zero; S4-style failures surface here
      return Err(self.fail(index, constraint, wire_values, solved, sink));
    }
    let o = constraint.o.eval(wire_values, solved)?;
    let (rest, coeff) = unknown_side.eval_without(wire, wire_values, solved)?;
    Ok((o - rest * known) * invert(coeff * known)?)
  }

  fn fail(
    &self,
    index: usize,
    constraint: &Constraint<F>,
    wire_values: &[F],
    solved: &[bool],
    sink: &mut Option<&mut dyn Write>,
  ) -> Groth16Error {
    let reason = format!(
      "{} {} (declared at {})",
      constraint.debug.kind.tag(),
      render_tokens(&constraint.debug.tokens, wire_values, solved),
      constraint.debug.location,
    );
    if let Some(sink) = sink.as_deref_mut() {
      let _ = writeln!(sink, "constraint #{index} is not satisfied: {reason}");
    }
    Groth16Error::Unsatisfied { reason }
  }
}

fn render_tokens<F: PrimeField>(tokens: &[LogToken], values: &[F], solved: &[bool]) -> String {
  let mut out = String::new();
  for token in tokens {
    match token {
      LogToken::Text(text) => out.push_str(text),
      LogToken::Wire(wire) => {
        if solved[*wire] {
          out.push_str(&fmt_scalar(&values[*wire]));
        } else {
          out.push('?');
        }
      }
    }
  }
  out
}

/// Renders a scalar as the signed representative of smallest magnitude when
/// it fits in a `u64`, falling back to the field's debug form.
fn fmt_scalar<F: PrimeField>(v: &F) -> String {
  if let Some(small) = as_small_u64(v) {
    return small.to_string();
  }
  if let Some(small) = as_small_u64(&(-*v)) {
    return format!("-{small}");
  }
  format!("{v:?}")
}

fn as_small_u64<F: PrimeField>(v: &F) -> Option<u64> {
  let repr = v.to_repr();
  let bytes = repr.as_ref();
  if bytes[8..].iter().any(|b| *b != 0) {
    return None;
  }
  let mut le = [0u8; 8];
  le.copy_from_slice(&bytes[..8]);
  Some(u64::from_le_bytes(le))
}

#[cfg(test)]
mod tests {
  use super::*;
  use ff::Field;
  use halo2curves::bn256::Fr;

  fn assignment(pairs: &[(&str, i64)]) -> HashMap<String, Fr> {
    pairs
      .iter()
      .map(|(name, v)| {
        let value = if *v < 0 {
          -Fr::from((-*v) as u64)
        } else {
          Fr::from(*v as u64)
        };
        (name.to_string(), value)
      })
      .collect()
  }

  fn solve_helper(
    r1cs: &R1cs<Fr>,
    assignment: &HashMap<String, Fr>,
  ) -> Result<(Vec<Fr>, Vec<Fr>, Vec<Fr>, Vec<Fr>), Groth16Error> {
    let n = r1cs.nb_constraints();
    let (mut a, mut b, mut c) = (vec![Fr::ZERO; n], vec![Fr::ZERO; n], vec![Fr::ZERO; n]);
    let mut wires = vec![Fr::ZERO; r1cs.nb_wires];
    r1cs.solve(assignment, &mut a, &mut b, &mut c, &mut wires, None)?;
    Ok((a, b, c, wires))
  }

  #[test]
  fn test_solve_addition_circuit() {
    let mut builder = R1csBuilder::<Fr>::new();
    let x = builder.secret_input("A");
    let y = builder.secret_input("B");
    let z = builder.public_input("C");
    let sum = builder.add(x, y);
    builder.assert_is_equal(z, sum);
    let r1cs = builder.build();

    assert_eq!(r1cs.nb_public_wires, 2); // one wire + C
    let (a, b, c, _) = solve_helper(&r1cs, &assignment(&[("A", 3), ("B", 5), ("C", 8)])).unwrap();
    for i in 0..r1cs.nb_constraints() {
      assert_eq!(a[i] * b[i], c[i]);
    }
  }

  #[test]
  fn test_solve_reports_equality_failure() {
    let mut builder = R1csBuilder::<Fr>::new();
    let x = builder.secret_input("A");
    let y = builder.secret_input("B");
    let z = builder.public_input("C");
    let sum = builder.add(x, y);
    builder.assert_is_equal(z, sum);
    let r1cs = builder.build();

    let err = solve_helper(&r1cs, &assignment(&[("A", 3), ("B", 5), ("C", 9)])).unwrap_err();
    match err {
      Groth16Error::Unsatisfied { reason } => {
        assert!(reason.contains("[assertIsEqual] 9 == (3 + 5)"), "{reason}");
        assert!(reason.contains("declared at"), "{reason}");
      }
      other => panic!("unexpected error {other:?}"),
    }
  }

  #[test]
  fn test_solve_reports_division_by_zero() {
    let mut builder = R1csBuilder::<Fr>::new();
    let x = builder.secret_input("A");
    let y = builder.secret_input("B");
    let z = builder.secret_input("C");
    let denom = builder.add(y, z);
    let quot = builder.div(x, denom);
    builder.assert_is_equal(quot, builder.one());
    let r1cs = builder.build();

    let err = solve_helper(&r1cs, &assignment(&[("A", 2), ("B", -2), ("C", 2)])).unwrap_err();
    match err {
      Groth16Error::Unsatisfied { reason } => {
        assert!(reason.contains("[div] 2/(-2 + 2) == 0"), "{reason}");
      }
      other => panic!("unexpected error {other:?}"),
    }
  }

  #[test]
  fn test_solve_reports_boolean_failure() {
    let mut builder = R1csBuilder::<Fr>::new();
    let x = builder.secret_input("B");
    let y = builder.secret_input("C");
    let sum = builder.add(x, y);
    builder.assert_is_boolean(sum);
    let r1cs = builder.build();

    let err = solve_helper(&r1cs, &assignment(&[("B", 24), ("C", 42)])).unwrap_err();
    match err {
      Groth16Error::Unsatisfied { reason } => {
        assert!(reason.contains("[assertIsBoolean] (24 + 42) == (0|1)"), "{reason}");
      }
      other => panic!("unexpected error {other:?}"),
    }
  }

  #[test]
  fn test_solve_boolean_accepts_zero_and_one() {
    for value in [0i64, 1] {
      let mut builder = R1csBuilder::<Fr>::new();
      let x = builder.secret_input("B");
      builder.assert_is_boolean(x);
      let r1cs = builder.build();
      solve_helper(&r1cs, &assignment(&[("B", value)])).unwrap();
    }
  }

  #[test]
  fn test_solve_missing_and_unknown_assignments() {
    let mut builder = R1csBuilder::<Fr>::new();
    let x = builder.secret_input("A");
    builder.assert_is_boolean(x);
    let r1cs = builder.build();

    assert!(matches!(
      solve_helper(&r1cs, &assignment(&[])),
      Err(Groth16Error::MissingAssignment { .. })
    ));
    assert!(matches!(
      solve_helper(&r1cs, &assignment(&[("A", 1), ("Z", 1)])),
      Err(Groth16Error::UnknownVariable { .. })
    ));
  }

  #[test]
  fn test_println_writes_to_sink() {
    let mut builder = R1csBuilder::<Fr>::new();
    let x = builder.secret_input("A");
    let y = builder.secret_input("B");
    let p = builder.mul(x, y);
    builder.println("product", p);
    let r1cs = builder.build();

    let n = r1cs.nb_constraints();
    let (mut a, mut b, mut c) = (vec![Fr::ZERO; n], vec![Fr::ZERO; n], vec![Fr::ZERO; n]);
    let mut wires = vec![Fr::ZERO; r1cs.nb_wires];
    let mut sink = Vec::new();
    r1cs
      .solve(
        &assignment(&[("A", 6), ("B", 7)]),
        &mut a,
        &mut b,
        &mut c,
        &mut wires,
        Some(&mut sink),
      )
      .unwrap();
    assert_eq!(String::from_utf8(sink).unwrap(), "product 42\n");
  }

  #[test]
  fn test_public_values_order() {
    let mut builder = R1csBuilder::<Fr>::new();
    let x = builder.secret_input("A");
    let u = builder.public_input("U");
    let v = builder.public_input("V");
    let s = builder.add(u, v);
    builder.assert_is_equal(s, x);
    let r1cs = builder.build();

    let publics = r1cs
      .public_values(&assignment(&[("A", 10), ("U", 4), ("V", 6)]))
      .unwrap();
    assert_eq!(publics, vec![Fr::ONE, Fr::from(4u64), Fr::from(6u64)]);
  }

  #[test]
  fn test_fmt_scalar_signed_rendering() {
    assert_eq!(fmt_scalar(&Fr::from(42u64)), "42");
    assert_eq!(fmt_scalar(&-Fr::from(2u64)), "-2");
    assert_eq!(fmt_scalar(&Fr::ZERO), "0");
  }
}
