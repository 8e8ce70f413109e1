//! Construction of constraint systems, one operation at a time.
//!
//! The builder allocates wires in whatever order the caller declares them and
//! defers the final layout to `build`, which renumbers wires private-first
//! with the constant-one wire leading the public segment. Every constraint
//! records a value template and its declaration site so solver failures can
//! name the operands the way they were written.
use super::{Constraint, ConstraintKind, DebugInfo, LinearCombination, LogToken, R1cs, Term};
use ff::PrimeField;
use std::collections::HashMap;
use std::panic::Location;

/// A handle on a wire under construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wire(usize);

struct WireInfo {
  public: bool,
  name: Option<String>,
  // value template of the expression that produced this wire
  repr: Vec<LogToken>,
}

/// Incrementally builds an `R1cs`.
pub struct R1csBuilder<F: PrimeField> {
  wires: Vec<WireInfo>,
  constraints: Vec<Constraint<F>>,
  logs: Vec<Vec<LogToken>>,
}

impl<F: PrimeField> Default for R1csBuilder<F> {
  fn default() -> Self {
    Self::new()
  }
}

impl<F: PrimeField> R1csBuilder<F> {
  /// Creates a builder holding only the constant-one wire.
  pub fn new() -> Self {
    R1csBuilder {
      wires: vec![WireInfo {
        public: true,
        name: None,
        repr: vec![LogToken::Text("1".to_string())],
      }],
      constraints: Vec::new(),
      logs: Vec::new(),
    }
  }

  /// The constant-one wire.
  pub fn one(&self) -> Wire {
    Wire(0)
  }

  /// Declares a named public input wire.
  pub fn public_input(&mut self, name: &str) -> Wire {
    self.input(name, true)
  }

  /// Declares a named secret input wire.
  pub fn secret_input(&mut self, name: &str) -> Wire {
    self.input(name, false)
  }

  fn input(&mut self, name: &str, public: bool) -> Wire {
    let wire = Wire(self.wires.len());
    self.wires.push(WireInfo {
      public,
      name: Some(name.to_string()),
      repr: vec![LogToken::Wire(wire.0)],
    });
    wire
  }

  fn internal(&mut self, repr: Vec<LogToken>) -> Wire {
    let wire = Wire(self.wires.len());
    self.wires.push(WireInfo {
      public: false,
      name: None,
      repr,
    });
    wire
  }

  fn compound_repr(&self, x: Wire, op: &str, y: Wire) -> Vec<LogToken> {
    let mut repr = vec![LogToken::Text("(".to_string())];
    repr.extend(self.wires[x.0].repr.iter().cloned());
    repr.push(LogToken::Text(op.to_string()));
    repr.extend(self.wires[y.0].repr.iter().cloned());
    repr.push(LogToken::Text(")".to_string()));
    repr
  }

  fn lc(terms: Vec<(F, Wire)>) -> LinearCombination<F> {
    LinearCombination {
      terms: terms
        .into_iter()
        .map(|(coeff, wire)| Term { coeff, wire: wire.0 })
        .collect(),
    }
  }

  /// Returns a wire constrained to `x + y`.
  #[track_caller]
  pub fn add(&mut self, x: Wire, y: Wire) -> Wire {
    let repr = self.compound_repr(x, " + ", y);
    let out = self.internal(repr.clone());
    self.constraints.push(Constraint {
      l: Self::lc(vec![(F::ONE, x), (F::ONE, y)]),
      r: Self::lc(vec![(F::ONE, self.one())]),
      o: Self::lc(vec![(F::ONE, out)]),
      solved_wire: Some(out.0),
      debug: DebugInfo {
        kind: ConstraintKind::Add,
        tokens: repr,
        location: Location::caller().to_string(),
      },
    });
    out
  }

  /// Returns a wire constrained to `x · y`.
  #[track_caller]
  pub fn mul(&mut self, x: Wire, y: Wire) -> Wire {
    let repr = self.compound_repr(x, " * ", y);
    let out = self.internal(repr.clone());
    self.constraints.push(Constraint {
      l: Self::lc(vec![(F::ONE, x)]),
      r: Self::lc(vec![(F::ONE, y)]),
      o: Self::lc(vec![(F::ONE, out)]),
      solved_wire: Some(out.0),
      debug: DebugInfo {
        kind: ConstraintKind::Mul,
        tokens: repr,
        location: Location::caller().to_string(),
      },
    });
    out
  }

  /// Returns a wire constrained to `x / y`. Solving fails with a `[div]`
  /// trace when `y` evaluates to zero.
  #[track_caller]
  pub fn div(&mut self, x: Wire, y: Wire) -> Wire {
    let out = self.internal(self.compound_repr(x, " / ", y));
    let mut tokens = self.wires[x.0].repr.clone();
    tokens.push(LogToken::Text("/".to_string()));
    tokens.extend(self.wires[y.0].repr.iter().cloned());
    tokens.push(LogToken::Text(" == 0".to_string()));
    self.constraints.push(Constraint {
      l: Self::lc(vec![(F::ONE, out)]),
      r: Self::lc(vec![(F::ONE, y)]),
      o: Self::lc(vec![(F::ONE, x)]),
      solved_wire: Some(out.0),
      debug: DebugInfo {
        kind: ConstraintKind::Div,
        tokens,
        location: Location::caller().to_string(),
      },
    });
    out
  }

  /// Constrains `x` and `y` to be equal.
  #[track_caller]
  pub fn assert_is_equal(&mut self, x: Wire, y: Wire) {
    let mut tokens = self.wires[x.0].repr.clone();
    tokens.push(LogToken::Text(" == ".to_string()));
    tokens.extend(self.wires[y.0].repr.iter().cloned());
    self.constraints.push(Constraint {
      l: Self::lc(vec![(F::ONE, x)]),
      r: Self::lc(vec![(F::ONE, self.one())]),
      o: Self::lc(vec![(F::ONE, y)]),
      solved_wire: None,
      debug: DebugInfo {
        kind: ConstraintKind::AssertIsEqual,
        tokens,
        location: Location::caller().to_string(),
      },
    });
  }

  /// Constrains `x` to be 0 or 1.
  #[track_caller]
  pub fn assert_is_boolean(&mut self, x: Wire) {
    let mut tokens = self.wires[x.0].repr.clone();
    tokens.push(LogToken::Text(" == (0|1)".to_string()));
    self.constraints.push(Constraint {
      l: Self::lc(vec![(F::ONE, x)]),
      r: Self::lc(vec![(F::ONE, self.one()), (-F::ONE, x)]),
      o: LinearCombination::default(),
      solved_wire: None,
      debug: DebugInfo {
        kind: ConstraintKind::AssertIsBoolean,
        tokens,
        location: Location::caller().to_string(),
      },
    });
  }

  /// Records a diagnostic entry rendering `wire`'s value behind `prefix`,
  /// written to the solver's sink once the system is solved.
  pub fn println(&mut self, prefix: &str, wire: Wire) {
    self.logs.push(vec![
      LogToken::Text(format!("{prefix} ")),
      LogToken::Wire(wire.0),
    ]);
  }

  /// Freezes the system: renumbers wires private-first and resolves every
  /// recorded wire reference to its final index.
  pub fn build(self) -> R1cs<F> {
    let nb_wires = self.wires.len();
    let nb_public = self.wires.iter().filter(|w| w.public).count();
    let nb_private = nb_wires - nb_public;

    let mut mapping = vec![0usize; nb_wires];
    let (mut next_private, mut next_public) = (0, nb_private);
    for (old, info) in self.wires.iter().enumerate() {
      if info.public {
        mapping[old] = next_public;
        next_public += 1;
      } else {
        mapping[old] = next_private;
        next_private += 1;
      }
    }

    let map_lc = |lc: LinearCombination<F>| LinearCombination {
      terms: lc
        .terms
        .into_iter()
        .map(|t| Term {
          coeff: t.coeff,
          wire: mapping[t.wire],
        })
        .collect(),
    };
    let map_tokens = |tokens: Vec<LogToken>| {
      tokens
        .into_iter()
        .map(|t| match t {
          LogToken::Wire(w) => LogToken::Wire(mapping[w]),
          text => text,
        })
        .collect::<Vec<_>>()
    };

    let constraints = self
      .constraints
      .into_iter()
      .map(|c| Constraint {
        l: map_lc(c.l),
        r: map_lc(c.r),
        o: map_lc(c.o),
        solved_wire: c.solved_wire.map(|w| mapping[w]),
        debug: DebugInfo {
          kind: c.debug.kind,
          tokens: map_tokens(c.debug.tokens),
          location: c.debug.location,
        },
      })
      .collect();

    let mut wire_names = HashMap::new();
    for (old, info) in self.wires.into_iter().enumerate() {
      if let Some(name) = info.name {
        wire_names.insert(name, mapping[old]);
      }
    }

    R1cs {
      nb_wires,
      nb_public_wires: nb_public,
      constraints,
      wire_names,
      logs: self.logs.into_iter().map(map_tokens).collect(),
    }
  }
}
