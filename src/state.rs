//! Total fluent valuations.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::{Fluent, Lit};

/// A truth assignment to fluents.
///
/// States stored in a compiled graph are total: their domain equals the
/// graph's fluent set exactly. Two states are equal iff their valuations are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct State {
    values: BTreeMap<Fluent, bool>,
}

impl State {
    pub fn from_values(values: impl IntoIterator<Item = (Fluent, bool)>) -> Self {
        State {
            values: values.into_iter().collect(),
        }
    }

    /// Builds the state whose `i`-th fluent is the `i`-th bit of `bits`.
    pub fn from_bits(fluents: &[Fluent], bits: u64) -> Self {
        State::from_values(
            fluents
                .iter()
                .enumerate()
                .map(|(i, f)| (f.clone(), (bits >> i) & 1 == 1)),
        )
    }

    /// Value of `fluent`, or `None` if the state does not assign it.
    pub fn get(&self, fluent: &str) -> Option<bool> {
        self.values.get(fluent).copied()
    }

    /// True if the state assigns the literal's fluent its required value.
    pub fn satisfies(&self, lit: &Lit) -> bool {
        self.get(lit.fluent().name()) == Some(lit.polarity())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fluent, bool)> + '_ {
        self.values.iter().map(|(f, &v)| (f, v))
    }

    pub fn fluents(&self) -> impl Iterator<Item = &Fluent> + '_ {
        self.values.keys()
    }

    /// The state as a list of literals, in fluent order.
    pub fn lits(&self) -> Vec<Lit> {
        self.iter().map(|(f, v)| Lit::new(f.clone(), v)).collect()
    }

    /// Number of fluents on which the two states disagree.
    ///
    /// Fluents assigned by only one of the states count as differences.
    pub fn distance(&self, other: &State) -> usize {
        let mut diff = self
            .values
            .iter()
            .filter(|(f, v)| other.values.get(*f) != Some(*v))
            .count();
        diff += other
            .values
            .keys()
            .filter(|f| !self.values.contains_key(*f))
            .count();
        diff
    }

    /// Human-readable label: `name` for true fluents, `~name` for false ones.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (fluent, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if value {
                write!(f, "{}", fluent)?;
            } else {
                write!(f, "~{}", fluent)?;
            }
        }
        write!(f, "}}")
    }
}
