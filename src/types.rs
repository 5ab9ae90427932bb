//! Type-safe wrappers for fluent and action names, and signed literals.
//!
//! Fluents and actions are both plain identifiers in the statement text;
//! the newtypes keep them from being mixed up in compiler and query code.

use std::fmt;
use std::ops::Neg;

/// An atomic proposition describing part of the world state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fluent(String);

impl Fluent {
    pub fn new(name: impl Into<String>) -> Self {
        Fluent(name.into())
    }

    /// Returns the name of this fluent.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Positive literal over this fluent.
    pub fn pos(&self) -> Lit {
        Lit::new(self.clone(), true)
    }

    /// Negative literal over this fluent.
    pub fn neg(&self) -> Lit {
        Lit::new(self.clone(), false)
    }
}

impl fmt::Display for Fluent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Fluent {
    fn from(s: &str) -> Self {
        Fluent::new(s)
    }
}

impl From<String> for Fluent {
    fn from(s: String) -> Self {
        Fluent(s)
    }
}

impl std::borrow::Borrow<str> for Fluent {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A named operator that moves the world between states.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Action(String);

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Action(name.into())
    }

    /// Returns the name of this action.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::new(s)
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action(s)
    }
}

impl std::borrow::Borrow<str> for Action {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A signed literal: a fluent together with its required value.
///
/// # Invariants
///
/// - `polarity == true` means the fluent must hold, `false` means it must not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit {
    fluent: Fluent,
    polarity: bool,
}

impl Lit {
    pub fn new(fluent: Fluent, polarity: bool) -> Self {
        Lit { fluent, polarity }
    }

    pub fn fluent(&self) -> &Fluent {
        &self.fluent
    }

    pub fn polarity(&self) -> bool {
        self.polarity
    }

    pub fn is_positive(&self) -> bool {
        self.polarity
    }

    pub fn is_negative(&self) -> bool {
        !self.polarity
    }
}

impl Neg for Lit {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Lit {
            fluent: self.fluent,
            polarity: !self.polarity,
        }
    }
}

impl Neg for &Lit {
    type Output = Lit;

    fn neg(self) -> Self::Output {
        -self.clone()
    }
}

impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.polarity {
            write!(f, "{}", self.fluent)
        } else {
            write!(f, "~{}", self.fluent)
        }
    }
}
