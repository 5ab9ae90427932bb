//! Error types for compilation and queries.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while compiling a domain or answering a query.
///
/// Every variant carries the statement or query text that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed statement, formula, or query syntax.
    #[error("parse error in '{input}': {reason}")]
    Parse { input: String, reason: String },

    /// The statements admit no consistent model.
    #[error("contradiction in '{input}': {reason}")]
    Contradiction { input: String, reason: String },

    /// A query mentions a fluent or action the graph does not know.
    #[error("unknown {kind} '{name}' in '{input}'")]
    Lookup {
        input: String,
        kind: &'static str,
        name: String,
    },
}

impl Error {
    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Parse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn contradiction(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Contradiction {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_fluent(input: impl Into<String>, name: impl Into<String>) -> Self {
        Error::Lookup {
            input: input.into(),
            kind: "fluent",
            name: name.into(),
        }
    }

    pub fn unknown_action(input: impl Into<String>, name: impl Into<String>) -> Self {
        Error::Lookup {
            input: input.into(),
            kind: "action",
            name: name.into(),
        }
    }

    /// Replaces the attached input text, keeping the reason.
    ///
    /// Formula errors are raised against the formula text alone; the compiler
    /// uses this to report the whole statement instead.
    pub fn with_input(self, input: impl Into<String>) -> Self {
        let input = input.into();
        match self {
            Error::Parse { reason, .. } => Error::Parse { input, reason },
            Error::Contradiction { reason, .. } => Error::Contradiction { input, reason },
            Error::Lookup { kind, name, .. } => Error::Lookup { input, kind, name },
        }
    }

    /// The statement or query text this error refers to.
    pub fn input(&self) -> &str {
        match self {
            Error::Parse { input, .. } | Error::Contradiction { input, .. } | Error::Lookup { input, .. } => input,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }

    pub fn is_contradiction(&self) -> bool {
        matches!(self, Error::Contradiction { .. })
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, Error::Lookup { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_input() {
        let err = Error::parse("Load causes", "missing effect formula");
        assert_eq!(err.to_string(), "parse error in 'Load causes': missing effect formula");

        let err = Error::unknown_action("necessary executable Fly", "Fly");
        assert_eq!(err.to_string(), "unknown action 'Fly' in 'necessary executable Fly'");
    }

    #[test]
    fn test_with_input() {
        let err = Error::parse("a and", "unexpected end of formula").with_input("initially a and");
        assert!(err.is_parse());
        assert_eq!(err.input(), "initially a and");
    }
}
