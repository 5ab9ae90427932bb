//! Compiler settings.

/// Hard ceiling on [`CompilerConfig::max_fluents`].
///
/// Every one of the `2^n` states is materialized, so this bounds memory use
/// well below what the `u64` state enumeration could address.
pub const FLUENT_LIMIT: usize = 24;

/// Configuration for [`Compiler`](crate::compile::Compiler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Maximum number of distinct fluents in a domain (default: 16).
    ///
    /// The state space has `2^n` states, so larger domains are rejected before
    /// enumeration. Values above [`FLUENT_LIMIT`] are capped.
    pub max_fluents: usize,
    /// Duration of an edge whose action has no `lasts` statement (default: 0).
    pub default_duration: u64,
    /// Whether to memoize formula normalization within a compile run (default: true).
    pub memoize_formulas: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_fluents: 16,
            default_duration: 0,
            memoize_formulas: true,
        }
    }
}

impl CompilerConfig {
    pub fn with_max_fluents(mut self, max_fluents: usize) -> Self {
        self.max_fluents = max_fluents;
        self
    }

    pub fn with_default_duration(mut self, duration: u64) -> Self {
        self.default_duration = duration;
        self
    }

    pub fn with_memoize_formulas(mut self, enabled: bool) -> Self {
        self.memoize_formulas = enabled;
        self
    }

    /// The fluent limit actually enforced.
    pub fn fluent_limit(&self) -> usize {
        self.max_fluents.min(FLUENT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_fluents, 16);
        assert_eq!(config.default_duration, 0);
        assert!(config.memoize_formulas);
    }

    #[test]
    fn test_builder() {
        let config = CompilerConfig::default()
            .with_max_fluents(100)
            .with_default_duration(1)
            .with_memoize_formulas(false);
        assert_eq!(config.max_fluents, 100);
        assert_eq!(config.fluent_limit(), FLUENT_LIMIT);
        assert_eq!(config.default_duration, 1);
        assert!(!config.memoize_formulas);
    }

    #[test]
    fn test_fluent_limit_is_hard_ceiling() {
        let config = CompilerConfig::default().with_max_fluents(40);
        assert_eq!(config.fluent_limit(), FLUENT_LIMIT);
        assert!(FLUENT_LIMIT < 32);

        let config = CompilerConfig::default().with_max_fluents(8);
        assert_eq!(config.fluent_limit(), 8);
    }
}
