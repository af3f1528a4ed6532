//! Tunables for the builder, the constraint simplifier and the counterexample cache.

/// Configuration for [`ExprBuilder`][crate::builder::ExprBuilder].
///
/// # Examples
///
/// ```
/// use symcore::config::BuilderConfig;
///
/// let config = BuilderConfig::default()
///     .with_table_bits(12)
///     .with_const_array_disjunction(true);
/// assert_eq!(config.table_bits, 12);
/// assert_eq!(config.const_array_disjunction_limit, 100);
/// ```
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Initial number of buckets of the interning tables, as a power of two.
    pub table_bits: usize,
    /// Rewrite `const == read(const_array, i)` into a disjunction over the matching indices.
    pub const_array_disjunction: bool,
    /// Maximum number of matching indices for the rewrite above.
    pub const_array_disjunction_limit: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            table_bits: 16,
            const_array_disjunction: false,
            const_array_disjunction_limit: 100,
        }
    }
}

impl BuilderConfig {
    pub fn with_table_bits(mut self, bits: usize) -> Self {
        self.table_bits = bits;
        self
    }

    pub fn with_const_array_disjunction(mut self, enabled: bool) -> Self {
        self.const_array_disjunction = enabled;
        self
    }

    pub fn with_const_array_disjunction_limit(mut self, limit: usize) -> Self {
        self.const_array_disjunction_limit = limit;
        self
    }
}

/// Configuration for [`ConstraintSet`][crate::constraints::ConstraintSet].
#[derive(Debug, Clone)]
pub struct ConstraintConfig {
    /// Node visits the simplifier may spend on one expression before it
    /// gives up and returns the expression unchanged.
    pub rewrite_budget: usize,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            rewrite_budget: 10_000,
        }
    }
}

impl ConstraintConfig {
    pub fn with_rewrite_budget(mut self, budget: usize) -> Self {
        self.rewrite_budget = budget;
        self
    }
}

/// Configuration for [`CexCachingSolver`][crate::cex_cache::CexCachingSolver].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// On a miss, test every stored assignment before calling the solver.
    pub try_all: bool,
    /// Verify every assignment returned by the solver against its key.
    pub check_bindings: bool,
    /// Total bytes of distinct assignments kept before an eviction pass.
    pub byte_budget: usize,
    /// Probability with which each assignment is dropped during eviction.
    pub evict_probability: f64,
    /// Seed of the eviction coin.
    pub seed: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            try_all: false,
            check_bindings: false,
            byte_budget: 64 << 20,
            evict_probability: 0.5,
            seed: 42,
        }
    }
}

impl CacheConfig {
    pub fn with_try_all(mut self, enabled: bool) -> Self {
        self.try_all = enabled;
        self
    }

    pub fn with_check_bindings(mut self, enabled: bool) -> Self {
        self.check_bindings = enabled;
        self
    }

    pub fn with_byte_budget(mut self, bytes: usize) -> Self {
        self.byte_budget = bytes;
        self
    }

    pub fn with_evict_probability(mut self, p: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&p),
            "Eviction probability should be in the range 0..=1"
        );
        self.evict_probability = p;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_cache_config_builder() {
        let config = CacheConfig::default()
            .with_try_all(true)
            .with_byte_budget(10)
            .with_seed(7);
        assert!(config.try_all);
        assert!(!config.check_bindings);
        assert_eq!(config.byte_budget, 10);
        assert_eq!(config.seed, 7);
    }

    #[test]
    #[should_panic(expected = "Eviction probability")]
    fn test_bad_probability() {
        CacheConfig::default().with_evict_probability(1.5);
    }
}
