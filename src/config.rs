//! Manager configuration.

use derive_builder::Builder;

/// Tunables recognized by a [`crate::Manager`]. All fields are advisory
/// except `reordering` and `garbage_collection`, which gate whether the
/// corresponding subsystems ever run automatically (they can still be
/// invoked explicitly via `Manager::gc`/`Manager::reorder`).
#[derive(Debug, Clone, Copy, PartialEq, Builder)]
#[builder(default, build_fn(name = "build_inner"))]
pub struct Config {
    /// Whether dynamic (Rudell) sifting runs automatically between
    /// top-level kernel calls when the growth threshold is exceeded.
    pub reordering: bool,
    /// Whether garbage collection runs automatically when triggered
    /// (dead-node threshold, failed unique-table insertion). Can still
    /// be invoked explicitly when disabled.
    pub garbage_collection: bool,
    /// Advisory ceiling on total memory use, in bytes. Not enforced
    /// precisely; consulted as a hint for when to GC more eagerly.
    pub max_memory: u64,
    /// Ceiling on the number of ComputedTable entries.
    pub max_cache: usize,
    /// Sifting tolerance: a variable may grow the live node count by at
    /// most this multiplicative factor while searching for its best
    /// position before the search is cut short in that direction.
    pub max_growth: f64,
    /// Sifting swap budget per variable (an adjacent-swap count).
    pub max_swaps: usize,
    /// Sifting breadth: the maximum number of variables considered in
    /// one sifting pass (the highest-node-count variables are picked
    /// first).
    pub max_vars: usize,
    /// Cache-resize threshold, as a percentage in `[0.0, 100.0]`: if the
    /// ComputedTable's hit rate drops below this, it is grown.
    pub min_hit_rate: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            reordering: true,
            garbage_collection: true,
            max_memory: 1 << 32, // 4 GiB, advisory
            max_cache: 1 << 20,
            max_growth: 1.2,
            max_swaps: 10_000,
            max_vars: usize::MAX,
            min_hit_rate: 10.0,
        }
    }
}

impl ConfigBuilder {
    /// Build the [`Config`], validating that percentage/ratio fields are
    /// in sensible ranges.
    pub fn build(&self) -> Result<Config, ConfigBuilderError> {
        let cfg = self.build_inner()?;
        if !(0.0..=100.0).contains(&cfg.min_hit_rate) {
            return Err(ConfigBuilderError::ValidationError(
                "min_hit_rate must be a percentage in [0, 100]".to_string(),
            ));
        }
        if cfg.max_growth <= 1.0 {
            return Err(ConfigBuilderError::ValidationError(
                "max_growth must be greater than 1.0".to_string(),
            ));
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let cfg = Config::default();
        assert!(cfg.reordering);
        assert!(cfg.garbage_collection);
        assert!(cfg.max_growth > 1.0);
    }

    #[test]
    fn builder_rejects_bad_hit_rate() {
        let res = ConfigBuilder::default().min_hit_rate(150.0).build();
        assert!(res.is_err());
    }

    #[test]
    fn builder_overrides_individual_fields() {
        let cfg = ConfigBuilder::default()
            .reordering(false)
            .max_cache(1024)
            .build()
            .unwrap();
        assert!(!cfg.reordering);
        assert_eq!(cfg.max_cache, 1024);
        assert!(cfg.garbage_collection); // unchanged default
    }
}
