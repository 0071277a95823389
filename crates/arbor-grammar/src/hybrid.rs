//! Genetic blending of two presets into an offspring grammar.
//!
//! Numeric knobs are interpolated, the axiom is inherited whole from one
//! parent and the rule pool is a shuffled, thinned union of both parents'
//! rules. Offspring are not checked for sense; a hybrid may draw nothing.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::error::GrammarError;
use crate::preset::{Grammar, lerp};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridConfig {
    /// Share of the combined rule pool an offspring keeps.
    pub rule_retention: f64,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rule_retention: 0.7,
        }
    }
}

impl HybridConfig {
    /// Number of rules kept out of a pool of `pool` rules.
    pub fn retained_rules(&self, pool: usize) -> usize {
        if pool == 0 {
            return 0;
        }
        let kept = (self.rule_retention * pool as f64).floor();
        (kept.max(0.0) as usize).clamp(1, pool)
    }

    /// Blends `a` (weight `1 - alpha`) with `b` (weight `alpha`).
    pub fn crossbreed(&self, a: &Grammar, b: &Grammar, alpha: f64, rng: &mut impl Rng) -> Grammar {
        let t = alpha.clamp(0.0, 1.0);

        let axiom = if rng.gen_bool(0.5) {
            a.axiom.clone()
        } else {
            b.axiom.clone()
        };

        let mut rules: Vec<_> = a.rules.iter().chain(&b.rules).cloned().collect();
        rules.shuffle(rng);
        rules.truncate(self.retained_rules(rules.len()));

        Grammar {
            name: format!("{}+{}", a.name, b.name),
            axiom,
            rules,
            iterations: lerp(a.iterations as f64, b.iterations as f64, t)
                .round()
                .max(0.0) as u32,
            base_radius: lerp(a.base_radius, b.base_radius, t),
            medial_axis: if t < 0.5 { a.medial_axis } else { b.medial_axis },
            auto_randomise: a.auto_randomise || b.auto_randomise,
            radius_noise: a.radius_noise.lerp(&b.radius_noise, t),
            taper: a.taper.lerp(&b.taper, t),
            angle_jitter: a.angle_jitter.lerp(&b.angle_jitter, t),
            length_jitter: a.length_jitter.lerp(&b.length_jitter, t),
            tropism: lerp(a.tropism, b.tropism, t),
            wander: a.wander.lerp(&b.wander, t),
        }
    }

    /// Crossbreeds two distinct pool members with a uniformly drawn weight.
    pub fn random_hybrid(
        &self,
        pool: &[Grammar],
        rng: &mut impl Rng,
    ) -> Result<Grammar, GrammarError> {
        if pool.len() < 2 {
            return Err(GrammarError::PoolTooSmall(pool.len()));
        }

        let first = rng.gen_range(0..pool.len());
        let mut second = rng.gen_range(0..pool.len() - 1);
        if second >= first {
            second += 1;
        }
        let alpha = rng.gen_range(0.0_f64..1.0);

        debug!(
            a = %pool[first].name,
            b = %pool[second].name,
            alpha,
            "random hybrid"
        );
        Ok(self.crossbreed(&pool[first], &pool[second], alpha, rng))
    }
}

pub fn crossbreed(a: &Grammar, b: &Grammar, alpha: f64, rng: &mut impl Rng) -> Grammar {
    HybridConfig::default().crossbreed(a, b, alpha, rng)
}

pub fn random_hybrid(pool: &[Grammar], rng: &mut impl Rng) -> Result<Grammar, GrammarError> {
    HybridConfig::default().random_hybrid(pool, rng)
}
