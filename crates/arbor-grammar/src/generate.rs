use arbor_core::Segment;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;

use crate::error::GrammarError;
use crate::medial::apply_medial_axis;
use crate::preset::Grammar;
use crate::rewrite::{RewriteConfig, expand};
use crate::turtle::interpret;

/// Result of one expand-interpret run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub segments: Vec<Segment>,
    /// Length of the fully expanded symbol string.
    pub symbols: usize,
    /// Run-level draws; `None` when every segment drew its own.
    pub radius_noise: Option<f64>,
    pub taper: Option<f64>,
}

/// Expands the grammar, walks the turtle over the result and, in medial-axis
/// mode, recomputes radii from branch reach.
pub fn generate(
    grammar: &Grammar,
    config: &RewriteConfig,
    rng: &mut impl Rng,
) -> Result<Generation, GrammarError> {
    let generation = run(grammar, config, rng)?;
    info!(
        preset = %grammar.name,
        segments = generation.segments.len(),
        symbols = generation.symbols,
        medial = grammar.medial_axis,
        "generated structure"
    );
    Ok(generation)
}

/// Same as [`generate`] with a fresh `StdRng` stream seeded from `seed`.
pub fn generate_seeded(
    grammar: &Grammar,
    config: &RewriteConfig,
    seed: u64,
) -> Result<Generation, GrammarError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let generation = run(grammar, config, &mut rng)?;
    info!(
        preset = %grammar.name,
        seed,
        segments = generation.segments.len(),
        symbols = generation.symbols,
        medial = grammar.medial_axis,
        "generated structure"
    );
    Ok(generation)
}

fn run(
    grammar: &Grammar,
    config: &RewriteConfig,
    rng: &mut impl Rng,
) -> Result<Generation, GrammarError> {
    let symbols = expand(grammar, config, rng)?;
    let mut output = interpret(&symbols, grammar, rng);
    if output.segments.len() > config.max_segments {
        return Err(GrammarError::SegmentLimit {
            limit: config.max_segments,
            count: output.segments.len(),
        });
    }

    if grammar.medial_axis {
        let pairs = output
            .segments
            .iter()
            .fold(0usize, |sum, s| sum.saturating_add(s.depth as usize));
        if pairs > config.max_medial_pairs {
            return Err(GrammarError::MedialLimit {
                limit: config.max_medial_pairs,
                pairs,
            });
        }
        let noise = &output.noise;
        apply_medial_axis(&mut output.segments, |index| noise[index]);
    }
    Ok(Generation {
        segments: output.segments,
        symbols: symbols.len(),
        radius_noise: output.radius_noise,
        taper: output.taper,
    })
}
