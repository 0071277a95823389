//! Parallel parametric rewriting with depth-dependent stochastic pruning.

use rand::Rng;
use tracing::{debug, trace};

use crate::error::GrammarError;
use crate::expr::Env;
use crate::preset::Grammar;
use crate::symbol::{Rule, Symbol};

/// Pruning knobs plus the work bounds of one generation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewriteConfig {
    /// Bracket depth up to which matched symbols are never pruned.
    pub prune_start_depth: usize,
    /// Pruning probability added per nesting level above the start depth.
    pub prune_rate: f64,
    /// No pass may produce more symbols than this.
    pub max_symbols: usize,
    pub max_iterations: u32,
    /// Checked after interpretation, before any post-pass.
    pub max_segments: usize,
    /// Bound on the medial pass: the sum of segment depths, which is the
    /// number of ancestor/descendant pairs it walks.
    pub max_medial_pairs: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            prune_start_depth: 2,
            prune_rate: 0.03,
            max_symbols: 1_000_000,
            max_iterations: 128,
            max_segments: 1_000_000,
            max_medial_pairs: 50_000_000,
        }
    }
}

impl RewriteConfig {
    /// Probability that a matched symbol at bracket `depth` is dropped.
    pub fn prune_probability(&self, depth: usize) -> f64 {
        if depth <= self.prune_start_depth {
            return 0.0;
        }
        (self.prune_rate * (depth - self.prune_start_depth) as f64).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub rewritten: usize,
    pub pruned: usize,
}

/// Applies one rewriting pass to every symbol of `symbols`.
///
/// The first rule (in declaration order) whose head and arity match and
/// whose condition is positive replaces the symbol; unmatched symbols are
/// copied through. The pass stops with `SymbolLimit` (reported as iteration 1)
/// as soon as its output would exceed `max_symbols`.
pub fn rewrite_once(
    symbols: &[Symbol],
    rules: &[Rule],
    config: &RewriteConfig,
    rng: &mut impl Rng,
) -> Result<(Vec<Symbol>, PassStats), GrammarError> {
    let limit = config.max_symbols;
    let mut out = Vec::with_capacity(symbols.len().saturating_mul(2).min(limit));
    let mut stats = PassStats::default();
    let mut depth = 0usize;

    for symbol in symbols {
        match symbol.name {
            '[' => {
                push_bounded(&mut out, symbol.clone(), limit)?;
                depth += 1;
                continue;
            }
            ']' => {
                push_bounded(&mut out, symbol.clone(), limit)?;
                depth = depth.saturating_sub(1);
                continue;
            }
            _ => {}
        }

        let Some((rule, env)) = select_rule(symbol, rules)? else {
            push_bounded(&mut out, symbol.clone(), limit)?;
            continue;
        };

        let probability = config.prune_probability(depth);
        if probability > 0.0 && rng.gen_range(0.0_f64..1.0) < probability {
            trace!(%symbol, depth, probability, "pruned symbol");
            stats.pruned += 1;
            continue;
        }

        for output in &rule.successor {
            push_bounded(&mut out, output.instantiate(&env)?, limit)?;
        }
        stats.rewritten += 1;
    }

    Ok((out, stats))
}

fn push_bounded(out: &mut Vec<Symbol>, symbol: Symbol, limit: usize) -> Result<(), GrammarError> {
    if out.len() >= limit {
        return Err(GrammarError::SymbolLimit {
            limit,
            iteration: 1,
        });
    }
    out.push(symbol);
    Ok(())
}

fn select_rule<'r>(
    symbol: &Symbol,
    rules: &'r [Rule],
) -> Result<Option<(&'r Rule, Env)>, GrammarError> {
    for rule in rules.iter().filter(|rule| rule.matches(symbol)) {
        let env = rule.bind(symbol);
        let satisfied = match &rule.condition {
            // NaN compares false, so it does not satisfy the rule.
            Some(condition) => condition.evaluate(&env)? > 0.0,
            None => true,
        };
        if satisfied {
            return Ok(Some((rule, env)));
        }
    }
    Ok(None)
}

/// Runs `grammar.iterations` passes starting from the axiom.
pub fn expand(
    grammar: &Grammar,
    config: &RewriteConfig,
    rng: &mut impl Rng,
) -> Result<Vec<Symbol>, GrammarError> {
    if grammar.iterations > config.max_iterations {
        return Err(GrammarError::IterationLimit {
            limit: config.max_iterations,
            requested: grammar.iterations,
        });
    }

    let mut current = grammar.axiom.symbols().to_vec();
    for iteration in 1..=grammar.iterations {
        let (next, stats) =
            rewrite_once(&current, &grammar.rules, config, rng).map_err(|err| match err {
                GrammarError::SymbolLimit { limit, .. } => {
                    GrammarError::SymbolLimit { limit, iteration }
                }
                other => other,
            })?;
        debug!(
            iteration,
            symbols = next.len(),
            rewritten = stats.rewritten,
            pruned = stats.pruned,
            "rewrite pass"
        );
        current = next;
    }

    Ok(current)
}
