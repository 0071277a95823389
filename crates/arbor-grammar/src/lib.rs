//! Parametric branch grammars: expressions, rewriting, turtle interpretation,
//! medial-axis radii and preset hybridization.

pub mod error;
pub mod expr;
pub mod generate;
pub mod hybrid;
pub mod library;
pub mod medial;
pub mod preset;
pub mod rewrite;
pub mod symbol;
pub mod turtle;

pub use error::GrammarError;
pub use expr::{BinaryOp, Env, Expr, UnaryOp};
pub use generate::{Generation, generate, generate_seeded};
pub use hybrid::{HybridConfig, crossbreed, random_hybrid};
pub use library::PresetLibrary;
pub use medial::{MEDIAL_RADIUS_SCALE, apply_medial_axis};
pub use preset::{Grammar, Span};
pub use rewrite::{PassStats, RewriteConfig, expand, rewrite_once};
pub use symbol::{
    Axiom, OutputSymbol, Rule, Symbol, parse_successor, parse_symbols, render_symbols,
};
pub use turtle::{TurtleOutput, interpret};
