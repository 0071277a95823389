use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("{message} at column {column}")]
    Parse { message: String, column: usize },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("invalid symbol string: {0}")]
    Symbols(String),

    #[error("invalid rule '{rule}': {message}")]
    Rule { rule: String, message: String },

    #[error("expansion exceeded the {limit} symbol limit at iteration {iteration}")]
    SymbolLimit { limit: usize, iteration: u32 },

    #[error("{requested} iterations requested, above the {limit} iteration limit")]
    IterationLimit { limit: u32, requested: u32 },

    #[error("interpretation produced {count} segments, above the {limit} segment limit")]
    SegmentLimit { limit: usize, count: usize },

    #[error("medial-axis pass needs {pairs} ancestor visits, above the {limit} limit")]
    MedialLimit { limit: usize, pairs: usize },

    #[error("hybridization needs at least two grammars, pool has {0}")]
    PoolTooSmall(usize),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("failed to read presets: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid preset JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl GrammarError {
    pub(crate) fn parse(message: impl Into<String>, column: usize) -> Self {
        Self::Parse {
            message: message.into(),
            column,
        }
    }
}
