//! Named preset collections: the built-in species and JSON preset files.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::GrammarError;
use crate::preset::{Grammar, Span};

const BUILTIN_PRESETS: &str = include_str!("../presets/builtin.json");

/// Organic ranges given to presets that declare no variation of their own.
pub const INJECTED_RADIUS_NOISE: Span = Span::new(0.85, 1.15);
pub const INJECTED_TAPER: Span = Span::new(0.6, 0.7);
pub const INJECTED_ANGLE_JITTER: Span = Span::new(-6.0, 6.0);
pub const INJECTED_LENGTH_JITTER: Span = Span::new(0.85, 1.15);
pub const INJECTED_WANDER: Span = Span::new(-3.0, 3.0);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetLibrary {
    presets: Vec<Grammar>,
}

impl PresetLibrary {
    pub fn builtin() -> Result<Self, GrammarError> {
        Self::from_json_str(BUILTIN_PRESETS)
    }

    pub fn from_json_str(json: &str) -> Result<Self, GrammarError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GrammarError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let library = Self::from_json_str(&text)?;
        info!(path = %path.display(), presets = library.len(), "loaded preset file");
        Ok(library)
    }

    pub fn to_json_pretty(&self) -> Result<String, GrammarError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.presets.iter().map(|p| p.name.as_str())
    }

    pub fn grammars(&self) -> &[Grammar] {
        &self.presets
    }

    pub fn get(&self, name: &str) -> Result<&Grammar, GrammarError> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| GrammarError::UnknownPreset(name.to_string()))
    }

    /// Gives every fully deterministic preset the default organic ranges and
    /// turns on per-step re-randomisation for it.
    pub fn with_injected_variation(mut self) -> Self {
        for grammar in &mut self.presets {
            if !grammar.is_deterministic() {
                continue;
            }
            grammar.radius_noise = INJECTED_RADIUS_NOISE;
            grammar.taper = INJECTED_TAPER;
            grammar.angle_jitter = INJECTED_ANGLE_JITTER;
            grammar.length_jitter = INJECTED_LENGTH_JITTER;
            grammar.wander = INJECTED_WANDER;
            grammar.auto_randomise = true;
        }
        self
    }
}
