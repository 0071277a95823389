use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::symbol::{Axiom, Rule};

/// Closed interval sampled uniformly; `min == max` is a fixed value.
///
/// Spans that are empty, contain NaN or whose width overflows to infinity
/// are degenerate and always yield `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min
            || self.min.is_nan()
            || self.max.is_nan()
            || !(self.max - self.min).is_finite()
    }

    /// Draws a value; degenerate spans return `min` without touching the RNG.
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        if self.is_degenerate() {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    pub fn lerp(&self, other: &Span, t: f64) -> Span {
        Span {
            min: lerp(self.min, other.min, t),
            max: lerp(self.max, other.max, t),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Exact at both ends: `lerp(a, b, 0) == a` and `lerp(a, b, 1) == b`.
pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// A parametric plant description: what to rewrite and how to draw it.
///
/// Angles (`angle_jitter`, `wander`) are in degrees. Missing JSON fields take
/// the values from [`Grammar::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Grammar {
    pub name: String,
    pub axiom: Axiom,
    pub rules: Vec<Rule>,
    pub iterations: u32,
    /// Radius per unit of segment length before noise and taper.
    pub base_radius: f64,
    pub medial_axis: bool,
    /// Re-draw radius noise and taper on every forward step.
    pub auto_randomise: bool,
    pub radius_noise: Span,
    /// Per-depth radius factor, raised to the segment depth.
    pub taper: Span,
    pub angle_jitter: Span,
    pub length_jitter: Span,
    /// Blend factor pulling each heading towards world up after a step.
    pub tropism: f64,
    pub wander: Span,
}

impl Default for Grammar {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            axiom: Axiom::default(),
            rules: Vec::new(),
            iterations: 6,
            base_radius: 0.04,
            medial_axis: false,
            auto_randomise: false,
            radius_noise: Span::fixed(1.0),
            taper: Span::fixed(0.65),
            angle_jitter: Span::fixed(0.0),
            length_jitter: Span::fixed(1.0),
            tropism: 0.0,
            wander: Span::fixed(0.0),
        }
    }
}

impl Grammar {
    pub fn variation_ranges(&self) -> [Span; 5] {
        [
            self.radius_noise,
            self.taper,
            self.angle_jitter,
            self.length_jitter,
            self.wander,
        ]
    }

    /// True when no variation range would produce any randomness.
    pub fn is_deterministic(&self) -> bool {
        self.variation_ranges().iter().all(Span::is_degenerate)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "preset '{}'", self.name)?;
        writeln!(f, "  iterations     {}", self.iterations)?;
        writeln!(f, "  base radius    {}", self.base_radius)?;
        writeln!(f, "  medial axis    {}", self.medial_axis)?;
        writeln!(f, "  auto-randomise {}", self.auto_randomise)?;
        writeln!(f, "  tropism        {}", self.tropism)?;
        writeln!(f, "  radius noise   {}", self.radius_noise)?;
        writeln!(f, "  taper          {}", self.taper)?;
        writeln!(f, "  angle jitter   {} deg", self.angle_jitter)?;
        writeln!(f, "  length jitter  {}", self.length_jitter)?;
        writeln!(f, "  wander         {} deg", self.wander)?;
        writeln!(f, "  axiom          {}", self.axiom)?;
        write!(f, "  rules          {}", self.rules.len())?;
        for (i, rule) in self.rules.iter().enumerate() {
            write!(f, "\n    {:>2}. {rule}", i + 1)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::{Grammar, Span};

    #[test]
    fn degenerate_span_returns_min_without_drawing() {
        let mut a = StdRng::seed_from_u64(5);
        let mut b = StdRng::seed_from_u64(5);
        assert_eq!(Span::fixed(0.65).sample(&mut a), 0.65);
        assert_eq!(Span::new(2.0, 1.0).sample(&mut a), 2.0);
        let span = Span::new(0.0, 1.0);
        assert_eq!(span.sample(&mut a), span.sample(&mut b));
    }

    #[test]
    fn overflowing_span_is_degenerate() {
        let grammar: Grammar =
            serde_json::from_str(r#"{ "wander": { "min": -1e308, "max": 1e308 } }"#)
                .expect("grammar should deserialize");
        assert!(grammar.wander.is_degenerate());

        let mut a = StdRng::seed_from_u64(3);
        let mut b = StdRng::seed_from_u64(3);
        assert_eq!(grammar.wander.sample(&mut a), -1e308);
        assert_eq!(Span::new(0.0, f64::INFINITY).sample(&mut a), 0.0);
        assert_eq!(
            Span::new(0.0, 1.0).sample(&mut a),
            Span::new(0.0, 1.0).sample(&mut b)
        );
    }

    #[test]
    fn samples_stay_inside_span() {
        let mut rng = StdRng::seed_from_u64(17);
        let span = Span::new(-6.0, 6.0);
        for _ in 0..200 {
            let v = span.sample(&mut rng);
            assert!((-6.0..=6.0).contains(&v));
        }
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let grammar: Grammar = serde_json::from_str(
            r#"{ "name": "stick", "axiom": "F(1)", "rules": ["F(l) -> F(l) F(l)"] }"#,
        )
        .expect("partial grammar should deserialize");
        assert_eq!(grammar.iterations, 6);
        assert_eq!(grammar.base_radius, 0.04);
        assert_eq!(grammar.taper, Span::fixed(0.65));
        assert_eq!(grammar.length_jitter, Span::fixed(1.0));
        assert_eq!(grammar.tropism, 0.0);
        assert!(!grammar.medial_axis);
        assert!(!grammar.auto_randomise);
        assert!(grammar.is_deterministic());
        assert_eq!(grammar.rules.len(), 1);
    }

    #[test]
    fn json_round_trip_keeps_ranges_as_objects() {
        let grammar = Grammar {
            name: "x".to_string(),
            wander: Span::new(-3.0, 3.0),
            ..Grammar::default()
        };
        let value = serde_json::to_value(&grammar).expect("grammar should serialize");
        assert_eq!(value["wander"]["min"], -3.0);
        assert_eq!(value["wander"]["max"], 3.0);
        let back: Grammar = serde_json::from_value(value).expect("grammar should deserialize");
        assert_eq!(back, grammar);
        assert!(!back.is_deterministic());
    }

    #[test]
    fn summary_lists_numbered_rules() {
        let grammar: Grammar = serde_json::from_str(
            r#"{ "name": "pair", "axiom": "A", "rules": ["A -> F A", "F -> F F"] }"#,
        )
        .expect("grammar should deserialize");
        let summary = grammar.to_string();
        assert!(summary.starts_with("preset 'pair'"));
        assert!(summary.contains(" 1. A -> F A"));
        assert!(summary.contains(" 2. F -> F F"));
        assert!(summary.contains("axiom          A"));
    }
}
