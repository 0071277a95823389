//! 3D turtle that turns an expanded symbol string into branch segments.
//!
//! | symbol   | action                                                    |
//! |----------|-----------------------------------------------------------|
//! | `F(len)` | draw a segment of `len` (default 1) along the heading     |
//! | `+(a)`   | yaw left by `a` degrees about the up vector (default 25)  |
//! | `-(a)`   | yaw right                                                 |
//! | `&(a)`   | pitch down about the side vector                          |
//! | `^(a)`   | pitch up                                                  |
//! | `[` `]`  | push / pop the turtle state                               |
//!
//! Every other symbol is ignored.

use arbor_core::{Point3, Segment, add, cross, lerp, mul_scalar, normalize, rotate_axis};
use rand::Rng;

use crate::preset::Grammar;
use crate::symbol::Symbol;

pub const DEFAULT_ANGLE_DEGREES: f64 = 25.0;
pub const START_POSITION: Point3 = [0.0, 1.0, 0.0];
pub const START_FORWARD: Point3 = [0.0, -1.0, 0.0];
pub const START_UP: Point3 = [0.0, 0.0, 1.0];
/// Direction tropism pulls headings towards.
pub const WORLD_UP: Point3 = [0.0, 1.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq)]
struct TurtleState {
    position: Point3,
    forward: Point3,
    up: Point3,
    parent: Option<usize>,
}

impl TurtleState {
    fn yaw(&mut self, degrees: f64) {
        self.forward = rotate_axis(self.forward, self.up, degrees.to_radians());
    }

    fn pitch(&mut self, degrees: f64) {
        let Some(side) = normalize(cross(self.up, self.forward)) else {
            return;
        };
        let angle = degrees.to_radians();
        self.forward = rotate_axis(self.forward, side, angle);
        self.up = rotate_axis(self.up, side, angle);
    }

    fn wander(&mut self, grammar: &Grammar, rng: &mut impl Rng) {
        let yaw = grammar.wander.sample(rng);
        let pitch = grammar.wander.sample(rng);
        self.yaw(yaw);
        self.pitch(pitch);
    }
}

/// Segments drawn by one turtle run with the radius noise each one received.
///
/// `radius_noise` and `taper` hold the run-level draws; they are `None` under
/// `auto_randomise`, where every segment draws its own pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TurtleOutput {
    pub segments: Vec<Segment>,
    pub noise: Vec<f64>,
    pub radius_noise: Option<f64>,
    pub taper: Option<f64>,
}

pub fn interpret(symbols: &[Symbol], grammar: &Grammar, rng: &mut impl Rng) -> TurtleOutput {
    let run_draw = (!grammar.auto_randomise)
        .then(|| (grammar.radius_noise.sample(rng), grammar.taper.sample(rng)));

    let mut segments: Vec<Segment> = Vec::new();
    let mut applied_noise = Vec::new();
    let mut stack: Vec<TurtleState> = Vec::new();
    let mut state = TurtleState {
        position: START_POSITION,
        forward: START_FORWARD,
        up: START_UP,
        parent: None,
    };
    state.wander(grammar, rng);

    for symbol in symbols {
        match symbol.name {
            'F' => {
                let jitter = grammar.length_jitter.sample(rng);
                let length = symbol.param(0).unwrap_or(1.0) * jitter;
                state.wander(grammar, rng);

                let (noise, taper) = match run_draw {
                    Some(draw) => draw,
                    None => (grammar.radius_noise.sample(rng), grammar.taper.sample(rng)),
                };

                let depth = state.parent.map_or(0, |p| segments[p].depth + 1);
                let scale = grammar.base_radius * noise * taper.powi(depth as i32);
                let radius = (length.abs() * scale).max(0.0);
                let end = add(state.position, mul_scalar(state.forward, length));

                segments.push(Segment {
                    start: state.position,
                    end,
                    radius,
                    depth,
                    parent: state.parent,
                });
                applied_noise.push(noise);
                state.parent = Some(segments.len() - 1);
                state.position = end;

                if grammar.tropism > 0.0
                    && let Some(bent) = normalize(lerp(state.forward, WORLD_UP, grammar.tropism))
                {
                    state.forward = bent;
                }
            }
            '+' | '-' => {
                let angle = symbol.param(0).unwrap_or(DEFAULT_ANGLE_DEGREES);
                let signed = if symbol.name == '+' { angle } else { -angle };
                state.yaw(signed + grammar.angle_jitter.sample(rng));
            }
            '&' | '^' => {
                let angle = symbol.param(0).unwrap_or(DEFAULT_ANGLE_DEGREES);
                let signed = if symbol.name == '&' { angle } else { -angle };
                state.pitch(signed + grammar.angle_jitter.sample(rng));
            }
            '[' => stack.push(state),
            ']' => {
                if let Some(saved) = stack.pop() {
                    state = saved;
                }
            }
            _ => {}
        }
    }

    TurtleOutput {
        segments,
        noise: applied_noise,
        radius_noise: run_draw.map(|(noise, _)| noise),
        taper: run_draw.map(|(_, taper)| taper),
    }
}

#[cfg(test)]
mod tests {
    use arbor_core::{Point3, validate_forest};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::interpret;
    use crate::preset::{Grammar, Span};
    use crate::symbol::parse_symbols;

    fn run(text: &str, grammar: &Grammar) -> super::TurtleOutput {
        let symbols = parse_symbols(text).expect("symbols should parse");
        interpret(&symbols, grammar, &mut StdRng::seed_from_u64(3))
    }

    fn assert_point_close(actual: Point3, expected: Point3) {
        for axis in 0..3 {
            assert!(
                (actual[axis] - expected[axis]).abs() < 1e-9,
                "expected {expected:?}, got {actual:?}"
            );
        }
    }

    #[test]
    fn straight_chain_walks_down_from_start() {
        let out = run("F F(2) F", &Grammar::default());
        let segments = &out.segments;
        assert_eq!(segments.len(), 3);
        assert_point_close(segments[0].start, [0.0, 1.0, 0.0]);
        assert_point_close(segments[0].end, [0.0, 0.0, 0.0]);
        assert_point_close(segments[1].end, [0.0, -2.0, 0.0]);
        assert_point_close(segments[2].end, [0.0, -3.0, 0.0]);
        assert_eq!(segments[2].parent, Some(1));
        assert_eq!(
            segments.iter().map(|s| s.depth).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!((segments[0].radius - 0.04).abs() < 1e-12);
        assert!((segments[1].radius - 2.0 * 0.04 * 0.65).abs() < 1e-12);
        assert!((segments[2].radius - 0.04 * 0.65 * 0.65).abs() < 1e-12);
    }

    #[test]
    fn yaw_turns_about_up_axis() {
        let out = run("+(90) F", &Grammar::default());
        assert_point_close(out.segments[0].end, [1.0, 1.0, 0.0]);
        let out = run("-(90) F", &Grammar::default());
        assert_point_close(out.segments[0].end, [-1.0, 1.0, 0.0]);
    }

    #[test]
    fn pitch_turns_about_side_axis() {
        let out = run("&(90) F", &Grammar::default());
        assert_point_close(out.segments[0].end, [0.0, 1.0, -1.0]);
        let out = run("^(90) F", &Grammar::default());
        assert_point_close(out.segments[0].end, [0.0, 1.0, 1.0]);
    }

    #[test]
    fn missing_angle_defaults_to_25_degrees() {
        let implicit = run("+ F & F", &Grammar::default());
        let explicit = run("+(25) F &(25) F", &Grammar::default());
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn brackets_restore_position_heading_and_parent() {
        let out = run("F [ +(45) F ] F ] ]", &Grammar::default());
        let segments = &out.segments;
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].parent, Some(0));
        assert_eq!(segments[2].parent, Some(0));
        assert_point_close(segments[2].start, segments[0].end);
        assert_point_close(segments[2].end, [0.0, -1.0, 0.0]);
        validate_forest(segments).expect("turtle output should be a forest");
    }

    #[test]
    fn inert_symbols_draw_nothing() {
        let out = run("A B(1, 2) X [ ]", &Grammar::default());
        assert!(out.segments.is_empty());
    }

    #[test]
    fn full_tropism_turns_heading_to_world_up() {
        let grammar = Grammar {
            tropism: 1.0,
            ..Grammar::default()
        };
        let out = run("F F", &grammar);
        assert_point_close(out.segments[1].start, [0.0, 0.0, 0.0]);
        assert_point_close(out.segments[1].end, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn degenerate_tropism_blend_keeps_heading() {
        let grammar = Grammar {
            tropism: 0.5,
            ..Grammar::default()
        };
        let out = run("F F", &grammar);
        assert_point_close(out.segments[1].end, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn negative_lengths_keep_radius_non_negative() {
        let out = run("F(-1) F(0)", &Grammar::default());
        assert!(out.segments.iter().all(|s| s.radius >= 0.0));
        validate_forest(&out.segments).expect("turtle output should be a forest");
    }

    #[test]
    fn radius_noise_is_per_run_unless_auto_randomised() {
        let base = Grammar {
            radius_noise: Span::new(0.5, 1.5),
            taper: Span::fixed(1.0),
            ..Grammar::default()
        };
        let fixed = run("F F F F", &base);
        assert!(
            fixed
                .segments
                .iter()
                .all(|s| (s.radius - fixed.segments[0].radius).abs() < 1e-15)
        );
        let run_noise = fixed.radius_noise.expect("fixed mode reports its draw");
        assert!((fixed.segments[0].radius - 0.04 * run_noise).abs() < 1e-15);
        assert!(fixed.noise.iter().all(|&n| n == run_noise));

        let auto = Grammar {
            auto_randomise: true,
            ..base
        };
        let varied = run("F F F F", &auto);
        assert_eq!(varied.radius_noise, None);
        assert_eq!(varied.taper, None);
        assert_eq!(varied.noise.len(), 4);
        let first = varied.segments[0].radius;
        assert!(varied.segments.iter().any(|s| (s.radius - first).abs() > 1e-9));
        for (segment, noise) in varied.segments.iter().zip(&varied.noise) {
            assert!((segment.radius - 0.04 * noise).abs() < 1e-15);
        }
    }

    #[test]
    fn jitter_and_wander_are_seed_deterministic() {
        let grammar = Grammar {
            angle_jitter: Span::new(-10.0, 10.0),
            length_jitter: Span::new(0.8, 1.2),
            wander: Span::new(-5.0, 5.0),
            ..Grammar::default()
        };
        let symbols = parse_symbols("F [ +F ] [ &F ] F").expect("symbols should parse");
        let a = interpret(&symbols, &grammar, &mut StdRng::seed_from_u64(77));
        let b = interpret(&symbols, &grammar, &mut StdRng::seed_from_u64(77));
        assert_eq!(a, b);
        validate_forest(&a.segments).expect("turtle output should be a forest");
    }
}
