//! Equation parser, evaluator and implicit curve locator for a graphing
//! calculator.
//!
//! # Why?
//!
//! Graphing `x^2 + y^2 = 1` means finding where `f(x, y) = x^2 + y^2 - 1`
//! crosses zero, at pixel resolution, every time the view moves. We parse
//! forgiving, hand-typed text into an expression tree once, then run a tiled
//! Newton search that only refines the parts of the screen the curve actually
//! passes through (with optional data parallelism via the `rayon` feature).
//!
//! # Example
//!
//! ```rust
//! use implicit_grapher::*;
//!
//! let parsed = Equation::parse("x² + y² = a", AngleMode::Radians);
//! assert!(parsed.is_clean());
//! let circle = parsed.tree;
//!
//! let bindings = Bindings::new().with('a', 4.0);
//! assert_eq!(circle.implicit_value(2.0, 0.0, &bindings), 0.0);
//!
//! let mapper = CoordinateMapper::new(
//!     PixelRect::new(0, 0, 100, 100),
//!     (-3.0, 3.0),
//!     (-3.0, 3.0),
//!     true,
//! );
//! let raster = locate(&circle, &mapper, 4, &bindings);
//! assert!(raster.lit_pixels().count() > 0);
//! ```

mod coords;
mod evaluate;
mod expression;
mod grapher;
mod locate;
mod normalize;
mod parse;
mod token;

/// Uses the [`pest`] parsing expression grammar language to split equation
/// text into tokens.
///
/// ```text
#[doc = include_str!("grammar.pest")]
/// ```
pub mod grammar_doc {}

pub use coords::*;
pub use evaluate::*;
pub use expression::*;
pub use grapher::*;
pub use locate::{
    locate, locate_with_cancel, CurveRaster, LocateError, COARSE_ITERATIONS, FINE_ITERATIONS,
};
pub use parse::{ParseError, Parsed, MAX_NESTING, MAX_TOKENS};

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> f64 {
        let parsed = Expression::parse(text, AngleMode::Radians);
        assert!(parsed.is_clean(), "{text}: {:?}", parsed.diagnostics);
        parsed.tree.evaluate_without_vars()
    }

    #[test]
    fn real_expression() {
        let parsed = Expression::parse("2 * (x + y) * -a", AngleMode::Radians);
        let expression = parsed.tree;

        let bindings: Bindings = [('x', 7.0), ('y', 1.0), ('a', 4.0)].into_iter().collect();
        assert_eq!(expression.evaluate(&bindings), -64.0);
        assert_eq!(expression.variables().into_iter().collect::<String>(), "axy");
    }

    #[test]
    fn real_op_precedence() {
        assert_eq!(eval("10 - 4 - 3"), 3.0);
        assert_eq!(eval("2 + 3 * 4 ^ 2 / 8"), 8.0);
        assert_eq!(eval("-2^2"), -4.0);
    }

    #[test]
    fn forgiving_input() {
        assert_eq!(eval("[2(3)]"), 6.0);
        assert_eq!(eval("(1+2"), 3.0);
        assert_eq!(eval("6÷3×2−1"), 3.0);
        assert_eq!(eval("√(16)"), 4.0);

        let parsed = Expression::parse("sin2 + 1", AngleMode::Radians);
        assert_eq!(parsed.tree.evaluate_without_vars(), 1.0);
        assert_eq!(
            parsed.diagnostics,
            [ParseError::UnrecognizedToken("sin2".into())]
        );
    }

    #[test]
    fn degrees_mode() {
        let parsed = Expression::parse("sin(90) + acos(0)", AngleMode::Degrees);
        let value = parsed.tree.evaluate_without_vars();
        assert!((value - 91.0).abs() < 1e-9, "{value}");
    }

    #[test]
    fn explicit_and_implicit_agree() {
        let explicit = Equation::parse("x^2 - 1", AngleMode::Radians).tree;
        let implicit = Equation::parse("y = x^2 - 1", AngleMode::Radians).tree;
        let bindings = Bindings::new();
        for (x, y) in [(0.0, -1.0), (2.0, 3.0), (1.5, 0.0)] {
            assert_eq!(
                explicit.implicit_value(x, y, &bindings),
                implicit.implicit_value(x, y, &bindings),
            );
        }
    }

    #[test]
    fn real_bench() {
        let equation =
            Equation::parse("(z + (z^2 - 4*x*y)^0.5) / (2*x) = y", AngleMode::Radians).tree;

        const LEN: i32 = 1_000_000;
        let mut bindings = Bindings::new();
        let start = std::time::Instant::now();
        let mut total = 0.0;
        for i in 0..LEN {
            bindings.set('z', f64::from((LEN / 2) - i));
            total += equation.implicit_value(f64::from(i), f64::from(LEN - i), &bindings);
        }
        let elapsed = start.elapsed().as_nanos();
        println!(
            "Took {} ms, {} ns per element (checksum {total})",
            elapsed / 1_000_000,
            elapsed / LEN as u128
        );
    }
}
