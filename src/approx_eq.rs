//! Quantized floating-point comparison for geometry values.
//!
//! Backends that rasterize to a pixel grid snap coordinates to a fixed-point
//! representation before drawing. We mirror that quantization here (the
//! smallest representable step is 1/256) so that unit tests and bounds
//! checks comparing computed geometry don't trip over float noise that
//! would be invisible once rendered.

use float_cmp::ApproxEq;

const FIXED_FRAC_BITS: u64 = 8;

const FIXED_MAX: i32 = i32::MAX;
const FIXED_MIN: i32 = i32::MIN;

/// The double that corresponds to one unit in the fixed-point representation.
const FIXED_ONE_DOUBLE: f64 = (1 << FIXED_FRAC_BITS) as f64;

/// The largest representable fixed-point number, as a double.
pub const FIXED_MAX_DOUBLE: f64 = (FIXED_MAX as f64) / FIXED_ONE_DOUBLE;

/// The most negative representable fixed-point number, as a double.
pub const FIXED_MIN_DOUBLE: f64 = (FIXED_MIN as f64) / FIXED_ONE_DOUBLE;

/// Checks whether two floating-point numbers are approximately equal once
/// snapped to the renderer's fixed-point grid.
///
/// Two numbers are "close enough to equal" if their absolute difference is
/// smaller than the smallest fixed-point fraction the backend can represent.
///
/// This is reliable even for numbers outside of the range the fixed-point
/// format can represent: in that case we fall back to a 1 unit-in-the-last-
/// place (ULP) tolerance for very large `f64` values.
pub trait FixedEq: ApproxEq {
    fn fixed_eq(self, other: Self) -> bool;
}

impl FixedEq for f64 {
    fn fixed_eq(self, other: f64) -> bool {
        let smallest_fraction = 1.0 / f64::from(1 << FIXED_FRAC_BITS);
        self.approx_eq(other, (smallest_fraction, 1))
    }
}

/// Macro for usage in unit tests.
#[doc(hidden)]
#[macro_export]
macro_rules! assert_fixed_eq {
    ($left:expr, $right:expr) => {{
        match ($left, $right) {
            (l, r) => {
                if !l.fixed_eq(r) {
                    panic!(
                        r#"assertion failed: `(left == right)`
  left: `{:?}`,
 right: `{:?}`"#,
                        l, r
                    )
                }
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_approx_equal() {
        assert!(!0.0_f64.fixed_eq(0.00390635_f64));
        assert!(!1.0_f64.fixed_eq(1.00390635_f64));
        assert!(!0.0_f64.fixed_eq(-0.00390635_f64));
        assert!(!1.0_f64.fixed_eq(0.99609365_f64));

        assert!(0.0_f64.fixed_eq(0.001953125_f64));
        assert!(1.0_f64.fixed_eq(1.001953125_f64));
        assert!(0.0_f64.fixed_eq(-0.001953125_f64));
        assert!(1.0_f64.fixed_eq(0.998046875_f64));

        assert!(9_007_199_254_740_992.0.fixed_eq(9_007_199_254_740_994.0));
        assert!(!9_007_199_254_740_992.0.fixed_eq(9_007_199_254_740_996.0));
    }

    #[test]
    fn assert_fixed_eq_should_not_panic() {
        assert_fixed_eq!(42_f64, 42_f64);
    }

    #[test]
    #[should_panic]
    fn assert_fixed_eq_should_panic() {
        assert_fixed_eq!(3_f64, 42_f64);
    }
}
