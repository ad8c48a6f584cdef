/// Map a ratio whose ideal value is `1.0` onto a `0..=100` score.
///
/// The curve is a symmetric tent: 100 at `ratio == 1`, falling linearly to 0
/// at `ratio == 0` and `ratio == 2`, and clamped outside that band. A NaN
/// ratio (e.g. `0 / 0` from a degenerate box) scores 0.
#[inline]
pub fn ratio_to_score(ratio: f64) -> f64 {
    let score = 100.0 * (1.0 - (1.0 - ratio).abs());
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn peaks_at_one_and_vanishes_at_zero_and_two() {
        assert_relative_eq!(ratio_to_score(1.0), 100.0);
        assert_relative_eq!(ratio_to_score(0.0), 0.0);
        assert_relative_eq!(ratio_to_score(2.0), 0.0);
        assert_relative_eq!(ratio_to_score(0.75), 75.0);
    }

    #[test]
    fn symmetric_around_one() {
        for d in [0.05, 0.2, 0.5, 0.9, 1.5, 3.0] {
            assert_relative_eq!(ratio_to_score(1.0 + d), ratio_to_score(1.0 - d));
        }
    }

    #[test]
    fn clamped_for_any_input() {
        for r in [-10.0, -1.0, 2.5, 1e9, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let s = ratio_to_score(r);
            assert!((0.0..=100.0).contains(&s), "ratio {r} gave {s}");
        }
        assert_eq!(ratio_to_score(f64::NAN), 0.0);
    }
}
