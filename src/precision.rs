//! Fixed-decimal division.
//!
//! Binary floating point drifts once ratios need more than ~9 significant
//! decimal places, which is enough to push a set of fractions that should
//! partition unity off 1.0. Every ratio that feeds a probability table is
//! therefore rounded to a fixed number of decimal digits *after* the division.

/// Largest precision for which `10^precision` units still fit exactly in an f64 mantissa.
pub const MAX_PRECISION: u32 = 15;

/// Round half-to-even at `precision` decimal digits.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    (value * scale).round_ties_even() / scale
}

/// `numerator / denominator`, rounded to `precision` decimal digits.
///
/// A zero denominator is the caller's problem: the result is then inf or NaN.
pub fn divide(numerator: f64, denominator: f64, precision: u32) -> f64 {
    round_to(numerator / denominator, precision)
}

/// Element-wise [`divide`] of a sequence by one denominator.
pub fn divide_all(numerators: &[f64], denominator: f64, precision: u32) -> Vec<f64> {
    numerators
        .iter()
        .map(|n| divide(*n, denominator, precision))
        .collect()
}

/// Fractions of `sum(weights)` whose decimal units at `precision` add up to
/// exactly `10^precision`.
///
/// Each fraction is first rounded as in [`divide_all`]; any residual units
/// left by rounding are handed out one at a time to the entries with the
/// largest discarded remainder (ties go to the earlier entry). Returns `None`
/// when the weights are empty, contain a negative or non-finite value, or sum
/// to zero.
pub fn fractions_of_total(weights: &[f64], precision: u32) -> Option<Vec<f64>> {
    if weights.is_empty() || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return None;
    }

    let precision = precision.min(MAX_PRECISION);
    let scale = 10f64.powi(precision as i32);
    let target = 10i64.pow(precision);

    let mut units: Vec<i64> = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(usize, f64)> = Vec::with_capacity(weights.len());
    for (i, w) in weights.iter().enumerate() {
        let exact = w / total * scale;
        let floor = exact.floor();
        units.push(floor as i64);
        remainders.push((i, exact - floor));
    }

    let mut residual = target - units.iter().sum::<i64>();
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut cursor = 0usize;
    while residual > 0 && !remainders.is_empty() {
        let (idx, _) = remainders[cursor % remainders.len()];
        // zero weights never receive probability mass
        if weights[idx] > 0.0 {
            units[idx] += 1;
            residual -= 1;
        }
        cursor += 1;
    }
    while residual < 0 {
        let (idx, _) = remainders[remainders.len() - 1 - (cursor % remainders.len())];
        if units[idx] > 0 {
            units[idx] -= 1;
            residual += 1;
        }
        cursor += 1;
    }

    Some(units.into_iter().map(|u| u as f64 / scale).collect())
}

/// Sum of fractions measured in decimal units at `precision`.
pub fn unit_sum(fractions: &[f64], precision: u32) -> i64 {
    let scale = 10f64.powi(precision.min(MAX_PRECISION) as i32);
    fractions.iter().map(|f| (f * scale).round() as i64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_after_dividing() {
        assert_eq!(divide(1.0, 3.0, 5), 0.33333);
        assert_eq!(divide(2.0, 3.0, 5), 0.66667);
        assert_eq!(divide(10.0, 4.0, 0), 2.0);
    }

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
    }

    #[test]
    fn divide_all_is_element_wise() {
        let out = divide_all(&[1.0, 1.0, 2.0], 4.0, 9);
        assert_eq!(out, vec![0.25, 0.25, 0.5]);
    }

    #[test]
    fn thirds_partition_unity_exactly() {
        let fractions = fractions_of_total(&[1.0, 1.0, 1.0], 9).unwrap();
        assert_eq!(unit_sum(&fractions, 9), 1_000_000_000);
        assert!((fractions.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(fractions[0], 0.333333334);
    }

    #[test]
    fn awkward_weights_partition_unity() {
        let weights = [0.1, 0.2, 0.3, 7.0, 11.0, 13.0, 0.7];
        for precision in [5, 9, 12] {
            let fractions = fractions_of_total(&weights, precision).unwrap();
            assert_eq!(unit_sum(&fractions, precision), 10i64.pow(precision));
        }
    }

    #[test]
    fn zero_weights_stay_zero() {
        let fractions = fractions_of_total(&[0.0, 1.0, 1.0, 1.0], 9).unwrap();
        assert_eq!(fractions[0], 0.0);
    }

    #[test]
    fn degenerate_inputs_have_no_fractions() {
        assert!(fractions_of_total(&[], 9).is_none());
        assert!(fractions_of_total(&[0.0, 0.0], 9).is_none());
        assert!(fractions_of_total(&[1.0, -1.0], 9).is_none());
        assert!(fractions_of_total(&[f64::NAN], 9).is_none());
    }
}
