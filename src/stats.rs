use crate::error::{Error, Result};
use crate::types::Sample;
use serde::{Deserialize, Serialize};

/// Outlier bound method used when cleaning.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum OutlierMethod {
    /// `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
    #[default]
    Iqr,
    /// `[mean - k sigma, mean + k sigma]`.
    ZScore,
}

impl OutlierMethod {
    /// Parse a method identifier.
    ///
    /// Matching is exact: only `"iqr"`, `"zscore"` and `"z-score"` are
    /// recognized. Anything else falls back to [`OutlierMethod::Iqr`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "zscore" | "z-score" => OutlierMethod::ZScore,
            "iqr" => OutlierMethod::Iqr,
            other => {
                log::warn!("unknown outlier method {other:?}, using iqr");
                OutlierMethod::Iqr
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutlierMethod::Iqr => "iqr",
            OutlierMethod::ZScore => "zscore",
        }
    }

    /// Compute the `(lower, upper)` outlier bounds of `vals`.
    ///
    /// `z_threshold` is only used by [`OutlierMethod::ZScore`].
    pub fn bounds(&self, vals: &[f64], z_threshold: f64) -> Result<(f64, f64)> {
        match self {
            OutlierMethod::Iqr => iqr_bounds(vals),
            OutlierMethod::ZScore => zscore_bounds(vals, z_threshold),
        }
    }
}

impl From<String> for OutlierMethod {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

/// Collect the present, non-NaN values of a column, in sample order.
pub fn column_values<'a, I>(samples: I, column: &str) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Sample>,
{
    samples
        .into_iter()
        .filter_map(|sample| sample.value(column))
        .filter(|val| !val.is_nan())
        .collect()
}

/// Return an ascending copy of `vals`.
pub fn sorted(vals: &[f64]) -> Vec<f64> {
    let mut sorted_vals = vals.to_vec();
    sorted_vals.sort_by(f64::total_cmp);
    sorted_vals
}

/// Compute a percentile with linear interpolation between closest ranks.
///
/// `sorted_vals` must be sorted in ascending order and `p` is in percent.
/// `p` is clamped to `0..=100`, so it never ranks past either end.
pub fn percentile(sorted_vals: &[f64], p: f64) -> Result<f64> {
    if sorted_vals.is_empty() {
        return Err(Error::UndefinedStatistic("percentile"));
    }
    let p = p.clamp(0.0, 100.0);
    let rank = (p / 100.0) * (sorted_vals.len() - 1) as f64;
    let lo = rank.floor();
    let hi = rank.ceil();
    if lo == hi {
        return Ok(sorted_vals[rank as usize]);
    }
    Ok(sorted_vals[lo as usize] * (hi - rank) + sorted_vals[hi as usize] * (rank - lo))
}

/// Compute the median of sorted values, averaging the middle pair for even lengths.
pub fn median(sorted_vals: &[f64]) -> Result<f64> {
    let n_vals = sorted_vals.len();
    if n_vals == 0 {
        return Err(Error::UndefinedStatistic("median"));
    }
    let mid = n_vals / 2;
    if n_vals % 2 == 0 {
        Ok((sorted_vals[mid - 1] + sorted_vals[mid]) / 2.0)
    } else {
        Ok(sorted_vals[mid])
    }
}

pub fn mean(vals: &[f64]) -> Result<f64> {
    if vals.is_empty() {
        return Err(Error::UndefinedStatistic("mean"));
    }
    Ok(vals.iter().sum::<f64>() / vals.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub fn pop_std_dev(vals: &[f64], mean: f64) -> Result<f64> {
    if vals.is_empty() {
        return Err(Error::UndefinedStatistic("standard deviation"));
    }
    let var = vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / vals.len() as f64;
    Ok(var.sqrt())
}

/// Compute the Tukey fences `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`.
pub fn iqr_bounds(vals: &[f64]) -> Result<(f64, f64)> {
    let sorted_vals = sorted(vals);
    let q1 = percentile(&sorted_vals, 25.0)?;
    let q3 = percentile(&sorted_vals, 75.0)?;
    let iqr = q3 - q1;
    Ok((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Compute `[mean - threshold * sigma, mean + threshold * sigma]`.
pub fn zscore_bounds(vals: &[f64], threshold: f64) -> Result<(f64, f64)> {
    let mean = mean(vals)?;
    let std_dev = pop_std_dev(vals, mean)?;
    Ok((mean - threshold * std_dev, mean + threshold * std_dev))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), Ok(2.5));
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 50.0), Ok(2.0));
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 0.0), Ok(1.0));
        assert_eq!(percentile(&[1.0, 2.0, 3.0], 100.0), Ok(3.0));
        assert_eq!(percentile(&[7.0], 25.0), Ok(7.0));
    }

    #[test]
    fn percentile_outside_range_is_clamped() {
        let sorted_vals = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted_vals, 150.0), Ok(4.0));
        assert_eq!(percentile(&sorted_vals, -10.0), Ok(1.0));
    }

    #[test]
    fn empty_input_is_undefined() {
        assert_eq!(
            percentile(&[], 50.0),
            Err(Error::UndefinedStatistic("percentile"))
        );
        assert!(matches!(mean(&[]), Err(Error::UndefinedStatistic(_))));
        assert!(matches!(
            pop_std_dev(&[], 0.0),
            Err(Error::UndefinedStatistic(_))
        ));
        assert!(median(&[]).is_err());
        assert!(iqr_bounds(&[]).is_err());
        assert!(zscore_bounds(&[], 3.0).is_err());
    }

    #[test]
    fn iqr_bounds_of_one_to_ten() {
        let vals: Vec<f64> = (1..=10).rev().map(f64::from).collect();
        let sorted_vals = sorted(&vals);
        assert_eq!(percentile(&sorted_vals, 25.0), Ok(3.25));
        assert_eq!(percentile(&sorted_vals, 75.0), Ok(7.75));
        let (lo, hi) = iqr_bounds(&vals).unwrap();
        assert!((lo + 3.5).abs() < 1e-12);
        assert!((hi - 14.5).abs() < 1e-12);
    }

    #[test]
    fn mean_and_population_std_dev() {
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mean = mean(&vals).unwrap();
        assert_eq!(mean, 5.0);
        assert_eq!(pop_std_dev(&vals, mean), Ok(2.0));
        assert_eq!(zscore_bounds(&vals, 1.5), Ok((2.0, 8.0)));
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Ok(2.5));
        assert_eq!(median(&[1.0, 2.0, 9.0]), Ok(2.0));
    }

    #[test]
    fn unknown_method_falls_back_to_iqr() {
        assert_eq!(OutlierMethod::from_name("zscore"), OutlierMethod::ZScore);
        assert_eq!(OutlierMethod::from_name("z-score"), OutlierMethod::ZScore);
        assert_eq!(OutlierMethod::from_name("iqr"), OutlierMethod::Iqr);
        assert_eq!(OutlierMethod::from_name("ZSCORE"), OutlierMethod::Iqr);
        assert_eq!(OutlierMethod::from_name(" Z-Score "), OutlierMethod::Iqr);
        assert_eq!(OutlierMethod::from_name("mad"), OutlierMethod::Iqr);
    }

    #[test]
    fn column_values_skip_absent_and_nan() {
        let samples = vec![
            Sample::new(0.0, "p1", "").with("x", 1.0),
            Sample::new(1.0, "p1", "").with("x", f64::NAN),
            Sample::new(2.0, "p1", ""),
            Sample::new(3.0, "p1", "").with("x", -4.0),
        ];
        assert_eq!(column_values(&samples, "x"), vec![1.0, -4.0]);
        assert!(column_values(&samples, "y").is_empty());
    }
}
