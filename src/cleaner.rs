//! Missing data and outlier filtering.

use crate::config::CleanConfig;
use crate::stats::{OutlierMethod, column_values};
use crate::types::{Dataset, Sample};
use serde::{Deserialize, Serialize};
use serde_value::Value;
use std::collections::HashMap;

/// Summary of a cleaning pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningResult {
    pub original_points: usize,
    pub removed_missing: usize,
    pub removed_outliers: usize,
    pub final_points: usize,
}

impl CleaningResult {
    /// Percentage of samples removed, or `None` if there were no samples.
    pub fn removal_percent(&self) -> Option<f64> {
        if self.original_points == 0 {
            return None;
        }
        let removed = self.original_points - self.final_points;
        Some(100.0 * removed as f64 / self.original_points as f64)
    }
}

/// Clean a dataset.
///
/// The missing data filter runs first (if `max_missing_percent > 0`), then the
/// outlier filter runs on its output (if enabled). Sample order is preserved
/// and the input is left untouched.
pub fn clean(dataset: &Dataset, cfg: &CleanConfig) -> (Dataset, CleaningResult) {
    let mut result = CleaningResult {
        original_points: dataset.len(),
        ..Default::default()
    };

    let mut samples = dataset.samples.clone();

    if cfg.max_missing_percent > 0.0 {
        let n_before = samples.len();
        samples = filter_missing(samples, &cfg.required_columns, cfg.max_missing_percent);
        result.removed_missing = n_before - samples.len();
        log::info!("removed {} samples due to missing data", result.removed_missing);
    }

    if cfg.remove_outliers {
        let n_before = samples.len();
        samples = filter_outliers(
            samples,
            &cfg.required_columns,
            cfg.outlier_method,
            cfg.z_threshold,
        );
        result.removed_outliers = n_before - samples.len();
        log::info!("removed {} samples as outliers", result.removed_outliers);
    }

    result.final_points = samples.len();

    let mut cleaned = Dataset::new(samples, dataset.columns.clone());
    cleaned.set_meta("original_points", Value::U64(result.original_points as u64));
    cleaned.set_meta("cleaned_points", Value::U64(result.final_points as u64));
    cleaned.set_meta(
        "points_removed",
        Value::U64((result.original_points - result.final_points) as u64),
    );
    cleaned.set_meta(
        "removal_percentage",
        Value::Option(result.removal_percent().map(|pct| Box::new(Value::F64(pct)))),
    );
    cleaned.set_meta("outlier_method", Value::String(cfg.outlier_method.name().to_string()));

    (cleaned, result)
}

/// Keep samples with at most `floor(n_cols * max_missing_percent / 100)` missing required columns.
pub fn filter_missing(
    samples: Vec<Sample>,
    required_cols: &[String],
    max_missing_percent: f64,
) -> Vec<Sample> {
    let max_missing = (required_cols.len() as f64 * max_missing_percent / 100.0).floor() as usize;

    samples
        .into_iter()
        .filter(|sample| {
            let n_missing = required_cols
                .iter()
                .filter(|col| sample.is_missing(col))
                .count();
            n_missing <= max_missing
        })
        .collect()
}

/// Drop samples with a present value outside the bounds of any required column.
///
/// Bounds are computed per column from the given samples. Columns without
/// any present value exclude nothing.
pub fn filter_outliers(
    samples: Vec<Sample>,
    cols: &[String],
    method: OutlierMethod,
    z_threshold: f64,
) -> Vec<Sample> {
    if cols.is_empty() {
        return samples;
    }

    let mut bounds_map = HashMap::with_capacity(cols.len());
    for col in cols {
        let vals = column_values(&samples, col);
        // Empty columns yield no bounds.
        if let Ok(bounds) = method.bounds(&vals, z_threshold) {
            log::debug!("{col} bounds: [{}, {}]", bounds.0, bounds.1);
            bounds_map.insert(col.as_str(), bounds);
        }
    }

    samples
        .into_iter()
        .filter(|sample| {
            !bounds_map.iter().any(|(col, &(lo, hi))| {
                sample.value(col).is_some_and(|val| val < lo || val > hi)
            })
        })
        .collect()
}
