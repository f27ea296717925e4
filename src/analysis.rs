use crate::config::{StatsConfig, trim_columns};
use crate::error::{Error, Result};
use crate::stats::{median, sorted};
use crate::types::{Dataset, Sample};
use anyhow::Context;
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Partition key of samples with an empty label.
pub const UNKNOWN_KEY: &str = "unknown";

/// Fixed z-score threshold of the diagnostic outlier count.
pub const OUTLIER_Z_THRESHOLD: f64 = 3.0;

/// Outlier check used for [`ColumnStatistic::outlier_count`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierCheck {
    pub method: String,
    pub threshold: f64,
}

/// Descriptive statistics of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistic {
    pub column: String,

    /// Number of present values, NaN entries included.
    pub count: usize,
    /// Number of present NaN values.
    pub missing_count: usize,

    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,

    pub outlier_count: usize,
    /// Absent when the standard deviation is zero and no check was run.
    pub outlier_check: Option<OutlierCheck>,
}

/// Statistics of a dataset, overall or partitioned.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Present only when no partitioning was requested.
    pub overall: Option<Vec<ColumnStatistic>>,
    pub by_condition: BTreeMap<String, Vec<ColumnStatistic>>,
    pub by_participant: BTreeMap<String, Vec<ColumnStatistic>>,
}

/// Compute the statistics of a dataset.
///
/// Condition and participant partitions are computed independently over the
/// whole dataset. Columns are reported in the order of `analyze_columns`,
/// which defaults to all known columns.
///
/// # Errors
/// Returns an error if the dataset is empty.
pub fn compute_stats(dataset: &Dataset, cfg: &StatsConfig) -> Result<StatsReport> {
    if dataset.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut cols = trim_columns(&cfg.analyze_columns);
    if cols.is_empty() {
        cols = dataset.columns.clone();
    }

    let mut report = StatsReport::default();

    if cfg.by_condition {
        report.by_condition = partition(&dataset.samples, |sample| &sample.condition)
            .into_iter()
            .map(|(key, samples)| (key, compute_column_stats(&samples, &cols)))
            .collect();
    }

    if cfg.by_participant {
        report.by_participant = partition(&dataset.samples, |sample| &sample.participant_id)
            .into_iter()
            .map(|(key, samples)| (key, compute_column_stats(&samples, &cols)))
            .collect();
    }

    if !cfg.by_condition && !cfg.by_participant {
        let samples: Vec<&Sample> = dataset.samples.iter().collect();
        report.overall = Some(compute_column_stats(&samples, &cols));
    }

    Ok(report)
}

fn partition<'a, F>(samples: &'a [Sample], label: F) -> BTreeMap<String, Vec<&'a Sample>>
where
    F: Fn(&'a Sample) -> &'a String,
{
    let mut map: BTreeMap<String, Vec<&Sample>> = BTreeMap::new();
    for sample in samples {
        let key = label(sample).as_str();
        let key = if key.is_empty() { UNKNOWN_KEY } else { key };
        map.entry(key.to_string()).or_default().push(sample);
    }
    map
}

/// Compute the statistics of each column over the given samples.
///
/// Columns without any present non-NaN value are skipped.
pub fn compute_column_stats(samples: &[&Sample], cols: &[String]) -> Vec<ColumnStatistic> {
    cols.iter()
        .filter_map(|col| {
            let vals: Vec<f64> = samples.iter().filter_map(|s| s.value(col)).collect();
            column_statistic(col, &vals)
        })
        .collect()
}

fn column_statistic(col: &str, vals: &[f64]) -> Option<ColumnStatistic> {
    let count = vals.len();
    let mut missing_count = 0;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &val in vals {
        if val.is_nan() {
            missing_count += 1;
            continue;
        }
        sum += val;
        sum_sq += val * val;
        min = min.min(val);
        max = max.max(val);
    }

    let n_valid = count - missing_count;
    if n_valid == 0 {
        return None;
    }

    // Mean and variance divide by the non-missing count only.
    let mean = sum / n_valid as f64;
    let var = sum_sq / n_valid as f64 - mean * mean;
    let std_dev = var.max(0.0).sqrt();

    let valid: Vec<f64> = vals.iter().copied().filter(|val| !val.is_nan()).collect();
    let median = median(&sorted(&valid)).ok()?;

    let mut outlier_count = 0;
    let mut outlier_check = None;
    if std_dev > 0.0 {
        outlier_count = valid
            .iter()
            .filter(|&&val| ((val - mean) / std_dev).abs() > OUTLIER_Z_THRESHOLD)
            .count();
        outlier_check = Some(OutlierCheck {
            method: "z-score".to_string(),
            threshold: OUTLIER_Z_THRESHOLD,
        });
    }

    Some(ColumnStatistic {
        column: col.to_string(),
        count,
        missing_count,
        mean,
        median,
        std_dev,
        min,
        max,
        outlier_count,
        outlier_check,
    })
}

impl ColumnStatistic {
    /// One-line summary.
    pub fn summary(&self) -> String {
        format!(
            "{} | count: {} | min: {:.3} | max: {:.3} | mean: {:.3} | median: {:.3} | std dev: {:.3}",
            self.column, self.count, self.min, self.max, self.mean, self.median, self.std_dev
        )
    }

    fn write_block(&self, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
        writeln!(f, "{indent}Column: {}", self.column)?;
        let indent = format!("{indent}  ");
        writeln!(f, "{indent}Mean: {:.4}", self.mean)?;
        writeln!(f, "{indent}Median: {:.4}", self.median)?;
        writeln!(f, "{indent}StdDev: {:.4}", self.std_dev)?;
        writeln!(f, "{indent}Min: {:.4}", self.min)?;
        writeln!(f, "{indent}Max: {:.4}", self.max)?;
        writeln!(f, "{indent}Count: {}", self.count)?;
        writeln!(f, "{indent}MissingCount: {}", self.missing_count)?;
        writeln!(f, "{indent}OutlierCount: {}", self.outlier_count)?;
        match &self.outlier_check {
            Some(check) => {
                writeln!(f, "{indent}OutlierMethod: {}", check.method)?;
                writeln!(f, "{indent}ZScoreThreshold: {:.2}", check.threshold)
            }
            None => writeln!(f, "{indent}OutlierMethod: none"),
        }
    }
}

fn write_partitions(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    partitions: &BTreeMap<String, Vec<ColumnStatistic>>,
) -> fmt::Result {
    if partitions.is_empty() {
        return Ok(());
    }
    writeln!(f, "Statistics by {label}:")?;
    // BTreeMap iteration keeps the keys sorted.
    for (key, stats) in partitions {
        writeln!(f, "{label}: {key}")?;
        for stat in stats {
            stat.write_block(f, "  ")?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(overall) = self.overall.as_ref().filter(|stats| !stats.is_empty()) {
            writeln!(f, "Overall Statistics:")?;
            for stat in overall {
                stat.write_block(f, "")?;
            }
            writeln!(f)?;
        }
        write_partitions(f, "Condition", &self.by_condition)?;
        write_partitions(f, "Participant", &self.by_participant)
    }
}

impl StatsReport {
    /// Save the report to a file.
    ///
    /// Files with a `.msgpack` extension are MessagePack-encoded,
    /// any other file receives the text rendering.
    pub fn save<P: AsRef<Path>>(&self, file: P) -> anyhow::Result<()> {
        let file = file.as_ref();
        let is_msgpack = file.extension().is_some_and(|ext| ext == "msgpack");
        let file_handle =
            File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file_handle);

        if is_msgpack {
            encode::write(&mut writer, self).context("failed to serialize report")?;
        } else {
            write!(writer, "{self}").context("failed to write report")?;
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }
}
