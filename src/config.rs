use crate::stats::OutlierMethod;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Cleaning parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanConfig {
    /// Columns checked by both filters.
    pub required_columns: Vec<String>,

    /// Drop samples with a value outside the outlier bounds.
    pub remove_outliers: bool,
    /// Method used to compute the outlier bounds.
    pub outlier_method: OutlierMethod,

    /// Maximum percentage (0-100) of missing required columns per sample.
    /// The missing data filter is disabled when zero.
    pub max_missing_percent: f64,

    /// Threshold of the z-score outlier method.
    pub z_threshold: f64,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            required_columns: Vec::new(),
            remove_outliers: false,
            outlier_method: OutlierMethod::Iqr,
            max_missing_percent: 0.0,
            z_threshold: 3.0,
        }
    }
}

impl CleanConfig {
    pub fn validate(&self) -> Result<()> {
        check_num(self.max_missing_percent, 0.0..=100.0)
            .context("invalid maximum missing percentage")?;
        check_num(self.z_threshold, f64::MIN_POSITIVE..)
            .context("invalid z-score threshold")?;
        Ok(())
    }
}

/// Clipping parameters.
///
/// An absent boundary defaults to the observed extreme timestamp.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClipConfig {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

/// Statistics parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    /// Columns to summarize (all known columns if empty).
    pub analyze_columns: Vec<String>,
    /// Partition samples by condition label.
    pub by_condition: bool,
    /// Partition samples by participant identifier.
    pub by_participant: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            analyze_columns: Vec::new(),
            by_condition: true,
            by_participant: false,
        }
    }
}

/// Full processing run.
///
/// Loaded from a TOML file. See [`PipelineConfig::from_file`] for loading.
/// Relative paths are interpreted relative to the directory of the file.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Glob pattern of the recordings to load.
    pub input: String,
    /// Condition label assigned to every loaded sample.
    #[serde(default)]
    pub condition: String,

    /// Processed dataset output file.
    pub output: String,
    /// Statistics report output file.
    pub report: Option<String>,

    pub clean: Option<CleanConfig>,
    pub clip: Option<ClipConfig>,
    pub stats: Option<StatsConfig>,
}

impl PipelineConfig {
    /// Load a [`PipelineConfig`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: PipelineConfig =
            toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            bail!("input pattern must not be empty");
        }
        if self.output.trim().is_empty() {
            bail!("output file must not be empty");
        }
        if let Some(clean) = &self.clean {
            clean.validate().context("invalid clean section")?;
        }
        Ok(())
    }
}

/// Trim column names and drop empty entries.
pub fn trim_columns<S: AsRef<str>>(cols: &[S]) -> Vec<String> {
    cols.iter()
        .map(|col| col.as_ref().trim())
        .filter(|col| !col.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_pipeline() {
        let contents = r#"
input = "raw/*.csv"
condition = "boring"
output = "out.csv"
report = "report.txt"

[clean]
required_columns = ["gaze_x", "gaze_y"]
remove_outliers = true
outlier_method = "zscore"
max_missing_percent = 50.0

[clip]
start_time = 1.5

[stats]
by_participant = true
"#;
        let config: PipelineConfig = toml::from_str(contents).unwrap();
        config.validate().unwrap();

        let clean = config.clean.unwrap();
        assert_eq!(clean.outlier_method, OutlierMethod::ZScore);
        assert_eq!(clean.z_threshold, 3.0);
        assert_eq!(
            config.clip.unwrap(),
            ClipConfig {
                start_time: Some(1.5),
                end_time: None
            }
        );
        let stats = config.stats.unwrap();
        assert!(stats.by_condition);
        assert!(stats.by_participant);
    }

    #[test]
    fn unknown_method_in_file_falls_back() {
        let clean: CleanConfig = toml::from_str("outlier_method = \"hampel\"").unwrap();
        assert_eq!(clean.outlier_method, OutlierMethod::Iqr);
    }

    #[test]
    fn reject_invalid_missing_percentage() {
        let clean = CleanConfig {
            max_missing_percent: 150.0,
            ..Default::default()
        };
        assert!(clean.validate().is_err());
    }

    #[test]
    fn reject_empty_input() {
        let config: PipelineConfig = toml::from_str("input = \" \"\noutput = \"o.csv\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn trim_column_list() {
        assert_eq!(trim_columns(&[" x", "y ", "", "  "]), vec!["x", "y"]);
    }
}
