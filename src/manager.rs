use crate::analysis::{StatsReport, compute_stats};
use crate::cleaner::{CleaningResult, clean};
use crate::clipper::{ClipInfo, clip_per_participant, format_duration};
use crate::config::{CleanConfig, ClipConfig, PipelineConfig, StatsConfig};
use crate::loader::{load_files, save_csv};
use crate::types::Dataset;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load recordings and save them as a single CSV file.
pub fn run_load<P: AsRef<Path>>(pattern: &str, condition: &str, output: P) -> Result<()> {
    let output = output.as_ref();
    let dataset = load_files(pattern, condition).context("failed to load files")?;
    log::info!(
        "loaded {} samples with {} columns",
        dataset.len(),
        dataset.columns.len()
    );

    save_csv(&dataset, output).context("failed to save dataset")?;
    log::info!("saved dataset to {output:?}");

    Ok(())
}

pub fn run_clean<P: AsRef<Path>>(input: &str, output: P, cfg: &CleanConfig) -> Result<()> {
    let output = output.as_ref();
    cfg.validate().context("invalid cleaning parameters")?;

    let dataset = load_files(input, "").context("failed to load input")?;
    let (cleaned, result) = clean(&dataset, cfg);
    log_cleaning(&result);

    save_csv(&cleaned, output).context("failed to save cleaned dataset")?;
    log::info!("saved cleaned dataset to {output:?}");

    Ok(())
}

pub fn run_clip<P: AsRef<Path>>(input: &str, output: P, cfg: &ClipConfig) -> Result<()> {
    let output = output.as_ref();

    let dataset = load_files(input, "").context("failed to load input")?;
    let (clipped, infos) =
        clip_per_participant(&dataset, cfg).context("failed to clip dataset")?;
    log_clipping(&infos, cfg);

    save_csv(&clipped, output).context("failed to save clipped dataset")?;
    log::info!("saved clipped dataset to {output:?}");

    Ok(())
}

/// Compute statistics over the union of several inputs.
pub fn run_stats(inputs: &[String], cfg: &StatsConfig, output: Option<&Path>) -> Result<()> {
    let mut dataset = Dataset::default();
    for input in inputs {
        let input = input.trim();
        let input_dataset =
            load_files(input, "").with_context(|| format!("failed to load {input:?}"))?;
        dataset.append(input_dataset);
    }

    let report = compute_stats(&dataset, cfg).context("failed to compute statistics")?;
    log_report(&report);

    if let Some(output) = output {
        report.save(output).context("failed to save report")?;
        log::info!("saved report to {output:?}");
    }

    Ok(())
}

/// Run the stages described by a pipeline file: load, clean, clip and summarize.
pub fn run_pipeline<P: AsRef<Path>>(config_file: P) -> Result<()> {
    let config_file = config_file.as_ref();
    let cfg = PipelineConfig::from_file(config_file).context("failed to construct cfg")?;
    log::info!("{cfg:#?}");

    let base_dir = config_file.parent().unwrap_or(Path::new(""));
    let input = resolve(base_dir, &cfg.input);
    let input = input.to_str().context("pattern is not valid UTF-8")?;

    let mut dataset = load_files(input, &cfg.condition).context("failed to load input")?;
    log::info!("loaded {} samples", dataset.len());

    if let Some(clean_cfg) = &cfg.clean {
        let (cleaned, result) = clean(&dataset, clean_cfg);
        log_cleaning(&result);
        dataset = cleaned;
    }

    if let Some(clip_cfg) = &cfg.clip {
        let (clipped, infos) =
            clip_per_participant(&dataset, clip_cfg).context("failed to clip dataset")?;
        log_clipping(&infos, clip_cfg);
        dataset = clipped;
    }

    let output = resolve(base_dir, &cfg.output);
    save_csv(&dataset, &output).context("failed to save dataset")?;
    log::info!("saved dataset to {output:?}");

    if let Some(stats_cfg) = &cfg.stats {
        let report = compute_stats(&dataset, stats_cfg).context("failed to compute statistics")?;
        log_report(&report);
        if let Some(report_file) = &cfg.report {
            let report_file = resolve(base_dir, report_file);
            report.save(&report_file).context("failed to save report")?;
            log::info!("saved report to {report_file:?}");
        }
    }

    Ok(())
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn log_cleaning(result: &CleaningResult) {
    let removal = match result.removal_percent() {
        Some(pct) => format!("{pct:.1}%"),
        None => "no data".to_string(),
    };
    log::info!(
        "original: {}, removed missing: {}, removed outliers: {}, final: {} (removed {removal})",
        result.original_points,
        result.removed_missing,
        result.removed_outliers,
        result.final_points
    );
}

fn log_clipping(infos: &[(String, ClipInfo)], cfg: &ClipConfig) {
    for (participant_id, info) in infos {
        log::info!("participant {participant_id}:");
        log_clip_info(info, cfg);
    }
}

fn log_clip_info(info: &ClipInfo, cfg: &ClipConfig) {
    log::info!(
        "original: {} samples ({:.3}s to {:.3}s, {})",
        info.original_points,
        info.min_timestamp,
        info.max_timestamp,
        format_duration(info.total_duration)
    );
    log::info!(
        "clipped: {} samples ({:.3}s to {:.3}s, {})",
        info.clipped_points,
        info.actual_start_time,
        info.actual_end_time,
        format_duration(info.clipped_duration())
    );
    if cfg.start_time.is_some() || cfg.end_time.is_some() {
        log::info!(
            "requested range: {:.3}s to {:.3}s",
            info.requested_start_time,
            info.requested_end_time
        );
    }
    if cfg.start_time.is_some() {
        log::info!("start frame difference: {:.3}s", info.start_offset());
    }
    if cfg.end_time.is_some() {
        log::info!("end frame difference: {:.3}s", info.end_offset());
    }
    log::info!("retained {:.1}% of original data", info.retention_percent());
}

fn log_report(report: &StatsReport) {
    if let Some(overall) = &report.overall {
        for stat in overall {
            log::info!("overall | {}", stat.summary());
        }
    }
    for (condition, stats) in &report.by_condition {
        for stat in stats {
            log::info!("condition {condition} | {}", stat.summary());
        }
    }
    for (participant, stats) in &report.by_participant {
        for stat in stats {
            log::info!("participant {participant} | {}", stat.summary());
        }
    }
}
