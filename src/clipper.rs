//! Time range extraction with nearest-sample boundaries.

use crate::config::ClipConfig;
use crate::error::{Boundary, Error, Result};
use crate::types::{Dataset, Sample};
use serde::{Deserialize, Serialize};
use serde_value::Value;

/// Summary of a clipping pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipInfo {
    pub min_timestamp: f64,
    pub max_timestamp: f64,
    pub total_duration: f64,

    pub original_points: usize,
    pub clipped_points: usize,

    /// Index of the first retained sample.
    pub start_frame: usize,
    /// Index of the last retained sample.
    pub end_frame: usize,

    /// Effective requested range.
    pub requested_start_time: f64,
    pub requested_end_time: f64,

    /// Timestamps of the first and last retained samples.
    pub actual_start_time: f64,
    pub actual_end_time: f64,
}

impl ClipInfo {
    pub fn clipped_duration(&self) -> f64 {
        self.actual_end_time - self.actual_start_time
    }

    pub fn retention_percent(&self) -> f64 {
        100.0 * self.clipped_points as f64 / self.original_points as f64
    }

    /// Distance between the requested and the actual start time.
    pub fn start_offset(&self) -> f64 {
        (self.actual_start_time - self.requested_start_time).abs()
    }

    /// Distance between the requested and the actual end time.
    pub fn end_offset(&self) -> f64 {
        (self.actual_end_time - self.requested_end_time).abs()
    }
}

/// Extract the samples between the requested start and end times.
///
/// The first retained sample is the first one at or after the start time and
/// the last retained sample is the last one at or before the end time.
/// Samples must be in non-decreasing timestamp order.
///
/// # Errors
/// Returns an error if the dataset is empty, a requested boundary lies
/// outside the observed range, the range is empty or no sample falls in it.
pub fn clip(dataset: &Dataset, cfg: &ClipConfig) -> Result<(Dataset, ClipInfo)> {
    if dataset.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut info = ClipInfo {
        original_points: dataset.len(),
        min_timestamp: f64::INFINITY,
        max_timestamp: f64::NEG_INFINITY,
        ..Default::default()
    };
    for sample in &dataset.samples {
        info.min_timestamp = info.min_timestamp.min(sample.timestamp);
        info.max_timestamp = info.max_timestamp.max(sample.timestamp);
    }
    info.total_duration = info.max_timestamp - info.min_timestamp;

    let start_time = resolve_boundary(cfg.start_time, Boundary::Start, &info)?;
    let end_time = resolve_boundary(cfg.end_time, Boundary::End, &info)?;
    if end_time <= start_time {
        return Err(Error::InvalidRange {
            start: start_time,
            end: end_time,
        });
    }
    info.requested_start_time = start_time;
    info.requested_end_time = end_time;

    let mut start_frame = None;
    let mut end_frame = None;
    for (idx, sample) in dataset.samples.iter().enumerate() {
        if start_frame.is_none() && sample.timestamp >= start_time {
            start_frame = Some(idx);
        }
        if sample.timestamp <= end_time {
            end_frame = Some(idx);
        }
    }

    let (start_frame, end_frame) = match (start_frame, end_frame) {
        (Some(start_frame), Some(end_frame)) if start_frame <= end_frame => {
            (start_frame, end_frame)
        }
        _ => {
            return Err(Error::NoDataInRange {
                start: start_time,
                end: end_time,
            });
        }
    };

    let samples = dataset.samples[start_frame..=end_frame].to_vec();

    info.clipped_points = samples.len();
    info.start_frame = start_frame;
    info.end_frame = end_frame;
    info.actual_start_time = samples[0].timestamp;
    info.actual_end_time = samples[samples.len() - 1].timestamp;

    let mut clipped = Dataset::new(samples, dataset.columns.clone());
    clipped.set_meta("original_points", Value::U64(info.original_points as u64));
    clipped.set_meta("clipped_points", Value::U64(info.clipped_points as u64));
    clipped.set_meta("original_duration", Value::F64(info.total_duration));
    clipped.set_meta("clipped_duration", Value::F64(info.clipped_duration()));
    clipped.set_meta("start_time", Value::F64(info.actual_start_time));
    clipped.set_meta("end_time", Value::F64(info.actual_end_time));
    clipped.set_meta("requested_start", Value::F64(start_time));
    clipped.set_meta("requested_end", Value::F64(end_time));

    Ok((clipped, info))
}

/// Clip the samples of every participant separately and concatenate them.
///
/// Datasets merged from several recordings restart their timestamps at each
/// participant, so [`clip`] cannot be applied to them directly. Participants
/// keep their first-seen order and the columns of `dataset` are kept.
///
/// # Errors
/// Returns [`Error::EmptyInput`] for an empty dataset and
/// [`Error::Participant`] if clipping any participant fails.
pub fn clip_per_participant(
    dataset: &Dataset,
    cfg: &ClipConfig,
) -> Result<(Dataset, Vec<(String, ClipInfo)>)> {
    if dataset.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut groups: Vec<(&str, Vec<Sample>)> = Vec::new();
    for sample in &dataset.samples {
        let participant_id = sample.participant_id.as_str();
        match groups.iter_mut().find(|(id, _)| *id == participant_id) {
            Some((_, samples)) => samples.push(sample.clone()),
            None => groups.push((participant_id, vec![sample.clone()])),
        }
    }

    let mut samples = Vec::with_capacity(dataset.len());
    let mut infos = Vec::with_capacity(groups.len());
    for (participant_id, group) in groups {
        let group = Dataset::new(group, dataset.columns.clone());
        let (clipped, info) = clip(&group, cfg).map_err(|err| Error::Participant {
            participant_id: participant_id.to_string(),
            source: Box::new(err),
        })?;
        samples.extend(clipped.samples);
        infos.push((participant_id.to_string(), info));
    }

    let mut clipped = Dataset::new(samples, dataset.columns.clone());
    clipped.set_meta("original_points", Value::U64(dataset.len() as u64));
    clipped.set_meta("clipped_points", Value::U64(clipped.len() as u64));
    clipped.set_meta("clipped_participants", Value::U64(infos.len() as u64));

    Ok((clipped, infos))
}

fn resolve_boundary(requested: Option<f64>, boundary: Boundary, info: &ClipInfo) -> Result<f64> {
    let Some(value) = requested else {
        return Ok(match boundary {
            Boundary::Start => info.min_timestamp,
            Boundary::End => info.max_timestamp,
        });
    };
    if value < info.min_timestamp || value > info.max_timestamp {
        return Err(Error::OutOfBounds {
            boundary,
            value,
            min: info.min_timestamp,
            max: info.max_timestamp,
        });
    }
    Ok(value)
}

/// Format a duration in seconds as hours, minutes and seconds.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        format!("{minutes}m {:.1}s", seconds - 60.0 * minutes)
    } else {
        let hours = (seconds / 3600.0).floor();
        let rest = seconds - 3600.0 * hours;
        let minutes = (rest / 60.0).floor();
        format!("{hours}h {minutes}m {:.1}s", rest - 60.0 * minutes)
    }
}
