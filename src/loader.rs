//! CSV ingestion and serialization of datasets.
//!
//! Recordings have a header row followed by data rows. The first column is
//! the timestamp and every other column is a channel; empty cells are absent
//! channels. The participant is taken from the file name, up to the first `_`
//! (`P01_boring.csv` belongs to `P01`).
//!
//! Files written by [`save_csv`] start with `timestamp,participant_id,condition`
//! and are loaded back with their participant and condition columns. Fields
//! that contain a comma or a double quote are quoted, with inner quotes doubled.

use crate::types::{Dataset, Sample};
use anyhow::{Context, Result, bail};
use glob::glob;
use serde_value::Value;
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

const TIMESTAMP_HEADER: &str = "timestamp";
const PARTICIPANT_HEADER: &str = "participant_id";
const CONDITION_HEADER: &str = "condition";

/// Load every file matching a glob pattern into one dataset.
///
/// Files are loaded in path order and every sample is labeled with `condition`
/// (unless the file carries its own condition column).
pub fn load_files(pattern: &str, condition: &str) -> Result<Dataset> {
    let files = match_files(pattern)?;
    log::info!("found {} files matching {pattern:?}", files.len());

    let mut dataset = Dataset::default();
    for file in &files {
        let file_dataset =
            load_file(file, condition).with_context(|| format!("failed to load {file:?}"))?;
        dataset.append(file_dataset);
    }

    dataset.set_meta("total_files", Value::U64(files.len() as u64));
    dataset.set_meta("total_points", Value::U64(dataset.len() as u64));

    Ok(dataset)
}

fn match_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob(pattern)
        .with_context(|| format!("invalid pattern {pattern:?}"))?
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    if files.is_empty() {
        bail!("no files found matching pattern {pattern:?}");
    }
    files.sort();
    Ok(files)
}

/// Load a single CSV file.
pub fn load_file<P: AsRef<Path>>(file: P, condition: &str) -> Result<Dataset> {
    let file = file.as_ref();
    let participant_id = participant_from_path(file);
    let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
    let reader = BufReader::new(file);

    let mut lines = reader
        .lines()
        .enumerate()
        .filter(|(_, line)| line.as_ref().map_or(true, |line| !line.trim().is_empty()));

    let header = match lines.next() {
        Some((_, line)) => line.context("failed to read header")?,
        None => bail!("file has no header"),
    };
    let header = split_row(&header).context("failed to parse header")?;
    if header.len() < 2 {
        bail!("file has insufficient columns");
    }

    // Leading columns that are not channels.
    let is_saved = header.len() >= 3
        && header[0] == TIMESTAMP_HEADER
        && header[1] == PARTICIPANT_HEADER
        && header[2] == CONDITION_HEADER;
    let n_lead = if is_saved { 3 } else { 1 };
    let columns = header[n_lead..].to_vec();

    let mut samples = Vec::new();
    for (line_idx, line) in lines {
        let line_num = line_idx + 1;
        let line = line.with_context(|| format!("failed to read line {line_num}"))?;
        let row = split_row(&line).with_context(|| format!("failed to parse line {line_num}"))?;
        if row.len() != header.len() {
            bail!(
                "line {line_num} has {} fields, but the header has {}",
                row.len(),
                header.len()
            );
        }

        let timestamp: f64 = row[0]
            .parse()
            .with_context(|| format!("invalid timestamp {:?} at line {line_num}", row[0]))?;

        let mut sample = if is_saved {
            Sample::new(timestamp, &row[1], &row[2])
        } else {
            Sample::new(timestamp, &participant_id, condition)
        };

        for (col, cell) in columns.iter().zip(&row[n_lead..]) {
            if cell.is_empty() {
                continue;
            }
            let val: f64 = cell.parse().with_context(|| {
                format!("invalid value {cell:?} in column {col:?} at line {line_num}")
            })?;
            sample.channels.insert(col.clone(), val);
        }

        samples.push(sample);
    }

    if samples.is_empty() {
        bail!("file has no data rows");
    }

    Ok(Dataset::new(samples, columns))
}

/// Split a CSV row into fields.
///
/// Unquoted fields are trimmed. Quoted fields keep their contents verbatim and
/// `""` inside them stands for one quote.
fn split_row(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|ch| *ch == ' ' || *ch == '\t').is_some() {}

        let mut field = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') if chars.next_if_eq(&'"').is_some() => field.push('"'),
                    Some('"') => break,
                    Some(ch) => field.push(ch),
                    None => bail!("unterminated quoted field"),
                }
            }
            while chars.next_if(|ch| *ch == ' ' || *ch == '\t').is_some() {}
            match chars.next() {
                Some(',') => fields.push(field),
                None => {
                    fields.push(field);
                    return Ok(fields);
                }
                Some(ch) => bail!("unexpected {ch:?} after quoted field"),
            }
        } else {
            loop {
                match chars.next() {
                    Some(',') => break,
                    Some('"') => bail!("unexpected quote in unquoted field"),
                    Some(ch) => field.push(ch),
                    None => {
                        fields.push(field.trim().to_string());
                        return Ok(fields);
                    }
                }
            }
            fields.push(field.trim().to_string());
        }
    }
}

/// Quote a field if it would otherwise be split or unescaped on reload.
fn quote_field(field: &str) -> Result<String> {
    if field.contains(['\n', '\r']) {
        bail!("field {field:?} contains a line break");
    }
    if field.contains([',', '"']) || field.trim() != field {
        Ok(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Ok(field.to_string())
    }
}

/// Participant identifier encoded in a file name.
pub fn participant_from_path(file: &Path) -> String {
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('_') {
        Some((participant_id, _)) => participant_id.to_string(),
        None => file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or(name),
    }
}

/// Save a dataset as CSV.
///
/// Absent channels are written as empty cells. Labels containing a line break
/// cannot be written.
pub fn save_csv<P: AsRef<Path>>(dataset: &Dataset, file: P) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);

    let mut header = vec![
        TIMESTAMP_HEADER.to_string(),
        PARTICIPANT_HEADER.to_string(),
        CONDITION_HEADER.to_string(),
    ];
    for col in &dataset.columns {
        header.push(quote_field(col)?);
    }
    writeln!(writer, "{}", header.join(",")).context("failed to write header")?;

    for sample in &dataset.samples {
        let mut row = vec![
            sample.timestamp.to_string(),
            quote_field(&sample.participant_id)?,
            quote_field(&sample.condition)?,
        ];
        row.extend(dataset.columns.iter().map(|col| {
            sample
                .value(col)
                .map(|val| val.to_string())
                .unwrap_or_default()
        }));
        writeln!(writer, "{}", row.join(",")).context("failed to write row")?;
    }

    writer.flush().context("failed to flush writer stream")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_raw_recording() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "P01_boring.csv",
            "time,gaze_x,gaze_y\n0.0,1.5,2.5\n0.5,,3.0\n\n1.0,NaN,4.0\n",
        );

        let dataset = load_file(&path, "boring").unwrap();
        assert_eq!(dataset.columns, vec!["gaze_x", "gaze_y"]);
        assert_eq!(dataset.len(), 3);

        let sample = &dataset.samples[1];
        assert_eq!(sample.timestamp, 0.5);
        assert_eq!(sample.participant_id, "P01");
        assert_eq!(sample.condition, "boring");
        assert_eq!(sample.value("gaze_x"), None);
        assert_eq!(sample.value("gaze_y"), Some(3.0));
        assert!(dataset.samples[2].value("gaze_x").unwrap().is_nan());
    }

    #[test]
    fn reject_malformed_files() {
        let dir = TempDir::new().unwrap();
        let header_only = write(&dir, "a_x.csv", "time,x\n");
        assert!(load_file(&header_only, "").is_err());

        let one_column = write(&dir, "b_x.csv", "time\n0.0\n");
        assert!(load_file(&one_column, "").is_err());

        let short_row = write(&dir, "c_x.csv", "time,x,y\n0.0,1.0\n");
        assert!(load_file(&short_row, "").is_err());

        let bad_value = write(&dir, "d_x.csv", "time,x\n0.0,abc\n");
        let err = load_file(&bad_value, "").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));

        let bad_time = write(&dir, "e_x.csv", "time,x\nnow,1.0\n");
        assert!(load_file(&bad_time, "").is_err());
    }

    #[test]
    fn participant_without_underscore_uses_stem() {
        assert_eq!(participant_from_path(Path::new("dir/P07.csv")), "P07");
        assert_eq!(participant_from_path(Path::new("P07_a_b.csv")), "P07");
    }

    #[test]
    fn load_pattern_merges_files() {
        let dir = TempDir::new().unwrap();
        write(&dir, "P02_run.csv", "time,x,z\n0.0,1.0,5.0\n");
        write(&dir, "P01_run.csv", "time,x,y\n0.0,2.0,3.0\n1.0,4.0,\n");
        write(&dir, "notes.txt", "ignored");

        let pattern = dir.path().join("*_run.csv");
        let dataset = load_files(pattern.to_str().unwrap(), "interested").unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.columns, vec!["x", "y", "z"]);
        assert_eq!(dataset.samples[0].participant_id, "P01");
        assert_eq!(dataset.samples[2].participant_id, "P02");
        assert!(dataset.samples.iter().all(|s| s.condition == "interested"));
        assert_eq!(dataset.metadata.get("total_files"), Some(&Value::U64(2)));
    }

    #[test]
    fn load_pattern_without_matches() {
        let dir = TempDir::new().unwrap();
        let pattern = dir.path().join("*.csv");
        assert!(load_files(pattern.to_str().unwrap(), "").is_err());
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let dataset = Dataset::new(
            vec![
                Sample::new(0.25, "P01", "boring").with("x", 1.0 / 3.0),
                Sample::new(0.5, "P02", "").with("y", -2.0),
            ],
            vec!["x".to_string(), "y".to_string()],
        );
        let path = dir.path().join("saved.csv");
        save_csv(&dataset, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("timestamp,participant_id,condition,x,y\n"));

        let reloaded = load_file(&path, "ignored").unwrap();
        assert_eq!(reloaded.samples, dataset.samples);
        assert_eq!(reloaded.columns, dataset.columns);
    }

    #[test]
    fn save_and_reload_quoted_labels() {
        let dir = TempDir::new().unwrap();
        let dataset = Dataset::new(
            vec![
                Sample::new(0.0, "P01", "low, fast").with("x", 1.0),
                Sample::new(1.0, "P\"02\"", " padded ").with("x", 2.0),
            ],
            vec!["x".to_string()],
        );
        let path = dir.path().join("saved.csv");
        save_csv(&dataset, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("0,P01,\"low, fast\",1\n"));
        assert!(contents.contains("\"P\"\"02\"\"\""));

        let reloaded = load_file(&path, "ignored").unwrap();
        assert_eq!(reloaded.samples, dataset.samples);
    }

    #[test]
    fn reject_label_with_line_break() {
        let dir = TempDir::new().unwrap();
        let dataset = Dataset::new(
            vec![Sample::new(0.0, "P01", "a\nb").with("x", 1.0)],
            vec!["x".to_string()],
        );
        assert!(save_csv(&dataset, dir.path().join("saved.csv")).is_err());
    }

    #[test]
    fn split_quoted_fields() {
        assert_eq!(split_row(" a , b ,").unwrap(), vec!["a", "b", ""]);
        assert_eq!(
            split_row("1,\"x, \"\"y\"\"\" ,2").unwrap(),
            vec!["1", "x, \"y\"", "2"]
        );
        assert!(split_row("1,\"open").is_err());
        assert!(split_row("1,\"a\"b").is_err());
        assert!(split_row("1,a\"b").is_err());
    }
}
