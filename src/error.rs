//! Error types of the processing stages.

use std::fmt;
use thiserror::Error;

/// Requested clip boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Start => write!(f, "start"),
            Boundary::End => write!(f, "end"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("dataset is empty")]
    EmptyInput,

    #[error("{boundary} time {value:.3} is out of bounds ({min:.3} - {max:.3})")]
    OutOfBounds {
        boundary: Boundary,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("end time {end:.3} must be greater than start time {start:.3}")]
    InvalidRange { start: f64, end: f64 },

    #[error("no samples found in the time range {start:.3} - {end:.3}")]
    NoDataInRange { start: f64, end: f64 },

    #[error("{0} of an empty sequence is undefined")]
    UndefinedStatistic(&'static str),

    #[error("failed to clip samples of participant {participant_id:?}")]
    Participant {
        participant_id: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
