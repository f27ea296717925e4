//! Cleaning, clipping and descriptive statistics of behavioral sensor recordings.
//!
//! A [`Dataset`] holds time-ordered samples of named numeric channels recorded
//! from several participants under labeled conditions. The processing stages
//! ([`cleaner::clean`], [`clipper::clip`] and [`analysis::compute_stats`]) never
//! modify their input and always return new values.

pub mod analysis;
pub mod cleaner;
pub mod clipper;
pub mod config;
pub mod error;
pub mod loader;
pub mod manager;
pub mod stats;
pub mod types;

pub use error::{Error, Result};
pub use types::{Dataset, Sample};
