//! Data Validation
//!
//! Turns raw sensor samples into values that are safe to persist.
//! Physical range checks are deliberately absent: out-of-range values are
//! stored as reported and left to downstream monitoring.

mod error;
mod validator;

pub use error::ValidationError;
pub use validator::{RawSample, Sample, Validator};
