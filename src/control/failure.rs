//! User-facing rewrite of cycle failures.

use crate::fit::TOO_FEW_POINTS;
use crate::io::EMPTY_DATASET;
use crate::math::FIRST_STEP_EXCEEDS_BOUNDS;

const INSUFFICIENT_DATA_PREFIX: &str = "There may be not enough measurement datapoints to perform a parameter estimation. The Errormessage is: ";

/// Failures that usually mean the run has too few measurements so far.
pub const INSUFFICIENT_DATA_ERRORS: [&str; 3] = [EMPTY_DATASET, FIRST_STEP_EXCEEDS_BOUNDS, TOO_FEW_POINTS];

/// The message shown for a failed cycle. Exact matches of the known
/// insufficient-data failures get an explanatory prefix; anything else is
/// shown as is.
pub fn display_message(raw: &str) -> String {
    if INSUFFICIENT_DATA_ERRORS.contains(&raw) {
        format!("{INSUFFICIENT_DATA_PREFIX}{raw}")
    } else {
        raw.to_string()
    }
}
