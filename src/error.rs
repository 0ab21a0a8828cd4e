//! Error types for the coverage planner.

use thiserror::Error;

/// Upper bound on the number of lattice nodes a single grid may hold.
pub const MAX_GRID_POINTS: usize = 25_000_000;

/// Errors that abort a planning call.
///
/// Search outcomes that merely fall short (target unreachable, budget
/// exhausted) are not errors; they are reported through
/// [`SolutionStatus`](crate::SolutionStatus) on a returned solution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlannerError {
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    #[error("sensor set is empty, nothing to reposition")]
    EmptySensorSet,

    #[error("infeasible constraints: {0}")]
    InfeasibleConstraints(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("grid of {points} points exceeds the limit of {limit}")]
    GridTooLarge { points: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, PlannerError>;

/// Reject values that are NaN, infinite, or not strictly positive.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

/// Reject values that are NaN, infinite, or negative.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!(
            "{name} must be a non-negative finite number, got {value}"
        )))
    }
}

/// Reject coverage targets outside (0, 1].
pub(crate) fn ensure_ratio(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!(
            "{name} must lie in (0, 1], got {value}"
        )))
    }
}

/// Reject probabilities outside [0, 1].
pub(crate) fn ensure_probability(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!(
            "{name} must lie in [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_rejects_zero_and_nan() {
        assert!(ensure_positive("radius", 1.5).is_ok());
        assert!(ensure_positive("radius", 0.0).is_err());
        assert!(ensure_positive("radius", f64::NAN).is_err());
        assert!(ensure_positive("radius", f64::INFINITY).is_err());
    }

    #[test]
    fn test_ratio_bounds() {
        assert!(ensure_ratio("target", 1.0).is_ok());
        assert!(ensure_ratio("target", 0.5).is_ok());
        assert!(ensure_ratio("target", 0.0).is_err());
        assert!(ensure_ratio("target", 1.01).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = PlannerError::GridTooLarge {
            points: 10,
            limit: 5,
        };
        assert_eq!(err.to_string(), "grid of 10 points exceeds the limit of 5");
        assert_eq!(
            PlannerError::EmptySensorSet.to_string(),
            "sensor set is empty, nothing to reposition"
        );
    }
}
