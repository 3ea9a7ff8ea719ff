//! Error types for the simulation core.

use thiserror::Error;

/// Invalid construction parameters. Raised at build time, never clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("{field}: min {min} exceeds max {max}")]
    InvertedBounds {
        field: &'static str,
        min: f32,
        max: f32,
    },

    #[error("{field} must be non-zero")]
    EmptyDimension { field: &'static str },

    #[error("region id `{0}` appears more than once")]
    DuplicateRegion(String),

    #[error("region id `{0}` is reserved for the central hub")]
    ReservedRegionId(String),
}

/// An operation addressed something that does not exist.
///
/// These are reported, not fatal: the addressed operation performs no
/// mutation and the caller decides whether to care.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unknown region `{0}`")]
    UnknownRegion(String),

    #[error("unknown learning algorithm `{0}`")]
    UnknownAlgorithm(String),

    #[error("network has no central hub")]
    NoHub,
}

pub(crate) fn check_finite(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite { field })
    }
}

pub(crate) fn check_range(
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> Result<(), ConfigError> {
    check_finite(field, value)?;
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub(crate) fn check_probability(field: &'static str, value: f32) -> Result<(), ConfigError> {
    check_range(field, value, 0.0, 1.0)
}

pub(crate) fn check_weight_bounds(
    field: &'static str,
    min: f32,
    max: f32,
) -> Result<(), ConfigError> {
    check_finite(field, min)?;
    check_finite(field, max)?;
    if min > max {
        return Err(ConfigError::InvertedBounds { field, min, max });
    }
    Ok(())
}
