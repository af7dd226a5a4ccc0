//! Error types for configuration, wind-field and simulation failures
//!
//! Only failures that must stop work are errors. Degraded wind data (positions outside the
//! dataset, non-finite interpolation) is handled by the zero-wind fallback and reported
//! through [`crate::wind::WindSample`] diagnostics instead.

use std::fmt;

/// Fatal configuration problems, raised before any simulation work starts
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter that must be finite is NaN or infinite
    NonFinite(&'static str),
    /// Time step is zero or negative
    NonPositiveTimeStep(f64),
    /// Step count is zero
    ZeroSteps,
    /// Domain minimum is not strictly below maximum on an axis
    InvertedBounds {
        /// Axis name (`"longitude"` or `"latitude"`)
        axis: &'static str,
        /// Configured minimum
        min: f64,
        /// Configured maximum
        max: f64,
    },
    /// Periodic domain latitude span leaves no room inside the edge margin
    LatitudeSpanTooNarrow {
        /// Configured latitude span (°)
        span: f64,
        /// Margin kept from each latitude edge (°)
        margin: f64,
    },
    /// Grid has zero cells along an axis
    ZeroResolution(&'static str),
    /// Emission window is longer than the simulated horizon
    EmissionExceedsHorizon {
        /// Configured emission duration (h)
        emission_hours: f64,
        /// Simulated horizon (h)
        horizon_hours: f64,
    },
    /// Per-step emission rate cannot release every particle inside the emission window
    EmissionRateTooLow {
        /// Particles per step
        rate: usize,
        /// Steps in the emission window
        window_steps: usize,
        /// Configured particle count
        n_particles: usize,
    },
    /// A coefficient that must be non-negative is negative
    Negative(&'static str, f64),
    /// Threshold is outside `[0, 1]`
    ThresholdOutOfRange(f64),
    /// Release point lies outside the simulation domain
    SourceOutsideDomain {
        /// Source longitude
        lon: f64,
        /// Source latitude
        lat: f64,
    },
    /// Reanalysis turbulence and sub-grid diffusion are both enabled
    DoubleDispersion,
    /// Reanalysis mode selected without a dataset path
    MissingDatasetPath,
    /// Phase table is malformed
    PhaseTable(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonFinite(name) => write!(f, "Parameter '{name}' must be finite"),
            ConfigError::NonPositiveTimeStep(dt) => {
                write!(f, "Time step must be positive, got {dt}")
            }
            ConfigError::ZeroSteps => write!(f, "Step count must be at least 1"),
            ConfigError::InvertedBounds { axis, min, max } => {
                write!(f, "Domain {axis} bounds inverted: min {min} >= max {max}")
            }
            ConfigError::LatitudeSpanTooNarrow { span, margin } => write!(
                f,
                "Periodic domain latitude span {span}° must exceed twice the edge margin {margin}°"
            ),
            ConfigError::ZeroResolution(axis) => {
                write!(f, "Grid resolution along {axis} must be at least 1 cell")
            }
            ConfigError::EmissionExceedsHorizon {
                emission_hours,
                horizon_hours,
            } => write!(
                f,
                "Emission duration {emission_hours} h exceeds simulation horizon {horizon_hours} h"
            ),
            ConfigError::EmissionRateTooLow {
                rate,
                window_steps,
                n_particles,
            } => write!(
                f,
                "Emission rate {rate}/step over {window_steps} steps cannot release {n_particles} particles"
            ),
            ConfigError::Negative(name, value) => {
                write!(f, "Parameter '{name}' must be non-negative, got {value}")
            }
            ConfigError::ThresholdOutOfRange(t) => {
                write!(f, "Threshold must lie in [0, 1], got {t}")
            }
            ConfigError::SourceOutsideDomain { lon, lat } => {
                write!(f, "Source ({lon}, {lat}) lies outside the simulation domain")
            }
            ConfigError::DoubleDispersion => write!(
                f,
                "Reanalysis turbulence and sub-grid diffusion are both enabled; dispersion would be counted twice"
            ),
            ConfigError::MissingDatasetPath => {
                write!(f, "Reanalysis wind mode requires a dataset path")
            }
            ConfigError::PhaseTable(msg) => write!(f, "Invalid wind phase table: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Wind-field failures that propagate to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum WindError {
    /// Longitude and latitude slices have different lengths
    LengthMismatch {
        /// Longitude count
        lons: usize,
        /// Latitude count
        lats: usize,
    },
    /// Dataset file could not be read
    LoadFailed(String),
    /// Dataset file could not be parsed
    ParseFailed(String),
    /// Dataset content is structurally invalid
    MalformedDataset(String),
    /// A cache lock was poisoned by a panic in another thread
    LockPoisoned(&'static str),
}

impl fmt::Display for WindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindError::LengthMismatch { lons, lats } => {
                write!(f, "Position slices differ in length: {lons} longitudes, {lats} latitudes")
            }
            WindError::LoadFailed(msg) => write!(f, "Failed to load wind dataset: {msg}"),
            WindError::ParseFailed(msg) => write!(f, "Failed to parse wind dataset: {msg}"),
            WindError::MalformedDataset(msg) => write!(f, "Malformed wind dataset: {msg}"),
            WindError::LockPoisoned(name) => {
                write!(f, "Lock '{name}' was poisoned by a panic in another thread")
            }
        }
    }
}

impl std::error::Error for WindError {}

/// Top-level error returned by the particle engine
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Invalid configuration
    Config(ConfigError),
    /// Wind query or dataset failure
    Wind(WindError),
    /// Run aborted through its cancellation flag
    Cancelled {
        /// Seed of the aborted run
        seed: u64,
        /// Steps completed before the abort
        completed_steps: usize,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(e) => write!(f, "Configuration error: {e}"),
            SimError::Wind(e) => write!(f, "Wind field error: {e}"),
            SimError::Cancelled {
                seed,
                completed_steps,
            } => write!(f, "Run with seed {seed} cancelled after {completed_steps} steps"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimError::Config(e) => Some(e),
            SimError::Wind(e) => Some(e),
            SimError::Cancelled { .. } => None,
        }
    }
}

impl From<ConfigError> for SimError {
    fn from(e: ConfigError) -> Self {
        SimError::Config(e)
    }
}

impl From<WindError> for SimError {
    fn from(e: WindError) -> Self {
        SimError::Wind(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::InvertedBounds {
            axis: "longitude",
            min: 10.0,
            max: -10.0,
        };
        assert_eq!(
            err.to_string(),
            "Domain longitude bounds inverted: min 10 >= max -10"
        );
        assert_eq!(
            ConfigError::NonPositiveTimeStep(0.0).to_string(),
            "Time step must be positive, got 0"
        );
    }

    #[test]
    fn test_sim_error_wraps_source() {
        let err: SimError = WindError::LockPoisoned("interpolator cache").into();
        assert!(err.to_string().starts_with("Wind field error: Lock 'interpolator cache'"));
        assert!(err.source().is_some());

        let cancelled = SimError::Cancelled {
            seed: 3,
            completed_steps: 5,
        };
        assert!(cancelled.source().is_none());
    }
}
