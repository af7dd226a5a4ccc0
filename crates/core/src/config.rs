//! Simulation configuration
//!
//! Every numeric parameter the engine consumes lives here as a plain value. The defaults
//! reproduce the Chernobyl release of 26 April 1986 over Eurasia. [`SimulationConfig::validate`]
//! rejects inconsistent settings before any simulation work begins.

use crate::engine::domain::LAT_EDGE_MARGIN;
use crate::engine::emission::EmissionSchedule;
use crate::error::ConfigError;
use crate::wind::phase::{chernobyl_1986, validate_phase_table, WindPhase};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Point source of the release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source longitude (°E)
    pub lon: f64,
    /// Source latitude (°N)
    pub lat: f64,
    /// Human-readable name for logs
    pub name: String,
    /// Length of the emission window (h). `None` or `0` releases everything at step 0.
    pub emission_duration_h: Option<f64>,
    /// Maximum particles released per step. `None` spreads the release evenly over the window.
    pub emission_rate: Option<usize>,
    /// Standard deviation of the longitude jitter applied at emission (°)
    pub jitter_lon_deg: f64,
    /// Standard deviation of the latitude jitter applied at emission (°)
    pub jitter_lat_deg: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            lon: 30.0996,
            lat: 51.3917,
            name: "Chernobyl".to_string(),
            emission_duration_h: Some(240.0),
            emission_rate: None,
            jitter_lon_deg: 0.05,
            jitter_lat_deg: 0.03,
        }
    }
}

/// Which wind field drives advection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindMode {
    /// Spatially uniform, time-segmented historical phases
    #[default]
    PhaseModel,
    /// Gridded reanalysis data interpolated in space and time
    Reanalysis,
}

/// Wind field selection and turbulence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindConfig {
    /// Selected wind field
    pub mode: WindMode,
    /// Path to the reanalysis dataset (JSON), required in reanalysis mode
    pub dataset_path: Option<PathBuf>,
    /// Reanalysis turbulence coefficient τ (fraction of local wind speed)
    pub turbulence: f64,
    /// Enable the explicit sub-grid diffusion stage
    pub apply_diffusion: bool,
    /// Blend window between adjacent phases (h)
    pub transition_hours: f64,
    /// Phase table for the phase model
    pub phases: Vec<WindPhase>,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            mode: WindMode::PhaseModel,
            dataset_path: None,
            turbulence: 0.25,
            apply_diffusion: false,
            transition_hours: 6.0,
            phases: chernobyl_1986(),
        }
    }
}

/// Sub-grid diffusion coefficients (°²/h)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffusionConfig {
    /// Diffusion along longitude
    pub k_lon: f64,
    /// Diffusion along latitude
    pub k_lat: f64,
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self {
            k_lon: 0.008,
            k_lat: 0.006,
        }
    }
}

/// Simulation domain and aggregation grid resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    /// Western bound (°)
    pub lon_min: f64,
    /// Eastern bound (°)
    pub lon_max: f64,
    /// Southern bound (°)
    pub lat_min: f64,
    /// Northern bound (°)
    pub lat_max: f64,
    /// Grid cells along longitude
    pub nlon: usize,
    /// Grid cells along latitude
    pub nlat: usize,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            lon_min: -12.0,
            lon_max: 75.0,
            lat_min: 33.0,
            lat_max: 72.0,
            nlon: 350,
            nlat: 200,
        }
    }
}

impl DomainConfig {
    /// Longitude span (°)
    pub fn lon_span(&self) -> f64 {
        self.lon_max - self.lon_min
    }

    /// True when longitude covers the full circle and wraps instead of deactivating
    pub fn is_periodic(&self) -> bool {
        self.lon_min <= -180.0 && self.lon_max >= 180.0 && self.lon_span() >= 359.0
    }

    /// Whether a position lies inside the bounds (edges included)
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.lon_min..=self.lon_max).contains(&lon) && (self.lat_min..=self.lat_max).contains(&lat)
    }
}

/// Run sizing and seeding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Total particles released per run
    pub n_particles: usize,
    /// Integration time step (h)
    pub dt: f64,
    /// Number of integration steps
    pub n_steps: usize,
    /// Monte Carlo runs
    pub n_runs: usize,
    /// Base seed; run `i` uses `seed + i`
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_particles: 8000,
            dt: 1.0,
            n_steps: 480,
            n_runs: 12,
            seed: 1986,
        }
    }
}

/// Complete simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Release point and emission schedule
    pub source: SourceConfig,
    /// Wind field selection
    pub wind: WindConfig,
    /// Sub-grid diffusion coefficients
    pub diffusion: DiffusionConfig,
    /// Domain bounds and grid resolution
    pub domain: DomainConfig,
    /// Run sizing
    pub run: RunConfig,
    /// Concentration threshold for the exceedance map
    pub threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            wind: WindConfig::default(),
            diffusion: DiffusionConfig::default(),
            domain: DomainConfig::default(),
            run: RunConfig::default(),
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

impl SimulationConfig {
    /// Default exceedance threshold on normalized concentration
    pub const DEFAULT_THRESHOLD: f64 = 0.05;

    /// Simulated horizon (h)
    pub fn horizon_hours(&self) -> f64 {
        self.run.n_steps as f64 * self.run.dt
    }

    /// Check every parameter, returning the first inconsistency found
    ///
    /// # Errors
    /// Returns a [`ConfigError`] describing the first invalid parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let run = &self.run;
        if !run.dt.is_finite() {
            return Err(ConfigError::NonFinite("dt"));
        }
        if run.dt <= 0.0 {
            return Err(ConfigError::NonPositiveTimeStep(run.dt));
        }
        if run.n_steps == 0 {
            return Err(ConfigError::ZeroSteps);
        }

        let d = &self.domain;
        for (name, value) in [
            ("lon_min", d.lon_min),
            ("lon_max", d.lon_max),
            ("lat_min", d.lat_min),
            ("lat_max", d.lat_max),
            ("source.lon", self.source.lon),
            ("source.lat", self.source.lat),
            ("threshold", self.threshold),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
        }
        if d.lon_min >= d.lon_max {
            return Err(ConfigError::InvertedBounds {
                axis: "longitude",
                min: d.lon_min,
                max: d.lon_max,
            });
        }
        if d.lat_min >= d.lat_max {
            return Err(ConfigError::InvertedBounds {
                axis: "latitude",
                min: d.lat_min,
                max: d.lat_max,
            });
        }
        if d.is_periodic() && d.lat_max - d.lat_min <= 2.0 * LAT_EDGE_MARGIN {
            return Err(ConfigError::LatitudeSpanTooNarrow {
                span: d.lat_max - d.lat_min,
                margin: LAT_EDGE_MARGIN,
            });
        }
        if d.nlon == 0 {
            return Err(ConfigError::ZeroResolution("longitude"));
        }
        if d.nlat == 0 {
            return Err(ConfigError::ZeroResolution("latitude"));
        }
        if !d.contains(self.source.lon, self.source.lat) {
            return Err(ConfigError::SourceOutsideDomain {
                lon: self.source.lon,
                lat: self.source.lat,
            });
        }

        for (name, value) in [
            ("source.jitter_lon_deg", self.source.jitter_lon_deg),
            ("source.jitter_lat_deg", self.source.jitter_lat_deg),
            ("diffusion.k_lon", self.diffusion.k_lon),
            ("diffusion.k_lat", self.diffusion.k_lat),
            ("wind.turbulence", self.wind.turbulence),
            ("wind.transition_hours", self.wind.transition_hours),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite(name));
            }
            if value < 0.0 {
                return Err(ConfigError::Negative(name, value));
            }
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.threshold));
        }

        let horizon = self.horizon_hours();
        if let Some(duration) = self.source.emission_duration_h {
            if !duration.is_finite() {
                return Err(ConfigError::NonFinite("source.emission_duration_h"));
            }
            if duration < 0.0 {
                return Err(ConfigError::Negative("source.emission_duration_h", duration));
            }
            if duration > horizon {
                return Err(ConfigError::EmissionExceedsHorizon {
                    emission_hours: duration,
                    horizon_hours: horizon,
                });
            }
        }
        if let Some(rate) = self.source.emission_rate {
            let window_steps = EmissionSchedule::window_steps(
                self.source.emission_duration_h,
                run.dt,
                run.n_steps,
            );
            if rate.saturating_mul(window_steps) < run.n_particles {
                return Err(ConfigError::EmissionRateTooLow {
                    rate,
                    window_steps,
                    n_particles: run.n_particles,
                });
            }
        }

        match self.wind.mode {
            WindMode::PhaseModel => validate_phase_table(&self.wind.phases, horizon)?,
            WindMode::Reanalysis => {
                if self.wind.dataset_path.is_none() {
                    return Err(ConfigError::MissingDatasetPath);
                }
                if self.wind.turbulence > 0.0 && self.wind.apply_diffusion {
                    return Err(ConfigError::DoubleDispersion);
                }
            }
        }

        Ok(())
    }
}
