//! Wind fields driving particle advection
//!
//! A wind field answers one question: given particle positions and a simulation time, what
//! angular velocity (°/h) does each particle feel? Two implementations share the
//! [`WindField`] contract:
//!
//! - [`PhaseModel`]: spatially uniform historical phases with blended transitions
//! - [`ReanalysisField`]: bilinear/linear interpolation of a gridded reanalysis time series
//!
//! Each field injects its own turbulence, sized to its own resolution, using the random
//! generator the caller passes in. Fields never own randomness, so runs sharing a field
//! stay independent.
//!
//! Out-of-coverage positions and non-finite interpolation never fail a query: they receive
//! the zero-wind fallback and are counted in [`WindSample`] so the caller can see the
//! degradation.

pub mod dataset;
pub mod phase;
pub mod reanalysis;

pub use dataset::{load_shared, Component, CoverageReport, LonConvention, WindDataset};
pub use phase::{chernobyl_1986, PhaseModel, WindPhase};
pub use reanalysis::{BilinearInterpolator, ReanalysisField};

use crate::config::{SimulationConfig, WindMode};
use crate::error::{ConfigError, SimError, WindError};
use rand::Rng;

/// Wind vectors for a batch of positions, plus degradation counters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindSample {
    /// Eastward angular velocity per position (°/h)
    pub u: Vec<f64>,
    /// Northward angular velocity per position (°/h)
    pub v: Vec<f64>,
    /// Positions (or the whole batch, for an uncovered time) that received the fallback
    pub out_of_coverage: usize,
    /// Positions whose interpolated value was NaN or infinite and received the fallback
    pub non_finite: usize,
}

impl WindSample {
    /// Sample without any degraded positions
    pub fn new(u: Vec<f64>, v: Vec<f64>) -> Self {
        Self {
            u,
            v,
            out_of_coverage: 0,
            non_finite: 0,
        }
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.u.len()
    }

    /// True for an empty batch
    pub fn is_empty(&self) -> bool {
        self.u.is_empty()
    }

    /// True if any position received the fallback
    pub fn is_degraded(&self) -> bool {
        self.out_of_coverage > 0 || self.non_finite > 0
    }
}

/// Contract shared by every wind field.
///
/// Fields are read-only during a query and shared across concurrent runs.
pub trait WindField: Send + Sync {
    /// Wind at each `(lons[i], lats[i])` at `t_hours` since release, in °/h.
    ///
    /// # Errors
    /// Returns [`WindError`] for malformed input (mismatched slices) or a broken internal
    /// cache. Coverage gaps are not errors.
    fn query<R: Rng>(
        &self,
        lons: &[f64],
        lats: &[f64],
        t_hours: f64,
        rng: &mut R,
    ) -> Result<WindSample, WindError>;
}

/// Reject position batches whose coordinate slices disagree in length
pub(crate) fn check_lengths(lons: &[f64], lats: &[f64]) -> Result<(), WindError> {
    if lons.len() == lats.len() {
        Ok(())
    } else {
        Err(WindError::LengthMismatch {
            lons: lons.len(),
            lats: lats.len(),
        })
    }
}

/// Wind field chosen once from configuration
#[derive(Debug)]
pub enum WindModel {
    /// Historical phase model
    Phase(PhaseModel),
    /// Reanalysis interpolation
    Reanalysis(ReanalysisField),
}

impl WindModel {
    /// Build the wind field selected by `config.wind.mode`.
    ///
    /// In reanalysis mode the dataset is fetched through the process-wide cache and its
    /// coverage is checked against the domain and horizon.
    ///
    /// # Errors
    /// Returns [`SimError::Config`] for an invalid phase table or missing dataset path, and
    /// [`SimError::Wind`] if the dataset cannot be loaded.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, SimError> {
        let wind = &config.wind;
        match wind.mode {
            WindMode::PhaseModel => Ok(WindModel::Phase(PhaseModel::new(
                wind.phases.clone(),
                wind.transition_hours,
            )?)),
            WindMode::Reanalysis => {
                let path = wind
                    .dataset_path
                    .as_ref()
                    .ok_or(ConfigError::MissingDatasetPath)?;
                let dataset = load_shared(path)?;
                let field = ReanalysisField::new(dataset, wind.turbulence);
                field.check_coverage(&config.domain, config.horizon_hours());
                Ok(WindModel::Reanalysis(field))
            }
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            WindModel::Phase(_) => "phase model",
            WindModel::Reanalysis(_) => "reanalysis",
        }
    }
}

impl WindField for WindModel {
    fn query<R: Rng>(
        &self,
        lons: &[f64],
        lats: &[f64],
        t_hours: f64,
        rng: &mut R,
    ) -> Result<WindSample, WindError> {
        match self {
            WindModel::Phase(model) => model.query(lons, lats, t_hours, rng),
            WindModel::Reanalysis(field) => field.query(lons, lats, t_hours, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_default_config_selects_phase_model() {
        let model = WindModel::from_config(&SimulationConfig::default()).unwrap();
        assert_eq!(model.name(), "phase model");
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sample = model.query(&[30.0, 31.0], &[51.0, 52.0], 0.0, &mut rng).unwrap();
        assert_eq!(sample.len(), 2);
        assert!(!sample.is_degraded());
    }

    #[test]
    fn test_reanalysis_without_path_is_config_error() {
        let mut config = SimulationConfig::default();
        config.wind.mode = WindMode::Reanalysis;
        let err = WindModel::from_config(&config).unwrap_err();
        assert_eq!(err, SimError::Config(ConfigError::MissingDatasetPath));
    }

    #[test]
    fn test_missing_dataset_file_is_wind_error() {
        let mut config = SimulationConfig::default();
        config.wind.mode = WindMode::Reanalysis;
        config.wind.dataset_path = Some("/nonexistent/era5_missing.json".into());
        let err = WindModel::from_config(&config).unwrap_err();
        assert!(matches!(err, SimError::Wind(WindError::LoadFailed(_))));
    }
}
