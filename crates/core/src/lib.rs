//! Atmospheric Dispersion Simulation Core Library
//!
//! Estimates where a point-source release of particulate matter travels over a multi-day
//! horizon. Virtual particles are advected by a time-varying wind field with turbulent
//! diffusion, and many independent Monte Carlo runs are aggregated into probability and
//! concentration maps.
//!
//! ## Pipeline
//!
//! - [`wind`]: historical phase model or interpolated reanalysis data behind one
//!   [`WindField`] contract, each injecting its own turbulence
//! - [`engine`]: emission, advection, optional sub-grid diffusion and domain policy per run,
//!   one explicitly seeded generator per run, ensembles in parallel
//! - [`aggregation`]: density, presence probability, mean concentration and threshold
//!   exceedance maps on a lat/lon grid
//!
//! ```no_run
//! use dispersion_sim_core::{Aggregator, ParticleEngine, SimulationConfig};
//!
//! let config = SimulationConfig::default();
//! let aggregator = Aggregator::from_config(&config.domain);
//! let threshold = config.threshold;
//! let engine = ParticleEngine::from_config(config)?;
//! let ensemble = engine.run_ensemble()?;
//! let probability = aggregator.probability(&ensemble);
//! let exceedance = aggregator.threshold_exceedance(&ensemble, threshold);
//! # Ok::<(), dispersion_sim_core::SimError>(())
//! ```

// Core types and utilities
pub mod config;
pub mod core_types;
pub mod error;

// Simulation pipeline
pub mod aggregation;
pub mod engine;
pub mod wind;

// Re-export core types
pub use config::{
    DiffusionConfig, DomainConfig, RunConfig, SimulationConfig, SourceConfig, WindConfig, WindMode,
};
pub use core_types::{DegreesPerHour, Ensemble, MetersPerSecond, Trajectory, Vec2};
pub use error::{ConfigError, SimError, WindError};

// Re-export pipeline types
pub use aggregation::{Aggregator, Grid, GridMap};
pub use engine::{Domain, DomainPolicy, EmissionSchedule, ParticleEngine};
pub use wind::{
    PhaseModel, ReanalysisField, WindDataset, WindField, WindModel, WindPhase, WindSample,
};
