//! Lagrangian particle engine
//!
//! Releases particles from the source over the emission window, advects them through a
//! [`WindField`], optionally adds sub-grid diffusion and applies the domain policy, recording
//! every step into a [`Trajectory`].
//!
//! Every run owns one `ChaCha8Rng` seeded once from its seed and threaded through emission
//! jitter, wind turbulence and diffusion, in that order within a step. The same seed and
//! configuration therefore reproduce a bit-identical trajectory, and runs of an ensemble can
//! execute on any thread in any order.

pub mod domain;
pub mod emission;

pub use domain::{Domain, DomainPolicy};
pub use emission::EmissionSchedule;

use crate::config::SimulationConfig;
use crate::core_types::{DegreesPerHour, Ensemble, Trajectory, Vec2};
use crate::error::SimError;
use crate::wind::{WindField, WindModel};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Particle engine over a validated configuration and a wind field
#[derive(Debug)]
pub struct ParticleEngine<W = WindModel> {
    config: SimulationConfig,
    wind: W,
    schedule: EmissionSchedule,
    domain: Domain,
}

impl ParticleEngine<WindModel> {
    /// Validate `config` and build the wind field it selects
    ///
    /// # Errors
    /// Returns [`SimError::Config`] for an invalid configuration and [`SimError::Wind`] if
    /// the reanalysis dataset cannot be loaded.
    pub fn from_config(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        let wind = WindModel::from_config(&config)?;
        info!("Wind field: {}", wind.name());
        Self::new(config, wind)
    }
}

impl<W: WindField> ParticleEngine<W> {
    /// Create an engine driven by `wind`
    ///
    /// # Arguments
    ///
    /// * `config` - Simulation configuration, validated here
    /// * `wind` - Wind field queried at every step
    ///
    /// # Errors
    /// Returns [`SimError::Config`] if the configuration is invalid.
    pub fn new(config: SimulationConfig, wind: W) -> Result<Self, SimError> {
        config.validate()?;
        let schedule = EmissionSchedule::from_config(&config);
        let domain = Domain::from_config(&config.domain);

        info!(
            "Particle engine ready: source {} ({:.4}, {:.4}), {} particles over {} emission steps, {} steps of {} h, {:?} domain, diffusion {}",
            config.source.name,
            config.source.lon,
            config.source.lat,
            config.run.n_particles,
            schedule.window(),
            config.run.n_steps,
            config.run.dt,
            domain.policy(),
            if config.wind.apply_diffusion { "on" } else { "off" }
        );

        Ok(Self {
            config,
            wind,
            schedule,
            domain,
        })
    }

    /// Configuration the engine runs with
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Wind field driving advection
    pub fn wind(&self) -> &W {
        &self.wind
    }

    /// Emission schedule
    pub fn schedule(&self) -> &EmissionSchedule {
        &self.schedule
    }

    /// Domain policy
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Run one simulation with `seed`
    ///
    /// # Errors
    /// Returns [`SimError::Wind`] if a wind query fails.
    pub fn run(&self, seed: u64) -> Result<Trajectory, SimError> {
        self.run_cancellable(seed, &AtomicBool::new(false))
    }

    /// Run one simulation, checking `cancel` before every step
    ///
    /// # Errors
    /// Returns [`SimError::Cancelled`] once `cancel` is set and [`SimError::Wind`] if a wind
    /// query fails.
    pub fn run_cancellable(
        &self,
        seed: u64,
        cancel: &AtomicBool,
    ) -> Result<Trajectory, SimError> {
        let run = &self.config.run;
        let source = Vec2::new(self.config.source.lon, self.config.source.lat);
        let jitter = Vec2::new(
            self.config.source.jitter_lon_deg,
            self.config.source.jitter_lat_deg,
        );
        let diffusion = self.config.wind.apply_diffusion.then(|| {
            Vec2::new(
                (2.0 * self.config.diffusion.k_lon * run.dt).sqrt(),
                (2.0 * self.config.diffusion.k_lat * run.dt).sqrt(),
            )
        });

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut trajectory = Trajectory::new(seed, run.n_steps, run.n_particles, source);
        let mut alive: Vec<usize> = Vec::with_capacity(run.n_particles);
        let mut lons: Vec<f64> = Vec::with_capacity(run.n_particles);
        let mut lats: Vec<f64> = Vec::with_capacity(run.n_particles);
        let mut degraded = 0usize;

        for step in 0..run.n_steps {
            if cancel.load(Ordering::Relaxed) {
                return Err(SimError::Cancelled {
                    seed,
                    completed_steps: step,
                });
            }
            let t_hours = step as f64 * run.dt;
            trajectory.carry_forward(step);
            let (lon, lat, active) = trajectory.row_mut(step + 1);

            // 1. Release this step's particles at the jittered source
            let released = self.schedule.range_at(step);
            emit(released, source, jitter, lon, lat, active, &mut rng);

            alive.clear();
            alive.extend(
                active
                    .iter()
                    .enumerate()
                    .filter(|&(_, &a)| a)
                    .map(|(i, _)| i),
            );
            if alive.is_empty() {
                continue;
            }
            lons.clear();
            lons.extend(alive.iter().map(|&i| lon[i]));
            lats.clear();
            lats.extend(alive.iter().map(|&i| lat[i]));

            // 2. Wind at current positions (°/h)
            let wind = self.wind.query(&lons, &lats, t_hours, &mut rng)?;
            if wind.is_degraded() {
                degraded += wind.out_of_coverage + wind.non_finite;
            }

            // 3. Optional sub-grid diffusion
            let n = alive.len();
            let noise = diffusion.map(|sigma| {
                let dx: Vec<f64> = (0..n)
                    .map(|_| sigma.x * rng.sample::<f64, _>(StandardNormal))
                    .collect();
                let dy: Vec<f64> = (0..n)
                    .map(|_| sigma.y * rng.sample::<f64, _>(StandardNormal))
                    .collect();
                (dx, dy)
            });

            // 4. Advance and apply the domain policy
            for (j, &i) in alive.iter().enumerate() {
                let (dx, dy) = noise.as_ref().map_or((0.0, 0.0), |(dx, dy)| (dx[j], dy[j]));
                let proposed = Vec2::new(
                    lons[j] + DegreesPerHour::new(wind.u[j]).displacement(run.dt) + dx,
                    lats[j] + DegreesPerHour::new(wind.v[j]).displacement(run.dt) + dy,
                );
                match self.domain.resolve(proposed) {
                    Some(p) => {
                        lon[i] = p.x;
                        lat[i] = p.y;
                    }
                    None => active[i] = false,
                }
            }
        }

        debug!(
            "Run seed={} complete: {}/{} active at final step, {} degraded wind samples",
            seed,
            trajectory.active_count(run.n_steps),
            run.n_particles,
            degraded
        );
        Ok(trajectory)
    }

    /// Run `n_runs` independent simulations with seeds `base_seed + i`, in parallel.
    ///
    /// Runs are returned in seed order.
    ///
    /// # Errors
    /// Returns the first [`SimError`] raised by any run.
    pub fn run_monte_carlo(&self, n_runs: usize, base_seed: u64) -> Result<Ensemble, SimError> {
        self.run_monte_carlo_cancellable(n_runs, base_seed, &AtomicBool::new(false))
    }

    /// [`ParticleEngine::run_monte_carlo`] with a shared cancellation flag checked by every
    /// run between steps
    ///
    /// # Errors
    /// Returns [`SimError::Cancelled`] once `cancel` is set, otherwise the first wind error.
    pub fn run_monte_carlo_cancellable(
        &self,
        n_runs: usize,
        base_seed: u64,
        cancel: &AtomicBool,
    ) -> Result<Ensemble, SimError> {
        if n_runs == 0 {
            warn!("Monte Carlo ensemble requested with zero runs");
        }
        info!(
            "Starting Monte Carlo ensemble: {} runs, seeds {}..{}",
            n_runs,
            base_seed,
            base_seed.wrapping_add(n_runs as u64)
        );

        let runs = (0..n_runs)
            .into_par_iter()
            .map(|i| self.run_cancellable(base_seed.wrapping_add(i as u64), cancel))
            .collect::<Result<Vec<_>, _>>()?;

        let active: usize = runs.iter().map(|r| r.active_count(r.n_steps())).sum();
        info!(
            "Monte Carlo ensemble complete: {} runs, {} particles active at final step",
            runs.len(),
            active
        );
        Ok(Ensemble::from_runs(self.config.run.n_steps, runs))
    }

    /// Run the ensemble described by the configuration (`run.n_runs` runs from `run.seed`)
    ///
    /// # Errors
    /// As [`ParticleEngine::run_monte_carlo`].
    pub fn run_ensemble(&self) -> Result<Ensemble, SimError> {
        self.run_monte_carlo(self.config.run.n_runs, self.config.run.seed)
    }
}

/// Activate `released` particles at `source`, offset by Gaussian jitter
fn emit<R: Rng>(
    released: Range<usize>,
    source: Vec2,
    jitter: Vec2,
    lon: &mut [f64],
    lat: &mut [f64],
    active: &mut [bool],
    rng: &mut R,
) {
    for x in &mut lon[released.clone()] {
        *x = source.x + jitter.x * rng.sample::<f64, _>(StandardNormal);
    }
    for y in &mut lat[released.clone()] {
        *y = source.y + jitter.y * rng.sample::<f64, _>(StandardNormal);
    }
    active[released].fill(true);
}
