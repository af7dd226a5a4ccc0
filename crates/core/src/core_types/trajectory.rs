//! Per-run particle history and the Monte Carlo ensemble
//!
//! A trajectory stores three aligned arrays of shape `(steps + 1, particles)`: longitude,
//! latitude and the active flag. Row `0` is the state before any emission, row `k` the state
//! after `k` integration steps. Particles have no identity beyond their column index.

use crate::core_types::vec2::Vec2;
use serde::{Deserialize, Serialize};

/// Full position/activity history of one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    seed: u64,
    n_steps: usize,
    n_particles: usize,
    lon: Vec<f64>,
    lat: Vec<f64>,
    active: Vec<bool>,
}

impl Trajectory {
    /// Create a trajectory with every particle at `origin` and inactive at every step
    pub(crate) fn new(seed: u64, n_steps: usize, n_particles: usize, origin: Vec2) -> Self {
        let len = (n_steps + 1) * n_particles;
        Self {
            seed,
            n_steps,
            n_particles,
            lon: vec![origin.x; len],
            lat: vec![origin.y; len],
            active: vec![false; len],
        }
    }

    /// Build a trajectory from caller-supplied row-major arrays.
    ///
    /// Returns `None` when any array length differs from `(n_steps + 1) * n_particles`.
    pub fn from_arrays(
        seed: u64,
        n_steps: usize,
        n_particles: usize,
        lon: Vec<f64>,
        lat: Vec<f64>,
        active: Vec<bool>,
    ) -> Option<Self> {
        let len = (n_steps + 1) * n_particles;
        if lon.len() != len || lat.len() != len || active.len() != len {
            return None;
        }
        Some(Self {
            seed,
            n_steps,
            n_particles,
            lon,
            lat,
            active,
        })
    }

    #[inline]
    fn row(&self, step: usize) -> std::ops::Range<usize> {
        let start = step * self.n_particles;
        start..start + self.n_particles
    }

    /// Seed the run was produced with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of integration steps (rows minus one)
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of particle slots
    pub fn n_particles(&self) -> usize {
        self.n_particles
    }

    /// Array shape `(steps + 1, particles)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_steps + 1, self.n_particles)
    }

    /// Longitudes of every particle at `step`
    pub fn lon(&self, step: usize) -> &[f64] {
        &self.lon[self.row(step)]
    }

    /// Latitudes of every particle at `step`
    pub fn lat(&self, step: usize) -> &[f64] {
        &self.lat[self.row(step)]
    }

    /// Active flags of every particle at `step`
    pub fn active(&self, step: usize) -> &[bool] {
        &self.active[self.row(step)]
    }

    pub(crate) fn row_mut(&mut self, step: usize) -> (&mut [f64], &mut [f64], &mut [bool]) {
        let range = self.row(step);
        (
            &mut self.lon[range.clone()],
            &mut self.lat[range.clone()],
            &mut self.active[range],
        )
    }

    /// Copy row `step` into row `step + 1`
    pub(crate) fn carry_forward(&mut self, step: usize) {
        let src = self.row(step);
        let dst = src.end;
        self.lon.copy_within(src.clone(), dst);
        self.lat.copy_within(src.clone(), dst);
        self.active.copy_within(src, dst);
    }

    /// Iterate `(lon, lat)` of active particles at `step`
    pub fn active_positions(&self, step: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        let range = self.row(step);
        self.active[range.clone()]
            .iter()
            .zip(&self.lon[range.clone()])
            .zip(&self.lat[range])
            .filter(|((alive, _), _)| **alive)
            .map(|((_, &lon), &lat)| (lon, lat))
    }

    /// Number of active particles at `step`
    pub fn active_count(&self, step: usize) -> usize {
        self.active(step).iter().filter(|&&a| a).count()
    }

    /// Mean `(lon, lat)` of the active particles at `step`, `None` if nothing is active
    pub fn mean_active_position(&self, step: usize) -> Option<Vec2> {
        let (sum, count) = self
            .active_positions(step)
            .fold((Vec2::zeros(), 0usize), |(sum, n), (lon, lat)| {
                (sum + Vec2::new(lon, lat), n + 1)
            });
        (count > 0).then(|| sum / count as f64)
    }

    /// Number of particles active at some step, i.e. released during the run
    pub fn released_count(&self) -> usize {
        (0..self.n_particles)
            .filter(|&p| (0..=self.n_steps).any(|step| self.active[step * self.n_particles + p]))
            .count()
    }

    /// Whether any particle was active at any step
    pub fn any_active(&self) -> bool {
        self.active.iter().any(|&a| a)
    }
}

/// Ordered collection of independent runs, one per seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    n_steps: usize,
    runs: Vec<Trajectory>,
}

impl Ensemble {
    /// Wrap a set of runs that all share `n_steps`.
    ///
    /// Returns `None` if any run has a different step count.
    pub fn new(n_steps: usize, runs: Vec<Trajectory>) -> Option<Self> {
        runs.iter()
            .all(|r| r.n_steps() == n_steps)
            .then_some(Self { n_steps, runs })
    }

    /// Wrap runs produced by one engine, which share its step count
    pub(crate) fn from_runs(n_steps: usize, runs: Vec<Trajectory>) -> Self {
        debug_assert!(runs.iter().all(|r| r.n_steps() == n_steps));
        Self { n_steps, runs }
    }

    /// Number of integration steps shared by every run
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True when the ensemble holds no runs
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Runs in seed order
    pub fn runs(&self) -> &[Trajectory] {
        &self.runs
    }

    /// Take ownership of the runs
    pub fn into_runs(self) -> Vec<Trajectory> {
        self.runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_particle_trajectory() -> Trajectory {
        Trajectory::from_arrays(
            7,
            1,
            2,
            vec![0.0, 1.0, 0.0, 3.0],
            vec![50.0, 51.0, 50.0, 53.0],
            vec![true, true, true, false],
        )
        .unwrap()
    }

    #[test]
    fn test_new_trajectory_shape_and_state() {
        let traj = Trajectory::new(1, 4, 3, Vec2::new(30.0, 50.0));
        assert_eq!(traj.shape(), (5, 3));
        assert_eq!(traj.lon(4), &[30.0, 30.0, 30.0]);
        assert!(!traj.any_active());
    }

    #[test]
    fn test_zero_particle_trajectory() {
        let traj = Trajectory::new(1, 10, 0, Vec2::new(30.0, 50.0));
        assert_eq!(traj.shape(), (11, 0));
        assert!(traj.lon(10).is_empty());
        assert_eq!(traj.mean_active_position(10), None);
    }

    #[test]
    fn test_from_arrays_rejects_bad_lengths() {
        assert!(
            Trajectory::from_arrays(0, 1, 2, vec![0.0; 3], vec![0.0; 4], vec![false; 4]).is_none()
        );
    }

    #[test]
    fn test_active_positions_and_mean() {
        let traj = two_particle_trajectory();
        assert_eq!(traj.active_count(1), 1);
        let positions: Vec<_> = traj.active_positions(0).collect();
        assert_eq!(positions, vec![(0.0, 50.0), (1.0, 51.0)]);
        let mean = traj.mean_active_position(0).unwrap();
        assert_eq!(mean, Vec2::new(0.5, 50.5));
        assert_eq!(traj.released_count(), 2);
    }

    #[test]
    fn test_carry_forward_copies_row() {
        let mut traj = Trajectory::new(1, 2, 2, Vec2::new(0.0, 0.0));
        {
            let (lon, lat, active) = traj.row_mut(0);
            lon[1] = 4.0;
            lat[1] = 5.0;
            active[1] = true;
        }
        traj.carry_forward(0);
        assert_eq!(traj.lon(1), &[0.0, 4.0]);
        assert_eq!(traj.lat(1), &[0.0, 5.0]);
        assert_eq!(traj.active(1), &[false, true]);
    }

    #[test]
    fn test_ensemble_rejects_mismatched_steps() {
        let a = Trajectory::new(0, 3, 1, Vec2::zeros());
        let b = Trajectory::new(1, 4, 1, Vec2::zeros());
        assert!(Ensemble::new(3, vec![a.clone(), b]).is_none());
        let ensemble = Ensemble::new(3, vec![a]).unwrap();
        assert_eq!(ensemble.len(), 1);
        assert_eq!(ensemble.n_steps(), 3);
    }
}
