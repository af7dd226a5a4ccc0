//! Statistical maps over trajectories and ensembles
//!
//! Every map is a pure function of its input and the [`Grid`]. Ensemble maps reduce each run
//! in parallel and sum the per-run maps in seed order, so results do not depend on thread
//! scheduling.

pub mod grid;

pub use grid::{Grid, GridMap};

use crate::config::DomainConfig;
use crate::core_types::{Ensemble, Trajectory};
use rayon::prelude::*;
use tracing::debug;

/// Builds density, probability and concentration maps on a fixed grid
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    grid: Grid,
}

/// Add `other` cell by cell into `total`
fn accumulate(total: &mut GridMap, other: &GridMap) {
    for (t, o) in total.data_mut().iter_mut().zip(other.data()) {
        *t += o;
    }
}

/// 1.0 where the cell holds anything, 0.0 elsewhere
fn presence(mut map: GridMap) -> GridMap {
    for x in map.data_mut() {
        *x = if *x > 0.0 { 1.0 } else { 0.0 };
    }
    map
}

impl Aggregator {
    /// Aggregator over `grid`
    pub fn new(grid: Grid) -> Self {
        Self { grid }
    }

    /// Aggregator over the grid a domain configuration describes
    pub fn from_config(config: &DomainConfig) -> Self {
        Self::new(Grid::from_config(config))
    }

    /// Binning grid
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Raw counts of the given positions
    fn histogram(&self, positions: impl Iterator<Item = (f64, f64)>) -> GridMap {
        let mut map = self.grid.zeros();
        for (lon, lat) in positions {
            if let Some((row, col)) = self.grid.cell_of(lon, lat) {
                map.add(row, col, 1.0);
            }
        }
        map
    }

    /// Raw counts of active particles at one step
    fn step_counts(&self, trajectory: &Trajectory, step: usize) -> GridMap {
        self.histogram(trajectory.active_positions(step))
    }

    /// Raw counts of active particles over every step
    fn run_counts(&self, trajectory: &Trajectory) -> GridMap {
        self.histogram(
            (0..=trajectory.n_steps()).flat_map(|step| trajectory.active_positions(step)),
        )
    }

    /// Reduce every run to a map in parallel, then sum the maps in run order
    fn sum_runs<F>(&self, ensemble: &Ensemble, per_run: F) -> GridMap
    where
        F: Fn(&Trajectory) -> GridMap + Send + Sync,
    {
        let maps: Vec<GridMap> = ensemble.runs().par_iter().map(per_run).collect();
        let mut total = self.grid.zeros();
        for map in &maps {
            accumulate(&mut total, map);
        }
        total
    }

    /// Cumulative density of every active position over all steps, peak normalized to 1.0
    pub fn density(&self, trajectory: &Trajectory) -> GridMap {
        let mut map = self.run_counts(trajectory);
        map.normalize();
        map
    }

    /// Raw per-step counts of active particles, `steps + 1` maps
    pub fn time_density(&self, trajectory: &Trajectory) -> Vec<GridMap> {
        (0..=trajectory.n_steps())
            .into_par_iter()
            .map(|step| self.step_counts(trajectory, step))
            .collect()
    }

    /// Fraction of runs in which an active particle ever visited each cell
    pub fn probability(&self, ensemble: &Ensemble) -> GridMap {
        debug!("Computing presence probability over {} runs", ensemble.len());
        let mut map = self.sum_runs(ensemble, |run| presence(self.run_counts(run)));
        map.scale_down(ensemble.len());
        map
    }

    /// Mean of the per-run normalized densities, renormalized so the peak is 1.0
    pub fn mean_concentration(&self, ensemble: &Ensemble) -> GridMap {
        debug!("Computing mean concentration over {} runs", ensemble.len());
        let mut map = self.sum_runs(ensemble, |run| self.density(run));
        map.scale_down(ensemble.len());
        map.normalize();
        map
    }

    /// Fraction of runs whose normalized density in each cell exceeds `threshold`
    pub fn threshold_exceedance(&self, ensemble: &Ensemble, threshold: f64) -> GridMap {
        debug!(
            "Computing exceedance of {} over {} runs",
            threshold,
            ensemble.len()
        );
        let mut map = self.sum_runs(ensemble, |run| {
            let mut density = self.density(run);
            for x in density.data_mut() {
                *x = if *x > threshold { 1.0 } else { 0.0 };
            }
            density
        });
        map.scale_down(ensemble.len());
        map
    }

    /// Per-step fraction of runs with at least one active particle in each cell, `steps + 1`
    /// maps
    pub fn time_probability(&self, ensemble: &Ensemble) -> Vec<GridMap> {
        debug!(
            "Computing time probability over {} runs and {} steps",
            ensemble.len(),
            ensemble.n_steps()
        );
        (0..=ensemble.n_steps())
            .into_par_iter()
            .map(|step| {
                let mut map = self.grid.zeros();
                for run in ensemble.runs() {
                    accumulate(&mut map, &presence(self.step_counts(run, step)));
                }
                map.scale_down(ensemble.len());
                map
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator() -> Aggregator {
        Aggregator::from_config(&DomainConfig {
            lon_min: 0.0,
            lon_max: 4.0,
            lat_min: 0.0,
            lat_max: 2.0,
            nlon: 4,
            nlat: 2,
        })
    }

    /// One step, three particles; two share cell (0, 0), one in (1, 3), `extra` decides a
    /// fourth active particle in (1, 1)
    fn run(seed: u64, extra: bool) -> Trajectory {
        Trajectory::from_arrays(
            seed,
            1,
            4,
            vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 3.5, 1.5],
            vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 1.5, 1.5],
            vec![false, false, false, false, true, true, true, extra],
        )
        .unwrap()
    }

    #[test]
    fn test_density_normalized_to_peak() {
        let density = aggregator().density(&run(0, false));
        assert_eq!(density.get(0, 0), Some(1.0));
        assert_eq!(density.get(1, 3), Some(0.5));
        assert_eq!(density.max(), 1.0);
    }

    #[test]
    fn test_time_density_is_raw_counts() {
        let maps = aggregator().time_density(&run(0, true));
        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0].sum(), 0.0);
        assert_eq!(maps[1].get(0, 0), Some(2.0));
        assert_eq!(maps[1].sum(), 4.0);
    }

    #[test]
    fn test_probability_and_exceedance_fractions() {
        let ensemble = Ensemble::new(1, vec![run(0, false), run(1, true)]).unwrap();
        let agg = aggregator();

        let prob = agg.probability(&ensemble);
        assert_eq!(prob.get(0, 0), Some(1.0));
        assert_eq!(prob.get(1, 1), Some(0.5));
        assert_eq!(prob.get(0, 3), Some(0.0));

        let exceed = agg.threshold_exceedance(&ensemble, 0.5);
        assert_eq!(exceed.get(0, 0), Some(1.0));
        assert_eq!(exceed.get(1, 3), Some(0.0));
    }

    #[test]
    fn test_mean_concentration_peak_is_one() {
        let ensemble = Ensemble::new(1, vec![run(0, false), run(1, true)]).unwrap();
        let conc = aggregator().mean_concentration(&ensemble);
        assert_eq!(conc.get(0, 0), Some(1.0));
        assert_eq!(conc.get(1, 1), Some(0.25));
    }

    #[test]
    fn test_zero_runs_give_zero_maps() {
        let ensemble = Ensemble::new(3, Vec::new()).unwrap();
        let agg = aggregator();
        assert_eq!(agg.probability(&ensemble).max(), 0.0);
        assert_eq!(agg.mean_concentration(&ensemble).max(), 0.0);
        let maps = agg.time_probability(&ensemble);
        assert_eq!(maps.len(), 4);
        assert!(maps.iter().all(|m| m.max() == 0.0 && m.shape() == (2, 4)));
    }
}
