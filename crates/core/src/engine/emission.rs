//! Emission schedule
//!
//! Decides how many particles leave the source at each step. Particles are released in column
//! order, so the particles emitted at step `k` occupy a contiguous index range.

use crate::config::SimulationConfig;
use std::ops::Range;

/// Per-step release counts over the emission window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionSchedule {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl EmissionSchedule {
    /// Steps in the emission window.
    ///
    /// A missing or zero duration releases everything at step 0 (one step). Otherwise the
    /// window is `floor(duration / dt)` steps, capped at `n_steps` and at least one.
    pub fn window_steps(duration_h: Option<f64>, dt: f64, n_steps: usize) -> usize {
        match duration_h {
            Some(d) if d > 0.0 && dt > 0.0 => ((d / dt).floor() as usize).min(n_steps).max(1),
            _ => 1,
        }
    }

    /// Build a schedule releasing `n_particles` over the window.
    ///
    /// # Arguments
    ///
    /// * `n_particles` - Total particles to release
    /// * `duration_h` - Emission duration (h), see [`EmissionSchedule::window_steps`]
    /// * `rate` - Particles per step. `None` splits the total evenly, the first
    ///   `n_particles % window` steps taking one extra particle.
    /// * `dt` - Time step (h)
    /// * `n_steps` - Steps in the run
    ///
    /// The counts always sum to `n_particles`. A rate too low to finish inside the window
    /// (rejected by configuration validation) puts the remainder on the last window step.
    pub fn new(
        n_particles: usize,
        duration_h: Option<f64>,
        rate: Option<usize>,
        dt: f64,
        n_steps: usize,
    ) -> Self {
        let window = Self::window_steps(duration_h, dt, n_steps);
        let mut counts = match rate {
            None => {
                let (base, extra) = (n_particles / window, n_particles % window);
                (0..window).map(|i| base + usize::from(i < extra)).collect::<Vec<_>>()
            }
            Some(rate) => {
                let mut remaining = n_particles;
                (0..window)
                    .map(|_| {
                        let n = rate.min(remaining);
                        remaining -= n;
                        n
                    })
                    .collect()
            }
        };
        let released: usize = counts.iter().sum();
        if let Some(last) = counts.last_mut() {
            *last += n_particles - released;
        }

        let offsets = counts
            .iter()
            .scan(0, |acc, &n| {
                let start = *acc;
                *acc += n;
                Some(start)
            })
            .collect();
        Self { counts, offsets }
    }

    /// Schedule described by a configuration
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(
            config.run.n_particles,
            config.source.emission_duration_h,
            config.source.emission_rate,
            config.run.dt,
            config.run.n_steps,
        )
    }

    /// Particles released at `step` (zero outside the window)
    pub fn count_at(&self, step: usize) -> usize {
        self.counts.get(step).copied().unwrap_or(0)
    }

    /// Particle indices released at `step`
    pub fn range_at(&self, step: usize) -> Range<usize> {
        match (self.offsets.get(step), self.counts.get(step)) {
            (Some(&start), Some(&n)) => start..start + n,
            _ => 0..0,
        }
    }

    /// Total particles released
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Steps in the emission window
    pub fn window(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_steps() {
        assert_eq!(EmissionSchedule::window_steps(None, 1.0, 480), 1);
        assert_eq!(EmissionSchedule::window_steps(Some(0.0), 1.0, 480), 1);
        assert_eq!(EmissionSchedule::window_steps(Some(240.0), 1.0, 480), 240);
        assert_eq!(EmissionSchedule::window_steps(Some(10.5), 2.0, 480), 5);
        assert_eq!(EmissionSchedule::window_steps(Some(0.5), 1.0, 480), 1);
        assert_eq!(EmissionSchedule::window_steps(Some(100.0), 1.0, 20), 20);
    }

    #[test]
    fn test_even_split_conserves_particles() {
        let schedule = EmissionSchedule::new(8000, Some(240.0), None, 1.0, 480);
        assert_eq!(schedule.window(), 240);
        assert_eq!(schedule.total(), 8000);
        // 8000 = 33 * 240 + 80
        assert_eq!(schedule.count_at(0), 34);
        assert_eq!(schedule.count_at(79), 34);
        assert_eq!(schedule.count_at(80), 33);
        assert_eq!(schedule.count_at(240), 0);
    }

    #[test]
    fn test_ranges_are_contiguous() {
        let schedule = EmissionSchedule::new(10, Some(3.0), None, 1.0, 5);
        assert_eq!(schedule.range_at(0), 0..4);
        assert_eq!(schedule.range_at(1), 4..7);
        assert_eq!(schedule.range_at(2), 7..10);
        assert!(schedule.range_at(3).is_empty());
    }

    #[test]
    fn test_rate_front_loads_release() {
        let schedule = EmissionSchedule::new(10, Some(5.0), Some(4), 1.0, 10);
        assert_eq!(
            (0..5).map(|s| schedule.count_at(s)).collect::<Vec<_>>(),
            vec![4, 4, 2, 0, 0]
        );
    }

    #[test]
    fn test_low_rate_remainder_goes_to_last_step() {
        let schedule = EmissionSchedule::new(10, Some(2.0), Some(3), 1.0, 10);
        assert_eq!(schedule.count_at(0), 3);
        assert_eq!(schedule.count_at(1), 7);
        assert_eq!(schedule.total(), 10);
    }

    #[test]
    fn test_zero_particles() {
        let schedule = EmissionSchedule::new(0, Some(24.0), None, 1.0, 48);
        assert_eq!(schedule.total(), 0);
        assert!(schedule.range_at(0).is_empty());
    }
}
