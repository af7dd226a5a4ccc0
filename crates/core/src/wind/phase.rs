//! Historical phase wind model
//!
//! Spatially uniform wind that changes by phases over time. Every queried position receives
//! the same mean vector, perturbed independently per particle. At the start of each phase
//! (except the first) the mean vector and the turbulence are blended from the previous phase
//! over a fixed transition window so the plume never turns abruptly.
//!
//! The default table reproduces the wind shifts that carried the Chernobyl cloud over
//! Scandinavia, then Poland and the Baltic, the Balkans, central and western Europe between
//! 26 April and mid-May 1986.

use crate::core_types::Vec2;
use crate::error::{ConfigError, WindError};
use crate::wind::{check_lengths, WindField, WindSample};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Tolerance when checking that consecutive phases share a boundary (h)
const BOUNDARY_TOLERANCE: f64 = 1e-9;

/// One time-bounded wind regime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindPhase {
    /// Phase start (h since release, inclusive)
    pub start_hour: f64,
    /// Phase end (h since release, exclusive)
    pub end_hour: f64,
    /// Mean eastward drift (°/h)
    pub mean_u: f64,
    /// Mean northward drift (°/h)
    pub mean_v: f64,
    /// Turbulence standard deviation along longitude (°/h)
    pub u_std: f64,
    /// Turbulence standard deviation along latitude (°/h)
    pub v_std: f64,
}

impl WindPhase {
    /// Phase with the same turbulence on both axes
    pub fn isotropic(
        start_hour: f64,
        end_hour: f64,
        mean_u: f64,
        mean_v: f64,
        turbulence_std: f64,
    ) -> Self {
        Self {
            start_hour,
            end_hour,
            mean_u,
            mean_v,
            u_std: turbulence_std,
            v_std: turbulence_std,
        }
    }

    fn mean(&self) -> Vec2 {
        Vec2::new(self.mean_u, self.mean_v)
    }

    fn std(&self) -> Vec2 {
        Vec2::new(self.u_std, self.v_std)
    }

    fn contains(&self, t_hours: f64) -> bool {
        (self.start_hour..self.end_hour).contains(&t_hours)
    }
}

/// Simplified historical wind of the first three weeks after the Chernobyl accident
pub fn chernobyl_1986() -> Vec<WindPhase> {
    vec![
        // 26-27 April: N-NW towards Belarus and Scandinavia
        WindPhase {
            start_hour: 0.0,
            end_hour: 48.0,
            mean_u: -0.04,
            mean_v: 0.18,
            u_std: 0.06,
            v_std: 0.04,
        },
        // 28-29 April: backing west towards Poland and the Baltic
        WindPhase {
            start_hour: 48.0,
            end_hour: 96.0,
            mean_u: -0.15,
            mean_v: 0.06,
            u_std: 0.05,
            v_std: 0.05,
        },
        // 30 April - 2 May: S-SW over Ukraine, Romania, Turkey
        WindPhase {
            start_hour: 96.0,
            end_hour: 168.0,
            mean_u: -0.06,
            mean_v: -0.12,
            u_std: 0.06,
            v_std: 0.05,
        },
        // 3-5 May: west over central Europe, Germany, France
        WindPhase {
            start_hour: 168.0,
            end_hour: 264.0,
            mean_u: -0.18,
            mean_v: 0.02,
            u_std: 0.07,
            v_std: 0.06,
        },
        // 6-10 May: weak and variable
        WindPhase {
            start_hour: 264.0,
            end_hour: 480.0,
            mean_u: -0.05,
            mean_v: 0.03,
            u_std: 0.10,
            v_std: 0.08,
        },
    ]
}

/// Check that phases are ordered, contiguous, start at or before 0 h and reach `horizon_hours`
///
/// # Errors
/// Returns [`ConfigError::PhaseTable`] describing the first defect.
pub fn validate_phase_table(phases: &[WindPhase], horizon_hours: f64) -> Result<(), ConfigError> {
    let (first, last) = match (phases.first(), phases.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ConfigError::PhaseTable("no phases".to_string())),
    };

    for (i, p) in phases.iter().enumerate() {
        let values = [p.start_hour, p.end_hour, p.mean_u, p.mean_v, p.u_std, p.v_std];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::PhaseTable(format!("phase {i} has a non-finite value")));
        }
        if p.start_hour >= p.end_hour {
            return Err(ConfigError::PhaseTable(format!(
                "phase {i} ends ({}) before it starts ({})",
                p.end_hour, p.start_hour
            )));
        }
        if p.u_std < 0.0 || p.v_std < 0.0 {
            return Err(ConfigError::PhaseTable(format!(
                "phase {i} has a negative turbulence standard deviation"
            )));
        }
    }

    for (i, pair) in phases.windows(2).enumerate() {
        let gap = pair[1].start_hour - pair[0].end_hour;
        if gap.abs() > BOUNDARY_TOLERANCE {
            let kind = if gap > 0.0 { "gap" } else { "overlap" };
            return Err(ConfigError::PhaseTable(format!(
                "{kind} between phase {i} (ends {}) and phase {} (starts {})",
                pair[0].end_hour,
                i + 1,
                pair[1].start_hour
            )));
        }
    }

    if first.start_hour > 0.0 {
        return Err(ConfigError::PhaseTable(format!(
            "first phase starts at {} h, after the release",
            first.start_hour
        )));
    }
    if last.end_hour < horizon_hours {
        return Err(ConfigError::PhaseTable(format!(
            "last phase ends at {} h, before the {horizon_hours} h horizon",
            last.end_hour
        )));
    }
    Ok(())
}

/// Spatially uniform, time-segmented wind field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseModel {
    phases: Vec<WindPhase>,
    transition_hours: f64,
}

impl PhaseModel {
    /// Build a phase model from an ordered, contiguous phase table
    ///
    /// # Errors
    /// Returns [`ConfigError::PhaseTable`] if the table is malformed, or
    /// [`ConfigError::Negative`] for a negative transition window.
    pub fn new(phases: Vec<WindPhase>, transition_hours: f64) -> Result<Self, ConfigError> {
        validate_phase_table(&phases, 0.0)?;
        if !transition_hours.is_finite() {
            return Err(ConfigError::NonFinite("transition_hours"));
        }
        if transition_hours < 0.0 {
            return Err(ConfigError::Negative("transition_hours", transition_hours));
        }
        Ok(Self {
            phases,
            transition_hours,
        })
    }

    /// Historical Chernobyl table with the standard 6 h transition
    pub fn chernobyl_1986() -> Self {
        Self {
            phases: chernobyl_1986(),
            transition_hours: 6.0,
        }
    }

    /// Phase table
    pub fn phases(&self) -> &[WindPhase] {
        &self.phases
    }

    /// Index of the phase active at `t_hours`.
    ///
    /// Times before the first phase use the first phase, times past the last use the last.
    fn phase_index(&self, t_hours: f64) -> usize {
        if let Some(i) = self.phases.iter().position(|p| p.contains(t_hours)) {
            return i;
        }
        if self.phases.first().is_some_and(|p| t_hours < p.start_hour) {
            0
        } else {
            self.phases.len() - 1
        }
    }

    /// Mean wind vector and turbulence standard deviations at `t_hours` (°/h)
    pub fn mean_at(&self, t_hours: f64) -> (Vec2, Vec2) {
        let k = self.phase_index(t_hours);
        let phase = &self.phases[k];
        let elapsed = t_hours - phase.start_hour;

        if k > 0 && (0.0..self.transition_hours).contains(&elapsed) {
            let prev = &self.phases[k - 1];
            let w = (elapsed / self.transition_hours).clamp(0.0, 1.0);
            return (prev.mean().lerp(&phase.mean(), w), prev.std().lerp(&phase.std(), w));
        }
        (phase.mean(), phase.std())
    }
}

impl WindField for PhaseModel {
    fn query<R: Rng>(
        &self,
        lons: &[f64],
        lats: &[f64],
        t_hours: f64,
        rng: &mut R,
    ) -> Result<WindSample, WindError> {
        check_lengths(lons, lats)?;
        let n = lons.len();
        let (mean, std) = self.mean_at(t_hours);

        let u = (0..n)
            .map(|_| mean.x + std.x * rng.sample::<f64, _>(StandardNormal))
            .collect();
        let v = (0..n)
            .map(|_| mean.y + std.y * rng.sample::<f64, _>(StandardNormal))
            .collect();

        Ok(WindSample::new(u, v))
    }
}
