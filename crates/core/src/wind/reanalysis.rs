//! Reanalysis wind field
//!
//! Interpolates a [`WindDataset`] bilinearly in space and linearly in time, converts m/s to
//! °/h and adds turbulence proportional to the local wind speed.
//!
//! Per-timestamp interpolators are cached behind a mutex with a bounded FIFO. The cache only
//! saves rebuilding work; evicted entries are rebuilt on demand with identical values.

use crate::config::DomainConfig;
use crate::core_types::units::MetersPerSecond;
use crate::error::WindError;
use crate::wind::dataset::{Component, CoverageReport, WindDataset};
use crate::wind::{check_lengths, WindField, WindSample};
use rand::Rng;
use rand_distr::StandardNormal;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Interpolators kept per field before the oldest is evicted
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

/// Floor on the wind speed used to size turbulence (°/h), so calm air still disperses
const MIN_TURBULENT_SPEED: f64 = 0.005;

/// Smallest time bracket used when computing α (h)
const MIN_BRACKET_HOURS: f64 = 1e-10;

/// Bilinear interpolator over one `(lat, lon)` slab
#[derive(Debug, Clone, PartialEq)]
pub struct BilinearInterpolator {
    lats: Arc<[f64]>,
    lons: Arc<[f64]>,
    values: Vec<f64>,
    wrap_lon: bool,
}

/// Bracketing indices and fractional offset along an increasing axis
fn locate(axis: &[f64], x: f64) -> (usize, f64) {
    let i = axis
        .partition_point(|&a| a <= x)
        .saturating_sub(1)
        .min(axis.len() - 2);
    let frac = (x - axis[i]) / (axis[i + 1] - axis[i]);
    (i, frac)
}

impl BilinearInterpolator {
    /// Interpolator for one component at time index `t_idx`
    pub fn new(dataset: &WindDataset, t_idx: usize, component: Component) -> Self {
        Self {
            lats: dataset.lat_axis(),
            lons: dataset.lon_axis(),
            values: dataset.slab(t_idx, component).to_vec(),
            wrap_lon: dataset.is_global(),
        }
    }

    /// Value at `(lat, lon)`, with `lon` already in the dataset's convention.
    ///
    /// Returns `None` outside the mesh. On a global mesh the gap between the last and the
    /// first longitude is interpolated across the seam. NaN samples propagate.
    pub fn evaluate(&self, lat: f64, lon: f64) -> Option<f64> {
        let nlat = self.lats.len();
        let nlon = self.lons.len();
        if !lon.is_finite() || !(self.lats[0]..=self.lats[nlat - 1]).contains(&lat) {
            return None;
        }

        let (west, east, fx) = if (self.lons[0]..=self.lons[nlon - 1]).contains(&lon) {
            let (i, fx) = locate(&self.lons, lon);
            (i, i + 1, fx)
        } else if self.wrap_lon {
            let first = self.lons[0] + 360.0;
            let last = self.lons[nlon - 1];
            let shifted = if lon < self.lons[0] { lon + 360.0 } else { lon };
            (nlon - 1, 0, (shifted - last) / (first - last))
        } else {
            return None;
        };

        let (j, fy) = locate(&self.lats, lat);
        let at = |row: usize, col: usize| self.values[row * nlon + col];
        let south = at(j, west) * (1.0 - fx) + at(j, east) * fx;
        let north = at(j + 1, west) * (1.0 - fx) + at(j + 1, east) * fx;
        Some(south * (1.0 - fy) + north * fy)
    }
}

/// Bounded cache of interpolators keyed by `(t_idx, component)`, oldest evicted first
#[derive(Debug)]
struct InterpolatorCache {
    entries: FxHashMap<(usize, Component), Arc<BilinearInterpolator>>,
    order: VecDeque<(usize, Component)>,
    capacity: usize,
}

impl InterpolatorCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    fn get_or_build(
        &mut self,
        dataset: &WindDataset,
        t_idx: usize,
        component: Component,
    ) -> Arc<BilinearInterpolator> {
        let key = (t_idx, component);
        if let Some(interp) = self.entries.get(&key) {
            return Arc::clone(interp);
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!("Evicted interpolator t_idx={} {:?}", oldest.0, oldest.1);
        }
        let interp = Arc::new(BilinearInterpolator::new(dataset, t_idx, component));
        self.entries.insert(key, Arc::clone(&interp));
        self.order.push_back(key);
        interp
    }
}

/// Linear blend that is exact at both ends
#[inline]
fn blend(a: f64, b: f64, alpha: f64) -> f64 {
    if alpha <= 0.0 {
        a
    } else if alpha >= 1.0 {
        b
    } else {
        a + alpha * (b - a)
    }
}

/// Wind field interpolated from a reanalysis dataset
#[derive(Debug)]
pub struct ReanalysisField {
    dataset: Arc<WindDataset>,
    turbulence: f64,
    cache: Mutex<InterpolatorCache>,
}

impl ReanalysisField {
    /// Field over `dataset` with turbulence coefficient τ
    pub fn new(dataset: Arc<WindDataset>, turbulence: f64) -> Self {
        Self::with_cache_capacity(dataset, turbulence, DEFAULT_CACHE_CAPACITY)
    }

    /// Field with a custom interpolator cache bound (at least 1)
    pub fn with_cache_capacity(
        dataset: Arc<WindDataset>,
        turbulence: f64,
        capacity: usize,
    ) -> Self {
        Self {
            dataset,
            turbulence,
            cache: Mutex::new(InterpolatorCache::new(capacity)),
        }
    }

    /// Underlying dataset
    pub fn dataset(&self) -> &WindDataset {
        &self.dataset
    }

    /// Turbulence coefficient τ
    pub fn turbulence(&self) -> f64 {
        self.turbulence
    }

    /// Compare dataset coverage with the domain and horizon, warning about any gap
    pub fn check_coverage(&self, domain: &DomainConfig, horizon_hours: f64) -> CoverageReport {
        let report = self.dataset.coverage(domain, horizon_hours);
        if report.spatial_gap {
            warn!(
                "Wind dataset does not cover the whole simulation domain; particles outside it get zero wind"
            );
        }
        if report.temporal_gap {
            let hours = self.dataset.hours();
            warn!(
                "Wind dataset covers t [{:.0} -> {:.0}] h but the simulation runs to {:.0} h; uncovered steps get zero wind",
                hours[0],
                hours[hours.len() - 1],
                horizon_hours
            );
        }
        report
    }

    /// Number of interpolators currently cached
    ///
    /// # Errors
    /// Returns [`WindError::LockPoisoned`] if the cache lock was poisoned.
    pub fn cached_interpolators(&self) -> Result<usize, WindError> {
        self.cache
            .lock()
            .map(|cache| cache.entries.len())
            .map_err(|_| WindError::LockPoisoned("interpolator cache"))
    }

    /// Bracketing time index and α for `t_hours`, or `None` outside the time axis
    fn bracket(&self, t_hours: f64) -> Option<(usize, f64)> {
        let hours = self.dataset.hours();
        let n = hours.len();
        if !(hours[0]..=hours[n - 1]).contains(&t_hours) {
            return None;
        }
        let idx = hours
            .partition_point(|&h| h < t_hours)
            .saturating_sub(1)
            .min(n - 2);
        let span = (hours[idx + 1] - hours[idx]).max(MIN_BRACKET_HOURS);
        Some((idx, ((t_hours - hours[idx]) / span).clamp(0.0, 1.0)))
    }

    /// Mean wind in m/s, with degradation counters
    fn mean_wind(
        &self,
        lons: &[f64],
        lats: &[f64],
        t_hours: f64,
    ) -> Result<(Vec<f64>, Vec<f64>, usize, usize), WindError> {
        let n = lons.len();
        let Some((idx, alpha)) = self.bracket(t_hours) else {
            return Ok((vec![0.0; n], vec![0.0; n], n, 0));
        };

        let (u0, u1, v0, v1) = {
            let mut cache = self
                .cache
                .lock()
                .map_err(|_| WindError::LockPoisoned("interpolator cache"))?;
            (
                cache.get_or_build(&self.dataset, idx, Component::Zonal),
                cache.get_or_build(&self.dataset, idx + 1, Component::Zonal),
                cache.get_or_build(&self.dataset, idx, Component::Meridional),
                cache.get_or_build(&self.dataset, idx + 1, Component::Meridional),
            )
        };

        let convention = self.dataset.convention();
        let mut u = Vec::with_capacity(n);
        let mut v = Vec::with_capacity(n);
        let (mut out_of_coverage, mut non_finite) = (0, 0);
        for (&lon, &lat) in lons.iter().zip(lats) {
            let lon = convention.normalize(lon);
            let sample = u0
                .evaluate(lat, lon)
                .zip(u1.evaluate(lat, lon))
                .zip(v0.evaluate(lat, lon).zip(v1.evaluate(lat, lon)));
            let Some(((ua, ub), (va, vb))) = sample else {
                out_of_coverage += 1;
                u.push(0.0);
                v.push(0.0);
                continue;
            };
            let (um, vm) = (blend(ua, ub, alpha), blend(va, vb, alpha));
            if um.is_finite() && vm.is_finite() {
                u.push(um);
                v.push(vm);
            } else {
                non_finite += 1;
                u.push(0.0);
                v.push(0.0);
            }
        }
        Ok((u, v, out_of_coverage, non_finite))
    }
}

impl WindField for ReanalysisField {
    fn query<R: Rng>(
        &self,
        lons: &[f64],
        lats: &[f64],
        t_hours: f64,
        rng: &mut R,
    ) -> Result<WindSample, WindError> {
        check_lengths(lons, lats)?;
        let (u_ms, v_ms, out_of_coverage, non_finite) = self.mean_wind(lons, lats, t_hours)?;

        let mut u: Vec<f64> = u_ms
            .iter()
            .zip(lats)
            .map(|(&u, &lat)| MetersPerSecond::new(u).to_zonal_degrees_per_hour(lat).value())
            .collect();
        let mut v: Vec<f64> = v_ms
            .iter()
            .map(|&v| MetersPerSecond::new(v).to_meridional_degrees_per_hour().value())
            .collect();

        if self.turbulence > 0.0 {
            let sigma: Vec<f64> = u
                .iter()
                .zip(&v)
                .map(|(u, v)| self.turbulence * u.hypot(*v).max(MIN_TURBULENT_SPEED))
                .collect();
            for (u, s) in u.iter_mut().zip(&sigma) {
                *u += s * rng.sample::<f64, _>(StandardNormal);
            }
            for (v, s) in v.iter_mut().zip(&sigma) {
                *v += s * rng.sample::<f64, _>(StandardNormal);
            }
        }

        if out_of_coverage > 0 {
            warn!(
                "{} of {} positions outside wind coverage at t={:.1} h; zero wind applied",
                out_of_coverage,
                lons.len(),
                t_hours
            );
        }
        if non_finite > 0 {
            warn!(
                "{} non-finite interpolated wind values at t={:.1} h; zero wind applied",
                non_finite, t_hours
            );
        }

        Ok(WindSample {
            u,
            v,
            out_of_coverage,
            non_finite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// 2x2 mesh over [40, 60] x [0, 10], u = 10 m/s at t=0 and 20 m/s at t=1, v = 0
    fn uniform_dataset() -> Arc<WindDataset> {
        let u = [vec![10.0; 4], vec![20.0; 4]].concat();
        Arc::new(
            WindDataset::new(vec![40.0, 60.0], vec![0.0, 10.0], vec![0.0, 1.0], u, vec![0.0; 8])
                .unwrap(),
        )
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_bilinear_interpolation_corners_and_center() {
        let ds = WindDataset::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0; 8],
        )
        .unwrap();
        let interp = BilinearInterpolator::new(&ds, 0, Component::Zonal);
        assert_eq!(interp.evaluate(0.0, 0.0), Some(0.0));
        assert_eq!(interp.evaluate(1.0, 1.0), Some(3.0));
        assert_relative_eq!(interp.evaluate(0.5, 0.5).unwrap(), 1.5);
        assert_eq!(interp.evaluate(1.5, 0.5), None);
        assert_eq!(interp.evaluate(0.5, -0.1), None);
    }

    #[test]
    fn test_global_mesh_interpolates_across_seam() {
        let lons = vec![0.0, 90.0, 180.0, 270.0];
        let row = vec![0.0, 0.0, 0.0, 8.0];
        let u = [row.clone(), row.clone(), row.clone(), row].concat();
        let ds = WindDataset::new(vec![0.0, 1.0], lons, vec![0.0, 1.0], u, vec![0.0; 16]).unwrap();
        let interp = BilinearInterpolator::new(&ds, 0, Component::Zonal);
        // halfway between 270 (8) and 360 (0)
        assert_relative_eq!(interp.evaluate(0.5, 315.0).unwrap(), 4.0);
    }

    #[test]
    fn test_time_edges_are_exact() {
        let field = ReanalysisField::new(uniform_dataset(), 0.0);
        let expected_lo = MetersPerSecond::new(10.0).to_zonal_degrees_per_hour(50.0).value();
        let expected_hi = MetersPerSecond::new(20.0).to_zonal_degrees_per_hour(50.0).value();

        let lo = field.query(&[5.0], &[50.0], 0.0, &mut rng()).unwrap();
        let hi = field.query(&[5.0], &[50.0], 1.0, &mut rng()).unwrap();
        let mid = field.query(&[5.0], &[50.0], 0.5, &mut rng()).unwrap();
        assert_eq!(lo.u[0], expected_lo);
        assert_eq!(hi.u[0], expected_hi);
        assert_relative_eq!(mid.u[0], (expected_lo + expected_hi) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unit_conversion_at_equator_and_sixty_north() {
        let u = vec![10.0; 8];
        let ds = WindDataset::new(
            vec![-10.0, 70.0],
            vec![0.0, 10.0],
            vec![0.0, 1.0],
            u,
            vec![0.0; 8],
        )
        .unwrap();
        let field = ReanalysisField::new(Arc::new(ds), 0.0);
        let sample = field.query(&[5.0, 5.0], &[0.0, 60.0], 0.0, &mut rng()).unwrap();
        assert_relative_eq!(sample.u[0], 0.324_324, epsilon = 1e-4);
        assert_relative_eq!(sample.u[1], 0.648_649, epsilon = 1e-4);
    }

    #[test]
    fn test_out_of_coverage_gets_zero_wind_and_is_counted() {
        let field = ReanalysisField::new(uniform_dataset(), 0.0);
        let sample = field
            .query(&[5.0, 50.0, 5.0], &[50.0, 50.0, 80.0], 0.0, &mut rng())
            .unwrap();
        assert_eq!(sample.out_of_coverage, 2);
        assert_eq!(sample.u[1], 0.0);
        assert_eq!(sample.u[2], 0.0);
        assert!(sample.u[0] > 0.0);

        let late = field.query(&[5.0, 5.0], &[50.0, 50.0], 5.0, &mut rng()).unwrap();
        assert_eq!(late.out_of_coverage, 2);
        assert!(late.u.iter().all(|&u| u == 0.0));
    }

    #[test]
    fn test_nan_samples_fall_back_to_zero() {
        let mut u = vec![10.0; 8];
        u[0] = f64::NAN;
        let ds = WindDataset::new(
            vec![40.0, 60.0],
            vec![0.0, 10.0],
            vec![0.0, 1.0],
            u,
            vec![0.0; 8],
        )
        .unwrap();
        let field = ReanalysisField::new(Arc::new(ds), 0.0);
        let sample = field.query(&[1.0], &[41.0], 0.0, &mut rng()).unwrap();
        assert_eq!(sample.non_finite, 1);
        assert_eq!(sample.u[0], 0.0);
        assert!(sample.is_degraded());
    }

    #[test]
    fn test_turbulence_scales_with_wind_speed() {
        let field = ReanalysisField::new(uniform_dataset(), 0.25);
        let n = 4000;
        let lons = vec![5.0; n];
        let lats = vec![50.0; n];
        let sample = field.query(&lons, &lats, 0.0, &mut rng()).unwrap();
        let mean_u = MetersPerSecond::new(10.0).to_zonal_degrees_per_hour(50.0).value();
        let var = sample.v.iter().map(|v| v * v).sum::<f64>() / n as f64;
        assert_relative_eq!(var.sqrt(), 0.25 * mean_u, max_relative = 0.1);
    }

    #[test]
    fn test_cache_is_bounded() {
        let hours: Vec<f64> = (0..10).map(f64::from).collect();
        let ds = WindDataset::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            hours,
            vec![1.0; 40],
            vec![0.0; 40],
        )
        .unwrap();
        let field = ReanalysisField::with_cache_capacity(Arc::new(ds), 0.0, 4);
        for t in 0..9 {
            field.query(&[0.5], &[0.5], f64::from(t) + 0.5, &mut rng()).unwrap();
            assert!(field.cached_interpolators().unwrap() <= 4);
        }
        assert_eq!(field.cached_interpolators().unwrap(), 4);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let field = ReanalysisField::new(uniform_dataset(), 0.0);
        let err = field.query(&[1.0, 2.0], &[50.0], 0.0, &mut rng()).unwrap_err();
        assert_eq!(err, WindError::LengthMismatch { lons: 2, lats: 1 });
    }
}
