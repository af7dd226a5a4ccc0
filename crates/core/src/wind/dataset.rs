//! Gridded reanalysis wind dataset
//!
//! Holds zonal (`u`) and meridional (`v`) wind in m/s on a regular latitude/longitude mesh at
//! a fixed hourly cadence, stored `(time, lat, lon)` row-major. On construction latitudes are
//! normalized to increasing order and the longitude convention (`[-180, 180)` or `[0, 360)`)
//! is detected so queries can be mapped onto the dataset's own convention.
//!
//! Datasets are large and immutable once loaded. [`load_shared`] keeps one copy per file for
//! the lifetime of the process.

use crate::config::DomainConfig;
use crate::error::WindError;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use tracing::{info, warn};

/// Longitude convention of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LonConvention {
    /// Longitudes in `[-180, 180)`
    Signed,
    /// Longitudes in `[0, 360)`
    Unsigned,
}

impl LonConvention {
    /// Map any longitude onto this convention
    #[inline]
    pub fn normalize(self, lon: f64) -> f64 {
        match self {
            LonConvention::Signed => (lon + 180.0).rem_euclid(360.0) - 180.0,
            LonConvention::Unsigned => lon.rem_euclid(360.0),
        }
    }
}

/// Wind component selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Eastward (`u`)
    Zonal,
    /// Northward (`v`)
    Meridional,
}

/// Result of comparing dataset coverage with the simulation domain and horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoverageReport {
    /// Part of the domain lies outside the dataset mesh
    pub spatial_gap: bool,
    /// Part of the horizon lies outside the dataset timestamps
    pub temporal_gap: bool,
}

impl CoverageReport {
    /// True when the dataset covers the whole domain and horizon
    pub fn is_complete(&self) -> bool {
        !self.spatial_gap && !self.temporal_gap
    }
}

/// Immutable reanalysis wind time series
#[derive(Debug, Clone, PartialEq)]
pub struct WindDataset {
    lats: Arc<[f64]>,
    lons: Arc<[f64]>,
    hours: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
    convention: LonConvention,
    global_lon: bool,
}

fn strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

fn strictly_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] > w[1])
}

impl WindDataset {
    /// Build a dataset from raw arrays.
    ///
    /// `u` and `v` are `(time, lat, lon)` row-major in m/s, matching the axis order given.
    /// Decreasing latitudes are flipped to increasing order together with the data rows.
    ///
    /// # Errors
    /// Returns [`WindError::MalformedDataset`] for axes with fewer than two samples,
    /// non-monotonic or non-finite axes, or data arrays of the wrong length.
    pub fn new(
        lats: Vec<f64>,
        lons: Vec<f64>,
        hours: Vec<f64>,
        mut u: Vec<f64>,
        mut v: Vec<f64>,
    ) -> Result<Self, WindError> {
        for (name, axis) in [("latitude", &lats), ("longitude", &lons), ("time", &hours)] {
            if axis.len() < 2 {
                return Err(WindError::MalformedDataset(format!(
                    "{name} axis needs at least 2 samples, got {}",
                    axis.len()
                )));
            }
            if axis.iter().any(|x| !x.is_finite()) {
                return Err(WindError::MalformedDataset(format!(
                    "{name} axis contains non-finite values"
                )));
            }
        }
        if !strictly_increasing(&lons) {
            return Err(WindError::MalformedDataset(
                "longitude axis must be strictly increasing".to_string(),
            ));
        }
        if !strictly_increasing(&hours) {
            return Err(WindError::MalformedDataset(
                "time axis must be strictly increasing".to_string(),
            ));
        }

        let (nt, nlat, nlon) = (hours.len(), lats.len(), lons.len());
        let expected = nt * nlat * nlon;
        for (name, data) in [("u", &u), ("v", &v)] {
            if data.len() != expected {
                return Err(WindError::MalformedDataset(format!(
                    "{name} has {} values, expected {nt}x{nlat}x{nlon} = {expected}",
                    data.len()
                )));
            }
        }

        let mut lats = lats;
        if strictly_decreasing(&lats) {
            lats.reverse();
            for data in [&mut u, &mut v] {
                for slab in data.chunks_exact_mut(nlat * nlon) {
                    for row in 0..nlat / 2 {
                        let (top, bottom) = slab.split_at_mut((nlat - 1 - row) * nlon);
                        top[row * nlon..(row + 1) * nlon].swap_with_slice(&mut bottom[..nlon]);
                    }
                }
            }
        } else if !strictly_increasing(&lats) {
            return Err(WindError::MalformedDataset(
                "latitude axis must be monotonic".to_string(),
            ));
        }

        let convention = if lons[nlon - 1] > 180.0 {
            LonConvention::Unsigned
        } else {
            LonConvention::Signed
        };
        let spacing = lons[nlon - 1] - lons[nlon - 2];
        let global_lon = lons[nlon - 1] - lons[0] + spacing >= 360.0 - 1e-6;

        Ok(Self {
            lats: lats.into(),
            lons: lons.into(),
            hours,
            u,
            v,
            convention,
            global_lon,
        })
    }

    /// Parse a JSON dataset.
    ///
    /// Axes are `latitude`/`longitude`/`time_hours` (or `lat`/`lon`/`time`). Wind variables
    /// are accepted as `u`/`v` or `u_component_of_wind`/`v_component_of_wind`, each a nested
    /// `[time][lat][lon]` array; `null` marks a missing value.
    ///
    /// # Errors
    /// Returns [`WindError::ParseFailed`] for invalid JSON and
    /// [`WindError::MalformedDataset`] for missing variables or ragged arrays.
    pub fn from_json_str(json: &str) -> Result<Self, WindError> {
        let raw: RawWindDataset =
            serde_json::from_str(json).map_err(|e| WindError::ParseFailed(e.to_string()))?;
        raw.into_dataset()
    }

    /// Read and parse a JSON dataset file
    ///
    /// # Errors
    /// Returns [`WindError::LoadFailed`] if the file cannot be read, otherwise as
    /// [`WindDataset::from_json_str`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, WindError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| WindError::LoadFailed(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&contents)
    }

    /// Latitudes, increasing
    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    /// Longitudes, increasing
    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub(crate) fn lat_axis(&self) -> Arc<[f64]> {
        Arc::clone(&self.lats)
    }

    pub(crate) fn lon_axis(&self) -> Arc<[f64]> {
        Arc::clone(&self.lons)
    }

    /// Timestamps (h since release), increasing
    pub fn hours(&self) -> &[f64] {
        &self.hours
    }

    /// Detected longitude convention
    pub fn convention(&self) -> LonConvention {
        self.convention
    }

    /// True when the longitudes wrap around the full circle
    pub fn is_global(&self) -> bool {
        self.global_lon
    }

    /// One `(lat, lon)` slab of a component at time index `t_idx`
    pub fn slab(&self, t_idx: usize, component: Component) -> &[f64] {
        let size = self.lats.len() * self.lons.len();
        let data = match component {
            Component::Zonal => &self.u,
            Component::Meridional => &self.v,
        };
        &data[t_idx * size..(t_idx + 1) * size]
    }

    /// Compare coverage with a domain and a horizon starting at 0 h
    pub fn coverage(&self, domain: &DomainConfig, horizon_hours: f64) -> CoverageReport {
        let (lat_lo, lat_hi) = (self.lats[0], self.lats[self.lats.len() - 1]);
        let mut spatial_gap = lat_lo > domain.lat_min || lat_hi < domain.lat_max;

        if !self.global_lon {
            let (lon_lo, lon_hi) = (self.lons[0], self.lons[self.lons.len() - 1]);
            let west = self.convention.normalize(domain.lon_min);
            let east = self.convention.normalize(domain.lon_max);
            spatial_gap |=
                domain.lon_span() >= 360.0 || west > east || west < lon_lo || east > lon_hi;
        }

        let (t_lo, t_hi) = (self.hours[0], self.hours[self.hours.len() - 1]);
        CoverageReport {
            spatial_gap,
            temporal_gap: t_lo > 0.0 || t_hi < horizon_hours,
        }
    }
}

type NestedField = Vec<Vec<Vec<Option<f64>>>>;

#[derive(Deserialize)]
struct RawWindDataset {
    #[serde(alias = "lat")]
    latitude: Vec<f64>,
    #[serde(alias = "lon")]
    longitude: Vec<f64>,
    #[serde(alias = "time")]
    time_hours: Vec<f64>,
    #[serde(default, alias = "u_component_of_wind")]
    u: Option<NestedField>,
    #[serde(default, alias = "v_component_of_wind")]
    v: Option<NestedField>,
}

impl RawWindDataset {
    fn into_dataset(self) -> Result<WindDataset, WindError> {
        let (Some(u), Some(v)) = (self.u, self.v) else {
            return Err(WindError::MalformedDataset(
                "wind variables not found (expected u/v or u_component_of_wind/v_component_of_wind)"
                    .to_string(),
            ));
        };
        let shape = (self.time_hours.len(), self.latitude.len(), self.longitude.len());
        let u = flatten(u, shape, "u")?;
        let v = flatten(v, shape, "v")?;
        WindDataset::new(self.latitude, self.longitude, self.time_hours, u, v)
    }
}

/// Flatten `[time][lat][lon]` into row-major order, mapping missing values to NaN
fn flatten(
    nested: NestedField,
    (nt, nlat, nlon): (usize, usize, usize),
    name: &str,
) -> Result<Vec<f64>, WindError> {
    let ragged = || {
        WindError::MalformedDataset(format!("{name} does not match shape {nt}x{nlat}x{nlon}"))
    };
    if nested.len() != nt {
        return Err(ragged());
    }
    let mut flat = Vec::with_capacity(nt * nlat * nlon);
    for slab in nested {
        if slab.len() != nlat {
            return Err(ragged());
        }
        for row in slab {
            if row.len() != nlon {
                return Err(ragged());
            }
            flat.extend(row.into_iter().map(|x| x.unwrap_or(f64::NAN)));
        }
    }
    Ok(flat)
}

static SHARED_DATASETS: LazyLock<Mutex<FxHashMap<PathBuf, Arc<WindDataset>>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

/// Load a dataset file once per process and share it.
///
/// The cache lock is held during the load, so concurrent callers asking for the same file
/// wait for the first load instead of reading it twice.
///
/// # Errors
/// Returns [`WindError::LockPoisoned`] if a previous load panicked, otherwise as
/// [`WindDataset::from_json_file`].
pub fn load_shared<P: AsRef<Path>>(path: P) -> Result<Arc<WindDataset>, WindError> {
    let path = path.as_ref();
    let mut cache = SHARED_DATASETS
        .lock()
        .map_err(|_| WindError::LockPoisoned("dataset cache"))?;
    if let Some(dataset) = cache.get(path) {
        return Ok(Arc::clone(dataset));
    }

    let dataset = Arc::new(WindDataset::from_json_file(path)?);
    let (lats, lons, hours) = (dataset.lats(), dataset.lons(), dataset.hours());
    info!(
        "Loaded wind dataset {}: {} time steps, lat [{:.1} -> {:.1}], lon [{:.1} -> {:.1}], t [{:.0} -> {:.0}] h",
        path.display(),
        hours.len(),
        lats[0],
        lats[lats.len() - 1],
        lons[0],
        lons[lons.len() - 1],
        hours[0],
        hours[hours.len() - 1]
    );
    if dataset.slab(0, Component::Zonal).iter().any(|x| x.is_nan()) {
        warn!("Wind dataset {} contains missing values in its first time step", path.display());
    }
    cache.insert(path.to_path_buf(), Arc::clone(&dataset));
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_dataset(lats: Vec<f64>) -> WindDataset {
        // 2 times x 3 lats x 2 lons, u encodes (t, row, col)
        let u: Vec<f64> = (0..12).map(f64::from).collect();
        let v = vec![0.0; 12];
        WindDataset::new(lats, vec![0.0, 1.0], vec![0.0, 1.0], u, v).unwrap()
    }

    #[test]
    fn test_decreasing_latitudes_are_flipped() {
        let ds = small_dataset(vec![72.0, 50.0, 33.0]);
        assert_eq!(ds.lats(), &[33.0, 50.0, 72.0]);
        assert_eq!(ds.slab(0, Component::Zonal), &[4.0, 5.0, 2.0, 3.0, 0.0, 1.0]);
        assert_eq!(ds.slab(1, Component::Zonal), &[10.0, 11.0, 8.0, 9.0, 6.0, 7.0]);
    }

    #[test]
    fn test_increasing_latitudes_kept() {
        let ds = small_dataset(vec![33.0, 50.0, 72.0]);
        assert_eq!(ds.slab(0, Component::Zonal), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_non_monotonic_latitudes_rejected() {
        let err = WindDataset::new(
            vec![33.0, 72.0, 50.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0; 12],
            vec![0.0; 12],
        )
        .unwrap_err();
        assert!(matches!(err, WindError::MalformedDataset(_)));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = WindDataset::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![0.0; 7],
            vec![0.0; 8],
        )
        .unwrap_err();
        assert!(err.to_string().contains("u has 7 values"));
    }

    #[test]
    fn test_longitude_convention_detection() {
        let signed = WindDataset::new(
            vec![0.0, 1.0],
            vec![-12.0, 75.0],
            vec![0.0, 1.0],
            vec![0.0; 8],
            vec![0.0; 8],
        )
        .unwrap();
        assert_eq!(signed.convention(), LonConvention::Signed);
        assert!(!signed.is_global());

        let lons: Vec<f64> = (0..4).map(|i| f64::from(i) * 90.0).collect();
        let unsigned = WindDataset::new(
            vec![0.0, 1.0],
            lons,
            vec![0.0, 1.0],
            vec![0.0; 16],
            vec![0.0; 16],
        )
        .unwrap();
        assert_eq!(unsigned.convention(), LonConvention::Unsigned);
        assert!(unsigned.is_global());
        assert_eq!(unsigned.convention().normalize(-10.0), 350.0);
        assert_eq!(LonConvention::Signed.normalize(190.0), -170.0);
    }

    #[test]
    fn test_json_aliases_accepted() {
        let short = r#"{"latitude": [50, 40], "longitude": [0, 1], "time_hours": [0, 1],
            "u": [[[1, 2], [3, 4]], [[5, 6], [7, 8]]],
            "v": [[[0, 0], [0, 0]], [[0, 0], [0, null]]]}"#;
        let long = r#"{"lat": [50, 40], "lon": [0, 1], "time": [0, 1],
            "u_component_of_wind": [[[1, 2], [3, 4]], [[5, 6], [7, 8]]],
            "v_component_of_wind": [[[0, 0], [0, 0]], [[0, 0], [0, null]]]}"#;
        let a = WindDataset::from_json_str(short).unwrap();
        let b = WindDataset::from_json_str(long).unwrap();
        assert_eq!(a.lats(), b.lats());
        assert_eq!(a.slab(0, Component::Zonal), &[3.0, 4.0, 1.0, 2.0]);
        assert!(a.slab(1, Component::Meridional)[1].is_nan());
    }

    #[test]
    fn test_json_missing_variables_rejected() {
        let json = r#"{"latitude": [0, 1], "longitude": [0, 1], "time_hours": [0, 1]}"#;
        let err = WindDataset::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("wind variables not found"));
    }

    #[test]
    fn test_coverage_report() {
        let ds = WindDataset::new(
            vec![30.0, 75.0],
            vec![-15.0, 80.0],
            vec![0.0, 500.0],
            vec![0.0; 8],
            vec![0.0; 8],
        )
        .unwrap();
        assert!(ds.coverage(&DomainConfig::default(), 480.0).is_complete());

        let report = ds.coverage(&DomainConfig::default(), 600.0);
        assert!(report.temporal_gap);
        assert!(!report.spatial_gap);

        let wide = DomainConfig {
            lon_max: 120.0,
            ..DomainConfig::default()
        };
        assert!(ds.coverage(&wide, 480.0).spatial_gap);
    }
}
