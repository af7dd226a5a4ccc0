//! Regular lat/lon binning grid and the 2D maps built on it
//!
//! Bins are half-open `[lo, hi)` along each axis except the last one, which also takes
//! values exactly on `lon_max`/`lat_max`. In a periodic domain longitudes are folded into
//! `[lon_min, lon_max)` before binning.

use crate::config::DomainConfig;
use crate::engine::{Domain, DomainPolicy};
use serde::{Deserialize, Serialize};

/// `n + 1` evenly spaced edges from `min` to `max`, last edge exactly `max`
fn linspace_edges(min: f64, max: f64, n: usize) -> Vec<f64> {
    let step = (max - min) / n as f64;
    (0..=n)
        .map(|i| if i == n { max } else { min + i as f64 * step })
        .collect()
}

fn centers(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
}

/// Bin index of `x` along `edges`, `None` outside `[edges[0], edges[n]]`
fn bin(edges: &[f64], x: f64) -> Option<usize> {
    let n = edges.len() - 1;
    if !(edges[0]..=edges[n]).contains(&x) {
        return None;
    }
    Some((edges.partition_point(|&e| e <= x) - 1).min(n - 1))
}

/// Aggregation grid over the simulation domain
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    lon_edges: Vec<f64>,
    lat_edges: Vec<f64>,
    domain: Domain,
}

impl Grid {
    /// Grid with `nlon x nlat` cells over the configured bounds
    pub fn from_config(config: &DomainConfig) -> Self {
        Self {
            lon_edges: linspace_edges(config.lon_min, config.lon_max, config.nlon.max(1)),
            lat_edges: linspace_edges(config.lat_min, config.lat_max, config.nlat.max(1)),
            domain: Domain::from_config(config),
        }
    }

    /// Cells along longitude
    pub fn nlon(&self) -> usize {
        self.lon_edges.len() - 1
    }

    /// Cells along latitude
    pub fn nlat(&self) -> usize {
        self.lat_edges.len() - 1
    }

    /// Longitude bin edges (`nlon + 1`)
    pub fn lon_edges(&self) -> &[f64] {
        &self.lon_edges
    }

    /// Latitude bin edges (`nlat + 1`)
    pub fn lat_edges(&self) -> &[f64] {
        &self.lat_edges
    }

    /// Longitude cell centres
    pub fn lon_centers(&self) -> Vec<f64> {
        centers(&self.lon_edges)
    }

    /// Latitude cell centres
    pub fn lat_centers(&self) -> Vec<f64> {
        centers(&self.lat_edges)
    }

    /// `(row, col)` = `(lat index, lon index)` of the cell holding a position
    pub fn cell_of(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let lon = match self.domain.policy() {
            DomainPolicy::Periodic if lon.is_finite() => self.domain.wrap_lon(lon),
            _ => lon,
        };
        Some((bin(&self.lat_edges, lat)?, bin(&self.lon_edges, lon)?))
    }

    /// All-zero map over this grid
    pub fn zeros(&self) -> GridMap {
        GridMap::zeros(self.nlat(), self.nlon())
    }
}

/// Row-major `(nlat, nlon)` map of cell values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMap {
    nlat: usize,
    nlon: usize,
    data: Vec<f64>,
}

impl GridMap {
    /// All-zero map
    pub fn zeros(nlat: usize, nlon: usize) -> Self {
        Self {
            nlat,
            nlon,
            data: vec![0.0; nlat * nlon],
        }
    }

    /// `(nlat, nlon)`
    pub fn shape(&self) -> (usize, usize) {
        (self.nlat, self.nlon)
    }

    /// Value of cell `(row, col)`, `None` out of range
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.nlat && col < self.nlon).then(|| self.data[row * self.nlon + col])
    }

    /// Row-major cell values
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub(crate) fn add(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.nlon + col] += value;
    }

    /// Largest cell value (0 for an empty map)
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }

    /// `(row, col)` of the first cell holding the largest value, `None` if every cell is 0
    pub fn argmax(&self) -> Option<(usize, usize)> {
        let max = self.max();
        if max <= 0.0 {
            return None;
        }
        self.data
            .iter()
            .position(|&x| x == max)
            .map(|i| (i / self.nlon, i % self.nlon))
    }

    /// Sum of all cells
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Divide every cell by the maximum so the peak becomes exactly 1.0; all-zero maps stay zero
    pub fn normalize(&mut self) {
        let max = self.max();
        if max > 0.0 {
            for x in &mut self.data {
                *x /= max;
            }
        }
    }

    /// Divide every cell by `n`
    pub(crate) fn scale_down(&mut self, n: usize) {
        if n > 0 {
            let n = n as f64;
            for x in &mut self.data {
                *x /= n;
            }
        }
    }
}
