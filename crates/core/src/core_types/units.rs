//! Semantic unit types for wind speed handling
//!
//! Reanalysis products report wind in meters per second while particles move in
//! geographic degrees. These newtypes keep the two apart so a raw m/s value can never be
//! added to a position by accident.
//!
//! # Design Philosophy
//! - f64 throughout, geographic degrees need the precision
//! - Explicit conversion methods that take the latitude the conversion depends on
//!
//! # Usage
//! ```
//! use dispersion_sim_core::core_types::units::MetersPerSecond;
//!
//! let zonal = MetersPerSecond::new(10.0);
//! let deg_h = zonal.to_zonal_degrees_per_hour(0.0);
//! assert!((*deg_h - 0.3243).abs() < 1e-4);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Length of one degree of latitude (m), also one degree of longitude at the equator
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Lower bound on `cos(latitude)` for zonal conversion, avoids blow-up near the poles
pub const MIN_COS_LATITUDE: f64 = 0.1;

const SECONDS_PER_HOUR: f64 = 3600.0;

// ============================================================================
// LINEAR WIND SPEED
// ============================================================================

/// Wind speed component in meters per second (signed, east/north positive)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct MetersPerSecond(f64);

impl Deref for MetersPerSecond {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl MetersPerSecond {
    /// Create a new wind speed component
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        MetersPerSecond(value)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Convert a zonal (east-west) component to degrees of longitude per hour.
    ///
    /// A degree of longitude shrinks with `cos(latitude)`; the cosine is floored at
    /// [`MIN_COS_LATITUDE`] so polar positions stay finite.
    #[inline]
    #[must_use]
    pub fn to_zonal_degrees_per_hour(self, latitude_deg: f64) -> DegreesPerHour {
        let cos_lat = latitude_deg.to_radians().cos().max(MIN_COS_LATITUDE);
        DegreesPerHour(self.0 * SECONDS_PER_HOUR / (METERS_PER_DEGREE * cos_lat))
    }

    /// Convert a meridional (north-south) component to degrees of latitude per hour
    #[inline]
    #[must_use]
    pub fn to_meridional_degrees_per_hour(self) -> DegreesPerHour {
        DegreesPerHour(self.0 * SECONDS_PER_HOUR / METERS_PER_DEGREE)
    }
}

// ============================================================================
// ANGULAR WIND SPEED
// ============================================================================

/// Angular drift speed in degrees per hour (longitude or latitude axis)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DegreesPerHour(f64);

impl Deref for DegreesPerHour {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl DegreesPerHour {
    /// Create a new angular speed
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        DegreesPerHour(value)
    }

    /// Get the raw f64 value
    #[inline]
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Displacement in degrees over `hours`
    #[inline]
    #[must_use]
    pub fn displacement(self, hours: f64) -> f64 {
        self.0 * hours
    }
}
