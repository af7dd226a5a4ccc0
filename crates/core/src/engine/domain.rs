//! Domain policy applied after each integration step
//!
//! A bounded (regional) domain deactivates particles that leave it. A periodic (globe)
//! domain wraps longitude and clamps latitude just inside the poles instead, so particles
//! never leave it.

use crate::config::DomainConfig;
use crate::core_types::Vec2;

/// Margin keeping clamped latitudes off the exact domain edge (°)
pub(crate) const LAT_EDGE_MARGIN: f64 = 1e-6;

/// How a domain treats particles crossing its edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainPolicy {
    /// Leaving the bounds deactivates the particle
    Bounded,
    /// Longitude wraps, latitude is clamped
    Periodic,
}

/// Simulation bounds and their edge policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
    policy: DomainPolicy,
}

impl Domain {
    /// Domain from configuration; the policy follows [`DomainConfig::is_periodic`]
    pub fn from_config(config: &DomainConfig) -> Self {
        Self {
            lon_min: config.lon_min,
            lon_max: config.lon_max,
            lat_min: config.lat_min,
            lat_max: config.lat_max,
            policy: if config.is_periodic() {
                DomainPolicy::Periodic
            } else {
                DomainPolicy::Bounded
            },
        }
    }

    /// Edge policy
    pub fn policy(&self) -> DomainPolicy {
        self.policy
    }

    /// Fold a longitude into `[lon_min, lon_max)`
    #[inline]
    pub fn wrap_lon(&self, lon: f64) -> f64 {
        let span = self.lon_max - self.lon_min;
        let wrapped = (lon - self.lon_min).rem_euclid(span) + self.lon_min;
        // rem_euclid rounds up to `span` for inputs just below lon_min
        if wrapped >= self.lon_max {
            self.lon_min
        } else {
            wrapped
        }
    }

    /// Latitude kept [`LAT_EDGE_MARGIN`] inside the bounds, or the mid-latitude when the
    /// domain is too narrow for the margin
    #[inline]
    fn clamp_lat(&self, lat: f64) -> f64 {
        let lo = self.lat_min + LAT_EDGE_MARGIN;
        let hi = self.lat_max - LAT_EDGE_MARGIN;
        if lo > hi {
            return 0.5 * (self.lat_min + self.lat_max);
        }
        lat.clamp(lo, hi)
    }

    /// Whether a position lies within the bounds (edges included)
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        (self.lon_min..=self.lon_max).contains(&p.x) && (self.lat_min..=self.lat_max).contains(&p.y)
    }

    /// Resolve a proposed position after one step.
    ///
    /// Returns the position to record, or `None` if the particle must be deactivated (the
    /// caller then keeps its previous position). Non-finite positions always deactivate.
    pub fn resolve(&self, proposed: Vec2) -> Option<Vec2> {
        if !proposed.x.is_finite() || !proposed.y.is_finite() {
            return None;
        }
        match self.policy {
            DomainPolicy::Bounded => self.contains(proposed).then_some(proposed),
            DomainPolicy::Periodic => Some(Vec2::new(
                self.wrap_lon(proposed.x),
                self.clamp_lat(proposed.y),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn globe() -> Domain {
        Domain::from_config(&DomainConfig {
            lon_min: -180.0,
            lon_max: 180.0,
            lat_min: -85.0,
            lat_max: 85.0,
            nlon: 360,
            nlat: 170,
        })
    }

    #[test]
    fn test_bounded_domain_deactivates_outside() {
        let domain = Domain::from_config(&DomainConfig::default());
        assert_eq!(domain.policy(), DomainPolicy::Bounded);
        assert_eq!(domain.resolve(Vec2::new(30.0, 50.0)), Some(Vec2::new(30.0, 50.0)));
        assert_eq!(domain.resolve(Vec2::new(75.0, 72.0)), Some(Vec2::new(75.0, 72.0)));
        assert_eq!(domain.resolve(Vec2::new(75.01, 50.0)), None);
        assert_eq!(domain.resolve(Vec2::new(30.0, 32.9)), None);
    }

    #[test]
    fn test_non_finite_position_deactivates() {
        assert_eq!(globe().resolve(Vec2::new(f64::NAN, 0.0)), None);
        assert_eq!(
            Domain::from_config(&DomainConfig::default()).resolve(Vec2::new(30.0, f64::INFINITY)),
            None
        );
    }

    #[test]
    fn test_periodic_domain_wraps_longitude() {
        let domain = globe();
        assert_eq!(domain.policy(), DomainPolicy::Periodic);
        let p = domain.resolve(Vec2::new(181.5, 10.0)).unwrap();
        assert_relative_eq!(p.x, -178.5, epsilon = 1e-9);
        let p = domain.resolve(Vec2::new(-190.0, 10.0)).unwrap();
        assert_relative_eq!(p.x, 170.0, epsilon = 1e-9);
        assert_eq!(domain.wrap_lon(180.0), -180.0);
    }

    #[test]
    fn test_wrap_just_below_western_edge_stays_in_range() {
        let domain = globe();
        // one ulp west of the edge
        let lon = f64::from_bits((-180.0f64).to_bits() + 1);
        let wrapped = domain.wrap_lon(lon);
        assert!((-180.0..180.0).contains(&wrapped), "wrapped to {wrapped}");
        assert!((-180.0..180.0).contains(&domain.wrap_lon(-180.0 - 3e-14)));
        let p = domain.resolve(Vec2::new(lon, 0.0)).unwrap();
        assert!(p.x < 180.0);
    }

    #[test]
    fn test_narrow_periodic_domain_does_not_panic() {
        let domain = Domain::from_config(&DomainConfig {
            lon_min: -180.0,
            lon_max: 180.0,
            lat_min: 50.0,
            lat_max: 50.000001,
            nlon: 360,
            nlat: 1,
        });
        let p = domain.resolve(Vec2::new(10.0, 51.0)).unwrap();
        assert!((50.0..=50.000001).contains(&p.y));
    }

    #[test]
    fn test_periodic_domain_clamps_latitude() {
        let p = globe().resolve(Vec2::new(0.0, 89.0)).unwrap();
        assert_relative_eq!(p.y, 85.0 - 1e-6);
        let p = globe().resolve(Vec2::new(0.0, -89.0)).unwrap();
        assert_relative_eq!(p.y, -85.0 + 1e-6);
    }
}
