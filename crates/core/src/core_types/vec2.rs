//! Vector type alias for geographic positions and angular wind vectors.

use nalgebra::Vector2;

/// 2D vector type for `(lon, lat)` positions and `(u, v)` wind vectors.
///
/// This is a simple alias for `nalgebra::Vector2<f64>`. Geographic quantities are kept in
/// f64 so that degree arithmetic matches reanalysis data to the last digit.
pub type Vec2 = Vector2<f64>;
