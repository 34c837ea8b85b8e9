//! Physical constants shared across the geometry and site modules.

/// Mean Earth radius in meters, per the 4/3-Earth refraction model.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Effective Earth radius under standard atmospheric refraction (`4/3 * R`).
pub const EARTH_RADIUS_43_M: f64 = 4.0 / 3.0 * EARTH_RADIUS_M;
