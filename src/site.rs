//! `SiteCoordinates`: a radar-local orthonormal frame on a spherical Earth,
//! used to place polar bins on the sphere and to derive a sweep's bounding
//! box. Grounded on `Coordinates.cpp`'s `origin`/`setBinPosition`/
//! `getBoundingBox`.

use std::f64::consts::PI;

use nalgebra::Vector3;
use thiserror::Error;

use crate::constants::EARTH_RADIUS_M;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("site latitude {0} rad is outside [-pi/2, pi/2]")]
    InvalidLatitude(f64),
    #[error("site longitude {0} rad is outside (-pi, pi]")]
    InvalidLongitude(f64),
}

/// An immutable radar-local frame built once from a site's (lat, lon).
///
/// `p0` is the site's position vector in Earth-centered coordinates; `e_e`
/// and `e_n` are the local unit East and North vectors. All three are
/// derived on a spherical Earth of radius [`crate::constants::EARTH_RADIUS_M`].
#[derive(Debug, Clone)]
pub struct SiteCoordinates {
    lat0: f64,
    lon0: f64,
    p0: Vector3<f64>,
    e_e: Vector3<f64>,
    e_n: Vector3<f64>,
}

impl SiteCoordinates {
    /// Builds the site frame from a site latitude/longitude in radians.
    ///
    /// # Errors
    /// Returns [`SiteError`] if `lat` is outside `[-pi/2, pi/2]` or `lon` is
    /// outside `(-pi, pi]`.
    pub fn origin(lat: f64, lon: f64) -> Result<Self, SiteError> {
        if !(-PI / 2.0..=PI / 2.0).contains(&lat) {
            return Err(SiteError::InvalidLatitude(lat));
        }
        if !(lon > -PI && lon <= PI) {
            return Err(SiteError::InvalidLongitude(lon));
        }

        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let p0 = Vector3::new(
            EARTH_RADIUS_M * cos_lon * cos_lat,
            EARTH_RADIUS_M * sin_lon * cos_lat,
            EARTH_RADIUS_M * sin_lat,
        );
        let e_e = Vector3::new(-sin_lon, cos_lon, 0.0);
        let e_n = Vector3::new(-cos_lon * sin_lat, -sin_lon * sin_lat, cos_lat);

        Ok(Self {
            lat0: lat,
            lon0: lon,
            p0,
            e_e,
            e_n,
        })
    }

    pub fn lat0(&self) -> f64 {
        self.lat0
    }

    pub fn lon0(&self) -> f64 {
        self.lon0
    }

    /// The (lon, lat) of the surface projection of the bin at `azimuth`
    /// (radians clockwise from north) and slant `range` (meters).
    ///
    /// Note: uses the spherical Earth radius `R`, not the effective `R43`
    /// used elsewhere for altitude derivations — this mismatch is called out
    /// as an open question in the design notes and is preserved for
    /// behavioral parity rather than "fixed".
    pub fn set_bin_position(&self, azimuth: f64, range: f64) -> (f64, f64) {
        let x1 = (range / (2.0 * EARTH_RADIUS_M)).cos();
        let x2 = range * azimuth.sin();
        let x3 = range * azimuth.cos();

        let p = self.p0 * x1 + self.e_e * x2 + self.e_n * x3;

        let lon = p.y.atan2(p.x);
        let lat = (p.z / EARTH_RADIUS_M).asin();
        (lon, lat)
    }

    /// A bounding box over a full 360-degree sweep at `range` meters,
    /// sampling 18 azimuths at 20-degree spacing, as `(lat_min, lon_min,
    /// lat_max, lon_max)`.
    ///
    /// Does not wrap the antimeridian: a sweep whose bins straddle `+-pi`
    /// longitude produces a box whose `lon_min > lon_max` or that otherwise
    /// does not contain the site — callers must detect and handle that case
    /// themselves. This is preserved from the reference implementation's
    /// `getBoundingBox`, which carries the same limitation.
    pub fn bounding_box(&self, range: f64) -> (f64, f64, f64, f64) {
        let mut lat_min = f64::INFINITY;
        let mut lon_min = f64::INFINITY;
        let mut lat_max = f64::NEG_INFINITY;
        let mut lon_max = f64::NEG_INFINITY;

        let mut i = 0;
        while i < 360 {
            let azimuth = (i as f64) * PI / 180.0;
            let (lon, lat) = self.set_bin_position(azimuth, range);
            lat_min = lat_min.min(lat);
            lat_max = lat_max.max(lat);
            lon_min = lon_min.min(lon);
            lon_max = lon_max.max(lon);
            i += 20;
        }
        (lat_min, lon_min, lat_max, lon_max)
    }

    /// The forward dual of [`Self::set_bin_position`]: given a target (lon,
    /// lat), returns `(azimuth, ground_distance)` from this site to the
    /// target on a spherical Earth, via the haversine formula.
    ///
    /// Used by the composite engine's per-pixel step 3 (`spec.md` §4.3) to
    /// turn an output pixel's geographic position into the polar coordinates
    /// a source's scans are sampled at.
    pub fn bearing_and_distance(&self, lon: f64, lat: f64) -> (f64, f64) {
        let d_lon = lon - self.lon0;
        let (sin_lat0, cos_lat0) = self.lat0.sin_cos();
        let (sin_lat, cos_lat) = lat.sin_cos();

        let central_angle =
            (sin_lat0 * sin_lat + cos_lat0 * cos_lat * d_lon.cos()).clamp(-1.0, 1.0).acos();
        let ground_distance = EARTH_RADIUS_M * central_angle;

        let y = d_lon.sin() * cos_lat;
        let x = cos_lat0 * sin_lat - sin_lat0 * cos_lat * d_lon.cos();
        let azimuth = y.atan2(x).rem_euclid(2.0 * PI);

        (azimuth, ground_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_latitude() {
        assert!(SiteCoordinates::origin(2.0, 0.0).is_err());
    }

    #[test]
    fn rejects_invalid_longitude() {
        assert!(SiteCoordinates::origin(0.0, -PI).is_err());
        assert!(SiteCoordinates::origin(0.0, PI).is_ok());
    }

    #[test]
    fn bin_at_zero_azimuth_is_north_of_site() {
        let site = SiteCoordinates::origin(60.0_f64.to_radians(), 15.0_f64.to_radians()).unwrap();
        let (_, site_lat) = site.set_bin_position(0.0, 0.0);
        let (_, bin_lat) = site.set_bin_position(0.0, 100_000.0);
        assert!(bin_lat > site_lat);
    }

    #[test]
    fn bearing_and_distance_round_trips_set_bin_position() {
        let site = SiteCoordinates::origin(60.0_f64.to_radians(), 15.0_f64.to_radians()).unwrap();
        let (lon, lat) = site.set_bin_position(30.0_f64.to_radians(), 50_000.0);
        let (azimuth, distance) = site.bearing_and_distance(lon, lat);
        assert!((azimuth - 30.0_f64.to_radians()).abs() < 1e-3);
        assert!((distance - 50_000.0).abs() < 50.0);
    }

    #[test]
    fn bounding_box_contains_site() {
        let site = SiteCoordinates::origin(60.0_f64.to_radians(), 15.0_f64.to_radians()).unwrap();
        let (lat_min, lon_min, lat_max, lon_max) = site.bounding_box(100_000.0);
        assert!(lat_min < site.lat0() && site.lat0() < lat_max);
        assert!(lon_min < site.lon0() && site.lon0() < lon_max);
    }
}
