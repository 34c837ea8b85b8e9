//! The 4/3-Earth beam-propagation geometry engine.
//!
//! All angles are radians, all distances meters. Every function here is pure
//! and thread-safe: none of them touch the effective Earth radius other than
//! through the [`crate::constants::EARTH_RADIUS_43_M`] constant, and none of
//! them signal errors. Inputs outside the model's domain (for example
//! `h <= -EARTH_RADIUS_43_M`) produce `NaN`; callers treat `NaN` as "no
//! sample" rather than propagating a `Result`.
//!
//! The formula choices below — including the `g/(2a)` factor in
//! [`height_from_eta_ground`] — are preserved for behavioral parity with the
//! reference implementation and are not "fixed", per the design notes.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::constants::EARTH_RADIUS_43_M;

/// The altitude of a point at beam distance `b` and elevation `eta`.
///
/// By the cosine rule: `c^2 = a^2 + b^2 - 2ab*cos(pi/2 + eta)`.
pub fn height_from_eta_beam(eta: f64, b: f64) -> f64 {
    let a = EARTH_RADIUS_43_M;
    (a * a + b * b - 2.0 * a * b * (FRAC_PI_2 + eta).cos()).sqrt() - a
}

/// The altitude of a point above ground at elevation `eta` and ground angle
/// `beta`.
///
/// By the sine rule, `h = a * (cos(eta)/cos(beta + eta) - 1)`.
pub fn height_from_eta_beta(eta: f64, beta: f64) -> f64 {
    let a = EARTH_RADIUS_43_M;
    a * (eta.cos() / (beta + eta).cos() - 1.0)
}

/// The altitude of a point at ground distance `g` and elevation `eta`.
///
/// Note: uses `g / (2a)` rather than `g / a` for the ground angle, retained
/// for behavioral compatibility with the reference implementation.
pub fn height_from_eta_ground(eta: f64, g: f64) -> f64 {
    height_from_eta_beta(eta, g / (2.0 * EARTH_RADIUS_43_M))
}

/// The on-beam distance at ground angle `beta` and altitude `h`.
///
/// By the cosine rule: `b^2 = 2a(a+h)(1 - cos(beta)) + h^2`.
pub fn beam_from_beta_h(beta: f64, h: f64) -> f64 {
    let a = EARTH_RADIUS_43_M;
    (2.0 * a * (a + h) * (1.0 - beta.cos()) + h * h).sqrt()
}

/// The on-beam distance at elevation `eta` and altitude `h`.
///
/// By the sine rule: `sin(gamma)/c = sin(beta)/b`.
pub fn beam_from_eta_h(eta: f64, h: f64) -> f64 {
    let a = EARTH_RADIUS_43_M;
    let c = a + h;
    let gamma = eta + FRAC_PI_2;
    let beta = PI - gamma - (a * gamma.sin() / c).asin();
    beta.sin() * c / gamma.sin()
}

/// The on-beam distance at elevation `eta` and ground angle `beta`.
///
/// By the sine rule: `sin(beta)/b = sin(alpha)/a`.
pub fn beam_from_eta_beta(eta: f64, beta: f64) -> f64 {
    let a = EARTH_RADIUS_43_M;
    let alpha = PI - (eta + FRAC_PI_2) - beta;
    beta.sin() * a / alpha.sin()
}

/// The on-beam distance at elevation `eta` and ground distance `g`.
pub fn beam_from_eta_ground(eta: f64, g: f64) -> f64 {
    beam_from_eta_beta(eta, g / EARTH_RADIUS_43_M)
}

/// The ground distance from the radar to the point under a bin at elevation
/// `eta` and on-beam distance `b`.
pub fn ground_from_eta_b(eta: f64, b: f64) -> f64 {
    let a = EARTH_RADIUS_43_M;
    let x = b * eta.cos();
    let y = b * eta.sin();
    a * (x / (y + a)).atan()
}

/// The elevation angle at ground angle `beta` and altitude `h`.
///
/// By the cosine rule: `cos(gamma) = (a - c*cos(beta)) / b`.
pub fn eta_from_beta_h(beta: f64, h: f64) -> f64 {
    let a = EARTH_RADIUS_43_M;
    let c = a + h;
    let b = (a * a + c * c - 2.0 * a * c * beta.cos()).sqrt();
    ((a - c * beta.cos()) / b).acos() - FRAC_PI_2
}

/// The elevation angle at ground distance `g` and altitude `h`.
pub fn eta_from_g_h(g: f64, h: f64) -> f64 {
    eta_from_beta_h(g / EARTH_RADIUS_43_M, h)
}

/// Normalized beam power at `angle` radians off the beam center, for a beam
/// of half-power width `beam_width` radians.
pub fn normalized_beam_power(angle: f64, beam_width: f64) -> f64 {
    let w2 = beam_width * beam_width;
    w2 / (w2 + angle * angle)
}

/// A scan set's beam width and sorted (ascending) elevation angles, with the
/// elevation-bracketing lookup the composite generator needs for CAPPI and
/// PCAPPI sampling.
#[derive(Debug, Clone)]
pub struct ElevationModel {
    beam_width: f64,
    /// Ascending elevation angles, radians. Invariant: strictly increasing.
    elevation_angles: Vec<f64>,
}

impl ElevationModel {
    /// Builds a model from a beam width and an elevation-angle list. The
    /// list is sorted ascending; callers that already have a
    /// strictly-ascending list (as `spec.md`'s `PolarVolume` invariant
    /// requires) pay no extra cost beyond the sort check.
    pub fn new(beam_width: f64, mut elevation_angles: Vec<f64>) -> Self {
        elevation_angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Self {
            beam_width,
            elevation_angles,
        }
    }

    pub fn beam_width(&self) -> f64 {
        self.beam_width
    }

    pub fn elevation_angles(&self) -> &[f64] {
        &self.elevation_angles
    }

    /// Normalized beam power at `angle` off this model's beam center.
    pub fn beam_power(&self, angle: f64) -> f64 {
        normalized_beam_power(angle, self.beam_width)
    }

    /// Finds the greatest elevation `<= target` (the lower bracket) and the
    /// smallest elevation `>= target` (the upper bracket), each independently
    /// `None` when no such elevation exists (target below the lowest scan or
    /// above the highest). When `target` lies within `[min, max]` both sides
    /// are `Some`, and no scan elevation lies strictly between them.
    pub fn find_closest_elevations(&self, target: f64) -> (Option<usize>, Option<usize>) {
        let mut lower: Option<(usize, f64)> = None;
        let mut upper: Option<(usize, f64)> = None;
        for (i, &e) in self.elevation_angles.iter().enumerate() {
            if e <= target && lower.map_or(true, |(_, le)| e > le) {
                lower = Some((i, e));
            }
            if e >= target && upper.map_or(true, |(_, ue)| e < ue) {
                upper = Some((i, e));
            }
        }
        (lower.map(|(i, _)| i), upper.map(|(i, _)| i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn height_beam_round_trip() {
        for eta_deg in [0.0, 10.0, 30.0, 60.0] {
            let eta = eta_deg * PI / 180.0;
            for b in [1_000.0, 10_000.0, 100_000.0, 250_000.0] {
                let h = height_from_eta_beam(eta, b);
                let b2 = beam_from_eta_h(eta, h);
                assert!(
                    is_close!(b2, b, abs_tol = 1.0),
                    "eta={eta_deg} b={b} h={h} b2={b2}"
                );
            }
        }
    }

    #[test]
    fn ground_from_eta_b_flat_earth_limit() {
        // Near-zero elevation, short range: ground distance should track
        // slant range closely (flat-earth limit).
        let g = ground_from_eta_b(0.0, 5_000.0);
        assert!((g - 5_000.0).abs() < 1.0);
    }

    #[test]
    fn height_from_eta_beam_monotonic_in_b() {
        let eta = 1.0_f64.to_radians();
        let mut prev = height_from_eta_beam(eta, 1_000.0);
        for b in (2_000..250_000).step_by(5_000) {
            let h = height_from_eta_beam(eta, b as f64);
            assert!(h > prev, "height not increasing at b={b}");
            prev = h;
        }
    }

    #[test]
    fn beam_from_beta_h_monotonic_in_beta() {
        let h = 5_000.0;
        let mut prev = beam_from_beta_h(0.0001, h);
        let mut beta = 0.001;
        while beta < FRAC_PI_2 {
            let b = beam_from_beta_h(beta, h);
            assert!(b > prev, "beam not increasing at beta={beta}");
            prev = b;
            beta += 0.05;
        }
    }

    #[test]
    fn find_closest_elevations_brackets() {
        let model = ElevationModel::new(
            1.0_f64.to_radians(),
            vec![
                0.5_f64.to_radians(),
                1.0_f64.to_radians(),
                1.5_f64.to_radians(),
            ],
        );
        let (lo, hi) = model.find_closest_elevations(0.8_f64.to_radians());
        assert_eq!(lo, Some(0));
        assert_eq!(hi, Some(1));

        let (lo, hi) = model.find_closest_elevations(-1.0_f64.to_radians());
        assert_eq!(lo, None);
        assert_eq!(hi, Some(0));

        let (lo, hi) = model.find_closest_elevations(10.0_f64.to_radians());
        assert_eq!(lo, Some(2));
        assert_eq!(hi, None);

        let (lo, hi) = model.find_closest_elevations(1.0_f64.to_radians());
        assert_eq!(lo, Some(1));
        assert_eq!(hi, Some(1));
    }

    #[test]
    fn beam_power_peaks_on_axis() {
        let model = ElevationModel::new(1.0_f64.to_radians(), vec![0.0]);
        assert!((model.beam_power(0.0) - 1.0).abs() < 1e-12);
        assert!(model.beam_power(model.beam_width()) < model.beam_power(0.0));
    }
}
