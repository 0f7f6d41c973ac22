//! Eye prescription model and low-order wavefront optics
//!
//! A [`Prescription`] carries the refractive error of one eye the way an
//! optometrist writes it (sphere, cylinder, axis) together with the pupil
//! radius and viewing distance of the display setup. From it, the three
//! low-order Zernike coefficients (oblique astigmatism Z(2,-2), defocus
//! Z(2,0), vertical astigmatism Z(2,2)) are derived and the wavefront
//! aberration can be evaluated anywhere on the normalized pupil disk.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Absolute per-field tolerance under which two prescriptions are the same
pub const PRESCRIPTION_TOLERANCE: f64 = 1e-6;

/// Maximum accommodation power of the relaxed-to-fully-accommodated eye [diopter]
const ACCOMMODATION_RANGE: f64 = 8.0;

/// Eye laterality, ophthalmic convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Eye {
    /// Oculus dexter, right eye
    Od,
    /// Oculus sinister, left eye
    Os,
}
impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eye::Od => write!(f, "OD"),
            Eye::Os => write!(f, "OS"),
        }
    }
}

/// Single-eye refractive prescription and viewing geometry
///
/// Immutable value type; the pipeline never mutates it once built.
/// Comparison is tolerant of floating-point jitter, see
/// [`Prescription::approx_eq`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    /// Spherical power [diopter], negative for myopia
    pub sphere: f64,
    /// Cylindrical power [diopter]
    pub cylinder: f64,
    /// Cylinder axis [degree], 0-180
    pub axis: f64,
    /// Pupil radius [mm]
    pub pupil_radius: f64,
    /// Distance from eye to display [m]
    pub viewing_distance: f64,
}
impl Default for Prescription {
    fn default() -> Self {
        Self {
            sphere: 0f64,
            cylinder: 0f64,
            axis: 0f64,
            pupil_radius: 2.5,
            viewing_distance: 1.25,
        }
    }
}
impl Prescription {
    pub fn new(sphere: f64, cylinder: f64, axis: f64) -> Self {
        Self {
            sphere,
            cylinder,
            axis,
            ..Default::default()
        }
    }
    pub fn pupil_radius(self, value: f64) -> Self {
        Self {
            pupil_radius: value,
            ..self
        }
    }
    pub fn viewing_distance(self, value: f64) -> Self {
        Self {
            viewing_distance: value,
            ..self
        }
    }
    /// Field-wise comparison within [`PRESCRIPTION_TOLERANCE`]
    ///
    /// Used for catalog keying instead of bit-exact float equality.
    pub fn approx_eq(&self, other: &Self) -> bool {
        (self.sphere - other.sphere).abs() < PRESCRIPTION_TOLERANCE
            && (self.cylinder - other.cylinder).abs() < PRESCRIPTION_TOLERANCE
            && (self.axis - other.axis).abs() < PRESCRIPTION_TOLERANCE
            && (self.pupil_radius - other.pupil_radius).abs() < PRESCRIPTION_TOLERANCE
            && (self.viewing_distance - other.viewing_distance).abs() < PRESCRIPTION_TOLERANCE
    }
    /// Derives the three low-order Zernike coefficients
    pub fn wavefront_coefficients(&self) -> WavefrontCoefficients {
        let a = self.axis.to_radians();
        let s = adjusted_sphere(self.sphere, self.viewing_distance);
        let c = self.cylinder;
        let r2 = self.pupil_radius * self.pupil_radius;
        WavefrontCoefficients {
            astig_oblique: r2 * c * (2f64 * a).sin() / (4f64 * 6f64.sqrt()),
            defocus: -r2 * (s + c / 2f64) / (4f64 * 3f64.sqrt()),
            astig_vertical: r2 * c * (2f64 * a).cos() / (4f64 * 6f64.sqrt()),
        }
    }
}
impl fmt::Display for Prescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:+.2}D {:+.2}D x{:.0} (pupil {:.1}mm @ {:.2}m)",
            self.sphere, self.cylinder, self.axis, self.pupil_radius, self.viewing_distance
        )
    }
}

/// Effective spherical power after residual accommodation
///
/// The eye accommodates to bring the display plane at distance `d` [m]
/// into focus, within the [`ACCOMMODATION_RANGE`] diopter reserve. The
/// function is piecewise and intentionally non-smooth at both boundaries;
/// the branch order below is part of the model.
pub fn adjusted_sphere(sm: f64, d: f64) -> f64 {
    let inv_d = 1f64 / d;
    let abs_sm = sm.abs();
    if inv_d < abs_sm {
        sm + inv_d
    } else if (ACCOMMODATION_RANGE - inv_d) < abs_sm {
        sm - (ACCOMMODATION_RANGE - inv_d)
    } else {
        0f64
    }
}

/// The three low-order Zernike coefficients of one eye's wavefront
///
/// Derived from a [`Prescription`]; same physical unit as the pupil
/// radius (mm) since the coefficients scale with its square.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WavefrontCoefficients {
    /// Oblique astigmatism, Z(2,-2)
    pub astig_oblique: f64,
    /// Defocus, Z(2,0)
    pub defocus: f64,
    /// Vertical astigmatism, Z(2,2)
    pub astig_vertical: f64,
}
impl WavefrontCoefficients {
    /// Wavefront aberration at normalized pupil coordinates `(x, y)`
    ///
    /// `x` and `y` span [-1, 1] across the pupil diameter; points outside
    /// the unit disk carry zero wavefront by convention. `strength`
    /// scales the whole aberration and is the blur-strength knob exposed
    /// at the pipeline boundary.
    pub fn wavefront(&self, x: f64, y: f64, strength: f64) -> f64 {
        let r2 = x * x + y * y;
        if r2 > 1f64 {
            return 0f64;
        }
        let z_oblique = 2f64 * 6f64.sqrt() * x * y;
        let z_defocus = 3f64.sqrt() * (2f64 * r2 - 1f64);
        let z_vertical = 6f64.sqrt() * (x * x - y * y);
        strength
            * (self.astig_oblique * z_oblique
                + self.defocus * z_defocus
                + self.astig_vertical * z_vertical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accommodation_beyond_range() {
        // inv_d = 0.8 < |-2|: the eye cannot fully focus, residual -1.2D
        assert!((adjusted_sphere(-2f64, 1.25) + 1.2).abs() < 1e-12);
    }
    #[test]
    fn accommodation_within_range() {
        // emmetropic eye at 1.25m accommodates completely
        assert_eq!(adjusted_sphere(0f64, 1.25), 0f64);
    }
    #[test]
    fn accommodation_near_limit() {
        // inv_d = 7.7 leaves only 0.3D of headroom for a +0.5D sphere
        let value = adjusted_sphere(0.5, 1f64 / 7.7);
        assert!((value - 0.2).abs() < 1e-12);
    }
    #[test]
    fn no_aberration_coefficients_vanish() {
        let coeffs = Prescription::default().wavefront_coefficients();
        assert_eq!(coeffs.astig_oblique, 0f64);
        assert_eq!(coeffs.defocus, 0f64);
        assert_eq!(coeffs.astig_vertical, 0f64);
    }
    #[test]
    fn defocus_sign_follows_myopia() {
        // myopic residual sphere is negative, so defocus comes out positive
        let coeffs = Prescription::new(-2f64, 0f64, 0f64).wavefront_coefficients();
        assert!(coeffs.defocus > 0f64);
        assert_eq!(coeffs.astig_oblique, 0f64);
        assert_eq!(coeffs.astig_vertical, 0f64);
    }
    #[test]
    fn axis_rotates_astigmatism_between_modes() {
        let vertical = Prescription::new(0f64, -1f64, 0f64).wavefront_coefficients();
        let oblique = Prescription::new(0f64, -1f64, 45f64).wavefront_coefficients();
        assert!(vertical.astig_oblique.abs() < 1e-12);
        assert!((oblique.astig_oblique - vertical.astig_vertical).abs() < 1e-12);
        assert!(oblique.astig_vertical.abs() < 1e-9);
    }
    #[test]
    fn wavefront_zero_outside_pupil() {
        let coeffs = Prescription::new(-3f64, -1f64, 30f64).wavefront_coefficients();
        assert_eq!(coeffs.wavefront(0.9, 0.9, 1f64), 0f64);
    }
    #[test]
    fn prescription_jitter_is_equal() {
        let rx = Prescription::new(-2.25, -0.75, 30f64);
        let jittered = Prescription::new(-2.25 + 4e-7, -0.75 - 4e-7, 30f64 + 4e-7);
        assert!(rx.approx_eq(&jittered));
        let other = Prescription::new(-2.25, -0.5, 30f64);
        assert!(!rx.approx_eq(&other));
    }
}
