//! Wiener-style deconvolution filter
//!
//! Given the PSF spectrum `H`, the regularized inverse is
//! `M = conj(H) / (|H|² + ε)`. A plain inverse `1/H` would blow up at
//! the spectral zeros of the blur; the `ε` term bounds noise
//! amplification at the cost of correction sharpness. The useful
//! operating regime is `ε` in 1e-4 to 1e-2.

use num_complex::Complex64;

use crate::fourier::{ComplexGrid, Spectral2d};
use crate::psf::Psf;

/// Default regularization constant
pub const DEFAULT_EPSILON: f64 = 1e-3;

/// Regularized frequency-domain inverse of a PSF
///
/// Tied to the `(psf, epsilon)` pair that produced it; same grid side as
/// the source PSF, immutable once built.
#[derive(Debug, Clone)]
pub struct DeconvolutionFilter {
    epsilon: f64,
    grid: ComplexGrid,
}
impl DeconvolutionFilter {
    /// Builds the filter from an energy-normalized PSF
    pub fn new(psf: &Psf, epsilon: f64) -> Self {
        let spectral = Spectral2d::new(psf.size());
        Self::with_spectral(psf, epsilon, &spectral)
    }
    /// As above, reusing an already planned transform of matching size
    pub fn with_spectral(psf: &Psf, epsilon: f64, spectral: &Spectral2d) -> Self {
        let mut grid = psf.as_complex_grid();
        spectral.forward(&mut grid);
        let cells = grid
            .cells()
            .iter()
            .map(|h| {
                let mag2 = h.re * h.re + h.im * h.im;
                let mut denom = mag2 + epsilon;
                if denom <= 0f64 {
                    denom = epsilon;
                }
                h.conj() / denom
            })
            .collect();
        Self {
            epsilon,
            grid: ComplexGrid::from_cells(psf.size(), cells),
        }
    }
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
    pub fn size(&self) -> usize {
        self.grid.size()
    }
    pub fn grid(&self) -> &ComplexGrid {
        &self.grid
    }
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        self.grid.get(i, j)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescription::Prescription;

    #[test]
    fn dc_gain_is_regularized_unity() {
        // H(0,0) = 1 for a unit-energy PSF, so M(0,0) = 1/(1+eps)
        let psf = Psf::generate(&Prescription::new(-2f64, 0f64, 0f64), 32, 575f64, 1f64).unwrap();
        let filter = DeconvolutionFilter::new(&psf, 1e-3);
        let dc = filter.get(0, 0);
        assert!((dc.re - 1f64 / 1.001).abs() < 1e-6);
        assert!(dc.im.abs() < 1e-6);
    }
    #[test]
    fn filter_matches_psf_size() {
        let psf = Psf::generate(&Prescription::default(), 48, 575f64, 1f64).unwrap();
        let filter = DeconvolutionFilter::new(&psf, DEFAULT_EPSILON);
        assert_eq!(filter.size(), 48);
    }
    #[test]
    fn filter_is_finite_everywhere() {
        // strong blur has deep spectral nulls, epsilon must keep M finite
        let psf = Psf::generate(
            &Prescription::new(-6f64, -2f64, 70f64).pupil_radius(3.5),
            64,
            575f64,
            1f64,
        )
        .unwrap();
        let filter = DeconvolutionFilter::new(&psf, 1e-4);
        for cell in filter.grid().cells() {
            assert!(cell.re.is_finite() && cell.im.is_finite());
        }
    }
    #[test]
    fn larger_epsilon_damps_high_frequencies() {
        let psf = Psf::generate(&Prescription::new(-3f64, 0f64, 0f64), 32, 575f64, 1f64).unwrap();
        let sharp = DeconvolutionFilter::new(&psf, 1e-4);
        let damped = DeconvolutionFilter::new(&psf, 1e-2);
        let norm = |f: &DeconvolutionFilter| {
            f.grid()
                .cells()
                .iter()
                .map(|c| c.norm())
                .fold(0f64, f64::max)
        };
        assert!(norm(&damped) < norm(&sharp));
    }
}
