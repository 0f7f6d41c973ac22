//! Diffraction point-spread function of an aberrated eye
//!
//! The pupil function is a pure-phase aperture over the normalized pupil
//! disk: unit magnitude inside, opaque outside, with the phase set by the
//! wavefront aberration at the working wavelength. Its forward spectrum,
//! squared and energy-normalized, is the [`Psf`] that characterizes how
//! the eye blurs a point source on the display.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, ImageError, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use num_complex::Complex64;
use rusttype::{Font, Scale};

use crate::fourier::{ComplexGrid, Spectral2d};
use crate::prescription::{Prescription, WavefrontCoefficients};

#[derive(Debug, thiserror::Error)]
pub enum PsfError {
    #[error("invalid PSF grid side {0}, must be at least 2")]
    Size(usize),
    #[error("failed to create image buffer")]
    Image,
    #[error("failed to save PSF to png file {1:?}")]
    Save(#[source] ImageError, PathBuf),
}
type Result<T> = std::result::Result<T, PsfError>;

/// Builds the complex pupil function on a `size`×`size` grid
///
/// The wavelength is given in nanometers and converted to millimeters,
/// the unit the wavefront coefficients are expressed in. Cells inside
/// the aperture carry `exp(-i 2π W/λ)`; cells outside are zero.
pub fn pupil_function(
    coeffs: &WavefrontCoefficients,
    size: usize,
    wavelength_nm: f64,
    strength: f64,
) -> Result<ComplexGrid> {
    if size < 2 {
        return Err(PsfError::Size(size));
    }
    let lambda = wavelength_nm * 1e-6;
    let half = (size - 1) as f64 / 2f64;
    let mut pupil = ComplexGrid::zeros(size);
    for i in 0..size {
        let nx = (i as f64 - half) / half;
        for j in 0..size {
            let ny = (j as f64 - half) / half;
            if nx * nx + ny * ny <= 1f64 {
                let w = coeffs.wavefront(nx, ny, strength);
                let phase = -2f64 * PI * w / lambda;
                pupil.set(i, j, Complex64::new(phase.cos(), phase.sin()));
            }
        }
    }
    Ok(pupil)
}

/// Energy-normalized point-spread function
///
/// Square grid of non-negative values summing to 1 (within floating
/// point tolerance). Immutable once produced; the zero-frequency origin
/// of the underlying spectrum is at cell (0,0), so convolving with the
/// PSF does not translate the image.
#[derive(Debug, Clone)]
pub struct Psf {
    size: usize,
    values: Vec<f64>,
}
impl Psf {
    /// Reduces a pupil function to its normalized PSF
    pub fn from_pupil(mut pupil: ComplexGrid, spectral: &Spectral2d) -> Self {
        spectral.forward(&mut pupil);
        // |H|^2 with tiny negative numerical noise clamped away
        let mut values: Vec<f64> = pupil
            .cells()
            .iter()
            .map(|h| (h.re * h.re + h.im * h.im).max(0f64))
            .collect();
        let mut sum: f64 = values.iter().sum();
        if sum <= 0f64 {
            // degenerate all-zero spectrum, keep the grid finite
            sum = 1f64;
        }
        values.iter_mut().for_each(|v| *v /= sum);
        Self {
            size: pupil.size(),
            values,
        }
    }
    /// Composes prescription → coefficients → pupil → PSF
    pub fn generate(
        prescription: &Prescription,
        size: usize,
        wavelength_nm: f64,
        strength: f64,
    ) -> Result<Self> {
        let coeffs = prescription.wavefront_coefficients();
        let pupil = pupil_function(&coeffs, size, wavelength_nm, strength)?;
        let spectral = Spectral2d::new(size);
        Ok(Self::from_pupil(pupil, &spectral))
    }
    /// As above, reusing an already planned transform of matching size
    pub fn generate_with(
        prescription: &Prescription,
        spectral: &Spectral2d,
        wavelength_nm: f64,
        strength: f64,
    ) -> Result<Self> {
        let coeffs = prescription.wavefront_coefficients();
        let pupil = pupil_function(&coeffs, spectral.size(), wavelength_nm, strength)?;
        Ok(Self::from_pupil(pupil, spectral))
    }
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    /// Total energy, ≈ 1 by construction
    pub fn energy(&self) -> f64 {
        self.values.iter().sum()
    }
    /// The PSF as a complex grid with zero imaginary part
    pub fn as_complex_grid(&self) -> ComplexGrid {
        ComplexGrid::from_real(self.size, &self.values)
    }
    /// Normalize to 0-1 against the given extrema and apply the
    /// CUBEHELIX colormap
    fn to_rgb(&self, min_val: f64, max_val: f64) -> Vec<u8> {
        let range = max_val - min_val;
        self.values
            .iter()
            .flat_map(|&x| {
                let value = if range > 0f64 {
                    (x - min_val) / range
                } else {
                    0.5
                };
                let color = colorous::CUBEHELIX.eval_continuous(value);
                [color.r, color.g, color.b]
            })
            .collect()
    }
    /// Save the PSF as a colormapped PNG for inspection
    ///
    /// `minmax` overrides the normalization extrema, so several PSFs
    /// (e.g. the OD/OS pair) can share a consistent scale; by default
    /// the PSF's own extrema are used. An optional annotation (usually
    /// the prescription summary) is drawn in the top left corner.
    pub fn save_png(
        &self,
        filename: impl AsRef<Path>,
        minmax: Option<(f64, f64)>,
        annotation: Option<&str>,
    ) -> Result<()> {
        let (min_val, max_val) = minmax.unwrap_or_else(|| extrema(&self.values));
        let rgb_data = self.to_rgb(min_val, max_val);
        let mut image = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(
            self.size as u32,
            self.size as u32,
            rgb_data,
        )
        .ok_or(PsfError::Image)?;
        if let Some(text) = annotation {
            draw_annotation(&mut image, text);
        }
        image
            .save(&filename)
            .map_err(|e| PsfError::Save(e, filename.as_ref().to_path_buf()))?;
        Ok(())
    }
}

/// Minimum and maximum over one or more PSFs, for shared normalization
pub fn find_global_extrema<'a>(psfs: impl IntoIterator<Item = &'a Psf>) -> (f64, f64) {
    let mut min_val = f64::INFINITY;
    let mut max_val = f64::NEG_INFINITY;
    for psf in psfs {
        let (lo, hi) = extrema(&psf.values);
        min_val = min_val.min(lo);
        max_val = max_val.max(hi);
    }
    (min_val, max_val)
}

fn extrema(values: &[f64]) -> (f64, f64) {
    (
        values.iter().cloned().fold(f64::INFINITY, f64::min),
        values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    )
}

const FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Draw the annotation text in the top left corner, skipping silently
/// when no system font is available
fn draw_annotation(image: &mut RgbImage, text: &str) {
    let font = match std::fs::read(FONT_PATH)
        .ok()
        .and_then(Font::try_from_vec)
    {
        Some(font) => font,
        None => {
            log::debug!("no font at {FONT_PATH}, skipping PSF annotation");
            return;
        }
    };
    let scale = Scale::uniform(16.0);
    let white = Rgb([255u8, 255u8, 255u8]);
    let mut y = 5i32;
    for line in text.lines() {
        draw_text_mut(image, white, 5, y, scale, &font, line);
        y += 22;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pupil_is_pure_phase_inside_aperture() {
        let coeffs = Prescription::default().wavefront_coefficients();
        let pupil = pupil_function(&coeffs, 33, 575f64, 1f64).unwrap();
        let half = 16f64;
        for i in 0..33 {
            for j in 0..33 {
                let nx = (i as f64 - half) / half;
                let ny = (j as f64 - half) / half;
                let cell = pupil.get(i, j);
                if nx * nx + ny * ny <= 1f64 {
                    assert!((cell.norm() - 1f64).abs() < 1e-12);
                } else {
                    assert_eq!(cell, Complex64::new(0f64, 0f64));
                }
            }
        }
    }
    #[test]
    fn zero_aberration_pupil_is_real_aperture() {
        let coeffs = Prescription::default().wavefront_coefficients();
        let pupil = pupil_function(&coeffs, 32, 575f64, 1f64).unwrap();
        for cell in pupil.cells() {
            assert!(cell.im.abs() < 1e-12);
            assert!(cell.re == 0f64 || (cell.re - 1f64).abs() < 1e-12);
        }
    }
    #[test]
    fn psf_energy_is_unit() {
        for rx in [
            Prescription::default(),
            Prescription::new(-2f64, 0f64, 0f64),
            Prescription::new(-4.5, -1.75, 120f64).pupil_radius(3f64),
        ] {
            for &size in &[32usize, 64] {
                let psf = Psf::generate(&rx, size, 575f64, 1f64).unwrap();
                assert!((psf.energy() - 1f64).abs() < 1e-3);
                assert!(psf.values().iter().all(|&v| v >= 0f64));
            }
        }
    }
    #[test]
    fn diffraction_psf_is_symmetric_about_origin() {
        // zero aberration: the PSF is an Airy-like pattern, rotationally
        // symmetric about the zero-frequency origin (indices wrap)
        let n = 64;
        let psf = Psf::generate(&Prescription::default(), n, 575f64, 1f64).unwrap();
        let at = |i: usize, j: usize| psf.values()[(i % n) * n + (j % n)];
        for i in 0..n {
            for j in 0..n {
                let point = at(i, j);
                // point reflection
                assert!((point - at(n - i, n - j)).abs() < 1e-9);
                // quarter turn
                assert!((point - at(j, n - i)).abs() < 1e-9);
            }
        }
    }
    #[test]
    fn undersized_grid_is_rejected() {
        let coeffs = Prescription::default().wavefront_coefficients();
        assert!(matches!(
            pupil_function(&coeffs, 1, 575f64, 1f64),
            Err(PsfError::Size(1))
        ));
    }
}
