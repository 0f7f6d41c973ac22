//! Separable 2D spectral transform over square complex grids
//!
//! The 2D DFT is computed as N independent 1D transforms along the rows
//! followed by N independent 1D transforms along the columns. The row
//! pass must fully complete before the column pass starts since every
//! column reads values written by every row transform; within a pass the
//! 1D transforms are mutually independent and run on the rayon pool.
//!
//! Normalization follows the MATLAB convention: the forward transform is
//! unscaled and the inverse applies `1/N` per axis so that
//! `inverse(forward(x)) ≈ x`. Every magnitude computed downstream (PSF
//! energy, filter denominator) assumes this convention; do not mix it
//! with a unitary transform.

use std::sync::Arc;

use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

/// Square N×N grid of complex values, row-major
///
/// Backs the pupil function, its spectrum, the deconvolution filter and
/// intermediate image spectra. Each grid is owned exclusively by the
/// computation that creates it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexGrid {
    n: usize,
    cells: Vec<Complex64>,
}
impl ComplexGrid {
    /// All-zero grid of side `n`
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            cells: vec![Complex64::new(0f64, 0f64); n * n],
        }
    }
    /// Grid with the given real part and zero imaginary part
    ///
    /// `values` is row-major of length `n²`.
    pub fn from_real(n: usize, values: &[f64]) -> Self {
        assert_eq!(values.len(), n * n, "value count does not match grid side");
        Self {
            n,
            cells: values
                .iter()
                .map(|&x| Complex64::new(x, 0f64))
                .collect(),
        }
    }
    pub fn from_cells(n: usize, cells: Vec<Complex64>) -> Self {
        assert_eq!(cells.len(), n * n, "cell count does not match grid side");
        Self { n, cells }
    }
    /// Grid side length
    pub fn size(&self) -> usize {
        self.n
    }
    pub fn cells(&self) -> &[Complex64] {
        &self.cells
    }
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        self.cells[i * self.n + j]
    }
    pub fn set(&mut self, i: usize, j: usize, value: Complex64) {
        self.cells[i * self.n + j] = value;
    }
    /// Real parts, row-major
    pub fn real(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.re).collect()
    }
    fn transpose(&mut self) {
        let n = self.n;
        for i in 0..n {
            for j in (i + 1)..n {
                self.cells.swap(i * n + j, j * n + i);
            }
        }
    }
}

/// Planned forward/inverse 2D transform for one grid side length
///
/// Plans are built once per size and reused across the pupil, filter and
/// image stages of a pipeline run.
pub struct Spectral2d {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}
impl Spectral2d {
    pub fn new(n: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n,
            forward: planner.plan_fft_forward(n),
            inverse: planner.plan_fft_inverse(n),
        }
    }
    pub fn size(&self) -> usize {
        self.n
    }
    /// In-place forward 2D transform, unscaled
    pub fn forward(&self, grid: &mut ComplexGrid) {
        self.separable_pass(grid, &self.forward);
    }
    /// In-place inverse 2D transform, scaled by `1/N` per axis
    pub fn inverse(&self, grid: &mut ComplexGrid) {
        self.separable_pass(grid, &self.inverse);
        let scale = 1f64 / (self.n * self.n) as f64;
        grid.cells.iter_mut().for_each(|c| *c *= scale);
    }
    /// Rows, then a transpose round trip so the column pass also runs on
    /// contiguous memory; the pass boundary is the row/column barrier
    fn separable_pass(&self, grid: &mut ComplexGrid, fft: &Arc<dyn Fft<f64>>) {
        debug_assert_eq!(grid.size(), self.n, "grid does not match planned size");
        let n = self.n;
        grid.cells
            .par_chunks_mut(n)
            .for_each(|row| fft.process(row));
        grid.transpose();
        grid.cells
            .par_chunks_mut(n)
            .for_each(|column| fft.process(column));
        grid.transpose();
    }
}
