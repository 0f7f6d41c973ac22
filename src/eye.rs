//! Per-eye pipeline composition
//!
//! [`EyeProcessor`] carries the knobs shared by both eyes (grid side,
//! wavelength, blur strength, regularization) and runs the whole chain
//! for one prescription: PSF, deconvolution filter, blurred,
//! pre-corrected and simulated-retinal frames, bundled per eye in an
//! [`EyeResult`]. The OD and OS chains share nothing mutable, so
//! [`StereoPair::process`] runs them as two parallel tasks.

use crate::catalog::PsfCatalog;
use crate::filter::{DeconvolutionFilter, DEFAULT_EPSILON};
use crate::fourier::Spectral2d;
use crate::image::{Frame, FrameError};
use crate::prescription::{Eye, Prescription};
use crate::psf::{Psf, PsfError};

#[derive(Debug, thiserror::Error)]
pub enum EyeError {
    #[error("non-positive viewing distance {0} m")]
    ViewingDistance(f64),
    #[error("non-positive pupil radius {0} mm")]
    PupilRadius(f64),
    #[error("failed to build the PSF")]
    Psf(#[from] PsfError),
    #[error("failed to process the frame")]
    Frame(#[from] FrameError),
}
type Result<T> = std::result::Result<T, EyeError>;

/// Everything the pipeline produces for one eye
#[derive(Debug, Clone)]
pub struct EyeResult {
    pub eye: Eye,
    pub prescription: Prescription,
    pub psf: Psf,
    pub filter: DeconvolutionFilter,
    /// What the uncorrected eye perceives of the original frame
    pub blurred: Frame,
    /// The frame to display instead of the original
    pub precorrected: Frame,
    /// What the eye perceives of the pre-corrected frame
    pub retinal: Frame,
}

/// Pipeline configuration shared by both eyes
///
/// Consuming builder with working defaults; one processor is typically
/// built per display configuration and reused across prescriptions.
#[derive(Debug, Clone)]
pub struct EyeProcessor {
    size: usize,
    wavelength_nm: f64,
    strength: f64,
    epsilon: f64,
}
impl Default for EyeProcessor {
    fn default() -> Self {
        Self {
            size: 256,
            wavelength_nm: 575f64,
            strength: 1f64,
            epsilon: DEFAULT_EPSILON,
        }
    }
}
impl EyeProcessor {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
    pub fn wavelength_nm(self, value: f64) -> Self {
        Self {
            wavelength_nm: value,
            ..self
        }
    }
    pub fn strength(self, value: f64) -> Self {
        Self {
            strength: value,
            ..self
        }
    }
    pub fn epsilon(self, value: f64) -> Self {
        Self {
            epsilon: value,
            ..self
        }
    }
    pub fn size(&self) -> usize {
        self.size
    }

    fn plan(&self) -> Result<Spectral2d> {
        if self.size < 2 {
            return Err(EyeError::Psf(PsfError::Size(self.size)));
        }
        Ok(Spectral2d::new(self.size))
    }

    fn validate(prescription: &Prescription) -> Result<()> {
        if prescription.viewing_distance <= 0f64 {
            return Err(EyeError::ViewingDistance(prescription.viewing_distance));
        }
        if prescription.pupil_radius <= 0f64 {
            return Err(EyeError::PupilRadius(prescription.pupil_radius));
        }
        Ok(())
    }

    /// Runs the full chain for one eye
    pub fn process(&self, eye: Eye, prescription: &Prescription, frame: &Frame) -> Result<EyeResult> {
        Self::validate(prescription)?;
        let spectral = self.plan()?;
        log::info!("{eye}: generating PSF for {prescription}");
        let psf = Psf::generate_with(prescription, &spectral, self.wavelength_nm, self.strength)?;
        self.finish(eye, prescription, frame, psf, &spectral)
    }

    /// As [`EyeProcessor::process`], memoizing the PSF through a catalog
    ///
    /// The catalog is an injected collaborator; a lookup hit skips the
    /// pupil/transform work entirely.
    pub fn process_cached(
        &self,
        eye: Eye,
        prescription: &Prescription,
        frame: &Frame,
        catalog: &mut dyn PsfCatalog,
    ) -> Result<EyeResult> {
        Self::validate(prescription)?;
        let spectral = self.plan()?;
        let psf = match catalog.lookup(prescription) {
            Some(entry) => {
                log::debug!("{eye}: catalog hit for {prescription}");
                entry.psf.clone()
            }
            None => {
                log::info!("{eye}: catalog miss, generating PSF for {prescription}");
                let psf =
                    Psf::generate_with(prescription, &spectral, self.wavelength_nm, self.strength)?;
                catalog.upsert(prescription.clone(), psf.clone(), None);
                psf
            }
        };
        self.finish(eye, prescription, frame, psf, &spectral)
    }

    fn finish(
        &self,
        eye: Eye,
        prescription: &Prescription,
        frame: &Frame,
        psf: Psf,
        spectral: &Spectral2d,
    ) -> Result<EyeResult> {
        let filter = DeconvolutionFilter::with_spectral(&psf, self.epsilon, spectral);
        let mut blur_kernel = psf.as_complex_grid();
        spectral.forward(&mut blur_kernel);

        log::debug!("{eye}: filtering frames");
        let blurred = frame.apply_kernel_with(&blur_kernel, spectral)?;
        let precorrected = frame.apply_kernel_with(filter.grid(), spectral)?;
        let retinal = precorrected.apply_kernel_with(&blur_kernel, spectral)?;

        Ok(EyeResult {
            eye,
            prescription: prescription.clone(),
            psf,
            filter,
            blurred,
            precorrected,
            retinal,
        })
    }
}

/// The two per-eye results of one stereo run
///
/// OD and OS are siblings computed over independent grids; nothing is
/// shared between them but the input frame.
#[derive(Debug, Clone)]
pub struct StereoPair {
    pub od: EyeResult,
    pub os: EyeResult,
}
impl StereoPair {
    /// Runs both eyes in parallel over the same frame
    pub fn process(
        processor: &EyeProcessor,
        od_rx: &Prescription,
        os_rx: &Prescription,
        frame: &Frame,
    ) -> Result<Self> {
        let (od, os) = rayon::join(
            || processor.process(Eye::Od, od_rx, frame),
            || processor.process(Eye::Os, os_rx, frame),
        );
        Ok(Self { od: od?, os: os? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;

    fn fixture(size: usize) -> Frame {
        Frame::from_fn(size, |i, j| {
            let v = 0.2 + 0.5 * ((i + j) as f64 / (2 * size - 2) as f64);
            [v, v, v]
        })
        .unwrap()
    }

    #[test]
    fn processor_produces_consistent_sizes() {
        let processor = EyeProcessor::new(32);
        let frame = fixture(32);
        let result = processor
            .process(Eye::Od, &Prescription::new(-2f64, -0.5, 30f64), &frame)
            .unwrap();
        assert_eq!(result.psf.size(), 32);
        assert_eq!(result.filter.size(), 32);
        assert_eq!(result.blurred.size(), 32);
        assert_eq!(result.precorrected.size(), 32);
        assert_eq!(result.retinal.size(), 32);
    }
    #[test]
    fn invalid_prescription_is_rejected() {
        let processor = EyeProcessor::new(16);
        let frame = fixture(16);
        let rx = Prescription::new(-1f64, 0f64, 0f64).viewing_distance(0f64);
        assert!(matches!(
            processor.process(Eye::Od, &rx, &frame),
            Err(EyeError::ViewingDistance(_))
        ));
        let rx = Prescription::new(-1f64, 0f64, 0f64).pupil_radius(-2.5);
        assert!(matches!(
            processor.process(Eye::Os, &rx, &frame),
            Err(EyeError::PupilRadius(_))
        ));
    }
    #[test]
    fn stereo_eyes_are_independent() {
        let processor = EyeProcessor::new(32);
        let frame = fixture(32);
        let od_rx = Prescription::new(-2f64, 0f64, 0f64);
        let os_rx = Prescription::new(-3.5, -1f64, 100f64);
        let pair = StereoPair::process(&processor, &od_rx, &os_rx, &frame).unwrap();
        assert_eq!(pair.od.eye, Eye::Od);
        assert_eq!(pair.os.eye, Eye::Os);
        // different prescriptions must yield different PSFs
        let same = pair
            .od
            .psf
            .values()
            .iter()
            .zip(pair.os.psf.values())
            .all(|(a, b)| (a - b).abs() < 1e-12);
        assert!(!same);
        // and each must match a solo run of the same eye
        let solo = processor.process(Eye::Od, &od_rx, &frame).unwrap();
        for (a, b) in pair.od.psf.values().iter().zip(solo.psf.values()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
    #[test]
    fn cached_run_reuses_the_catalog_entry() {
        let processor = EyeProcessor::new(16);
        let frame = fixture(16);
        let mut catalog = MemoryCatalog::new();
        let rx = Prescription::new(-2.25, -0.75, 30f64);

        processor
            .process_cached(Eye::Od, &rx, &frame, &mut catalog)
            .unwrap();
        assert_eq!(catalog.len(), 1);

        // jittered prescription hits the same entry instead of growing
        let jittered = Prescription::new(-2.25 + 4e-7, -0.75, 30f64);
        processor
            .process_cached(Eye::Od, &jittered, &frame, &mut catalog)
            .unwrap();
        assert_eq!(catalog.len(), 1);
    }
    #[test]
    fn retinal_frame_tracks_the_original() {
        // the whole point: viewing the pre-corrected frame through the
        // aberrated eye must beat viewing the original through it
        let size = 64;
        use std::f64::consts::TAU;
        let frame = Frame::from_fn(size, |i, j| {
            // periodic so circular convolution sees no wrap discontinuity
            let v = 0.45
                + 0.2 * (TAU * i as f64 / size as f64).sin() * (TAU * j as f64 / size as f64).cos();
            [v, v, v]
        })
        .unwrap();
        // a gentle, well-sampled blur keeps the pre-corrected frame off
        // the [0,1] clamp so the comparison stays about the optics
        let processor = EyeProcessor::new(size).strength(0.02);
        let rx = Prescription::new(-1f64, 0f64, 0f64).pupil_radius(1f64);
        let result = processor.process(Eye::Od, &rx, &frame).unwrap();
        let corrected = result.retinal.luminance_mse(&frame);
        let uncorrected = result.blurred.luminance_mse(&frame);
        assert!(
            corrected < uncorrected,
            "pre-correction did not help: {} >= {}",
            corrected,
            uncorrected
        );
    }
}
