/*!
# Vision pre-correction optics pipeline

Simulates how an eye's refractive error (sphere, cylinder, axis, pupil
size, viewing distance) degrades a displayed image and computes the
pre-correction that makes the retinal image approximate the sharp
original, for near-eye displays rendering per-user, per-eye corrected
content without physical lenses.

The chain, leaves first:

1. [`prescription`] turns a [`Prescription`] into the three low-order
   Zernike wavefront coefficients (oblique astigmatism, defocus,
   vertical astigmatism),
2. [`fourier`] provides the separable 2D spectral transform over square
   [`ComplexGrid`]s (forward unscaled, inverse `1/N` per axis),
3. [`psf`] builds the pure-phase pupil function and reduces its spectrum
   to the energy-normalized [`Psf`],
4. [`filter`] derives the regularized Wiener-style
   [`DeconvolutionFilter`],
5. [`image`] blurs or pre-corrects a [`Frame`] in the frequency domain,
   filtering luminance only and rebuilding color by luminance-ratio
   scaling.

[`eye`] composes the chain per eye and runs the OD/OS pair as two
independent parallel tasks; [`catalog`] is the memoization contract the
application shell plugs in.

## Example

```no_run
use vision_precorrect::{Eye, EyeProcessor, Frame, Prescription};

let frame = Frame::from_rgb_image(&image::open("scene.png")?.to_rgb8())?;
let rx = Prescription::new(-2.25, -0.75, 30.0);
let result = EyeProcessor::new(frame.size()).process(Eye::Od, &rx, &frame)?;
result.precorrected.to_rgb_image()?.save("precorrected.png")?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

pub mod catalog;
mod error;
pub mod eye;
pub mod filter;
pub mod fourier;
pub mod image;
pub mod prescription;
pub mod psf;

pub use catalog::{CatalogEntry, MemoryCatalog, PsfCatalog};
pub use error::Error;
pub use eye::{EyeProcessor, EyeResult, StereoPair};
pub use filter::{DeconvolutionFilter, DEFAULT_EPSILON};
pub use fourier::{ComplexGrid, Spectral2d};
pub use crate::image::{luminance, Frame};
pub use prescription::{adjusted_sphere, Eye, Prescription, WavefrontCoefficients};
pub use psf::Psf;
