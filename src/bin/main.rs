use std::fs::create_dir_all;
use std::path::PathBuf;

use anyhow::Context;
use image::imageops::{self, FilterType};
use indicatif::{ProgressBar, ProgressStyle};
use structopt::StructOpt;

use vision_precorrect::{
    psf::find_global_extrema, Eye, EyeProcessor, EyeResult, Frame, Prescription, StereoPair,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "vision-precorrect",
    about = "Simulating and pre-correcting refractive vision errors"
)]
struct Opt {
    /// Input image (cropped to its largest centered square)
    #[structopt(parse(from_os_str))]
    image: PathBuf,
    /// Output directory
    #[structopt(short, long, default_value = "precorrected", parse(from_os_str))]
    outdir: PathBuf,
    /// Processing grid side [pixel], defaults to the input image side
    #[structopt(long)]
    size: Option<u32>,
    /// Spherical power [diopter], negative for myopia
    #[structopt(short, long, default_value = "-2.0", allow_hyphen_values = true)]
    sphere: f64,
    /// Cylindrical power [diopter]
    #[structopt(short, long, default_value = "0.0", allow_hyphen_values = true)]
    cylinder: f64,
    /// Cylinder axis [degree]
    #[structopt(short, long, default_value = "0.0")]
    axis: f64,
    /// Pupil radius [mm]
    #[structopt(short, long, default_value = "2.5")]
    pupil: f64,
    /// Viewing distance [m]
    #[structopt(short, long, default_value = "1.25")]
    distance: f64,
    /// Left eye spherical power [diopter], switches to a stereo run
    #[structopt(long, allow_hyphen_values = true)]
    os_sphere: Option<f64>,
    /// Left eye cylindrical power [diopter]
    #[structopt(long, allow_hyphen_values = true)]
    os_cylinder: Option<f64>,
    /// Left eye cylinder axis [degree]
    #[structopt(long)]
    os_axis: Option<f64>,
    /// Working wavelength [nm]
    #[structopt(short, long, default_value = "575.0")]
    wavelength: f64,
    /// Blur strength scaling
    #[structopt(long, default_value = "1.0")]
    strength: f64,
    /// Deconvolution regularization
    #[structopt(short, long, default_value = "1e-3")]
    epsilon: f64,
}

/// Crops to the largest centered square, optionally resampling to `size`
fn load_frame(path: &PathBuf, size: Option<u32>) -> anyhow::Result<Frame> {
    let image = image::open(path)
        .with_context(|| format!("failed to open {:?}", path))?
        .to_rgb8();
    let (w, h) = image.dimensions();
    anyhow::ensure!(w > 0 && h > 0, "empty image {:?}", path);
    let side = w.min(h);
    let square = imageops::crop_imm(&image, (w - side) / 2, (h - side) / 2, side, side).to_image();
    let square = match size {
        Some(side) => imageops::resize(&square, side, side, FilterType::Triangle),
        None => square,
    };
    Ok(Frame::from_rgb_image(&square)?)
}

fn save_eye(
    result: &EyeResult,
    outdir: &PathBuf,
    minmax: (f64, f64),
    wavelength: f64,
    progress: &ProgressBar,
) -> anyhow::Result<()> {
    let tag = result.eye.to_string().to_lowercase();
    let annotation = format!("{} {}\n{:.0}nm", result.eye, result.prescription, wavelength);
    result.psf.save_png(
        outdir.join(format!("{tag}_psf.png")),
        Some(minmax),
        Some(&annotation),
    )?;
    progress.inc(1);
    for (name, frame) in [
        ("blurred", &result.blurred),
        ("precorrected", &result.precorrected),
        ("retinal", &result.retinal),
    ] {
        frame
            .to_rgb_image()?
            .save(outdir.join(format!("{tag}_{name}.png")))?;
        progress.inc(1);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let frame = load_frame(&opt.image, opt.size)?;
    let processor = EyeProcessor::new(frame.size())
        .wavelength_nm(opt.wavelength)
        .strength(opt.strength)
        .epsilon(opt.epsilon);
    let od_rx = Prescription::new(opt.sphere, opt.cylinder, opt.axis)
        .pupil_radius(opt.pupil)
        .viewing_distance(opt.distance);

    let stereo = opt.os_sphere.is_some() || opt.os_cylinder.is_some() || opt.os_axis.is_some();
    let results = if stereo {
        let os_rx = Prescription::new(
            opt.os_sphere.unwrap_or(opt.sphere),
            opt.os_cylinder.unwrap_or(opt.cylinder),
            opt.os_axis.unwrap_or(opt.axis),
        )
        .pupil_radius(opt.pupil)
        .viewing_distance(opt.distance);
        let pair = StereoPair::process(&processor, &od_rx, &os_rx, &frame)?;
        vec![pair.od, pair.os]
    } else {
        vec![processor.process(Eye::Od, &od_rx, &frame)?]
    };

    create_dir_all(&opt.outdir)
        .with_context(|| format!("failed to create output directory {:?}", opt.outdir))?;
    let progress = ProgressBar::new(4 * results.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    progress.set_message("Saving frames");

    // shared extrema keep the OD/OS PSF previews on one scale
    let minmax = find_global_extrema(results.iter().map(|r| &r.psf));
    for result in &results {
        save_eye(result, &opt.outdir, minmax, opt.wavelength, &progress)?;
    }
    progress.finish_with_message("All frames saved");
    Ok(())
}
