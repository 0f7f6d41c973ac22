use crate::{eye::EyeError, image::FrameError, psf::PsfError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `psf` module")]
    Psf(#[from] PsfError),
    #[error("Error in the `image` module")]
    Frame(#[from] FrameError),
    #[error("Error in the `eye` module")]
    Eye(#[from] EyeError),
}
