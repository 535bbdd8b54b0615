use loudnes_blip::BlipError;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ApuError {
    #[error("unsupported output sample rate {0} Hz")]
    InvalidSampleRate(u32),
    #[error("resampler setup failed: {0}")]
    Resampler(#[from] BlipError),
}
