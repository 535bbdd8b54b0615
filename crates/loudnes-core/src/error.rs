use loudnes_apu::ApuError;
use thiserror::Error;

use crate::state::StateError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("unsupported sample rate {0} Hz")]
    InvalidSampleRate(u32),
    #[error("unsupported block size {0}")]
    InvalidBlockSize(usize),
    #[error("unknown parameter index {0}")]
    UnknownParam(usize),
    #[error("invalid state blob: {0}")]
    State(#[from] StateError),
    #[error("chip setup failed: {0}")]
    Apu(#[from] ApuError),
    #[error("engine control channel disconnected")]
    ControlDisconnected,
    #[error("engine did not respond in time for {op}")]
    ControlTimeout { op: &'static str },
}
