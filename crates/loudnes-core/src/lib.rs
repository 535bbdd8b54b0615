//! LoudNES synth core.
//!
//! MIDI drives one monophonic voice per chip channel. Each voice plays a
//! [`Channel`], which turns its note and envelope state into register writes
//! once per emulation frame; the [`Engine`] runs the chip until it has
//! enough samples for the host block.
//!
//! ```no_run
//! use loudnes_core::{Engine, EngineConfig};
//!
//! let mut engine = Engine::new(EngineConfig::default())?;
//! engine.process_midi(&[0x90, 69, 100]);
//! let (mut left, mut right) = (vec![0.0; 512], vec![0.0; 512]);
//! engine.process_block(&mut left, &mut right);
//! # Ok::<(), loudnes_core::Error>(())
//! ```

pub mod channel;
pub mod channel_set;
pub mod config;
pub mod control;
pub mod dpcm;
pub mod engine;
pub mod envelope;
mod error;
pub mod midi;
pub mod note_table;
pub mod params;
pub mod state;
pub mod telemetry;
pub mod voice;

pub use channel::{Channel, ChannelId};
pub use channel_set::ChannelSet;
pub use config::{EngineConfig, PitchMode};
pub use control::{EngineController, EngineLink};
pub use dpcm::{DpcmPatch, DpcmSample, DpcmSampleTable};
pub use engine::Engine;
pub use envelope::{Envelope, EnvelopeKind, EnvelopeState, Envelopes};
pub use error::Error;
pub use midi::{MidiKind, MidiMessage};
pub use note_table::{NoteTables, Region};
pub use params::{Param, ParamSync};
pub use telemetry::EnvelopeSteps;
