//! Marshalling between a UI thread and the audio thread.
//!
//! The audio thread owns the [`Engine`](crate::Engine) and drains control
//! messages at the start of every block. Nothing here blocks the audio
//! thread; only the request/reply calls block the caller.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::{
    Error,
    channel::ChannelId,
    dpcm::{DpcmPatch, DpcmSample},
    envelope::EnvelopeKind,
    midi::MidiMessage,
    params::{Param, ParamSync},
    telemetry::{EnvelopeSteps, LossySender, lossy},
};

pub(crate) const CONTROL_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) type ControlReplySender<T> = Sender<Result<T, Error>>;

pub(crate) enum ControlMessage {
    Midi(MidiMessage),
    SetParam(usize, f64),
    SetActiveChannel(ChannelId),
    SetEnvelopeValue {
        channel: ChannelId,
        kind: EnvelopeKind,
        step: usize,
        value: i32,
    },
    SetPitchBendRange(u8),
    AddSample(DpcmSample),
    SetDpcmPatch(usize, DpcmPatch),
    SaveState(ControlReplySender<Vec<u8>>),
    LoadState(Vec<u8>, ControlReplySender<()>),
}

/// Audio-thread end, handed to [`Engine::attach`](crate::Engine::attach).
#[derive(Debug)]
pub struct EngineLink {
    pub(crate) ctrl_rx: Receiver<ControlMessage>,
    pub(crate) feedback: LossySender<ParamSync>,
    pub(crate) telemetry: LossySender<EnvelopeSteps>,
}

impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMessage::Midi(msg) => f.debug_tuple("Midi").field(msg).finish(),
            ControlMessage::SetParam(index, value) => {
                f.debug_tuple("SetParam").field(index).field(value).finish()
            }
            ControlMessage::SetActiveChannel(ch) => f.debug_tuple("SetActiveChannel").field(ch).finish(),
            ControlMessage::SetEnvelopeValue { channel, kind, step, value } => f
                .debug_struct("SetEnvelopeValue")
                .field("channel", channel)
                .field("kind", kind)
                .field("step", step)
                .field("value", value)
                .finish(),
            ControlMessage::SetPitchBendRange(range) => {
                f.debug_tuple("SetPitchBendRange").field(range).finish()
            }
            ControlMessage::AddSample(sample) => f.debug_tuple("AddSample").field(&sample.name()).finish(),
            ControlMessage::SetDpcmPatch(class, patch) => {
                f.debug_tuple("SetDpcmPatch").field(class).field(patch).finish()
            }
            ControlMessage::SaveState(_) => f.write_str("SaveState"),
            ControlMessage::LoadState(blob, _) => f.debug_tuple("LoadState").field(&blob.len()).finish(),
        }
    }
}

/// UI-side handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EngineController {
    ctrl_tx: Sender<ControlMessage>,
    feedback_rx: Receiver<ParamSync>,
    telemetry_rx: Receiver<EnvelopeSteps>,
}

/// Creates a connected controller/link pair. Feedback and telemetry queues
/// hold `telemetry_capacity` entries and drop the oldest when full.
pub fn channel(telemetry_capacity: usize) -> (EngineController, EngineLink) {
    let (ctrl_tx, ctrl_rx) = unbounded();
    let (feedback, feedback_rx) = lossy(telemetry_capacity);
    let (telemetry, telemetry_rx) = lossy(telemetry_capacity);
    (
        EngineController {
            ctrl_tx,
            feedback_rx,
            telemetry_rx,
        },
        EngineLink {
            ctrl_rx,
            feedback,
            telemetry,
        },
    )
}

impl EngineController {
    fn send(&self, msg: ControlMessage) -> Result<(), Error> {
        self.ctrl_tx.send(msg).map_err(|_| Error::ControlDisconnected)
    }

    fn send_with_reply<T>(
        &self,
        op: &'static str,
        timeout: Duration,
        build: impl FnOnce(ControlReplySender<T>) -> ControlMessage,
    ) -> Result<T, Error> {
        let (reply_tx, reply_rx) = bounded::<Result<T, Error>>(1);
        self.send(build(reply_tx))?;
        match reply_rx.recv_timeout(timeout) {
            Ok(res) => res,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(Error::ControlTimeout { op }),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(Error::ControlDisconnected),
        }
    }

    pub fn send_midi(&self, msg: MidiMessage) -> Result<(), Error> {
        self.send(ControlMessage::Midi(msg))
    }

    /// Raw bytes are parsed here; anything that is not a channel voice
    /// message is dropped.
    pub fn send_midi_bytes(&self, bytes: &[u8]) -> Result<(), Error> {
        match MidiMessage::parse(bytes) {
            Some(msg) => self.send_midi(msg),
            None => Ok(()),
        }
    }

    pub fn set_param(&self, index: usize, value: f64) -> Result<(), Error> {
        if Param::from_index(index).is_none() {
            return Err(Error::UnknownParam(index));
        }
        self.send(ControlMessage::SetParam(index, value))
    }

    pub fn set_active_channel(&self, channel: ChannelId) -> Result<(), Error> {
        self.send(ControlMessage::SetActiveChannel(channel))
    }

    pub fn set_envelope_value(
        &self,
        channel: ChannelId,
        kind: EnvelopeKind,
        step: usize,
        value: i32,
    ) -> Result<(), Error> {
        self.send(ControlMessage::SetEnvelopeValue {
            channel,
            kind,
            step,
            value,
        })
    }

    pub fn set_pitch_bend_range(&self, semitones: u8) -> Result<(), Error> {
        self.send(ControlMessage::SetPitchBendRange(semitones))
    }

    pub fn add_sample(&self, sample: DpcmSample) -> Result<(), Error> {
        self.send(ControlMessage::AddSample(sample))
    }

    pub fn set_dpcm_patch(&self, pitch_class: usize, patch: DpcmPatch) -> Result<(), Error> {
        self.send(ControlMessage::SetDpcmPatch(pitch_class, patch))
    }

    /// Waits for the audio thread to serialize the current state.
    pub fn save_state(&self) -> Result<Vec<u8>, Error> {
        self.send_with_reply("save_state", CONTROL_REPLY_TIMEOUT, ControlMessage::SaveState)
    }

    pub fn load_state(&self, blob: Vec<u8>) -> Result<(), Error> {
        self.send_with_reply("load_state", CONTROL_REPLY_TIMEOUT, |reply| {
            ControlMessage::LoadState(blob, reply)
        })
    }

    /// Envelope fields the engine clamped since the last call.
    pub fn drain_feedback(&self) -> impl Iterator<Item = ParamSync> + '_ {
        self.feedback_rx.try_iter()
    }

    pub fn drain_telemetry(&self) -> impl Iterator<Item = EnvelopeSteps> + '_ {
        self.telemetry_rx.try_iter()
    }
}
