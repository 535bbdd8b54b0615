//! Block renderer tying MIDI, voices, channels and the chip together.

use std::sync::Arc;

use loudnes_apu::{
    Apu,
    registers::{Register, Vrc6Register},
};
use tracing::{debug, trace, warn};

use crate::{
    Error,
    channel::ChannelId,
    channel_set::ChannelSet,
    config::EngineConfig,
    control::{ControlMessage, EngineLink},
    dpcm::{DpcmPatch, DpcmSample, DpcmSampleTable},
    envelope::{EnvelopeKind, Envelopes},
    midi::MidiMessage,
    note_table::NoteTables,
    params::{ChannelParam, GlobalParam, Param, ParamSync, ParamValues, as_bool, as_int},
    state,
    telemetry::EnvelopeSteps,
    voice::Voice,
};

/// Register state written at power-on and reset: DMC off, every tone
/// channel silent with the length counter halted, pulse sweeps parked with
/// negate set, VRC6 running at normal frequency.
const POWER_ON_WRITES: [(u16, u8); 9] = [
    (Register::Status.addr(), 0x0F),
    (Register::TriangleControl.addr(), 0x80),
    (Register::NoiseLength.addr(), 0x00),
    (Register::Pulse1Control.addr(), 0x30),
    (Register::Pulse2Control.addr(), 0x30),
    (Register::NoiseControl.addr(), 0x30),
    (Register::Pulse1Sweep.addr(), 0x08),
    (Register::Pulse2Sweep.addr(), 0x08),
    (Vrc6Register::FrequencyControl.addr(), 0x00),
];

/// Full-scale chip sample.
const SAMPLE_SCALE: f32 = 32767.0;

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    apu: Apu,
    channels: ChannelSet,
    voices: [Voice; ChannelId::COUNT],
    params: ParamValues,
    /// Linear output gain, 0.0..=1.0.
    gain: f32,
    omni: bool,
    active: ChannelId,
    /// Largest slice rendered in one pass.
    chunk_len: usize,
    scratch: Vec<i16>,
    link: Option<EngineLink>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;
        let tables = Arc::new(NoteTables::new());
        let apu = Apu::new(config.sample_rate)?;
        let channels = ChannelSet::new(tables, config.pitch_mode, config.region);
        let voices = std::array::from_fn(|_| {
            let mut voice = Voice::new();
            voice.set_pitch_bend_range(config.pitch_bend_range);
            voice
        });
        // The chip buffers about a second of audio; a chunk plus one
        // frame of overshoot must fit.
        let chunk_len = config.max_block_size.min(config.sample_rate as usize / 2);

        let mut engine = Self {
            apu,
            channels,
            voices,
            params: ParamValues::default(),
            gain: 1.0,
            omni: true,
            active: ChannelId::Pulse1,
            chunk_len,
            scratch: vec![0; chunk_len],
            link: None,
            config,
        };
        engine.power_on();
        engine.apply_all_params();
        debug!(
            sample_rate = engine.config.sample_rate,
            chunk_len,
            pitch_mode = ?engine.config.pitch_mode,
            region = %engine.config.region,
            "engine created"
        );
        Ok(engine)
    }

    /// Connects a UI controller. Its messages are applied at the start of
    /// every block.
    pub fn attach(&mut self, link: EngineLink) {
        self.link = Some(link);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn params(&self) -> &ParamValues {
        &self.params
    }

    pub fn omni(&self) -> bool {
        self.omni
    }

    /// Silences the chip and every voice. Envelope tables, samples and
    /// parameters are kept.
    pub fn reset(&mut self) {
        for (voice, channel) in self.voices.iter_mut().zip(self.channels.iter_mut()) {
            voice.reset(channel);
        }
        self.channels.reset();
        self.apu.reset();
        self.power_on();
        debug!("engine reset");
    }

    fn power_on(&mut self) {
        for (addr, value) in POWER_ON_WRITES {
            self.apu.write_register(addr, value);
        }
    }

    /// Renders `left.len()` frames (the shorter of the two buffers) into
    /// both outputs. The chip is mono; both sides get the same signal.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.drain_control();

        let frames = left.len().min(right.len());
        left[..frames].fill(0.0);
        right[..frames].fill(0.0);

        let mut start = 0;
        while start < frames {
            let end = (start + self.chunk_len).min(frames);
            self.render(&mut left[start..end], &mut right[start..end]);
            start = end;
        }

        if let (Some(link), Some(steps)) = (&self.link, self.envelope_steps()) {
            link.telemetry.send(steps);
        }
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len();
        let sample_rate = self.config.sample_rate;
        for (voice, channel) in self.voices.iter_mut().zip(self.channels.iter_mut()) {
            voice.process_block(channel, frames, sample_rate);
        }

        // Channels update once per emulation frame, so the chip may run up
        // to a frame ahead of the host.
        while self.apu.samples_avail() < frames {
            self.channels.update_apu(&mut self.apu);
            let dpcm = self.channels.dpcm();
            self.apu.end_frame(|addr| dpcm.byte_at(addr));
        }

        let read = self.apu.read_samples(&mut self.scratch[..frames]);
        let scale = self.gain / SAMPLE_SCALE;
        for ((&sample, l), r) in self.scratch[..read].iter().zip(left).zip(right) {
            let value = sample as f32 * scale;
            *l += value;
            *r += value;
        }
    }

    /// Queues raw MIDI bytes. Anything but a channel voice message is
    /// ignored.
    pub fn process_midi(&mut self, bytes: &[u8]) {
        match MidiMessage::parse(bytes) {
            Some(msg) => self.process_midi_message(&msg),
            None => trace!(?bytes, "ignoring MIDI message"),
        }
    }

    /// In omni mode every channel hears every message; otherwise MIDI
    /// channel `n` plays chip channel `n`.
    pub fn process_midi_message(&mut self, msg: &MidiMessage) {
        if self.omni {
            for voice in &mut self.voices {
                voice.enqueue(msg);
            }
        } else if let Some(voice) = self.voices.get_mut(msg.channel as usize) {
            voice.enqueue(msg);
        } else {
            trace!(channel = msg.channel, "no chip channel for MIDI channel; dropped");
        }
    }

    /// Applies a host parameter. Envelope fields are read back after the
    /// setter has clamped them; the returned [`ParamSync`] carries the
    /// values the host should display, already stored in [`Self::params`].
    /// Non-finite values fall back to the parameter's default.
    pub fn set_param(&mut self, index: usize, value: f64) -> Result<Option<ParamSync>, Error> {
        let param = Param::from_index(index).ok_or(Error::UnknownParam(index))?;
        let value = if value.is_finite() {
            value
        } else {
            warn!(index, value, "non-finite parameter value; using default");
            param.info().default
        };
        self.params.set(index, value);
        Ok(self.apply_param(param, value))
    }

    fn apply_param(&mut self, param: Param, value: f64) -> Option<ParamSync> {
        match param {
            Param::Global(GlobalParam::Gain) => {
                self.gain = (value.clamp(0.0, 100.0) / 100.0) as f32;
            }
            Param::Global(GlobalParam::NoteGlideTime) => {
                let seconds = value.clamp(0.0, crate::params::MAX_GLIDE_TIME_MS) / 1000.0;
                for voice in &mut self.voices {
                    voice.set_glide_time(seconds);
                }
            }
            Param::Global(GlobalParam::OmniMode) => {
                self.omni = as_bool(value);
                for (voice, channel) in self.voices.iter_mut().zip(self.channels.iter_mut()) {
                    voice.reset(channel);
                }
                debug!(omni = self.omni, "omni mode changed");
            }
            Param::Channel(id, ChannelParam::Enabled) => {
                self.apu.enable_channel(id.apu_channel(), as_bool(value));
            }
            Param::Channel(id, ChannelParam::KeyTrack) => {
                self.channels.get_mut(id).set_key_track(as_bool(value));
            }
            Param::Channel(id, ChannelParam::VelocitySensitive) => {
                self.channels.get_mut(id).set_velocity_sensitive(as_bool(value));
            }
            Param::Channel(id, ChannelParam::Legato) => {
                self.voices[id.index()].set_legato(as_bool(value));
            }
            Param::Channel(id, ChannelParam::Envelope(kind, field)) => {
                let env = self.channels.get_mut(id).envelopes_mut()?.get_mut(kind);
                field.write(env, as_int(value));
                let sync = ParamSync::read(id, env);
                for (index, value) in sync.param_updates() {
                    self.params.set(index, value);
                }
                return Some(sync);
            }
        }
        None
    }

    /// Re-applies every stored parameter, e.g. after loading state.
    pub fn apply_all_params(&mut self) {
        let values = self.params.clone();
        for param in Param::all() {
            self.apply_param(param, values.param(param));
        }
    }

    pub fn active_channel(&self) -> ChannelId {
        self.active
    }

    /// Selects the channel whose envelopes the editor shows. Routing is not
    /// affected.
    pub fn set_active_channel(&mut self, channel: ChannelId) {
        if self.active != channel {
            debug!(channel = channel.display_name(), "active channel changed");
            self.active = channel;
        }
    }

    /// The active channel's envelopes; `None` when the DPCM channel is
    /// selected.
    pub fn active_envelopes(&self) -> Option<&Envelopes> {
        self.channels.get(self.active).envelopes()
    }

    pub fn active_envelopes_mut(&mut self) -> Option<&mut Envelopes> {
        self.channels.get_mut(self.active).envelopes_mut()
    }

    /// Current step of the active channel's envelopes.
    pub fn envelope_steps(&self) -> Option<EnvelopeSteps> {
        self.active_envelopes().map(|envs| EnvelopeSteps {
            channel: self.active,
            steps: envs.steps(),
        })
    }

    /// Edits one step of an envelope table and returns the stored (clamped)
    /// value.
    pub fn set_envelope_value(
        &mut self,
        channel: ChannelId,
        kind: EnvelopeKind,
        step: usize,
        value: i32,
    ) -> Option<i32> {
        self.channels
            .get_mut(channel)
            .envelopes_mut()?
            .get_mut(kind)
            .set_value(step, value)
    }

    pub fn set_pitch_bend_range(&mut self, semitones: u8) {
        self.config.pitch_bend_range = semitones;
        for voice in &mut self.voices {
            voice.set_pitch_bend_range(semitones);
        }
    }

    pub fn dpcm(&self) -> &DpcmSampleTable {
        self.channels.dpcm()
    }

    pub fn add_sample(&mut self, sample: DpcmSample) -> usize {
        self.channels.dpcm_mut().add_sample(sample)
    }

    pub fn set_dpcm_patch(&mut self, pitch_class: usize, patch: DpcmPatch) {
        self.channels.dpcm_mut().set_patch(pitch_class, patch);
    }

    pub fn save_state(&self) -> Vec<u8> {
        state::save(&self.channels)
    }

    /// Loads envelope tables and samples, then re-applies the stored
    /// parameters so loop, release, length and speed come from them.
    pub fn load_state(&mut self, blob: &[u8]) -> Result<(), Error> {
        state::load(&mut self.channels, blob)?;
        self.apply_all_params();
        Ok(())
    }

    fn drain_control(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        while let Ok(msg) = link.ctrl_rx.try_recv() {
            self.handle_control(msg, &link);
        }
        self.link = Some(link);
    }

    fn handle_control(&mut self, msg: ControlMessage, link: &EngineLink) {
        match msg {
            ControlMessage::Midi(msg) => self.process_midi_message(&msg),
            ControlMessage::SetParam(index, value) => match self.set_param(index, value) {
                Ok(Some(sync)) => link.feedback.send(sync),
                Ok(None) => {}
                Err(err) => warn!(%err, "control: set_param failed"),
            },
            ControlMessage::SetActiveChannel(channel) => self.set_active_channel(channel),
            ControlMessage::SetEnvelopeValue {
                channel,
                kind,
                step,
                value,
            } => {
                self.set_envelope_value(channel, kind, step, value);
            }
            ControlMessage::SetPitchBendRange(semitones) => self.set_pitch_bend_range(semitones),
            ControlMessage::AddSample(sample) => {
                self.add_sample(sample);
            }
            ControlMessage::SetDpcmPatch(pitch_class, patch) => {
                self.set_dpcm_patch(pitch_class, patch)
            }
            ControlMessage::SaveState(reply) => {
                let _ = reply.send(Ok(self.save_state()));
            }
            ControlMessage::LoadState(blob, reply) => {
                let _ = reply.send(self.load_state(&blob));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).expect("default config")
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = Engine::new(EngineConfig::default().with_sample_rate(1_000));
        assert!(matches!(err, Err(Error::InvalidSampleRate(1_000))));
    }

    #[test]
    fn silent_engine_renders_silence() {
        let mut engine = engine();
        let (mut l, mut r) = (vec![1.0; 512], vec![1.0; 512]);
        engine.process_block(&mut l, &mut r);
        assert!(l.iter().all(|&s| s == 0.0));
        assert_eq!(l, r);
    }

    #[test]
    fn gain_param_scales_output() {
        let mut engine = engine();
        engine.process_midi(&[0x90, 69, 127]);
        let (mut l, mut r) = (vec![0.0; 2048], vec![0.0; 2048]);
        engine.process_block(&mut l, &mut r);
        let loud = l.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(loud > 0.01);

        engine.set_param(0, 0.0).expect("gain");
        engine.process_block(&mut l, &mut r);
        assert!(l.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn non_finite_params_fall_back_to_defaults() {
        let mut engine = engine();
        engine.process_midi(&[0x90, 69, 127]);
        engine.set_param(0, f64::NAN).expect("gain");
        engine.set_param(1, f64::INFINITY).expect("glide");
        assert_eq!(engine.params().get(0), Some(100.0));
        assert_eq!(engine.params().get(1), Some(0.0));

        let (mut l, mut r) = (vec![0.0; 1024], vec![0.0; 1024]);
        engine.process_block(&mut l, &mut r);
        assert!(l.iter().chain(&r).all(|s| s.is_finite()));
        assert!(l.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn reset_then_note_plays_again() {
        let mut engine = engine();
        let (mut l, mut r) = (vec![0.0; 2048], vec![0.0; 2048]);
        engine.process_midi(&[0x90, 57, 127]);
        engine.process_block(&mut l, &mut r);

        engine.reset();
        for channel in engine.channels().iter() {
            if let Some(envs) = channel.envelopes() {
                assert_eq!(envs.steps(), [None; 4], "{:?}", channel.id());
            }
        }

        engine.process_midi(&[0x90, 50, 127]);
        engine.process_block(&mut l, &mut r);
        assert!(l.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn enabled_param_mutes_chip_channel() {
        let mut engine = engine();
        let index = Param::Channel(ChannelId::Triangle, ChannelParam::Enabled).index();
        assert!(engine.apu().is_channel_enabled(loudnes_apu::ApuChannel::Triangle));
        engine.set_param(index, 0.0).expect("enabled");
        assert!(!engine.apu().is_channel_enabled(loudnes_apu::ApuChannel::Triangle));
    }

    #[test]
    fn long_blocks_render_in_chunks() {
        let mut engine = Engine::new(EngineConfig {
            max_block_size: 100,
            ..EngineConfig::default()
        })
        .expect("config");
        engine.process_midi(&[0x90, 60, 127]);
        let (mut l, mut r) = (vec![0.0; 1000], vec![0.0; 1000]);
        engine.process_block(&mut l, &mut r);
        assert!(l[900..].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn dpcm_selection_has_no_envelopes() {
        let mut engine = engine();
        engine.set_active_channel(ChannelId::Dpcm);
        assert!(engine.active_envelopes().is_none());
        assert_eq!(engine.envelope_steps(), None);
        assert_eq!(engine.set_envelope_value(ChannelId::Dpcm, EnvelopeKind::Volume, 0, 3), None);
    }
}
