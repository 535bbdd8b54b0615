//! Monophonic voice allocation for one channel.
//!
//! Each channel is played by a single voice. MIDI events are queued as they
//! arrive and applied at the start of the next block; the voice keeps a
//! stack of held keys so releasing the newest key falls back to the one held
//! before it.

use tracing::trace;

use crate::{
    channel::Channel,
    midi::{CC_ALL_NOTES_OFF, CC_ALL_SOUND_OFF, CC_SUSTAIN, MidiKind, MidiMessage},
};

/// Events accepted per block before further ones are dropped.
pub const EVENT_QUEUE_CAPACITY: usize = 256;
const MAX_HELD_KEYS: usize = 128;
pub const DEFAULT_PITCH_BEND_RANGE: u8 = 2;

#[derive(Debug, Clone)]
pub struct Voice {
    events: Vec<MidiKind>,
    held: Vec<u8>,
    sounding: Option<u8>,
    /// A note-off arrived while the sustain pedal was down.
    sustained_release: bool,
    sustain: bool,
    legato: bool,
    /// Wheel position, -1.0..1.0.
    wheel: f64,
    pitch_bend_range: u8,
    /// Seconds for a glide to reach the new note.
    glide_time: f64,
    /// Remaining glide offset in octaves, and how much it shrinks per second.
    glide_offset: f64,
    glide_rate: f64,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            events: Vec::with_capacity(EVENT_QUEUE_CAPACITY),
            held: Vec::with_capacity(MAX_HELD_KEYS),
            sounding: None,
            sustained_release: false,
            sustain: false,
            legato: false,
            wheel: 0.0,
            pitch_bend_range: DEFAULT_PITCH_BEND_RANGE,
            glide_time: 0.0,
            glide_offset: 0.0,
            glide_rate: 0.0,
        }
    }
}

impl Voice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legato(&self) -> bool {
        self.legato
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.legato = legato;
    }

    pub fn set_glide_time(&mut self, seconds: f64) {
        self.glide_time = seconds.max(0.0);
    }

    pub fn set_pitch_bend_range(&mut self, semitones: u8) {
        self.pitch_bend_range = semitones;
    }

    /// The note currently sounding, if any.
    pub fn sounding(&self) -> Option<u8> {
        self.sounding
    }

    pub fn enqueue(&mut self, msg: &MidiMessage) {
        if self.events.len() == EVENT_QUEUE_CAPACITY {
            trace!(?msg, "voice event queue full; dropping");
            return;
        }
        self.events.push(msg.kind);
    }

    /// Applies queued events to `channel` and advances glide by `frames`
    /// samples.
    pub fn process_block(&mut self, channel: &mut Channel, frames: usize, sample_rate: u32) {
        let mut events = std::mem::take(&mut self.events);
        for event in events.drain(..) {
            self.apply(channel, event);
        }
        self.events = events;

        if self.glide_offset != 0.0 {
            let step = self.glide_rate * frames as f64 / sample_rate as f64;
            self.glide_offset = if self.glide_offset > 0.0 {
                (self.glide_offset - step).max(0.0)
            } else {
                (self.glide_offset + step).min(0.0)
            };
        }

        channel.set_pitch_bend(self.pitch_bend_octaves());
    }

    /// Silences the channel and forgets all held keys and controllers.
    pub fn reset(&mut self, channel: &mut Channel) {
        if self.sounding.take().is_some() {
            channel.release();
        }
        self.events.clear();
        self.held.clear();
        self.sustain = false;
        self.sustained_release = false;
        self.wheel = 0.0;
        self.glide_offset = 0.0;
        channel.set_pitch_bend(0.0);
    }

    fn pitch_bend_octaves(&self) -> f64 {
        self.wheel * self.pitch_bend_range as f64 / 12.0 + self.glide_offset
    }

    fn apply(&mut self, channel: &mut Channel, event: MidiKind) {
        match event {
            MidiKind::NoteOn { note, velocity } => self.note_on(channel, note, velocity),
            MidiKind::NoteOff { note, .. } => self.note_off(channel, note),
            MidiKind::ControlChange { controller, value } => match controller {
                CC_SUSTAIN => {
                    self.sustain = value >= 64;
                    if !self.sustain && self.sustained_release {
                        self.sustained_release = false;
                        self.release(channel);
                    }
                }
                CC_ALL_SOUND_OFF | CC_ALL_NOTES_OFF => {
                    self.held.clear();
                    self.sustained_release = false;
                    self.release(channel);
                }
                _ => trace!(controller, value, "unhandled controller"),
            },
            MidiKind::PitchWheel(value) => self.wheel = MidiMessage::pitch_wheel_amount(value),
            MidiKind::PolyAftertouch { .. }
            | MidiKind::ProgramChange(_)
            | MidiKind::ChannelAftertouch(_) => {}
        }
    }

    fn note_on(&mut self, channel: &mut Channel, note: u8, velocity: u8) {
        self.held.retain(|&k| k != note);
        if self.held.len() == MAX_HELD_KEYS {
            self.held.remove(0);
        }
        self.held.push(note);
        self.sustained_release = false;

        let retrigger = !(self.legato && self.sounding.is_some());
        self.start_glide(note);
        channel.trigger(note, velocity as f64 / 127.0, retrigger);
        self.sounding = Some(note);
    }

    fn note_off(&mut self, channel: &mut Channel, note: u8) {
        let was_top = self.held.last() == Some(&note);
        self.held.retain(|&k| k != note);
        if !was_top || self.sounding != Some(note) {
            return;
        }

        match self.held.last().copied() {
            Some(previous) => {
                self.start_glide(previous);
                channel.trigger(previous, channel.velocity(), !self.legato);
                self.sounding = Some(previous);
            }
            None if self.sustain => self.sustained_release = true,
            None => self.release(channel),
        }
    }

    fn release(&mut self, channel: &mut Channel) {
        if self.sounding.take().is_some() {
            channel.release();
        }
    }

    fn start_glide(&mut self, target: u8) {
        match self.sounding {
            Some(from) if self.glide_time > 0.0 && from != target => {
                // Start at the old pitch, relative to the new note.
                self.glide_offset += (from as f64 - target as f64) / 12.0;
                self.glide_rate = self.glide_offset.abs() / self.glide_time;
            }
            _ => self.glide_offset = 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        channel::ChannelId,
        config::PitchMode,
        envelope::EnvelopeState,
        note_table::{NoteTables, Region},
    };

    const RATE: u32 = 48_000;

    fn pulse() -> Channel {
        Channel::new(ChannelId::Pulse1, Arc::new(NoteTables::new()), PitchMode::Relative, Region::Ntsc)
    }

    fn send(voice: &mut Voice, ch: &mut Channel, msgs: &[MidiMessage]) {
        for msg in msgs {
            voice.enqueue(msg);
        }
        voice.process_block(ch, 64, RATE);
    }

    fn volume_state(ch: &Channel) -> EnvelopeState {
        ch.envelopes().map(|e| e.volume.state()).unwrap_or_default()
    }

    #[test]
    fn events_apply_at_block_start() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        voice.enqueue(&MidiMessage::note_on(0, 60, 127));
        assert_eq!(voice.sounding(), None);
        voice.process_block(&mut ch, 64, RATE);
        assert_eq!(voice.sounding(), Some(60));
        assert_eq!(ch.base_note(), 60);
        assert_eq!(volume_state(&ch), EnvelopeState::Initial);
    }

    #[test]
    fn release_of_newest_key_returns_to_previous() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        send(&mut voice, &mut ch, &[MidiMessage::note_on(0, 60, 127), MidiMessage::note_on(0, 64, 127)]);
        assert_eq!(ch.base_note(), 64);

        send(&mut voice, &mut ch, &[MidiMessage::note_off(0, 64)]);
        assert_eq!(voice.sounding(), Some(60));
        assert_eq!(ch.base_note(), 60);

        send(&mut voice, &mut ch, &[MidiMessage::note_off(0, 60)]);
        assert_eq!(voice.sounding(), None);
        assert_eq!(volume_state(&ch), EnvelopeState::Off);
    }

    #[test]
    fn releasing_a_buried_key_keeps_the_top_note() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        send(&mut voice, &mut ch, &[MidiMessage::note_on(0, 60, 127), MidiMessage::note_on(0, 64, 127)]);
        send(&mut voice, &mut ch, &[MidiMessage::note_off(0, 60)]);
        assert_eq!(voice.sounding(), Some(64));
        assert_eq!(volume_state(&ch), EnvelopeState::Initial);
    }

    #[test]
    fn legato_changes_pitch_without_restarting_envelopes() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        voice.set_legato(true);
        send(&mut voice, &mut ch, &[MidiMessage::note_on(0, 60, 64)]);
        let velocity = ch.velocity();
        // Two frames of envelope playback.
        let mut writer = crate::channel::test_support::RegisterLog::default();
        let samples = crate::dpcm::DpcmSampleTable::new();
        ch.update_apu(&samples, &mut writer);
        ch.update_apu(&samples, &mut writer);

        send(&mut voice, &mut ch, &[MidiMessage::note_on(0, 67, 127)]);
        assert_eq!(ch.base_note(), 67);
        assert_eq!(ch.velocity(), velocity);
        assert_eq!(ch.envelopes().and_then(|e| e.volume.step()), Some(2));
    }

    #[test]
    fn sustain_pedal_defers_release() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        let pedal = |value| MidiMessage::new(0, MidiKind::ControlChange { controller: CC_SUSTAIN, value });
        send(&mut voice, &mut ch, &[pedal(127), MidiMessage::note_on(0, 60, 127), MidiMessage::note_off(0, 60)]);
        assert_eq!(voice.sounding(), Some(60));

        send(&mut voice, &mut ch, &[pedal(0)]);
        assert_eq!(voice.sounding(), None);
    }

    #[test]
    fn all_notes_off_clears_held_keys() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        let all_off = MidiMessage::new(0, MidiKind::ControlChange { controller: CC_ALL_NOTES_OFF, value: 0 });
        send(&mut voice, &mut ch, &[MidiMessage::note_on(0, 60, 127), MidiMessage::note_on(0, 62, 127), all_off]);
        assert_eq!(voice.sounding(), None);
        send(&mut voice, &mut ch, &[MidiMessage::note_off(0, 62)]);
        assert_eq!(voice.sounding(), None);
    }

    #[test]
    fn wheel_bends_by_configured_range() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        voice.set_pitch_bend_range(12);
        send(&mut voice, &mut ch, &[MidiMessage::new(0, MidiKind::PitchWheel(-8192))]);
        assert_eq!(ch.pitch_bend_ratio(), 0.5);

        voice.reset(&mut ch);
        assert_eq!(ch.pitch_bend_ratio(), 1.0);
    }

    #[test]
    fn glide_starts_at_previous_pitch_and_settles() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        voice.set_glide_time(0.01);
        send(&mut voice, &mut ch, &[MidiMessage::note_on(0, 60, 127)]);
        assert_eq!(ch.pitch_bend_ratio(), 1.0);

        voice.enqueue(&MidiMessage::note_on(0, 72, 127));
        voice.process_block(&mut ch, 0, RATE);
        assert!((ch.pitch_bend_ratio() - 0.5).abs() < 1e-9);

        voice.process_block(&mut ch, 240, RATE);
        assert!(ch.pitch_bend_ratio() > 0.5 && ch.pitch_bend_ratio() < 1.0);

        voice.process_block(&mut ch, 480, RATE);
        assert_eq!(ch.pitch_bend_ratio(), 1.0);
    }

    #[test]
    fn full_queue_drops_extra_events() {
        let (mut voice, mut ch) = (Voice::new(), pulse());
        for _ in 0..EVENT_QUEUE_CAPACITY {
            voice.enqueue(&MidiMessage::new(0, MidiKind::ProgramChange(1)));
        }
        voice.enqueue(&MidiMessage::note_on(0, 60, 127));
        voice.process_block(&mut ch, 64, RATE);
        assert_eq!(voice.sounding(), None);
    }
}
