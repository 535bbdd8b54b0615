//! Channel voice messages as they arrive from the host.

use strum::FromRepr;

/// Sustain pedal.
pub const CC_SUSTAIN: u8 = 64;
pub const CC_ALL_SOUND_OFF: u8 = 120;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Pitch wheel centre; raw 14-bit values are re-centred on this.
const PITCH_WHEEL_CENTER: i16 = 0x2000;

/// High nibble of a channel voice status byte.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
enum Status {
    NoteOff = 0x8,
    NoteOn = 0x9,
    PolyAftertouch = 0xA,
    ControlChange = 0xB,
    ProgramChange = 0xC,
    ChannelAftertouch = 0xD,
    PitchWheel = 0xE,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiKind {
    NoteOff { note: u8, velocity: u8 },
    NoteOn { note: u8, velocity: u8 },
    PolyAftertouch { note: u8, pressure: u8 },
    ControlChange { controller: u8, value: u8 },
    ProgramChange(u8),
    ChannelAftertouch(u8),
    /// Signed wheel position, -8192..=8191.
    PitchWheel(i16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiMessage {
    /// Zero-based MIDI channel.
    pub channel: u8,
    pub kind: MidiKind,
}

impl MidiMessage {
    pub fn new(channel: u8, kind: MidiKind) -> Self {
        Self {
            channel: channel & 0x0F,
            kind,
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(channel, MidiKind::NoteOn { note, velocity })
    }

    pub fn note_off(channel: u8, note: u8) -> Self {
        Self::new(channel, MidiKind::NoteOff { note, velocity: 0 })
    }

    /// Decodes one channel voice message. System messages, running status
    /// and truncated input yield `None`. A note-on with velocity 0 is
    /// reported as a note-off.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if status & 0x80 == 0 {
            return None;
        }
        let channel = status & 0x0F;
        let data1 = || data.first().map(|b| b & 0x7F);
        let data2 = || data.get(1).map(|b| b & 0x7F);

        let kind = match Status::from_repr(status >> 4)? {
            Status::NoteOff => MidiKind::NoteOff {
                note: data1()?,
                velocity: data2()?,
            },
            Status::NoteOn => match (data1()?, data2()?) {
                (note, 0) => MidiKind::NoteOff { note, velocity: 0 },
                (note, velocity) => MidiKind::NoteOn { note, velocity },
            },
            Status::PolyAftertouch => MidiKind::PolyAftertouch {
                note: data1()?,
                pressure: data2()?,
            },
            Status::ControlChange => MidiKind::ControlChange {
                controller: data1()?,
                value: data2()?,
            },
            Status::ProgramChange => MidiKind::ProgramChange(data1()?),
            Status::ChannelAftertouch => MidiKind::ChannelAftertouch(data1()?),
            Status::PitchWheel => {
                let raw = data1()? as i16 | ((data2()? as i16) << 7);
                MidiKind::PitchWheel(raw - PITCH_WHEEL_CENTER)
            }
        };
        Some(Self { channel, kind })
    }

    /// Raw bytes of the message with a zero-velocity note-off encoded as
    /// `0x8n`.
    pub fn to_bytes(&self) -> ([u8; 3], usize) {
        let ch = self.channel;
        match self.kind {
            MidiKind::NoteOff { note, velocity } => ([0x80 | ch, note, velocity], 3),
            MidiKind::NoteOn { note, velocity } => ([0x90 | ch, note, velocity], 3),
            MidiKind::PolyAftertouch { note, pressure } => ([0xA0 | ch, note, pressure], 3),
            MidiKind::ControlChange { controller, value } => ([0xB0 | ch, controller, value], 3),
            MidiKind::ProgramChange(program) => ([0xC0 | ch, program, 0], 2),
            MidiKind::ChannelAftertouch(pressure) => ([0xD0 | ch, pressure, 0], 2),
            MidiKind::PitchWheel(value) => {
                let raw = (value.clamp(-PITCH_WHEEL_CENTER, PITCH_WHEEL_CENTER - 1) + PITCH_WHEEL_CENTER) as u16;
                ([0xE0 | ch, (raw & 0x7F) as u8, (raw >> 7) as u8], 3)
            }
        }
    }

    /// Wheel position in -1.0..1.0.
    pub fn pitch_wheel_amount(value: i16) -> f64 {
        value as f64 / PITCH_WHEEL_CENTER as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_note_messages() {
        assert_eq!(MidiMessage::parse(&[0x93, 60, 100]), Some(MidiMessage::note_on(3, 60, 100)));
        assert_eq!(
            MidiMessage::parse(&[0x80, 60, 64]),
            Some(MidiMessage::new(0, MidiKind::NoteOff { note: 60, velocity: 64 }))
        );
    }

    #[test]
    fn zero_velocity_note_on_is_note_off() {
        assert_eq!(MidiMessage::parse(&[0x91, 62, 0]), Some(MidiMessage::note_off(1, 62)));
    }

    #[test]
    fn pitch_wheel_is_centred() {
        let wheel = |lo, hi| match MidiMessage::parse(&[0xE0, lo, hi]).map(|m| m.kind) {
            Some(MidiKind::PitchWheel(v)) => v,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(wheel(0x00, 0x40), 0);
        assert_eq!(wheel(0x00, 0x00), -8192);
        assert_eq!(wheel(0x7F, 0x7F), 8191);
        assert_eq!(MidiMessage::pitch_wheel_amount(-8192), -1.0);
    }

    #[test]
    fn rejects_system_and_short_messages() {
        assert_eq!(MidiMessage::parse(&[]), None);
        assert_eq!(MidiMessage::parse(&[0xF8]), None);
        assert_eq!(MidiMessage::parse(&[0x3C, 0x40]), None);
        assert_eq!(MidiMessage::parse(&[0x90, 60]), None);
        assert_eq!(
            MidiMessage::parse(&[0xC5, 7]),
            Some(MidiMessage::new(5, MidiKind::ProgramChange(7)))
        );
    }

    #[test]
    fn bytes_parse_back() {
        let messages = [
            MidiMessage::note_on(2, 69, 127),
            MidiMessage::new(9, MidiKind::ControlChange { controller: CC_SUSTAIN, value: 127 }),
            MidiMessage::new(0, MidiKind::PitchWheel(-300)),
            MidiMessage::new(15, MidiKind::ChannelAftertouch(12)),
        ];
        for msg in messages {
            let (bytes, len) = msg.to_bytes();
            assert_eq!(MidiMessage::parse(&bytes[..len]), Some(msg));
        }
    }
}
