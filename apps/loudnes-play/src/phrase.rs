//! The demo phrase: a looping A minor arpeggio with a held note that gets a
//! pitch wheel swell.

use std::time::Duration;

use loudnes_core::{MidiKind, MidiMessage};

/// `(beat, note, length in beats)` for one bar.
const BAR: [(f64, u8, f64); 7] = [
    (0.0, 57, 0.5),
    (0.5, 60, 0.5),
    (1.0, 64, 0.5),
    (1.5, 69, 0.5),
    (2.0, 72, 1.0),
    (3.0, 69, 0.5),
    (3.5, 64, 0.5),
];
const BEATS_PER_BAR: f64 = 4.0;
const VELOCITY: u8 = 110;

/// One scheduled message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub at: Duration,
    pub msg: MidiMessage,
}

/// Every event of the phrase that starts before `length`, in time order.
/// Every note-on gets its note-off, even past `length`.
pub fn events(channel: u8, tempo: f64, length: Duration) -> Vec<Event> {
    let beat = 60.0 / tempo.max(1.0);
    let bars = (length.as_secs_f64() / (beat * BEATS_PER_BAR)).ceil() as usize;
    let at = |beats: f64| Duration::from_secs_f64(beats * beat);

    let mut events = Vec::new();
    for bar in 0..bars {
        let start = bar as f64 * BEATS_PER_BAR;
        for (offset, note, len) in BAR {
            if at(start + offset) >= length {
                continue;
            }
            events.push(Event {
                at: at(start + offset),
                msg: MidiMessage::note_on(channel, note, VELOCITY),
            });
            events.push(Event {
                at: at(start + offset + len),
                msg: MidiMessage::note_off(channel, note),
            });
        }
        // Bend the held top note up a semitone and back.
        for (step, wheel) in [2048, 4096, 2048, 0].into_iter().enumerate() {
            let beats = start + 2.25 + step as f64 * 0.125;
            if at(beats) < length {
                events.push(Event {
                    at: at(beats),
                    msg: MidiMessage::new(channel, MidiKind::PitchWheel(wheel)),
                });
            }
        }
    }
    events.sort_by_key(|event| event.at);
    events
}
