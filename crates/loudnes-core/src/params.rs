//! Flat parameter index space.
//!
//! Three global parameters come first, followed by twenty per channel in
//! channel order: four switches, then loop/release/length/speed for each of
//! the four envelopes.

use strum::FromRepr;

use crate::{
    channel::ChannelId,
    envelope::{Envelope, EnvelopeKind, MAX_SPEED_DIVIDER, MAX_STEPS},
};

pub const GLOBAL_PARAM_COUNT: usize = 3;
pub const CHANNEL_PARAM_COUNT: usize = 20;
pub const PARAM_COUNT: usize = GLOBAL_PARAM_COUNT + ChannelId::COUNT * CHANNEL_PARAM_COUNT;
const CHANNEL_SWITCH_COUNT: usize = 4;

pub const MAX_GLIDE_TIME_MS: f64 = 30.0;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum GlobalParam {
    /// Output level in percent.
    Gain = 0,
    /// Glide time in milliseconds.
    NoteGlideTime = 1,
    OmniMode = 2,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum EnvelopeParam {
    LoopPoint = 0,
    ReleasePoint = 1,
    Length = 2,
    SpeedDivider = 3,
}

impl EnvelopeParam {
    pub const ALL: [EnvelopeParam; 4] = [
        EnvelopeParam::LoopPoint,
        EnvelopeParam::ReleasePoint,
        EnvelopeParam::Length,
        EnvelopeParam::SpeedDivider,
    ];

    /// Current value of this field on `env`.
    pub fn read(self, env: &Envelope) -> usize {
        match self {
            EnvelopeParam::LoopPoint => env.loop_point(),
            EnvelopeParam::ReleasePoint => env.release_point(),
            EnvelopeParam::Length => env.length(),
            EnvelopeParam::SpeedDivider => env.speed_divider(),
        }
    }

    /// Routes `value` to the matching setter, which clamps it.
    pub fn write(self, env: &mut Envelope, value: i32) {
        match self {
            EnvelopeParam::LoopPoint => env.set_loop(value),
            EnvelopeParam::ReleasePoint => env.set_release(value),
            EnvelopeParam::Length => env.set_length(value),
            EnvelopeParam::SpeedDivider => env.set_speed_divider(value),
        }
    }

    fn label(self) -> &'static str {
        match self {
            EnvelopeParam::LoopPoint => "Loop",
            EnvelopeParam::ReleasePoint => "Release",
            EnvelopeParam::Length => "Length",
            EnvelopeParam::SpeedDivider => "Speed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelParam {
    /// Chip output for the channel.
    Enabled,
    KeyTrack,
    VelocitySensitive,
    Legato,
    Envelope(EnvelopeKind, EnvelopeParam),
}

impl ChannelParam {
    fn from_sub_index(sub: usize) -> Option<Self> {
        Some(match sub {
            0 => ChannelParam::Enabled,
            1 => ChannelParam::KeyTrack,
            2 => ChannelParam::VelocitySensitive,
            3 => ChannelParam::Legato,
            _ => {
                let env = sub.checked_sub(CHANNEL_SWITCH_COUNT)?;
                let kind = EnvelopeKind::from_repr(u8::try_from(env / 4).ok()?)?;
                let field = EnvelopeParam::from_repr((env % 4) as u8)?;
                ChannelParam::Envelope(kind, field)
            }
        })
    }

    fn sub_index(self) -> usize {
        match self {
            ChannelParam::Enabled => 0,
            ChannelParam::KeyTrack => 1,
            ChannelParam::VelocitySensitive => 2,
            ChannelParam::Legato => 3,
            ChannelParam::Envelope(kind, field) => {
                CHANNEL_SWITCH_COUNT + kind as usize * 4 + field as usize
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Global(GlobalParam),
    Channel(ChannelId, ChannelParam),
}

/// Display metadata and range of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    /// Values are whole numbers (switches and envelope fields).
    pub stepped: bool,
}

impl Param {
    pub fn from_index(index: usize) -> Option<Self> {
        if index < GLOBAL_PARAM_COUNT {
            return GlobalParam::from_repr(index as u8).map(Param::Global);
        }
        let offset = index - GLOBAL_PARAM_COUNT;
        let channel = ChannelId::from_repr(u8::try_from(offset / CHANNEL_PARAM_COUNT).ok()?)?;
        let param = ChannelParam::from_sub_index(offset % CHANNEL_PARAM_COUNT)?;
        Some(Param::Channel(channel, param))
    }

    pub fn index(self) -> usize {
        match self {
            Param::Global(param) => param as usize,
            Param::Channel(channel, param) => {
                GLOBAL_PARAM_COUNT + channel.index() * CHANNEL_PARAM_COUNT + param.sub_index()
            }
        }
    }

    pub fn info(self) -> ParamInfo {
        let switch = |name: String, default: bool| ParamInfo {
            name,
            default: if default { 1.0 } else { 0.0 },
            min: 0.0,
            max: 1.0,
            stepped: true,
        };
        match self {
            Param::Global(GlobalParam::Gain) => ParamInfo {
                name: "Gain".into(),
                default: 100.0,
                min: 0.0,
                max: 100.0,
                stepped: false,
            },
            Param::Global(GlobalParam::NoteGlideTime) => ParamInfo {
                name: "Note Glide Time".into(),
                default: 0.0,
                min: 0.0,
                max: MAX_GLIDE_TIME_MS,
                stepped: false,
            },
            Param::Global(GlobalParam::OmniMode) => switch("Omni Mode Enabled".into(), true),
            Param::Channel(ch, param) => {
                let prefix = ch.display_name();
                match param {
                    ChannelParam::Enabled => switch(format!("{prefix} Enabled"), true),
                    ChannelParam::KeyTrack => switch(format!("{prefix} Key Track"), true),
                    ChannelParam::VelocitySensitive => switch(format!("{prefix} Vel Sens"), true),
                    ChannelParam::Legato => switch(format!("{prefix} Legato"), false),
                    ChannelParam::Envelope(kind, field) => {
                        let (default, min, max) = match field {
                            EnvelopeParam::LoopPoint => (Envelope::DEFAULT_LOOP, 0, MAX_STEPS),
                            EnvelopeParam::ReleasePoint => (Envelope::DEFAULT_RELEASE, 0, MAX_STEPS),
                            EnvelopeParam::Length => (Envelope::DEFAULT_LENGTH, 0, MAX_STEPS),
                            EnvelopeParam::SpeedDivider => {
                                (Envelope::DEFAULT_SPEED_DIVIDER, 1, MAX_SPEED_DIVIDER)
                            }
                        };
                        ParamInfo {
                            name: format!("{prefix} Env {} {}", kind as u8 + 1, field.label()),
                            default: default as f64,
                            min: min as f64,
                            max: max as f64,
                            stepped: true,
                        }
                    }
                }
            }
        }
    }

    /// Every parameter in index order.
    pub fn all() -> impl Iterator<Item = Param> {
        (0..PARAM_COUNT).filter_map(Param::from_index)
    }
}

/// Switch parameters are on above one half.
pub fn as_bool(value: f64) -> bool {
    value > 0.5
}

/// Stepped parameters arrive as floats and are truncated.
pub fn as_int(value: f64) -> i32 {
    value as i32
}

/// Current value of every parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValues {
    values: [f64; PARAM_COUNT],
}

impl Default for ParamValues {
    fn default() -> Self {
        let mut values = [0.0; PARAM_COUNT];
        for param in Param::all() {
            values[param.index()] = param.info().default;
        }
        Self { values }
    }
}

impl ParamValues {
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    pub fn param(&self, param: Param) -> f64 {
        self.values[param.index()]
    }

    pub(crate) fn set(&mut self, index: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().copied().enumerate()
    }
}

/// Post-clamp envelope fields after a parameter write. Changing one field
/// may move the others, so all four are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSync {
    pub channel: ChannelId,
    pub kind: EnvelopeKind,
    pub loop_point: usize,
    pub release_point: usize,
    pub length: usize,
    pub speed_divider: usize,
}

impl ParamSync {
    pub fn read(channel: ChannelId, env: &Envelope) -> Self {
        Self {
            channel,
            kind: env.kind(),
            loop_point: env.loop_point(),
            release_point: env.release_point(),
            length: env.length(),
            speed_divider: env.speed_divider(),
        }
    }

    /// `(index, value)` pairs to store back into the parameter values.
    pub fn param_updates(&self) -> [(usize, f64); 4] {
        EnvelopeParam::ALL.map(|field| {
            let value = match field {
                EnvelopeParam::LoopPoint => self.loop_point,
                EnvelopeParam::ReleasePoint => self.release_point,
                EnvelopeParam::Length => self.length,
                EnvelopeParam::SpeedDivider => self.speed_divider,
            };
            let param = Param::Channel(self.channel, ChannelParam::Envelope(self.kind, field));
            (param.index(), value as f64)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_indices_decompose() {
        assert_eq!(PARAM_COUNT, 163);
        assert_eq!(Param::from_index(0), Some(Param::Global(GlobalParam::Gain)));
        assert_eq!(Param::from_index(2), Some(Param::Global(GlobalParam::OmniMode)));
        assert_eq!(
            Param::from_index(3),
            Some(Param::Channel(ChannelId::Pulse1, ChannelParam::Enabled))
        );
        // Channel 2, sub 9: envelope 1 (duty), field 1 (release).
        assert_eq!(
            Param::from_index(3 + 2 * 20 + 9),
            Some(Param::Channel(
                ChannelId::Triangle,
                ChannelParam::Envelope(EnvelopeKind::Duty, EnvelopeParam::ReleasePoint)
            ))
        );
        assert_eq!(
            Param::from_index(162),
            Some(Param::Channel(
                ChannelId::Vrc6Saw,
                ChannelParam::Envelope(EnvelopeKind::Pitch, EnvelopeParam::SpeedDivider)
            ))
        );
        assert_eq!(Param::from_index(163), None);
    }

    #[test]
    fn index_round_trips() {
        assert_eq!(Param::all().count(), PARAM_COUNT);
        for (i, param) in Param::all().enumerate() {
            assert_eq!(param.index(), i);
        }
    }

    #[test]
    fn defaults_follow_metadata() {
        let values = ParamValues::default();
        assert_eq!(values.get(0), Some(100.0));
        assert_eq!(values.param(Param::Global(GlobalParam::OmniMode)), 1.0);
        let legato = Param::Channel(ChannelId::Noise, ChannelParam::Legato);
        assert_eq!(values.param(legato), 0.0);
        let speed = Param::Channel(
            ChannelId::Pulse2,
            ChannelParam::Envelope(EnvelopeKind::Volume, EnvelopeParam::SpeedDivider),
        );
        assert_eq!(values.param(speed), 1.0);
        assert_eq!(speed.info().name, "Pulse 2 Env 1 Speed");
        assert_eq!(values.get(PARAM_COUNT), None);
    }

    #[test]
    fn sync_reports_every_envelope_field() {
        let mut env = Envelope::new(EnvelopeKind::Arpeggio);
        env.set_loop(20);
        let sync = ParamSync::read(ChannelId::Pulse1, &env);
        let base = 3 + 4 + 2 * 4;
        assert_eq!(
            sync.param_updates(),
            [(base, 20.0), (base + 1, 21.0), (base + 2, 21.0), (base + 3, 1.0)]
        );
    }

    #[test]
    fn switches_and_ints_convert_like_host_values() {
        assert!(!as_bool(0.5));
        assert!(as_bool(0.51));
        assert_eq!(as_int(15.9), 15);
    }
}
