use clap::Parser;
use loudnes_core::ChannelId;
use tracing::Level;

/// Plays a short phrase on the LoudNES synth through the default output device
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// How long to play, in seconds
    #[arg(long, default_value_t = 8.0)]
    pub seconds: f64,

    /// Phrase tempo in beats per minute
    #[arg(long, default_value_t = 120.0)]
    pub tempo: f64,

    /// Chip channel the phrase is written for (e.g. pulse1, triangle, vrc6-saw)
    #[arg(long, default_value = "pulse1")]
    pub channel: ChannelId,

    /// Send every MIDI message to every chip channel (default)
    #[arg(long, overrides_with = "no_omni")]
    pub omni: bool,

    /// Route the phrase to `--channel` only
    #[arg(long, overrides_with = "omni")]
    pub no_omni: bool,

    /// Ask the device for this rate instead of its default
    #[arg(long)]
    pub sample_rate_override: Option<u32>,

    /// Render without opening an output device
    #[arg(long)]
    pub no_audio: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: Level,
}

impl Args {
    pub fn omni(&self) -> bool {
        !self.no_omni
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_flag_wins() {
        let args = Args::parse_from(["loudnes-play", "--no-omni", "--omni"]);
        assert!(args.omni());
        let args = Args::parse_from(["loudnes-play", "--omni", "--no-omni"]);
        assert!(!args.omni());
    }

    #[test]
    fn channel_names_parse() {
        let args = Args::parse_from(["loudnes-play", "--channel", "vrc6-saw", "--tempo", "90"]);
        assert_eq!(args.channel, ChannelId::Vrc6Saw);
        assert_eq!(args.tempo, 90.0);
        assert!(args.omni());
    }
}
