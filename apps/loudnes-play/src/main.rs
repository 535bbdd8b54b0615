mod args;
mod audio;
mod phrase;

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use loudnes_core::{
    ChannelId, DpcmPatch, DpcmSample, Engine, EngineConfig, EngineController, MidiKind,
    MidiMessage, control, midi::CC_ALL_NOTES_OFF, params::GlobalParam,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::{
    args::Args,
    audio::{AudioOutput, SampleSink},
};

const BLOCK_FRAMES: usize = 256;
const UI_TICK: Duration = Duration::from_millis(16);
/// Rate used with `--no-audio` when no override is given.
const OFFLINE_SAMPLE_RATE: u32 = 44_100;

fn main() -> Result<()> {
    let args = Args::parse();

    let builder = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .compact();
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish())?
        }
        Err(_) => tracing::subscriber::set_global_default(builder.finish())?,
    }

    let (output, sink) = if args.no_audio {
        (None, None)
    } else {
        let (output, sink) = AudioOutput::open(args.sample_rate_override)?;
        (Some(output), Some(sink))
    };
    let sample_rate = output.as_ref().map_or(
        args.sample_rate_override.unwrap_or(OFFLINE_SAMPLE_RATE),
        AudioOutput::sample_rate,
    );

    let config = EngineConfig {
        max_block_size: BLOCK_FRAMES,
        ..EngineConfig::default().with_sample_rate(sample_rate)
    };
    let mut engine = Engine::new(config.clone())?;
    let (ctrl, link) = control::channel(config.telemetry_capacity);
    engine.attach(link);

    setup(&ctrl, &args)?;

    let stop = Arc::new(AtomicBool::new(false));
    let renderer = {
        let stop = stop.clone();
        thread::Builder::new()
            .name("loudnes-render".into())
            .spawn(move || render_loop(engine, sink, sample_rate, &stop))?
    };

    let result = play(&ctrl, &args);
    stop.store(true, Ordering::Release);
    let peak = renderer
        .join()
        .map_err(|_| anyhow::anyhow!("render thread panicked"))?;
    drop(output);
    result?;

    info!(peak, "done");
    Ok(())
}

/// Routing and, for the DPCM channel, a sample to play.
fn setup(ctrl: &EngineController, args: &Args) -> Result<()> {
    ctrl.set_param(GlobalParam::OmniMode as usize, if args.omni() { 1.0 } else { 0.0 })?;
    ctrl.set_active_channel(args.channel)?;

    if args.channel == ChannelId::Dpcm {
        // A saw-ish ramp: rising bits then falling bits.
        let mut data = vec![0xFF; 32];
        data.extend(std::iter::repeat_n(0x00, 32));
        ctrl.add_sample(DpcmSample::new("ramp", data))?;
        for pitch_class in 0..12 {
            ctrl.set_dpcm_patch(
                pitch_class,
                DpcmPatch {
                    pitch: 8 + (pitch_class as u8 % 8),
                    looped: true,
                    sample: Some(0),
                },
            )?;
        }
    }
    info!(
        channel = args.channel.display_name(),
        omni = args.omni(),
        tempo = args.tempo,
        "playing"
    );
    Ok(())
}

/// Sends the phrase in real time and logs telemetry at about 60 Hz.
fn play(ctrl: &EngineController, args: &Args) -> Result<()> {
    let length = Duration::try_from_secs_f64(args.seconds).context("invalid --seconds")?;
    let channel = args.channel.index() as u8;
    let events = phrase::events(channel, args.tempo, length);
    let mut pending = events.iter().peekable();

    let start = Instant::now();
    loop {
        let now = start.elapsed();
        while let Some(event) = pending.next_if(|event| event.at <= now) {
            ctrl.send_midi(event.msg)?;
        }
        for steps in ctrl.drain_telemetry() {
            debug!(channel = steps.channel.display_name(), steps = ?steps.steps, "envelopes");
        }
        for sync in ctrl.drain_feedback() {
            debug!(?sync, "parameter feedback");
        }
        if now >= length && pending.peek().is_none() {
            break;
        }
        thread::sleep(UI_TICK);
    }

    ctrl.send_midi(MidiMessage::new(
        channel,
        MidiKind::ControlChange {
            controller: CC_ALL_NOTES_OFF,
            value: 0,
        },
    ))?;
    // Let the release tails play out.
    thread::sleep(Duration::from_millis(250));
    Ok(())
}

/// Renders blocks until stopped, keeping the ring buffer topped up.
/// Without a sink blocks are paced by the clock. Returns the peak level.
fn render_loop(
    mut engine: Engine,
    mut sink: Option<SampleSink>,
    sample_rate: u32,
    stop: &AtomicBool,
) -> f32 {
    let (mut left, mut right) = (vec![0.0; BLOCK_FRAMES], vec![0.0; BLOCK_FRAMES]);
    let block_time = Duration::from_secs_f64(BLOCK_FRAMES as f64 / sample_rate as f64);
    let mut peak = 0.0f32;

    while !stop.load(Ordering::Acquire) {
        match sink.as_mut() {
            Some(sink) if sink.free_frames() < BLOCK_FRAMES => {
                thread::sleep(Duration::from_millis(1));
                continue;
            }
            Some(sink) => {
                engine.process_block(&mut left, &mut right);
                sink.push(&left, &right);
            }
            None => {
                engine.process_block(&mut left, &mut right);
                thread::sleep(block_time);
            }
        }
        peak = left.iter().fold(peak, |m, s| m.max(s.abs()));
    }
    debug!("render thread stopped");
    peak
}
