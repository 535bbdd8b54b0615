mod common;

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use anyhow::Result;
use common::{peak, render};
use loudnes_core::{
    ChannelId, Engine, EngineConfig, EnvelopeKind, MidiMessage, Param, ParamSync,
    control,
    params::{ChannelParam, EnvelopeParam, GlobalParam, PARAM_COUNT},
};

fn envelope_param(channel: ChannelId, kind: EnvelopeKind, field: EnvelopeParam) -> usize {
    Param::Channel(channel, ChannelParam::Envelope(kind, field)).index()
}

#[test]
fn loop_past_release_pushes_release_and_length() -> Result<()> {
    let mut engine = Engine::new(EngineConfig::default())?;
    let index = envelope_param(ChannelId::Pulse2, EnvelopeKind::Volume, EnvelopeParam::LoopPoint);

    let sync = engine.set_param(index, 20.0)?.expect("envelope fields report back");
    assert_eq!(
        sync,
        ParamSync {
            channel: ChannelId::Pulse2,
            kind: EnvelopeKind::Volume,
            loop_point: 20,
            release_point: 21,
            length: 21,
            speed_divider: 1,
        }
    );

    let release = envelope_param(ChannelId::Pulse2, EnvelopeKind::Volume, EnvelopeParam::ReleasePoint);
    let length = envelope_param(ChannelId::Pulse2, EnvelopeKind::Volume, EnvelopeParam::Length);
    assert_eq!(engine.params().get(release), Some(21.0));
    assert_eq!(engine.params().get(length), Some(21.0));
    Ok(())
}

#[test]
fn out_of_range_fields_are_stored_clamped() -> Result<()> {
    let mut engine = Engine::new(EngineConfig::default())?;
    let speed = envelope_param(ChannelId::Noise, EnvelopeKind::Duty, EnvelopeParam::SpeedDivider);
    let sync = engine.set_param(speed, 0.0)?.expect("sync");
    assert_eq!(sync.speed_divider, 1);
    assert_eq!(engine.params().get(speed), Some(1.0));

    let length = envelope_param(ChannelId::Noise, EnvelopeKind::Duty, EnvelopeParam::Length);
    engine.set_param(length, 500.0)?;
    assert_eq!(engine.params().get(length), Some(64.0));
    Ok(())
}

#[test]
fn dpcm_envelope_params_are_inert() -> Result<()> {
    let mut engine = Engine::new(EngineConfig::default())?;
    let index = envelope_param(ChannelId::Dpcm, EnvelopeKind::Arpeggio, EnvelopeParam::Length);
    assert_eq!(engine.set_param(index, 3.0)?, None);
    Ok(())
}

#[test]
fn unknown_index_is_an_error() -> Result<()> {
    let mut engine = Engine::new(EngineConfig::default())?;
    assert!(engine.set_param(PARAM_COUNT, 1.0).is_err());
    Ok(())
}

#[test]
fn every_param_index_round_trips() {
    for index in 0..PARAM_COUNT {
        let param = Param::from_index(index).expect("in range");
        assert_eq!(param.index(), index);
        let info = param.info();
        assert!(info.min <= info.default && info.default <= info.max, "{}", info.name);
    }
    assert_eq!(Param::from_index(PARAM_COUNT), None);
}

#[test]
fn glide_time_above_range_still_plays() -> Result<()> {
    let mut engine = Engine::new(EngineConfig::default())?;
    let index = GlobalParam::NoteGlideTime as usize;
    engine.set_param(index, 500.0)?;
    engine.process_midi(&[0x90, 48, 100]);
    engine.process_midi(&[0x90, 60, 100]);
    let out = render(&mut engine, 4096);
    assert!(peak(&out) > 0.0);
    Ok(())
}

#[test]
fn controller_drives_engine_on_render_thread() -> Result<()> {
    let mut engine = Engine::new(EngineConfig::default())?;
    let (ctrl, link) = control::channel(4);
    engine.attach(link);
    let stop = AtomicBool::new(false);

    let blob = thread::scope(|s| -> Result<Vec<u8>> {
        let renderer = s.spawn(|| {
            let mut peak_seen = 0.0f32;
            while !stop.load(Ordering::Acquire) {
                peak_seen = peak_seen.max(peak(&render(&mut engine, 256)));
                thread::sleep(Duration::from_millis(1));
            }
            (engine, peak_seen)
        });

        let script = || -> Result<Vec<u8>> {
            ctrl.set_param(
                envelope_param(ChannelId::Pulse1, EnvelopeKind::Volume, EnvelopeParam::LoopPoint),
                30.0,
            )?;
            ctrl.set_active_channel(ChannelId::Pulse1)?;
            ctrl.set_envelope_value(ChannelId::Pulse1, EnvelopeKind::Volume, 0, 9)?;
            ctrl.send_midi(MidiMessage::note_on(0, 69, 127))?;
            // A reply proves every earlier message has been applied.
            let blob = ctrl.save_state()?;
            ctrl.send_midi_bytes(&[0x80, 69, 0])?;
            ctrl.save_state()?;
            Ok(blob)
        };
        let blob = script();
        stop.store(true, Ordering::Release);

        let (engine, peak_seen) = renderer.join().expect("render thread");
        assert!(peak_seen > 0.0);
        assert_eq!(engine.active_channel(), ChannelId::Pulse1);
        let envs = engine.active_envelopes().expect("pulse");
        assert_eq!(envs.volume.values()[0], 9);
        assert_eq!(envs.volume.loop_point(), 30);
        blob
    })?;
    assert!(!blob.is_empty());

    let synced: Vec<_> = ctrl.drain_feedback().collect();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].release_point, 31);
    assert!(ctrl.drain_telemetry().count() >= 1);
    Ok(())
}
