use loudnes_apu::{RegisterWriter, registers::Register};
use tracing::trace;

use super::ChannelCore;
use crate::dpcm::DpcmSampleTable;

/// `$4015` with the DMC bit clear: stops any running sample.
const STATUS_DMC_OFF: u8 = 0x0F;
/// `$4015` with all five channels enabled: starts the DMC.
const STATUS_DMC_ON: u8 = 0x1F;
/// DAC level loaded before each sample so every hit starts from the same
/// offset.
const DAC_START_LEVEL: u8 = 32;

/// Sample player. Note events are latched and acted on at the next frame
/// update.
#[derive(Debug, Clone, Default)]
pub(super) struct DpcmChannel {
    triggered: bool,
    released: bool,
}

impl DpcmChannel {
    pub(super) fn trigger(&mut self) {
        self.triggered = true;
    }

    pub(super) fn release(&mut self) {
        self.released = true;
    }

    /// Drops note events not yet sent to the chip.
    pub(super) fn reset(&mut self) {
        self.triggered = false;
        self.released = false;
    }

    pub(super) fn update_apu<W>(&mut self, core: &ChannelCore, samples: &DpcmSampleTable, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        if self.triggered {
            self.triggered = false;
            out.write_register(Register::Status.addr(), STATUS_DMC_OFF);

            match samples.start_for_note(core.base_note()) {
                Some(start) => {
                    out.write_register(Register::DmcSampleAddress.addr(), start.address);
                    out.write_register(Register::DmcSampleLength.addr(), start.length);
                    out.write_register(Register::DmcControl.addr(), start.control);
                    out.write_register(Register::DmcDirectLoad.addr(), DAC_START_LEVEL);
                    out.write_register(Register::Status.addr(), STATUS_DMC_ON);
                }
                None => trace!(note = core.base_note(), "no DPCM sample mapped"),
            }
        }

        if self.released {
            self.released = false;
            out.write_register(Register::Status.addr(), STATUS_DMC_OFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        channel::{Channel, ChannelId, test_support::RegisterLog},
        config::PitchMode,
        dpcm::{DpcmPatch, DpcmSample, DpcmSampleTable},
        note_table::{NoteTables, Region},
    };

    fn dpcm() -> Channel {
        Channel::new(ChannelId::Dpcm, Arc::new(NoteTables::new()), PitchMode::Relative, Region::Ntsc)
    }

    fn kit() -> DpcmSampleTable {
        let mut table = DpcmSampleTable::new();
        let kick = table.add_sample(DpcmSample::new("kick", vec![0xAA; 100]));
        let snare = table.add_sample(DpcmSample::new("snare", vec![0x0F; 273]));
        table.set_patch(0, DpcmPatch::new(kick));
        table.set_patch(
            2,
            DpcmPatch {
                pitch: 12,
                looped: true,
                sample: Some(snare),
            },
        );
        table
    }

    #[test]
    fn trigger_starts_the_mapped_sample() {
        let mut ch = dpcm();
        let mut log = RegisterLog::default();
        let table = kit();

        ch.trigger(38, 0.3, true);
        ch.update_apu(&table, &mut log);
        assert_eq!(
            log.take(),
            [
                (0x4015, 0x0F),
                (0x4012, 2),
                (0x4013, 17),
                (0x4010, 0x4C),
                (0x4011, 32),
                (0x4015, 0x1F),
            ]
        );

        ch.update_apu(&table, &mut log);
        assert!(log.take().is_empty());
    }

    #[test]
    fn key_track_does_not_apply() {
        let mut ch = dpcm();
        ch.set_key_track(false);
        ch.trigger(36, 1.0, true);
        assert_eq!(ch.base_note(), 36);
    }

    #[test]
    fn unmapped_note_only_stops_playback() {
        let mut ch = dpcm();
        let mut log = RegisterLog::default();
        ch.trigger(37, 1.0, true);
        ch.update_apu(&kit(), &mut log);
        assert_eq!(log.take(), [(0x4015, 0x0F)]);
    }

    #[test]
    fn reset_drops_pending_events() {
        let mut ch = dpcm();
        let mut log = RegisterLog::default();
        ch.trigger(36, 1.0, true);
        ch.release();
        ch.reset();
        ch.update_apu(&kit(), &mut log);
        assert!(log.take().is_empty());
    }

    #[test]
    fn release_stops_the_dmc_once() {
        let mut ch = dpcm();
        let mut log = RegisterLog::default();
        let table = kit();
        ch.trigger(48, 1.0, true);
        ch.release();
        ch.update_apu(&table, &mut log);
        let writes = log.take();
        assert_eq!(writes.first(), Some(&(0x4015, 0x0F)));
        assert_eq!(writes.last(), Some(&(0x4015, 0x0F)));
        assert_eq!(writes.len(), 7);

        ch.update_apu(&table, &mut log);
        assert!(log.take().is_empty());
    }
}
