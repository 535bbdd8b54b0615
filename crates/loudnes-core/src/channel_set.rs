//! The eight channels in chip order, plus the DPCM bank they share.

use std::sync::Arc;

use loudnes_apu::RegisterWriter;

use crate::{
    channel::{Channel, ChannelId},
    config::PitchMode,
    dpcm::DpcmSampleTable,
    note_table::{NoteTables, Region},
};

#[derive(Debug, Clone)]
pub struct ChannelSet {
    channels: [Channel; ChannelId::COUNT],
    dpcm: DpcmSampleTable,
}

impl ChannelSet {
    pub fn new(tables: Arc<NoteTables>, pitch_mode: PitchMode, region: Region) -> Self {
        Self {
            channels: ChannelId::ALL.map(|id| Channel::new(id, tables.clone(), pitch_mode, region)),
            dpcm: DpcmSampleTable::new(),
        }
    }

    pub fn get(&self, id: ChannelId) -> &Channel {
        &self.channels[id.index()]
    }

    pub fn get_mut(&mut self, id: ChannelId) -> &mut Channel {
        &mut self.channels[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.iter_mut()
    }

    pub fn dpcm(&self) -> &DpcmSampleTable {
        &self.dpcm
    }

    pub fn dpcm_mut(&mut self) -> &mut DpcmSampleTable {
        &mut self.dpcm
    }

    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }

    /// One emulation frame of register writes, channels in chip order.
    pub fn update_apu<W>(&mut self, out: &mut W)
    where
        W: RegisterWriter + ?Sized,
    {
        let dpcm = &self.dpcm;
        for channel in &mut self.channels {
            channel.update_apu(dpcm, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_support::RegisterLog;

    #[test]
    fn idle_frame_silences_every_channel_in_order() {
        let mut set = ChannelSet::new(Arc::new(NoteTables::new()), PitchMode::Relative, Region::Ntsc);
        let mut log = RegisterLog::default();
        set.update_apu(&mut log);
        assert_eq!(
            log.take(),
            [
                (0x4000, 0x30),
                (0x4004, 0x30),
                (0x4008, 0x80),
                (0x400C, 0xF0),
                (0x9000, 0x00),
                (0xA000, 0x00),
                (0xB000, 0x00),
            ]
        );
    }

    #[test]
    fn channels_are_indexed_by_id() {
        let set = ChannelSet::new(Arc::new(NoteTables::new()), PitchMode::Relative, Region::Ntsc);
        for id in ChannelId::ALL {
            assert_eq!(set.get(id).id(), id);
        }
        assert_eq!(set.iter().count(), ChannelId::COUNT);
    }
}
