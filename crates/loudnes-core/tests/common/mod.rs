#![allow(dead_code)]

use ctor::ctor;
use loudnes_apu::RegisterWriter;
use loudnes_core::Engine;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[ctor]
fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_file(true)
        .with_line_number(true)
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

/// Records register writes instead of driving a chip.
#[derive(Debug, Default)]
pub struct RegisterLog {
    pub writes: Vec<(u16, u8)>,
}

impl RegisterWriter for RegisterLog {
    fn write_register(&mut self, addr: u16, value: u8) {
        self.writes.push((addr, value));
    }
}

impl RegisterLog {
    pub fn take(&mut self) -> Vec<(u16, u8)> {
        std::mem::take(&mut self.writes)
    }

    /// Last value written to `addr`.
    pub fn last(&self, addr: u16) -> Option<u8> {
        self.writes.iter().rev().find(|(a, _)| *a == addr).map(|&(_, v)| v)
    }
}

/// Renders `frames` samples and returns the left channel, asserting the
/// right channel matches.
pub fn render(engine: &mut Engine, frames: usize) -> Vec<f32> {
    let (mut left, mut right) = (vec![0.0; frames], vec![0.0; frames]);
    engine.process_block(&mut left, &mut right);
    assert_eq!(left, right, "output is mono duplicated to both sides");
    left
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0, |m, s| m.max(s.abs()))
}
