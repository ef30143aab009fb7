// BreatheRight — Microphone Task
//
// Pulls PCM chunks from the microphone and packs them into fixed-size
// slices for the inference task. Never blocks on the consumer: if inference
// falls behind, the slice channel drops the newest slice and flags an
// overrun.

use std::ops::ControlFlow;
use std::time::Duration;

use crate::audio::{AudioError, SliceProducer};
use crate::config::*;
use crate::ports::AudioSource;

pub struct MicPump<A> {
    source: A,
    slices: SliceProducer,
    chunk: Vec<i16>,
}

impl<A: AudioSource> MicPump<A> {
    pub fn new(source: A, slices: SliceProducer, chunk_len: usize) -> Self {
        Self {
            source,
            slices,
            chunk: vec![0; chunk_len.max(1)],
        }
    }

    /// Move one chunk from the microphone into the slice channel; returns
    /// the number of slices completed.
    pub fn pump_once(&mut self) -> Result<usize, AudioError> {
        let n = match self.source.read(&mut self.chunk) {
            Ok(n) => n.min(self.chunk.len()),
            Err(e) => {
                log::warn!("Microphone read failed: {}", e);
                return Ok(0);
            }
        };
        self.slices.push(&self.chunk[..n])
    }
}

pub fn microphone_task<A: AudioSource>(source: A, slices: SliceProducer) {
    log::info!(
        "Microphone task started ({} samples/slice, {} Hz)",
        slices.slice_len(),
        EI_FREQUENCY_HZ
    );

    let mut pump = MicPump::new(source, slices, MIC_CHUNK_SAMPLES);

    super::every(Duration::from_millis(MIC_POLL_INTERVAL_MS), || {
        match pump.pump_once() {
            Ok(_) => ControlFlow::Continue(()),
            Err(e) => {
                log::error!("Slice consumer gone, exiting microphone task: {}", e);
                ControlFlow::Break(())
            }
        }
    });
}
