// BreatheRight — Particulate (PMS7003) Ingestion Task
//
// Polls the UART ring buffer every 100 ms, feeds whatever arrived into the
// frame assembler, and publishes each valid reading to the shared store.
// Rejected frames are logged and dropped; the store keeps the last good one.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crate::config::*;
use crate::pms7003::{AssemblerState, FrameAssembler};
use crate::ports::SerialPort;
use crate::state::SharedState;

/// Outcome of one poll, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub bytes: usize,
    pub published: usize,
    pub rejected: usize,
}

pub struct PmsReader<S> {
    port: S,
    assembler: FrameAssembler,
    buf: Vec<u8>,
    state: Arc<SharedState>,
}

impl<S: SerialPort> PmsReader<S> {
    pub fn new(port: S, state: Arc<SharedState>) -> Self {
        Self {
            port,
            assembler: FrameAssembler::new(),
            buf: vec![0; PMS_RX_BUFFER_SIZE],
            state,
        }
    }

    pub fn assembler_state(&self) -> AssemblerState {
        self.assembler.state()
    }

    /// Drain what the UART has buffered right now.
    pub fn poll_once(&mut self) -> anyhow::Result<PollStats> {
        let mut stats = PollStats::default();

        let available = self.port.buffered_len()?;
        if available == 0 {
            return Ok(stats);
        }

        let want = available.min(self.buf.len());
        let n = self.port.read(&mut self.buf[..want])?;
        stats.bytes = n;

        let state = &self.state;
        self.assembler.push(&self.buf[..n], |frame| match frame {
            Ok(reading) => {
                state.publish_particulate(reading);
                stats.published += 1;
                log::debug!(
                    "PMS7003: PM1.0={} PM2.5={} PM10={} µg/m³",
                    reading.pm1_0_ae,
                    reading.pm2_5_ae,
                    reading.pm10_ae
                );
            }
            Err(e) => {
                stats.rejected += 1;
                log::warn!("PMS7003 frame dropped: {}", e);
            }
        });

        Ok(stats)
    }
}

pub fn particulate_task<S: SerialPort>(port: S, state: Arc<SharedState>) {
    log::info!("Particulate task started");

    let mut reader = PmsReader::new(port, state);

    super::every(Duration::from_millis(PMS_POLL_INTERVAL_MS), || {
        if let Err(e) = reader.poll_once() {
            log::warn!("PMS7003 UART read error: {}", e);
        }
        ControlFlow::Continue(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pms7003::ParticulateReading;
    use std::collections::VecDeque;

    /// UART fake: each poll exposes the next scripted chunk.
    struct ScriptedPort {
        chunks: VecDeque<Vec<u8>>,
        pending: Vec<u8>,
    }

    impl ScriptedPort {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
                pending: Vec::new(),
            }
        }
    }

    impl SerialPort for ScriptedPort {
        fn buffered_len(&mut self) -> anyhow::Result<usize> {
            if self.pending.is_empty() {
                self.pending = self.chunks.pop_front().unwrap_or_default();
            }
            Ok(self.pending.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    fn reading(pm2_5: u16) -> ParticulateReading {
        ParticulateReading {
            pm1_0_ae: pm2_5 / 2,
            pm2_5_ae: pm2_5,
            pm10_ae: pm2_5 + 3,
            ..Default::default()
        }
    }

    #[test]
    fn publishes_frame_split_across_polls() {
        let frame = reading(42).to_frame();
        let port = ScriptedPort::new(vec![frame[..10].to_vec(), frame[10..].to_vec()]);
        let state = Arc::new(SharedState::new());
        let mut reader = PmsReader::new(port, Arc::clone(&state));

        let first = reader.poll_once().unwrap();
        assert_eq!(first.published, 0);
        assert_eq!(reader.assembler_state(), AssemblerState::Accumulating);
        assert_eq!(state.snapshot_particulate(), ParticulateReading::default());

        let second = reader.poll_once().unwrap();
        assert_eq!(second.published, 1);
        assert_eq!(reader.assembler_state(), AssemblerState::Idle);
        assert_eq!(state.snapshot_particulate(), reading(42));
    }

    #[test]
    fn bad_checksum_keeps_previous_reading() {
        let good = reading(10).to_frame();
        let mut bad = reading(90).to_frame();
        bad[31] = bad[31].wrapping_add(1);

        let port = ScriptedPort::new(vec![good.to_vec(), bad.to_vec()]);
        let state = Arc::new(SharedState::new());
        let mut reader = PmsReader::new(port, Arc::clone(&state));

        reader.poll_once().unwrap();
        let stats = reader.poll_once().unwrap();
        assert_eq!(stats.published, 0);
        assert_eq!(stats.rejected, 1);
        assert_eq!(state.snapshot_particulate(), reading(10));
    }

    #[test]
    fn several_frames_in_one_poll_leave_the_latest() {
        let mut bytes = vec![0xFF, 0x00];
        for pm in [5, 6, 7] {
            bytes.extend_from_slice(&reading(pm).to_frame());
        }
        let state = Arc::new(SharedState::new());
        let mut reader = PmsReader::new(ScriptedPort::new(vec![bytes]), Arc::clone(&state));

        let stats = reader.poll_once().unwrap();
        assert_eq!(stats.published, 3);
        assert_eq!(state.snapshot_particulate(), reading(7));
    }

    #[test]
    fn empty_uart_is_a_no_op() {
        let state = Arc::new(SharedState::new());
        let mut reader = PmsReader::new(ScriptedPort::new(vec![]), state);
        assert_eq!(reader.poll_once().unwrap(), PollStats::default());
    }
}
