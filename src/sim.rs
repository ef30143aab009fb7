//! Workstation stand-ins for the Core2 peripherals.
//!
//! `cargo run` on the host wires these into the same tasks the firmware
//! runs, so the fusion pipeline can be watched in the log.

use std::time::{Duration, Instant};

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

use crate::config::*;
use crate::events::EnvironmentalReading;
use crate::pms7003::ParticulateReading;
use crate::ports::{AudioSource, CloudSync, EnvironmentSensor, LedStrip, SerialPort};
use crate::shadow::ShadowReport;

/// PMS7003 byte stream: one frame per second, cycling through a PM2.5
/// script. Frames arrive split across polls and with a noise byte between
/// them, like a real ring buffer would deliver them.
pub struct SimSerial {
    script: Vec<u16>,
    next: usize,
    next_frame_at: Instant,
    pending: Vec<u8>,
}

impl SimSerial {
    pub fn new(script: Vec<u16>) -> Self {
        Self {
            script,
            next: 0,
            next_frame_at: Instant::now(),
            pending: Vec::new(),
        }
    }

    fn frame(&self, pm2_5: u16) -> [u8; 32] {
        ParticulateReading {
            pm1_0_sp: pm2_5 * 2 / 3,
            pm2_5_sp: pm2_5,
            pm10_sp: pm2_5 + pm2_5 / 4,
            pm1_0_ae: pm2_5 * 2 / 3,
            pm2_5_ae: pm2_5,
            pm10_ae: pm2_5 + pm2_5 / 4,
            np_0_3: pm2_5.saturating_mul(90),
            np_0_5: pm2_5.saturating_mul(27),
            np_1_0: pm2_5.saturating_mul(4),
            np_2_5: pm2_5 / 2,
            np_5_0: pm2_5 / 8,
            np_10: pm2_5 / 20,
        }
        .to_frame()
    }
}

impl Default for SimSerial {
    fn default() -> Self {
        // Each value holds for a few seconds so the 5 s refresh catches it.
        let mut script = Vec::new();
        for pm in [8u16, 10, 30, 40, 80, 160, 280, 400, 20] {
            script.extend(std::iter::repeat(pm).take(6));
        }
        Self::new(script)
    }
}

impl SerialPort for SimSerial {
    fn buffered_len(&mut self) -> anyhow::Result<usize> {
        if Instant::now() >= self.next_frame_at && !self.script.is_empty() {
            let pm = self.script[self.next % self.script.len()];
            self.next += 1;
            self.pending.push(0x00);
            self.pending.extend_from_slice(&self.frame(pm));
            self.next_frame_at += Duration::from_secs(1);
        }
        // Expose at most half a frame per poll.
        Ok(self.pending.len().min(16))
    }

    fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

/// Raw die temperature hovering around 52 °C (≈24 °C after calibration).
#[derive(Debug, Default)]
pub struct SimEnvironment {
    samples: u32,
}

impl EnvironmentSensor for SimEnvironment {
    fn sample(&mut self) -> anyhow::Result<EnvironmentalReading> {
        self.samples = self.samples.wrapping_add(1);
        let wobble = (self.samples % 7) as f32 * 0.1;
        Ok(EnvironmentalReading {
            temperature_c: 51.8 + wobble,
            ..Default::default()
        })
    }
}

/// 16 kHz audio in real time: low hiss, with a loud burst every few
/// seconds that the stub classifier hears as a cough.
pub struct SimAudio {
    started: Instant,
    produced: u64,
}

impl Default for SimAudio {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            produced: 0,
        }
    }
}

impl SimAudio {
    const BURST_EVERY: u64 = 7 * EI_FREQUENCY_HZ as u64;
    const BURST_LEN: u64 = EI_FREQUENCY_HZ as u64 / 2;

    fn sample(n: u64) -> i16 {
        if n % Self::BURST_EVERY < Self::BURST_LEN {
            // 100 Hz square wave
            if (n / 80) % 2 == 0 {
                12_000
            } else {
                -12_000
            }
        } else {
            ((n.wrapping_mul(7919) % 400) as i16) - 200
        }
    }
}

impl AudioSource for SimAudio {
    fn read(&mut self, buf: &mut [i16]) -> anyhow::Result<usize> {
        let due = self.started.elapsed().as_micros() as u64 * u64::from(EI_FREQUENCY_HZ) / 1_000_000;
        let n = (due.saturating_sub(self.produced) as usize).min(buf.len());
        for (i, s) in buf[..n].iter_mut().enumerate() {
            *s = Self::sample(self.produced + i as u64);
        }
        self.produced += n as u64;
        Ok(n)
    }
}

/// LED bar that logs when a sweep completes.
pub struct LogLed {
    pixels: Vec<Rgb888>,
}

impl LogLed {
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![Rgb888::BLACK; len],
        }
    }
}

impl LedStrip for LogLed {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb888) {
        if let Some(p) = self.pixels.get_mut(index) {
            *p = color;
        }
    }

    fn clear(&mut self) {
        self.pixels.fill(Rgb888::BLACK);
    }

    fn show(&mut self) -> anyhow::Result<()> {
        let lit = self.pixels.iter().filter(|&&p| p != Rgb888::BLACK).count();
        log::trace!("[led] {}/{} lit", lit, self.pixels.len());
        Ok(())
    }
}

/// Prints the shadow document that would be published.
#[derive(Debug, Default)]
pub struct LogCloud;

impl CloudSync for LogCloud {
    fn report(&mut self, report: &ShadowReport) -> anyhow::Result<()> {
        let doc = report.to_document()?;
        log::info!(
            "[cloud] $aws/things/{}/shadow/update {}",
            THING_NAME,
            String::from_utf8_lossy(&doc)
        );
        Ok(())
    }
}
