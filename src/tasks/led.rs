// BreatheRight — LED Feedback Task
//
// Sweeps the side LED bar in the current alert colour: pixels light one by
// one, then go dark one by one. The sample task hands over new colours
// through `LedColor`; the sweep picks them up at the start of each pass.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

use crate::config::*;
use crate::ports::LedStrip;
use crate::state::Domain;

/// Colour cell shared between the sample task and the LED task.
///
/// Both sides use a bounded wait; on timeout the writer's update is lost
/// and the reader keeps its previous colour.
#[derive(Debug)]
pub struct LedColor {
    color: Domain<Rgb888>,
}

impl Default for LedColor {
    fn default() -> Self {
        let (r, g, b) = LED_DEFAULT_RGB;
        Self::new(Rgb888::new(r, g, b))
    }
}

impl LedColor {
    pub fn new(initial: Rgb888) -> Self {
        Self {
            color: Domain::new("led colour", initial),
        }
    }

    /// Returns `false` if the lock stayed busy and the update was dropped.
    pub fn set(&self, color: Rgb888) -> bool {
        match self.color.lock_timeout(Duration::from_millis(LED_LOCK_TIMEOUT_MS)) {
            Some(mut guard) => {
                *guard = color;
                true
            }
            None => false,
        }
    }

    pub fn get(&self) -> Option<Rgb888> {
        self.color
            .try_snapshot(Duration::from_millis(LED_LOCK_TIMEOUT_MS))
    }
}

/// `#rrggbb`
pub fn hex(color: Rgb888) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

pub struct LedSweep<L> {
    strip: L,
    color: Arc<LedColor>,
    current: Rgb888,
    step: Duration,
}

impl<L: LedStrip> LedSweep<L> {
    pub fn new(strip: L, color: Arc<LedColor>, step: Duration) -> Self {
        let (r, g, b) = LED_DEFAULT_RGB;
        Self {
            strip,
            color,
            current: Rgb888::new(r, g, b),
            step,
        }
    }

    pub fn current(&self) -> Rgb888 {
        self.current
    }

    fn refresh_color(&mut self) {
        let Some(color) = self.color.get() else {
            return;
        };
        if color != self.current {
            log::info!("LED colour {} -> {}", hex(self.current), hex(color));
            self.current = color;
        }
    }

    /// One full on/off pass over the bar.
    pub fn sweep(&mut self) -> anyhow::Result<()> {
        self.refresh_color();

        for i in 0..self.strip.len() {
            self.strip.set_pixel(i, self.current);
            self.strip.show()?;
            thread::sleep(self.step);
        }
        for i in 0..self.strip.len() {
            self.strip.set_pixel(i, Rgb888::BLACK);
            self.strip.show()?;
            thread::sleep(self.step);
        }
        Ok(())
    }
}

pub fn led_task<L: LedStrip>(mut strip: L, color: Arc<LedColor>) {
    log::info!("LED task started ({} pixels)", strip.len());

    strip.clear();
    if let Err(e) = strip.show() {
        log::error!("LED bar init failed: {}", e);
        return;
    }

    let mut sweep = LedSweep::new(strip, color, Duration::from_millis(LED_STEP_MS));
    loop {
        if let Err(e) = sweep.sweep() {
            log::warn!("LED bar update failed: {}", e);
            thread::sleep(Duration::from_millis(LED_STEP_MS));
        }
    }
}
