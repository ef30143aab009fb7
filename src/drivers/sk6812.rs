// BreatheRight — SK6812 LED Bar Driver
//
// The Core2 side bar is ten SK6812 pixels on one data line, driven by an
// RMT channel. Pixels are buffered and pushed out in one transmission.

use std::time::Duration;

use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, RmtChannel, TxRmtDriver};

use crate::config::*;
use crate::ports::LedStrip;

const BITS_PER_PIXEL: usize = 24;

pub struct Sk6812 {
    tx: TxRmtDriver<'static>,
    pixels: [Rgb888; LED_COUNT],
    /// (high, low) pulse pairs for a 0 bit and a 1 bit.
    zero: (Pulse, Pulse),
    one: (Pulse, Pulse),
}

impl Sk6812 {
    pub fn new<C: RmtChannel>(
        channel: impl Peripheral<P = C> + 'static,
        pin: impl Peripheral<P = impl OutputPin> + 'static,
    ) -> anyhow::Result<Self> {
        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, pin, &config)?;

        let ticks_hz = tx.counter_clock()?;
        let pulse = |state, ns| Pulse::new_with_duration(ticks_hz, state, &Duration::from_nanos(ns));
        let zero = (pulse(PinState::High, 300)?, pulse(PinState::Low, 900)?);
        let one = (pulse(PinState::High, 600)?, pulse(PinState::Low, 600)?);

        log::info!("SK6812 bar ready ({} pixels)", LED_COUNT);
        Ok(Self {
            tx,
            pixels: [Rgb888::BLACK; LED_COUNT],
            zero,
            one,
        })
    }
}

impl LedStrip for Sk6812 {
    fn len(&self) -> usize {
        LED_COUNT
    }

    fn set_pixel(&mut self, index: usize, color: Rgb888) {
        if let Some(p) = self.pixels.get_mut(index) {
            *p = color;
        }
    }

    fn clear(&mut self) {
        self.pixels = [Rgb888::BLACK; LED_COUNT];
    }

    fn show(&mut self) -> anyhow::Result<()> {
        let mut signal = FixedLengthSignal::<{ LED_COUNT * BITS_PER_PIXEL }>::new();

        for (i, pixel) in self.pixels.iter().enumerate() {
            // SK6812 wants GRB, MSB first.
            let grb = (u32::from(pixel.g()) << 16) | (u32::from(pixel.r()) << 8) | u32::from(pixel.b());
            for bit in 0..BITS_PER_PIXEL {
                let set = grb & (1 << (BITS_PER_PIXEL - 1 - bit)) != 0;
                let pulses = if set { &self.one } else { &self.zero };
                signal.set(i * BITS_PER_PIXEL + bit, pulses)?;
            }
        }

        self.tx.start_blocking(&signal)?;
        Ok(())
    }
}
