// BreatheRight — SPM1423 PDM Microphone Driver
//
// 16 kHz, 16-bit mono over I2S0 in PDM receive mode.

use esp_idf_hal::delay::TickType;
use esp_idf_hal::gpio::{InputPin, OutputPin};
use esp_idf_hal::i2s::config::{
    Config, DataBitWidth, PdmRxClkConfig, PdmRxConfig, PdmRxGpioConfig, PdmRxSlotConfig, SlotMode,
};
use esp_idf_hal::i2s::{I2s, I2sDriver, I2sRx};
use esp_idf_hal::peripheral::Peripheral;

use crate::config::*;
use crate::ports::AudioSource;

const READ_TIMEOUT_MS: u64 = 100;

pub struct PdmMicrophone {
    driver: I2sDriver<'static, I2sRx>,
    bytes: Vec<u8>,
    timeout: u32,
}

impl PdmMicrophone {
    pub fn new<I: I2s>(
        i2s: impl Peripheral<P = I> + 'static,
        clk: impl Peripheral<P = impl OutputPin> + 'static,
        data: impl Peripheral<P = impl InputPin> + 'static,
    ) -> anyhow::Result<Self> {
        let config = PdmRxConfig::new(
            Config::default(),
            PdmRxClkConfig::from_sample_rate_hz(EI_FREQUENCY_HZ),
            PdmRxSlotConfig::from_bits_per_sample_and_slot_mode(DataBitWidth::Bits16, SlotMode::Mono),
            PdmRxGpioConfig::new(false),
        );
        let mut driver = I2sDriver::new_pdm_rx(i2s, &config, clk, data)?;
        driver.rx_enable()?;

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(MIC_CHUNK_SAMPLES * 2)
            .map_err(|_| anyhow::anyhow!("cannot allocate microphone read buffer"))?;
        bytes.resize(MIC_CHUNK_SAMPLES * 2, 0);

        log::info!("PDM microphone ready ({} Hz)", EI_FREQUENCY_HZ);
        Ok(Self {
            driver,
            bytes,
            timeout: TickType::new_millis(READ_TIMEOUT_MS).into(),
        })
    }
}

impl AudioSource for PdmMicrophone {
    fn read(&mut self, buf: &mut [i16]) -> anyhow::Result<usize> {
        let want = (buf.len() * 2).min(self.bytes.len());
        let n = self.driver.read(&mut self.bytes[..want], self.timeout)?;

        let samples = n / 2;
        for (out, pair) in buf.iter_mut().zip(self.bytes[..samples * 2].chunks_exact(2)) {
            *out = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(samples)
    }
}
