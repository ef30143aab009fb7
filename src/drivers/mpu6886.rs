// BreatheRight — MPU6886 Die Temperature Driver
//
// Register-level driver over the shared internal I2C bus. Only the
// temperature sensor is used; the enclosure offset is applied later by the
// sample task.

use std::sync::{Mutex, PoisonError};

use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;
use crate::events::EnvironmentalReading;
use crate::ports::EnvironmentSensor;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

// MPU6886 register addresses
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_TEMP_OUT_H: u8 = 0x41;
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x19;

pub struct Mpu6886 {
    bus: SharedBus,
}

impl Mpu6886 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let mut bus = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buf = [0u8; 1];
        match bus.write_read(I2C_ADDR_MPU6886, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS) {
            Ok(()) => buf[0] == WHO_AM_I_EXPECTED,
            Err(_) => false,
        }
    }

    /// Wake the sensor with the PLL clock selected.
    pub fn init(&self) -> anyhow::Result<()> {
        let mut bus = self.bus.lock().unwrap_or_else(PoisonError::into_inner);

        // Wake up (clear SLEEP bit)
        bus.write(I2C_ADDR_MPU6886, &[REG_PWR_MGMT_1, 0x00], I2C_TIMEOUT_TICKS)?;
        std::thread::sleep(std::time::Duration::from_millis(10));

        // Auto-select best clock source
        bus.write(I2C_ADDR_MPU6886, &[REG_PWR_MGMT_1, 0x01], I2C_TIMEOUT_TICKS)?;

        log::info!("MPU6886 initialised (temperature only)");
        Ok(())
    }

    /// Die temperature in °C.
    pub fn read_temperature(&self) -> anyhow::Result<f32> {
        let mut bus = self.bus.lock().unwrap_or_else(PoisonError::into_inner);
        let mut raw = [0u8; 2];
        bus.write_read(I2C_ADDR_MPU6886, &[REG_TEMP_OUT_H], &mut raw, I2C_TIMEOUT_TICKS)?;

        let counts = i16::from_be_bytes(raw);
        Ok(f32::from(counts) / MPU6886_TEMP_SENSITIVITY + MPU6886_TEMP_OFFSET_C)
    }
}

impl EnvironmentSensor for Mpu6886 {
    /// The Core2 has no humidity or pressure sensor; those stay zero.
    fn sample(&mut self) -> anyhow::Result<EnvironmentalReading> {
        Ok(EnvironmentalReading {
            temperature_c: self.read_temperature()?,
            ..Default::default()
        })
    }
}
