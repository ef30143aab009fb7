// BreatheRight — PMS7003 UART Port
//
// 9600 8N1 on Port C. The ESP-IDF driver keeps a ring buffer; the
// particulate task asks how much is waiting and reads only that.

use esp_idf_hal::delay::TickType;
use esp_idf_hal::gpio::{AnyIOPin, InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::uart::{config::Config, Uart, UartDriver};
use esp_idf_hal::units::Hertz;

use crate::config::*;
use crate::ports::SerialPort;

pub struct PmsUart {
    uart: UartDriver<'static>,
    timeout: u32,
}

impl PmsUart {
    pub fn new<U: Uart>(
        uart: impl Peripheral<P = U> + 'static,
        tx: impl Peripheral<P = impl OutputPin> + 'static,
        rx: impl Peripheral<P = impl InputPin> + 'static,
    ) -> anyhow::Result<Self> {
        let config = Config::default()
            .baudrate(Hertz(PMS_BAUD_RATE))
            .rx_fifo_size(PMS_RX_BUFFER_SIZE * 2);
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;

        log::info!("PMS7003 UART ready ({} baud)", PMS_BAUD_RATE);
        Ok(Self {
            uart,
            timeout: TickType::new_millis(u64::from(PMS_READ_TIMEOUT_MS)).into(),
        })
    }
}

impl SerialPort for PmsUart {
    fn buffered_len(&mut self) -> anyhow::Result<usize> {
        Ok(self.uart.remaining_read()?)
    }

    fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        Ok(self.uart.read(buf, self.timeout)?)
    }
}
