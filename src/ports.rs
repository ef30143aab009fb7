//! Boundaries between the fusion core and the hardware / services around it.
//!
//! Tasks only see these traits. ESP-IDF drivers implement them in
//! `drivers`, the host simulation in `sim`, and tests use
//! small in-memory fakes.

use embedded_graphics::pixelcolor::Rgb888;

use crate::events::EnvironmentalReading;
use crate::shadow::ShadowReport;

/// Byte stream from the particulate sensor UART.
pub trait SerialPort {
    /// Bytes waiting in the driver's receive ring buffer.
    fn buffered_len(&mut self) -> anyhow::Result<usize>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    fn read(&mut self, buf: &mut [u8]) -> anyhow::Result<usize>;
}

/// Raw (uncalibrated) environmental sample.
pub trait EnvironmentSensor {
    fn sample(&mut self) -> anyhow::Result<EnvironmentalReading>;
}

/// Microphone PCM source, 16-bit mono.
pub trait AudioSource {
    /// Fill as much of `buf` as is available, returning the sample count.
    fn read(&mut self, buf: &mut [i16]) -> anyhow::Result<usize>;
}

/// Labels on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Aqi,
    Temperature,
    Humidity,
    Pressure,
    Pm1_0,
    Pm2_5,
    Pm10,
}

/// Filled regions on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    /// Header behind the AQI text.
    Aqi,
    /// Body behind the individual readings.
    Body,
}

/// The local screen. Implementations serialize access to the panel
/// themselves; callers just push updates.
pub trait Display {
    fn set_label(&mut self, label: Label, text: &str) -> anyhow::Result<()>;
    fn set_panel_color(&mut self, panel: Panel, color: Rgb888) -> anyhow::Result<()>;
}

/// An addressable RGB LED bar.
pub trait LedStrip {
    fn len(&self) -> usize;
    fn set_pixel(&mut self, index: usize, color: Rgb888);
    fn clear(&mut self);
    /// Push the pixel buffer out to the LEDs.
    fn show(&mut self) -> anyhow::Result<()>;
}

/// Device shadow in the cloud.
pub trait CloudSync {
    fn report(&mut self, report: &ShadowReport) -> anyhow::Result<()>;
}

/// One label's score from the audio model.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    pub confidence: f32,
}

/// Time spent in each stage of one inference, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferenceTiming {
    pub dsp_ms: u32,
    pub classification_ms: u32,
    pub anomaly_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inference {
    pub classifications: Vec<Classification>,
    pub timing: InferenceTiming,
}

/// Continuous audio classifier fed one slice at a time.
pub trait Classifier {
    fn classify(&mut self, slice: &[i16]) -> anyhow::Result<Inference>;
}
