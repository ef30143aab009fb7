// BreatheRight — Hardware & System Configuration
// Target: M5Stack Core2 (ESP32, Xtensa dual core)

// ---------------------------------------------------------------------------
// PMS7003 UART
// ---------------------------------------------------------------------------
pub const PMS_BAUD_RATE: u32 = 9600;
pub const PMS_RX_BUFFER_SIZE: usize = 1024;
pub const PMS_READ_TIMEOUT_MS: u32 = 20;

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_ADDR_MPU6886: u8 = 0x68;
pub const I2C_TIMEOUT_TICKS: u32 = 1000; // FreeRTOS ticks

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_PARTICULATE: usize = 4096;
pub const STACK_SAMPLE: usize = 6144;
pub const STACK_MICROPHONE: usize = 8192;
pub const STACK_INFERENCE: usize = 16384;
pub const STACK_CLOUD: usize = 8192;
pub const STACK_LED: usize = 4096;

// ---------------------------------------------------------------------------
// Timing (milliseconds)
// ---------------------------------------------------------------------------
pub const PMS_POLL_INTERVAL_MS: u64 = 100;        // UART ring buffer poll
pub const SAMPLE_INTERVAL_MS: u64 = 5_000;        // AQI / display refresh
pub const CLOUD_REPORT_INTERVAL_MS: u64 = 60_000; // device shadow update
pub const MIC_POLL_INTERVAL_MS: u64 = 10;
pub const LED_STEP_MS: u64 = 140;                 // per-pixel sweep step

// Bounded waits for opportunistic readers; writers wait forever.
pub const UI_LOCK_TIMEOUT_MS: u64 = 10;
pub const LED_LOCK_TIMEOUT_MS: u64 = 10;
pub const LOCK_RETRY_MS: u64 = 1;

// ---------------------------------------------------------------------------
// Environmental calibration
// ---------------------------------------------------------------------------
/// The MPU6886 die runs well above ambient inside the Core2 enclosure.
pub const TEMPERATURE_OFFSET_C: f32 = -27.78;
pub const MPU6886_TEMP_SENSITIVITY: f32 = 326.8; // LSB/°C
pub const MPU6886_TEMP_OFFSET_C: f32 = 25.0;

// ---------------------------------------------------------------------------
// AI / Edge Impulse Model (continuous audio classification)
// ---------------------------------------------------------------------------
pub const EI_FREQUENCY_HZ: u32 = 16_000;
pub const EI_RAW_SAMPLE_COUNT: usize = 16_000;    // 1-second model window
pub const EI_SLICES_PER_MODEL_WINDOW: usize = 4;
pub const EI_SLICE_SIZE: usize = EI_RAW_SAMPLE_COUNT / EI_SLICES_PER_MODEL_WINDOW; // 4000
pub const EI_LABEL_COUNT: usize = 3;
pub const EI_CONFIDENCE_THRESHOLD: f32 = 0.8;
/// Microphone reads are 1/8 of a slice, like the I2S DMA chunking.
pub const MIC_CHUNK_SAMPLES: usize = EI_SLICE_SIZE / 8;

// ---------------------------------------------------------------------------
// LED bar (SK6812)
// ---------------------------------------------------------------------------
pub const LED_COUNT: usize = 10;
pub const LED_DEFAULT_RGB: (u8, u8, u8) = (255, 153, 0);

// ---------------------------------------------------------------------------
// Cloud (device shadow over MQTT)
// ---------------------------------------------------------------------------
pub const MQTT_URL: &str = match option_env!("BREATHERIGHT_MQTT_URL") {
    Some(url) => url,
    None => "mqtts://localhost:8883",
};
pub const THING_NAME: &str = match option_env!("BREATHERIGHT_THING_NAME") {
    Some(name) => name,
    None => "breatheright",
};
