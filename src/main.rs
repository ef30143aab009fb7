// BreatheRight — Firmware Entry Point
//
// Boot sequence:
//   1. Initialise logging.
//   2. Bring up the peripherals (UART, I2C, I2S, RMT, MQTT) or, on a
//      workstation, their simulated stand-ins.
//   3. Create the shared sensor state and the slice channel between the
//      microphone and the classifier.
//   4. Spawn particulate, sample, LED, microphone, inference and cloud
//      tasks.
//
// Any failure before the tasks start is fatal: `main` returns the error,
// which on ESP-IDF aborts and resets the chip.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use breatheright::audio::slice_channel;
use breatheright::config::*;
use breatheright::ei::EdgeImpulse;
use breatheright::ports::{AudioSource, CloudSync, Display, EnvironmentSensor, LedStrip, SerialPort};
use breatheright::state::SharedState;
use breatheright::tasks::{self, led::LedColor};

/// Everything the tasks need from the board.
struct Board<S, E, A, D, L, C> {
    serial: S,
    environment: E,
    audio: A,
    display: D,
    leds: L,
    cloud: C,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------
fn main() -> anyhow::Result<()> {
    board::init_logging();
    log::info!("BreatheRight firmware starting…");

    // ---- Shared state -----------------------------------------------------
    let state = Arc::new(SharedState::new());
    let led_color = Arc::new(LedColor::default());

    // ---- Peripherals ------------------------------------------------------
    let board = board::take(Arc::clone(&state))?;

    spawn_tasks(board, state, led_color)?;
    log::info!("Boot complete: entering normal operation");

    // Main thread has nothing left to do: park it forever.
    // (All work happens in the spawned tasks.)
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

fn spawn_tasks<S, E, A, D, L, C>(
    board: Board<S, E, A, D, L, C>,
    state: Arc<SharedState>,
    led_color: Arc<LedColor>,
) -> anyhow::Result<()>
where
    S: SerialPort + Send + 'static,
    E: EnvironmentSensor + Send + 'static,
    A: AudioSource + Send + 'static,
    D: Display + Send + 'static,
    L: LedStrip + Send + 'static,
    C: CloudSync + Send + 'static,
{
    let Board {
        serial,
        environment,
        audio,
        display,
        leds,
        cloud,
    } = board;

    // Working buffers for the classifier; without them there is no point
    // in running.
    let (slice_tx, slice_rx) = slice_channel(EI_SLICE_SIZE)?;
    let classifier = EdgeImpulse::new()?;

    // Particulate task: drains the PMS7003 UART.
    let pms_state = Arc::clone(&state);
    tasks::spawn("particulate", STACK_PARTICULATE, move || {
        tasks::particulate::particulate_task(serial, pms_state);
    })?;

    // Sample task: temperature, AQI, dashboard and LED colour.
    let sample_state = Arc::clone(&state);
    let sample_led = Arc::clone(&led_color);
    tasks::spawn("sample", STACK_SAMPLE, move || {
        tasks::sample::sample_task(environment, display, sample_state, sample_led);
    })?;

    // LED bar sweep.
    tasks::spawn("led", STACK_LED, move || {
        tasks::led::led_task(leds, led_color);
    })?;

    // Audio capture and cough / sneeze inference.
    tasks::spawn("microphone", STACK_MICROPHONE, move || {
        tasks::microphone::microphone_task(audio, slice_tx);
    })?;

    let inference_state = Arc::clone(&state);
    tasks::spawn("inference", STACK_INFERENCE, move || {
        tasks::inference::inference_task(classifier, slice_rx, inference_state);
    })?;

    // Cloud reporting.
    tasks::spawn("cloud", STACK_CLOUD, move || {
        tasks::cloud::cloud_task(cloud, state);
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// M5Stack Core2
// ---------------------------------------------------------------------------
#[cfg(target_os = "espidf")]
mod board {
    use std::sync::{Arc, Mutex};

    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;

    use breatheright::display::LogDisplay;
    use breatheright::drivers::microphone::PdmMicrophone;
    use breatheright::drivers::mpu6886::Mpu6886;
    use breatheright::drivers::pms_uart::PmsUart;
    use breatheright::drivers::shadow_mqtt::ShadowMqtt;
    use breatheright::drivers::sk6812::Sk6812;
    use breatheright::state::SharedState;

    use super::Board;

    pub fn init_logging() {
        // Link esp-idf-sys runtime patches and initialise logging.
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
    }

    pub fn take(
        state: Arc<SharedState>,
    ) -> anyhow::Result<Board<PmsUart, Mpu6886, PdmMicrophone, LogDisplay, Sk6812, ShadowMqtt>> {
        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        // ---- Internal I2C bus (MPU6886, AXP192, RTC) -----------------------
        let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
        let i2c = I2cDriver::new(
            peripherals.i2c0,
            pins.gpio21, // SDA
            pins.gpio22, // SCL
            &i2c_config,
        )?;
        // The bus lives for the rest of the programme.
        let i2c_bus: &'static Mutex<I2cDriver<'static>> = Box::leak(Box::new(Mutex::new(i2c)));

        let imu = Mpu6886::new(i2c_bus);
        if !imu.is_connected() {
            log::error!("MPU6886 not responding on I2C");
        }
        imu.init()?;

        // ---- PMS7003 on Port C ----------------------------------------------
        let serial = PmsUart::new(
            peripherals.uart2,
            pins.gpio14, // TX → sensor RX
            pins.gpio13, // RX ← sensor TX
        )?;

        // ---- SPM1423 PDM microphone -----------------------------------------
        let audio = PdmMicrophone::new(
            peripherals.i2s0,
            pins.gpio0,  // CLK
            pins.gpio34, // DATA
        )?;

        // ---- SK6812 side bar --------------------------------------------------
        let leds = Sk6812::new(peripherals.rmt.channel0, pins.gpio25)?;

        // ---- Device shadow ------------------------------------------------------
        let cloud = ShadowMqtt::connect(state)?;

        Ok(Board {
            serial,
            environment: imu,
            audio,
            display: LogDisplay::default(),
            leds,
            cloud,
        })
    }
}

// ---------------------------------------------------------------------------
// Workstation simulation
// ---------------------------------------------------------------------------
#[cfg(not(target_os = "espidf"))]
mod board {
    use std::sync::Arc;

    use breatheright::config::LED_COUNT;
    use breatheright::display::LogDisplay;
    use breatheright::sim::{LogCloud, LogLed, SimAudio, SimEnvironment, SimSerial};
    use breatheright::state::SharedState;

    use super::Board;

    pub fn init_logging() {
        pretty_env_logger::formatted_timed_builder()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .init();
    }

    pub fn take(
        _state: Arc<SharedState>,
    ) -> anyhow::Result<Board<SimSerial, SimEnvironment, SimAudio, LogDisplay, LogLed, LogCloud>> {
        log::info!("No ESP-IDF target, running with simulated peripherals");
        Ok(Board {
            serial: SimSerial::default(),
            environment: SimEnvironment::default(),
            audio: SimAudio::default(),
            display: LogDisplay::default(),
            leds: LogLed::new(LED_COUNT),
            cloud: LogCloud,
        })
    }
}
