//! BreatheRight air-quality monitor firmware for the M5Stack Core2.
//!
//! A PMS7003 particulate sensor, the MPU6886 die temperature and a PDM
//! microphone feed a small set of tasks that share one [`state::SharedState`]:
//!
//! * [`tasks::particulate`] decodes sensor frames into the store,
//! * [`tasks::sample`] turns the latest reading into an AQI for the
//!   dashboard and LED bar,
//! * [`tasks::microphone`] and [`tasks::inference`] count coughs and
//!   sneezes,
//! * [`tasks::cloud`] reports everything to the device shadow.
//!
//! Hardware lives behind the traits in [`ports`]; everything except
//! the ESP-IDF `drivers` builds and tests on the host.

pub mod aqi;
pub mod audio;
pub mod config;
pub mod display;
pub mod ei;
pub mod events;
pub mod pms7003;
pub mod ports;
pub mod shadow;
pub mod state;
pub mod tasks;

#[cfg(target_os = "espidf")]
pub mod drivers;

#[cfg(not(target_os = "espidf"))]
pub mod sim;
