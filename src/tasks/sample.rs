// BreatheRight — Sample / Aggregate Task
//
// Every 5 s: sample the die temperature, calibrate and publish it, then take
// the latest particulate reading and refresh the dashboard and LED colour
// from its AQI. The particulate snapshot uses a bounded wait; if the serial
// task holds the lock that long, this refresh is skipped.

use std::fmt::Write as _;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crate::aqi::AqiStatus;
use crate::config::*;
use crate::events::EnvironmentalReading;
use crate::ports::{Display, EnvironmentSensor, Label, Panel};
use crate::state::SharedState;
use crate::tasks::led::LedColor;

pub struct Aggregator<E, D> {
    sensor: E,
    display: D,
    state: Arc<SharedState>,
    led: Arc<LedColor>,
    text: String,
}

impl<E: EnvironmentSensor, D: Display> Aggregator<E, D> {
    pub fn new(sensor: E, display: D, state: Arc<SharedState>, led: Arc<LedColor>) -> Self {
        Self {
            sensor,
            display,
            state,
            led,
            text: String::with_capacity(64),
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    /// One refresh. Returns the AQI shown, or `None` if the particulate lock
    /// was busy and the refresh was skipped.
    pub fn tick(&mut self) -> anyhow::Result<Option<AqiStatus>> {
        let env = match self.sensor.sample() {
            Ok(raw) => {
                let env = EnvironmentalReading::calibrated(raw, TEMPERATURE_OFFSET_C);
                self.state.publish_environmental(env);
                env
            }
            Err(e) => {
                log::warn!("Temperature read failed, showing last value: {}", e);
                self.state.snapshot_environmental()
            }
        };

        let Some(pm) = self
            .state
            .try_snapshot_particulate(Duration::from_millis(UI_LOCK_TIMEOUT_MS))
        else {
            log::debug!("Particulate store busy, skipping refresh");
            return Ok(None);
        };

        let status = AqiStatus::from_pm25(f32::from(pm.pm2_5_ae));

        self.set_label(
            Label::Aqi,
            format_args!("Air Quality Index: {}\n{}", status.whole(), status.label()),
        )?;
        self.set_label(Label::Temperature, format_args!("{:.2} °C", env.temperature_c))?;
        self.set_label(Label::Humidity, format_args!("{:.0}%", env.humidity_pct))?;
        self.set_label(Label::Pressure, format_args!("{:.2} bar", env.pressure))?;
        self.set_label(Label::Pm1_0, format_args!("{}", pm.pm1_0_ae))?;
        self.set_label(Label::Pm2_5, format_args!("{}", pm.pm2_5_ae))?;
        self.set_label(Label::Pm10, format_args!("{}", pm.pm10_ae))?;

        self.display
            .set_panel_color(Panel::Aqi, status.alert_color())?;
        self.display
            .set_panel_color(Panel::Body, status.background_color())?;

        if !self.led.set(status.alert_color()) {
            log::debug!("LED colour busy, keeping previous colour");
        }

        Ok(Some(status))
    }

    fn set_label(&mut self, label: Label, args: std::fmt::Arguments<'_>) -> anyhow::Result<()> {
        self.text.clear();
        self.text.write_fmt(args)?;
        self.display.set_label(label, &self.text)
    }
}

pub fn sample_task<E, D>(sensor: E, display: D, state: Arc<SharedState>, led: Arc<LedColor>)
where
    E: EnvironmentSensor,
    D: Display,
{
    log::info!("Sample task started");

    let mut aggregator = Aggregator::new(sensor, display, state, led);

    super::every(Duration::from_millis(SAMPLE_INTERVAL_MS), || {
        match aggregator.tick() {
            Ok(Some(status)) => log::info!(
                "AQI {} ({})",
                status.whole(),
                status.label().replace('\n', " ")
            ),
            Ok(None) => {}
            Err(e) => log::warn!("Dashboard refresh failed: {}", e),
        }
        ControlFlow::Continue(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pms7003::ParticulateReading;
    use embedded_graphics::pixelcolor::Rgb888;
    use std::collections::HashMap;

    struct FixedSensor(f32);

    impl EnvironmentSensor for FixedSensor {
        fn sample(&mut self) -> anyhow::Result<EnvironmentalReading> {
            Ok(EnvironmentalReading {
                temperature_c: self.0,
                ..Default::default()
            })
        }
    }

    struct FullSensor(EnvironmentalReading);

    impl EnvironmentSensor for FullSensor {
        fn sample(&mut self) -> anyhow::Result<EnvironmentalReading> {
            Ok(self.0)
        }
    }

    struct BrokenSensor;

    impl EnvironmentSensor for BrokenSensor {
        fn sample(&mut self) -> anyhow::Result<EnvironmentalReading> {
            anyhow::bail!("i2c timeout")
        }
    }

    #[derive(Default)]
    struct FakeDisplay {
        labels: HashMap<Label, String>,
        panels: HashMap<Panel, Rgb888>,
    }

    impl Display for FakeDisplay {
        fn set_label(&mut self, label: Label, text: &str) -> anyhow::Result<()> {
            self.labels.insert(label, text.to_string());
            Ok(())
        }

        fn set_panel_color(&mut self, panel: Panel, color: Rgb888) -> anyhow::Result<()> {
            self.panels.insert(panel, color);
            Ok(())
        }
    }

    fn aggregator<E: EnvironmentSensor>(
        sensor: E,
    ) -> (Aggregator<E, FakeDisplay>, Arc<SharedState>, Arc<LedColor>) {
        let state = Arc::new(SharedState::new());
        let led = Arc::new(LedColor::default());
        let agg = Aggregator::new(
            sensor,
            FakeDisplay::default(),
            Arc::clone(&state),
            Arc::clone(&led),
        );
        (agg, state, led)
    }

    #[test]
    fn refresh_updates_labels_panels_and_led() {
        let (mut agg, state, led) = aggregator(FixedSensor(52.0));
        state.publish_particulate(ParticulateReading {
            pm1_0_ae: 6,
            pm2_5_ae: 10,
            pm10_ae: 14,
            ..Default::default()
        });

        let status = agg.tick().unwrap().unwrap();
        assert_eq!(status.whole(), 41);

        let labels = &agg.display().labels;
        assert_eq!(labels[&Label::Aqi], "Air Quality Index: 41\nGood");
        assert_eq!(labels[&Label::Temperature], "24.22 °C");
        assert_eq!(labels[&Label::Humidity], "0%");
        assert_eq!(labels[&Label::Pressure], "0.00 bar");
        assert_eq!(labels[&Label::Pm1_0], "6");
        assert_eq!(labels[&Label::Pm2_5], "10");
        assert_eq!(labels[&Label::Pm10], "14");

        let panels = &agg.display().panels;
        assert_eq!(panels[&Panel::Aqi], Rgb888::new(0, 128, 0));
        assert_eq!(panels[&Panel::Body], Rgb888::new(123, 224, 123));
        assert_eq!(led.get(), Some(Rgb888::new(0, 128, 0)));
    }

    #[test]
    fn humidity_and_pressure_reach_the_dashboard() {
        let (mut agg, state, _) = aggregator(FullSensor(EnvironmentalReading {
            temperature_c: 40.0,
            humidity_pct: 47.6,
            pressure: 1.013,
        }));
        agg.tick().unwrap();

        let labels = &agg.display().labels;
        assert_eq!(labels[&Label::Humidity], "48%");
        assert_eq!(labels[&Label::Pressure], "1.01 bar");
        assert_eq!(state.snapshot_environmental().humidity_pct, 47.6);
    }

    #[test]
    fn publishes_calibrated_temperature() {
        let (mut agg, state, _) = aggregator(FixedSensor(50.0));
        agg.tick().unwrap();
        let env = state.snapshot_environmental();
        assert!((env.temperature_c - 22.22).abs() < 1e-4);
    }

    #[test]
    fn skips_refresh_while_particulate_is_locked() {
        let (mut agg, state, _) = aggregator(FixedSensor(30.0));
        let guard = state.particulate_domain().lock();
        assert_eq!(agg.tick().unwrap(), None);
        drop(guard);
        assert!(agg.display().labels.is_empty());
        // Temperature is its own domain and still went out.
        assert!(state.snapshot_environmental().temperature_c > 0.0);
    }

    #[test]
    fn sensor_failure_still_refreshes_air_quality() {
        let (mut agg, state, _) = aggregator(BrokenSensor);
        state.publish_particulate(ParticulateReading {
            pm2_5_ae: 400,
            ..Default::default()
        });
        let status = agg.tick().unwrap().unwrap();
        assert_eq!(status.label(), "Hazardous");
        assert_eq!(agg.display().labels[&Label::Temperature], "0.00 °C");
    }
}
