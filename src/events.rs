// BreatheRight — Shared Data Types

// ---------------------------------------------------------------------------
// Environmental reading (temperature from the MPU6886 die, calibrated)
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentalReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub pressure: f32,
}

impl EnvironmentalReading {
    /// Apply the enclosure offset to a raw sample.
    pub fn calibrated(raw: EnvironmentalReading, temperature_offset_c: f32) -> Self {
        Self {
            temperature_c: raw.temperature_c + temperature_offset_c,
            ..raw
        }
    }
}

// ---------------------------------------------------------------------------
// Cough / sneeze counters
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounters {
    pub coughs: u32,
    pub sneezes: u32,
}

impl EventCounters {
    pub fn new(coughs: u32, sneezes: u32) -> Self {
        Self { coughs, sneezes }
    }

    pub fn is_empty(&self) -> bool {
        self.coughs == 0 && self.sneezes == 0
    }

    /// Saturating, so a stuck classifier can't wrap the count back to zero.
    /// Returns `false` if any count was lost to saturation.
    pub fn add(&mut self, other: EventCounters) -> bool {
        let (coughs, cough_overflow) = self.coughs.overflowing_add(other.coughs);
        let (sneezes, sneeze_overflow) = self.sneezes.overflowing_add(other.sneezes);
        self.coughs = if cough_overflow { u32::MAX } else { coughs };
        self.sneezes = if sneeze_overflow { u32::MAX } else { sneezes };

        if cough_overflow || sneeze_overflow {
            log::warn!(
                "Event counter saturated, dropping part of {} cough(s), {} sneeze(s)",
                other.coughs,
                other.sneezes
            );
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Audio classification labels
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEvent {
    Cough,
    Sneeze,
    Noise,
}

impl AudioEvent {
    /// Map an Edge Impulse label string to an `AudioEvent`.
    pub fn from_label(label: &str) -> Self {
        match label {
            "cough" => Self::Cough,
            "sneeze" => Self::Sneeze,
            _ => Self::Noise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibration_only_touches_temperature() {
        let raw = EnvironmentalReading {
            temperature_c: 52.0,
            humidity_pct: 40.0,
            pressure: 1.01,
        };
        let env = EnvironmentalReading::calibrated(raw, -27.78);
        assert!((env.temperature_c - 24.22).abs() < 1e-4);
        assert_eq!(env.humidity_pct, 40.0);
        assert_eq!(env.pressure, 1.01);
    }

    #[test]
    fn counters_saturate() {
        let mut c = EventCounters::new(u32::MAX - 1, 0);
        assert!(!c.add(EventCounters::new(5, 2)));
        assert_eq!(c, EventCounters::new(u32::MAX, 2));
    }

    #[test]
    fn add_reports_no_loss_below_the_limit() {
        let mut c = EventCounters::new(3, 1);
        assert!(c.add(EventCounters::new(1, 1)));
        assert_eq!(c, EventCounters::new(4, 2));
    }

    #[test]
    fn unknown_labels_are_noise() {
        assert_eq!(AudioEvent::from_label("cough"), AudioEvent::Cough);
        assert_eq!(AudioEvent::from_label("sneeze"), AudioEvent::Sneeze);
        assert_eq!(AudioEvent::from_label("background"), AudioEvent::Noise);
    }
}
