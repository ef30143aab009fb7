//! Device shadow documents.
//!
//! Reports go out as `{"state":{"reported":{...}}}`; the cloud pushes
//! desired-state changes back as `{"state":{"hqiStatus":N}}`.

use serde::{Deserialize, Serialize};

use crate::events::{EnvironmentalReading, EventCounters};
use crate::pms7003::ParticulateReading;

/// Flat periodic report. Field names are the shadow keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShadowReport {
    pub temperature: f32,
    pub humidity: f32,
    pub pressure: f32,
    #[serde(rename = "PM1_0")]
    pub pm1_0: u16,
    #[serde(rename = "PM2_5")]
    pub pm2_5: u16,
    #[serde(rename = "PM10")]
    pub pm10: u16,
    pub coughs: u32,
    pub sneezes: u32,
    #[serde(rename = "hqiStatus")]
    pub hqi_status: u16,
}

impl ShadowReport {
    /// PM values are the atmospheric-environment ones, same as the display.
    pub fn new(
        env: EnvironmentalReading,
        pm: ParticulateReading,
        events: EventCounters,
        hqi_status: u16,
    ) -> Self {
        Self {
            temperature: env.temperature_c,
            humidity: env.humidity_pct,
            pressure: env.pressure,
            pm1_0: pm.pm1_0_ae,
            pm2_5: pm.pm2_5_ae,
            pm10: pm.pm10_ae,
            coughs: events.coughs,
            sneezes: events.sneezes,
            hqi_status,
        }
    }

    pub fn events(&self) -> EventCounters {
        EventCounters::new(self.coughs, self.sneezes)
    }

    /// Full shadow update document.
    pub fn to_document(&self) -> anyhow::Result<Vec<u8>> {
        #[derive(Serialize)]
        struct Reported<'a> {
            reported: &'a ShadowReport,
        }
        #[derive(Serialize)]
        struct Update<'a> {
            state: Reported<'a>,
        }

        let doc = Update {
            state: Reported { reported: self },
        };
        Ok(serde_json::to_vec(&doc)?)
    }
}

#[derive(Deserialize)]
struct Delta {
    state: DeltaState,
}

#[derive(Deserialize)]
struct DeltaState {
    #[serde(rename = "hqiStatus")]
    hqi_status: Option<u16>,
}

/// Pull `hqiStatus` out of a delta message. Deltas without it, or that
/// don't parse, yield `None`.
pub fn parse_delta(payload: &[u8]) -> Option<u16> {
    match serde_json::from_slice::<Delta>(payload) {
        Ok(delta) => delta.state.hqi_status,
        Err(e) => {
            log::warn!("Ignoring malformed shadow delta: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_report() -> ShadowReport {
        ShadowReport::new(
            EnvironmentalReading {
                temperature_c: 22.5,
                humidity_pct: 0.0,
                pressure: 0.0,
            },
            ParticulateReading {
                pm1_0_ae: 4,
                pm2_5_ae: 9,
                pm10_ae: 11,
                pm2_5_sp: 99,
                ..Default::default()
            },
            EventCounters::new(3, 1),
            2,
        )
    }

    #[test]
    fn document_uses_shadow_keys() {
        let doc: Value = serde_json::from_slice(&sample_report().to_document().unwrap()).unwrap();
        assert_eq!(
            doc,
            json!({
                "state": {
                    "reported": {
                        "temperature": 22.5,
                        "humidity": 0.0,
                        "pressure": 0.0,
                        "PM1_0": 4,
                        "PM2_5": 9,
                        "PM10": 11,
                        "coughs": 3,
                        "sneezes": 1,
                        "hqiStatus": 2
                    }
                }
            })
        );
    }

    #[test]
    fn delta_sets_status() {
        assert_eq!(parse_delta(br#"{"state":{"hqiStatus":4}}"#), Some(4));
        assert_eq!(
            parse_delta(br#"{"version":12,"timestamp":1,"state":{"hqiStatus":0}}"#),
            Some(0)
        );
    }

    #[test]
    fn unrelated_or_broken_deltas_are_ignored() {
        assert_eq!(parse_delta(br#"{"state":{"other":1}}"#), None);
        assert_eq!(parse_delta(br#"{"state":{"hqiStatus":-1}}"#), None);
        assert_eq!(parse_delta(b"not json"), None);
    }
}
